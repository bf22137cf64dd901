use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Direction of transcription relative to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    /// Parse a strand column value.
    ///
    /// `+`/`-` carry an orientation; `.`, `?` and the empty string are valid
    /// but unstranded (`Ok(None)`). Anything else is rejected.
    pub fn parse_column(s: &str) -> Result<Option<Strand>, UnknownStrand> {
        match s.trim() {
            "+" => Ok(Some(Strand::Forward)),
            "-" => Ok(Some(Strand::Reverse)),
            "." | "?" | "" => Ok(None),
            other => Err(UnknownStrand(other.to_string())),
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStrand(pub String);

impl fmt::Display for UnknownStrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown strand symbol '{}'", self.0)
    }
}

impl std::error::Error for UnknownStrand {}

impl FromStr for Strand {
    type Err = UnknownStrand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strand::parse_column(s)?.ok_or_else(|| UnknownStrand(s.to_string()))
    }
}

/// A contiguous exonic interval on the genome.
/// Coordinates are 0-based, half-open: [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Exon {
    pub start: u32,
    pub end: u32,
}

impl Exon {
    /// Create a new exon. Panics if start >= end.
    pub fn new(start: u32, end: u32) -> Self {
        assert!(start < end, "Exon requires start < end");
        Self { start, end }
    }

    #[inline]
    pub fn len(self) -> u32 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.end <= self.start
    }

    #[inline]
    pub fn contains(self, pos: u32) -> bool {
        self.start <= pos && pos < self.end
    }
}
