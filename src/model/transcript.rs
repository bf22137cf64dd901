use serde::{Deserialize, Serialize};

use crate::types::{Exon, Strand};

/// Spliced transcript model with precomputed exon length prefix sums.
///
/// Exons are kept in ascending genomic order regardless of strand;
/// `prefix[i]` is the summed length of all exons before exon `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptModel {
    pub transcript_id: String,
    pub chromosome: String,
    pub strand: Strand,
    exons: Vec<Exon>,
    prefix: Vec<u32>,
    length: u32,
}

impl TranscriptModel {
    /// Build a model from exons given in any order.
    ///
    /// Exact duplicates collapse and overlapping exons are merged into one;
    /// adjacent exons stay distinct. Empty intervals are ignored.
    /// Returns `None` when no exon with positive length remains.
    pub fn new(
        transcript_id: impl Into<String>,
        chromosome: impl Into<String>,
        strand: Strand,
        exons: Vec<Exon>,
    ) -> Option<Self> {
        let exons = normalize_exons(exons);
        if exons.is_empty() {
            return None;
        }

        let mut prefix = Vec::with_capacity(exons.len());
        let mut length = 0u32;
        for e in &exons {
            prefix.push(length);
            length += e.len();
        }

        Some(Self {
            transcript_id: transcript_id.into(),
            chromosome: chromosome.into(),
            strand,
            exons,
            prefix,
            length,
        })
    }

    pub fn exons(&self) -> &[Exon] {
        &self.exons
    }

    pub fn prefix_sums(&self) -> &[u32] {
        &self.prefix
    }

    /// Length of the spliced transcript.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Genomic span (first exon start, last exon end).
    pub fn span(&self) -> (u32, u32) {
        (self.exons[0].start, self.exons[self.exons.len() - 1].end)
    }

    /// Index of the exon containing `pos`, if any.
    pub fn exon_index_at(&self, pos: u32) -> Option<usize> {
        let i = self.exons.partition_point(|e| e.start <= pos);
        if i == 0 {
            return None;
        }
        self.exons[i - 1].contains(pos).then_some(i - 1)
    }

    /// 0-based offset of genomic `pos` within the spliced transcript, counted
    /// from the transcript's 5' end. `None` for intronic or outside positions.
    pub fn offset_of(&self, pos: u32) -> Option<u32> {
        let i = self.exon_index_at(pos)?;
        let forward = self.prefix[i] + (pos - self.exons[i].start);
        Some(match self.strand {
            Strand::Forward => forward,
            Strand::Reverse => self.length - 1 - forward,
        })
    }
}

/// Sort by start, drop empty intervals, merge overlaps (not adjacency).
fn normalize_exons(mut exons: Vec<Exon>) -> Vec<Exon> {
    exons.retain(|e| !e.is_empty());
    if exons.is_empty() {
        return exons;
    }

    exons.sort_unstable();

    let mut merged: Vec<Exon> = Vec::with_capacity(exons.len());
    let mut cur = exons[0];
    for &e in &exons[1..] {
        if e.start < cur.end {
            cur.end = cur.end.max(e.end);
        } else {
            merged.push(cur);
            cur = e;
        }
    }
    merged.push(cur);
    merged
}
