//! Error types shared across the index, mapper, input table and run setup.
//!
//! Index errors are fatal and abort a run before any mapping starts.
//! `MapError` is per-record: the batch layer turns it into a dropped record.

use thiserror::Error;

use crate::annotation::io::ParseError;
use crate::types::Strand;

/// Failure while turning exon records into an `AnnotationIndex`.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Exons of one transcript disagree on chromosome or strand.
    #[error(
        "inconsistent transcript '{transcript_id}': exons on {expected_chromosome}({expected_strand}) and {found_chromosome}({found_strand})"
    )]
    InconsistentTranscript {
        transcript_id: String,
        expected_chromosome: String,
        expected_strand: Strand,
        found_chromosome: String,
        found_strand: Strand,
    },

    #[error("invalid exon [{start}, {end}) for transcript '{transcript_id}'")]
    InvalidExon {
        transcript_id: String,
        start: u32,
        end: u32,
    },

    /// Nothing usable was found in the annotation.
    #[error("annotation yielded no transcript models (check --exon-feature-type / --transcript-id-key)")]
    EmptyAnnotation,

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Failure to map a single position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// Chromosome names are compared verbatim ("chr6" and "6" differ).
    #[error("chromosome '{0}' is not present in the annotation")]
    UnknownChromosome(String),
}

/// Failure while reading the delimited input table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error while reading '{path}': {source}")]
    IoPath {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while reading input table: {0}")]
    Io(#[from] std::io::Error),

    #[error("input table has no header line")]
    MissingHeader,

    #[error("required column '{column}' not found in header {header:?}")]
    MissingColumn { column: String, header: Vec<String> },

    #[error("line {line_no}: expected {expected} fields, found {found}")]
    FieldCount {
        line_no: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line_no}: '{value}' is not a valid genomic position")]
    BadPosition { line_no: usize, value: String },

    #[error("line {line_no}: '{value}' is not a valid strand (+, -, .)")]
    BadStrand { line_no: usize, value: String },
}

/// Invalid run or batch configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_workers must be a positive integer")]
    ZeroWorkers,

    #[error("failed to create worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
