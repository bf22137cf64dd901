//! Parallel mapping of input records.
//!
//! The input is cut into `max_workers` contiguous chunks which a dedicated
//! rayon pool of exactly `max_workers` threads processes independently.
//! Chunk results are collected in chunk order, so the merged output does not
//! depend on the worker count or on scheduling.

use std::fmt;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::error::{ConfigError, MapError};
use crate::index::AnnotationIndex;
use crate::split::{Split, SplitAssigner};
use crate::table::InputRecord;

/// Why an input record produced no mapped record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropCause {
    /// Position is intronic or intergenic (or no transcript on the record's strand).
    NoTranscriptOverlap,
    /// Chromosome is absent from the annotation.
    UnknownChromosome,
}

impl fmt::Display for DropCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DropCause::NoTranscriptOverlap => "NoTranscriptOverlap",
            DropCause::UnknownChromosome => "UnknownChromosome",
        };
        write!(f, "{s}")
    }
}

impl From<&MapError> for DropCause {
    fn from(e: &MapError) -> Self {
        match e {
            MapError::UnknownChromosome(_) => DropCause::UnknownChromosome,
        }
    }
}

/// An input record re-expressed on one transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRecord<'a> {
    pub record: &'a InputRecord,
    pub transcript_id: &'a str,
    pub transcript_offset: u32,
    pub split: Split,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRecord<'a> {
    pub record: &'a InputRecord,
    pub cause: DropCause,
}

/// Counters for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub records: usize,
    /// Input records that mapped to at least one transcript.
    pub mapped_records: usize,
    /// Input records that mapped to more than one transcript.
    pub fanned_out: usize,
    pub train: usize,
    pub validation: usize,
    pub no_overlap: usize,
    pub unknown_chromosome: usize,
}

impl BatchStats {
    pub fn dropped(&self) -> usize {
        self.no_overlap + self.unknown_chromosome
    }

    fn merge(&mut self, other: &BatchStats) {
        self.records += other.records;
        self.mapped_records += other.mapped_records;
        self.fanned_out += other.fanned_out;
        self.train += other.train;
        self.validation += other.validation;
        self.no_overlap += other.no_overlap;
        self.unknown_chromosome += other.unknown_chromosome;
    }
}

impl fmt::Display for BatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records: {} mapped ({} to several transcripts), {} dropped \
             (NoTranscriptOverlap={}, UnknownChromosome={}); emitted train={}, validation={}",
            self.records,
            self.mapped_records,
            self.fanned_out,
            self.dropped(),
            self.no_overlap,
            self.unknown_chromosome,
            self.train,
            self.validation
        )
    }
}

/// Merged result of a batch run, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutput<'a> {
    pub train: Vec<MappedRecord<'a>>,
    pub validation: Vec<MappedRecord<'a>>,
    pub dropped: Vec<DroppedRecord<'a>>,
    pub stats: BatchStats,
}

impl<'a> BatchOutput<'a> {
    fn extend(&mut self, chunk: BatchOutput<'a>) {
        self.train.extend(chunk.train);
        self.validation.extend(chunk.validation);
        self.dropped.extend(chunk.dropped);
        self.stats.merge(&chunk.stats);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub max_workers: usize,
    pub show_progress: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            show_progress: false,
        }
    }
}

impl BatchConfig {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            ..Default::default()
        }
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

/// Map a single record, appending its mapped / dropped results to `out`.
pub fn process_record<'a>(
    record: &'a InputRecord,
    index: &'a AnnotationIndex,
    splitter: &SplitAssigner,
    out: &mut BatchOutput<'a>,
) {
    out.stats.records += 1;

    let hits = match index.map_stranded(&record.chromosome, record.position, record.strand) {
        Ok(hits) => hits,
        Err(e) => {
            log::debug!("line {}: {}", record.line_no, e);
            out.stats.unknown_chromosome += 1;
            out.dropped.push(DroppedRecord {
                record,
                cause: DropCause::from(&e),
            });
            return;
        }
    };

    if hits.is_empty() {
        out.stats.no_overlap += 1;
        out.dropped.push(DroppedRecord {
            record,
            cause: DropCause::NoTranscriptOverlap,
        });
        return;
    }

    out.stats.mapped_records += 1;
    if hits.len() > 1 {
        out.stats.fanned_out += 1;
    }

    let split = splitter.assign(&record.chromosome);
    for hit in hits {
        let mapped = MappedRecord {
            record,
            transcript_id: hit.transcript_id(),
            transcript_offset: hit.offset,
            split,
        };
        match split {
            Split::Train => {
                out.stats.train += 1;
                out.train.push(mapped);
            }
            Split::Validation => {
                out.stats.validation += 1;
                out.validation.push(mapped);
            }
        }
    }
}

fn process_chunk<'a>(
    chunk: &'a [InputRecord],
    index: &'a AnnotationIndex,
    splitter: &SplitAssigner,
    pb: &ProgressBar,
) -> BatchOutput<'a> {
    let mut out = BatchOutput::default();
    for record in chunk {
        process_record(record, index, splitter, &mut out);
        pb.inc(1);
    }
    out
}

/// Map every record with a pool of `config.max_workers` threads.
///
/// Per-record failures end up in `dropped`; only an invalid configuration
/// is an error.
pub fn run<'a>(
    records: &'a [InputRecord],
    index: &'a AnnotationIndex,
    splitter: &SplitAssigner,
    config: &BatchConfig,
) -> Result<BatchOutput<'a>, ConfigError> {
    if config.max_workers == 0 {
        return Err(ConfigError::ZeroWorkers);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_workers)
        .build()?;

    let chunk_size = records.len().div_ceil(config.max_workers).max(1);

    let pb = if config.show_progress {
        let pb = ProgressBar::new(records.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        pb.set_message("mapping");
        pb
    } else {
        ProgressBar::hidden()
    };

    log::info!(
        "mapping {} records with {} workers (chunk size {})",
        records.len(),
        config.max_workers,
        chunk_size
    );

    let chunks: Vec<BatchOutput<'a>> = pool.install(|| {
        records
            .par_chunks(chunk_size)
            .map(|chunk| process_chunk(chunk, index, splitter, &pb))
            .collect()
    });

    pb.finish_and_clear();

    let mut merged = BatchOutput::default();
    for chunk in chunks {
        merged.extend(chunk);
    }
    Ok(merged)
}
