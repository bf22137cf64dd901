use crate::model::transcript::TranscriptModel;
use crate::types::Strand;

/// Internal numeric transcript ID (index into the index's transcript Vec).
pub type TranscriptIdx = usize;

/// One exon as delivered by an annotation source, before grouping.
///
/// Coordinates are 0-based, half-open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExonRecord {
    pub transcript_id: String,
    pub chromosome: String,
    pub strand: Strand,
    pub start: u32,
    pub end: u32,
}

impl ExonRecord {
    pub fn new(
        transcript_id: impl Into<String>,
        chromosome: impl Into<String>,
        strand: Strand,
        start: u32,
        end: u32,
    ) -> Self {
        Self {
            transcript_id: transcript_id.into(),
            chromosome: chromosome.into(),
            strand,
            start,
            end,
        }
    }
}

/// A transcript covering a queried position.
///
/// Borrows the transcript from the index (zero-copy).
#[derive(Debug, Clone, Copy)]
pub struct TranscriptHit<'a> {
    pub transcript_idx: TranscriptIdx,
    pub transcript: &'a TranscriptModel,
    /// 0-based offset from the transcript's 5' end.
    pub offset: u32,
}

impl<'a> TranscriptHit<'a> {
    pub fn transcript_id(&self) -> &'a str {
        &self.transcript.transcript_id
    }
}
