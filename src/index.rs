use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationKeys;
use crate::error::{IndexError, MapError};
use crate::model::transcript::TranscriptModel;
use crate::model::types::{ExonRecord, TranscriptHit, TranscriptIdx};
use crate::types::{Exon, Strand};

const MAGIC: &[u8; 4] = b"G2TX";
const VERSION_STR: &str = env!("CARGO_PKG_VERSION");

/// Per-chromosome exon interval table (both strands).
///
/// Exons of every transcript on the chromosome are stored as parallel arrays
/// sorted by start. Since no exon is longer than `max_exon_len`, all exons
/// containing a position `p` start inside `(p - max_exon_len, p]`, which two
/// binary searches delimit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChromIndex {
    starts: Vec<u32>,
    ends: Vec<u32>,
    owners: Vec<TranscriptIdx>,
    max_exon_len: u32,
    transcripts: Vec<TranscriptIdx>,
}

impl ChromIndex {
    fn from_entries(mut entries: Vec<(Exon, TranscriptIdx)>, mut transcripts: Vec<TranscriptIdx>) -> Self {
        entries.sort_unstable();
        transcripts.sort_unstable();

        let mut out = ChromIndex {
            starts: Vec::with_capacity(entries.len()),
            ends: Vec::with_capacity(entries.len()),
            owners: Vec::with_capacity(entries.len()),
            max_exon_len: 0,
            transcripts,
        };
        for (exon, tx) in entries {
            out.starts.push(exon.start);
            out.ends.push(exon.end);
            out.owners.push(tx);
            out.max_exon_len = out.max_exon_len.max(exon.len());
        }
        out
    }

    pub fn exon_count(&self) -> usize {
        self.starts.len()
    }

    pub fn transcripts(&self) -> &[TranscriptIdx] {
        &self.transcripts
    }

    /// Transcripts with an exon containing `pos`, ascending by `TranscriptIdx`.
    pub fn transcripts_at(&self, pos: u32) -> Vec<TranscriptIdx> {
        let hi = self.starts.partition_point(|&s| s <= pos);
        let max_len = self.max_exon_len as u64;
        let lo = self.starts[..hi].partition_point(|&s| s as u64 + max_len <= pos as u64);

        let mut out: Vec<TranscriptIdx> = (lo..hi)
            .filter(|&i| self.ends[i] > pos)
            .map(|i| self.owners[i])
            .collect();
        // Exons of one transcript never overlap, so there is nothing to dedup.
        out.sort_unstable();
        out
    }
}

/// Annotation file and keys an index was built from.
///
/// Stored in the index cache so a cache built from other inputs is not reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSource {
    pub annotation: PathBuf,
    pub keys: AnnotationKeys,
}

/// Immutable lookup structure from genomic position to transcript offset.
///
/// Built once per run, then shared by reference across worker threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationIndex {
    transcripts: Vec<TranscriptModel>,
    tx_by_id: HashMap<String, TranscriptIdx>,

    /// Chromosomes in first-seen annotation order.
    chr_names: Vec<String>,
    chroms: HashMap<String, ChromIndex>,

    source: Option<IndexSource>,
}

struct PendingTranscript {
    id: String,
    chromosome: String,
    strand: Strand,
    exons: Vec<Exon>,
}

impl AnnotationIndex {
    /// Build the index from raw exon records.
    ///
    /// Workflow:
    /// 1) group exons by transcript ID (first-seen order), checking that all
    ///    exons of a transcript share chromosome and strand
    /// 2) build transcript models (sort, merge, prefix sums)
    /// 3) group transcripts by chromosome into sorted exon tables
    ///
    /// ```
    /// use gtf_tx_coords::{AnnotationIndex, ExonRecord, Strand};
    ///
    /// let idx = AnnotationIndex::build(vec![
    ///     ExonRecord::new("T1", "chr1", Strand::Forward, 100, 150),
    ///     ExonRecord::new("T1", "chr1", Strand::Forward, 200, 220),
    /// ])
    /// .unwrap();
    ///
    /// let hits = idx.map("chr1", 205).unwrap();
    /// assert_eq!(hits[0].transcript_id(), "T1");
    /// assert_eq!(hits[0].offset, 55);
    /// ```
    pub fn build<I>(records: I) -> Result<Self, IndexError>
    where
        I: IntoIterator<Item = ExonRecord>,
    {
        let mut pending: Vec<PendingTranscript> = Vec::new();
        let mut key_to_slot: HashMap<String, usize> = HashMap::new();

        for rec in records {
            if rec.start > rec.end {
                return Err(IndexError::InvalidExon {
                    transcript_id: rec.transcript_id,
                    start: rec.start,
                    end: rec.end,
                });
            }

            let slot = match key_to_slot.get(&rec.transcript_id) {
                Some(&slot) => {
                    let p = &pending[slot];
                    if p.chromosome != rec.chromosome || p.strand != rec.strand {
                        return Err(IndexError::InconsistentTranscript {
                            transcript_id: rec.transcript_id,
                            expected_chromosome: p.chromosome.clone(),
                            expected_strand: p.strand,
                            found_chromosome: rec.chromosome,
                            found_strand: rec.strand,
                        });
                    }
                    slot
                }
                None => {
                    let slot = pending.len();
                    key_to_slot.insert(rec.transcript_id.clone(), slot);
                    pending.push(PendingTranscript {
                        id: rec.transcript_id,
                        chromosome: rec.chromosome,
                        strand: rec.strand,
                        exons: Vec::new(),
                    });
                    slot
                }
            };

            pending[slot].exons.push(Exon {
                start: rec.start,
                end: rec.end,
            });
        }

        let mut transcripts: Vec<TranscriptModel> = Vec::with_capacity(pending.len());
        let mut merged_records = 0usize;
        let mut empty = 0usize;
        for p in pending {
            let n_records = p.exons.len();
            match TranscriptModel::new(p.id, p.chromosome, p.strand, p.exons) {
                Some(tx) => {
                    merged_records += n_records - tx.exons().len();
                    transcripts.push(tx);
                }
                None => empty += 1,
            }
        }

        if merged_records > 0 {
            log::warn!("collapsed {merged_records} duplicate or overlapping exon records");
        }
        if empty > 0 {
            log::warn!("skipped {empty} transcripts without any non-empty exon");
        }
        if transcripts.is_empty() {
            return Err(IndexError::EmptyAnnotation);
        }

        Ok(Self::from_models(transcripts))
    }

    fn from_models(transcripts: Vec<TranscriptModel>) -> Self {
        let mut chr_names: Vec<String> = Vec::new();
        let mut per_chr: HashMap<String, (Vec<(Exon, TranscriptIdx)>, Vec<TranscriptIdx>)> =
            HashMap::new();
        let mut tx_by_id = HashMap::with_capacity(transcripts.len());

        for (tx_idx, tx) in transcripts.iter().enumerate() {
            tx_by_id.insert(tx.transcript_id.clone(), tx_idx);

            let entry = per_chr.entry(tx.chromosome.clone()).or_insert_with(|| {
                chr_names.push(tx.chromosome.clone());
                (Vec::new(), Vec::new())
            });
            entry.0.extend(tx.exons().iter().map(|&e| (e, tx_idx)));
            entry.1.push(tx_idx);
        }

        let chroms = per_chr
            .into_iter()
            .map(|(chr, (entries, txs))| (chr, ChromIndex::from_entries(entries, txs)))
            .collect();

        log::info!(
            "indexed {} transcripts on {} chromosomes",
            transcripts.len(),
            chr_names.len()
        );

        Self {
            transcripts,
            tx_by_id,
            chr_names,
            chroms,
            source: None,
        }
    }

    pub fn with_source(mut self, source: IndexSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Where this index came from; `None` when built from records or a reader.
    pub fn source(&self) -> Option<&IndexSource> {
        self.source.as_ref()
    }

    pub fn transcripts(&self) -> &[TranscriptModel] {
        &self.transcripts
    }

    pub fn find_transcript(&self, transcript_id: &str) -> Option<&TranscriptModel> {
        self.tx_by_id.get(transcript_id).map(|&i| &self.transcripts[i])
    }

    /// Chromosome names in first-seen annotation order.
    pub fn chromosomes(&self) -> &[String] {
        &self.chr_names
    }

    pub fn chrom(&self, chromosome: &str) -> Option<&ChromIndex> {
        self.chroms.get(chromosome)
    }

    pub fn contains_chromosome(&self, chromosome: &str) -> bool {
        self.chroms.contains_key(chromosome)
    }

    /// All transcripts covering 0-based `position` on `chromosome`, with
    /// their 5'-relative offsets, ordered by annotation order.
    ///
    /// An intronic or intergenic position gives an empty Vec; only an
    /// unknown chromosome is an error.
    pub fn map(&self, chromosome: &str, position: u32) -> Result<Vec<TranscriptHit<'_>>, MapError> {
        self.map_stranded(chromosome, position, None)
    }

    /// Like [`map`](Self::map), restricted to transcripts on `strand` when given.
    pub fn map_stranded(
        &self,
        chromosome: &str,
        position: u32,
        strand: Option<Strand>,
    ) -> Result<Vec<TranscriptHit<'_>>, MapError> {
        let chrom = self
            .chroms
            .get(chromosome)
            .ok_or_else(|| MapError::UnknownChromosome(chromosome.to_string()))?;

        let hits = chrom
            .transcripts_at(position)
            .into_iter()
            .filter_map(|tx_idx| {
                let tx = &self.transcripts[tx_idx];
                if strand.is_some_and(|s| s != tx.strand) {
                    return None;
                }
                tx.offset_of(position).map(|offset| TranscriptHit {
                    transcript_idx: tx_idx,
                    transcript: tx,
                    offset,
                })
            })
            .collect();

        Ok(hits)
    }

    /// Serialize this index with a small header (magic + crate version) and a bincode payload.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut f = BufWriter::new(File::create(path)?);

        f.write_all(MAGIC)?;

        let v = VERSION_STR.as_bytes();
        let len = v.len() as u16;
        f.write_all(&len.to_le_bytes())?;
        f.write_all(v)?;

        bincode::serialize_into(&mut f, self)?;
        f.flush()?;

        Ok(())
    }

    /// Load an index written by `save()`. Rejects wrong file types and version mismatches.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut f = BufReader::new(File::open(path)?);

        let mut magic = [0u8; 4];
        f.read_exact(&mut magic)?;
        if &magic != MAGIC {
            bail!("Not an annotation index file (bad magic)");
        }

        let mut len_buf = [0u8; 2];
        f.read_exact(&mut len_buf)?;
        let len = u16::from_le_bytes(len_buf) as usize;

        let mut ver_buf = vec![0u8; len];
        f.read_exact(&mut ver_buf)?;
        let file_version = std::str::from_utf8(&ver_buf)?;

        if file_version != VERSION_STR {
            bail!(
                "Index version mismatch: file={}, binary={}",
                file_version,
                VERSION_STR
            );
        }

        let idx: Self = bincode::deserialize_from(&mut f)?;
        Ok(idx)
    }
}

/// Human-readable summary: global counts, then one line per chromosome with
/// transcripts per strand, exon count and longest exon.
impl fmt::Display for AnnotationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n_exons: usize = self.chroms.values().map(|c| c.exon_count()).sum();
        writeln!(
            f,
            "AnnotationIndex: {} transcripts, {} exons, {} chromosomes",
            self.transcripts.len(),
            n_exons,
            self.chr_names.len()
        )?;

        for chr_name in &self.chr_names {
            let Some(chr) = self.chroms.get(chr_name) else {
                writeln!(f, "  - {}: <missing ChromIndex>", chr_name)?;
                continue;
            };

            let forward = chr
                .transcripts()
                .iter()
                .filter(|&&i| self.transcripts[i].strand == Strand::Forward)
                .count();
            let reverse = chr.transcripts().len() - forward;

            writeln!(
                f,
                "  - {}: transcripts={} (+{} / -{}), exons={}, max_exon_len={}",
                chr_name,
                chr.transcripts().len(),
                forward,
                reverse,
                chr.exon_count(),
                chr.max_exon_len
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exon(tx: &str, chr: &str, strand: Strand, start: u32, end: u32) -> ExonRecord {
        ExonRecord::new(tx, chr, strand, start, end)
    }

    fn t1(strand: Strand) -> AnnotationIndex {
        AnnotationIndex::build(vec![
            exon("T1", "chr1", strand, 100, 150),
            exon("T1", "chr1", strand, 200, 220),
        ])
        .unwrap()
    }

    #[test]
    fn forward_transcript_offset() {
        let idx = t1(Strand::Forward);
        let hits = idx.map("chr1", 205).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].transcript_id(), "T1");
        assert_eq!(hits[0].offset, 55);
        assert_eq!(idx.find_transcript("T1").unwrap().length(), 70);
    }

    #[test]
    fn reverse_transcript_offset() {
        let idx = t1(Strand::Reverse);
        let hits = idx.map("chr1", 205).unwrap();
        assert_eq!(hits[0].offset, 14);
    }

    #[test]
    fn endpoints_map_to_transcript_ends() {
        let fwd = t1(Strand::Forward);
        assert_eq!(fwd.map("chr1", 100).unwrap()[0].offset, 0);
        assert_eq!(fwd.map("chr1", 219).unwrap()[0].offset, 69);

        let rev = t1(Strand::Reverse);
        assert_eq!(rev.map("chr1", 100).unwrap()[0].offset, 69);
        assert_eq!(rev.map("chr1", 219).unwrap()[0].offset, 0);
    }

    #[test]
    fn intronic_and_intergenic_give_empty_result() {
        let idx = t1(Strand::Forward);
        assert!(idx.map("chr1", 175).unwrap().is_empty());
        assert!(idx.map("chr1", 150).unwrap().is_empty());
        assert!(idx.map("chr1", 5000).unwrap().is_empty());
        assert!(idx.map("chr1", 0).unwrap().is_empty());
    }

    #[test]
    fn unknown_chromosome_is_an_error() {
        let idx = t1(Strand::Forward);
        assert_eq!(
            idx.map("1", 120).unwrap_err(),
            MapError::UnknownChromosome("1".to_string())
        );
    }

    #[test]
    fn overlapping_transcripts_fan_out_in_annotation_order() {
        let idx = AnnotationIndex::build(vec![
            exon("T2", "chr1", Strand::Reverse, 120, 180),
            exon("T1", "chr1", Strand::Forward, 100, 150),
            exon("T3", "chr1", Strand::Forward, 10, 20),
        ])
        .unwrap();

        let hits = idx.map("chr1", 130).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.transcript_id()).collect();
        assert_eq!(ids, vec!["T2", "T1"]);
        assert_eq!(hits[0].offset, 180 - 1 - 130);
        assert_eq!(hits[1].offset, 30);

        let fwd_only = idx.map_stranded("chr1", 130, Some(Strand::Forward)).unwrap();
        assert_eq!(fwd_only.len(), 1);
        assert_eq!(fwd_only[0].transcript_id(), "T1");
    }

    #[test]
    fn long_exon_does_not_hide_short_ones() {
        let idx = AnnotationIndex::build(vec![
            exon("LONG", "chr1", Strand::Forward, 0, 10_000),
            exon("A", "chr1", Strand::Forward, 500, 510),
            exon("B", "chr1", Strand::Forward, 9_000, 9_100),
        ])
        .unwrap();

        let ids = |pos| {
            idx.map("chr1", pos)
                .unwrap()
                .iter()
                .map(|h| h.transcript_id().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(505), vec!["LONG", "A"]);
        assert_eq!(ids(9_050), vec!["LONG", "B"]);
        assert_eq!(ids(9_999), vec!["LONG"]);
        assert!(ids(10_000).is_empty());
    }

    #[test]
    fn inconsistent_chromosome_or_strand_fails() {
        let err = AnnotationIndex::build(vec![
            exon("T1", "chr1", Strand::Forward, 100, 150),
            exon("T1", "chr2", Strand::Forward, 200, 220),
        ])
        .unwrap_err();
        assert!(matches!(err, IndexError::InconsistentTranscript { .. }));

        let err = AnnotationIndex::build(vec![
            exon("T1", "chr1", Strand::Forward, 100, 150),
            exon("T1", "chr1", Strand::Reverse, 200, 220),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("T1"));
    }

    #[test]
    fn empty_annotation_fails() {
        let err = AnnotationIndex::build(Vec::new()).unwrap_err();
        assert!(matches!(err, IndexError::EmptyAnnotation));
    }

    #[test]
    fn chromosomes_keep_first_seen_order() {
        let idx = AnnotationIndex::build(vec![
            exon("A", "chr2", Strand::Forward, 1, 5),
            exon("B", "chr1", Strand::Forward, 1, 5),
            exon("C", "chr2", Strand::Reverse, 10, 15),
        ])
        .unwrap();
        assert_eq!(idx.chromosomes(), &["chr2".to_string(), "chr1".to_string()]);
        assert_eq!(idx.chrom("chr2").unwrap().transcripts(), &[0, 2]);

        let summary = idx.to_string();
        assert!(summary.contains("3 transcripts"));
        assert!(summary.contains("chr2: transcripts=2 (+1 / -1)"));
    }

    #[test]
    fn save_and_load_preserve_lookups() {
        let idx = t1(Strand::Reverse);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idx.bin");

        let source = IndexSource {
            annotation: PathBuf::from("genes.gtf"),
            keys: AnnotationKeys::default(),
        };
        let idx = idx.with_source(source.clone());
        idx.save(&path).unwrap();
        let loaded = AnnotationIndex::load(&path).unwrap();

        assert_eq!(loaded.transcripts(), idx.transcripts());
        assert_eq!(loaded.map("chr1", 205).unwrap()[0].offset, 14);
        assert_eq!(loaded.source(), Some(&source));
    }

    #[test]
    fn load_rejects_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.bin");
        std::fs::write(&path, b"NOPE....").unwrap();
        assert!(AnnotationIndex::load(&path).is_err());
    }
}
