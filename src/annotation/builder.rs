use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::annotation::io::{AnnotationReader, ParseError};
use crate::error::IndexError;
use crate::index::{AnnotationIndex, IndexSource};
use crate::model::types::ExonRecord;

/// Which attribute keys and feature types define transcript structure.
///
/// Notes:
/// - multiple keys per category are allowed; first present wins.
/// - GFF3 Parent values are split by ',' and each parent becomes a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationKeys {
    pub transcript_id_keys: Vec<String>,

    /// GFF3 exon->transcript linkage (most commonly: Parent)
    pub parent_keys: Vec<String>,

    /// Feature types that count as exons (default: ["exon"])
    pub exon_feature_types: Vec<String>,
}

impl Default for AnnotationKeys {
    fn default() -> Self {
        Self {
            transcript_id_keys: vec!["transcript_id".into(), "transcript".into()],
            parent_keys: vec!["Parent".into()],
            exon_feature_types: vec!["exon".into()],
        }
    }
}

/// Counters from turning annotation lines into exon records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub lines: usize,
    pub exons: usize,
    pub other_features: usize,
    pub unstranded: usize,
}

/// High-level builder for creating an `AnnotationIndex` from a GTF/GFF3 file.
///
/// - parses the whole file (optionally gzipped)
/// - configurable transcript ID keys and exon feature types
/// - hands the exon records to [`AnnotationIndex::build`]
#[derive(Debug, Clone, Default)]
pub struct AnnotationBuilder {
    pub keys: AnnotationKeys,
}

impl AnnotationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(mut self, keys: AnnotationKeys) -> Self {
        self.keys = keys;
        self
    }

    pub fn transcript_id_keys(mut self, keys: &[&str]) -> Self {
        self.keys.transcript_id_keys = keys.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Parent keys for GFF3 exon->transcript linking (usually ["Parent"]).
    pub fn parent_keys(mut self, keys: &[&str]) -> Self {
        self.keys.parent_keys = keys.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn exon_feature_types(mut self, types: &[&str]) -> Self {
        self.keys.exon_feature_types = types.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Parse exon records out of any `BufRead`.
    ///
    /// Unstranded exons cannot be oriented and are skipped (counted in the stats).
    pub fn exon_records<R: BufRead>(
        &self,
        reader: R,
    ) -> Result<(Vec<ExonRecord>, ExtractStats), ParseError> {
        let mut stats = ExtractStats::default();
        let mut out = Vec::new();

        for rec in AnnotationReader::new(reader).records() {
            let rec = rec?;
            stats.lines += 1;

            if !rec.is_feature_of(&self.keys.exon_feature_types) {
                stats.other_features += 1;
                continue;
            }

            let Some(strand) = rec.strand else {
                stats.unstranded += 1;
                continue;
            };

            let tx_key_raw = rec
                .pick_first_attr(&self.keys.transcript_id_keys)
                .or_else(|| rec.pick_first_attr(&self.keys.parent_keys))
                .ok_or_else(|| {
                    let mut tried = self.keys.transcript_id_keys.clone();
                    tried.extend(self.keys.parent_keys.iter().cloned());
                    ParseError::MalformedLine {
                        line_no: rec.line_no,
                        problem: format!("missing transcript id attribute (tried keys: {tried:?})"),
                        line: format!("{}\t{}\t{}", rec.seqname, rec.feature_type, rec.start0 + 1),
                    }
                })?;

            for tx_key in split_gff3_parent_list(&tx_key_raw) {
                out.push(ExonRecord::new(
                    tx_key,
                    rec.seqname.clone(),
                    strand,
                    rec.start0,
                    rec.end0,
                ));
                stats.exons += 1;
            }
        }

        Ok((out, stats))
    }

    /// Build index from anything implementing `BufRead`.
    pub fn build_from_reader<R: BufRead>(&self, reader: R) -> Result<AnnotationIndex, IndexError> {
        let (records, stats) = self.exon_records(reader)?;

        log::debug!(
            "annotation: {} lines, {} exon records, {} other features",
            stats.lines,
            stats.exons,
            stats.other_features
        );
        if stats.unstranded > 0 {
            log::warn!("skipped {} unstranded exon records", stats.unstranded);
        }

        AnnotationIndex::build(records)
    }

    /// Build index from a file path; `.gz` files are decompressed on the fly.
    ///
    /// The index remembers the path and keys it was built from.
    pub fn build_from_path<P: AsRef<Path>>(&self, path: P) -> Result<AnnotationIndex, IndexError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| ParseError::IoPath {
            path: path.display().to_string(),
            source: e,
        })?;

        let is_gz = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("gz"))
            .unwrap_or(false);

        log::info!("reading annotation {}", path.display());
        let idx = if is_gz {
            self.build_from_reader(BufReader::new(GzDecoder::new(file)))?
        } else {
            self.build_from_reader(BufReader::new(file))?
        };

        Ok(idx.with_source(IndexSource {
            annotation: path.to_path_buf(),
            keys: self.keys.clone(),
        }))
    }
}

/// Split Parent= list (GFF3) by commas; also trim whitespace.
fn split_gff3_parent_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Strand;
    use std::io::{Cursor, Write};

    #[test]
    fn builder_gtf_default_keys_builds_index() {
        let gtf = "\
chr1\tsrc\tgene\t101\t220\t.\t+\t.\tgene_id \"G1\";
chr1\tsrc\ttranscript\t101\t220\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";
chr1\tsrc\texon\t101\t150\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";
chr1\tsrc\texon\t201\t220\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";
";
        let idx = AnnotationBuilder::new()
            .build_from_reader(Cursor::new(gtf.as_bytes()))
            .unwrap();

        assert_eq!(idx.chromosomes(), &["chr1".to_string()]);
        assert_eq!(idx.transcripts().len(), 1);

        // 101..150 => [100,150), 201..220 => [200,220)
        let tx = idx.find_transcript("T1").unwrap();
        assert_eq!(tx.length(), 70);
        assert_eq!(tx.exons()[0].start, 100);
        assert_eq!(idx.map("chr1", 205).unwrap()[0].offset, 55);
    }

    #[test]
    fn builder_gff3_parent_linking_builds_index() {
        let gff = "\
chr2\tsrc\texon\t5\t20\t.\t-\t.\tParent=tx1,tx2;gene_id=G9
chr2\tsrc\texon\t30\t40\t.\t-\t.\tParent=tx1;gene_id=G9
";
        let idx = AnnotationBuilder::new()
            .transcript_id_keys(&[])
            .parent_keys(&["Parent"])
            .build_from_reader(Cursor::new(gff.as_bytes()))
            .unwrap();

        assert_eq!(idx.transcripts().len(), 2);
        let tx1 = idx.find_transcript("tx1").unwrap();
        assert_eq!(tx1.strand, Strand::Reverse);
        assert_eq!(tx1.exons().len(), 2);
        assert_eq!(tx1.length(), 16 + 11);
        assert_eq!(idx.find_transcript("tx2").unwrap().exons().len(), 1);
    }

    #[test]
    fn builder_respects_exon_feature_types_filter() {
        let gtf = "\
chr1\tsrc\texon\t101\t150\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";
chr1\tsrc\tCDS\t201\t250\t.\t+\t0\tgene_id \"G1\"; transcript_id \"T1\";
";
        let idx = AnnotationBuilder::new()
            .exon_feature_types(&["exon"])
            .build_from_reader(Cursor::new(gtf.as_bytes()))
            .unwrap();

        assert_eq!(idx.transcripts()[0].exons().len(), 1);
    }

    #[test]
    fn unstranded_exons_are_skipped() {
        let gtf = "\
chr1\tsrc\texon\t101\t150\t.\t.\t.\ttranscript_id \"T0\";
chr1\tsrc\texon\t101\t150\t.\t+\t.\ttranscript_id \"T1\";
";
        let (records, stats) = AnnotationBuilder::new()
            .exon_records(Cursor::new(gtf.as_bytes()))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(stats.unstranded, 1);
    }

    #[test]
    fn missing_transcript_id_is_a_parse_error() {
        let gtf = "chr1\tsrc\texon\t101\t150\t.\t+\t.\tgene_id \"G1\";\n";
        let err = AnnotationBuilder::new()
            .build_from_reader(Cursor::new(gtf.as_bytes()))
            .unwrap_err();
        assert!(matches!(err, IndexError::Parse(ParseError::MalformedLine { line_no: 1, .. })));
    }

    #[test]
    fn no_exons_means_empty_annotation() {
        let gtf = "chr1\tsrc\tgene\t101\t150\t.\t+\t.\tgene_id \"G1\";\n";
        let err = AnnotationBuilder::new()
            .build_from_reader(Cursor::new(gtf.as_bytes()))
            .unwrap_err();
        assert!(matches!(err, IndexError::EmptyAnnotation));
    }

    #[test]
    fn gzipped_annotation_is_detected_by_extension() {
        let gtf = "chr1\tsrc\texon\t101\t150\t.\t-\t.\ttranscript_id \"T1\";\n";
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genes.gtf.gz");

        let mut enc = flate2::write::GzEncoder::new(
            std::fs::File::create(&path).unwrap(),
            flate2::Compression::default(),
        );
        enc.write_all(gtf.as_bytes()).unwrap();
        enc.finish().unwrap();

        let idx = AnnotationBuilder::new().build_from_path(&path).unwrap();
        assert_eq!(idx.map("chr1", 100).unwrap()[0].offset, 49);

        let source = idx.source().unwrap();
        assert_eq!(source.annotation, path);
        assert_eq!(source.keys, AnnotationKeys::default());
    }

    #[test]
    fn quoted_gtf_value_with_equals_sign_builds_index() {
        let gtf = "chr1\tsrc\texon\t101\t150\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\"; note \"ratio=0.5\";\n";
        let idx = AnnotationBuilder::new()
            .build_from_reader(Cursor::new(gtf.as_bytes()))
            .unwrap();

        assert!(idx.source().is_none());
        let hits = idx.map("chr1", 120).unwrap();
        assert_eq!(hits[0].transcript_id(), "T1");
        assert_eq!(hits[0].offset, 20);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = AnnotationBuilder::new()
            .build_from_path("/definitely/not/here.gtf")
            .unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.gtf"));
    }
}
