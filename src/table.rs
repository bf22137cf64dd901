//! Delimited input table and TSV output writers.
//!
//! The input is plain delimiter-separated text with a header row. Quoted
//! fields are not interpreted: every delimiter splits a field.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::batch::{DroppedRecord, MappedRecord};
use crate::error::TableError;
use crate::types::Strand;

/// How positions in the input table are numbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionBase {
    Zero,
    /// Same numbering as GTF/GFF3 coordinates.
    #[default]
    One,
}

/// Column layout of the input table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOptions {
    pub delimiter: char,
    pub chrom_col: String,
    pub pos_col: String,
    /// Column restricting matches to its strand when the header has it.
    /// `None` ignores strand entirely, even if such a column exists.
    pub strand_col: Option<String>,
    pub position_base: PositionBase,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            chrom_col: "chrom".into(),
            pos_col: "pos".into(),
            strand_col: Some("strand".into()),
            position_base: PositionBase::One,
        }
    }
}

/// One input row. `position` is always 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRecord {
    pub line_no: usize,
    pub chromosome: String,
    pub position: u32,
    pub strand: Option<Strand>,
    /// All original columns, unchanged.
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputTable {
    pub header: Vec<String>,
    pub records: Vec<InputRecord>,
}

impl InputTable {
    pub fn from_reader<R: BufRead>(reader: R, opts: &TableOptions) -> Result<Self, TableError> {
        let mut lines = reader.lines().enumerate();

        let header: Vec<String> = loop {
            match lines.next() {
                None => return Err(TableError::MissingHeader),
                Some((_, line)) => {
                    let line = line?;
                    let line = line.trim_end_matches('\r');
                    if !line.trim().is_empty() {
                        break line.split(opts.delimiter).map(|s| s.trim().to_string()).collect();
                    }
                }
            }
        };

        let find = |name: &str| header.iter().position(|h| h == name);
        let missing = |name: &str| TableError::MissingColumn {
            column: name.to_string(),
            header: header.clone(),
        };
        let chrom_i = find(&opts.chrom_col).ok_or_else(|| missing(&opts.chrom_col))?;
        let pos_i = find(&opts.pos_col).ok_or_else(|| missing(&opts.pos_col))?;
        let strand_i = opts.strand_col.as_deref().and_then(find);

        let mut records = Vec::new();
        for (i, line) in lines {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let line_no = i + 1;

            let fields: Vec<String> = line.split(opts.delimiter).map(|s| s.to_string()).collect();
            if fields.len() != header.len() {
                return Err(TableError::FieldCount {
                    line_no,
                    expected: header.len(),
                    found: fields.len(),
                });
            }

            let raw_pos = fields[pos_i].trim();
            let position = parse_position(raw_pos, opts.position_base).ok_or_else(|| {
                TableError::BadPosition {
                    line_no,
                    value: raw_pos.to_string(),
                }
            })?;

            let strand = match strand_i {
                Some(si) => Strand::parse_column(&fields[si]).map_err(|_| TableError::BadStrand {
                    line_no,
                    value: fields[si].clone(),
                })?,
                None => None,
            };

            records.push(InputRecord {
                line_no,
                chromosome: fields[chrom_i].trim().to_string(),
                position,
                strand,
                fields,
            });
        }

        Ok(Self { header, records })
    }

    /// Read a table from disk; `.gz` files are decompressed on the fly.
    pub fn from_path<P: AsRef<Path>>(path: P, opts: &TableOptions) -> Result<Self, TableError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| TableError::IoPath {
            path: path.display().to_string(),
            source: e,
        })?;

        if path.extension().is_some_and(|e| e == "gz") {
            Self::from_reader(BufReader::new(GzDecoder::new(file)), opts)
        } else {
            Self::from_reader(BufReader::new(file), opts)
        }
    }
}

fn parse_position(raw: &str, base: PositionBase) -> Option<u32> {
    let v: u64 = raw.parse().ok()?;
    let v = match base {
        PositionBase::Zero => v,
        PositionBase::One => v.checked_sub(1)?,
    };
    u32::try_from(v).ok()
}

/// Write mapped records as TSV: input columns + transcript_id + transcript_offset.
pub fn write_mapped<W: Write>(
    mut w: W,
    header: &[String],
    records: &[MappedRecord<'_>],
) -> std::io::Result<()> {
    writeln!(w, "{}\ttranscript_id\ttranscript_offset", header.join("\t"))?;
    for r in records {
        writeln!(
            w,
            "{}\t{}\t{}",
            r.record.fields.join("\t"),
            r.transcript_id,
            r.transcript_offset
        )?;
    }
    w.flush()
}

/// Write dropped records as TSV: input columns + cause.
pub fn write_dropped<W: Write>(
    mut w: W,
    header: &[String],
    records: &[DroppedRecord<'_>],
) -> std::io::Result<()> {
    writeln!(w, "{}\tcause", header.join("\t"))?;
    for r in records {
        writeln!(w, "{}\t{}", r.record.fields.join("\t"), r.cause)?;
    }
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read(data: &str, opts: &TableOptions) -> Result<InputTable, TableError> {
        InputTable::from_reader(Cursor::new(data.as_bytes()), opts)
    }

    #[test]
    fn reads_one_based_positions_and_passthrough_fields() {
        let t = read(
            "chrom,pos,strand,label\nchr1,206,+,m6A\r\n\nchr2,1,.,none\n",
            &TableOptions::default(),
        )
        .unwrap();

        assert_eq!(t.header, vec!["chrom", "pos", "strand", "label"]);
        assert_eq!(t.records.len(), 2);
        assert_eq!(t.records[0].position, 205);
        assert_eq!(t.records[0].strand, Some(Strand::Forward));
        assert_eq!(t.records[0].fields, vec!["chr1", "206", "+", "m6A"]);
        assert_eq!(t.records[1].position, 0);
        assert_eq!(t.records[1].strand, None);
        assert_eq!(t.records[1].line_no, 4);
    }

    #[test]
    fn custom_columns_and_zero_based() {
        let opts = TableOptions {
            delimiter: '\t',
            chrom_col: "chromosome".into(),
            pos_col: "genomic_position".into(),
            position_base: PositionBase::Zero,
            ..Default::default()
        };
        let t = read("genomic_position\tchromosome\n205\tchr1\n", &opts).unwrap();
        assert_eq!(t.records[0].chromosome, "chr1");
        assert_eq!(t.records[0].position, 205);
        assert_eq!(t.records[0].strand, None);
    }

    #[test]
    fn malformed_rows_are_reported_with_line_numbers() {
        let opts = TableOptions::default();

        let err = read("chrom,pos\nchr1,abc\n", &opts).unwrap_err();
        assert!(matches!(err, TableError::BadPosition { line_no: 2, .. }));

        // position 0 does not exist in 1-based numbering
        let err = read("chrom,pos\nchr1,0\n", &opts).unwrap_err();
        assert!(matches!(err, TableError::BadPosition { .. }));

        let err = read("chrom,pos\nchr1,5,extra\n", &opts).unwrap_err();
        assert!(matches!(err, TableError::FieldCount { expected: 2, found: 3, .. }));

        let err = read("chrom,pos,strand\nchr1,5,x\n", &opts).unwrap_err();
        assert!(matches!(err, TableError::BadStrand { .. }));

        let err = read("chr,pos\nchr1,5\n", &opts).unwrap_err();
        assert!(err.to_string().contains("'chrom'"));

        assert!(matches!(read("", &opts).unwrap_err(), TableError::MissingHeader));
    }

    #[test]
    fn strand_column_can_be_ignored() {
        let opts = TableOptions {
            strand_col: None,
            ..Default::default()
        };
        // not even validated once ignored
        let t = read("chrom,pos,strand\nchr1,5,+\nchr1,6,x\n", &opts).unwrap();
        assert!(t.records.iter().all(|r| r.strand.is_none()));
        assert_eq!(t.records[1].fields, vec!["chr1", "6", "x"]);
    }

    #[test]
    fn gzipped_table_is_detected_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.csv.gz");

        let mut enc = flate2::write::GzEncoder::new(
            std::fs::File::create(&path).unwrap(),
            flate2::Compression::default(),
        );
        enc.write_all(b"chrom,pos,strand\nchr1,206,-\nchr6,1,.\n").unwrap();
        enc.finish().unwrap();

        let t = InputTable::from_path(&path, &TableOptions::default()).unwrap();
        assert_eq!(t.header, vec!["chrom", "pos", "strand"]);
        assert_eq!(t.records.len(), 2);
        assert_eq!(t.records[0].position, 205);
        assert_eq!(t.records[0].strand, Some(Strand::Reverse));
        assert_eq!(t.records[1].chromosome, "chr6");
    }
}
