use std::collections::HashMap;
use std::io::BufRead;

use thiserror::Error;

use crate::types::Strand;

/// File dialect detected from attribute syntax.
///
/// - GFF3 typically uses: key=value;key2=value2
/// - GTF typically uses: key "value"; key2 "value2";
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Gff3,
    Gtf,
    Unknown,
}

/// A single parsed record line from GTF/GFF3.
///
/// Coordinates:
/// - `start0` is 0-based start
/// - `end0` is 0-based end (half-open)
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    pub line_no: usize,
    pub seqname: String,         // chromosome / contig
    pub source: String,          // column 2
    pub feature_type: String,    // column 3
    pub start0: u32,             // 0-based start
    pub end0: u32,               // 0-based end (half-open)
    pub score: Option<f32>,      // '.' => None
    pub strand: Option<Strand>,  // '.' / '?' => None
    pub phase: Option<u8>,       // '.' => None, else 0/1/2
    pub attrs: HashMap<String, String>,
    pub dialect: Dialect,
}

impl AnnotationRecord {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(|s| s.as_str())
    }

    pub fn is_feature_of(&self, feature_types: &[String]) -> bool {
        feature_types.iter().any(|t| t == &self.feature_type)
    }

    /// First non-empty value among `keys`, in key order.
    pub fn pick_first_attr(&self, keys: &[String]) -> Option<String> {
        for k in keys {
            if let Some(v) = self.attr(k) {
                let v = v.trim();
                if !v.is_empty() {
                    return Some(v.to_string());
                }
            }
        }
        None
    }
}

/// Parsing errors for GTF/GFF3.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("I/O error while reading '{path}': {source}")]
    IoPath {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line_no}: malformed GTF/GFF line ({problem}): {line}")]
    MalformedLine {
        line_no: usize,
        problem: String,
        line: String,
    },

    #[error("line {line_no}: bad coordinates: {line}")]
    BadCoordinates { line_no: usize, line: String },
}

/// Streaming parser for GTF/GFF3 files.
///
/// Most callers want [`crate::annotation::AnnotationBuilder`], which turns a
/// whole file into an index in one step.
///
/// ```no_run
/// use std::fs::File;
/// use std::io::BufReader;
/// use gtf_tx_coords::annotation::io::AnnotationReader;
///
/// let file = File::open("genes.gtf").unwrap();
/// let rdr = AnnotationReader::new(BufReader::new(file));
/// for rec in rdr.records() {
///     let rec = rec.unwrap();
///     println!("{} {}-{}", rec.seqname, rec.start0, rec.end0);
/// }
/// ```
pub struct AnnotationReader<R: BufRead> {
    reader: R,
    buf: String,
    line_no: usize,
}

impl<R: BufRead> AnnotationReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            line_no: 0,
        }
    }

    /// Returns an iterator over parsed records.
    ///
    /// - Skips blank lines
    /// - Skips comment lines starting with '#'
    pub fn records(mut self) -> impl Iterator<Item = Result<AnnotationRecord, ParseError>> {
        std::iter::from_fn(move || loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => self.line_no += 1,
                Err(e) => {
                    return Some(Err(ParseError::IoPath {
                        path: "<reader>".to_string(),
                        source: e,
                    }))
                }
            }

            let line = self.buf.trim_end_matches(&['\n', '\r'][..]);
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            return Some(parse_record_line(line, self.line_no));
        })
    }
}

/// Parse a single non-comment line into an `AnnotationRecord`.
pub fn parse_record_line(line: &str, line_no: usize) -> Result<AnnotationRecord, ParseError> {
    let malformed = |problem: &str| ParseError::MalformedLine {
        line_no,
        problem: problem.to_string(),
        line: line.to_string(),
    };
    let bad_coords = || ParseError::BadCoordinates {
        line_no,
        line: line.to_string(),
    };

    // seqname source feature start end score strand phase attributes
    let cols: Vec<&str> = line.split('\t').collect();
    if cols.len() != 9 {
        return Err(malformed(&format!("expected 9 tab-separated columns, found {}", cols.len())));
    }
    let [seqname, source, feature_type, start_s, end_s, score_s, strand_s, phase_s, attrs_s] =
        [cols[0], cols[1], cols[2], cols[3], cols[4], cols[5], cols[6], cols[7], cols[8]];

    if seqname.is_empty() {
        return Err(malformed("empty seqname"));
    }

    // Coordinates: input is 1-based inclusive; convert to 0-based half-open [start-1, end)
    let start_1: u64 = start_s.trim().parse().map_err(|_| bad_coords())?;
    let end_1: u64 = end_s.trim().parse().map_err(|_| bad_coords())?;

    if start_1 == 0 || end_1 < start_1 || end_1 > u32::MAX as u64 {
        return Err(bad_coords());
    }

    let start0 = (start_1 - 1) as u32;
    let end0 = end_1 as u32;

    let score = if score_s == "." {
        None
    } else {
        Some(score_s.parse::<f32>().map_err(|_| malformed("bad score"))?)
    };

    let strand = Strand::parse_column(strand_s).map_err(|e| malformed(&e.to_string()))?;

    let phase = if phase_s == "." {
        None
    } else {
        let p: u8 = phase_s.parse().map_err(|_| malformed("bad phase"))?;
        if p > 2 {
            return Err(malformed("phase must be 0, 1 or 2"));
        }
        Some(p)
    };

    let (dialect, attrs) = parse_attributes(attrs_s);

    Ok(AnnotationRecord {
        line_no,
        seqname: seqname.to_string(),
        source: source.to_string(),
        feature_type: feature_type.to_string(),
        start0,
        end0,
        score,
        strand,
        phase,
        attrs,
        dialect,
    })
}

/// Parse the attributes field for either GFF3 or GTF.
///
/// Each `;`-separated part is read by its own shape: `key=value` when the
/// first separator after the key is '=', `key "value"` otherwise. An '='
/// inside a quoted GTF value therefore stays part of the value.
/// The reported dialect is that of the first attribute.
pub fn parse_attributes(s: &str) -> (Dialect, HashMap<String, String>) {
    let mut dialect = None;
    let mut map = HashMap::new();

    for part in s.trim().split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let style = part_dialect(part);
        dialect.get_or_insert(style);

        let (key, value) = match style {
            Dialect::Gff3 => split_key_value(part, '='),
            Dialect::Gtf | Dialect::Unknown => split_key_value(part, ' '),
        };

        // GTF keeps only attributes that carry a value; GFF3 allows empty values.
        if key.is_empty() || (style != Dialect::Gff3 && value.is_empty()) {
            continue;
        }
        map.insert(key.to_string(), value);
    }

    (dialect.unwrap_or(Dialect::Unknown), map)
}

/// Shape of one attribute, decided by the first '=', quote or whitespace.
fn part_dialect(part: &str) -> Dialect {
    match part.find(|c: char| c == '=' || c == '"' || c.is_whitespace()) {
        Some(i) if part[i..].starts_with('=') => Dialect::Gff3,
        Some(_) => Dialect::Gtf,
        None => Dialect::Unknown,
    }
}

fn split_key_value(part: &str, sep: char) -> (&str, String) {
    let (k, v) = if sep == ' ' {
        part.split_once(char::is_whitespace).unwrap_or((part, ""))
    } else {
        part.split_once(sep).unwrap_or((part, ""))
    };
    (k.trim(), unquote(v))
}

fn unquote(v: &str) -> String {
    let v = v.trim();
    let v = v.strip_prefix('"').unwrap_or(v);
    let v = v.strip_suffix('"').unwrap_or(v);
    v.to_string()
}
