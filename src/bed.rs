//! Parsing of the BED-like files produced by the ST pipeline.
//!
//! Columns are whitespace-delimited in a fixed order:
//! chromosome, start, end, read, score, strand, gene, barcode, x, y.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use flate2::read::MultiGzDecoder;

use crate::error::{Error, Result};

/// Minimum number of columns a record line must carry.
pub const MIN_FIELDS: usize = 6;

const STRAND_COL: usize = 5;
const GENE_COL: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strand {
    Forward,
    Reverse,
}

impl FromStr for Strand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            other => Err(format!("invalid strand '{}', expected '+' or '-'", other)),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalRecord {
    pub chrom: String,
    pub start: u64, // 0-based
    pub end: u64,
    pub strand: Strand,
    pub gene: Option<String>,
}

impl IntervalRecord {
    /// Strand-aware transcription start: `start` on `+`, `end` on `-`.
    pub fn site(&self) -> u64 {
        match self.strand {
            Strand::Forward => self.start,
            Strand::Reverse => self.end,
        }
    }
}

/// Comment and blank lines carry no record.
pub fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Parse one line of the ST BED file. `line_no` is 1-based and only used for errors.
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<IntervalRecord>> {
    if is_comment(line) {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return Err(Error::format(
            "<input>",
            line_no,
            format!(
                "expected at least {} columns, found {}",
                MIN_FIELDS,
                fields.len()
            ),
        ));
    }

    let start = parse_coord(fields[1], "start", line_no)?;
    let end = parse_coord(fields[2], "end", line_no)?;
    let strand = fields[STRAND_COL]
        .parse::<Strand>()
        .map_err(|e| Error::format("<input>", line_no, e))?;

    Ok(Some(IntervalRecord {
        chrom: fields[0].to_string(),
        start,
        end,
        strand,
        gene: fields.get(GENE_COL).map(|g| g.to_string()),
    }))
}

fn parse_coord(field: &str, name: &str, line_no: usize) -> Result<u64> {
    field.parse::<u64>().map_err(|_| {
        Error::format(
            "<input>",
            line_no,
            format!("{} coordinate '{}' is not a non-negative integer", name, field),
        )
    })
}

/// Open a text file for buffered reading, transparently decompressing `.gz` inputs.
/// Multi-member streams (bgzip output) are read to the end.
pub fn open_reader<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(e, path))?;

    if path.extension().map_or(false, |ext| ext == "gz") {
        log::debug!("Detected gzipped input file: {}", path.display());
        return Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))));
    }

    Ok(Box::new(BufReader::new(file)))
}

/// Iterate over all records of a reader, stopping at the first malformed line.
pub fn records<R: BufRead>(reader: R) -> impl Iterator<Item = Result<IntervalRecord>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| match line {
            Ok(line) => parse_line(&line, idx + 1).transpose(),
            Err(e) => Some(Err(Error::from(e))),
        })
}
