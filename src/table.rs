//! Spot-by-gene count tables built from the ST pipeline JSON output.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read, Write};

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_OUTPUT: &str = "data_table.tsv";

/// One entry of the JSON array:
/// `{"y": 25, "x": 31, "hits": 1, "barcode": "GATCGCTGAAAGGATAGA", "gene": "ENSMUSG00000041378"}`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SpotHit {
    pub x: i64,
    pub y: i64,
    pub hits: u64,
    #[serde(default)]
    pub barcode: Option<String>,
    pub gene: String,
}

impl SpotHit {
    pub fn spot_id(&self) -> String {
        format!("{}x{}", self.x, self.y)
    }
}

pub fn read_spot_hits<R: Read>(reader: R) -> Result<Vec<SpotHit>> {
    Ok(serde_json::from_reader(reader)?)
}

/// Genes as columns, spots as rows.
#[derive(Debug, Default)]
pub struct CountTable {
    genes: BTreeSet<String>,
    rows: BTreeMap<String, BTreeMap<String, u64>>,
}

impl CountTable {
    /// A repeated (spot, gene) pair keeps the count of its last occurrence.
    pub fn from_hits<I: IntoIterator<Item = SpotHit>>(hits: I) -> Self {
        let mut table = CountTable::default();
        for hit in hits {
            let spot = hit.spot_id();
            table.genes.insert(hit.gene.clone());
            if let Some(previous) = table
                .rows
                .entry(spot)
                .or_default()
                .insert(hit.gene, hit.hits)
            {
                log::debug!("Overwriting repeated count {} for spot {}x{}", previous, hit.x, hit.y);
            }
        }
        table
    }

    pub fn get(&self, spot: &str, gene: &str) -> u64 {
        self.rows
            .get(spot)
            .and_then(|row| row.get(gene))
            .copied()
            .unwrap_or(0)
    }

    pub fn n_spots(&self) -> usize {
        self.rows.len()
    }

    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    /// Write failures are [`Error::write`] errors.
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.write_rows(writer).map_err(Error::write)
    }

    fn write_rows<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for gene in &self.genes {
            write!(writer, "\t{}", gene)?;
        }
        writeln!(writer)?;

        for (spot, row) in &self.rows {
            write!(writer, "{}", spot)?;
            for gene in &self.genes {
                write!(writer, "\t{}", row.get(gene).copied().unwrap_or(0))?;
            }
            writeln!(writer)?;
        }
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"[
      {"y": 25, "x": 31, "hits": 1, "barcode": "GATCGCTGAAAGGATAGA", "gene": "ENSMUSG00000041378"},
      {"y": 23, "x": 13, "hits": 4, "barcode": "TGTTCCGATGGGAGAAGC", "gene": "ENSMUSG00000001227"},
      {"y": 25, "x": 31, "hits": 7, "barcode": "GATCGCTGAAAGGATAGA", "gene": "ENSMUSG00000001227"}
    ]"#;

    #[test]
    fn test_read_spot_hits() {
        let hits = read_spot_hits(JSON.as_bytes()).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[1].spot_id(), "13x23");
        assert_eq!(hits[1].hits, 4);
    }

    #[test]
    fn test_table_layout() {
        let table = CountTable::from_hits(read_spot_hits(JSON.as_bytes()).unwrap());
        assert_eq!(table.n_spots(), 2);
        assert_eq!(table.n_genes(), 2);
        assert_eq!(table.get("31x25", "ENSMUSG00000001227"), 7);
        assert_eq!(table.get("13x23", "ENSMUSG00000041378"), 0);

        let mut out = Vec::new();
        table.write_tsv(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\tENSMUSG00000001227\tENSMUSG00000041378\n\
             13x23\t4\t0\n\
             31x25\t7\t1\n"
        );
    }

    #[test]
    fn test_repeated_pair_keeps_last() {
        let json = r#"[{"x":1,"y":1,"hits":2,"gene":"G"},{"x":1,"y":1,"hits":5,"gene":"G"}]"#;
        let table = CountTable::from_hits(read_spot_hits(json.as_bytes()).unwrap());
        assert_eq!(table.get("1x1", "G"), 5);
    }

    #[test]
    fn test_missing_field_is_error() {
        let json = r#"[{"x":1,"y":1,"gene":"G"}]"#;
        assert!(matches!(read_spot_hits(json.as_bytes()), Err(Error::Json(_))));
    }
}
