//! Grouping of ST reads by chromosome, strand and transcription start site.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::bed::{self, Strand};
use crate::error::{Error, Result};

/// Gene identifiers never counted towards a site (Malat1, by Ensembl id and by name).
/// Matched case-insensitively.
pub const EXCLUDED_GENES: [&str; 2] = ["ENSMUSG00000092341", "MALAT1"];

pub fn is_excluded_gene(gene: &str) -> bool {
    EXCLUDED_GENES
        .iter()
        .any(|excluded| excluded.eq_ignore_ascii_case(gene))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SiteKey {
    pub chrom: String,
    pub strand: Strand,
    pub site: u64,
}

impl SiteKey {
    pub fn new(chrom: impl Into<String>, strand: Strand, site: u64) -> Self {
        Self {
            chrom: chrom.into(),
            strand,
            site,
        }
    }
}

/// Occurrences of each site, plus tallies of what went into them.
#[derive(Debug, Default)]
pub struct SiteCounts {
    counts: HashMap<SiteKey, u64>,
    pub records: u64,
    pub excluded: u64,
}

impl SiteCounts {
    pub fn get(&self, key: &SiteKey) -> Option<u64> {
        self.counts.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SiteKey, u64)> {
        self.counts.iter().map(|(k, v)| (k, *v))
    }

    fn add(&mut self, key: SiteKey) {
        *self.counts.entry(key).or_insert(0) += 1;
    }
}

/// Count sites over every record of an already opened reader.
pub fn count_sites_from<R: BufRead>(reader: R) -> Result<SiteCounts> {
    let mut counts = SiteCounts::default();

    for record in bed::records(reader) {
        let record = record?;
        counts.records += 1;

        if record.gene.as_deref().map_or(false, is_excluded_gene) {
            counts.excluded += 1;
            continue;
        }

        let site = record.site();
        counts.add(SiteKey::new(record.chrom, record.strand, site));
    }

    Ok(counts)
}

pub fn count_sites<P: AsRef<Path>>(path: P) -> Result<SiteCounts> {
    let path = path.as_ref();
    let reader = bed::open_reader(path)?;
    count_sites_from(reader).map_err(|e| e.with_path(path))
}

/// Write one `chrom<TAB>strand<TAB>site<TAB>count` line per site, in no particular order.
pub fn write_site_counts<W: Write>(counts: &SiteCounts, writer: &mut W) -> Result<()> {
    for (key, count) in counts.iter() {
        writeln!(writer, "{}\t{}\t{}\t{}", key.chrom, key.strand, key.site, count)
            .map_err(Error::write)?;
    }
    writer.flush().map_err(Error::write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn counts(data: &str) -> SiteCounts {
        count_sites_from(Cursor::new(data)).unwrap()
    }

    #[test]
    fn test_malat1_excluded_from_site() {
        let data = "\
chr1\t100\t150\tr1\t0\t+\tGeneA\tAAAA
chr1\t100\t180\tr2\t0\t+\tGeneB\tCCCC
chr1\t100\t150\tr3\t0\t+\tMALAT1\tGGGG
";
        let c = counts(data);
        assert_eq!(c.len(), 1);
        assert_eq!(c.get(&SiteKey::new("chr1", Strand::Forward, 100)), Some(2));
        assert_eq!(c.records, 3);
        assert_eq!(c.excluded, 1);
    }

    #[test]
    fn test_exclusion_is_case_insensitive() {
        let data = "\
chr1 1 2 r 0 + malat1
chr1 1 2 r 0 + ensmusg00000092341
chr1 1 2 r 0 + Malat1-as
";
        let c = counts(data);
        assert_eq!(c.excluded, 2);
        assert_eq!(c.get(&SiteKey::new("chr1", Strand::Forward, 1)), Some(1));
    }

    #[test]
    fn test_strand_aware_sites() {
        let data = "\
chr1 100 200 r 0 + G
chr1 100 200 r 0 - G
chr1 150 200 r 0 - G
";
        let c = counts(data);
        assert_eq!(c.get(&SiteKey::new("chr1", Strand::Forward, 100)), Some(1));
        assert_eq!(c.get(&SiteKey::new("chr1", Strand::Reverse, 200)), Some(2));
        assert_eq!(c.get(&SiteKey::new("chr1", Strand::Reverse, 100)), None);
    }

    #[test]
    fn test_count_equals_records_per_key() {
        let mut data = String::new();
        for i in 0..25u64 {
            data.push_str(&format!("chr{} {} {} r 0 + G\n", i % 3, i % 5, i % 5 + 10));
        }
        let c = counts(&data);
        let total: u64 = c.iter().map(|(_, v)| v).sum();
        assert_eq!(total, 25);
        // i % 15 determines the key, so every key collects floor or ceil of 25/15 records
        for (_, v) in c.iter() {
            assert!(v == 1 || v == 2);
        }
        assert_eq!(c.len(), 15);
    }

    #[test]
    fn test_malformed_line_aborts() {
        let err = count_sites_from(Cursor::new("chr1 1 2 r 0 + G\nbroken line\n")).unwrap_err();
        assert!(matches!(err, Error::Format { line: 2, .. }));
    }

    #[test]
    fn test_write_site_counts() {
        let c = counts("chr1 7 9 r 0 - G\nchr1 7 9 r 0 - G\n");
        let mut out = Vec::new();
        write_site_counts(&c, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "chr1\t-\t9\t2\n");
    }

    #[test]
    fn test_count_sites_attaches_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bed");
        std::fs::write(&path, "chr1 1\n").unwrap();
        match count_sites(&path).unwrap_err() {
            Error::Format { path: p, line, .. } => {
                assert_eq!(p, path);
                assert_eq!(line, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
