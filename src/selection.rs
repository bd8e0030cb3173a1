//! Filtering of ST BED records against spot selections exported from the ST Viewer.

use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::bed::{self, is_comment};
use crate::error::{Error, Result};

/// 0-based columns holding the spot coordinates in the ST BED file.
pub const X_COL: usize = 7;
pub const Y_COL: usize = 8;

/// Set of selected (x, y) spot coordinates.
#[derive(Debug, Default)]
pub struct Selection {
    spots: HashSet<(i64, i64)>,
}

impl Selection {
    pub fn contains(&self, x: i64, y: i64) -> bool {
        self.spots.contains(&(x, y))
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    /// Add every `x y` line of a selection file.
    pub fn extend_from<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if is_comment(&line) {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let x = parse_int(tokens.next(), "x", idx + 1)?;
            let y = parse_int(tokens.next(), "y", idx + 1)?;
            self.spots.insert((x, y));
        }
        Ok(())
    }
}

fn parse_int(token: Option<&str>, name: &str, line_no: usize) -> Result<i64> {
    let token =
        token.ok_or_else(|| Error::format("<input>", line_no, format!("missing {} column", name)))?;
    token.parse().map_err(|_| {
        Error::format(
            "<input>",
            line_no,
            format!("{} coordinate '{}' is not an integer", name, token),
        )
    })
}

pub fn load_selection<P: AsRef<Path>>(paths: &[P]) -> Result<Selection> {
    if paths.is_empty() {
        return Err(Error::InvalidInput("no selection files given".to_string()));
    }
    let mut selection = Selection::default();
    for path in paths {
        let path = path.as_ref();
        let reader = bed::open_reader(path)?;
        selection
            .extend_from(reader)
            .map_err(|e| e.with_path(path))?;
        log::debug!("Loaded {} from {}", selection.len(), path.display());
    }
    Ok(selection)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct FilterSummary {
    pub total: u64,
    pub kept: u64,
}

/// Copy every record whose spot is selected from `reader` to `writer`, unchanged.
/// Comment lines are dropped. Write failures are [`Error::write`] errors.
pub fn filter_records<R: BufRead, W: Write>(
    reader: R,
    selection: &Selection,
    writer: &mut W,
) -> Result<FilterSummary> {
    let mut summary = FilterSummary::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if is_comment(&line) {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() <= Y_COL {
            return Err(Error::format(
                "<input>",
                idx + 1,
                format!(
                    "expected at least {} columns, found {}",
                    Y_COL + 1,
                    fields.len()
                ),
            ));
        }
        let x = parse_int(Some(fields[X_COL]), "x", idx + 1)?;
        let y = parse_int(Some(fields[Y_COL]), "y", idx + 1)?;

        summary.total += 1;
        if selection.contains(x, y) {
            writeln!(writer, "{}", line).map_err(Error::write)?;
            summary.kept += 1;
        }
    }

    writer.flush().map_err(Error::write)?;
    Ok(summary)
}

/// `filtered_<file name>` in the working directory.
pub fn default_output(bed_file: &Path) -> PathBuf {
    let name = bed_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    PathBuf::from(format!("filtered_{}", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn selection(data: &str) -> Selection {
        let mut s = Selection::default();
        s.extend_from(Cursor::new(data)).unwrap();
        s
    }

    #[test]
    fn test_selection_parsing() {
        let s = selection("# x y\n10 20\n11\t21\textra\n\n10 20\n");
        assert_eq!(s.len(), 2);
        assert!(s.contains(10, 20));
        assert!(s.contains(11, 21));
        assert!(!s.contains(20, 10));
    }

    #[test]
    fn test_selection_bad_line() {
        let mut s = Selection::default();
        let err = s.extend_from(Cursor::new("10 20\n10\n")).unwrap_err();
        assert!(matches!(err, Error::Format { line: 2, .. }));
    }

    #[test]
    fn test_filter_keeps_selected_spots() {
        let s = selection("10 20\n");
        let bed = "\
# header
chr1\t1\t2\tr1\t0\t+\tG1\t10\t20
chr1\t3\t4\tr2\t0\t-\tG2\t11\t20
chr2\t5\t6\tr3\t0\t+\tG3\t10\t20
";
        let mut out = Vec::new();
        let summary = filter_records(Cursor::new(bed), &s, &mut out).unwrap();
        assert_eq!(summary, FilterSummary { total: 3, kept: 2 });
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "chr1\t1\t2\tr1\t0\t+\tG1\t10\t20\nchr2\t5\t6\tr3\t0\t+\tG3\t10\t20\n"
        );
    }

    #[test]
    fn test_filter_short_record() {
        let s = selection("1 1\n");
        let mut out = Vec::new();
        let err = filter_records(Cursor::new("chr1 1 2 r 0 + G\n"), &s, &mut out).unwrap_err();
        assert!(matches!(err, Error::Format { line: 1, .. }));
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "no space left"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_names_output() {
        let s = selection("10 20\n");
        let bed = "chr1\t1\t2\tr1\t0\t+\tG1\t10\t20\n";
        let err = filter_records(Cursor::new(bed), &s, &mut FullDisk)
            .unwrap_err()
            .with_path("reads.bed")
            .with_output_path("selected.bed");
        match err {
            Error::Io { path, .. } => assert_eq!(path, PathBuf::from("selected.bed")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_load_selection_requires_files() {
        let none: [&Path; 0] = [];
        assert!(matches!(load_selection(&none), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_load_selection_merges_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "1 1\n").unwrap();
        std::fs::write(&b, "2 2\n1 1\n").unwrap();
        let s = load_selection(&[a, b]).unwrap();
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_default_output() {
        assert_eq!(
            default_output(Path::new("/data/run1/reads.bed")),
            PathBuf::from("filtered_reads.bed")
        );
    }
}
