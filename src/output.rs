//! Final outputs are written to a temp file beside the destination and renamed into place
//! once complete, so a failed run never leaves a partial file at the destination.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tempfile::{Builder, NamedTempFile};

use crate::error::{Error, Result};

/// A temp file in the destination's directory, so that [`persist`] is a rename.
pub fn temp_beside(output: &Path, prefix: &str) -> Result<NamedTempFile> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Builder::new()
        .prefix(prefix)
        .tempfile_in(dir)
        .map_err(|e| Error::io(e, dir))
}

/// Move `file` to `output`, falling back to a copy when the rename fails.
pub fn persist(file: NamedTempFile, output: &Path) -> Result<()> {
    match file.persist(output) {
        Ok(_) => Ok(()),
        Err(error) => {
            log::debug!("rename into {} failed ({}), copying", output.display(), error.error);
            let file = error.file;
            let mut input = File::open(file.path()).map_err(|e| Error::io(e, file.path()))?;
            let mut out = BufWriter::new(File::create(output).map_err(|e| Error::io(e, output))?);
            io::copy(&mut input, &mut out).map_err(|e| Error::io(e, output))?;
            out.flush().map_err(|e| Error::io(e, output))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_persist_moves_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("table.tsv");
        let tmp = temp_beside(&output, ".table").unwrap();
        assert_eq!(tmp.path().parent(), Some(dir.path()));
        fs::write(tmp.path(), "a\tb\n").unwrap();

        persist(tmp, &output).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "a\tb\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_abandoned_output_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("table.tsv");
        {
            let tmp = temp_beside(&output, ".table").unwrap();
            let mut writer = BufWriter::new(tmp.as_file());
            writeln!(writer, "partial").unwrap();
        }
        assert!(!output.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_bare_file_name_uses_current_dir() {
        let tmp = temp_beside(Path::new("data_table.tsv"), ".table").unwrap();
        assert_eq!(
            tmp.path().parent().map(|p| p.canonicalize().unwrap()),
            Some(Path::new(".").canonicalize().unwrap())
        );
    }
}
