use std::fs;
use std::io::{self, Cursor};
use std::path::Path;

use tracing::{debug, warn};
use zip::ZipArchive;

use crate::RemoteError;

/// Unpacks a song archive into `dest`. Entries that would land outside
/// `dest` are skipped. Returns the number of files written.
pub fn extract_archive(bytes: &[u8], dest: &Path) -> Result<usize, RemoteError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    fs::create_dir_all(dest)?;
    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let relpath = match entry.enclosed_name() {
            Some(relpath) => relpath,
            None => {
                warn!("Skipping archive entry {:?}", entry.name());
                continue;
            }
        };
        let target = dest.join(relpath);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        written += 1;
    }
    debug!("Extracted {} files into {:?}", written, dest);
    Ok(written)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::extract_archive;
    use crate::RemoteError;

    pub(crate) fn build_zip(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn extracts_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[
            ("info.dat", "{}"),
            ("Expert.dat", "notes"),
            ("art/cover.jpg", "jpg"),
        ]);
        let dest = dir.path().join("song");
        assert_eq!(extract_archive(&bytes, &dest).unwrap(), 3);
        assert_eq!(std::fs::read(dest.join("Expert.dat")).unwrap(), b"notes");
        assert!(dest.join("art").join("cover.jpg").is_file());
    }

    #[test]
    fn skips_escaping_entries() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[("../evil.txt", "x"), ("ok.txt", "y")]);
        let dest = dir.path().join("song");
        assert_eq!(extract_archive(&bytes, &dest).unwrap(), 1);
        assert!(!dir.path().join("evil.txt").exists());
        assert!(dest.join("ok.txt").is_file());
    }

    #[test]
    fn rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_archive(b"definitely not a zip", dir.path()).unwrap_err();
        assert!(matches!(err, RemoteError::Archive(_)));
    }
}
