//! The pending-load manifest: a plain UTF-8 file with one CSV path per line.
//!
//! The fetcher appends. The loader [`claim`](ManifestFile::claim)s the file by
//! renaming it aside, loads what it holds, then
//! [`release`](ClaimedManifest::release)s the claimed copy. Paths appended
//! while a load is running start a fresh manifest and wait for the next run.
//! There is no per-entry status; re-processing an entry is safe because the
//! destination insert is idempotent.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const CLAIMED_SUFFIX: &str = ".claimed";

#[derive(Debug, Clone)]
pub struct ManifestFile {
    path: PathBuf,
}

/// A manifest taken over by one loader run.
#[derive(Debug)]
pub struct ClaimedManifest {
    path: PathBuf,
    entries: Vec<String>,
    resumed: bool,
}

fn read_lines(path: &Path) -> io::Result<Option<Vec<String>>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

impl ManifestFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where a claimed manifest lives until it is released:
    /// `csv_files.log` → `csv_files.log.claimed`.
    pub fn claimed_path(&self) -> PathBuf {
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(CLAIMED_SUFFIX);
        PathBuf::from(name)
    }

    /// Append one entry, creating the file and its parent directory on first use.
    pub fn append(&self, entry: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", entry.trim())
    }

    /// All non-blank entries in append order, or `None` when there is no manifest.
    pub fn read_entries(&self) -> io::Result<Option<Vec<String>>> {
        read_lines(&self.path)
    }

    /// Take the queued entries for loading.
    ///
    /// A claimed copy left by an interrupted run is resumed first and the live
    /// manifest stays queued. Otherwise the live manifest is renamed aside, so
    /// appends from then on land in a new file. `None` when nothing is queued.
    pub fn claim(&self) -> io::Result<Option<ClaimedManifest>> {
        let claimed = self.claimed_path();
        let resumed = claimed.exists();
        if !resumed {
            match fs::rename(&self.path, &claimed) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e),
            }
        }
        Ok(read_lines(&claimed)?.map(|entries| ClaimedManifest {
            path: claimed,
            entries,
            resumed,
        }))
    }
}

impl ClaimedManifest {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// True when this claim was left behind by an earlier, interrupted run.
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    /// Remove the claimed copy once its entries have been processed.
    pub fn release(self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_claim_release_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ManifestFile::new(dir.path().join("nested/csv_files.log"));

        assert!(manifest.read_entries().unwrap().is_none());
        assert!(manifest.claim().unwrap().is_none());

        manifest.append("/data/2023/01/03/TICKER_DATA_AAPL_2023_01_03.csv").unwrap();
        manifest.append("  /data/2023/01/03/TICKER_DATA_MSFT_2023_01_03.csv\n").unwrap();
        manifest.append("/data/2023/01/03/TICKER_DATA_AAPL_2023_01_03.csv").unwrap();

        let claim = manifest.claim().unwrap().unwrap();
        assert!(!claim.is_resumed());
        assert_eq!(
            claim.entries(),
            [
                "/data/2023/01/03/TICKER_DATA_AAPL_2023_01_03.csv",
                "/data/2023/01/03/TICKER_DATA_MSFT_2023_01_03.csv",
                "/data/2023/01/03/TICKER_DATA_AAPL_2023_01_03.csv",
            ]
        );
        assert!(manifest.read_entries().unwrap().is_none());

        claim.release().unwrap();
        assert!(!manifest.claimed_path().exists());
        assert!(manifest.claim().unwrap().is_none());
    }

    #[test]
    fn appends_during_a_claim_survive_release() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ManifestFile::new(dir.path().join("csv_files.log"));
        manifest.append("/a.csv").unwrap();

        let claim = manifest.claim().unwrap().unwrap();
        manifest.append("/b.csv").unwrap();
        claim.release().unwrap();

        assert_eq!(manifest.read_entries().unwrap().unwrap(), ["/b.csv"]);
        let next = manifest.claim().unwrap().unwrap();
        assert_eq!(next.entries(), ["/b.csv"]);
    }

    #[test]
    fn interrupted_claim_is_resumed_before_new_entries() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ManifestFile::new(dir.path().join("csv_files.log"));
        manifest.append("/old.csv").unwrap();
        drop(manifest.claim().unwrap().unwrap());
        manifest.append("/new.csv").unwrap();

        let resumed = manifest.claim().unwrap().unwrap();
        assert!(resumed.is_resumed());
        assert_eq!(resumed.entries(), ["/old.csv"]);
        resumed.release().unwrap();

        let fresh = manifest.claim().unwrap().unwrap();
        assert!(!fresh.is_resumed());
        assert_eq!(fresh.entries(), ["/new.csv"]);
    }

    #[test]
    fn blank_lines_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.log");
        fs::write(&path, "\n/a.csv\r\n\n   \n/b.csv").unwrap();

        let entries = ManifestFile::new(&path).read_entries().unwrap().unwrap();
        assert_eq!(entries, vec!["/a.csv", "/b.csv"]);
    }
}
