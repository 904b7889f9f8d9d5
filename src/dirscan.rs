//! Directory Enumerator: at most one active FINDFIRST/FINDNEXT scan.

use std::fs::ReadDir;
use std::path::PathBuf;

use log::debug;

use crate::fileinfo::FileInfo;

/// Holds at most one active directory scan.
#[derive(Default)]
pub struct DirScan {
    active: Option<(ReadDir, PathBuf)>,
}

impl DirScan {
    /// Create an enumerator with no active scan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Close any existing scan, then open `host_path` for enumeration.
    /// Returns the first entry if one is immediately available (the scan
    /// stays active for subsequent `next()` calls); `None` if the
    /// directory couldn't be opened or is empty (in which case the scan
    /// is left closed).
    pub fn begin(&mut self, host_path: &std::path::Path) -> Option<FileInfo> {
        self.reset();
        match std::fs::read_dir(host_path) {
            Ok(rd) => {
                self.active = Some((rd, host_path.to_path_buf()));
                self.next()
            }
            Err(e) => {
                debug!("opendir {:?} failed: {e}", host_path);
                None
            }
        }
    }

    /// Return the next entry, or `None` at end of listing (which also
    /// closes the scan).
    pub fn next(&mut self) -> Option<FileInfo> {
        let (rd, dir) = self.active.as_mut()?;
        loop {
            match rd.next() {
                Some(Ok(entry)) => {
                    let name = entry.file_name();
                    let name = name.to_string_lossy().into_owned();
                    let meta = std::fs::metadata(dir.join(&name)).ok();
                    return Some(FileInfo::from_stat(&name, meta.as_ref()));
                }
                Some(Err(e)) => {
                    debug!("readdir error, skipping entry: {e}");
                    continue;
                }
                None => {
                    self.active = None;
                    return None;
                }
            }
        }
    }

    /// Whether a scan is currently active.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Close any existing scan.
    pub fn reset(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    fn name_of(info: &FileInfo) -> String {
        String::from_utf8_lossy(&info.name)
            .trim_end_matches('\0')
            .to_string()
    }

    #[test]
    fn begin_with_empty_dir_yields_no_first_entry() {
        let dir = tempdir().unwrap();
        let mut scan = DirScan::new();
        assert!(scan.begin(dir.path()).is_none());
        assert!(!scan.is_active());
    }

    #[test]
    fn begin_then_next_enumerates_all_entries() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"there").unwrap();

        let mut scan = DirScan::new();
        let first = scan.begin(dir.path()).expect("first entry");
        let mut names = vec![name_of(&first)];
        while let Some(info) = scan.next() {
            names.push(name_of(&info));
        }
        names.sort();
        assert_eq!(names, vec!["a.txt".to_string(), "b.txt".to_string()]);
        assert!(!scan.is_active());
    }

    #[test]
    fn at_most_one_scan_is_active() {
        let dir_a = tempdir().unwrap();
        let dir_b = tempdir().unwrap();
        std::fs::write(dir_a.path().join("x"), b"1").unwrap();
        std::fs::write(dir_b.path().join("y"), b"1").unwrap();

        let mut scan = DirScan::new();
        scan.begin(dir_a.path());
        assert!(scan.is_active());
        let first = scan.begin(dir_b.path()).expect("dir_b has one entry");
        assert_eq!(name_of(&first), "y");
        // Second FINDFIRST closed the first scan before opening the second.
        assert!(scan.next().is_none());
        assert!(!scan.is_active());
    }
}
