//! Select stored streams by file name pattern for batch processing.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;

/// Lists the files of one directory whose names match a regular expression.
pub struct FileSelector {
    directory: PathBuf,
    pattern: Regex,
}

impl FileSelector {
    pub fn new(directory: impl AsRef<Path>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(FileSelector {
            directory: directory.as_ref().to_path_buf(),
            pattern: Regex::new(pattern)?,
        })
    }

    /// Matching files, sorted by name for reproducible batch order.
    pub fn select(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(name) = name.to_str() {
                if self.pattern.is_match(name) {
                    files.push(entry.path());
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_only_matching_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b-run.tsv", "a-run.tsv", "unrelated.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("sub-run.tsv")).unwrap();

        let selector = FileSelector::new(dir.path(), r".*-run\.tsv$").unwrap();
        let files: Vec<String> = selector
            .select()
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files, vec!["a-run.tsv", "b-run.tsv"]);
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(FileSelector::new(".", "[").is_err());
    }
}
