/// Append-only text log of `<file name> <error>` lines
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{R3dError, Result};

pub struct ScoreLog {
    path: PathBuf,
    names: HashSet<String>,
    /// Whether the file ends without a newline and the next append needs one
    needs_newline: bool,
}

impl ScoreLog {
    /// Open a log, reading the names already scored; a missing file is empty
    pub fn open(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(R3dError::at(path)(e)),
        };
        let names = text
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(str::to_string)
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            names,
            needs_newline: !text.is_empty() && !text.ends_with('\n'),
        })
    }

    /// Whether `name` is the first field of any line
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn append(&mut self, name: &str, error: f64) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(R3dError::at(&self.path))?;
        if self.needs_newline {
            writeln!(file).map_err(R3dError::at(&self.path))?;
            self.needs_newline = false;
        }
        writeln!(file, "{name} {error}").map_err(R3dError::at(&self.path))?;
        self.names.insert(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = ScoreLog::open(&dir.path().join("none.txt")).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn test_contains_matches_whole_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        fs::write(&path, "mug15.obj 0.01\ncan2.obj 0.3").unwrap();
        let mut log = ScoreLog::open(&path).unwrap();
        assert!(log.contains("mug15.obj"));
        assert!(!log.contains("mug1.obj"));

        log.append("mug1.obj", 0.25).unwrap();
        assert!(log.contains("mug1.obj"));
        assert_eq!(log.len(), 3);
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "mug15.obj 0.01\ncan2.obj 0.3\nmug1.obj 0.25\n");
    }
}
