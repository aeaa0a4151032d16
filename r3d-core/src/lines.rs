/// Sorting the lines of a text file
use std::fs;
use std::path::Path;

use crate::error::{R3dError, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct SortOptions {
    /// Descending order
    pub reverse: bool,
    pub ignore_case: bool,
}

/// Trim each line, drop blank ones and sort the rest
pub fn sort_lines(text: &str, options: SortOptions) -> Vec<String> {
    let mut lines: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    // Equal keys keep their input order
    if options.ignore_case {
        if options.reverse {
            lines.sort_by_cached_key(|line| std::cmp::Reverse(line.to_lowercase()));
        } else {
            lines.sort_by_cached_key(|line| line.to_lowercase());
        }
    } else if options.reverse {
        lines.sort_by(|a, b| b.cmp(a));
    } else {
        lines.sort();
    }
    lines
}

/// Sort `input` into `output`; returns the number of lines written
pub fn sort_file(input: &Path, output: &Path, options: SortOptions) -> Result<usize> {
    let text = fs::read_to_string(input).map_err(R3dError::at(input))?;
    let lines = sort_lines(&text, options);
    let mut out = String::with_capacity(text.len());
    for line in &lines {
        out.push_str(line);
        out.push('\n');
    }
    fs::write(output, out).map_err(R3dError::at(output))?;
    log::info!(
        "sorted {} lines from '{}' to '{}'",
        lines.len(),
        input.display(),
        output.display()
    );
    Ok(lines.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_drops_blank_lines() {
        let lines = sort_lines("  pear\n\napple  \n \nBanana\n", SortOptions::default());
        assert_eq!(lines, vec!["Banana", "apple", "pear"]);
    }

    #[test]
    fn test_ignore_case_and_reverse() {
        let options = SortOptions {
            reverse: true,
            ignore_case: true,
        };
        let lines = sort_lines("pear\napple\nBanana\n", options);
        assert_eq!(lines, vec!["pear", "Banana", "apple"]);
    }

    #[test]
    fn test_sort_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        fs::write(&input, "mug2.obj 0.4\ncan1.obj 0.1\n").unwrap();
        assert_eq!(sort_file(&input, &output, SortOptions::default()).unwrap(), 2);
        assert_eq!(fs::read_to_string(&output).unwrap(), "can1.obj 0.1\nmug2.obj 0.4\n");
    }

    #[test]
    fn test_missing_input_names_path() {
        let err = sort_file(Path::new("/no/such/file"), Path::new("out"), SortOptions::default())
            .unwrap_err();
        assert!(err.to_string().starts_with("/no/such/file"));
    }
}
