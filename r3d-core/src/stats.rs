//! Per-category summary statistics of SDF scores.
//!
//! Input is a whitespace separated sequence of `<object name> <error>` pairs,
//! as written by the score log. The category of an object is its name with
//! digits and the `.obj` extension removed, so `mug12.obj` and `mug3.obj`
//! both fall under `mug`.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{R3dError, Result};

/// Summary of one set of values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation, 0 for a single value
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    /// `None` for an empty slice
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        };

        let std_dev = if count > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Some(Self {
            count,
            mean,
            median,
            std_dev,
            min: sorted[0],
            max: sorted[count - 1],
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryStats {
    /// Category key derived from object names
    pub key: String,
    pub summary: Summary,
}

impl CategoryStats {
    /// Human readable label for known object categories
    pub fn label(&self) -> String {
        let lower = self.key.to_lowercase();
        if lower.contains("pitcher") {
            "Watering Pitcher".to_string()
        } else if lower.contains("mug") {
            "Mug".to_string()
        } else if lower.contains("can") {
            "Can".to_string()
        } else {
            self.key.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Sorted by category key
    pub categories: Vec<CategoryStats>,
    pub overall: Summary,
}

/// Category key: the name without digits and without `.obj`
pub fn category_of(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_ascii_digit())
        .collect::<String>()
        .replace(".obj", "")
}

pub fn parse_scores(text: &str) -> Result<Vec<(String, f64)>> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() % 2 != 0 {
        return Err(R3dError::InvalidScores(format!(
            "expected name/value pairs, got {} tokens",
            tokens.len()
        )));
    }
    tokens
        .chunks(2)
        .map(|pair| {
            let value = pair[1].parse::<f64>().map_err(|e| {
                R3dError::InvalidScores(format!("bad value '{}' for {}: {e}", pair[1], pair[0]))
            })?;
            Ok((pair[0].to_string(), value))
        })
        .collect()
}

pub fn analyze(scores: &[(String, f64)]) -> Result<Report> {
    let mut by_category: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (name, value) in scores {
        by_category.entry(category_of(name)).or_default().push(*value);
    }

    let categories = by_category
        .into_iter()
        .filter_map(|(key, values)| Summary::of(&values).map(|summary| CategoryStats { key, summary }))
        .collect();

    let all: Vec<f64> = scores.iter().map(|(_, v)| *v).collect();
    let overall = Summary::of(&all)
        .ok_or_else(|| R3dError::InvalidScores("no scores to summarise".to_string()))?;

    Ok(Report {
        categories,
        overall,
    })
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Category Statistics:")?;
        writeln!(f, "{}", "-".repeat(50))?;
        for category in &self.categories {
            let s = &category.summary;
            writeln!(f)?;
            writeln!(f, "{} (n={}):", category.label().to_uppercase(), s.count)?;
            writeln!(f, "  Mean:   {:.4}", s.mean)?;
            writeln!(f, "  Median: {:.4}", s.median)?;
            writeln!(f, "  StdDev: {:.4}", s.std_dev)?;
            writeln!(f, "  Min:    {:.4}", s.min)?;
            writeln!(f, "  Max:    {:.4}", s.max)?;
        }

        let o = &self.overall;
        writeln!(f)?;
        writeln!(f, "{}", "=".repeat(50))?;
        writeln!(f, "OVERALL STATISTICS:")?;
        writeln!(f, "Total samples: {}", o.count)?;
        writeln!(f, "Overall mean:   {:.4}", o.mean)?;
        writeln!(f, "Overall median: {:.4}", o.median)?;
        writeln!(f, "Overall StdDev: {:.4}", o.std_dev)?;
        writeln!(f, "Overall min:    {:.4}", o.min)?;
        write!(f, "Overall max:    {:.4}", o.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCORES: &str = "mug1.obj 0.1\nmug22.obj 0.3\nwatering_pitcher3.obj 0.2\ncan4.obj 0.5\nmug5.obj 0.2\n";

    #[test]
    fn test_category_of() {
        assert_eq!(category_of("mug12.obj"), "mug");
        assert_eq!(category_of("watering_pitcher3.obj"), "watering_pitcher");
        assert_eq!(category_of("kettle"), "kettle");
    }

    #[test]
    fn test_summary() {
        let s = Summary::of(&[1.0, 3.0, 2.0, 4.0]).unwrap();
        assert_eq!(s.count, 4);
        assert_eq!(s.mean, 2.5);
        assert_eq!(s.median, 2.5);
        assert!((s.std_dev - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!((s.min, s.max), (1.0, 4.0));

        let single = Summary::of(&[0.7]).unwrap();
        assert_eq!(single.std_dev, 0.0);
        assert!(Summary::of(&[]).is_none());
    }

    #[test]
    fn test_analyze_groups_and_labels() {
        let report = analyze(&parse_scores(SCORES).unwrap()).unwrap();
        let keys: Vec<&str> = report.categories.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["can", "mug", "watering_pitcher"]);
        let labels: Vec<String> = report.categories.iter().map(|c| c.label()).collect();
        assert_eq!(labels, vec!["Can", "Mug", "Watering Pitcher"]);

        let mug = &report.categories[1].summary;
        assert_eq!(mug.count, 3);
        assert!((mug.mean - 0.2).abs() < 1e-12);
        assert_eq!(mug.median, 0.2);
        assert_eq!(report.overall.count, 5);
        assert_eq!(report.overall.max, 0.5);
    }

    #[test]
    fn test_report_text() {
        let report = analyze(&parse_scores(SCORES).unwrap()).unwrap();
        let text = report.to_string();
        assert!(text.contains("\nMUG (n=3):\n  Mean:   0.2000\n"));
        assert!(text.contains("WATERING PITCHER (n=1):"));
        assert!(text.ends_with("Overall max:    0.5000"));
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(parse_scores("mug1.obj"), Err(R3dError::InvalidScores(_))));
        assert!(matches!(
            parse_scores("mug1.obj abc"),
            Err(R3dError::InvalidScores(_))
        ));
        assert!(matches!(analyze(&[]), Err(R3dError::InvalidScores(_))));
    }
}
