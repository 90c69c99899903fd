use anyhow::{Context, Result};
use std::path::Path;

/// Parse a numeric series: one or more values per line separated by
/// whitespace or commas; blank lines and `#` comments are skipped.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let out = parse_tokens(text, |token| token.parse::<f64>().ok(), "not f64")?;
    if out.is_empty() {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_f64_series(&text)
}

/// Parse frame indices of detected peaks.
pub fn parse_peak_indices(text: &str) -> Result<Vec<usize>> {
    let mut out = parse_tokens(text, |token| token.parse::<usize>().ok(), "not a frame index")?;
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

pub fn read_peak_indices(path: &Path) -> Result<Vec<usize>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_peak_indices(&text)
}

fn parse_tokens<T>(text: &str, parse: impl Fn(&str) -> Option<T>, what: &str) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        for token in trimmed
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let val = parse(token)
                .with_context(|| format!("line {} value {:?} is {}", idx + 1, token, what))?;
            out.push(val);
        }
    }
    Ok(out)
}
