//! Tolerant parsing of model output.
//!
//! Every prompt declares a regex *cascade*: alternative patterns tried in
//! order against each response line.  The first pattern that matches a line
//! contributes that line's captures and the rest of the cascade is skipped
//! for it.  Markdown bold markers are stripped and lines are trimmed before
//! matching, because models decorate freely.

use regex::Regex;

/// Compile a pattern cascade, silently skipping patterns that fail to
/// compile (a bad alternative must not take down the whole cascade).
pub fn cascade(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

/// Scan `response` line by line.  For each line, the first matching pattern
/// contributes its capture groups — or the whole match when the pattern has
/// no groups.  An empty pattern list yields every non-empty line verbatim.
pub fn scan(response: &str, patterns: &[Regex]) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for raw in response.lines() {
        let line = raw.replace("**", "");
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if patterns.is_empty() {
            rows.push(vec![line.to_string()]);
            continue;
        }
        for pattern in patterns {
            if let Some(caps) = pattern.captures(line) {
                let row: Vec<String> = if caps.len() > 1 {
                    (1..caps.len())
                        .map(|i| caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default())
                        .collect()
                } else {
                    vec![caps
                        .get(0)
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default()]
                };
                rows.push(row);
                break;
            }
        }
    }
    rows
}

/// First matching row, if any.
pub fn scan_first(response: &str, patterns: &[Regex]) -> Option<Vec<String>> {
    scan(response, patterns).into_iter().next()
}

/// Last matching row, if any.
pub fn scan_last(response: &str, patterns: &[Regex]) -> Option<Vec<String>> {
    scan(response, patterns).into_iter().last()
}

/// First capture of the first matching row.
pub fn first_capture(response: &str, patterns: &[Regex]) -> Option<String> {
    scan_first(response, patterns).and_then(|row| row.into_iter().next())
}

/// First capture of the last matching row.
pub fn last_capture(response: &str, patterns: &[Regex]) -> Option<String> {
    scan_last(response, patterns).and_then(|row| row.into_iter().next())
}

/// `true` when the response reads as a refusal: any common negative token.
/// The decision prompts (`decide_chat`, `decide_chat_terminate`,
/// `generate_chat_check_repeat`) all share this reading.
pub fn is_negative(response: &str) -> bool {
    ["No", "no", "否", "不"].iter().any(|t| response.contains(t))
}
