// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Plain-text rendering of count results.
//!
//! Column widths adapt to the data; numbers are grouped with thousands
//! separators so the larger dimensions stay readable.

use crate::count::CountResult;

/// Group a decimal string with commas: `1128960` → `"1,128,960"`.
pub fn group_digits(value: impl ToString) -> String {
    let raw = value.to_string();
    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw.as_str()),
    };
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}{}", sign, grouped)
}

/// Render results as an aligned text table.
///
/// ```
/// use std::time::Duration;
/// use latin_rectangles::count::CountResult;
/// use latin_rectangles::format::format_table;
///
/// let results = vec![CountResult {
///     r: 3,
///     n: 4,
///     positive: 12,
///     negative: 12,
///     difference: 0,
///     computation_time: Duration::ZERO,
///     from_cache: false,
/// }];
/// let table = format_table(&results);
/// assert!(table.contains("Positive"));
/// assert!(table.contains("12"));
/// ```
pub fn format_table(results: &[CountResult]) -> String {
    if results.is_empty() {
        return "No results to display.".to_string();
    }

    let headers = ["r", "n", "Positive", "Negative", "Difference", "Cached"];
    let rows: Vec<[String; 6]> = results
        .iter()
        .map(|result| {
            [
                result.r.to_string(),
                result.n.to_string(),
                group_digits(result.positive),
                group_digits(result.negative),
                group_digits(result.difference),
                if result.from_cache { "Yes" } else { "No" }.to_string(),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let header_row: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{:<width$}", h, width = w))
        .collect();
    out.push_str(&header_row.join(" | "));
    out.push('\n');
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&separator.join("-|-"));
    out.push('\n');

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                // Numeric columns align right, labels left.
                if (2..=4).contains(&i) {
                    format!("{:>width$}", cell, width = widths[i])
                } else {
                    format!("{:<width$}", cell, width = widths[i])
                }
            })
            .collect();
        out.push_str(&cells.join(" | "));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample(r: usize, n: usize, positive: u128, negative: u128, cached: bool) -> CountResult {
        CountResult {
            r,
            n,
            positive,
            negative,
            difference: positive as i128 - negative as i128,
            computation_time: Duration::ZERO,
            from_cache: cached,
        }
    }

    #[test]
    fn test_group_digits() {
        assert_eq!(group_digits(0), "0");
        assert_eq!(group_digits(999), "999");
        assert_eq!(group_digits(1000), "1,000");
        assert_eq!(group_digits(1_128_960u128), "1,128,960");
        assert_eq!(group_digits(-276_480i128), "-276,480");
    }

    #[test]
    fn test_empty_results() {
        assert_eq!(format_table(&[]), "No results to display.");
    }

    #[test]
    fn test_table_layout() {
        let results = vec![
            sample(2, 4, 3, 6, false),
            sample(6, 6, 426_240, 702_720, true),
        ];
        let table = format_table(&results);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("r "));
        assert!(lines[1].chars().all(|c| c == '-' || c == '|'));
        assert!(lines[2].contains("No"));
        assert!(lines[3].contains("426,240"));
        assert!(lines[3].contains("-276,480"));
        assert!(lines[3].contains("Yes"));
        // All rows align to the same width.
        assert_eq!(lines[0].len(), lines[1].len());
        assert_eq!(lines[2].len(), lines[3].len());
    }
}
