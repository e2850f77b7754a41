//! Line-oriented CSV parser.
//!
//! Quote handling is deliberately simple: every `"` toggles the in-quotes
//! state and is dropped from the value, so `""` is not an escape. Lines are
//! split before quote-aware scanning, which means a quoted field cannot span
//! several lines.

use super::{DatasetRow, FieldValue};

/// Columns whose values are coerced to integers.
pub const NUMERIC_COLUMNS: [&str; 2] = ["Follower Count", "Average Likes"];

/// Parse CSV text into rows keyed by the header line's column names.
///
/// Never fails: input without a header line yields no rows.
pub fn parse(text: &str) -> Vec<DatasetRow> {
    parse_with_headers(text).1
}

/// Parse CSV text, returning the header columns alongside the rows.
pub fn parse_with_headers(text: &str) -> (Vec<String>, Vec<DatasetRow>) {
    // spreadsheet exports prefix UTF-8 files with a byte-order mark
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.split('\n');
    let headers: Vec<String> = match lines.next() {
        Some(line) => line.split(',').map(clean_value).collect(),
        None => return (Vec::new(), Vec::new()),
    };

    let rows = lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| build_row(&headers, split_line(line)))
        .collect();

    (headers, rows)
}

fn build_row(headers: &[String], values: Vec<String>) -> DatasetRow {
    let mut values = values.into_iter();
    let fields = headers
        .iter()
        .map(|header| {
            let raw = values.next().map(|v| clean_value(&v)).unwrap_or_default();
            (header.clone(), coerce(header, raw))
        })
        .collect();
    DatasetRow::from_fields(fields)
}

fn coerce(header: &str, value: String) -> FieldValue {
    if is_numeric_column(header) {
        FieldValue::Integer(parse_leading_int(&value))
    } else if value.is_empty() {
        FieldValue::Null
    } else {
        FieldValue::Text(value)
    }
}

pub fn is_numeric_column(header: &str) -> bool {
    NUMERIC_COLUMNS.contains(&header)
}

/// Lenient integer parse: optional sign followed by the leading digits.
/// Anything unparseable becomes 0.
fn parse_leading_int(value: &str) -> i64 {
    let value = value.trim_start();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };

    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());

    match digits[..end].parse::<i64>() {
        Ok(n) if negative => -n,
        Ok(n) => n,
        Err(_) => 0,
    }
}

fn clean_value(value: &str) -> String {
    value.trim().replace('"', "")
}

/// Split one line on commas that are outside double quotes.
pub fn split_line(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => result.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    result.push(current);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_count_matches_non_blank_lines() {
        let text = "name,city\nalice,paris\n\nbob,rome\n   \ncarol,oslo\n";
        let rows = parse(text);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].get("name"), Some(&FieldValue::Text("bob".to_string())));
    }

    #[test]
    fn test_quoted_field_with_comma() {
        assert_eq!(split_line("\"New York, NY\",30"), vec!["New York, NY", "30"]);

        let rows = parse("city,age\n\"New York, NY\",30");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("city"), Some(&FieldValue::Text("New York, NY".to_string())));
        assert_eq!(rows[0].get("age"), Some(&FieldValue::Text("30".to_string())));
    }

    #[test]
    fn test_numeric_columns() {
        let text = "Username,Follower Count,Average Likes\nann,1500,\nben,lots,12abc\n";
        let rows = parse(text);
        assert_eq!(rows[0].get("Follower Count"), Some(&FieldValue::Integer(1500)));
        assert_eq!(rows[0].get("Average Likes"), Some(&FieldValue::Integer(0)));
        assert_eq!(rows[1].get("Follower Count"), Some(&FieldValue::Integer(0)));
        assert_eq!(rows[1].get("Average Likes"), Some(&FieldValue::Integer(12)));
    }

    #[test]
    fn test_missing_trailing_fields_are_null() {
        let rows = parse("a,b,c\n1\n");
        assert_eq!(rows[0].get("a"), Some(&FieldValue::Text("1".to_string())));
        assert_eq!(rows[0].get("b"), Some(&FieldValue::Null));
        assert_eq!(rows[0].get("c"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_empty_values_are_null_and_values_trimmed() {
        let rows = parse("a,b\n  x  ,\r\n");
        assert_eq!(rows[0].get("a"), Some(&FieldValue::Text("x".to_string())));
        assert_eq!(rows[0].get("b"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_quoted_headers_are_cleaned() {
        let (headers, _) = parse_with_headers("\"Full Name\", \"Verified\"\r\nx,y");
        assert_eq!(headers, vec!["Full Name", "Verified"]);
    }

    #[test]
    fn test_byte_order_mark_is_stripped() {
        let (headers, rows) = parse_with_headers("\u{feff}Follower Count,Username\n1500,ann\n");
        assert_eq!(headers, vec!["Follower Count", "Username"]);
        assert_eq!(rows[0].get("Follower Count"), Some(&FieldValue::Integer(1500)));
        assert_eq!(rows[0].get("Username"), Some(&FieldValue::Text("ann".to_string())));
    }

    #[test]
    fn test_doubled_quotes_are_not_an_escape() {
        assert_eq!(split_line("\"say \"\"hi\"\"\",1"), vec!["say hi", "1"]);
    }

    #[test]
    fn test_degenerate_input() {
        assert!(parse("").is_empty());
        assert!(parse("only,a,header").is_empty());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let text = "x,Follower Count\n\"a,b\",10\nc,\n";
        assert_eq!(parse(text), parse(text));
    }

    #[test]
    fn test_parse_leading_int() {
        assert_eq!(parse_leading_int("42"), 42);
        assert_eq!(parse_leading_int("-7k"), -7);
        assert_eq!(parse_leading_int(""), 0);
        assert_eq!(parse_leading_int("1.5M"), 1);
        assert_eq!(parse_leading_int("99999999999999999999999"), 0);
    }
}
