//! System prompt construction.
//!
//! The data section is bounded by a character budget (a rough proxy for
//! model tokens). When the serialized dataset does not fit, only the longest
//! whole-row prefix that fits is included and the prompt says so.

use crate::dataset::{Dataset, DatasetRow};

const PREAMBLE: &str = "You are an AI assistant that helps users analyze and query a tabular dataset.";

const INSTRUCTIONS: &str = "INSTRUCTIONS:
1. ONLY answer questions related to this dataset
2. If asked about anything unrelated to the dataset, politely decline and redirect to dataset-related topics
3. Provide specific data-driven answers when possible, quoting values from the rows above
4. You can perform analysis, comparisons and aggregations, and provide insights about the entries
5. If only part of the dataset is shown, say so instead of guessing about rows you cannot see

If a question is not related to the dataset, respond with: \"I can only help with questions about the dataset. Please ask me about its entries, columns or statistics.\"";

/// A rendered system prompt and what it contains
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    pub text: String,
    pub total_rows: usize,
    pub included_rows: usize,
}

impl SystemPrompt {
    pub fn is_truncated(&self) -> bool {
        self.included_rows < self.total_rows
    }
}

/// Serialize one row as `col: value` pairs.
pub fn serialize_row(row: &DatasetRow) -> String {
    row.iter()
        .map(|(column, value)| format!("{}: {}", column, value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Serialize the longest row prefix whose text fits in `max_chars`.
/// Returns the data section and the number of rows it holds.
fn serialize_rows(rows: &[DatasetRow], max_chars: usize) -> (String, usize) {
    let mut data = String::new();
    let mut included = 0;

    for row in rows {
        let line = serialize_row(row);
        let separator = if included == 0 { 0 } else { 1 };
        if data.len() + separator + line.len() > max_chars {
            break;
        }
        if separator == 1 {
            data.push('\n');
        }
        data.push_str(&line);
        included += 1;
    }

    (data, included)
}

pub fn build_system_prompt(dataset: &Dataset, max_data_chars: usize) -> SystemPrompt {
    let total_rows = dataset.len();
    let (data, included_rows) = serialize_rows(dataset.rows(), max_data_chars);

    let mut text = format!(
        "{} You have access to a dataset containing {} entries with the following columns:\n\nDATASET SCHEMA:\n",
        PREAMBLE, total_rows
    );

    if dataset.columns().is_empty() {
        text.push_str("(no columns available)\n");
    } else {
        for column in dataset.columns() {
            text.push_str(&format!("- {}\n", column));
        }
    }

    text.push_str(&format!("\nDATASET ({} rows):\n", included_rows));
    if included_rows < total_rows {
        text.push_str(&format!(
            "NOTE: Showing the first {} of {} rows. The remaining {} rows were left out to fit the context window, so this data is incomplete; do not claim otherwise.\n",
            included_rows,
            total_rows,
            total_rows - included_rows
        ));
    }
    if data.is_empty() {
        text.push_str("(no rows available)\n");
    } else {
        text.push_str(&data);
        text.push('\n');
    }

    text.push('\n');
    text.push_str(INSTRUCTIONS);

    SystemPrompt {
        text,
        total_rows,
        included_rows,
    }
}
