use crate::error::CliError;
use model::{core::value::Value, records::field::FieldSchema};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

/// Fixed-width table with a 1-based row label column.
pub fn print_table(fields: &FieldSchema, rows: &[(usize, Vec<Value>)]) {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|(_, values)| values.iter().map(ToString::to_string).collect())
        .collect();

    let mut widths: Vec<usize> = fields.names().iter().map(String::len).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let label_width = rows
        .last()
        .map_or(1, |(row, _)| (row + 1).to_string().len());

    let header: Vec<String> = fields
        .names()
        .iter()
        .zip(&widths)
        .map(|(name, width)| format!("{name:<width$}"))
        .collect();
    println!("{:>label_width$} | {}", "", header.join(" | "));
    println!(
        "{}-+-{}",
        "-".repeat(label_width),
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-")
    );

    for ((row, _), values) in rows.iter().zip(&cells) {
        let line: Vec<String> = values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{value:<width$}"))
            .collect();
        println!("{:>label_width$} | {}", row + 1, line.join(" | "));
    }
}
