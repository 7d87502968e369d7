use serde::Serialize;
use serde_json::Value;
use std::io::{self, Write};

#[derive(clap::Args, Clone, Debug, Default)]
pub struct Output {
    /// How to format CLI output
    #[clap(global = true, short, long, value_enum)]
    pub output: Option<OutputType>,
}

#[derive(clap::ValueEnum, Debug, Copy, Clone, PartialEq)]
pub enum OutputType {
    /// Format output as compact JSON with items separated by newlines
    Json,
    /// Format output as YAML
    Yaml,
    /// Format the output as a pretty-printed table
    Table,
}

/// A trait for rows which can be output from the CLI as either JSON, YAML, or a table.
/// JSON and YAML are handled by `Serialize`, so the body of this trait is focused on tables.
pub trait CliOutput: Serialize {
    /// The type output from `into_table_row`, commonly `String` or `JsonCell`.
    type CellValue: Into<comfy_table::Cell>;

    /// Returns the column headers of the table.
    fn table_headers() -> Vec<&'static str>;

    /// Converts this item into a tabular representation. The returned cells
    /// must be in the same order as the `table_headers`.
    fn into_table_row(self) -> Vec<Self::CellValue>;
}

pub fn print_yaml(items: impl IntoIterator<Item = impl CliOutput>) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    for item in items {
        serde_yaml::to_writer(&mut stdout, &item)?;
        stdout.write_all(b"\n")?;
    }
    Ok(())
}

pub fn print_json(items: impl IntoIterator<Item = impl CliOutput>) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    for item in items {
        serde_json::to_writer(&mut stdout, &item)?;
        stdout.write_all(b"\n")?;
    }
    Ok(())
}

pub fn print_table<T: CliOutput>(items: impl IntoIterator<Item = T>) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    let mut table = crate::new_table(T::table_headers());

    for item in items {
        table.add_row(item.into_table_row());
    }

    for line in table.lines() {
        stdout.write_all(line.as_bytes())?;
        stdout.write_all(b"\n")?;
    }
    Ok(())
}

/// Converts an item implementing `Serialize` into a table row by extracting values
/// using the given list of JSON `pointers`.
pub fn to_table_row<T: Serialize>(value: T, pointers: &[&str]) -> Vec<JsonCell> {
    let mut json = serde_json::to_value(value).unwrap_or_default();

    pointers
        .iter()
        .map(|column| JsonCell(json.pointer_mut(column).map(Value::take)))
        .collect()
}

/// A wrapper around an `Option<Value>` to allow it to be converted into a table cell.
pub struct JsonCell(pub Option<Value>);

impl From<JsonCell> for comfy_table::Cell {
    fn from(cell: JsonCell) -> Self {
        match cell.0 {
            None | Some(Value::Null) => comfy_table::Cell::new(String::new()),
            Some(Value::String(s)) => comfy_table::Cell::new(s),
            Some(other) => comfy_table::Cell::new(other),
        }
    }
}
