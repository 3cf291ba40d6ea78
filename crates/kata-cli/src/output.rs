//! Output formatting for kata-cli (table, json, csv)

use clap::ValueEnum;
use colored::Colorize;
use kata_client::{ScanItem, ScanState, SubmitResult};
use serde::Serialize;
use std::borrow::Cow;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl OutputFormat {
    /// Parse the value stored in the config file
    pub fn from_config(value: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(value, true).ok()
    }
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg);
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print data in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No scans");
                    }
                } else {
                    let table = Table::new(data).to_string();
                    println!("{}", table);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string())
                );
            }
            OutputFormat::Csv => {
                print_csv(data);
            }
        }
    }

    /// Print a single item in the configured format
    pub fn print_one<T: Tabled + Serialize>(&self, data: &T) {
        match self.format {
            OutputFormat::Table => {
                let table = Table::new([data]).to_string();
                println!("{}", table);
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputFormat::Csv => {
                print_csv(std::slice::from_ref(data));
            }
        }
    }
}

/// Print data as CSV
fn print_csv<T: Tabled>(data: &[T]) {
    for line in csv_lines(data) {
        println!("{}", line);
    }
}

/// CSV header plus one line per row, columns in table order
fn csv_lines<T: Tabled>(data: &[T]) -> Vec<String> {
    if data.is_empty() {
        return Vec::new();
    }

    std::iter::once(csv_line(&T::headers()))
        .chain(data.iter().map(|row| csv_line(&row.fields())))
        .collect()
}

fn csv_line(cells: &[Cow<'_, str>]) -> String {
    cells
        .iter()
        .map(|cell| escape_csv(cell))
        .collect::<Vec<_>>()
        .join(",")
}

/// Escape a value for CSV output
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// =============================================================================
// Display types for commands
// =============================================================================

/// Scan state display for scans and wait commands
#[derive(Debug, Tabled, Serialize)]
pub struct ScanRow {
    #[tabled(rename = "Scan ID")]
    pub scan_id: String,
    #[tabled(rename = "State")]
    pub state: String,
    #[tabled(rename = "Verdict")]
    pub verdict: String,
}

impl From<&ScanItem> for ScanRow {
    fn from(item: &ScanItem) -> Self {
        Self {
            scan_id: item
                .scan_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string()),
            state: if item.state.is_empty() {
                "-".to_string()
            } else {
                item.state
                    .iter()
                    .map(ScanState::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            },
            verdict: verdict(&item.state).to_string(),
        }
    }
}

/// Summarize a state set; a detection outranks every other terminal state
pub fn verdict(states: &[ScanState]) -> &'static str {
    if states.contains(&ScanState::Detect) {
        "malicious"
    } else if states.contains(&ScanState::Error) {
        "error"
    } else if states.contains(&ScanState::Timeout) {
        "timed out"
    } else if states.contains(&ScanState::NotDetected) {
        "clean"
    } else {
        "pending"
    }
}

/// Submission display for submit command
#[derive(Debug, Tabled, Serialize)]
pub struct SubmitRow {
    #[tabled(rename = "Scan ID")]
    pub scan_id: String,
    #[tabled(rename = "HTTP")]
    pub status: u16,
    #[tabled(rename = "Accepted")]
    pub ok: bool,
    #[tabled(rename = "Message")]
    pub message: String,
}

impl From<&SubmitResult> for SubmitRow {
    fn from(result: &SubmitResult) -> Self {
        Self {
            scan_id: result.scan_id.to_string(),
            status: result.status,
            ok: result.ok,
            message: result.message.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kata_client::ScanId;

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_columns_follow_table_order() {
        let row = SubmitRow {
            scan_id: "007".to_string(),
            status: 200,
            ok: true,
            message: "OK, queued".to_string(),
        };
        assert_eq!(
            csv_lines(std::slice::from_ref(&row)),
            vec![
                "Scan ID,HTTP,Accepted,Message".to_string(),
                "007,200,true,\"OK, queued\"".to_string(),
            ]
        );
        assert!(csv_lines::<ScanRow>(&[]).is_empty());
    }

    #[test]
    fn test_verdict() {
        assert_eq!(verdict(&[ScanState::Processing]), "pending");
        assert_eq!(verdict(&[]), "pending");
        assert_eq!(verdict(&[ScanState::NotDetected]), "clean");
        assert_eq!(
            verdict(&[ScanState::NotDetected, ScanState::Detect]),
            "malicious"
        );
        assert_eq!(verdict(&[ScanState::Processing, ScanState::Timeout]), "timed out");
    }

    #[test]
    fn test_scan_row() {
        let row = ScanRow::from(&ScanItem {
            scan_id: Some(ScanId::Integer(7)),
            state: vec![ScanState::Processing, ScanState::Error],
        });
        assert_eq!(row.scan_id, "7");
        assert_eq!(row.state, "processing, error");
        assert_eq!(row.verdict, "error");

        let row = ScanRow::from(&ScanItem {
            scan_id: None,
            state: vec![],
        });
        assert_eq!(row.scan_id, "-");
        assert_eq!(row.state, "-");
    }

    #[test]
    fn test_output_format_from_config() {
        assert_eq!(OutputFormat::from_config("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_config("CSV"), Some(OutputFormat::Csv));
        assert_eq!(OutputFormat::from_config("yaml"), None);
    }
}
