//! Output formatting utilities

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use weather_lib::ForecastRecord;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// Print a forecast as a field/value table or as its published JSON
pub fn print_forecast(record: &ForecastRecord, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(record)?);
        }
        OutputFormat::Table => {
            let rows = vec![
                FieldRow {
                    field: "Next temperature",
                    value: format_temperature(record.temp_pred_next).bold().to_string(),
                },
                FieldRow {
                    field: "Rain probability",
                    value: color_probability(record.rain_prob_next),
                },
                FieldRow {
                    field: "Current temperature",
                    value: format_temperature(record.current_temp),
                },
                FieldRow {
                    field: "Current humidity",
                    value: format!("{:.0}%", record.current_humidity),
                },
                FieldRow {
                    field: "Raining now",
                    value: if record.current_rain != 0 { "yes" } else { "no" }.to_string(),
                },
                FieldRow {
                    field: "Reading time",
                    value: record
                        .source_timestamp_ms
                        .and_then(DateTime::<Utc>::from_timestamp_millis)
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                },
                FieldRow {
                    field: "Generated",
                    value: format_unix(record.generated_at_unix),
                },
            ];
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
        }
    }
    Ok(())
}

/// Format a temperature in degrees Celsius
pub fn format_temperature(celsius: f64) -> String {
    format!("{:.1} °C", celsius)
}

/// Format a probability as percentage
pub fn format_probability(probability: f64) -> String {
    format!("{:.0}%", probability * 100.0)
}

/// Color rain probability based on value
pub fn color_probability(probability: f64) -> String {
    let formatted = format_probability(probability);
    if probability >= 0.7 {
        formatted.blue().bold().to_string()
    } else if probability >= 0.3 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}

/// Format Unix seconds as a UTC timestamp
pub fn format_unix(seconds: i64) -> String {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| seconds.to_string())
}
