//! JSON output formatting
//!
//! A run is written as one document:
//! - Run info (mode, function, worker count, elapsed time)
//! - Summary counts
//! - Results in arrival order
//! - Argument lists of failed tasks

use crate::task::{ErrorRecord, Outcome};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        let micros = d.as_micros() as u64;
        let human = if micros < 1_000 {
            format!("{}µs", micros)
        } else if micros < 1_000_000 {
            format!("{:.2}ms", micros as f64 / 1_000.0)
        } else {
            format!("{:.2}s", micros as f64 / 1_000_000.0)
        };
        Self { micros, human }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRunInfo {
    pub mode: String,
    pub function: String,
    pub workers: usize,
    pub elapsed: JsonDuration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSummary {
    pub resolved: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Top-level output document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRunOutput {
    pub version: String,
    pub run: JsonRunInfo,
    pub summary: JsonSummary,
    pub results: Vec<Value>,
    pub errors: Vec<ErrorRecord>,
}

impl JsonRunOutput {
    pub fn new(run: JsonRunInfo, outcome: &Outcome) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            run,
            summary: JsonSummary {
                resolved: outcome.resolved(),
                succeeded: outcome.results.len(),
                failed: outcome.errors.len(),
            },
            results: outcome.results.clone(),
            errors: outcome.errors.clone(),
        }
    }
}

/// Write JSON output to file
pub fn write_json_output(output_path: &Path, output: &JsonRunOutput, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create output file: {}", output_path.display()))?;

    if pretty {
        serde_json::to_writer_pretty(file, output)?;
    } else {
        serde_json::to_writer(file, output)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> JsonRunOutput {
        let outcome = Outcome {
            results: vec![json!(3), json!(7)],
            errors: vec![vec![json!("x")]],
        };
        let run = JsonRunInfo {
            mode: "local".to_string(),
            function: "add".to_string(),
            workers: 2,
            elapsed: JsonDuration::from_duration(Duration::from_millis(1500)),
        };
        JsonRunOutput::new(run, &outcome)
    }

    #[test]
    fn test_json_duration() {
        assert_eq!(JsonDuration::from_duration(Duration::from_micros(12)).human, "12µs");
        assert_eq!(JsonDuration::from_duration(Duration::from_micros(2500)).human, "2.50ms");
        assert_eq!(JsonDuration::from_duration(Duration::from_millis(1500)).human, "1.50s");
    }

    #[test]
    fn test_summary_counts() {
        let output = sample();
        assert_eq!(output.summary.resolved, 3);
        assert_eq!(output.summary.succeeded, 2);
        assert_eq!(output.summary.failed, 1);
    }

    #[test]
    fn test_write_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        write_json_output(&path, &sample(), true).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: JsonRunOutput = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed, sample());
        assert_eq!(parsed.errors, vec![vec![json!("x")]]);
    }
}
