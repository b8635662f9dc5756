//! Human-readable text output

use crate::task::Outcome;
use std::time::Duration;

/// Results past this count are elided from the console
const MAX_LISTED: usize = 20;

/// Print run results to console
pub fn print_results(outcome: &Outcome, duration: Duration, function: &str) {
    println!("═══════════════════════════════════════════════════════════");
    println!("                    RUN RESULTS");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    println!("Function:     {}", function);
    println!("Elapsed Time: {:.3}s", duration.as_secs_f64());
    println!();

    let resolved = outcome.resolved();
    println!("Tasks:");
    println!("  Resolved:  {}", format_number(resolved as u64));
    println!("  Succeeded: {}", format_number(outcome.results.len() as u64));
    println!("  Failed:    {}", format_number(outcome.errors.len() as u64));
    if resolved > 0 && duration.as_secs_f64() > 0.0 {
        println!("  Rate:      {:.1} tasks/s", resolved as f64 / duration.as_secs_f64());
    }
    println!();

    if !outcome.results.is_empty() {
        println!("Results:");
        for value in outcome.results.iter().take(MAX_LISTED) {
            println!("  {}", value);
        }
        if outcome.results.len() > MAX_LISTED {
            println!("  ... {} more", outcome.results.len() - MAX_LISTED);
        }
        println!();
    }

    if !outcome.errors.is_empty() {
        println!("Failed argument sets:");
        for args in outcome.errors.iter().take(MAX_LISTED) {
            println!("  {}", serde_json::Value::Array(args.clone()));
        }
        if outcome.errors.len() > MAX_LISTED {
            println!("  ... {} more", outcome.errors.len() - MAX_LISTED);
        }
        println!();
    }

    println!("═══════════════════════════════════════════════════════════");
}

/// Format number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
