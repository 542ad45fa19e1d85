//! Terminal rendering of a finished run

use colored::Colorize;
use vmforge_core::ResourceState;
use vmforge_provision::RunReport;

/// Print one line per resource plus the summary.
///
/// Failures show their classification and the provider message; partial
/// completion is always visible, never collapsed into a single error.
pub fn render(report: &RunReport) {
    println!();
    for result in &report.results {
        let name = result.name.cyan();
        match result.state {
            ResourceState::Created => {
                println!("  {} {} {}", "✓".green(), result.kind, name);
            }
            ResourceState::AlreadyExists => {
                println!(
                    "  {} {} {} {}",
                    "ℹ".blue(),
                    result.kind,
                    name,
                    "(already exists)".dimmed()
                );
            }
            ResourceState::Skipped => {
                println!(
                    "  {} {} {} {}",
                    "→".yellow(),
                    result.kind,
                    name,
                    "(dry run, creation withheld)".dimmed()
                );
            }
            ResourceState::Failed => {
                let (classification, message) = match &result.failure {
                    Some(failure) => (failure.kind.to_string(), failure.message.as_str()),
                    None => ("failed".to_string(), ""),
                };
                println!(
                    "  {} {} {} — {}: {}",
                    "✗".red(),
                    result.kind,
                    name,
                    classification.red(),
                    message
                );
            }
            ResourceState::Cancelled => {
                println!("  {} {} {} {}", "⏸".yellow(), result.kind, name, "(cancelled)".dimmed());
            }
            ResourceState::Pending | ResourceState::Creating => {
                println!("  {} {} {}", "?".dimmed(), result.kind, name);
            }
        }
    }

    println!();
    println!("{}", report.summary().to_string().bold());
}
