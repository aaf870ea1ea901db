//! Shared output formatting for import summaries.
//!
//! Provides JSON and plain-text formatters for `ImportSummary`.
//! Color/terminal formatting is left to the CLI layer.

use std::io::Write;

use crate::report::ImportSummary;

/// Format an `ImportSummary` as JSON to a writer.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json(summary: &ImportSummary, writer: &mut dyn Write) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    writeln!(writer, "{json}")?;
    Ok(())
}

/// Format an `ImportSummary` as human-readable plain text to a writer.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human(summary: &ImportSummary, writer: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{}", "=".repeat(60))?;
    writeln!(writer, "  IMPORT SUMMARY ({})", summary.project_id)?;
    writeln!(writer, "{}", "=".repeat(60))?;
    writeln!(writer, "  Files validated:     {}", summary.validated_files)?;
    writeln!(writer, "  Nodes uploaded:      {}", summary.uploaded.nodes)?;
    writeln!(writer, "  Lists uploaded:      {}", summary.uploaded.lists)?;
    writeln!(writer, "  Relations uploaded:  {}", summary.uploaded.relations)?;
    writeln!(writer, "{}", "-".repeat(60))?;
    for timing in &summary.phases {
        writeln!(
            writer,
            "  {:<20} {}ms",
            timing.phase.label(),
            timing.elapsed_ms
        )?;
    }
    writeln!(writer, "{}", "=".repeat(60))?;
    writeln!(
        writer,
        "\u{2713} Imported {} file(s) in {}ms",
        summary.uploaded_files(),
        summary.total_ms()
    )?;
    Ok(())
}
