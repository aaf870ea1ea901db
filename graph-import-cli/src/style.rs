use std::fmt::Write as _;

use colored::Colorize;
use graph_import::UploadErrorEntry;
use serde_json::Value;

/// Render the service's error listing as indented, colorized JSON.
#[must_use]
pub fn upload_errors(errors: &[UploadErrorEntry]) -> String {
    let listing = Value::Array(errors.iter().map(|e| e.as_json().clone()).collect());
    styled_json(&listing)
}

/// Pretty-print JSON with keys, strings and literals colored.
///
/// With colors disabled the output matches `serde_json::to_string_pretty`.
#[must_use]
pub fn styled_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0);
    out
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::Null => {
            let _ = write!(out, "{}", "null".dimmed());
        }
        Value::Bool(b) => {
            let _ = write!(out, "{}", b.to_string().yellow());
        }
        Value::Number(n) => {
            let _ = write!(out, "{}", n.to_string().yellow());
        }
        Value::String(_) => {
            let _ = write!(out, "{}", value.to_string().green());
        }
        Value::Array(items) if items.is_empty() => out.push_str("[]"),
        Value::Array(items) => {
            out.push_str("[\n");
            for (i, item) in items.iter().enumerate() {
                indent(out, depth + 1);
                write_value(out, item, depth + 1);
                if i + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(out, depth);
            out.push(']');
        }
        Value::Object(map) if map.is_empty() => out.push_str("{}"),
        Value::Object(map) => {
            out.push_str("{\n");
            for (i, (key, item)) in map.iter().enumerate() {
                indent(out, depth + 1);
                let key = Value::String(key.clone()).to_string();
                let _ = write!(out, "{}: ", key.cyan());
                write_value(out, item, depth + 1);
                if i + 1 < map.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(out, depth);
            out.push('}');
        }
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}
