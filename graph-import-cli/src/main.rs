// These Clippy lints are disabled because this is a CLI binary, not a library:
// - print_stdout/print_stderr: CLI tools are expected to print to stdout/stderr for user output.
// - exit: Calling `std::process::exit()` is standard for CLI apps to signal failure to the shell.
// - unwrap_used/expect_used: In a CLI binary, panicking on unrecoverable errors is acceptable.
#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::exit,
    clippy::unwrap_used,
    clippy::expect_used
)]

use std::io::IsTerminal;

use graph_import::ImportError;

mod cli;
mod logging;
mod progress;
mod style;

#[tokio::main]
async fn main() {
    if !std::io::stderr().is_terminal() {
        colored::control::set_override(false);
    }

    if let Err(e) = cli::run().await {
        if let Some(ImportError::Upload { errors, .. }) = e.downcast_ref::<ImportError>() {
            eprintln!("Error: {e}");
            eprintln!("{}", style::upload_errors(errors));
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(1);
    }
}
