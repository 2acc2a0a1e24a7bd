//! Output sink for the `print` statement.
//!
//! Mirrors the shape of this crate's diagnostic sink: one trait describing
//! the contract, and a handful of small implementations for production,
//! testing, and suppression.

/// Receives one already-stringified line per `print` statement.
///
/// Each call corresponds to exactly one `print` statement's output,
/// terminated by a single `\n`.
pub trait PrintSink {
    fn print_line(&mut self, line: &str);
}

/// Default `PrintSink`, writing each line to stdout.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintSink for StdPrint {
    fn print_line(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Collects every printed line into a single buffer, newline-separated.
///
/// Useful for tests that assert on a script's full stdout.
#[derive(Debug, Default)]
pub struct CollectStringPrint(String);

impl CollectStringPrint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> &str {
        &self.0
    }

    pub fn into_output(self) -> String {
        self.0
    }
}

impl PrintSink for CollectStringPrint {
    fn print_line(&mut self, line: &str) {
        self.0.push_str(line);
        self.0.push('\n');
    }
}

/// `PrintSink` that discards all output. Useful for benchmarks.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintSink for NoPrint {
    fn print_line(&mut self, _line: &str) {}
}
