//! Runs every `tests/data/*.lox` script and diffs its stdout against the
//! sibling `.expected` file.

use std::error::Error;
use std::path::Path;

use lox::{CollectStringPrint, CollectingDiagnostics, run_source};

fn run_fixture(path: &Path) -> Result<(), Box<dyn Error>> {
    let source = std::fs::read_to_string(path)?;
    let expected_path = path.with_extension("expected");
    let expected = std::fs::read_to_string(&expected_path)?;

    let mut diagnostics = CollectingDiagnostics::new();
    let mut print = CollectStringPrint::new();
    run_source(&source, &mut diagnostics, &mut print);
    let output = print.into_output();

    if output != expected {
        let diff = similar::TextDiff::from_lines(&expected, &output);
        let mut rendered = String::new();
        for change in diff.iter_all_changes() {
            let sign = match change.tag() {
                similar::ChangeTag::Delete => "-",
                similar::ChangeTag::Insert => "+",
                similar::ChangeTag::Equal => " ",
            };
            rendered.push_str(sign);
            rendered.push_str(&change);
        }
        return Err(format!("{} produced unexpected output:\n{rendered}", path.display()).into());
    }

    Ok(())
}

datatest_stable::harness!(run_fixture, "tests/data", r"^.*\.lox$");
