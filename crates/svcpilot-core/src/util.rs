//! Helper-program lookup and log excerpts of helper output.

use std::env;
use std::path::Path;

const DIAGNOSTIC_ENV: &str = "SVCPILOT_DIAGNOSTIC";
const EXCERPT_CHARS: usize = 160;
const DIAGNOSTIC_EXCERPT_CHARS: usize = 512;

#[cfg(windows)]
const EXECUTABLE_SUFFIXES: &[&str] = &["", ".exe", ".cmd", ".bat"];
#[cfg(not(windows))]
const EXECUTABLE_SUFFIXES: &[&str] = &[""];

/// Whether `program` can be launched as given: a path that exists, or a bare
/// name found in one of the `PATH` directories.
pub fn program_in_path(program: &str) -> bool {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file();
    }
    let Some(search) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&search).any(|dir| {
        EXECUTABLE_SUFFIXES
            .iter()
            .any(|suffix| dir.join(format!("{program}{suffix}")).is_file())
    })
}

/// `SVCPILOT_DIAGNOSTIC` widens log excerpts of helper output.
pub fn diagnostic_mode() -> bool {
    is_truthy(env::var(DIAGNOSTIC_ENV).ok().as_deref())
}

fn is_truthy(value: Option<&str>) -> bool {
    value.is_some_and(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

pub fn log_limit() -> usize {
    if diagnostic_mode() {
        DIAGNOSTIC_EXCERPT_CHARS
    } else {
        EXCERPT_CHARS
    }
}

/// One-line excerpt of helper stdout/stderr for a log field.
///
/// Only for logging: errors carry the full output.
pub fn log_snippet(output: &str) -> String {
    excerpt(output, log_limit())
}

fn excerpt(output: &str, max_chars: usize) -> String {
    let mut line = output.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some((cut, _)) = line.char_indices().nth(max_chars) {
        line.truncate(cut);
        line.push_str("...");
    }
    line
}
