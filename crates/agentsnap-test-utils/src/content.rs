//! Generators for line-oriented file bodies.

/// `count` lines of the form `line N`, 1-based, each newline-terminated.
pub fn numbered_lines(count: usize) -> String {
    (1..=count).map(|n| format!("line {n}\n")).collect()
}

/// Like [`numbered_lines`] but with the given 1-based lines replaced.
pub fn numbered_lines_with(count: usize, replacements: &[(usize, &str)]) -> String {
    (1..=count)
        .map(|n| match replacements.iter().find(|(line, _)| *line == n) {
            Some((_, text)) => format!("{text}\n"),
            None => format!("line {n}\n"),
        })
        .collect()
}
