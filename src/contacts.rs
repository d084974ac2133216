use std::fs;
use std::io;
use std::path::Path;

/// Parse a contact list file: one candidate per non-blank line.
///
/// A line of the form `name, email` becomes `name <email>` (both sides
/// trimmed). A line without a comma is passed through trimmed, on the
/// assumption that it is already a deliverable address. Malformed content
/// never fails; duplicates are preserved as given.
pub fn parse_contacts(path: &Path) -> io::Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    Ok(text.lines().filter_map(parse_line).collect())
}

fn parse_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(match line.split_once(',') {
        Some((name, email)) => format!("{} <{}>", name.trim(), email.trim()),
        None => line.to_string(),
    })
}
