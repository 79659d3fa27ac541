pub mod payload_loader;

use std::fs::File;
use std::io;
use std::io::BufRead;
use std::path::Path;

/// Reads a file line-by-line, returning all non-empty trimmed lines.
/// Fails on the first unreadable line.
pub fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    let file = File::open(path)?;
    let reader = io::BufReader::new(file);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
    Ok(lines)
}
