//! Session command history and its persistence to plain text files.

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Lines entered during the session, in order, plus the offset of the first
/// line not yet appended to a history file with `history -a`.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<String>,
    appended: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one input line.
    pub fn push(&mut self, line: impl Into<String>) {
        self.entries.push(line.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of lines already flushed by [`History::append_to`].
    pub fn offset(&self) -> usize {
        self.appended
    }

    /// Consider every current line as already persisted.
    pub fn mark_flushed(&mut self) {
        self.appended = self.entries.len();
    }

    /// Entries paired with their 1-based number; only the last `last` ones
    /// when given.
    pub fn numbered(&self, last: Option<usize>) -> impl Iterator<Item = (usize, &str)> + '_ {
        let skip = last.map_or(0, |n| self.entries.len().saturating_sub(n));
        self.entries
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(i, line)| (i + 1, line.as_str()))
    }

    /// Append the non-empty lines of `path` to the session history.
    ///
    /// Returns how many lines were loaded.
    pub fn read_from(&mut self, path: &Path) -> io::Result<usize> {
        let content = fs::read_to_string(path)?;
        let before = self.entries.len();
        self.entries.extend(
            content
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string),
        );
        Ok(self.entries.len() - before)
    }

    /// Overwrite `path` with the whole session history.
    pub fn write_to(&mut self, path: &Path) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        write_lines(file, &self.entries)?;
        self.mark_flushed();
        Ok(())
    }

    /// Append the lines entered since the last append to `path`, then move
    /// the offset past them.
    pub fn append_to(&mut self, path: &Path) -> io::Result<()> {
        let start = self.appended.min(self.entries.len());
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        write_lines(file, &self.entries[start..])?;
        self.mark_flushed();
        Ok(())
    }
}

fn write_lines(file: fs::File, lines: &[String]) -> io::Result<()> {
    let mut out = BufWriter::new(file);
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env as stdenv;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        stdenv::temp_dir().join(format!(
            "minish_history_{}_{}_{}",
            tag,
            std::process::id(),
            nanos
        ))
    }

    fn history_of(lines: &[&str]) -> History {
        let mut h = History::new();
        for l in lines {
            h.push(*l);
        }
        h
    }

    #[test]
    fn test_numbered_all_and_last() {
        let h = history_of(&["ls", "pwd", "echo hi"]);
        let all: Vec<_> = h.numbered(None).collect();
        assert_eq!(all, vec![(1, "ls"), (2, "pwd"), (3, "echo hi")]);

        let last: Vec<_> = h.numbered(Some(2)).collect();
        assert_eq!(last, vec![(2, "pwd"), (3, "echo hi")]);

        assert_eq!(h.numbered(Some(10)).count(), 3);
        assert_eq!(h.numbered(Some(0)).count(), 0);
    }

    #[test]
    fn test_write_then_read_back() {
        let path = temp_file("rw");
        let mut h = history_of(&["one", "two"]);
        h.write_to(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
        assert_eq!(h.offset(), 2);

        let mut other = history_of(&["zero"]);
        assert_eq!(other.read_from(&path).unwrap(), 2);
        assert_eq!(other.entries(), ["zero", "one", "two"]);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_append_only_writes_new_lines() {
        let path = temp_file("append");
        let mut h = history_of(&["a", "b"]);
        h.append_to(&path).unwrap();
        h.push("c");
        h.append_to(&path).unwrap();
        h.append_to(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\nc\n");
        assert_eq!(h.offset(), 3);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_read_missing_file_is_error() {
        let mut h = History::new();
        assert!(h.read_from(&temp_file("missing")).is_err());
        assert!(h.is_empty());
    }
}
