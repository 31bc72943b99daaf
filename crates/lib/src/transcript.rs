//! Per-connection conversation transcript.
//!
//! Entries accumulate in memory for the life of one connection and are written to
//! `transcript_<YYYYMMDD_HHMMSS>.txt` when it ends. Two saves in the same second overwrite each other.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use std::fmt;
use std::path::{Path, PathBuf};

/// Separator between rendered entries in the transcript file.
const ENTRY_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Interviewer,
    Interviewee,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Interviewer => "Interviewer",
            Role::Interviewee => "Interviewee",
        }
    }
}

/// One line of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
}

impl TranscriptEntry {
    pub fn interviewer(text: impl Into<String>) -> Self {
        Self {
            role: Role::Interviewer,
            text: text.into(),
        }
    }

    pub fn interviewee(text: impl Into<String>) -> Self {
        Self {
            role: Role::Interviewee,
            text: text.into(),
        }
    }
}

impl fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role.as_str(), self.text)
    }
}

/// Ordered entries for one connection.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries joined by a blank line.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(ENTRY_SEPARATOR)
    }

    /// Write the transcript under `dir` (created if missing), named after `now`.
    /// Returns `Ok(None)` without touching the filesystem when there are no entries.
    pub fn save<Tz>(&self, dir: &Path, now: DateTime<Tz>) -> Result<Option<PathBuf>>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        if self.is_empty() {
            return Ok(None);
        }
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating transcripts directory {}", dir.display()))?;
        let path = dir.join(transcript_file_name(&now));
        std::fs::write(&path, self.render())
            .with_context(|| format!("writing transcript to {}", path.display()))?;
        Ok(Some(path))
    }
}

/// `transcript_<YYYYMMDD_HHMMSS>.txt`
pub fn transcript_file_name<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    format!("transcript_{}.txt", now.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, Utc};

    fn two_rounds() -> Transcript {
        let mut t = Transcript::new();
        t.push(TranscriptEntry::interviewer("Tell me about yourself"));
        t.push(TranscriptEntry::interviewee("I build Rust services."));
        t.push(TranscriptEntry::interviewer("Why Rust?"));
        t.push(TranscriptEntry::interviewee("Safety and speed."));
        t
    }

    #[test]
    fn render_joins_entries_with_blank_line() {
        assert_eq!(
            two_rounds().render(),
            "Interviewer: Tell me about yourself\n\nInterviewee: I build Rust services.\n\nInterviewer: Why Rust?\n\nInterviewee: Safety and speed."
        );
    }

    #[test]
    fn file_name_has_second_granularity() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(transcript_file_name(&now), "transcript_20240309_070501.txt");
    }

    #[test]
    fn empty_transcript_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("transcripts");
        let saved = Transcript::new().save(&target, Local::now()).unwrap();
        assert!(saved.is_none());
        assert!(!target.exists());
    }

    #[test]
    fn save_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("transcripts");
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let path = two_rounds().save(&target, now).unwrap().unwrap();
        assert_eq!(path, target.join("transcript_20240102_030405.txt"));
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.split("\n\n").collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Interviewer: "));
        assert!(lines[3].starts_with("Interviewee: "));
    }

    #[test]
    fn same_second_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        two_rounds().save(dir.path(), now).unwrap();
        let mut second = Transcript::new();
        second.push(TranscriptEntry::interviewer("only"));
        let path = second.save(dir.path(), now).unwrap().unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Interviewer: only");
    }

    #[test]
    fn save_reports_unwritable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let err = two_rounds().save(&blocker.join("sub"), Local::now()).unwrap_err();
        assert!(format!("{:#}", err).contains("creating transcripts directory"));
    }
}
