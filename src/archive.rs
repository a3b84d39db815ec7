// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Append-only JSONL archive of analysis reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::pipeline::AnalysisReport;
use crate::Result;

/// One analyzed document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedReport {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source: PathBuf,
    pub content_hash: String,
    pub report: AnalysisReport,
}

impl ArchivedReport {
    pub fn new(source: PathBuf, content_hash: String, report: AnalysisReport) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            source,
            content_hash,
            report,
        }
    }
}

/// Report archive backed by a JSONL file
pub struct ReportArchive {
    path: PathBuf,
}

impl ReportArchive {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append an entry to the archive
    pub fn append(&self, entry: &ArchivedReport) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }

    /// Read all archived reports, oldest first
    pub fn read_all(&self) -> Result<Vec<ArchivedReport>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);

        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!("Failed to parse archived report: {}", e);
                }
            }
        }

        Ok(entries)
    }

    /// Get the most recent N entries (newest first)
    pub fn get_recent(&self, count: usize) -> Result<Vec<ArchivedReport>> {
        let mut entries = self.read_all()?;
        entries.reverse();
        entries.truncate(count);
        Ok(entries)
    }

    /// Remove the archive file
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{DocumentType, Source};

    fn report(anomaly: &str) -> AnalysisReport {
        AnalysisReport {
            entities: vec![],
            doc_type: DocumentType::Invoice,
            anomalies: vec![anomaly.to_string()],
            classification_source: Source::Fallback,
            anomaly_source: Source::Fallback,
        }
    }

    #[test]
    fn test_append_and_recent() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ReportArchive::new(dir.path().join("reports.jsonl"));
        assert!(archive.read_all().unwrap().is_empty());

        for name in ["first", "second", "third"] {
            let entry = ArchivedReport::new(PathBuf::from(format!("{}.txt", name)), "hash".into(), report(name));
            archive.append(&entry).unwrap();
        }

        let recent = archive.get_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].report.anomalies, vec!["third"]);
        assert_eq!(recent[1].source, PathBuf::from("second.txt"));
        assert_ne!(recent[0].id, recent[1].id);
    }

    #[test]
    fn test_corrupt_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.jsonl");
        let archive = ReportArchive::new(path.clone());

        archive
            .append(&ArchivedReport::new(PathBuf::from("a.txt"), "h".into(), report("kept")))
            .unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{ truncated").unwrap();
        writeln!(file).unwrap();

        let entries = archive.read_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].report.anomalies, vec!["kept"]);
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ReportArchive::new(dir.path().join("reports.jsonl"));
        archive.clear().unwrap();

        archive
            .append(&ArchivedReport::new(PathBuf::from("a.txt"), "h".into(), report("x")))
            .unwrap();
        assert!(archive.path().exists());
        archive.clear().unwrap();
        assert!(!archive.path().exists());
    }
}
