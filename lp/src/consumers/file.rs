//! Append-only file output

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use dispatchq::{TaskError, TaskResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tags::Tags;

use super::{Sink, text_line};

/// Line format of a [`FileConsumer`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Tab-separated guaranteed values, then `key=value` pairs
    #[default]
    Text,
    /// One JSON object per line
    Jsonl,
}

/// Appends every record to a file, flushing after each one
pub struct FileConsumer {
    path: PathBuf,
    format: FileFormat,
    writer: BufWriter<File>,
}

impl FileConsumer {
    /// Open `path` for appending, creating it and its parent directories
    pub fn open(path: impl AsRef<Path>, format: FileFormat) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!(path = %path.display(), ?format, "FileConsumer::open: called");
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            format,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }
}

impl Sink for FileConsumer {
    fn consume(&mut self, tags: &Tags) -> TaskResult {
        match self.format {
            FileFormat::Text => writeln!(self.writer, "{}", text_line(tags))?,
            FileFormat::Jsonl => {
                serde_json::to_writer(&mut self.writer, tags).map_err(|e| TaskError::Other(Box::new(e)))?;
                self.writer.write_all(b"\n")?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(message: &str) -> Tags {
        Tags::new()
            .with("time", Utc::now())
            .with("level", Level::Info)
            .with("message", message)
            .with("user", "bob")
    }

    #[test]
    fn test_text_lines_appended() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        {
            let mut file = FileConsumer::open(&path, FileFormat::Text).unwrap();
            file.consume(&record("first")).unwrap();
        }
        {
            let mut file = FileConsumer::open(&path, FileFormat::Text).unwrap();
            file.consume(&record("second")).unwrap();
        }
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let fields: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(&fields[1..], &["info", "first", "user=bob"]);
        assert!(lines[1].contains("\tsecond\t"));
    }

    #[test]
    fn test_flushed_per_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("live.log");
        let mut file = FileConsumer::open(&path, FileFormat::Text).unwrap();
        file.consume(&record("visible")).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("visible"));
    }

    #[test]
    fn test_jsonl() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("app.jsonl");
        let mut file = FileConsumer::open(&path, FileFormat::Jsonl).unwrap();
        file.consume(&record("one")).unwrap();
        file.consume(&record("two")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let parsed: Vec<serde_json::Value> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["message"], "one");
        assert_eq!(parsed[1]["level"], "info");
        assert_eq!(parsed[1]["user"], "bob");
    }

    #[test]
    fn test_format_deserialize() {
        let format: FileFormat = serde_yaml::from_str("jsonl").unwrap();
        assert_eq!(format, FileFormat::Jsonl);
    }
}
