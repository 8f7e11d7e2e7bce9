//! Storage backends: where entries go besides the in-memory index.
//!
//! The store writes through a backend; the backend decides the medium.
//! Today: nothing (memory only) or a local JSON-lines file.

use crate::entry::KnowledgeEntry;
use aria_core::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Pluggable durable medium. Called with the store's write lock held, so
/// implementations see appends in id order.
pub trait StoreBackend: Send + Sync {
    /// Short label for stats and logs.
    fn name(&self) -> &'static str;

    /// Read back every entry previously appended.
    fn load(&mut self) -> Result<Vec<KnowledgeEntry>>;

    /// Durably record one entry.
    fn append(&mut self, entry: &KnowledgeEntry) -> Result<()>;
}

/// No durable medium. Entries live for the process lifetime.
#[derive(Debug, Default)]
pub struct MemoryBackend;

impl StoreBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&mut self) -> Result<Vec<KnowledgeEntry>> {
        Ok(Vec::new())
    }

    fn append(&mut self, _entry: &KnowledgeEntry) -> Result<()> {
        Ok(())
    }
}

/// One JSON object per line, append-only.
pub struct JsonlBackend {
    path: PathBuf,
    file: File,
}

impl JsonlBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::persistence(None, format!("{}: {e}", path.display())))?;
        let torn = terminate_torn_line(&mut file)
            .map_err(|e| Error::persistence(None, format!("{}: {e}", path.display())))?;
        if torn {
            tracing::warn!(
                "{}: last record was not newline-terminated, closing it off",
                path.display()
            );
        }
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A crash mid-append can leave a final line without its newline. Terminate
/// it so the next record starts on a line of its own. Returns true if the
/// file needed it.
fn terminate_torn_line(file: &mut File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(false);
    }
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(true)
}

impl StoreBackend for JsonlBackend {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn load(&mut self) -> Result<Vec<KnowledgeEntry>> {
        let file = File::open(&self.path)
            .map_err(|e| Error::persistence(None, format!("{}: {e}", self.path.display())))?;
        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line
                .map_err(|e| Error::persistence(None, format!("{}: {e}", self.path.display())))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<KnowledgeEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        "{}:{}: skipping unreadable entry: {}",
                        self.path.display(),
                        lineno + 1,
                        e
                    );
                }
            }
        }
        tracing::debug!(
            "loaded {} entries from {} ({} skipped)",
            entries.len(),
            self.path.display(),
            skipped
        );
        Ok(entries)
    }

    fn append(&mut self, entry: &KnowledgeEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|e| Error::persistence(Some(entry.id), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aria_core::{EntryId, EntryKind, Importance};
    use chrono::Utc;

    fn entry(id: u64) -> KnowledgeEntry {
        KnowledgeEntry {
            id: EntryId(id),
            kind: EntryKind::Conversation,
            content: Default::default(),
            importance: Importance::Medium,
            owner: Some("u1".into()),
            keywords: ["audio".to_string()].into_iter().collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn jsonl_append_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/knowledge.jsonl");
        let mut backend = JsonlBackend::open(&path).unwrap();
        backend.append(&entry(1)).unwrap();
        backend.append(&entry(2)).unwrap();

        let loaded = JsonlBackend::open(&path).unwrap().load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, EntryId(1));
        assert_eq!(loaded[1].owner, Some("u1".into()));
    }

    #[test]
    fn jsonl_load_skips_garbage_and_ignores_unknown_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("knowledge.jsonl");
        std::fs::write(
            &path,
            concat!(
                "not json\n",
                r#"{"id":4,"kind":"preference","importance":"high","created_at":"2026-01-01T00:00:00Z","mood":"new field"}"#,
                "\n"
            ),
        )
        .unwrap();

        let loaded = JsonlBackend::open(&path).unwrap().load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].kind, EntryKind::Preference);
        assert!(loaded[0].owner.is_none());
        assert!(loaded[0].keywords.is_empty());
    }
}
