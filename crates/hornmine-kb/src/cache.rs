//! Persisted example sets
//!
//! Sampling examples is the most expensive step of a mining run, so the
//! sets are stored and reused: one example per line as
//! `subject<TAB>object`, one file per (predicate, kind, role).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use hornmine_core::{Example, ExampleRole, ExampleSet, Predicate, RuleKind};

use crate::error::{KbError, KbResult};

/// Identifies one persisted example set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExampleKey {
    pub predicate: Predicate,
    pub kind: RuleKind,
    pub role: ExampleRole,
}

impl ExampleKey {
    pub fn new(predicate: impl Into<Predicate>, kind: RuleKind, role: ExampleRole) -> Self {
        Self {
            predicate: predicate.into(),
            kind,
            role,
        }
    }

    /// File stem, e.g. `capitalOf_positive_generation`
    pub fn file_stem(&self) -> String {
        let predicate: String = self
            .predicate
            .as_str()
            .chars()
            .map(|c| if matches!(c, '/' | ':' | '.') { '_' } else { c })
            .collect();
        format!("{}_{}_{}", predicate, self.kind, self.role.suffix())
    }
}

impl std::fmt::Display for ExampleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.file_stem())
    }
}

/// Storage for example sets between runs
#[async_trait]
pub trait ExampleStore: Send + Sync {
    /// The stored set, or `None` if nothing is stored under `key`
    async fn load(&self, key: &ExampleKey) -> KbResult<Option<ExampleSet>>;

    /// Store a set, replacing any previous one
    async fn store(&self, key: &ExampleKey, examples: &ExampleSet) -> KbResult<()>;

    /// Forget a set
    async fn discard(&self, key: &ExampleKey) -> KbResult<()>;
}

/// Parse the line format. Every non-blank line must hold exactly two
/// non-empty tab-separated fields.
pub fn parse_examples(text: &str) -> KbResult<ExampleSet> {
    let mut examples = ExampleSet::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        match fields.as_slice() {
            [subject, object] if !subject.is_empty() && !object.is_empty() => {
                examples.insert(Example::new(*subject, *object));
            }
            _ => {
                return Err(KbError::CacheFormat {
                    line: idx + 1,
                    reason: format!("expected 2 tab-separated fields, found {:?}", line),
                })
            }
        }
    }
    Ok(examples)
}

/// Render examples in the line format
pub fn format_examples(examples: &ExampleSet) -> String {
    let mut out = String::new();
    for example in examples {
        out.push_str(example.subject.as_str());
        out.push('\t');
        out.push_str(example.object.as_str());
        out.push('\n');
    }
    out
}

/// Example sets as text files under a directory
pub struct FileExampleStore {
    dir: PathBuf,
}

impl FileExampleStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`
    pub fn path_for(&self, key: &ExampleKey) -> PathBuf {
        self.dir.join(format!("{}.txt", key.file_stem()))
    }
}

#[async_trait]
impl ExampleStore for FileExampleStore {
    async fn load(&self, key: &ExampleKey) -> KbResult<Option<ExampleSet>> {
        let path = self.path_for(key);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let examples = parse_examples(&text)?;
        tracing::debug!("Loaded {} cached examples from {}", examples.len(), path.display());
        Ok(Some(examples))
    }

    async fn store(&self, key: &ExampleKey, examples: &ExampleSet) -> KbResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        // Write then rename so readers never see a half-written file
        let path = self.path_for(key);
        let tmp = path.with_extension("txt.tmp");
        tokio::fs::write(&tmp, format_examples(examples)).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!("Stored {} examples to {}", examples.len(), path.display());
        Ok(())
    }

    async fn discard(&self, key: &ExampleKey) -> KbResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory example store for testing
#[derive(Default)]
pub struct MemoryExampleStore {
    sets: RwLock<HashMap<ExampleKey, ExampleSet>>,
}

impl MemoryExampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sets
    pub fn len(&self) -> usize {
        self.sets.read().map(|sets| sets.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ExampleStore for MemoryExampleStore {
    async fn load(&self, key: &ExampleKey) -> KbResult<Option<ExampleSet>> {
        let sets = self
            .sets
            .read()
            .map_err(|e| KbError::Database(format!("Lock error: {}", e)))?;
        Ok(sets.get(key).cloned())
    }

    async fn store(&self, key: &ExampleKey, examples: &ExampleSet) -> KbResult<()> {
        let mut sets = self
            .sets
            .write()
            .map_err(|e| KbError::Database(format!("Lock error: {}", e)))?;
        sets.insert(key.clone(), examples.clone());
        Ok(())
    }

    async fn discard(&self, key: &ExampleKey) -> KbResult<()> {
        let mut sets = self
            .sets
            .write()
            .map_err(|e| KbError::Database(format!("Lock error: {}", e)))?;
        sets.remove(key);
        Ok(())
    }
}
