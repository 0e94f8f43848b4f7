use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::answers::{AnswerValue, ResponseData};

/// Errors raised by draft storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("draft storage i/o failed for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("draft storage is unavailable: {0}")]
    Unavailable(String),
}

/// Raw key/value storage that survives reloads (browser local storage, a
/// directory on disk, or memory in tests).
pub trait DraftStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-local storage, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory storage lock poisoned".into()))
    }
}

impl DraftStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name = key
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                    ch
                } else {
                    '_'
                }
            })
            .collect::<String>();
        self.root.join(format!("{}.json", file_name))
    }
}

fn io_error(key: &str, source: io::Error) -> StoreError {
    StoreError::Io {
        key: key.to_string(),
        source,
    }
}

impl DraftStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(key, err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(|err| io_error(key, err))?;
        fs::write(self.path_for(key), value).map_err(|err| io_error(key, err))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(key, err)),
        }
    }
}

/// Storage key holding the draft answers of a survey.
pub fn draft_key(survey_id: &str) -> String {
    format!("formbricks-{}-responses", survey_id)
}

/// Draft answers cache keyed by survey id.
///
/// None of the operations fail: storage errors are logged, and unreadable
/// drafts read as absent.
#[derive(Clone)]
pub struct DraftStore {
    storage: Arc<dyn DraftStorage>,
}

impl std::fmt::Debug for DraftStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftStore").finish_non_exhaustive()
    }
}

impl DraftStore {
    pub fn new(storage: Arc<dyn DraftStorage>) -> Self {
        Self { storage }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Merges `answers` into the stored draft.
    pub fn store(&self, survey_id: &str, answers: &ResponseData) {
        let mut merged = self.get_all(survey_id).unwrap_or_default();
        merged.extend(answers.iter().map(|(id, value)| (id.clone(), value.clone())));
        let key = draft_key(survey_id);
        let encoded = match serde_json::to_string(&merged) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::warn!(survey_id, error = %err, "failed to encode draft answers");
                return;
            }
        };
        if let Err(err) = self.storage.set(&key, &encoded) {
            tracing::warn!(survey_id, error = %err, "failed to persist draft answers");
        }
    }

    pub fn get_all(&self, survey_id: &str) -> Option<ResponseData> {
        let key = draft_key(survey_id);
        let raw = match self.storage.get(&key) {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(survey_id, error = %err, "failed to read draft answers");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(answers) => Some(answers),
            Err(err) => {
                tracing::warn!(survey_id, error = %err, "ignoring corrupt draft answers");
                None
            }
        }
    }

    pub fn get_one(&self, survey_id: &str, question_id: &str) -> Option<AnswerValue> {
        self.get_all(survey_id)?.remove(question_id)
    }

    pub fn clear(&self, survey_id: &str) {
        if let Err(err) = self.storage.remove(&draft_key(survey_id)) {
            tracing::warn!(survey_id, error = %err, "failed to clear draft answers");
        }
    }
}
