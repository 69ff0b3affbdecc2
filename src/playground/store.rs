//! Test store — completed playground tests keyed by id.
//!
//! Always held in memory. When opened on a directory, every test is also
//! written to `{dir}/{id}.json` and the directory is reloaded on open, so
//! results and ratings survive a restart.
//!
//! Memory is updated first; the file write happens after the map lock is
//! released, so a failing disk never loses a test or blocks readers.
//! Rating a model rewrites the whole test file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::llm::GenerationParams;

use super::types::{Rating, TestOutcome, TestRequest};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("test not found: {0}")]
    TestNotFound(Uuid),
    #[error("model {model} is not part of test {test_id}")]
    ModelNotFound { test_id: Uuid, model: String },
    #[error("model {0} failed and cannot be rated")]
    FailedResult(String),
    #[error("store I/O error: {0}")]
    Io(String),
}

/// One completed playground run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTest {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub prompt_text: String,
    pub parameters: GenerationParams,
    pub outcome: TestOutcome,
}

impl StoredTest {
    pub fn new(request: &TestRequest, outcome: TestOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            prompt_text: request.prompt_text.clone(),
            parameters: request.parameters,
            outcome,
        }
    }
}

#[derive(Clone, Default)]
pub struct TestStore {
    tests: Arc<RwLock<HashMap<Uuid, StoredTest>>>,
    /// `None` = memory only.
    dir: Option<PathBuf>,
    /// Held across each file write so files land in update order.
    writes: Arc<Mutex<()>>,
}

impl TestStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open (creating if needed) a persistent store and load every test in it.
    ///
    /// Unreadable or malformed files are skipped with a warning.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)
            .map_err(|e| StoreError::Io(format!("cannot create {}: {e}", dir.display())))?;

        let entries = fs::read_dir(dir)
            .map_err(|e| StoreError::Io(format!("cannot read {}: {e}", dir.display())))?;

        let mut tests = HashMap::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_test(&path) {
                Ok(test) => {
                    tests.insert(test.id, test);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable test file"),
            }
        }

        info!(dir = %dir.display(), tests = tests.len(), "test store opened");
        Ok(Self {
            tests: Arc::new(RwLock::new(tests)),
            dir: Some(dir.to_path_buf()),
            writes: Arc::default(),
        })
    }

    pub fn is_persistent(&self) -> bool {
        self.dir.is_some()
    }

    pub async fn len(&self) -> usize {
        self.tests.read().await.len()
    }

    /// Store `test`. An `Err` means only the file write failed; the test is
    /// in memory either way.
    pub async fn insert(&self, test: StoredTest) -> Result<(), StoreError> {
        let _writing = self.writes.lock().await;
        self.tests.write().await.insert(test.id, test.clone());
        debug!(test_id = %test.id, "test stored");
        self.persist(&test).await
    }

    pub async fn get(&self, id: Uuid) -> Option<StoredTest> {
        self.tests.read().await.get(&id).cloned()
    }

    /// Attach `rating` to every successful result for `model` in test `id`.
    ///
    /// Returns the updated test. An existing rating is overwritten. A failed
    /// file write is logged; the rating still holds in memory.
    pub async fn attach_rating(
        &self,
        id: Uuid,
        model: &str,
        rating: Rating,
        at: DateTime<Utc>,
    ) -> Result<StoredTest, StoreError> {
        let _writing = self.writes.lock().await;
        let updated = {
            let mut tests = self.tests.write().await;
            let current = tests.get(&id).ok_or(StoreError::TestNotFound(id))?;

            let mut updated = current.clone();
            let mut matched = false;
            let mut rated = 0usize;
            for r in updated.outcome.results.iter_mut().filter(|r| r.model == model) {
                matched = true;
                if r.is_success() {
                    r.attach_rating(rating, at);
                    rated += 1;
                }
            }
            if !matched {
                return Err(StoreError::ModelNotFound { test_id: id, model: model.to_string() });
            }
            if rated == 0 {
                return Err(StoreError::FailedResult(model.to_string()));
            }
            tests.insert(id, updated.clone());
            updated
        };
        debug!(test_id = %id, model, rating = rating.value(), "rating attached");

        if let Err(e) = self.persist(&updated).await {
            warn!(test_id = %id, error = %e, "rating kept in memory only");
        }
        Ok(updated)
    }

    async fn persist(&self, test: &StoredTest) -> Result<(), StoreError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let path = dir.join(format!("{}.json", test.id));
        let data = serde_json::to_string_pretty(test)
            .map_err(|e| StoreError::Io(format!("serialise test {}: {e}", test.id)))?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| StoreError::Io(format!("cannot write {}: {e}", path.display())))
    }
}

fn read_test(path: &Path) -> Result<StoredTest, StoreError> {
    let data = fs::read_to_string(path)
        .map_err(|e| StoreError::Io(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&data)
        .map_err(|e| StoreError::Io(format!("malformed {}: {e}", path.display())))
}
