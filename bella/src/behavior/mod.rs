//! Persona configuration: which system prompt the bot uses for whom.
//!
//! The configuration is a single document (see [`BehaviorConfig`]) loaded once at start-up and
//! rewritten in full after every change.

mod model;
mod resolver;
mod storage;

pub use self::{
    model::{Assignments, BehaviorConfig, Persona, DEFAULT_PERSONA_ID},
    resolver::{resolve_system_instruction, select_persona},
    storage::{BehaviorStorage, JsonFile, MemoryStorage},
};

use self::model::StoredDocument;
use std::{path::PathBuf, sync::Arc};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to write behavior config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize behavior config: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Shared, persisted persona configuration.
///
/// Readers clone an `Arc` of the current configuration and never wait on storage. Mutations are
/// serialized by `write_lock`: each one edits a copy, swaps it in, then writes the document. When
/// a write fails the error is returned and the in-memory change is kept; the next successful write
/// persists it.
pub struct BehaviorStore {
    storage: Box<dyn BehaviorStorage>,
    config: RwLock<Arc<BehaviorConfig>>,
    write_lock: Mutex<()>,
}

impl BehaviorStore {
    /// Opens the JSON document at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::load(JsonFile::new(path)).await
    }

    /// Loads the configuration from `storage`.
    ///
    /// * A missing document is created with the defaults.
    /// * A document in the old three slot format is migrated and written back.
    /// * An unreadable or unparsable document is logged and replaced in memory by the defaults.
    ///   It stays on disk until the first change overwrites it.
    pub async fn load(storage: impl BehaviorStorage + 'static) -> StoreResult<Self> {
        let store = Self {
            storage: Box::new(storage),
            config: RwLock::new(Arc::default()),
            write_lock: Mutex::new(()),
        };

        match store.storage.read().await {
            Ok(Some(bytes)) => match StoredDocument::parse(&bytes) {
                Ok(document) => store.apply(document).await?,
                Err(err) => error!("Error parsing behavior config, starting fresh: {}", err),
            },
            Ok(None) => {
                info!("No behavior config found, creating one.");
                store.persist(&BehaviorConfig::default()).await?;
            }
            Err(err) => error!("Error reading behavior config, starting fresh: {}", err),
        }

        Ok(store)
    }

    /// Re-reads the document to pick up changes made by another process. A missing or broken
    /// document leaves the current configuration in place.
    pub async fn reload(&self) -> StoreResult<()> {
        match self.storage.read().await {
            Ok(Some(bytes)) => match StoredDocument::parse(&bytes) {
                Ok(document) => self.apply(document).await?,
                Err(err) => warn!("Ignoring unparsable behavior config: {}", err),
            },
            Ok(None) => warn!("Behavior config disappeared, keeping the loaded one."),
            Err(err) => warn!("Error re-reading behavior config: {}", err),
        }
        Ok(())
    }

    async fn apply(&self, document: StoredDocument) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let migrate = document.is_legacy();
        let config = Arc::new(document.into_config());
        self.swap(config.clone()).await;
        if migrate {
            info!("Migrating legacy behaviors...");
            self.persist(&config).await?;
        }
        Ok(())
    }

    async fn swap(&self, config: Arc<BehaviorConfig>) {
        *self.config.write().await = config;
    }

    async fn snapshot(&self) -> Arc<BehaviorConfig> {
        self.config.read().await.clone()
    }

    async fn persist(&self, config: &BehaviorConfig) -> StoreResult<()> {
        let document = model::to_document(config)?;
        self.storage.write(&document).await?;
        Ok(())
    }

    /// Applies `mutation` to a copy of the configuration. If it reports a change the copy
    /// becomes current and the document is written.
    async fn mutate<F>(&self, mutation: F) -> StoreResult<()>
    where
        F: FnOnce(&mut BehaviorConfig) -> bool,
    {
        let _guard = self.write_lock.lock().await;
        let mut config = BehaviorConfig::clone(&*self.snapshot().await);
        if !mutation(&mut config) {
            return Ok(());
        }
        let config = Arc::new(config);
        self.swap(config.clone()).await;
        self.persist(&config).await
    }

    /// A snapshot of the whole configuration.
    pub async fn full_config(&self) -> BehaviorConfig {
        BehaviorConfig::clone(&*self.snapshot().await)
    }

    pub async fn upsert_persona(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        prompt: impl Into<String>,
    ) -> StoreResult<()> {
        let (id, persona) = (id.into(), Persona::new(name, prompt));
        self.mutate(move |config| {
            config.personas.insert(id, persona);
            true
        })
        .await
    }

    /// Removes a persona. Assignments that point at it are left alone.
    pub async fn delete_persona(&self, id: &str) -> StoreResult<()> {
        self.mutate(|config| config.personas.remove(id).is_some())
            .await
    }

    /// Assigns a persona to a user. `None` or an empty ID removes the assignment.
    pub async fn assign_user(&self, user_id: &str, persona_id: Option<&str>) -> StoreResult<()> {
        self.mutate(|config| {
            set_assignment(&mut config.assignments.users, user_id, persona_id);
            true
        })
        .await
    }

    /// Assigns a persona to a role name. `None` or an empty ID removes the assignment.
    pub async fn assign_role(&self, role: &str, persona_id: Option<&str>) -> StoreResult<()> {
        self.mutate(|config| {
            set_assignment(&mut config.assignments.roles, role, persona_id);
            true
        })
        .await
    }

    pub async fn set_default_persona(&self, persona_id: impl Into<String>) -> StoreResult<()> {
        let persona_id = persona_id.into();
        self.mutate(move |config| {
            config.default_persona = persona_id;
            true
        })
        .await
    }

    pub async fn set_global_guidelines(&self, text: impl Into<String>) -> StoreResult<()> {
        let text = text.into();
        self.mutate(move |config| {
            config.global_guidelines = text;
            true
        })
        .await
    }

    /// Resolves the system instruction for a user with the given role names.
    pub async fn resolve<R: AsRef<str>>(
        &self,
        user_id: &str,
        roles: impl IntoIterator<Item = R>,
    ) -> String {
        resolve_system_instruction(&*self.snapshot().await, user_id, roles)
    }
}

fn set_assignment(
    assignments: &mut std::collections::BTreeMap<String, String>,
    key: &str,
    persona_id: Option<&str>,
) {
    match persona_id.filter(|id| !id.is_empty()) {
        Some(id) => {
            assignments.insert(key.to_owned(), id.to_owned());
        }
        None => {
            assignments.remove(key);
        }
    }
}
