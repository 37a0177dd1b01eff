//! Wiring: open both stores from a [`Config`] and build the services

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::content_store::{ContentStoreConfig, SledContentStore};
use crate::db::{RelationalDb, SqliteProfileStore, SqliteReferenceStore};
use crate::error::StorageError;
use crate::principal::DirectoryPrincipalResolver;
use crate::services::{ServiceLimits, Services, StoreHandles};

/// Opened stores plus the services built on them
pub struct Ledger {
    pub db: RelationalDb,
    pub profiles: Arc<SqliteProfileStore>,
    pub contents: Arc<SledContentStore>,
    pub principals: DirectoryPrincipalResolver,
    pub services: Services,
}

impl Ledger {
    pub fn open(config: &Config) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&config.storage_dir)?;

        let db = RelationalDb::open(
            &config.relational_db_path(),
            config.pool_size,
            config.busy_timeout_ms,
        )?;
        let contents = Arc::new(SledContentStore::open(ContentStoreConfig {
            db_path: config.content_db_path(),
            cache_size: config.content_cache_bytes,
            temporary: false,
        })?);

        let ledger = Self::assemble(db, contents, ServiceLimits::from(config));
        info!(storage_dir = %config.storage_dir.display(), "Ledger opened");
        Ok(ledger)
    }

    /// In-memory SQLite and a temporary sled tree
    pub fn in_memory() -> Result<Self, StorageError> {
        Ok(Self::assemble(
            RelationalDb::open_in_memory()?,
            Arc::new(SledContentStore::temporary()?),
            ServiceLimits::default(),
        ))
    }

    fn assemble(db: RelationalDb, contents: Arc<SledContentStore>, limits: ServiceLimits) -> Self {
        let profiles = Arc::new(SqliteProfileStore::new(db.pool()));
        let stores = StoreHandles {
            references: Arc::new(SqliteReferenceStore::new(db.pool())),
            contents: contents.clone(),
            profiles: profiles.clone(),
            directory: profiles.clone(),
            roster: profiles.clone(),
        };

        Self {
            principals: DirectoryPrincipalResolver::new(profiles.clone()),
            services: Services::new(stores, limits),
            db,
            profiles,
            contents,
        }
    }

    /// Flush the content store to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.contents.flush()
    }
}
