//! Achievement Ledger - student achievement records under review
//!
//! Achievements move through a review workflow
//! (draft → submitted → verified/rejected) under role-based visibility.
//! Persistence is split across two stores:
//!
//! | Store | Backend | Authoritative for |
//! |-------|---------|-------------------|
//! | ReferenceStore | SQLite (diesel + r2d2) | status, ownership, reviewer, timestamps |
//! | ContentStore | sled (MessagePack) | title, description, details, attachments, points |
//!
//! The [`services::LifecycleCoordinator`] keeps the two consistent and owns
//! the state machine; [`services::AggregationEngine`] joins them for
//! statistics and reports.
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/achievement-ledger/
//! ├── ledger.db        # users, profiles, achievement references
//! ├── content.sled/    # achievement content documents
//! └── config.toml      # configuration
//! ```

pub mod config;
pub mod content_store;
pub mod db;
pub mod details;
pub mod error;
pub mod ledger;
pub mod model;
pub mod principal;
pub mod scope;
pub mod services;

pub use config::Config;
pub use content_store::{
    AchievementContent, Attachment, ContentPatch, ContentStore, SledContentStore,
};
pub use db::{AchievementReference, ReferenceStore, SqliteReferenceStore};
pub use details::{DetailValue, Details};
pub use error::{LedgerError, LedgerResult, StorageError};
pub use ledger::Ledger;
pub use model::{AchievementStatus, AchievementType, Principal, Role};
pub use principal::{DirectoryPrincipalResolver, PrincipalResolver};
pub use scope::{ScopePredicate, ScopeResolver};
pub use services::{
    AggregationEngine, LedgerEvent, LifecycleCoordinator, RosterService, Services,
};
