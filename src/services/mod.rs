//! Service layer for achievement-ledger
//!
//! Services sit between callers (CLI, an HTTP adapter) and the two stores.
//! Each service wraps store operations with:
//! - Role and scope checks
//! - Input validation
//! - Cross-store orchestration
//! - Event emission for audit
//!
//! ## Architecture
//!
//! ```text
//! Callers (thin)
//!     ↓
//! Service Layer (lifecycle, aggregation, roster)
//!     ↓
//! ReferenceStore (SQLite)   ContentStore (sled)
//! ```

pub mod aggregation;
pub mod events;
pub mod lifecycle;
pub mod roster;
pub mod views;

pub use aggregation::{AchievementStatistics, AggregationEngine, StudentReport};
pub use events::{EventBus, EventListener, LedgerEvent};
pub use lifecycle::{AttachmentInput, CreateAchievementInput, LifecycleCoordinator, ListQuery};
pub use roster::{RosterPage, RosterService};
pub use views::{AchievementPage, AchievementView, LecturerInfo, StudentInfo, ViewBuilder};

use std::sync::Arc;

use crate::config::Config;
use crate::content_store::ContentStore;
use crate::db::{IdentityDirectory, ProfileLookup, ReferenceStore, StudentRoster};

/// Page size bounds for list operations
#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
        }
    }
}

/// Output sizes for statistics and reports
#[derive(Debug, Clone, Copy)]
pub struct ReportLimits {
    pub top_students: usize,
    pub period_buckets: usize,
    pub recent_achievements: usize,
}

impl Default for ReportLimits {
    fn default() -> Self {
        Self {
            top_students: 10,
            period_buckets: 12,
            recent_achievements: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceLimits {
    pub page: PageLimits,
    pub report: ReportLimits,
}

impl From<&Config> for ServiceLimits {
    fn from(config: &Config) -> Self {
        Self {
            page: PageLimits {
                default_limit: config.default_page_size,
                max_limit: config.max_page_size,
            },
            report: ReportLimits {
                top_students: config.top_students_limit,
                period_buckets: config.period_buckets,
                recent_achievements: config.recent_achievements_limit,
            },
        }
    }
}

/// Store handles injected into the services
#[derive(Clone)]
pub struct StoreHandles {
    pub references: Arc<dyn ReferenceStore>,
    pub contents: Arc<dyn ContentStore>,
    pub profiles: Arc<dyn ProfileLookup>,
    pub directory: Arc<dyn IdentityDirectory>,
    pub roster: Arc<dyn StudentRoster>,
}

/// Service container for dependency injection
pub struct Services {
    pub lifecycle: Arc<LifecycleCoordinator>,
    pub aggregation: Arc<AggregationEngine>,
    pub roster: Arc<RosterService>,
    pub events: Arc<EventBus>,
}

impl Services {
    pub fn new(stores: StoreHandles, limits: ServiceLimits) -> Self {
        Self::with_events(stores, limits, Arc::new(EventBus::new()))
    }

    pub fn with_events(stores: StoreHandles, limits: ServiceLimits, events: Arc<EventBus>) -> Self {
        let views = ViewBuilder::new(stores.profiles.clone(), stores.directory.clone());

        Self {
            lifecycle: Arc::new(LifecycleCoordinator::new(
                stores.references.clone(),
                stores.contents.clone(),
                stores.profiles.clone(),
                views.clone(),
                events.clone(),
                limits.page,
            )),
            aggregation: Arc::new(AggregationEngine::new(
                stores.references.clone(),
                stores.contents.clone(),
                stores.profiles.clone(),
                stores.directory.clone(),
                views.clone(),
                limits.report,
            )),
            roster: Arc::new(RosterService::new(
                stores.roster,
                stores.profiles,
                views,
                events.clone(),
                limits.page,
            )),
            events,
        }
    }
}
