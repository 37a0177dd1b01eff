//! Shared fixture: file-backed stores in a temp dir with a small roster
//!
//! Roster:
//! - `admin` (admin)
//! - `lec-1`, `lec-2` (advisors)
//! - `stu-1` advised by `lec-1`, `stu-2` advised by `lec-2`, `stu-3` unadvised

#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use achievement_ledger::content_store::{ContentStore, SledContentStore};
use achievement_ledger::db::{
    IdentityDirectory, NewProfile, ProfileLookup, ReferenceStore, RelationalDb,
    SqliteProfileStore, SqliteReferenceStore, StudentRoster,
};
use achievement_ledger::services::{
    CreateAchievementInput, ServiceLimits, Services, StoreHandles,
};
use achievement_ledger::{AchievementType, Details, Principal, Role};

pub struct Fixture {
    pub temp_dir: TempDir,
    pub db: RelationalDb,
    pub profiles: Arc<SqliteProfileStore>,
    pub references: Arc<SqliteReferenceStore>,
    pub contents: Arc<SledContentStore>,
}

impl Fixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db = RelationalDb::open(&temp_dir.path().join("ledger.db"), 4, 5000).unwrap();
        let contents =
            Arc::new(SledContentStore::at_path(temp_dir.path().join("content.sled")).unwrap());
        let profiles = Arc::new(SqliteProfileStore::new(db.pool()));
        let references = Arc::new(SqliteReferenceStore::new(db.pool()));

        profiles
            .create_user(NewProfile::new("admin", "Registrar"), Role::Admin)
            .unwrap();
        profiles
            .create_lecturer(NewProfile::new("lec-1", "Dr. Lee"), "L-01", "Informatics")
            .unwrap();
        profiles
            .create_lecturer(NewProfile::new("lec-2", "Dr. Kim"), "L-02", "Physics")
            .unwrap();
        profiles
            .create_student(NewProfile::new("stu-1", "Ana"), "S-001", "Informatics", 2022, Some("lec-1"))
            .unwrap();
        profiles
            .create_student(NewProfile::new("stu-2", "Ben"), "S-002", "Physics", 2023, Some("lec-2"))
            .unwrap();
        profiles
            .create_student(NewProfile::new("stu-3", "Cai"), "S-003", "Informatics", 2024, None)
            .unwrap();

        Self {
            temp_dir,
            db,
            profiles,
            references,
            contents,
        }
    }

    /// Store handles; the reference store can be swapped for a wrapper
    pub fn handles_with(&self, references: Arc<dyn ReferenceStore>) -> StoreHandles {
        StoreHandles {
            references,
            contents: self.contents.clone() as Arc<dyn ContentStore>,
            profiles: self.profiles.clone() as Arc<dyn ProfileLookup>,
            directory: self.profiles.clone() as Arc<dyn IdentityDirectory>,
            roster: self.profiles.clone() as Arc<dyn StudentRoster>,
        }
    }

    pub fn services(&self) -> Services {
        self.services_with(self.references.clone())
    }

    pub fn services_with(&self, references: Arc<dyn ReferenceStore>) -> Services {
        Services::new(self.handles_with(references), ServiceLimits::default())
    }
}

pub fn student(id: &str) -> Principal {
    Principal::student(id)
}

pub fn advisor(id: &str) -> Principal {
    Principal::advisor(id)
}

pub fn admin() -> Principal {
    Principal::admin("admin")
}

pub fn competition(title: &str, points: u32, level: &str) -> CreateAchievementInput {
    CreateAchievementInput {
        achievement_type: AchievementType::Competition,
        title: title.to_string(),
        description: format!("{} description", title),
        details: Details::new().with("competitionLevel", level),
        tags: vec!["contest".to_string()],
        points,
    }
}

pub fn achievement(kind: AchievementType, title: &str, points: u32) -> CreateAchievementInput {
    CreateAchievementInput {
        achievement_type: kind,
        title: title.to_string(),
        description: format!("{} description", title),
        details: Details::new(),
        tags: Vec::new(),
        points,
    }
}
