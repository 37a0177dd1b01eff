//! Content Store - achievement content documents
//!
//! Authoritative for title, description, details, attachments, tags and
//! points. Documents are MessagePack-encoded with named camelCase fields
//! (fields added later default when absent) and kept in sled.
//!
//! ## Trees
//!
//! - `achievements` - `{content_ref}` -> document
//! - `by_student` - `{student_id}:{content_ref}` -> empty (secondary index)
//!
//! Reads are always driven by the reference store, so a document with no
//! reference is invisible to every read path.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use tracing::{debug, info};
use uuid::Uuid;

use crate::details::Details;
use crate::error::StorageError;
use crate::model::AchievementType;

// ============================================================================
// Documents
// ============================================================================

/// File metadata attached to an achievement (the file itself lives elsewhere)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Achievement content document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementContent {
    pub id: String,
    pub student_id: String,
    pub achievement_type: AchievementType,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub details: Details,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub points: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new content document
#[derive(Debug, Clone)]
pub struct ContentDraft {
    pub student_id: String,
    pub achievement_type: AchievementType,
    pub title: String,
    pub description: String,
    pub details: Details,
    pub tags: Vec<String>,
    pub points: u32,
}

/// Partial update: only `Some` fields are written
///
/// An explicit empty value (`Some(String::new())`, `Some(vec![])`) is stored
/// as given; it is neither skipped nor treated as a delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub details: Option<Details>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub points: Option<u32>,
}

impl ContentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.details.is_none()
            && self.tags.is_none()
            && self.points.is_none()
    }

    pub fn apply(&self, content: &mut AchievementContent) {
        if let Some(title) = &self.title {
            content.title = title.clone();
        }
        if let Some(description) = &self.description {
            content.description = description.clone();
        }
        if let Some(details) = &self.details {
            content.details = details.clone();
        }
        if let Some(tags) = &self.tags {
            content.tags = tags.clone();
        }
        if let Some(points) = self.points {
            content.points = points;
        }
    }
}

// ============================================================================
// Store contract
// ============================================================================

/// Document store for achievement content
pub trait ContentStore: Send + Sync {
    /// Persist a new document, returning its content ref
    fn create(&self, draft: ContentDraft) -> Result<String, StorageError>;

    fn get_by_id(&self, content_ref: &str) -> Result<Option<AchievementContent>, StorageError>;

    /// Apply a partial update. `NotFound` if the document is missing.
    fn update(&self, content_ref: &str, patch: &ContentPatch)
        -> Result<AchievementContent, StorageError>;

    /// Remove a document. Returns whether it existed.
    fn delete(&self, content_ref: &str) -> Result<bool, StorageError>;

    /// Resolve many refs; unknown refs are dropped, order follows `refs`
    fn get_many(&self, refs: &[String]) -> Result<Vec<AchievementContent>, StorageError>;

    fn append_attachment(
        &self,
        content_ref: &str,
        attachment: Attachment,
    ) -> Result<AchievementContent, StorageError>;

    /// All documents of one student, via the secondary index
    fn list_by_student(&self, student_id: &str) -> Result<Vec<AchievementContent>, StorageError>;

    /// Overwrite an existing document with an earlier copy of itself.
    /// `NotFound` if the document is gone; a deleted document stays deleted.
    fn restore(&self, content: &AchievementContent) -> Result<(), StorageError>;
}

// ============================================================================
// sled implementation
// ============================================================================

/// Configuration for the sled content store
#[derive(Debug, Clone)]
pub struct ContentStoreConfig {
    /// Path to sled database
    pub db_path: PathBuf,
    /// Cache size in bytes
    pub cache_size: u64,
    /// Throwaway database removed on drop (tests)
    pub temporary: bool,
}

impl Default for ContentStoreConfig {
    fn default() -> Self {
        Self {
            db_path: crate::config::default_storage_dir().join("content.sled"),
            cache_size: 64 * 1024 * 1024, // 64MB
            temporary: false,
        }
    }
}

/// Content store backed by sled
pub struct SledContentStore {
    db: sled::Db,
    docs: sled::Tree,
    by_student: sled::Tree,
}

impl SledContentStore {
    pub fn open(config: ContentStoreConfig) -> Result<Self, StorageError> {
        if !config.temporary {
            if let Some(parent) = config.db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = sled::Config::new()
            .path(&config.db_path)
            .cache_capacity(config.cache_size)
            .temporary(config.temporary)
            .mode(sled::Mode::HighThroughput)
            .open()?;

        let docs = db.open_tree("achievements")?;
        let by_student = db.open_tree("by_student")?;

        info!(path = %config.db_path.display(), documents = docs.len(), "Content store opened");

        Ok(Self {
            db,
            docs,
            by_student,
        })
    }

    pub fn at_path(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open(ContentStoreConfig {
            db_path: path.as_ref().to_path_buf(),
            ..Default::default()
        })
    }

    /// In-memory store deleted when dropped
    pub fn temporary() -> Result<Self, StorageError> {
        Self::open(ContentStoreConfig {
            db_path: std::env::temp_dir().join(format!("ledger-content-{}", Uuid::new_v4())),
            cache_size: 8 * 1024 * 1024,
            temporary: true,
        })
    }

    pub fn count(&self) -> u64 {
        self.docs.len() as u64
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn encode(content: &AchievementContent) -> Result<Vec<u8>, StorageError> {
        rmp_serde::to_vec_named(content).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<AchievementContent, StorageError> {
        rmp_serde::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn index_key(student_id: &str, content_ref: &str) -> String {
        format!("{}:{}", student_id, content_ref)
    }

    /// Read-modify-write one document, retrying when another writer got there first
    fn modify<F>(&self, content_ref: &str, change: F) -> Result<AchievementContent, StorageError>
    where
        F: Fn(&mut AchievementContent),
    {
        loop {
            let current = self
                .docs
                .get(content_ref.as_bytes())?
                .ok_or_else(|| StorageError::NotFound(format!("content {}", content_ref)))?;

            let mut content = Self::decode(&current)?;
            change(&mut content);
            content.updated_at = Utc::now();
            let next = Self::encode(&content)?;

            match self
                .docs
                .compare_and_swap(content_ref.as_bytes(), Some(&current), Some(next))?
            {
                Ok(()) => return Ok(content),
                Err(_) => {
                    debug!(content_ref = %content_ref, "Content changed concurrently, retrying");
                }
            }
        }
    }
}

fn unwrap_transaction(error: TransactionError<StorageError>) -> StorageError {
    match error {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => StorageError::Database(e),
    }
}

impl ContentStore for SledContentStore {
    fn create(&self, draft: ContentDraft) -> Result<String, StorageError> {
        let now = Utc::now();
        let content = AchievementContent {
            id: Uuid::new_v4().simple().to_string(),
            student_id: draft.student_id,
            achievement_type: draft.achievement_type,
            title: draft.title,
            description: draft.description,
            details: draft.details,
            attachments: Vec::new(),
            tags: draft.tags,
            points: draft.points,
            created_at: now,
            updated_at: now,
        };

        let bytes = Self::encode(&content)?;
        let index_key = Self::index_key(&content.student_id, &content.id);

        (&self.docs, &self.by_student)
            .transaction(|(docs, index)| {
                docs.insert(content.id.as_bytes(), bytes.clone())?;
                index.insert(index_key.as_bytes(), Vec::<u8>::new())?;
                Ok::<_, ConflictableTransactionError<StorageError>>(())
            })
            .map_err(unwrap_transaction)?;

        debug!(content_ref = %content.id, student_id = %content.student_id, "Content created");
        Ok(content.id)
    }

    fn get_by_id(&self, content_ref: &str) -> Result<Option<AchievementContent>, StorageError> {
        match self.docs.get(content_ref.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn update(
        &self,
        content_ref: &str,
        patch: &ContentPatch,
    ) -> Result<AchievementContent, StorageError> {
        let updated = self.modify(content_ref, |content| patch.apply(content))?;
        debug!(content_ref = %content_ref, "Content updated");
        Ok(updated)
    }

    fn delete(&self, content_ref: &str) -> Result<bool, StorageError> {
        let existed = (&self.docs, &self.by_student)
            .transaction(|(docs, index)| {
                let Some(bytes) = docs.remove(content_ref.as_bytes())? else {
                    return Ok(false);
                };
                let content = Self::decode(&bytes).map_err(ConflictableTransactionError::Abort)?;
                index.remove(Self::index_key(&content.student_id, content_ref).as_bytes())?;
                Ok(true)
            })
            .map_err(unwrap_transaction)?;

        if existed {
            debug!(content_ref = %content_ref, "Content deleted");
        }
        Ok(existed)
    }

    fn get_many(&self, refs: &[String]) -> Result<Vec<AchievementContent>, StorageError> {
        let mut found = Vec::with_capacity(refs.len());
        for content_ref in refs {
            if let Some(content) = self.get_by_id(content_ref)? {
                found.push(content);
            }
        }
        Ok(found)
    }

    fn append_attachment(
        &self,
        content_ref: &str,
        attachment: Attachment,
    ) -> Result<AchievementContent, StorageError> {
        let updated = self.modify(content_ref, |content| {
            content.attachments.push(attachment.clone());
        })?;
        debug!(
            content_ref = %content_ref,
            file_name = %attachment.file_name,
            "Attachment appended"
        );
        Ok(updated)
    }

    fn list_by_student(&self, student_id: &str) -> Result<Vec<AchievementContent>, StorageError> {
        let prefix = format!("{}:", student_id);
        let mut refs = Vec::new();
        for item in self.by_student.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item?;
            let key = String::from_utf8_lossy(&key);
            if let Some((_, content_ref)) = key.rsplit_once(':') {
                refs.push(content_ref.to_string());
            }
        }
        self.get_many(&refs)
    }

    fn restore(&self, content: &AchievementContent) -> Result<(), StorageError> {
        let bytes = Self::encode(content)?;
        // student_id never changes, so the index entry is still valid
        let previous = self
            .docs
            .fetch_and_update(content.id.as_bytes(), |current| current.map(|_| bytes.clone()))?;
        if previous.is_none() {
            return Err(StorageError::NotFound(format!("content {}", content.id)));
        }
        debug!(content_ref = %content.id, "Content restored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn draft(student_id: &str, title: &str) -> ContentDraft {
        ContentDraft {
            student_id: student_id.to_string(),
            achievement_type: AchievementType::Competition,
            title: title.to_string(),
            description: "Regional programming contest".to_string(),
            details: Details::new().with("competitionLevel", "regional"),
            tags: vec!["programming".to_string()],
            points: 50,
        }
    }

    #[test]
    fn test_content_crud() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledContentStore::at_path(temp_dir.path().join("content.sled")).unwrap();

        let content_ref = store.create(draft("stu-1", "ICPC Regional")).unwrap();
        let stored = store.get_by_id(&content_ref).unwrap().unwrap();
        assert_eq!(stored.id, content_ref);
        assert_eq!(stored.title, "ICPC Regional");
        assert_eq!(stored.details.competition_level(), Some("regional"));
        assert!(stored.attachments.is_empty());

        assert!(store.delete(&content_ref).unwrap());
        assert!(store.get_by_id(&content_ref).unwrap().is_none());
        assert!(!store.delete(&content_ref).unwrap());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_partial_update_touches_only_given_fields() {
        let store = SledContentStore::temporary().unwrap();
        let content_ref = store.create(draft("stu-1", "Original")).unwrap();

        let updated = store
            .update(
                &content_ref,
                &ContentPatch {
                    title: Some("X".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.title, "X");
        assert_eq!(updated.description, "Regional programming contest");
        assert_eq!(updated.tags, vec!["programming".to_string()]);
        assert_eq!(updated.points, 50);
        assert!(updated.updated_at >= updated.created_at);
    }

    #[test]
    fn test_explicit_empty_values_are_written() {
        let store = SledContentStore::temporary().unwrap();
        let content_ref = store.create(draft("stu-1", "Original")).unwrap();

        let updated = store
            .update(
                &content_ref,
                &ContentPatch {
                    tags: Some(vec![]),
                    points: Some(0),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(updated.tags.is_empty());
        assert_eq!(updated.points, 0);
        assert_eq!(updated.title, "Original");
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = SledContentStore::temporary().unwrap();
        let err = store.update("nope", &ContentPatch::default()).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_restore_rewinds_but_never_resurrects() {
        let store = SledContentStore::temporary().unwrap();
        let content_ref = store.create(draft("stu-1", "Original")).unwrap();
        let snapshot = store.get_by_id(&content_ref).unwrap().unwrap();

        let patch = ContentPatch {
            title: Some("Changed".into()),
            ..Default::default()
        };
        store.update(&content_ref, &patch).unwrap();
        store
            .append_attachment(
                &content_ref,
                Attachment {
                    file_name: "late.pdf".into(),
                    file_url: "https://files/late.pdf".into(),
                    file_type: "application/pdf".into(),
                    uploaded_at: Utc::now(),
                },
            )
            .unwrap();

        store.restore(&snapshot).unwrap();
        assert_eq!(store.get_by_id(&content_ref).unwrap().unwrap(), snapshot);
        assert_eq!(store.list_by_student("stu-1").unwrap().len(), 1);

        store.delete(&content_ref).unwrap();
        let err = store.restore(&snapshot).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(store.get_by_id(&content_ref).unwrap().is_none());
    }

    #[test]
    fn test_document_json_is_camel_case() {
        let store = SledContentStore::temporary().unwrap();
        let content_ref = store.create(draft("stu-1", "Named")).unwrap();
        let content = store
            .append_attachment(
                &content_ref,
                Attachment {
                    file_name: "cert.pdf".into(),
                    file_url: "https://files/cert.pdf".into(),
                    file_type: "application/pdf".into(),
                    uploaded_at: Utc::now(),
                },
            )
            .unwrap();

        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["studentId"], "stu-1");
        assert_eq!(json["achievementType"], "competition");
        assert!(json.get("updatedAt").is_some());
        assert_eq!(json["attachments"][0]["fileName"], "cert.pdf");
        assert!(json["attachments"][0].get("uploadedAt").is_some());
        assert!(json.get("student_id").is_none());
    }

    #[test]
    fn test_get_many_drops_missing() {
        let store = SledContentStore::temporary().unwrap();
        let a = store.create(draft("stu-1", "A")).unwrap();
        let b = store.create(draft("stu-1", "B")).unwrap();

        let found = store
            .get_many(&[a.clone(), "missing".to_string(), b.clone()])
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![a.as_str(), b.as_str()]);
    }

    #[test]
    fn test_append_attachment_and_student_index() {
        let store = SledContentStore::temporary().unwrap();
        let mine = store.create(draft("stu-1", "Mine")).unwrap();
        store.create(draft("stu-2", "Theirs")).unwrap();

        let updated = store
            .append_attachment(
                &mine,
                Attachment {
                    file_name: "certificate.pdf".to_string(),
                    file_url: "https://files.example/certificate.pdf".to_string(),
                    file_type: "application/pdf".to_string(),
                    uploaded_at: Utc::now(),
                },
            )
            .unwrap();
        assert_eq!(updated.attachments.len(), 1);

        let listed = store.list_by_student("stu-1").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine);

        store.delete(&mine).unwrap();
        assert!(store.list_by_student("stu-1").unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_attachments_are_not_lost() {
        let store = SledContentStore::temporary().unwrap();
        let content_ref = store.create(draft("stu-1", "Busy")).unwrap();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let store = &store;
                let content_ref = &content_ref;
                scope.spawn(move || {
                    store
                        .append_attachment(
                            content_ref,
                            Attachment {
                                file_name: format!("file-{}.png", i),
                                file_url: format!("https://files.example/{}", i),
                                file_type: "image/png".to_string(),
                                uploaded_at: Utc::now(),
                            },
                        )
                        .unwrap();
                });
            }
        });

        let stored = store.get_by_id(&content_ref).unwrap().unwrap();
        assert_eq!(stored.attachments.len(), 8);
    }
}
