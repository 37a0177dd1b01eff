//! Core domain enums shared by both stores
//!
//! Status and role are closed enumerations. They are persisted as lowercase
//! strings in SQLite and in content documents.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

// ============================================================================
// Review status
// ============================================================================

/// Review workflow status of an achievement reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementStatus {
    Draft,
    Submitted,
    Verified,
    Rejected,
    Deleted,
}

impl AchievementStatus {
    pub const ALL: [AchievementStatus; 5] = [
        AchievementStatus::Draft,
        AchievementStatus::Submitted,
        AchievementStatus::Verified,
        AchievementStatus::Rejected,
        AchievementStatus::Deleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementStatus::Draft => "draft",
            AchievementStatus::Submitted => "submitted",
            AchievementStatus::Verified => "verified",
            AchievementStatus::Rejected => "rejected",
            AchievementStatus::Deleted => "deleted",
        }
    }

    /// No transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AchievementStatus::Verified | AchievementStatus::Rejected | AchievementStatus::Deleted
        )
    }

    /// Whether a reviewer has acted (verifiedAt/verifiedBy must be set)
    pub fn is_reviewed(&self) -> bool {
        matches!(self, AchievementStatus::Verified | AchievementStatus::Rejected)
    }
}

impl fmt::Display for AchievementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AchievementStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AchievementStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "status",
                value: s.to_string(),
            })
    }
}

// ============================================================================
// Achievement type
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementType {
    Academic,
    Competition,
    Organization,
    Publication,
    Certification,
    Other,
}

impl AchievementType {
    pub const ALL: [AchievementType; 6] = [
        AchievementType::Academic,
        AchievementType::Competition,
        AchievementType::Organization,
        AchievementType::Publication,
        AchievementType::Certification,
        AchievementType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementType::Academic => "academic",
            AchievementType::Competition => "competition",
            AchievementType::Organization => "organization",
            AchievementType::Publication => "publication",
            AchievementType::Certification => "certification",
            AchievementType::Other => "other",
        }
    }
}

impl fmt::Display for AchievementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AchievementType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        AchievementType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| ParseEnumError {
                kind: "achievement type",
                value: s.to_string(),
            })
    }
}

// ============================================================================
// Roles and principals
// ============================================================================

/// Role of an authenticated principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Advisor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Advisor => "advisor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    /// Accepts canonical names and the legacy directory labels
    /// (`Mahasiswa`, `Dosen Wali`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" | "mahasiswa" => Ok(Role::Student),
            "advisor" | "lecturer" | "dosen wali" => Ok(Role::Advisor),
            "admin" => Ok(Role::Admin),
            _ => Err(ParseEnumError {
                kind: "role",
                value: s.to_string(),
            }),
        }
    }
}

/// A resolved caller: identity plus role
///
/// Student and lecturer profiles share their `id` with the account identity,
/// so `identity` doubles as the student id or lecturer id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub identity: String,
    pub role: Role,
}

impl Principal {
    pub fn new(identity: impl Into<String>, role: Role) -> Self {
        Self {
            identity: identity.into(),
            role,
        }
    }

    pub fn student(identity: impl Into<String>) -> Self {
        Self::new(identity, Role::Student)
    }

    pub fn advisor(identity: impl Into<String>) -> Self {
        Self::new(identity, Role::Advisor)
    }

    pub fn admin(identity: impl Into<String>) -> Self {
        Self::new(identity, Role::Admin)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.role, self.identity)
    }
}
