//! Principal resolution
//!
//! Authentication happens upstream. What arrives here is an identity claim
//! (a user id); the resolver turns it into a [`Principal`] with a closed role.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::db::IdentityDirectory;
use crate::error::{LedgerError, LedgerResult};
use crate::model::{Principal, Role};

pub trait PrincipalResolver: Send + Sync {
    fn resolve(&self, credentials: &str) -> LedgerResult<Principal>;
}

/// Resolves user ids against the accounts table
#[derive(Clone)]
pub struct DirectoryPrincipalResolver {
    directory: Arc<dyn IdentityDirectory>,
}

impl DirectoryPrincipalResolver {
    pub fn new(directory: Arc<dyn IdentityDirectory>) -> Self {
        Self { directory }
    }
}

impl PrincipalResolver for DirectoryPrincipalResolver {
    fn resolve(&self, credentials: &str) -> LedgerResult<Principal> {
        let user_id = credentials.trim();
        if user_id.is_empty() {
            return Err(LedgerError::Unauthenticated("empty identity".into()));
        }

        let user = self
            .directory
            .get_user(user_id)?
            .ok_or_else(|| LedgerError::Unauthenticated(format!("unknown user {}", user_id)))?;

        if !user.active() {
            warn!(user_id = %user_id, "Inactive user rejected");
            return Err(LedgerError::Unauthenticated(format!("user {} is inactive", user_id)));
        }

        let role = user
            .role
            .parse::<Role>()
            .map_err(|e| LedgerError::Forbidden(e.to_string()))?;

        debug!(user_id = %user_id, role = %role, "Principal resolved");
        Ok(Principal::new(user.id, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewProfile, RelationalDb, SqliteProfileStore};

    #[test]
    fn test_resolve_directory_users() {
        let profiles = SqliteProfileStore::new(RelationalDb::open_in_memory().unwrap().pool());
        profiles
            .create_user(NewProfile::new("root", "Registrar"), Role::Admin)
            .unwrap();
        profiles
            .create_student(NewProfile::new("stu-1", "Ana"), "S-001", "Informatics", 2022, None)
            .unwrap();

        let resolver = DirectoryPrincipalResolver::new(Arc::new(profiles.clone()));
        assert_eq!(resolver.resolve("root").unwrap(), Principal::admin("root"));
        assert_eq!(resolver.resolve(" stu-1 ").unwrap(), Principal::student("stu-1"));

        assert!(matches!(resolver.resolve("ghost"), Err(LedgerError::Unauthenticated(_))));
        assert!(matches!(resolver.resolve(""), Err(LedgerError::Unauthenticated(_))));

        profiles.set_active("stu-1", false).unwrap();
        assert!(matches!(resolver.resolve("stu-1"), Err(LedgerError::Unauthenticated(_))));
    }
}
