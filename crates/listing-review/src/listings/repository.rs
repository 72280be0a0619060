use super::domain::{
    AccessLogEntry, Property, PropertyId, PropertyStatus, Role, UserId, UserProfile,
};
use super::query::{AccessLogQuery, PropertySelection};

/// Storage abstraction for listings. Each write touches a single row and is atomic.
pub trait PropertyRepository: Send + Sync {
    fn insert(&self, property: Property) -> Result<Property, RepositoryError>;
    /// Replaces the row only while its stored status is still `expected`, so a write built
    /// from a stale read cannot undo a transition that committed in between. A status
    /// mismatch is `Conflict`.
    fn update(
        &self,
        property: Property,
        expected: PropertyStatus,
    ) -> Result<(), RepositoryError>;
    fn delete(&self, id: &PropertyId) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError>;
    /// Rows matching `selection`, newest first, at most `limit` of them.
    fn select(
        &self,
        selection: &PropertySelection,
        limit: usize,
    ) -> Result<Vec<Property>, RepositoryError>;
    /// Per-status counts of the rows matching `selection`.
    fn count_by_status(
        &self,
        selection: &PropertySelection,
    ) -> Result<Vec<(PropertyStatus, usize)>, RepositoryError>;
}

/// Profiles pushed by the identity collaborator plus the admin-owned role table.
pub trait UserDirectory: Send + Sync {
    fn upsert_user(&self, profile: UserProfile) -> Result<UserProfile, RepositoryError>;
    fn fetch_user(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError>;
    fn list_users(&self) -> Result<Vec<UserProfile>, RepositoryError>;
    fn delete_user(&self, id: &UserId) -> Result<(), RepositoryError>;
    fn role_assignments(&self) -> Result<Vec<(UserId, Role)>, RepositoryError>;
    fn role_of(&self, id: &UserId) -> Result<Option<Role>, RepositoryError>;
    /// Replaces any existing assignment.
    fn assign_role(&self, id: &UserId, role: Role) -> Result<(), RepositoryError>;
    fn remove_role(&self, id: &UserId) -> Result<(), RepositoryError>;
}

/// Append-only sink and reader for the access log.
pub trait AccessLogRepository: Send + Sync {
    fn append(&self, entry: AccessLogEntry) -> Result<(), RepositoryError>;
    /// Entries matching `query`, newest first, at most `limit` of them.
    fn recent(
        &self,
        query: &AccessLogQuery,
        limit: usize,
    ) -> Result<Vec<AccessLogEntry>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists or changed since it was read")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
