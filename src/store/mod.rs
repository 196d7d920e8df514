//! Persistence port.
//!
//! Handlers never build queries themselves: they ask a [`Store`] for rows,
//! passing the [`ListScope`] the policy computed for the caller. Results come
//! back as plain vectors ordered by creation time.

pub mod memory;
pub mod postgres;

use std::time::Duration;

use uuid::Uuid;

use crate::db::models::{NewRecord, NewRole, NewUser, Record, Role, User};
use crate::policy::ListScope;
use crate::resources::ResourceKind;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write; carries the offending field.
    #[error("unique constraint violated on '{0}'")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    /// Case-insensitive email lookup.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self, scope: ListScope) -> StoreResult<Vec<User>>;
    /// Persist every mutable column of `user`.
    async fn save_user(&self, user: &User) -> StoreResult<User>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool>;

    async fn insert_role(&self, role: NewRole) -> StoreResult<Role>;
    async fn find_role(&self, id: Uuid) -> StoreResult<Option<Role>>;
    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>>;
    async fn list_roles(&self) -> StoreResult<Vec<Role>>;
    async fn save_role(&self, role: &Role) -> StoreResult<Role>;
    async fn delete_role(&self, id: Uuid) -> StoreResult<bool>;

    async fn insert_record(&self, record: NewRecord) -> StoreResult<Record>;
    async fn find_record(&self, kind: ResourceKind, id: Uuid) -> StoreResult<Option<Record>>;
    async fn list_records(&self, kind: ResourceKind, scope: ListScope) -> StoreResult<Vec<Record>>;
    /// Persist owner, visibility, slug and payload of `record`.
    async fn save_record(&self, record: &Record) -> StoreResult<Record>;
    async fn delete_record(&self, kind: ResourceKind, id: Uuid) -> StoreResult<bool>;

    /// Template portfolio published under `username` with `slug`.
    async fn find_portfolio_by_slug(&self, username: &str, slug: &str) -> StoreResult<Option<Record>>;
    /// Whether `owner` already has a template portfolio using `slug`.
    async fn slug_taken(&self, owner: Uuid, slug: &str, exclude: Option<Uuid>) -> StoreResult<bool>;

    /// Round-trip to the backend, for health checks.
    async fn ping(&self) -> StoreResult<Duration>;
}
