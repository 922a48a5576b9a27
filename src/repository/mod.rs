use crate::models::{
    Account, ExamResult, NewAccount, Notice, NoticeDraft, ProfileChanges, RequestDraft,
    RequestState, ResultDraft, RoleLevel, ServiceRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// StoreError
///
/// Failures surfaced by a store. Uniqueness is enforced by the store itself (unique
/// constraints in Postgres, a locked check-and-insert in memory), never by a caller-side
/// lookup followed by an insert.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write. Carries the offending field.
    #[error("{0} already exists")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(String),
    /// The row's version moved on between read and write.
    #[error("stale version")]
    Stale,
    /// Timed out waiting for a connection or for a statement.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store failure: {0}")]
    Backend(String),
}

/// Identity rows. `insert_account` fails with `Conflict` on a taken username or email.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn insert_account(&self, account: NewAccount) -> Result<Account, StoreError>;
    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError>;
    async fn find_account_by_username(&self, username: &str)
    -> Result<Option<Account>, StoreError>;
    /// Applies only the `Some` fields of `changes` in a single write.
    async fn update_account(&self, id: Uuid, changes: ProfileChanges)
    -> Result<Account, StoreError>;
}

/// Request rows. Both update methods are conditional on `expected_version` and bump it.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn insert_request(&self, draft: RequestDraft) -> Result<ServiceRequest, StoreError>;
    async fn find_request(&self, id: i64) -> Result<Option<ServiceRequest>, StoreError>;
    async fn list_requests_by_access_level(
        &self,
        access_level: RoleLevel,
    ) -> Result<Vec<ServiceRequest>, StoreError>;
    async fn update_request_content(
        &self,
        id: i64,
        expected_version: i64,
        title: String,
        content: String,
        at: DateTime<Utc>,
    ) -> Result<ServiceRequest, StoreError>;
    async fn update_request_state(
        &self,
        id: i64,
        expected_version: i64,
        state: RequestState,
        at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<ServiceRequest, StoreError>;
}

#[async_trait]
pub trait NoticeRepository: Send + Sync {
    async fn insert_notice(&self, draft: NoticeDraft) -> Result<Notice, StoreError>;
    async fn find_notice(&self, id: i64) -> Result<Option<Notice>, StoreError>;
    async fn list_notices_by_branch(&self, branch: &str) -> Result<Vec<Notice>, StoreError>;
    async fn update_notice(
        &self,
        id: i64,
        expected_version: i64,
        title: String,
        content: String,
        at: DateTime<Utc>,
    ) -> Result<Notice, StoreError>;
}

/// Result rows. `insert_result` fails with `Conflict` when (account, semester) exists,
/// leaving the stored row untouched.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn insert_result(&self, draft: ResultDraft) -> Result<ExamResult, StoreError>;
    async fn list_results_for_account(&self, account_id: Uuid)
    -> Result<Vec<ExamResult>, StoreError>;
}

/// Repository
///
/// The full persistence contract, as one object-safe trait so it can live behind a single
/// `Arc<dyn Repository>` in the application state.
pub trait Repository:
    AccountRepository + RequestRepository + NoticeRepository + ResultRepository
{
}

impl<T> Repository for T where
    T: AccountRepository + RequestRepository + NoticeRepository + ResultRepository
{
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
