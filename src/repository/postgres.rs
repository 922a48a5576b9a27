use super::{
    AccountRepository, NoticeRepository, RequestRepository, ResultRepository, StoreError,
};
use crate::models::{
    Account, ExamResult, NewAccount, Notice, NoticeDraft, ProfileChanges, RequestDraft,
    RequestState, ResultDraft, RoleLevel, ServiceRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str = "id, username, password_hash, email, role_level, id_card_url, \
     lib_card_url, hostel_card_url, aadhar_card_url, branch, course, roll_number, created_at";

const REQUEST_COLUMNS: &str = "id, requester_id, request_type, title, content, access_level, \
     state, version, created_at, updated_at, completed_at";

const NOTICE_COLUMNS: &str =
    "id, title, content, branch, creator_id, attachment, version, created_at, updated_at";

const RESULT_COLUMNS: &str = "id, account_id, semester, subjects, marks, total, created_at";

/// PostgresRepository
///
/// The production store. Every write is a single statement, so each operation is atomic
/// on its own; uniqueness comes from table constraints and concurrent edits are serialized
/// by the `version` predicate on UPDATE.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// map_sqlx
///
/// Translates driver errors into store semantics. Unique violations become `Conflict`
/// naming the field; pool and statement timeouts become `Unavailable`.
fn map_sqlx(op: &'static str, err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            let field = match db.constraint() {
                Some("accounts_username_key") => "username",
                Some("accounts_email_key") => "email",
                Some("accounts_roll_number_key") => "roll number",
                Some("exam_results_account_semester_key") => "result for this semester",
                _ => "record",
            };
            tracing::warn!(op, field, "unique constraint rejected write");
            StoreError::Conflict(field.to_string())
        }
        // 57014: query_canceled, raised when statement_timeout fires.
        sqlx::Error::Database(db) if db.code().as_deref() == Some("57014") => {
            tracing::error!(op, "statement timed out");
            StoreError::Unavailable(err.to_string())
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            tracing::error!(op, error = ?err, "store unreachable");
            StoreError::Unavailable(err.to_string())
        }
        _ => {
            tracing::error!(op, error = ?err, "store failure");
            StoreError::Backend(err.to_string())
        }
    }
}

#[async_trait]
impl AccountRepository for PostgresRepository {
    async fn insert_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let query = format!(
            "INSERT INTO accounts (id, username, password_hash, email, role_level, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING {ACCOUNT_COLUMNS}"
        );
        sqlx::query_as::<_, Account>(&query)
            .bind(Uuid::new_v4())
            .bind(account.username)
            .bind(account.password_hash)
            .bind(account.email)
            .bind(account.role_level.level())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx("insert_account", e))
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("find_account", e))
    }

    async fn find_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1");
        sqlx::query_as::<_, Account>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("find_account_by_username", e))
    }

    /// Uses `COALESCE` so each `None` in `changes` keeps the current column value.
    async fn update_account(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Account, StoreError> {
        let query = format!(
            r#"
            UPDATE accounts
            SET id_card_url = COALESCE($2, id_card_url),
                lib_card_url = COALESCE($3, lib_card_url),
                hostel_card_url = COALESCE($4, hostel_card_url),
                aadhar_card_url = COALESCE($5, aadhar_card_url),
                branch = COALESCE($6, branch),
                course = COALESCE($7, course),
                roll_number = COALESCE($8, roll_number),
                email = COALESCE($9, email),
                password_hash = COALESCE($10, password_hash)
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .bind(changes.id_card_url)
            .bind(changes.lib_card_url)
            .bind(changes.hostel_card_url)
            .bind(changes.aadhar_card_url)
            .bind(changes.branch)
            .bind(changes.course)
            .bind(changes.roll_number)
            .bind(changes.email)
            .bind(changes.password_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("update_account", e))?
            .ok_or_else(|| StoreError::NotFound("account".to_string()))
    }
}

impl PostgresRepository {
    /// Distinguishes "row gone" from "row moved on" after a conditional UPDATE matched nothing.
    async fn missed_update(&self, table: &'static str, entity: &'static str, id: i64) -> StoreError {
        let query = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = $1)");
        match sqlx::query_scalar::<_, bool>(&query)
            .bind(id)
            .fetch_one(&self.pool)
            .await
        {
            Ok(true) => StoreError::Stale,
            Ok(false) => StoreError::NotFound(entity.to_string()),
            Err(e) => map_sqlx("missed_update", e),
        }
    }
}

#[async_trait]
impl RequestRepository for PostgresRepository {
    async fn insert_request(&self, draft: RequestDraft) -> Result<ServiceRequest, StoreError> {
        let query = format!(
            "INSERT INTO service_requests \
             (requester_id, request_type, title, content, access_level, state, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 1, $7, $7) RETURNING {REQUEST_COLUMNS}"
        );
        sqlx::query_as::<_, ServiceRequest>(&query)
            .bind(draft.requester_id)
            .bind(draft.request_type)
            .bind(draft.title)
            .bind(draft.content)
            .bind(draft.access_level.level())
            .bind(RequestState::Received.code())
            .bind(draft.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx("insert_request", e))
    }

    async fn find_request(&self, id: i64) -> Result<Option<ServiceRequest>, StoreError> {
        let query = format!("SELECT {REQUEST_COLUMNS} FROM service_requests WHERE id = $1");
        sqlx::query_as::<_, ServiceRequest>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("find_request", e))
    }

    async fn list_requests_by_access_level(
        &self,
        access_level: RoleLevel,
    ) -> Result<Vec<ServiceRequest>, StoreError> {
        let query = format!(
            "SELECT {REQUEST_COLUMNS} FROM service_requests \
             WHERE access_level = $1 ORDER BY updated_at DESC, id ASC"
        );
        sqlx::query_as::<_, ServiceRequest>(&query)
            .bind(access_level.level())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx("list_requests_by_access_level", e))
    }

    async fn update_request_content(
        &self,
        id: i64,
        expected_version: i64,
        title: String,
        content: String,
        at: DateTime<Utc>,
    ) -> Result<ServiceRequest, StoreError> {
        let query = format!(
            "UPDATE service_requests \
             SET title = $3, content = $4, updated_at = $5, version = version + 1 \
             WHERE id = $1 AND version = $2 RETURNING {REQUEST_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, ServiceRequest>(&query)
            .bind(id)
            .bind(expected_version)
            .bind(title)
            .bind(content)
            .bind(at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("update_request_content", e))?;
        match updated {
            Some(request) => Ok(request),
            None => Err(self.missed_update("service_requests", "request", id).await),
        }
    }

    async fn update_request_state(
        &self,
        id: i64,
        expected_version: i64,
        state: RequestState,
        at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<ServiceRequest, StoreError> {
        let query = format!(
            "UPDATE service_requests \
             SET state = $3, updated_at = $4, completed_at = COALESCE($5, completed_at), \
                 version = version + 1 \
             WHERE id = $1 AND version = $2 RETURNING {REQUEST_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, ServiceRequest>(&query)
            .bind(id)
            .bind(expected_version)
            .bind(state.code())
            .bind(at)
            .bind(completed_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("update_request_state", e))?;
        match updated {
            Some(request) => Ok(request),
            None => Err(self.missed_update("service_requests", "request", id).await),
        }
    }
}

#[async_trait]
impl NoticeRepository for PostgresRepository {
    async fn insert_notice(&self, draft: NoticeDraft) -> Result<Notice, StoreError> {
        let query = format!(
            "INSERT INTO notices (title, content, branch, creator_id, attachment, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, 1, $6, $6) RETURNING {NOTICE_COLUMNS}"
        );
        sqlx::query_as::<_, Notice>(&query)
            .bind(draft.title)
            .bind(draft.content)
            .bind(draft.branch)
            .bind(draft.creator_id)
            .bind(draft.attachment)
            .bind(draft.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx("insert_notice", e))
    }

    async fn find_notice(&self, id: i64) -> Result<Option<Notice>, StoreError> {
        let query = format!("SELECT {NOTICE_COLUMNS} FROM notices WHERE id = $1");
        sqlx::query_as::<_, Notice>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("find_notice", e))
    }

    async fn list_notices_by_branch(&self, branch: &str) -> Result<Vec<Notice>, StoreError> {
        let query = format!(
            "SELECT {NOTICE_COLUMNS} FROM notices WHERE branch = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Notice>(&query)
            .bind(branch)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx("list_notices_by_branch", e))
    }

    async fn update_notice(
        &self,
        id: i64,
        expected_version: i64,
        title: String,
        content: String,
        at: DateTime<Utc>,
    ) -> Result<Notice, StoreError> {
        let query = format!(
            "UPDATE notices SET title = $3, content = $4, updated_at = $5, version = version + 1 \
             WHERE id = $1 AND version = $2 RETURNING {NOTICE_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Notice>(&query)
            .bind(id)
            .bind(expected_version)
            .bind(title)
            .bind(content)
            .bind(at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("update_notice", e))?;
        match updated {
            Some(notice) => Ok(notice),
            None => Err(self.missed_update("notices", "notice", id).await),
        }
    }
}

#[async_trait]
impl ResultRepository for PostgresRepository {
    /// `ON CONFLICT DO NOTHING` keeps the first ingestion; an empty RETURNING means the
    /// (account, semester) pair was already recorded.
    async fn insert_result(&self, draft: ResultDraft) -> Result<ExamResult, StoreError> {
        let query = format!(
            "INSERT INTO exam_results (account_id, semester, subjects, marks, total, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (account_id, semester) DO NOTHING RETURNING {RESULT_COLUMNS}"
        );
        sqlx::query_as::<_, ExamResult>(&query)
            .bind(draft.account_id)
            .bind(draft.semester)
            .bind(draft.subjects)
            .bind(draft.marks)
            .bind(draft.total)
            .bind(draft.created_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("insert_result", e))?
            .ok_or_else(|| StoreError::Conflict("result for this semester".to_string()))
    }

    async fn list_results_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<ExamResult>, StoreError> {
        let query = format!(
            "SELECT {RESULT_COLUMNS} FROM exam_results WHERE account_id = $1 ORDER BY semester ASC"
        );
        sqlx::query_as::<_, ExamResult>(&query)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx("list_results_for_account", e))
    }
}
