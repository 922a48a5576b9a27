use super::{
    AccountRepository, NoticeRepository, RequestRepository, ResultRepository, StoreError,
};
use crate::models::{
    Account, ExamResult, NewAccount, Notice, NoticeDraft, ProfileChanges, RequestDraft,
    RequestState, ResultDraft, RoleLevel, ServiceRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<Uuid, Account>,
    requests: BTreeMap<i64, ServiceRequest>,
    notices: BTreeMap<i64, Notice>,
    results: BTreeMap<i64, ExamResult>,
    next_request_id: i64,
    next_notice_id: i64,
    next_result_id: i64,
}

impl Tables {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    /// Mirrors the Postgres unique constraints on username, email and roll number.
    fn account_conflict(
        &self,
        skip: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
        roll: Option<&str>,
    ) -> Option<&'static str> {
        self.accounts
            .values()
            .filter(|a| Some(a.id) != skip)
            .find_map(|a| {
                if username.is_some_and(|u| a.username == u) {
                    Some("username")
                } else if email.is_some_and(|e| a.email == e) {
                    Some("email")
                } else if roll.is_some_and(|r| a.roll_number.as_deref() == Some(r)) {
                    Some("roll number")
                } else {
                    None
                }
            })
    }
}

/// InMemoryRepository
///
/// A process-local store with the same contract as `PostgresRepository`. A single write
/// lock covers each operation, so uniqueness checks and inserts happen atomically and
/// version-checked updates are serialized. Used by the test suites and by local runs
/// without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
    // When true, every call fails as if the store timed out.
    unavailable: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable(
                "in-memory store switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for InMemoryRepository {
    async fn insert_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if let Some(field) = tables.account_conflict(
            None,
            Some(account.username.as_str()),
            Some(account.email.as_str()),
            None,
        ) {
            return Err(StoreError::Conflict(field.to_string()));
        }
        let row = Account {
            id: Uuid::new_v4(),
            username: account.username,
            password_hash: account.password_hash,
            email: account.email,
            role_level: account.role_level,
            id_card_url: None,
            lib_card_url: None,
            hostel_card_url: None,
            aadhar_card_url: None,
            branch: None,
            course: None,
            roll_number: None,
            created_at: Utc::now(),
        };
        tables.accounts.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        self.check()?;
        Ok(self.tables.read().await.accounts.get(&id).cloned())
    }

    async fn find_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn update_account(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Account, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if !tables.accounts.contains_key(&id) {
            return Err(StoreError::NotFound("account".to_string()));
        }
        if let Some(field) = tables.account_conflict(
            Some(id),
            None,
            changes.email.as_deref(),
            changes.roll_number.as_deref(),
        ) {
            return Err(StoreError::Conflict(field.to_string()));
        }
        let account = tables
            .accounts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("account".to_string()))?;
        let ProfileChanges {
            id_card_url,
            lib_card_url,
            hostel_card_url,
            aadhar_card_url,
            branch,
            course,
            roll_number,
            email,
            password_hash,
        } = changes;
        if let Some(v) = id_card_url {
            account.id_card_url = Some(v);
        }
        if let Some(v) = lib_card_url {
            account.lib_card_url = Some(v);
        }
        if let Some(v) = hostel_card_url {
            account.hostel_card_url = Some(v);
        }
        if let Some(v) = aadhar_card_url {
            account.aadhar_card_url = Some(v);
        }
        if let Some(v) = branch {
            account.branch = Some(v);
        }
        if let Some(v) = course {
            account.course = Some(v);
        }
        if let Some(v) = roll_number {
            account.roll_number = Some(v);
        }
        if let Some(v) = email {
            account.email = v;
        }
        if let Some(v) = password_hash {
            account.password_hash = v;
        }
        Ok(account.clone())
    }
}

#[async_trait]
impl RequestRepository for InMemoryRepository {
    async fn insert_request(&self, draft: RequestDraft) -> Result<ServiceRequest, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let id = Tables::next_id(&mut tables.next_request_id);
        let row = ServiceRequest {
            id,
            requester_id: draft.requester_id,
            request_type: draft.request_type,
            title: draft.title,
            content: draft.content,
            access_level: draft.access_level,
            state: RequestState::Received,
            version: 1,
            created_at: draft.created_at,
            updated_at: draft.created_at,
            completed_at: None,
        };
        tables.requests.insert(id, row.clone());
        Ok(row)
    }

    async fn find_request(&self, id: i64) -> Result<Option<ServiceRequest>, StoreError> {
        self.check()?;
        Ok(self.tables.read().await.requests.get(&id).cloned())
    }

    async fn list_requests_by_access_level(
        &self,
        access_level: RoleLevel,
    ) -> Result<Vec<ServiceRequest>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        let mut queue: Vec<ServiceRequest> = tables
            .requests
            .values()
            .filter(|r| r.access_level == access_level)
            .cloned()
            .collect();
        queue.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(queue)
    }

    async fn update_request_content(
        &self,
        id: i64,
        expected_version: i64,
        title: String,
        content: String,
        at: DateTime<Utc>,
    ) -> Result<ServiceRequest, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let request = tables
            .requests
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("request".to_string()))?;
        if request.version != expected_version {
            return Err(StoreError::Stale);
        }
        request.title = title;
        request.content = content;
        request.updated_at = at;
        request.version += 1;
        Ok(request.clone())
    }

    async fn update_request_state(
        &self,
        id: i64,
        expected_version: i64,
        state: RequestState,
        at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<ServiceRequest, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let request = tables
            .requests
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("request".to_string()))?;
        if request.version != expected_version {
            return Err(StoreError::Stale);
        }
        request.state = state;
        request.updated_at = at;
        if completed_at.is_some() {
            request.completed_at = completed_at;
        }
        request.version += 1;
        Ok(request.clone())
    }
}

#[async_trait]
impl NoticeRepository for InMemoryRepository {
    async fn insert_notice(&self, draft: NoticeDraft) -> Result<Notice, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let id = Tables::next_id(&mut tables.next_notice_id);
        let row = Notice {
            id,
            title: draft.title,
            content: draft.content,
            branch: draft.branch,
            creator_id: draft.creator_id,
            attachment: draft.attachment,
            version: 1,
            created_at: draft.created_at,
            updated_at: draft.created_at,
        };
        tables.notices.insert(id, row.clone());
        Ok(row)
    }

    async fn find_notice(&self, id: i64) -> Result<Option<Notice>, StoreError> {
        self.check()?;
        Ok(self.tables.read().await.notices.get(&id).cloned())
    }

    async fn list_notices_by_branch(&self, branch: &str) -> Result<Vec<Notice>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        let mut board: Vec<Notice> = tables
            .notices
            .values()
            .filter(|n| n.branch == branch)
            .cloned()
            .collect();
        board.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(board)
    }

    async fn update_notice(
        &self,
        id: i64,
        expected_version: i64,
        title: String,
        content: String,
        at: DateTime<Utc>,
    ) -> Result<Notice, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let notice = tables
            .notices
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("notice".to_string()))?;
        if notice.version != expected_version {
            return Err(StoreError::Stale);
        }
        notice.title = title;
        notice.content = content;
        notice.updated_at = at;
        notice.version += 1;
        Ok(notice.clone())
    }
}

#[async_trait]
impl ResultRepository for InMemoryRepository {
    async fn insert_result(&self, draft: ResultDraft) -> Result<ExamResult, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let exists = tables
            .results
            .values()
            .any(|r| r.account_id == draft.account_id && r.semester == draft.semester);
        if exists {
            return Err(StoreError::Conflict("result for this semester".to_string()));
        }
        let id = Tables::next_id(&mut tables.next_result_id);
        let row = ExamResult {
            id,
            account_id: draft.account_id,
            semester: draft.semester,
            subjects: draft.subjects,
            marks: draft.marks,
            total: draft.total,
            created_at: draft.created_at,
        };
        tables.results.insert(id, row.clone());
        Ok(row)
    }

    async fn list_results_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<ExamResult>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        let mut rows: Vec<ExamResult> = tables
            .results
            .values()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.semester);
        Ok(rows)
    }
}
