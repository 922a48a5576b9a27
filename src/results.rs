use chrono::Utc;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppError,
    models::{ExamResult, RecordResultRequest, ResultDraft},
    policy::{self, Action, Resource},
    repository::{RepositoryState, StoreError},
};

/// ResultLedger
///
/// Per-semester marks. Students read their own rows; the exam cell ingests.
#[derive(Clone)]
pub struct ResultLedger {
    repo: RepositoryState,
}

impl ResultLedger {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// record
    ///
    /// Stores one semester of marks with `total` fixed to their mean. A second record for
    /// the same (account, semester) is rejected and the existing row is kept as is.
    pub async fn record(
        &self,
        account_id: Uuid,
        semester: i32,
        subjects: Vec<String>,
        marks: Vec<f64>,
    ) -> Result<ExamResult, AppError> {
        if marks.is_empty() {
            return Err(AppError::validation("marks must not be empty"));
        }
        if subjects.len() != marks.len() {
            return Err(AppError::validation(format!(
                "{} subjects but {} marks",
                subjects.len(),
                marks.len()
            )));
        }
        if marks.iter().any(|m| !m.is_finite()) {
            return Err(AppError::validation("marks must be finite numbers"));
        }
        if self.repo.find_account(account_id).await?.is_none() {
            return Err(AppError::not_found("account"));
        }

        let total = mean(&marks);
        let draft = ResultDraft {
            account_id,
            semester,
            subjects,
            marks,
            total,
            created_at: Utc::now(),
        };
        match self.repo.insert_result(draft).await {
            Ok(result) => {
                tracing::info!(result_id = result.id, %account_id, semester, "result recorded");
                Ok(result)
            }
            Err(StoreError::Conflict(_)) => {
                tracing::warn!(%account_id, semester, "duplicate result ingestion ignored");
                Err(AppError::validation(format!(
                    "a result for semester {semester} is already recorded"
                )))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// The exam-cell entry point for `record`.
    pub async fn ingest(
        &self,
        identity: &AuthUser,
        payload: RecordResultRequest,
    ) -> Result<ExamResult, AppError> {
        if !policy::permit(identity, Action::RecordResult, Resource::Nothing) {
            tracing::warn!(account_id = %identity.id, "result ingestion denied");
            return Err(AppError::permission("only the examination cell may record results"));
        }
        let account_id = payload
            .account_id
            .ok_or_else(|| AppError::validation("account_id is required"))?;
        let semester = payload
            .semester
            .ok_or_else(|| AppError::validation("semester is required"))?;
        self.record(account_id, semester, payload.subjects, payload.marks)
            .await
    }

    /// The caller's own results, by semester ascending.
    pub async fn list(&self, identity: &AuthUser) -> Result<Vec<ExamResult>, AppError> {
        if !policy::permit(identity, Action::ListResults, Resource::Account(identity.id)) {
            return Err(AppError::permission("results are only visible to their owner"));
        }
        let mut results = self.repo.list_results_for_account(identity.id).await?;
        results.sort_by_key(|r| r.semester);
        Ok(results)
    }
}

// Running mean, so large finite marks cannot overflow an intermediate sum.
fn mean(marks: &[f64]) -> f64 {
    marks
        .iter()
        .enumerate()
        .fold(0.0, |acc, (i, m)| acc + (m - acc) / (i + 1) as f64)
}
