use chrono::Utc;

use crate::{
    auth::AuthUser,
    error::{AppError, required},
    models::{CreateNoticeRequest, Notice, NoticeDraft, UpdateNoticeRequest},
    policy::{self, Action, Resource},
    repository::RepositoryState,
};

/// NoticeBoard
///
/// Branch-scoped announcements. Staff publish; only the creator edits.
#[derive(Clone)]
pub struct NoticeBoard {
    repo: RepositoryState,
}

impl NoticeBoard {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn create(
        &self,
        identity: &AuthUser,
        payload: CreateNoticeRequest,
    ) -> Result<Notice, AppError> {
        if !policy::permit(identity, Action::CreateNotice, Resource::Nothing) {
            tracing::warn!(account_id = %identity.id, "notice creation denied");
            return Err(AppError::permission("only staff may publish notices"));
        }
        let title = required("title", payload.title)?;
        let content = required("content", payload.content)?;
        let branch = required("branch", payload.branch)?.trim().to_string();
        let attachment = payload.attachment_key.filter(|key| !key.trim().is_empty());

        let notice = self
            .repo
            .insert_notice(NoticeDraft {
                title,
                content,
                branch,
                creator_id: identity.id,
                attachment,
                created_at: Utc::now(),
            })
            .await?;
        tracing::info!(notice_id = notice.id, branch = %notice.branch, "notice published");
        Ok(notice)
    }

    /// update
    ///
    /// The creator check runs before anything is written, so a denied edit leaves the
    /// notice exactly as it was.
    pub async fn update(
        &self,
        identity: &AuthUser,
        notice_id: i64,
        payload: UpdateNoticeRequest,
    ) -> Result<Notice, AppError> {
        let current = self
            .repo
            .find_notice(notice_id)
            .await?
            .ok_or_else(|| AppError::not_found("notice"))?;
        if !policy::permit(identity, Action::EditNotice, Resource::Notice(&current)) {
            tracing::warn!(account_id = %identity.id, notice_id, "notice edit denied");
            return Err(AppError::permission("only the creator may edit this notice"));
        }
        let title = required("title", payload.title)?;
        let content = required("content", payload.content)?;

        let updated = self
            .repo
            .update_notice(notice_id, current.version, title, content, Utc::now())
            .await?;
        tracing::info!(notice_id, version = updated.version, "notice updated");
        Ok(updated)
    }

    /// list
    ///
    /// Newest first. A branch with nothing posted yields an empty list.
    pub async fn list(
        &self,
        identity: &AuthUser,
        branch: Option<String>,
    ) -> Result<Vec<Notice>, AppError> {
        let branch = required("branch", branch)?;
        let branch = branch.trim();
        if !policy::permit(identity, Action::ListNotices, Resource::Branch(branch)) {
            return Err(AppError::permission("notices of other branches are not visible"));
        }
        Ok(self.repo.list_notices_by_branch(branch).await?)
    }
}
