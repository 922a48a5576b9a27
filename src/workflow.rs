use chrono::Utc;

use crate::{
    auth::AuthUser,
    error::{AppError, required},
    models::{
        CreateServiceRequest, RequestDraft, RequestState, RoleLevel, ServiceRequest,
        UpdateServiceRequest,
    },
    policy::{self, Action, Resource},
    repository::RepositoryState,
};

/// queue_for_type
///
/// The queue a request lands in. Types 2, 3 and 4 map to the matching staff level; every
/// other type falls back to the branch department.
pub fn queue_for_type(request_type: i32) -> RoleLevel {
    match request_type {
        2 => RoleLevel::ExamCell,
        3 => RoleLevel::InstitutionAdmin,
        _ => RoleLevel::BranchDepartment,
    }
}

/// RequestWorkflow
///
/// Creates requests, routes them to a queue, and moves them through their lifecycle.
#[derive(Clone)]
pub struct RequestWorkflow {
    repo: RepositoryState,
}

impl RequestWorkflow {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn create(
        &self,
        identity: &AuthUser,
        payload: CreateServiceRequest,
    ) -> Result<ServiceRequest, AppError> {
        if !policy::permit(identity, Action::CreateRequest, Resource::Nothing) {
            tracing::warn!(account_id = %identity.id, role = identity.role.level(), "request creation denied");
            return Err(AppError::permission("this role cannot raise requests"));
        }
        let title = required("title", payload.title)?;
        let request_type = payload
            .request_type
            .ok_or_else(|| AppError::validation("type is required"))?;

        let request = self
            .repo
            .insert_request(RequestDraft {
                requester_id: identity.id,
                request_type,
                title,
                content: payload.content.unwrap_or_default(),
                access_level: queue_for_type(request_type),
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!(
            request_id = request.id,
            access_level = request.access_level.level(),
            "request created"
        );
        Ok(request)
    }

    /// list
    ///
    /// The caller's queue: every request whose access level equals the caller's role,
    /// newest change first.
    pub async fn list(&self, identity: &AuthUser) -> Result<Vec<ServiceRequest>, AppError> {
        if !policy::permit(identity, Action::ListQueue, Resource::Queue(identity.role)) {
            tracing::warn!(account_id = %identity.id, role = identity.role.level(), "queue listing denied");
            return Err(AppError::permission("this role has no request queue"));
        }

        let mut requests = self
            .repo
            .list_requests_by_access_level(identity.role)
            .await?;
        // Stores already order this way; sorting again keeps the contract independent of them.
        requests.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(requests)
    }

    /// update
    ///
    /// Owner-only edit of title and content. The request type and queue never change after
    /// creation, so a `type` in the payload is ignored.
    pub async fn update(
        &self,
        identity: &AuthUser,
        request_id: i64,
        payload: UpdateServiceRequest,
    ) -> Result<ServiceRequest, AppError> {
        let current = self.find(request_id).await?;
        if !policy::permit(identity, Action::UpdateRequest, Resource::Request(&current)) {
            tracing::warn!(account_id = %identity.id, request_id, "request update denied");
            return Err(AppError::permission("only the requester may edit this request"));
        }
        let title = required("title", payload.title)?;
        let content = payload.content.unwrap_or(current.content);
        if payload
            .request_type
            .is_some_and(|t| t != current.request_type)
        {
            tracing::debug!(request_id, "ignoring request type change on update");
        }

        let updated = self
            .repo
            .update_request_content(request_id, current.version, title, content, Utc::now())
            .await?;
        tracing::info!(request_id, version = updated.version, "request updated");
        Ok(updated)
    }

    /// transition
    ///
    /// Advances a request along Received -> Read -> Processing -> {Rejected | Completed}.
    /// Only staff of the request's own queue may do this.
    pub async fn transition(
        &self,
        identity: &AuthUser,
        request_id: i64,
        next: RequestState,
    ) -> Result<ServiceRequest, AppError> {
        let current = self.find(request_id).await?;
        if !policy::permit(identity, Action::TransitionRequest, Resource::Request(&current)) {
            tracing::warn!(account_id = %identity.id, request_id, "request transition denied");
            return Err(AppError::permission("request belongs to another queue"));
        }
        if !current.state.can_transition_to(next) {
            return Err(AppError::validation(format!(
                "cannot move request from state {} to {}",
                current.state.code(),
                next.code()
            )));
        }

        let now = Utc::now();
        let completed_at = next.is_terminal().then_some(now);
        let updated = self
            .repo
            .update_request_state(request_id, current.version, next, now, completed_at)
            .await?;
        tracing::info!(request_id, state = next.code(), "request state changed");
        Ok(updated)
    }

    async fn find(&self, request_id: i64) -> Result<ServiceRequest, AppError> {
        self.repo
            .find_request(request_id)
            .await?
            .ok_or_else(|| AppError::not_found("request"))
    }
}
