use uuid::Uuid;

use crate::{
    auth::AuthUser,
    models::{Notice, RoleLevel, ServiceRequest},
};

/// Capability
///
/// What a role level is allowed to do, before any ownership or queue matching is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    CreateRequest,
    /// See and act on the request queue whose access level equals the caller's role level.
    QueueAccess,
    ManageNotices,
    ReadOwnBranchNotices,
    ReadAnyBranchNotices,
    ReadOwnResults,
    IngestResults,
    EditOwnProfile,
}

/// Action
///
/// Every gated operation, named by what the caller is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateRequest,
    ListQueue,
    UpdateRequest,
    TransitionRequest,
    CreateNotice,
    EditNotice,
    ListNotices,
    ListResults,
    RecordResult,
    EditProfile,
}

/// Resource
///
/// The thing an action touches. Ownership and queue checks read it; `Nothing` is used
/// for actions that are gated on the role alone.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Nothing,
    Queue(RoleLevel),
    Request(&'a ServiceRequest),
    Notice(&'a Notice),
    Branch(&'a str),
    Account(Uuid),
}

use Capability::*;

// Queue access stops short of level 5: heads of department manage notices only.
const STUDENT: &[Capability] = &[
    CreateRequest,
    ReadOwnBranchNotices,
    ReadOwnResults,
    EditOwnProfile,
];
const EXAM_CELL: &[Capability] = &[
    QueueAccess,
    ManageNotices,
    ReadAnyBranchNotices,
    ReadOwnResults,
    IngestResults,
    EditOwnProfile,
];
const QUEUE_STAFF: &[Capability] = &[
    QueueAccess,
    ManageNotices,
    ReadAnyBranchNotices,
    ReadOwnResults,
    EditOwnProfile,
];
const HEAD_OF_DEPARTMENT: &[Capability] =
    &[ManageNotices, ReadAnyBranchNotices, ReadOwnResults, EditOwnProfile];

/// capabilities
///
/// The policy table: role level to capability set.
pub fn capabilities(role: RoleLevel) -> &'static [Capability] {
    match role {
        RoleLevel::Student => STUDENT,
        RoleLevel::ExamCell => EXAM_CELL,
        RoleLevel::InstitutionAdmin | RoleLevel::BranchDepartment => QUEUE_STAFF,
        RoleLevel::HeadOfDepartment => HEAD_OF_DEPARTMENT,
    }
}

pub fn has_capability(role: RoleLevel, capability: Capability) -> bool {
    capabilities(role).contains(&capability)
}

/// permit
///
/// The Authorization Gate. A pure function of the caller's identity, the action and the
/// resource; it never touches the store. An action paired with the wrong kind of resource
/// is denied.
pub fn permit(identity: &AuthUser, action: Action, resource: Resource<'_>) -> bool {
    let role = identity.role;
    let can = |capability| has_capability(role, capability);

    match (action, resource) {
        (Action::CreateRequest, Resource::Nothing) => can(CreateRequest),
        (Action::ListQueue, Resource::Queue(level)) => can(QueueAccess) && level == role,
        // Editing is tied to ownership, not to the queue the request sits in.
        (Action::UpdateRequest, Resource::Request(request)) => request.requester_id == identity.id,
        (Action::TransitionRequest, Resource::Request(request)) => {
            can(QueueAccess) && request.access_level == role
        }
        (Action::CreateNotice, Resource::Nothing) => can(ManageNotices),
        (Action::EditNotice, Resource::Notice(notice)) => notice.creator_id == identity.id,
        (Action::ListNotices, Resource::Branch(branch)) => {
            can(ReadAnyBranchNotices)
                || (can(ReadOwnBranchNotices) && identity.branch.as_deref() == Some(branch))
        }
        (Action::ListResults, Resource::Account(owner)) => {
            can(ReadOwnResults) && owner == identity.id
        }
        (Action::RecordResult, Resource::Nothing) => can(IngestResults),
        (Action::EditProfile, Resource::Account(owner)) => {
            can(EditOwnProfile) && owner == identity.id
        }
        _ => false,
    }
}
