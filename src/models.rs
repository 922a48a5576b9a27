use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Enumerations ---

/// RoleLevel
///
/// The fixed five-level role taxonomy. The numeric level is what travels over the wire
/// and what is stored; the names exist so policy code never compares bare integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum RoleLevel {
    Student = 1,
    ExamCell = 2,
    InstitutionAdmin = 3,
    BranchDepartment = 4,
    HeadOfDepartment = 5,
}

/// Raised when a stored or submitted code is outside the known range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} code {code}")]
pub struct CodeError {
    pub kind: &'static str,
    pub code: i16,
}

impl RoleLevel {
    /// Registration input is clamped: anything outside 1..=5 becomes a student.
    pub fn clamped(raw: i64) -> Self {
        i16::try_from(raw)
            .ok()
            .and_then(|code| Self::try_from(code).ok())
            .unwrap_or(Self::Student)
    }

    pub fn level(self) -> i16 {
        self as i16
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::ExamCell => "exam_cell",
            Self::InstitutionAdmin => "institution_admin",
            Self::BranchDepartment => "branch_department",
            Self::HeadOfDepartment => "head_of_department",
        }
    }
}

impl Default for RoleLevel {
    fn default() -> Self {
        Self::Student
    }
}

impl TryFrom<i16> for RoleLevel {
    type Error = CodeError;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Student),
            2 => Ok(Self::ExamCell),
            3 => Ok(Self::InstitutionAdmin),
            4 => Ok(Self::BranchDepartment),
            5 => Ok(Self::HeadOfDepartment),
            code => Err(CodeError { kind: "role level", code }),
        }
    }
}

impl From<RoleLevel> for i16 {
    fn from(role: RoleLevel) -> i16 {
        role.level()
    }
}

/// RequestState
///
/// Lifecycle of a request. The wire codes keep the historical gap at 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum RequestState {
    Received = 0,
    Read = 1,
    Processing = 3,
    Rejected = 4,
    Completed = 5,
}

impl RequestState {
    pub fn code(self) -> i16 {
        self as i16
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Completed)
    }

    /// Forward-only edges: Received -> Read -> Processing -> {Rejected | Completed}.
    pub fn can_transition_to(self, next: RequestState) -> bool {
        matches!(
            (self, next),
            (Self::Received, Self::Read)
                | (Self::Read, Self::Processing)
                | (Self::Processing, Self::Rejected)
                | (Self::Processing, Self::Completed)
        )
    }
}

impl Default for RequestState {
    fn default() -> Self {
        Self::Received
    }
}

impl TryFrom<i16> for RequestState {
    type Error = CodeError;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Received),
            1 => Ok(Self::Read),
            3 => Ok(Self::Processing),
            4 => Ok(Self::Rejected),
            5 => Ok(Self::Completed),
            code => Err(CodeError { kind: "request state", code }),
        }
    }
}

impl From<RequestState> for i16 {
    fn from(state: RequestState) -> i16 {
        state.code()
    }
}

// --- Core Records (Mapped to Database) ---

/// Account
///
/// The identity record in the `accounts` table. Never serialized directly because it holds
/// the credential hash; `AccountProfile` is the outward view.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    #[sqlx(try_from = "i16")]
    pub role_level: RoleLevel,
    pub id_card_url: Option<String>,
    pub lib_card_url: Option<String>,
    pub hostel_card_url: Option<String>,
    pub aadhar_card_url: Option<String>,
    pub branch: Option<String>,
    pub course: Option<String>,
    pub roll_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// ServiceRequest
///
/// An administrative request raised by an account. `access_level` is the queue it lives in,
/// fixed at creation from `request_type`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct ServiceRequest {
    pub id: i64,
    pub requester_id: Uuid,
    pub request_type: i32,
    pub title: String,
    pub content: String,
    #[sqlx(try_from = "i16")]
    #[ts(type = "number")]
    #[schema(value_type = i16)]
    pub access_level: RoleLevel,
    #[sqlx(try_from = "i16")]
    #[ts(type = "number")]
    #[schema(value_type = i16)]
    pub state: RequestState,
    // Bumped on every write; updates must present the version they read.
    pub version: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Notice
///
/// A branch-scoped announcement. Only `creator_id` may edit title and content.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Notice {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub branch: String,
    pub creator_id: Uuid,
    // S3 key from the presigned upload flow.
    pub attachment: Option<String>,
    pub version: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// ExamResult
///
/// One semester of marks for one account. `total` is the mean of `marks`, stored at
/// ingestion and never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct ExamResult {
    pub id: i64,
    pub account_id: Uuid,
    pub semester: i32,
    pub subjects: Vec<String>,
    pub marks: Vec<f64>,
    pub total: f64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Store Inputs ---

/// Insert shape for a freshly registered account (credential already hashed).
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub role_level: RoleLevel,
}

/// Partial update for an account. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub id_card_url: Option<String>,
    pub lib_card_url: Option<String>,
    pub hostel_card_url: Option<String>,
    pub aadhar_card_url: Option<String>,
    pub branch: Option<String>,
    pub course: Option<String>,
    pub roll_number: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.id_card_url.is_none()
            && self.lib_card_url.is_none()
            && self.hostel_card_url.is_none()
            && self.aadhar_card_url.is_none()
            && self.branch.is_none()
            && self.course.is_none()
            && self.roll_number.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct RequestDraft {
    pub requester_id: Uuid,
    pub request_type: i32,
    pub title: String,
    pub content: String,
    pub access_level: RoleLevel,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NoticeDraft {
    pub title: String,
    pub content: String,
    pub branch: String,
    pub creator_id: Uuid,
    pub attachment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ResultDraft {
    pub account_id: Uuid,
    pub semester: i32,
    pub subjects: Vec<String>,
    pub marks: Vec<f64>,
    pub total: f64,
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

// Fields are optional at the serde level so a missing field surfaces as a named
// validation error from the service rather than a generic decode failure.

/// RegisterAccountRequest
///
/// Input payload for POST /accounts.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterAccountRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "roleLevel")]
    pub role_level: Option<i64>,
}

/// CreateServiceRequest
///
/// Input payload for POST /requests. The queue is derived server-side from `type`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateServiceRequest {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub request_type: Option<i32>,
    pub content: Option<String>,
}

/// UpdateServiceRequest
///
/// Input payload for POST /requests/{id}. `type` is accepted for compatibility but a
/// request never changes queue after creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateServiceRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub request_type: Option<i32>,
}

/// TransitionRequest
///
/// Input payload for POST /requests/{id}/state.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TransitionRequest {
    #[ts(type = "number")]
    #[schema(value_type = i16)]
    pub state: RequestState,
}

/// CreateNoticeRequest
///
/// Input payload for POST /notices.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateNoticeRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub branch: Option<String>,
    // Key returned by POST /uploads/presigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_key: Option<String>,
}

/// UpdateNoticeRequest
///
/// Input payload for POST /notices/{id}. The body `id` must match the path.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateNoticeRequest {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub content: Option<String>,
}

/// NoticeQuery
///
/// Branch filter for /notices/query, read from the query string (GET) or the body (POST).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, utoipa::IntoParams)]
#[ts(export)]
pub struct NoticeQuery {
    pub branch: Option<String>,
}

/// RecordResultRequest
///
/// Input payload for POST /results (exam-cell ingestion).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RecordResultRequest {
    pub account_id: Option<Uuid>,
    pub semester: Option<i32>,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub marks: Vec<f64>,
}

/// UpdateProfileRequest
///
/// Partial update payload for POST /profile. Only present fields are written.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_card_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lib_card_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostel_card_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aadhar_card_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived S3 upload URL (POST /uploads/presigned).
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "hostel_card.pdf")]
    pub filename: String,
    /// The MIME type the upload is constrained to.
    #[schema(example = "application/pdf")]
    pub file_type: String,
}

/// PresignedUrlResponse
///
/// The temporary PUT URL and the object key to reference afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    pub upload_url: String,
    pub resource_key: String,
}

// --- Output Schemas ---

/// AccountProfile
///
/// Outward view of an account (POST /login, POST /accounts, POST /profile).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AccountProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[ts(type = "number")]
    #[schema(value_type = i16)]
    pub role_level: RoleLevel,
    pub roll_number: Option<String>,
    pub branch: Option<String>,
    pub course: Option<String>,
    pub id_card_url: Option<String>,
    pub lib_card_url: Option<String>,
    pub hostel_card_url: Option<String>,
    pub aadhar_card_url: Option<String>,
}

impl From<&Account> for AccountProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            role_level: account.role_level,
            roll_number: account.roll_number.clone(),
            branch: account.branch.clone(),
            course: account.course.clone(),
            id_card_url: account.id_card_url.clone(),
            lib_card_url: account.lib_card_url.clone(),
            hostel_card_url: account.hostel_card_url.clone(),
            aadhar_card_url: account.aadhar_card_url.clone(),
        }
    }
}

/// ServiceBanner
///
/// Returned by GET / to confirm who the caller authenticated as.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ServiceBanner {
    pub name: String,
    pub api: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Envelope
///
/// Success wrapper: `{"code": <status>, "content": <payload>}`. The HTTP status matches `code`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub content: T,
}

impl<T> Envelope<T> {
    pub fn ok(content: T) -> Self {
        Self { code: StatusCode::OK.as_u16(), content }
    }

    pub fn created(content: T) -> Self {
        Self { code: StatusCode::CREATED.as_u16(), content }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_level_clamps_out_of_range_to_student() {
        assert_eq!(RoleLevel::clamped(0), RoleLevel::Student);
        assert_eq!(RoleLevel::clamped(6), RoleLevel::Student);
        assert_eq!(RoleLevel::clamped(-3), RoleLevel::Student);
        assert_eq!(RoleLevel::clamped(i64::MAX), RoleLevel::Student);
        assert_eq!(RoleLevel::clamped(4), RoleLevel::BranchDepartment);
        assert_eq!(RoleLevel::clamped(5), RoleLevel::HeadOfDepartment);
    }

    #[test]
    fn test_role_level_serializes_as_number() {
        let json = serde_json::to_string(&RoleLevel::InstitutionAdmin).unwrap();
        assert_eq!(json, "3");
        assert!(serde_json::from_str::<RoleLevel>("9").is_err());
    }

    #[test]
    fn test_request_state_keeps_wire_codes() {
        assert_eq!(RequestState::Processing.code(), 3);
        assert_eq!(RequestState::Completed.code(), 5);
        assert!(RequestState::try_from(2).is_err());
        assert_eq!(serde_json::to_string(&RequestState::Rejected).unwrap(), "4");
    }

    #[test]
    fn test_request_state_edges_are_forward_only() {
        use RequestState::*;
        assert!(Received.can_transition_to(Read));
        assert!(Read.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Rejected));

        assert!(!Received.can_transition_to(Completed));
        assert!(!Received.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Read));
        assert!(!Completed.can_transition_to(Rejected));
        assert!(!Read.can_transition_to(Read));
    }

    #[test]
    fn test_create_request_payload_reads_type_field() {
        let payload: CreateServiceRequest =
            serde_json::from_str(r#"{"title":"Bonafide","type":3,"content":"for visa"}"#).unwrap();
        assert_eq!(payload.request_type, Some(3));
    }

    #[test]
    fn test_register_payload_accepts_camel_case_role() {
        let payload: RegisterAccountRequest = serde_json::from_str(
            r#"{"username":"alice","password":"pw","email":"a@x.in","roleLevel":2}"#,
        )
        .unwrap();
        assert_eq!(payload.role_level, Some(2));

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["roleLevel"], 2);
        assert!(json.get("role_level").is_none());
    }

    #[test]
    fn test_envelope_shape() {
        let json = serde_json::to_value(Envelope::created("done")).unwrap();
        assert_eq!(json["code"], 201);
        assert_eq!(json["content"], "done");
    }
}
