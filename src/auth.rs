use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use password_hash::{PasswordHash, SaltString};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppError,
    identity::IdentityStore,
    models::{Account, RoleLevel},
    repository::RepositoryState,
};

/// AuthUser
///
/// The resolved identity of an authenticated call. It is built once per request by the
/// extractor below, cached in the request extensions, and passed explicitly into every
/// policy check and service call. Nothing about it is stored process-wide.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: RoleLevel,
    /// Used to scope notice visibility for students.
    pub branch: Option<String>,
}

impl From<&Account> for AuthUser {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            role: account.role_level,
            branch: account.branch.clone(),
        }
    }
}

/// HashedCredential
///
/// A PHC-format password hash. Only ever produced by a `CredentialHasher`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedCredential(String);

impl HashedCredential {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// CredentialHasher
///
/// The hashing capability injected into the Identity Store. `decoy_hash` is a valid hash
/// of an unguessable secret, verified against when a username is unknown so that both
/// failure paths cost the same.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<HashedCredential, AppError>;
    fn verify(&self, password: &str, hash: &str) -> bool;
    fn decoy_hash(&self) -> &str;
}

/// HasherState
///
/// Shared handle to the hashing capability, pulled into handlers and the extractor via `FromRef`.
pub type HasherState = Arc<dyn CredentialHasher>;

/// Argon2Hasher
///
/// Argon2id with a per-hash random salt. The memory cost comes from `AppConfig` so tests
/// can run with a cheap setting.
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
    decoy: String,
}

impl Argon2Hasher {
    pub fn new(memory_kib: u32) -> Result<Self, AppError> {
        let params = Params::new(
            memory_kib,
            Params::DEFAULT_T_COST,
            Params::DEFAULT_P_COST,
            None,
        )
        .map_err(|e| AppError::Internal(format!("invalid argon2 params: {e}")))?;

        let mut hasher = Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            decoy: String::new(),
        };
        let mut secret = [0u8; 32];
        getrandom::getrandom(&mut secret).map_err(|e| AppError::Internal(e.to_string()))?;
        let decoy_secret = STANDARD.encode(secret);
        hasher.decoy = hasher.hash(&decoy_secret)?.into_string();
        Ok(hasher)
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<HashedCredential, AppError> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| AppError::Internal(e.to_string()))?;
        let salt =
            SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::Internal(e.to_string()))?;
        let phc = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(e.to_string()))?
            .to_string();
        Ok(HashedCredential(phc))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    fn decoy_hash(&self) -> &str {
        &self.decoy
    }
}

/// Credentials
///
/// Username and password presented on a single call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// parse_basic
///
/// Decodes an `Authorization: Basic <base64(username:password)>` header value.
/// The password may itself contain ':'; only the first one splits.
pub fn parse_basic(header_value: &str) -> Option<Credentials> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (username, password) = text.split_once(':')?;
    if username.is_empty() {
        return None;
    }
    Some(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// AuthUser Extractor Implementation
///
/// Resolves the caller from Basic-Auth credentials on every call (there are no sessions).
///
/// 1. Reuse: if an earlier extractor in this request already resolved the identity
///    (e.g. the route-level middleware), return the cached copy from the extensions.
/// 2. Credential extraction from the `Authorization` header.
/// 3. Verification through the Identity Store, which answers unknown-user and
///    wrong-password identically.
///
/// Rejection: `AppError::Auth` (401 with a Basic challenge) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    HasherState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let credentials = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_basic)
            .ok_or(AppError::Auth)?;

        let identity =
            IdentityStore::new(RepositoryState::from_ref(state), HasherState::from_ref(state));
        let account = identity
            .authenticate(&credentials.username, &credentials.password)
            .await?;

        let user = AuthUser::from(&account);
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(raw: &str) -> String {
        format!("Basic {}", STANDARD.encode(raw))
    }

    #[test]
    fn test_parse_basic_splits_on_first_colon() {
        let creds = parse_basic(&basic("alice:pa:ss")).unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "pa:ss");
    }

    #[test]
    fn test_parse_basic_rejects_malformed_headers() {
        assert!(parse_basic("Bearer abc").is_none());
        assert!(parse_basic("Basic !!!not-base64").is_none());
        assert!(parse_basic(&basic("no-colon")).is_none());
        assert!(parse_basic(&basic(":password")).is_none());
    }

    #[test]
    fn test_argon2_hash_verifies_and_salts() {
        let hasher = Argon2Hasher::new(64).unwrap();
        let first = hasher.hash("s3cret").unwrap();
        let second = hasher.hash("s3cret").unwrap();

        assert_ne!(first, second, "each hash gets its own salt");
        assert!(hasher.verify("s3cret", first.as_str()));
        assert!(!hasher.verify("wrong", first.as_str()));
        assert!(!hasher.verify("s3cret", "not-a-phc-string"));
    }

    #[test]
    fn test_decoy_hash_is_a_valid_hash() {
        let hasher = Argon2Hasher::new(64).unwrap();
        assert!(PasswordHash::new(hasher.decoy_hash()).is_ok());
        assert!(!hasher.verify("", hasher.decoy_hash()));
    }
}
