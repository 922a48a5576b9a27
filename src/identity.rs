use uuid::Uuid;

use crate::{
    auth::{AuthUser, HashedCredential, HasherState},
    error::{AppError, required},
    models::{
        Account, NewAccount, ProfileChanges, RegisterAccountRequest, RoleLevel,
        UpdateProfileRequest,
    },
    policy::{self, Action, Resource},
    repository::RepositoryState,
};

/// IdentityStore
///
/// Registration, credential checks and self-service profile edits. Holds the store and the
/// injected hashing capability; cheap to construct per call.
#[derive(Clone)]
pub struct IdentityStore {
    repo: RepositoryState,
    hasher: HasherState,
}

impl IdentityStore {
    pub fn new(repo: RepositoryState, hasher: HasherState) -> Self {
        Self { repo, hasher }
    }

    /// register
    ///
    /// Creates an account. An out-of-range or missing role level becomes a student.
    /// Duplicate usernames or emails are rejected by the store's unique constraints, so two
    /// racing registrations cannot both succeed.
    pub async fn register(&self, payload: RegisterAccountRequest) -> Result<Account, AppError> {
        let username = required("username", payload.username)?.trim().to_string();
        validate_username(&username)?;
        let password = required("password", payload.password)?;
        let email = required("email", payload.email)?.trim().to_string();
        validate_email(&email)?;
        let role_level = payload
            .role_level
            .map(RoleLevel::clamped)
            .unwrap_or_default();

        let password_hash = self.hash(password).await?.into_string();
        let account = self
            .repo
            .insert_account(NewAccount {
                username,
                password_hash,
                email,
                role_level,
            })
            .await?;

        tracing::info!(
            account_id = %account.id,
            role = account.role_level.level(),
            "account registered"
        );
        Ok(account)
    }

    /// authenticate
    ///
    /// Unknown usernames still pay for a hash verification (against the decoy) and yield the
    /// same `AppError::Auth` as a wrong password.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Account, AppError> {
        let account = self.repo.find_account_by_username(username).await?;
        let stored = account.as_ref().map(|a| a.password_hash.clone());
        let matched = self.verify(password.to_string(), stored).await?;
        match account {
            Some(account) if matched => Ok(account),
            _ => {
                tracing::debug!("authentication rejected");
                Err(AppError::Auth)
            }
        }
    }

    pub async fn account(&self, id: Uuid) -> Result<Account, AppError> {
        self.repo
            .find_account(id)
            .await?
            .ok_or_else(|| AppError::not_found("account"))
    }

    /// update_profile
    ///
    /// Writes only the fields present in `payload`, for the caller's own account. Every
    /// field is validated before the single store write.
    pub async fn update_profile(
        &self,
        identity: &AuthUser,
        payload: UpdateProfileRequest,
    ) -> Result<Account, AppError> {
        if !policy::permit(identity, Action::EditProfile, Resource::Account(identity.id)) {
            return Err(AppError::permission("profile can only be edited by its owner"));
        }

        let changes = ProfileChanges {
            id_card_url: optional_url("id_card_url", payload.id_card_url)?,
            lib_card_url: optional_url("lib_card_url", payload.lib_card_url)?,
            hostel_card_url: optional_url("hostel_card_url", payload.hostel_card_url)?,
            aadhar_card_url: optional_url("aadhar_card_url", payload.aadhar_card_url)?,
            branch: optional_text("branch", payload.branch)?,
            course: optional_text("course", payload.course)?,
            roll_number: optional_text("roll_number", payload.roll_number)?,
            email: match optional_text("email", payload.email)? {
                Some(email) => {
                    validate_email(&email)?;
                    Some(email)
                }
                None => None,
            },
            password_hash: match payload.password {
                Some(password) if password.is_empty() => {
                    return Err(AppError::validation("password must not be empty"));
                }
                Some(password) => Some(self.hash(password).await?.into_string()),
                None => None,
            },
        };
        if changes.is_empty() {
            return Err(AppError::validation("no profile fields supplied"));
        }

        let account = self.repo.update_account(identity.id, changes).await?;
        tracing::info!(account_id = %account.id, "profile updated");
        Ok(account)
    }

    // Argon2 is CPU-bound, so both directions run on the blocking pool.

    async fn hash(&self, password: String) -> Result<HashedCredential, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
    }

    /// Verifies against `stored`, or against the decoy when there is no such account.
    async fn verify(&self, password: String, stored: Option<String>) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || match stored {
            Some(hash) => hasher.verify(&password, &hash),
            None => {
                let _ = hasher.verify(&password, hasher.decoy_hash());
                false
            }
        })
        .await
        .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))
    }
}

// Basic auth splits on the first ':', so a username holding one could never log in.
fn validate_username(username: &str) -> Result<(), AppError> {
    if username.contains(':') || username.contains(char::is_control) {
        return Err(AppError::validation(
            "username must not contain ':' or control characters",
        ));
    }
    Ok(())
}

fn optional_text(field: &str, value: Option<String>) -> Result<Option<String>, AppError> {
    match value {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => {
            Err(AppError::validation(format!("{field} must not be blank")))
        }
        Some(v) => Ok(Some(v.trim().to_string())),
    }
}

fn optional_url(field: &str, value: Option<String>) -> Result<Option<String>, AppError> {
    let Some(url) = optional_text(field, value)? else {
        return Ok(None);
    };
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host) if !host.is_empty() && !host.contains(char::is_whitespace) => Ok(Some(url)),
        _ => Err(AppError::validation(format!("{field} must be an http(s) URL"))),
    }
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AppError::validation("email is not a valid address"))
    }
}
