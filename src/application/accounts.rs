//! Local accounts and cookie sessions.
//!
//! Session tokens look like `ys_<prefix>_<secret>`. Only the SHA-256 of the
//! secret is stored; lookups go by prefix and the digest is compared in
//! constant time.

use std::sync::Arc;
use std::time::Duration;

use argon2::{
    Argon2, PasswordHash, PasswordVerifier,
    password_hash::{PasswordHasher, SaltString},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::guard::Viewer;
use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::{entities::UserRecord, users};

const SOURCE: &str = "yatube::application::accounts";
const TOKEN_PREFIX: &str = "ys";
const MIN_SECRET_LEN: usize = 32;

pub const DUPLICATE_USERNAME_MESSAGE: &str = "A user with that username already exists.";
pub const PASSWORD_MISMATCH_MESSAGE: &str = "The two password fields didn't match.";
pub const INVALID_LOGIN_MESSAGE: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("invalid signup: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionAuthError {
    #[error("invalid session token")]
    Invalid,
    #[error("expired session")]
    Expired,
}

#[derive(Debug, Clone, Default)]
pub struct SignupCommand {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    /// Create the account and open a session for it.
    pub async fn signup(
        &self,
        cmd: SignupCommand,
    ) -> Result<(UserRecord, IssuedSession), AccountError> {
        let mut problems = Vec::new();

        let username = match users::validate_username(&cmd.username) {
            Ok(username) => Some(username),
            Err(err) => {
                problems.push(err.to_string());
                None
            }
        };
        if let Err(err) = users::validate_password(&cmd.password) {
            problems.push(err.to_string());
        }
        if cmd.password != cmd.password_confirm {
            problems.push(PASSWORD_MISMATCH_MESSAGE.to_string());
        }
        if let Some(username) = username.as_deref()
            && self.users.find_user_by_username(username).await?.is_some()
        {
            problems.push(DUPLICATE_USERNAME_MESSAGE.to_string());
        }

        let Some(username) = username.filter(|_| problems.is_empty()) else {
            return Err(AccountError::Invalid(problems));
        };

        let password_hash = hash_password_off_thread(cmd.password.clone()).await?;
        let user = self
            .users
            .create_user(CreateUserParams {
                username,
                first_name: cmd.first_name.trim().to_string(),
                last_name: cmd.last_name.trim().to_string(),
                password_hash,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => {
                    AccountError::Invalid(vec![DUPLICATE_USERNAME_MESSAGE.to_string()])
                }
                other => AccountError::Repo(other),
            })?;

        info!(target: SOURCE, user = %user.username, "account created");
        let session = self.open_session(&user).await?;
        Ok((user, session))
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(UserRecord, IssuedSession), AccountError> {
        let user = self
            .users
            .find_user_by_username(username.trim())
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        verify_password_off_thread(password.to_string(), user.password_hash.clone()).await?;

        let session = self.open_session(&user).await?;
        info!(target: SOURCE, user = %user.username, "login succeeded");
        Ok((user, session))
    }

    /// Resolve a session cookie into the signed-in user.
    pub async fn authenticate(&self, token: &str) -> Result<Viewer, SessionAuthError> {
        let parsed = parse_token(token).ok_or(SessionAuthError::Invalid)?;

        let record = self
            .sessions
            .find_session_by_prefix(&parsed.prefix)
            .await
            .map_err(|err| {
                warn!(target: SOURCE, error = %err, "session lookup failed");
                SessionAuthError::Invalid
            })?
            .ok_or(SessionAuthError::Invalid)?;

        if record.expires_at <= OffsetDateTime::now_utc() {
            return Err(SessionAuthError::Expired);
        }

        let hashed_input = hash_secret(&parsed.secret);
        if record.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(SessionAuthError::Invalid);
        }

        let user = self
            .users
            .find_user(record.user_id)
            .await
            .map_err(|_| SessionAuthError::Invalid)?
            .ok_or(SessionAuthError::Invalid)?;

        Ok(Viewer {
            id: user.id,
            username: user.username,
        })
    }

    /// Drop the session behind the token. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), AccountError> {
        let Some(parsed) = parse_token(token) else {
            return Ok(());
        };
        if let Some(record) = self.sessions.find_session_by_prefix(&parsed.prefix).await?
            && record.hashed_secret.ct_eq(&hash_secret(&parsed.secret)).unwrap_u8() == 1
        {
            self.sessions.delete_session(record.id).await?;
        }
        Ok(())
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, AccountError> {
        let removed = self
            .sessions
            .delete_expired_sessions(OffsetDateTime::now_utc())
            .await?;
        if removed > 0 {
            info!(target: SOURCE, removed, "expired sessions purged");
        }
        Ok(removed)
    }

    async fn open_session(&self, user: &UserRecord) -> Result<IssuedSession, AccountError> {
        let prefix = generate_prefix();
        let secret = generate_secret();
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");
        let expires_at = OffsetDateTime::now_utc() + self.session_ttl;

        self.sessions
            .create_session(CreateSessionParams {
                user_id: user.id,
                prefix,
                hashed_secret: hash_secret(&secret),
                expires_at,
            })
            .await?;

        Ok(IssuedSession { token, expires_at })
    }
}

pub fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AccountError::Hashing(err.to_string()))
}

fn verify_password(password: &str, stored: &str) -> Result<(), AccountError> {
    let parsed = PasswordHash::new(stored).map_err(|err| AccountError::Hashing(err.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AccountError::InvalidCredentials)
}

/// Argon2 is CPU-bound; run it on the blocking pool.
async fn hash_password_off_thread(password: String) -> Result<String, AccountError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| AccountError::Hashing(err.to_string()))?
}

async fn verify_password_off_thread(password: String, stored: String) -> Result<(), AccountError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|err| AccountError::Hashing(err.to_string()))?
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

struct ParsedToken {
    prefix: String,
    secret: String,
}

fn parse_token(token: &str) -> Option<ParsedToken> {
    let mut parts = token.splitn(3, '_');
    if parts.next()? != TOKEN_PREFIX {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken {
        prefix: prefix.to_string(),
        secret: secret.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_round_trip_through_parser() {
        let token = format!("ys_{}_{}", generate_prefix(), generate_secret());
        let parsed = parse_token(&token).expect("parsed");
        assert_eq!(parsed.prefix.len(), 12);
        assert_eq!(parsed.secret.len(), 64);
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(parse_token("").is_none());
        assert!(parse_token("sk_abc_0123456789abcdef0123456789abcdef").is_none());
        assert!(parse_token("ys_abc_short").is_none());
        assert!(parse_token("ys__0123456789abcdef0123456789abcdef").is_none());
    }

    #[tokio::test]
    async fn hashing_runs_on_the_blocking_pool() {
        let hash = hash_password_off_thread("correct horse".to_string())
            .await
            .expect("hash");
        assert!(
            verify_password_off_thread("correct horse".to_string(), hash.clone())
                .await
                .is_ok()
        );
        assert!(matches!(
            verify_password_off_thread("wrong horse".to_string(), hash).await,
            Err(AccountError::InvalidCredentials)
        ));
    }

    #[test]
    fn password_hashes_verify() {
        let hash = hash_password("correct horse").expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AccountError::InvalidCredentials)
        ));
    }
}
