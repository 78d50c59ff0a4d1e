//! Request signing.
//!
//! The session asks its [`Authenticator`] for a credential header before
//! every connection attempt, so short-lived credentials are never reused
//! across reconnects.

use std::env;

use thiserror::Error;

use crate::transport::{RequestHeader, StreamRequest};

/// Failure to produce a credential. Never retried.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// A required credential is absent.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// The credential cannot be sent as a header value.
    #[error("credential is not a valid header value: {0}")]
    InvalidHeader(String),

    /// The signer refused the request.
    #[error("signing failed: {0}")]
    Rejected(String),
}

/// Produces the credential header for a request.
#[cfg_attr(test, mockall::automock)]
pub trait Authenticator: Send + Sync {
    /// Sign `request`. `Ok(None)` sends no credential header.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when no credential can be produced.
    fn sign(&self, request: &StreamRequest) -> Result<Option<RequestHeader>, AuthError>;
}

/// Sends no credentials.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAuth;

impl Authenticator for NoAuth {
    fn sign(&self, _request: &StreamRequest) -> Result<Option<RequestHeader>, AuthError> {
        Ok(None)
    }
}

/// Application-only bearer token.
///
/// # Examples
///
/// ```
/// use streamwire::{
///     auth::{Authenticator, BearerToken},
///     transport::StreamRequest,
/// };
///
/// let auth = BearerToken::new("abc").unwrap();
/// let header = auth.sign(&StreamRequest::get("https://example.com")).unwrap().unwrap();
/// assert_eq!(header.to_string(), "Authorization: Bearer abc");
/// ```
#[derive(Clone)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    /// Wrap a token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingCredential`] for an empty token and
    /// [`AuthError::InvalidHeader`] when it contains control characters.
    pub fn new(token: impl Into<String>) -> Result<Self, AuthError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(AuthError::MissingCredential("bearer token".to_owned()));
        }
        if token.chars().any(char::is_control) {
            return Err(AuthError::InvalidHeader("bearer token".to_owned()));
        }
        Ok(Self { token })
    }

    /// Read the token from environment variable `var`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingCredential`] when the variable is unset or
    /// empty.
    pub fn from_env(var: &str) -> Result<Self, AuthError> {
        let token = env::var(var).map_err(|_| AuthError::MissingCredential(var.to_owned()))?;
        Self::new(token)
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken").finish_non_exhaustive()
    }
}

impl Authenticator for BearerToken {
    fn sign(&self, _request: &StreamRequest) -> Result<Option<RequestHeader>, AuthError> {
        Ok(Some(RequestHeader::new(
            "Authorization",
            format!("Bearer {}", self.token),
        )))
    }
}

/// A fixed header computed elsewhere.
#[derive(Clone, Debug)]
pub struct StaticHeader(RequestHeader);

impl StaticHeader {
    /// Send `header` on every attempt.
    #[must_use]
    pub fn new(header: RequestHeader) -> Self { Self(header) }
}

impl Authenticator for StaticHeader {
    fn sign(&self, _request: &StreamRequest) -> Result<Option<RequestHeader>, AuthError> {
        Ok(Some(self.0.clone()))
    }
}
