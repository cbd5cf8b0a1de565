//! Authentication middleware.
//!
//! Import routes take a Bearer token. When `AUTH_SECRET` is configured the
//! token must equal it; without a secret every request is accepted as
//! anonymous.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::AppState;

/// Authenticated caller extracted from request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// `None` when the server runs without a secret
    pub token: Option<String>,
}

impl AuthUser {
    /// Label used in logs; never the token itself.
    pub fn label(&self) -> &'static str {
        if self.token.is_some() {
            "bearer"
        } else {
            "anonymous"
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let Some(secret) = state.config.auth_secret.as_deref() else {
            return Ok(AuthUser { token: None });
        };

        match auth_header {
            Some(header) if header.starts_with("Bearer ") => {
                let token = header.trim_start_matches("Bearer ").trim();

                if token.is_empty() {
                    return Err(AppError::Unauthorized("Empty bearer token"));
                }
                if !constant_time_eq(token.as_bytes(), secret.as_bytes()) {
                    return Err(AppError::Unauthorized("Invalid bearer token"));
                }

                Ok(AuthUser {
                    token: Some(token.to_string()),
                })
            }
            Some(_) => Err(AppError::Unauthorized(
                "Invalid authorization header format",
            )),
            None => Err(AppError::Unauthorized("Missing authorization header")),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
