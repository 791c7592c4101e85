//! API token gate in front of the query routes.

use std::collections::HashSet;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;

pub const TOKEN_HEADER: &str = "X-API-Token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthVerdict {
    Passed,
    Missing,
    Failed,
    /// Known token without the required privileges.
    Unauthorized,
}

#[derive(Debug, Default)]
pub struct TokenGate {
    tokens: HashSet<String>,
    admin_tokens: HashSet<String>,
}

impl TokenGate {
    pub fn new(tokens: impl IntoIterator<Item = String>, admin_tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
            admin_tokens: admin_tokens.into_iter().collect(),
        }
    }

    pub fn verify(&self, headers: &HeaderMap, require_admin: bool) -> AuthVerdict {
        let Some(token) = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) else {
            return AuthVerdict::Missing;
        };

        let is_admin = self.admin_tokens.contains(token);
        if !is_admin && !self.tokens.contains(token) {
            return AuthVerdict::Failed;
        }
        if require_admin && !is_admin {
            return AuthVerdict::Unauthorized;
        }
        AuthVerdict::Passed
    }
}

pub async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    check(&state, request, next, false).await
}

pub async fn require_admin_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    check(&state, request, next, true).await
}

async fn check(state: &AppState, request: Request, next: Next, require_admin: bool) -> Response {
    match state.gate.verify(request.headers(), require_admin) {
        AuthVerdict::Passed => next.run(request).await,
        verdict => {
            debug!("rejected {} with {:?}", request.uri().path(), verdict);
            AppError::Unauthorized(verdict).into_response()
        }
    }
}
