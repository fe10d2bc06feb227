//! Reference endpoints protected by the engine.

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::config::UserCredential;
use crate::http::request::RequestIdExt;
use crate::observability::audit::{AuditContext, AuditSink, SecurityEventType};
use crate::rate_limit::RateLimitTicket;
use crate::security::bot::BotVerdict;
use crate::security::context::SecurityContextValidator;
use crate::security::error::ValidationError;
use crate::security::identity::UserContext;
use crate::security::input::{client_ip_for, validate_redirect_url};

/// Shared state for the reference endpoints.
#[derive(Clone)]
pub struct AppState {
    pub security: Arc<SecurityContextValidator>,
    pub audit: Arc<dyn AuditSink>,
    pub users: Arc<Vec<UserCredential>>,
    /// Allow-list for redirect targets.
    pub redirect_origins: Arc<Vec<String>>,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Issue a CSRF token in the body and in the double-submit cookie.
pub async fn issue_csrf(State(state): State<AppState>) -> Response {
    let csrf = state.security.csrf();
    let token = csrf.issue();
    let cookie = csrf.cookie(&token);

    (
        [(header::SET_COOKIE, cookie), (header::CACHE_CONTROL, "no-store".to_string())],
        Json(json!({ "csrfToken": token })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

fn find_user<'a>(users: &'a [UserCredential], email: &str, password: &str) -> Option<&'a UserCredential> {
    // Every account is compared so the response time does not reveal which emails exist.
    let mut found = None;
    for user in users {
        let email_ok = user.email.to_lowercase().as_bytes().ct_eq(email.as_bytes());
        let password_ok = user.password.as_bytes().ct_eq(password.as_bytes());
        if bool::from(email_ok & password_ok) {
            found = Some(user);
        }
    }
    found
}

/// Check credentials; a successful sign-in clears the attempt counter.
pub async fn sign_in(
    State(state): State<AppState>,
    Extension(ticket): Extension<RateLimitTicket>,
    Json(body): Json<SignInRequest>,
) -> Result<Response, ValidationError> {
    let email = state
        .security
        .sanitize(&body.email)
        .map_err(|e| e.with_field("email"))?
        .to_lowercase();
    if email.is_empty() || body.password.is_empty() {
        return Err(ValidationError::new("Email and password are required"));
    }

    match find_user(&state.users, &email, &body.password) {
        Some(user) => {
            let cleared = ticket.clear();
            let user_id = user.user_id.clone().unwrap_or_else(|| user.email.clone());
            tracing::info!(user_id = %user_id, cleared, "Sign-in succeeded");
            Ok(Json(json!({ "success": true, "userId": user_id })).into_response())
        }
        None => {
            tracing::info!(remaining = ticket.result().remaining, "Sign-in failed");
            Ok((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid credentials" })),
            )
                .into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Accept a reset request. The answer is identical whether or not the account exists.
pub async fn password_reset(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetRequest>,
) -> Result<Response, ValidationError> {
    let email = state
        .security
        .sanitize(&body.email)
        .map_err(|e| e.with_field("email"))?
        .to_lowercase();
    if !email.contains('@') {
        return Err(ValidationError::new("A valid email is required").with_field("email"));
    }

    let known = state.users.iter().any(|u| u.email.eq_ignore_ascii_case(&email));
    tracing::debug!(known, "Password reset requested");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "If the account exists, a reset email has been sent." })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct SensitiveRequest {
    pub action: String,
}

/// A privileged operation on behalf of the authenticated user.
pub async fn sensitive(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Json(body): Json<SensitiveRequest>,
) -> Result<Response, ValidationError> {
    let Some(Extension(user)) = user else {
        return Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Authentication required" })),
        )
            .into_response());
    };

    let action = state
        .security
        .sanitize(&body.action)
        .map_err(|e| e.with_field("action"))?;
    if action.is_empty() {
        return Err(ValidationError::new("Action is required").with_field("action"));
    }

    tracing::info!(user_id = %user.user_id, action = %action, "Sensitive operation accepted");
    Ok(Json(json!({ "accepted": true, "userId": user.user_id, "action": action })).into_response())
}

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    pub to: Option<String>,
}

/// Follow `?to=` only when it is a same-site path or an allow-listed origin.
pub async fn redirect(
    State(state): State<AppState>,
    Query(query): Query<RedirectQuery>,
    request: Request,
) -> Result<Response, ValidationError> {
    let target = query
        .to
        .ok_or_else(|| ValidationError::new("Missing redirect target").with_field("to"))?;

    match validate_redirect_url(&target, &state.redirect_origins) {
        Ok(url) => Ok(Redirect::to(&url).into_response()),
        Err(err) => {
            state.audit.log_security_violation(
                SecurityEventType::OpenRedirectAttempt,
                &AuditContext::from_parts(&request.into_parts().0),
                &err.message,
                json!({ "target": target }),
            );
            Err(err.with_field("to"))
        }
    }
}

/// Who the engine thinks is calling.
pub async fn profile(request: Request) -> Json<serde_json::Value> {
    let (parts, _) = request.into_parts();
    let user = parts.extensions.get::<UserContext>();
    let bot = parts.extensions.get::<BotVerdict>();

    Json(json!({
        "userId": user.map(|u| u.user_id.as_str()),
        "clientIp": client_ip_for(&parts).to_string(),
        "requestId": parts.request_id(),
        "bot": bot.is_some_and(|v| v.is_bot),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Vec<UserCredential> {
        vec![
            UserCredential {
                email: "Ada@example.com".into(),
                password: "correct horse".into(),
                user_id: Some("u-1".into()),
            },
            UserCredential {
                email: "bob@example.com".into(),
                password: "battery staple".into(),
                user_id: None,
            },
        ]
    }

    #[test]
    fn test_find_user() {
        let users = users();
        assert_eq!(
            find_user(&users, "ada@example.com", "correct horse").and_then(|u| u.user_id.as_deref()),
            Some("u-1")
        );
        assert!(find_user(&users, "ada@example.com", "wrong").is_none());
        assert!(find_user(&users, "bob@example.com", "correct horse").is_none());
        assert!(find_user(&users, "eve@example.com", "").is_none());
    }
}
