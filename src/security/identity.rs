//! Authenticated-user context.
//!
//! An upstream authenticator passes the user id in `x-user-id`. Requests
//! without a usable id continue anonymously.

use axum::{extract::Request, middleware::Next, response::Response};

use crate::security::constants::USER_ID_HEADER;

const MAX_USER_ID_LENGTH: usize = 128;

/// Context attached to authenticated requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: String,
}

fn parse_user_id(raw: &str) -> Option<String> {
    let id = raw.trim();
    let usable = !id.is_empty()
        && id.len() <= MAX_USER_ID_LENGTH
        && id.bytes().all(|b| b.is_ascii_graphic());
    usable.then(|| id.to_string())
}

/// Attach a [`UserContext`] when the request names a user.
pub async fn identity_middleware(mut req: Request, next: Next) -> Response {
    let user = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_user_id);

    match user {
        Some(user_id) => {
            req.extensions_mut().insert(UserContext { user_id });
        }
        None if req.headers().contains_key(USER_ID_HEADER) => {
            tracing::debug!("Ignoring malformed x-user-id header");
        }
        None => {}
    }

    next.run(req).await
}
