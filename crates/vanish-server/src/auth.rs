//! Bearer-token authentication against the sessions table.

use axum::http::HeaderMap;
use chrono::Utc;
use uuid::Uuid;

use vanish_shared::api::{RegisterRequest, RegisterResponse};
use vanish_shared::records::Profile;
use vanish_shared::types::UserId;
use vanish_store::Database;

use crate::error::ApiError;

/// Resolve the caller's identity from the `Authorization: Bearer <token>`
/// header.  Missing or unknown tokens are rejected.
pub fn authenticate(db: &Database, headers: &HeaderMap) -> Result<UserId, ApiError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let Some(token) = auth.strip_prefix("Bearer ") else {
        return Err(ApiError::Unauthorized);
    };

    match db.user_for_token(token)? {
        Some(user) => Ok(user),
        None => Err(ApiError::Unauthorized),
    }
}

/// Create a profile and a session token for it.
///
/// In production auth lives with the hosted identity provider; this
/// endpoint gives local deployments and tests a way to mint identities.
pub fn register(db: &Database, req: RegisterRequest) -> Result<RegisterResponse, ApiError> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("username is empty".into()));
    }

    let user_id = UserId::new();
    db.upsert_profile(&Profile {
        user_id,
        username: username.to_string(),
        display_name: req.display_name,
        avatar_url: None,
        created_at: Utc::now(),
    })?;

    let token = Uuid::new_v4().to_string();
    db.create_session(&token, user_id)?;

    tracing::info!(user = %user_id, username, "registered user");

    Ok(RegisterResponse { user_id, token })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", format!("Bearer {token}").parse().unwrap());
        headers
    }

    #[test]
    fn register_then_authenticate() {
        let db = Database::open_in_memory().unwrap();
        let resp = register(
            &db,
            RegisterRequest {
                username: "ada".into(),
                display_name: None,
            },
        )
        .unwrap();

        let user = authenticate(&db, &bearer(&resp.token)).unwrap();
        assert_eq!(user, resp.user_id);
    }

    #[test]
    fn unknown_or_missing_token_is_unauthorized() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            authenticate(&db, &bearer("nope")),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            authenticate(&db, &HeaderMap::new()),
            Err(ApiError::Unauthorized)
        ));
    }
}
