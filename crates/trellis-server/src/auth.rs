use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use rand::RngCore;
use serde_json::json;
use sha2::{Digest, Sha256};

use trellis_core::user::Actor;
use trellis_db::{Database, DbError};

use crate::error::ActionError;
use crate::routes::AppState;

pub const SESSION_COOKIE: &str = "trellis_session";

pub const SIGN_IN_PATH: &str = "/auth/signin";

/// SHA-256 hash a raw token, returning the hex-encoded digest.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A fresh session token: 43 base62 characters.
pub fn generate_session_token() -> String {
    use rand::Rng;
    const BASE62: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..43)
        .map(|_| BASE62[rng.gen_range(0..BASE62.len())] as char)
        .collect()
}

fn hash_password_sync(password: &str) -> Result<String, String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| e.to_string())?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| e.to_string())
}

fn verify_password_sync(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Argon2id hash in PHC string form. Runs on the blocking pool.
pub async fn hash_password(password: &str) -> Result<String, ActionError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password_sync(&password))
        .await
        .map_err(|e| ActionError::Internal(e.to_string()))?
        .map_err(ActionError::Internal)
}

pub async fn verify_password(password: &str, hash: &str) -> bool {
    let (password, hash) = (password.to_string(), hash.to_string());
    tokio::task::spawn_blocking(move || verify_password_sync(&password, &hash))
        .await
        .unwrap_or(false)
}

static DUMMY_HASH: tokio::sync::OnceCell<Option<String>> = tokio::sync::OnceCell::const_new();

/// Run a full argon2 verification that always fails, so a sign-in for an
/// unknown email costs the same as a wrong password.
pub async fn verify_against_dummy(password: &str) {
    let hash = DUMMY_HASH
        .get_or_init(|| async { hash_password("trellis-dummy-password").await.ok() })
        .await;
    if let Some(hash) = hash {
        verify_password(password, hash).await;
    }
}

/// Open a session for `user_id`. Returns the raw token for the cookie; only
/// its hash is stored.
pub async fn start_session(
    db: &dyn Database,
    user_id: &str,
    ttl: chrono::Duration,
) -> Result<String, DbError> {
    let token = generate_session_token();
    db.create_session(user_id, &sha256_hex(&token), Utc::now() + ttl)
        .await?;
    Ok(token)
}

/// Value of the named cookie from the `Cookie` request headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

pub fn session_cookie(token: &str, ttl: chrono::Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.num_seconds().max(0)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", chrono::Duration::zero(), secure)
}

/// Where an unauthenticated page request is sent.
pub fn sign_in_redirect(from: &str) -> String {
    let pairs: &[(&str, &str)] = &[("from", from)];
    match serde_urlencoded::to_string(pairs) {
        Ok(query) => format!("{SIGN_IN_PATH}?{query}"),
        Err(_) => SIGN_IN_PATH.to_string(),
    }
}

/// Resolve the session cookie to the signed-in identity.
pub async fn resolve_actor(db: &dyn Database, headers: &HeaderMap) -> Option<Actor> {
    let token = read_cookie(headers, SESSION_COOKIE).filter(|t| !t.is_empty())?;
    match db.find_session_user(&sha256_hex(token), Utc::now()).await {
        Ok(user) => user.as_ref().map(Actor::from),
        Err(e) => {
            tracing::warn!("session lookup failed: {e}");
            None
        }
    }
}

/// Axum middleware that requires a live session.
///
/// The signed-in [`Actor`] is stored in the request extensions for
/// [`ActionContext`](crate::actions::ActionContext). Without a session,
/// `/api/*` answers 401 and everything else redirects to the sign-in page.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(actor) = resolve_actor(&*state.db, request.headers()).await {
        request.extensions_mut().insert(actor);
        return next.run(request).await;
    }

    let uri = request.uri();
    if uri.path().starts_with("/api/") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized" })),
        )
            .into_response();
    }

    let from = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    Redirect::to(&sign_in_redirect(from)).into_response()
}
