use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use trellis_core::user::{self, SignIn};

use super::AppState;
use crate::auth::{
    clear_session_cookie, read_cookie, session_cookie, sha256_hex, start_session,
    verify_against_dummy, verify_password, SESSION_COOKIE, SIGN_IN_PATH,
};
use crate::error::ActionError;
use crate::form::FormBody;
use crate::views::pages;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(SIGN_IN_PATH, get(sign_in_page).post(sign_in))
        .route("/auth/signout", post(sign_out))
}

#[derive(Debug, Default, Deserialize)]
struct FromQuery {
    from: Option<String>,
}

/// Only local paths are followed after sign-in. Browsers read `\` as `/`,
/// so any backslash is refused along with protocol-relative `//` prefixes.
fn safe_return_path(from: Option<&str>) -> &str {
    match from {
        Some(path)
            if path.starts_with('/')
                && !path.contains('\\')
                && !matches!(path.as_bytes().get(1), Some(b'/')) =>
        {
            path
        }
        _ => "/",
    }
}

async fn sign_in_page(Query(q): Query<FromQuery>) -> Html<String> {
    Html(pages::sign_in(safe_return_path(q.from.as_deref()), None))
}

async fn sign_in(
    State(state): State<AppState>,
    FormBody(form): FormBody,
) -> Result<Response, ActionError> {
    let input: SignIn = user::sign_in_schema().parse(&form)?.input;
    let invalid = || ActionError::field("email", "Invalid email or password");

    let Some(user) = state.db.find_user_by_email(&input.email).await? else {
        verify_against_dummy(&input.password).await;
        tracing::info!(email = %input.email, "sign-in rejected");
        return Err(invalid());
    };
    if !verify_password(&input.password, &user.password_hash).await {
        tracing::info!(email = %input.email, "sign-in rejected");
        return Err(invalid());
    }

    let ttl = state.config.session_ttl;
    let token = start_session(&*state.db, &user.id, ttl).await?;
    tracing::info!(user_id = %user.id, "signed in");

    let to = safe_return_path(form.first_text("from"));
    Ok((
        [(header::SET_COOKIE, session_cookie(&token, ttl, state.config.secure_cookies))],
        Redirect::to(to),
    )
        .into_response())
}

async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = read_cookie(&headers, SESSION_COOKIE) {
        if let Err(e) = state.db.delete_session(&sha256_hex(token)).await {
            tracing::warn!("failed to delete session: {e}");
        }
    }
    (
        [(header::SET_COOKIE, clear_session_cookie(state.config.secure_cookies))],
        Redirect::to(SIGN_IN_PATH),
    )
        .into_response()
}
