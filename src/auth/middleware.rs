use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

/// Session key holding the signed-in account's email.
pub const SESSION_USER_KEY: &str = "user_email";

pub async fn require_auth(session: Session, request: Request, next: Next) -> Response {
    if let Ok(Some(_email)) = session.get::<String>(SESSION_USER_KEY).await {
        next.run(request).await
    } else {
        Redirect::to("/").into_response()
    }
}

pub async fn redirect_if_authenticated(session: Session, request: Request, next: Next) -> Response {
    if let Ok(Some(_email)) = session.get::<String>(SESSION_USER_KEY).await {
        Redirect::to("/tutor").into_response()
    } else {
        next.run(request).await
    }
}
