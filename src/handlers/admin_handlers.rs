use crate::auth::middleware::SESSION_USER_KEY;
use crate::services::admin_service::AdminError;
use crate::AppState;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tower_sessions::Session;

#[derive(Deserialize)]
pub struct UnlimitedForm {
    /// Checkbox field; absent when unchecked.
    enabled: Option<String>,
}

pub async fn toggle_unlimited_handler(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<UnlimitedForm>,
) -> Response {
    let email = match session.get::<String>(SESSION_USER_KEY).await {
        Ok(Some(email)) => email,
        _ => return Redirect::to("/").into_response(),
    };

    let enabled = matches!(form.enabled.as_deref(), Some("on") | Some("true") | Some("1"));

    match app_state.admin_service.set_unlimited(&email, enabled).await {
        Ok(()) => {
            let message = if enabled {
                "Mode illimité activé"
            } else {
                "Mode illimité désactivé"
            };
            super::redirect_with("/settings", "success", message).into_response()
        }
        Err(AdminError::NotAuthorized) => {
            super::redirect_with("/settings", "error", "Action non autorisée").into_response()
        }
        Err(_) => {
            super::redirect_with("/settings", "error", "Une erreur est survenue").into_response()
        }
    }
}
