use crate::auth::middleware::SESSION_USER_KEY;
use crate::error::AppError;
use crate::handlers::auth_handlers::REFERRAL_PARAM;
use crate::models::user::{PreferenceField, UserAccount};
use crate::services::user_service::UserServiceError;
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tower_sessions::Session;

#[derive(Template, WebTemplate)]
#[template(path = "settings.html")]
struct SettingsTemplate {
    user_email: String,
    levels: Vec<OptionView>,
    styles: Vec<OptionView>,
    languages: Vec<OptionView>,
    bonus_questions: i64,
    referral_link: String,
    is_admin: bool,
    is_unlimited: bool,
    success_message: String,
    error_message: String,
}

struct OptionView {
    value: String,
    label: String,
    selected: bool,
}

#[derive(Deserialize)]
pub struct SettingsQuery {
    success: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
pub struct PreferenceForm {
    field: String,
    value: String,
}

fn option_views(user: &UserAccount) -> (Vec<OptionView>, Vec<OptionView>, Vec<OptionView>) {
    let levels = crate::models::user::SchoolLevel::ALL
        .iter()
        .map(|level| OptionView {
            value: level.as_str().to_string(),
            label: level.label().to_string(),
            selected: *level == user.school_level,
        })
        .collect();
    let styles = crate::models::user::ResponseStyle::ALL
        .iter()
        .map(|style| OptionView {
            value: style.as_str().to_string(),
            label: style.label().to_string(),
            selected: *style == user.response_style,
        })
        .collect();
    let languages = crate::models::user::ResponseLanguage::ALL
        .iter()
        .map(|language| OptionView {
            value: language.as_str().to_string(),
            label: language.label().to_string(),
            selected: *language == user.response_language,
        })
        .collect();
    (levels, styles, languages)
}

pub async fn show_settings_page(
    State(app_state): State<AppState>,
    session: Session,
    Query(query): Query<SettingsQuery>,
) -> Result<Response, AppError> {
    let email = match session.get::<String>(SESSION_USER_KEY).await {
        Ok(Some(email)) => email,
        _ => return Ok(Redirect::to("/").into_response()),
    };

    let user = match app_state.user_service.find_by_email(&email).await {
        Ok(Some(user)) => user,
        Ok(None) => return Ok(Redirect::to("/").into_response()),
        Err(_) => return Err(AppError::InternalError),
    };

    let (levels, styles, languages) = option_views(&user);
    let template = SettingsTemplate {
        user_email: user.email.clone(),
        levels,
        styles,
        languages,
        bonus_questions: user.bonus_questions,
        referral_link: format!("/?{REFERRAL_PARAM}={}", user.email),
        is_admin: app_state.admin_service.is_admin(&user.email),
        is_unlimited: user.is_unlimited,
        success_message: query.success.unwrap_or_default(),
        error_message: query.error.unwrap_or_default(),
    };

    Ok(Html(
        template
            .render()
            .unwrap_or_else(|_| "Template error".to_string()),
    )
    .into_response())
}

pub async fn update_preference_handler(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<PreferenceForm>,
) -> Response {
    let email = match session.get::<String>(SESSION_USER_KEY).await {
        Ok(Some(email)) => email,
        _ => return Redirect::to("/").into_response(),
    };

    let field = match PreferenceField::parse(&form.field) {
        Some(field) => field,
        None => {
            return super::redirect_with("/settings", "error", "Préférence inconnue")
                .into_response()
        }
    };

    match app_state
        .user_service
        .update_preference(&email, field, &form.value)
        .await
    {
        Ok(()) => {
            super::redirect_with("/settings", "success", "Préférences enregistrées").into_response()
        }
        Err(UserServiceError::InvalidPreference) => {
            super::redirect_with("/settings", "error", "Valeur de préférence invalide")
                .into_response()
        }
        Err(_) => {
            super::redirect_with("/settings", "error", "Une erreur est survenue").into_response()
        }
    }
}
