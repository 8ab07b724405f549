use crate::auth::middleware::SESSION_USER_KEY;
use crate::models::user::{ResponseLanguage, ResponseStyle, SchoolLevel};
use crate::services::referral_service::{ReferralOutcome, REFERRAL_BONUS};
use crate::services::user_service::{SignupRequest, UserServiceError};
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

/// Query parameter that carries the referrer's email through a signup link.
pub const REFERRAL_PARAM: &str = "ref_code";

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
struct IndexTemplate {
    error_message: String,
    success_message: String,
    referral_code: String,
    levels: Vec<Choice>,
    styles: Vec<Choice>,
    languages: Vec<Choice>,
}

struct Choice {
    value: String,
    label: String,
    selected: bool,
}

#[derive(Deserialize)]
pub struct IndexQuery {
    error: Option<String>,
    success: Option<String>,
    ref_code: Option<String>,
}

#[derive(Deserialize)]
pub struct SignupForm {
    email: String,
    password: String,
    password_confirm: String,
    school_level: Option<String>,
    response_style: Option<String>,
    response_language: Option<String>,
    ref_code: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

pub async fn show_index(Query(query): Query<IndexQuery>) -> Html<String> {
    let template = IndexTemplate {
        error_message: query.error.unwrap_or_default(),
        success_message: query.success.unwrap_or_default(),
        referral_code: query.ref_code.unwrap_or_default(),
        levels: SchoolLevel::ALL
            .iter()
            .map(|level| Choice {
                value: level.as_str().to_string(),
                label: level.label().to_string(),
                selected: *level == SchoolLevel::default(),
            })
            .collect(),
        styles: ResponseStyle::ALL
            .iter()
            .map(|style| Choice {
                value: style.as_str().to_string(),
                label: style.label().to_string(),
                selected: *style == ResponseStyle::default(),
            })
            .collect(),
        languages: ResponseLanguage::ALL
            .iter()
            .map(|language| Choice {
                value: language.as_str().to_string(),
                label: language.label().to_string(),
                selected: *language == ResponseLanguage::default(),
            })
            .collect(),
    };

    Html(
        template
            .render()
            .unwrap_or_else(|_| "Template error".to_string()),
    )
}

pub async fn signup_handler(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<SignupForm>,
) -> Response {
    // Unknown preference tags fall back to the defaults rather than failing
    // the signup.
    let request = SignupRequest {
        email: form.email,
        password: form.password,
        password_confirm: Some(form.password_confirm),
        school_level: form
            .school_level
            .as_deref()
            .and_then(SchoolLevel::parse)
            .unwrap_or_default(),
        response_style: form
            .response_style
            .as_deref()
            .and_then(ResponseStyle::parse)
            .unwrap_or_default(),
        response_language: form
            .response_language
            .as_deref()
            .and_then(ResponseLanguage::parse)
            .unwrap_or_default(),
        referral_code: form.ref_code.filter(|c| !c.trim().is_empty()),
    };

    let today = chrono::Local::now().date_naive();
    match app_state.user_service.register(request, today).await {
        Ok(registration) => {
            if session
                .insert(SESSION_USER_KEY, registration.account.email)
                .await
                .is_err()
            {
                return super::redirect_with("/", "error", "Impossible de créer la session")
                    .into_response();
            }
            match registration.referral {
                Some(ReferralOutcome::Credited { referrer }) => super::redirect_with(
                    "/tutor",
                    "success",
                    &format!(
                        "Bienvenue ! {referrer} reçoit {REFERRAL_BONUS} questions bonus \
                         grâce à ton inscription."
                    ),
                )
                .into_response(),
                _ => Redirect::to("/tutor").into_response(),
            }
        }
        Err(e) => {
            let message = match e {
                UserServiceError::InvalidEmail => "Adresse email invalide",
                UserServiceError::WeakPassword => {
                    "Mot de passe trop court (6 caractères minimum)"
                }
                UserServiceError::PasswordMismatch => "Les mots de passe ne correspondent pas",
                UserServiceError::EmailTaken => "Cet email est déjà enregistré",
                _ => "Une erreur est survenue, réessayez",
            };
            super::redirect_with("/", "error", message).into_response()
        }
    }
}

pub async fn login_handler(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    match app_state
        .auth_service
        .login(&form.email, &form.password)
        .await
    {
        Ok(user) => {
            if session.insert(SESSION_USER_KEY, user.email).await.is_err() {
                return super::redirect_with("/", "error", "Impossible de créer la session")
                    .into_response();
            }
            Redirect::to("/tutor").into_response()
        }
        Err(_) => {
            super::redirect_with("/", "error", "Email ou mot de passe incorrect").into_response()
        }
    }
}

pub async fn logout_handler(session: Session) -> Response {
    let _ = session.flush().await;
    Redirect::to("/").into_response()
}
