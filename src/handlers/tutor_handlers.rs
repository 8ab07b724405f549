use crate::auth::middleware::SESSION_USER_KEY;
use crate::services::question_service::{AskError, AskRequest};
use crate::services::quota_service::{self, QuotaError};
use crate::services::tutor_client::{ImageAttachment, TutorClientError};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

/// Largest exercise photo accepted, in bytes.
pub const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

const ACCEPTED_IMAGE_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

#[derive(Template, WebTemplate)]
#[template(path = "tutor.html")]
struct TutorTemplate {
    user_email: String,
    is_unlimited: bool,
    remaining: i64,
    ceiling: i64,
    success_message: String,
    error_message: String,
    answer: Option<String>,
    sources: Vec<SourceView>,
}

struct SourceView {
    title: String,
    uri: String,
}

#[derive(Deserialize)]
pub struct TutorQuery {
    error: Option<String>,
    success: Option<String>,
}

async fn render_dashboard(
    app_state: &AppState,
    email: &str,
    success_message: String,
    error_message: String,
    answer: Option<String>,
    sources: Vec<SourceView>,
) -> Response {
    let user = match app_state.user_service.find_by_email(email).await {
        Ok(Some(user)) => user,
        _ => return Redirect::to("/").into_response(),
    };

    let today = chrono::Local::now().date_naive();
    let template = TutorTemplate {
        user_email: user.email.clone(),
        is_unlimited: user.is_unlimited,
        remaining: quota_service::remaining(&user, today).unwrap_or(0),
        ceiling: quota_service::daily_ceiling(&user).unwrap_or(0),
        success_message,
        error_message,
        answer,
        sources,
    };

    Html(
        template
            .render()
            .unwrap_or_else(|_| "Template error".to_string()),
    )
    .into_response()
}

pub async fn show_tutor_page(
    State(app_state): State<AppState>,
    session: Session,
    Query(query): Query<TutorQuery>,
) -> Response {
    let email = match session.get::<String>(SESSION_USER_KEY).await {
        Ok(Some(email)) => email,
        _ => return Redirect::to("/").into_response(),
    };

    render_dashboard(
        &app_state,
        &email,
        query.success.unwrap_or_default(),
        query.error.unwrap_or_default(),
        None,
        vec![],
    )
    .await
}

pub async fn ask_handler(
    State(app_state): State<AppState>,
    session: Session,
    mut multipart: Multipart,
) -> Response {
    let email = match session.get::<String>(SESSION_USER_KEY).await {
        Ok(Some(email)) => email,
        _ => return Redirect::to("/").into_response(),
    };

    let mut question = String::new();
    let mut image: Option<ImageAttachment> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(_) => {
                return render_dashboard(
                    &app_state,
                    &email,
                    String::new(),
                    "Formulaire invalide, réessaye".to_string(),
                    None,
                    vec![],
                )
                .await
            }
        };

        match field.name() {
            Some("question") => {
                question = field.text().await.unwrap_or_default();
            }
            Some("image") => {
                let mime_type = field.content_type().map(|m| m.to_string());
                let bytes = match field.bytes().await {
                    Ok(bytes) => bytes,
                    Err(_) => {
                        return render_dashboard(
                            &app_state,
                            &email,
                            String::new(),
                            "Image trop lourde (4 Mo maximum)".to_string(),
                            None,
                            vec![],
                        )
                        .await
                    }
                };
                if bytes.is_empty() {
                    continue;
                }
                let mime_type = match mime_type {
                    Some(m) if ACCEPTED_IMAGE_TYPES.contains(&m.as_str()) => m,
                    _ => {
                        return render_dashboard(
                            &app_state,
                            &email,
                            String::new(),
                            "Formats acceptés : JPEG ou PNG".to_string(),
                            None,
                            vec![],
                        )
                        .await
                    }
                };
                if bytes.len() > MAX_IMAGE_BYTES {
                    return render_dashboard(
                        &app_state,
                        &email,
                        String::new(),
                        "Image trop lourde (4 Mo maximum)".to_string(),
                        None,
                        vec![],
                    )
                    .await;
                }
                image = Some(ImageAttachment {
                    mime_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let request = AskRequest {
        email: email.clone(),
        question,
        image,
    };

    let today = chrono::Local::now().date_naive();
    match app_state.question_service.ask(request, today).await {
        Ok(outcome) => {
            let sources = outcome
                .sources
                .into_iter()
                .map(|s| SourceView {
                    title: s.title,
                    uri: s.uri,
                })
                .collect();
            render_dashboard(
                &app_state,
                &email,
                String::new(),
                String::new(),
                Some(outcome.text),
                sources,
            )
            .await
        }
        Err(e) => {
            let message = match e {
                AskError::EmptyQuestion => {
                    "Pose une question ou ajoute une photo de l'exercice".to_string()
                }
                AskError::Quota(QuotaError::QuotaExhausted { ceiling }) => format!(
                    "Limite quotidienne atteinte ({ceiling} questions). \
                     Reviens demain ou parraine un ami !"
                ),
                AskError::Tutor(TutorClientError::Timeout) => {
                    "Le tuteur met trop de temps à répondre, réessaye".to_string()
                }
                AskError::Tutor(_) => "Le tuteur est indisponible pour le moment".to_string(),
                _ => "Une erreur est survenue, réessaye".to_string(),
            };
            render_dashboard(&app_state, &email, String::new(), message, None, vec![]).await
        }
    }
}
