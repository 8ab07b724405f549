pub mod admin_handlers;
pub mod auth_handlers;
pub mod settings_handlers;
pub mod tutor_handlers;

use axum::response::Redirect;

/// Redirect carrying a user-visible message as a query parameter. The
/// message must be percent-encoded or accented characters would produce an
/// invalid Location header.
pub(crate) fn redirect_with(path: &str, param: &str, message: &str) -> Redirect {
    Redirect::to(&format!("{path}?{param}={}", urlencoding::encode(message)))
}

pub use admin_handlers::toggle_unlimited_handler;
pub use auth_handlers::{login_handler, logout_handler, show_index, signup_handler};
pub use settings_handlers::{show_settings_page, update_preference_handler};
pub use tutor_handlers::{ask_handler, show_tutor_page};
