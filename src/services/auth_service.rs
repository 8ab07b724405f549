use crate::models::user::UserAccount;
use crate::services::user_service::{UserService, UserServiceError};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Deliberately covers both unknown email and wrong password.
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error("User service error: {0}")]
    UserService(#[from] UserServiceError),
}

/// Login checks. Credential failures collapse into one message so the login
/// form never reveals whether an email is registered.
pub struct AuthService {
    user_service: Arc<UserService>,
}

impl AuthService {
    pub fn new(user_service: Arc<UserService>) -> Self {
        Self { user_service }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserAccount, AuthError> {
        let email = email.trim().to_lowercase();

        let user = self
            .user_service
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.user_service.verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        info!(email = %user.email, "login succeeded");
        Ok(user)
    }
}
