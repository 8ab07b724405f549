use crate::repositories::user_repository::{CredentialLevel, RepositoryError, UserRepository};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Not authorized")]
    NotAuthorized,
    #[error("User not found")]
    UserNotFound,
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// The operator's self-service switch for unmetered access.
///
/// One account, named in configuration, is the operator. Only that account
/// may flip its own unlimited flag; everyone else gets `NotAuthorized`.
pub struct AdminService {
    repository: Arc<dyn UserRepository>,
    admin_email: String,
}

impl AdminService {
    pub fn new(repository: Arc<dyn UserRepository>, admin_email: String) -> Self {
        Self {
            repository,
            admin_email: admin_email.trim().to_lowercase(),
        }
    }

    pub fn is_admin(&self, email: &str) -> bool {
        !self.admin_email.is_empty() && email == self.admin_email
    }

    pub async fn set_unlimited(
        &self,
        caller_email: &str,
        unlimited: bool,
    ) -> Result<(), AdminError> {
        if !self.is_admin(caller_email) {
            return Err(AdminError::NotAuthorized);
        }

        match self
            .repository
            .set_unlimited(caller_email, unlimited, CredentialLevel::Service)
            .await
        {
            Ok(()) => {
                info!(email = %caller_email, unlimited, "admin toggled unlimited mode");
                Ok(())
            }
            Err(RepositoryError::NotFound) => Err(AdminError::UserNotFound),
            Err(e) => Err(AdminError::Repository(e)),
        }
    }
}
