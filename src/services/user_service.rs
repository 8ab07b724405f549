use crate::models::user::{
    NewUser, PreferenceField, ResponseLanguage, ResponseStyle, SchoolLevel, UserAccount,
};
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use crate::services::referral_service::{ReferralOutcome, ReferralService};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::info;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap_or_else(|e| panic!("{e}")));

/// Minimum password length, matching the signup form hint.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Password too short (minimum {MIN_PASSWORD_LEN} characters)")]
    WeakPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Email already registered")]
    EmailTaken,
    #[error("User not found")]
    UserNotFound,
    #[error("Invalid preference value")]
    InvalidPreference,
    #[error("Password hashing failed: {0}")]
    HashingError(String),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

/// A completed signup: the stored account plus what became of the referral
/// it carried, so the caller can confirm a granted bonus to the user.
pub struct Registration {
    pub account: UserAccount,
    pub referral: Option<ReferralOutcome>,
}

pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: Option<String>,
    pub school_level: SchoolLevel,
    pub response_style: ResponseStyle,
    pub response_language: ResponseLanguage,
    /// Referrer's email, carried over from the signup link.
    pub referral_code: Option<String>,
}

/// Account registration and preference management.
///
/// Registration orders its steps so that nothing is written for a signup
/// that will be rejected: validate, check for a duplicate, credit the
/// referrer, then insert. The duplicate check races with the insert itself;
/// the unique key on email catches what the check misses.
pub struct UserService {
    repository: Arc<dyn UserRepository>,
    referral_service: Arc<ReferralService>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>, referral_service: Arc<ReferralService>) -> Self {
        Self {
            repository,
            referral_service,
        }
    }

    pub async fn register(
        &self,
        request: SignupRequest,
        today: NaiveDate,
    ) -> Result<Registration, UserServiceError> {
        let email = request.email.trim().to_lowercase();
        self.validate_email(&email)?;

        if let Some(ref confirm) = request.password_confirm {
            if request.password != *confirm {
                return Err(UserServiceError::PasswordMismatch);
            }
        }
        self.validate_password(&request.password)?;

        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(UserServiceError::EmailTaken);
        }

        // Referral runs before the insert; its failure modes are all soft.
        // The link is recorded whenever the referrer resolved, even if the
        // credit itself failed.
        let referral = match request.referral_code {
            Some(ref code) => Some(self.referral_service.apply_referral(&email, code).await),
            None => None,
        };
        let referred_by = referral
            .as_ref()
            .and_then(|outcome| outcome.referrer())
            .map(|referrer| referrer.to_string());

        let password_hash = self.hash_password(&request.password)?;
        let new_user = NewUser {
            email: email.clone(),
            password_hash,
            school_level: request.school_level,
            response_style: request.response_style,
            response_language: request.response_language,
            last_request_date: today,
            referred_by,
        };

        match self.repository.create_user(&new_user).await {
            Ok(account) => {
                info!(
                    email = %account.email,
                    referred = account.referred_by.is_some(),
                    "account created"
                );
                Ok(Registration { account, referral })
            }
            Err(RepositoryError::AlreadyExists) => Err(UserServiceError::EmailTaken),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserAccount>, UserServiceError> {
        Ok(self.repository.find_by_email(email).await?)
    }

    /// Update one of the three tutoring preferences. The value must parse
    /// as a known tag for the given field; anything else is rejected before
    /// reaching the store.
    pub async fn update_preference(
        &self,
        email: &str,
        field: PreferenceField,
        value: &str,
    ) -> Result<(), UserServiceError> {
        let valid = match field {
            PreferenceField::SchoolLevel => SchoolLevel::parse(value).is_some(),
            PreferenceField::ResponseStyle => ResponseStyle::parse(value).is_some(),
            PreferenceField::ResponseLanguage => ResponseLanguage::parse(value).is_some(),
        };
        if !valid {
            return Err(UserServiceError::InvalidPreference);
        }

        match self.repository.update_preference(email, field, value).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    fn validate_email(&self, email: &str) -> Result<(), UserServiceError> {
        if email.is_empty() || email.len() > 255 || !EMAIL_RE.is_match(email) {
            return Err(UserServiceError::InvalidEmail);
        }
        Ok(())
    }

    fn validate_password(&self, password: &str) -> Result<(), UserServiceError> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(UserServiceError::WeakPassword);
        }
        Ok(())
    }

    fn hash_password(&self, password: &str) -> Result<String, UserServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| UserServiceError::HashingError(e.to_string()))
    }

    pub fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        if let Ok(parsed_hash) = PasswordHash::new(password_hash) {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok()
        } else {
            false
        }
    }
}
