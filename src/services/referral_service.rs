use crate::repositories::user_repository::{CredentialLevel, UserRepository};
use std::sync::Arc;
use tracing::{info, warn};

/// Bonus questions credited to a referrer for each signup they bring in.
pub const REFERRAL_BONUS: i64 = 10;

/// What happened to a referral claim. Never an error: a bad or failing
/// referral must not block the signup that carried it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferralOutcome {
    /// The referrer's bonus pool was credited.
    Credited { referrer: String },
    /// The code did not match any account.
    UnknownReferrer,
    /// The new account tried to refer itself.
    SelfReferral,
    /// The referrer exists but crediting failed; the signup proceeds and
    /// still records the referral link.
    CreditFailed { referrer: String },
    /// The referrer lookup itself failed; nothing is recorded.
    LookupFailed,
}

impl ReferralOutcome {
    /// The resolved referrer email, when the code matched an account.
    pub fn referrer(&self) -> Option<&str> {
        match self {
            ReferralOutcome::Credited { referrer }
            | ReferralOutcome::CreditFailed { referrer } => Some(referrer),
            _ => None,
        }
    }
}

/// Credits referrers for the signups they bring in.
///
/// Writes cross account rows, so every credit runs under the service
/// credential rather than the new user's session.
pub struct ReferralService {
    repository: Arc<dyn UserRepository>,
}

impl ReferralService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    /// Apply the referral carried by a signup, if any.
    ///
    /// `new_email` is the account being created, `code` is the referrer's
    /// email as it arrived in the signup link. Returns the outcome for the
    /// caller to record on the new row; all failure modes are soft.
    pub async fn apply_referral(&self, new_email: &str, code: &str) -> ReferralOutcome {
        let code = code.trim().to_lowercase();
        if code.is_empty() {
            return ReferralOutcome::UnknownReferrer;
        }
        if code == new_email {
            warn!(email = %new_email, "self-referral rejected");
            return ReferralOutcome::SelfReferral;
        }

        let referrer = match self.repository.find_by_email(&code).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(code = %code, "referral code matches no account");
                return ReferralOutcome::UnknownReferrer;
            }
            Err(e) => {
                warn!(code = %code, error = %e, "referral lookup failed");
                return ReferralOutcome::LookupFailed;
            }
        };

        match self
            .repository
            .add_bonus_questions(&referrer.email, REFERRAL_BONUS, CredentialLevel::Service)
            .await
        {
            Ok(()) => {
                info!(referrer = %referrer.email, new_user = %new_email, "referral credited");
                ReferralOutcome::Credited {
                    referrer: referrer.email,
                }
            }
            Err(e) => {
                warn!(referrer = %referrer.email, error = %e, "referral credit failed");
                ReferralOutcome::CreditFailed {
                    referrer: referrer.email,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{ResponseLanguage, ResponseStyle, SchoolLevel, UserAccount};
    use crate::repositories::user_repository::{MockUserRepository, RepositoryError};
    use chrono::NaiveDate;
    use mockall::predicate::*;

    fn referrer_account() -> UserAccount {
        UserAccount {
            email: "sponsor@example.com".to_string(),
            password_hash: "hash".to_string(),
            school_level: SchoolLevel::default(),
            response_style: ResponseStyle::default(),
            response_language: ResponseLanguage::default(),
            is_unlimited: false,
            requests_today: 0,
            last_request_date: NaiveDate::parse_from_str("2026-01-05", "%Y-%m-%d").unwrap(),
            bonus_questions: 0,
            referred_by: None,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn valid_referral_credits_the_referrer() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_find_by_email()
            .with(eq("sponsor@example.com"))
            .times(1)
            .returning(|_| Box::pin(async { Ok(Some(referrer_account())) }));
        mock_repo
            .expect_add_bonus_questions()
            .with(
                eq("sponsor@example.com"),
                eq(REFERRAL_BONUS),
                eq(CredentialLevel::Service),
            )
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(()) }));

        let service = ReferralService::new(Arc::new(mock_repo));
        let outcome = service
            .apply_referral("newbie@example.com", "Sponsor@Example.com ")
            .await;
        assert_eq!(
            outcome,
            ReferralOutcome::Credited {
                referrer: "sponsor@example.com".to_string()
            }
        );
    }

    #[tokio::test]
    async fn unknown_code_is_ignored() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_find_by_email()
            .times(1)
            .returning(|_| Box::pin(async { Ok(None) }));
        mock_repo.expect_add_bonus_questions().times(0);

        let service = ReferralService::new(Arc::new(mock_repo));
        let outcome = service
            .apply_referral("newbie@example.com", "ghost@example.com")
            .await;
        assert_eq!(outcome, ReferralOutcome::UnknownReferrer);
    }

    #[tokio::test]
    async fn self_referral_is_rejected_without_lookup() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo.expect_find_by_email().times(0);

        let service = ReferralService::new(Arc::new(mock_repo));
        let outcome = service
            .apply_referral("newbie@example.com", "newbie@example.com")
            .await;
        assert_eq!(outcome, ReferralOutcome::SelfReferral);
    }

    #[tokio::test]
    async fn credit_failure_is_soft() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_find_by_email()
            .times(1)
            .returning(|_| Box::pin(async { Ok(Some(referrer_account())) }));
        mock_repo
            .expect_add_bonus_questions()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Err(RepositoryError::NotFound) }));

        let service = ReferralService::new(Arc::new(mock_repo));
        let outcome = service
            .apply_referral("newbie@example.com", "sponsor@example.com")
            .await;
        assert_eq!(
            outcome,
            ReferralOutcome::CreditFailed {
                referrer: "sponsor@example.com".to_string()
            }
        );
        assert_eq!(outcome.referrer(), Some("sponsor@example.com"));
    }
}
