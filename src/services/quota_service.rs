use crate::models::user::UserAccount;
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};

/// Questions every account gets per calendar day before bonuses.
pub const BASE_LIMIT: i64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    #[error("Daily limit reached ({ceiling} questions)")]
    QuotaExhausted { ceiling: i64 },
    #[error("Could not reset the daily counter: {0}")]
    ResetFailed(#[source] RepositoryError),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// How many questions the account may ask per day. `None` means unmetered.
pub fn daily_ceiling(user: &UserAccount) -> Option<i64> {
    if user.is_unlimited {
        None
    } else {
        Some(BASE_LIMIT + user.bonus_questions.max(0))
    }
}

/// The counter value that applies today. A stale `last_request_date` means
/// the stored count belongs to a previous day and reads as zero.
pub fn effective_count(user: &UserAccount, today: NaiveDate) -> i64 {
    if user.last_request_date == today {
        user.requests_today.max(0)
    } else {
        0
    }
}

/// Questions left today, clamped at zero. `None` means unmetered.
pub fn remaining(user: &UserAccount, today: NaiveDate) -> Option<i64> {
    daily_ceiling(user).map(|ceiling| (ceiling - effective_count(user, today)).max(0))
}

/// A granted admission slot. Produced by [`QuotaService::admit`]; callers
/// either commit it after the metered work succeeds or release it.
#[derive(Debug, Clone)]
pub struct Reservation {
    email: String,
    metered: bool,
    count_after: i64,
    date: NaiveDate,
}

impl Reservation {
    pub fn is_metered(&self) -> bool {
        self.metered
    }
}

/// Admission control over the per-day question counter.
///
/// Admission is two-phase: `admit` reserves a slot (and persists a counter
/// reset when the day rolled over), then `commit` persists the spend once the
/// metered work succeeded, or `release` returns the slot on failure. The
/// counter is check-then-act; two concurrent requests from the same account
/// can both pass the check and overshoot by one. Accepted for a single
/// account clicking one form.
pub struct QuotaService {
    repository: Arc<dyn UserRepository>,
}

impl QuotaService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    /// Try to reserve one question for `user` on `today`.
    ///
    /// Rolls the counter over if the stored date is stale, persisting the
    /// reset before granting anything. A reset that cannot be persisted
    /// denies the request rather than handing out an unrecorded question.
    pub async fn admit(
        &self,
        user: &mut UserAccount,
        today: NaiveDate,
    ) -> Result<Reservation, QuotaError> {
        if user.is_unlimited {
            return Ok(Reservation {
                email: user.email.clone(),
                metered: false,
                count_after: effective_count(user, today),
                date: today,
            });
        }

        if user.last_request_date != today {
            self.repository
                .reset_daily_counter(&user.email, today)
                .await
                .map_err(QuotaError::ResetFailed)?;
            user.requests_today = 0;
            user.last_request_date = today;
            info!(email = %user.email, date = %today, "rolled daily counter");
        }

        let ceiling = BASE_LIMIT + user.bonus_questions.max(0);
        if user.requests_today.max(0) >= ceiling {
            warn!(email = %user.email, ceiling, "daily quota exhausted");
            return Err(QuotaError::QuotaExhausted { ceiling });
        }

        user.requests_today = user.requests_today.max(0) + 1;
        Ok(Reservation {
            email: user.email.clone(),
            metered: true,
            count_after: user.requests_today,
            date: today,
        })
    }

    /// Persist a reserved spend. Failure is reported but the caller already
    /// has its answer; the account gets a free question, never a lost one.
    pub async fn commit(&self, reservation: &Reservation) -> Result<(), QuotaError> {
        if !reservation.metered {
            return Ok(());
        }
        self.repository
            .record_usage(&reservation.email, reservation.count_after, reservation.date)
            .await?;
        Ok(())
    }

    /// Return a reserved slot without persisting anything. Only the
    /// in-memory copy moved during `admit`, so there is nothing to undo in
    /// the store.
    pub fn release(&self, user: &mut UserAccount, reservation: &Reservation) {
        if reservation.metered && user.requests_today > 0 {
            user.requests_today -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{ResponseLanguage, ResponseStyle, SchoolLevel};
    use crate::repositories::user_repository::MockUserRepository;
    use mockall::predicate::*;

    fn account(requests_today: i64, bonus: i64, date: NaiveDate) -> UserAccount {
        UserAccount {
            email: "student@example.com".to_string(),
            password_hash: "hash".to_string(),
            school_level: SchoolLevel::default(),
            response_style: ResponseStyle::default(),
            response_language: ResponseLanguage::default(),
            is_unlimited: false,
            requests_today,
            last_request_date: date,
            bonus_questions: bonus,
            referred_by: None,
            created_at: None,
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn ceiling_adds_bonus_to_base() {
        let user = account(0, 10, day("2026-01-05"));
        assert_eq!(daily_ceiling(&user), Some(15));
    }

    #[test]
    fn ceiling_ignores_negative_bonus() {
        let mut user = account(0, -3, day("2026-01-05"));
        assert_eq!(daily_ceiling(&user), Some(BASE_LIMIT));
        user.is_unlimited = true;
        assert_eq!(daily_ceiling(&user), None);
    }

    #[test]
    fn stale_date_reads_as_zero() {
        let user = account(5, 0, day("2026-01-04"));
        assert_eq!(effective_count(&user, day("2026-01-05")), 0);
        assert_eq!(remaining(&user, day("2026-01-05")), Some(BASE_LIMIT));
    }

    #[test]
    fn remaining_clamps_at_zero() {
        let user = account(9, 0, day("2026-01-05"));
        assert_eq!(remaining(&user, day("2026-01-05")), Some(0));
    }

    #[tokio::test]
    async fn admit_increments_and_commit_persists() {
        let today = day("2026-01-05");
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_record_usage()
            .with(eq("student@example.com"), eq(3), eq(today))
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(()) }));

        let service = QuotaService::new(Arc::new(mock_repo));
        let mut user = account(2, 0, today);

        let reservation = service.admit(&mut user, today).await.unwrap();
        assert!(reservation.is_metered());
        assert_eq!(user.requests_today, 3);
        service.commit(&reservation).await.unwrap();
    }

    #[tokio::test]
    async fn admit_denies_at_ceiling() {
        let today = day("2026-01-05");
        let service = QuotaService::new(Arc::new(MockUserRepository::new()));
        let mut user = account(5, 0, today);

        let result = service.admit(&mut user, today).await;
        assert!(matches!(
            result,
            Err(QuotaError::QuotaExhausted { ceiling: 5 })
        ));
        assert_eq!(user.requests_today, 5);
    }

    #[tokio::test]
    async fn admit_resets_counter_on_new_day() {
        let today = day("2026-01-06");
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_reset_daily_counter()
            .with(eq("student@example.com"), eq(today))
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let service = QuotaService::new(Arc::new(mock_repo));
        let mut user = account(5, 0, day("2026-01-05"));

        let reservation = service.admit(&mut user, today).await.unwrap();
        assert_eq!(user.requests_today, 1);
        assert_eq!(user.last_request_date, today);
        assert!(reservation.is_metered());
    }

    #[tokio::test]
    async fn admit_fails_closed_when_reset_cannot_persist() {
        let today = day("2026-01-06");
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_reset_daily_counter()
            .times(1)
            .returning(|_, _| Box::pin(async { Err(RepositoryError::NotFound) }));

        let service = QuotaService::new(Arc::new(mock_repo));
        let mut user = account(5, 0, day("2026-01-05"));

        let result = service.admit(&mut user, today).await;
        assert!(matches!(result, Err(QuotaError::ResetFailed(_))));
        // In-memory state untouched when the reset did not land.
        assert_eq!(user.requests_today, 5);
        assert_eq!(user.last_request_date, day("2026-01-05"));
    }

    #[tokio::test]
    async fn unlimited_accounts_bypass_the_meter() {
        let today = day("2026-01-05");
        let service = QuotaService::new(Arc::new(MockUserRepository::new()));
        let mut user = account(99, 0, today);
        user.is_unlimited = true;

        let reservation = service.admit(&mut user, today).await.unwrap();
        assert!(!reservation.is_metered());
        assert_eq!(user.requests_today, 99);
        // Commit of an unmetered reservation never touches the store.
        service.commit(&reservation).await.unwrap();
    }

    #[tokio::test]
    async fn release_returns_the_slot() {
        let today = day("2026-01-05");
        let mut mock_repo = MockUserRepository::new();
        mock_repo.expect_record_usage().times(0);

        let service = QuotaService::new(Arc::new(mock_repo));
        let mut user = account(2, 0, today);

        let reservation = service.admit(&mut user, today).await.unwrap();
        assert_eq!(user.requests_today, 3);
        service.release(&mut user, &reservation);
        assert_eq!(user.requests_today, 2);
    }
}
