use crate::models::user::{
    NewUser, PreferenceField, ResponseLanguage, ResponseStyle, SchoolLevel, UserAccount,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("User not found")]
    NotFound,
    #[error("User already exists")]
    AlreadyExists,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Which credential a cross-account write runs under. Session-scoped calls
/// may only touch the signed-in user's own row; service-scoped calls (the
/// referral bonus, the admin toggle) may touch any row and are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialLevel {
    Session,
    Service,
}

impl CredentialLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialLevel::Session => "session",
            CredentialLevel::Service => "service",
        }
    }
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> RepositoryResult<UserAccount>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<UserAccount>>;
    async fn update_preference(
        &self,
        email: &str,
        field: PreferenceField,
        value: &str,
    ) -> RepositoryResult<()>;
    /// Zero the daily counter and stamp the given date.
    async fn reset_daily_counter(&self, email: &str, date: NaiveDate) -> RepositoryResult<()>;
    /// Persist an absolute counter value together with its date.
    async fn record_usage(
        &self,
        email: &str,
        requests_today: i64,
        date: NaiveDate,
    ) -> RepositoryResult<()>;
    /// Atomic increment of the bonus pool; used for referral credits.
    async fn add_bonus_questions(
        &self,
        email: &str,
        amount: i64,
        credential: CredentialLevel,
    ) -> RepositoryResult<()>;
    async fn set_unlimited(
        &self,
        email: &str,
        unlimited: bool,
        credential: CredentialLevel,
    ) -> RepositoryResult<()>;
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> RepositoryResult<UserAccount> {
    let email: String = row.try_get("email")?;

    let level_tag: String = row.try_get("school_level")?;
    let school_level = SchoolLevel::parse(&level_tag).unwrap_or_else(|| {
        warn!(email = %email, tag = %level_tag, "unknown school level tag, using default");
        SchoolLevel::default()
    });

    let style_tag: String = row.try_get("response_style")?;
    let response_style = ResponseStyle::parse(&style_tag).unwrap_or_else(|| {
        warn!(email = %email, tag = %style_tag, "unknown response style tag, using default");
        ResponseStyle::default()
    });

    let lang_tag: String = row.try_get("response_language")?;
    let response_language = ResponseLanguage::parse(&lang_tag).unwrap_or_else(|| {
        warn!(email = %email, tag = %lang_tag, "unknown language tag, using default");
        ResponseLanguage::default()
    });

    let date_text: String = row.try_get("last_request_date")?;
    let last_request_date = NaiveDate::parse_from_str(&date_text, "%Y-%m-%d")
        .map_err(|_| RepositoryError::Database(sqlx::Error::ColumnDecode {
            index: "last_request_date".into(),
            source: format!("unparseable date: {date_text}").into(),
        }))?;

    Ok(UserAccount {
        email,
        password_hash: row.try_get("password_hash")?,
        school_level,
        response_style,
        response_language,
        is_unlimited: row.try_get("is_unlimited")?,
        requests_today: row.try_get("requests_today")?,
        last_request_date,
        bonus_questions: row.try_get("bonus_questions")?,
        referred_by: row.try_get("referred_by")?,
        created_at: row.try_get("created_at")?,
    })
}

const SELECT_USER: &str = "SELECT email, password_hash, school_level, response_style, \
     response_language, is_unlimited, requests_today, last_request_date, \
     bonus_questions, referred_by, created_at FROM users WHERE email = ?";

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_user(&self, user: &NewUser) -> RepositoryResult<UserAccount> {
        let result = sqlx::query(
            "INSERT INTO users (email, password_hash, school_level, response_style, \
             response_language, last_request_date, referred_by) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.school_level.as_str())
        .bind(user.response_style.as_str())
        .bind(user.response_language.as_str())
        .bind(user.last_request_date.format("%Y-%m-%d").to_string())
        .bind(&user.referred_by)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => self
                .find_by_email(&user.email)
                .await?
                .ok_or(RepositoryError::NotFound),
            Err(e) => {
                if e.to_string().contains("UNIQUE") {
                    Err(RepositoryError::AlreadyExists)
                } else {
                    Err(RepositoryError::Database(e))
                }
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<UserAccount>> {
        let row = sqlx::query(SELECT_USER)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn update_preference(
        &self,
        email: &str,
        field: PreferenceField,
        value: &str,
    ) -> RepositoryResult<()> {
        // Column name comes from the PreferenceField enum, never from input.
        let sql = format!("UPDATE users SET {} = ? WHERE email = ?", field.column());
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(email)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn reset_daily_counter(&self, email: &str, date: NaiveDate) -> RepositoryResult<()> {
        let result =
            sqlx::query("UPDATE users SET requests_today = 0, last_request_date = ? WHERE email = ?")
                .bind(date.format("%Y-%m-%d").to_string())
                .bind(email)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn record_usage(
        &self,
        email: &str,
        requests_today: i64,
        date: NaiveDate,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE users SET requests_today = ?, last_request_date = ? WHERE email = ?",
        )
        .bind(requests_today)
        .bind(date.format("%Y-%m-%d").to_string())
        .bind(email)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn add_bonus_questions(
        &self,
        email: &str,
        amount: i64,
        credential: CredentialLevel,
    ) -> RepositoryResult<()> {
        let result =
            sqlx::query("UPDATE users SET bonus_questions = bonus_questions + ? WHERE email = ?")
                .bind(amount)
                .bind(email)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::info!(
            email = %email,
            amount,
            credential = credential.as_str(),
            "credited bonus questions"
        );
        Ok(())
    }

    async fn set_unlimited(
        &self,
        email: &str,
        unlimited: bool,
        credential: CredentialLevel,
    ) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE users SET is_unlimited = ? WHERE email = ?")
            .bind(unlimited)
            .bind(email)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::info!(
            email = %email,
            unlimited,
            credential = credential.as_str(),
            "updated unlimited flag"
        );
        Ok(())
    }
}
