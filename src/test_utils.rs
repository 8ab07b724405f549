pub mod test_helpers {
    use crate::models::user::{ResponseLanguage, ResponseStyle, SchoolLevel};
    use chrono::NaiveDate;
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Insert a test user with hashed password and default preferences
    pub async fn insert_test_user(
        pool: &SqlitePool,
        email: &str,
        password: &str,
        last_request_date: NaiveDate,
    ) -> Result<(), sqlx::Error> {
        use argon2::{
            password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
            Argon2,
        };

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                sqlx::Error::Configuration(format!("Password hashing failed: {}", e).into())
            })?
            .to_string();

        sqlx::query(
            "INSERT INTO users (email, password_hash, school_level, response_style, \
             response_language, last_request_date) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(email)
        .bind(password_hash)
        .bind(SchoolLevel::default().as_str())
        .bind(ResponseStyle::default().as_str())
        .bind(ResponseLanguage::default().as_str())
        .bind(last_request_date.format("%Y-%m-%d").to_string())
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Force the stored counter state for a user, bypassing the services
    pub async fn set_usage(
        pool: &SqlitePool,
        email: &str,
        requests_today: i64,
        last_request_date: NaiveDate,
        bonus_questions: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET requests_today = ?, last_request_date = ?, bonus_questions = ? \
             WHERE email = ?",
        )
        .bind(requests_today)
        .bind(last_request_date.format("%Y-%m-%d").to_string())
        .bind(bonus_questions)
        .bind(email)
        .execute(pool)
        .await?;

        Ok(())
    }
}
