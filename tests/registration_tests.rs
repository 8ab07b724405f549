use chrono::NaiveDate;
use std::sync::Arc;
use tuteur::models::user::{ResponseLanguage, ResponseStyle, SchoolLevel};
use tuteur::repositories::user_repository::{SqliteUserRepository, UserRepository};
use tuteur::services::auth_service::{AuthError, AuthService};
use tuteur::services::referral_service::{ReferralOutcome, ReferralService};
use tuteur::services::user_service::{SignupRequest, UserService, UserServiceError};
use tuteur::test_utils::test_helpers;

fn today() -> NaiveDate {
    NaiveDate::parse_from_str("2026-01-05", "%Y-%m-%d").expect("valid date")
}

fn build_services(pool: sqlx::SqlitePool) -> (Arc<UserService>, Arc<SqliteUserRepository>) {
    let repository = Arc::new(SqliteUserRepository::new(pool));
    let referral_service = Arc::new(ReferralService::new(repository.clone()));
    let user_service = Arc::new(UserService::new(repository.clone(), referral_service));
    (user_service, repository)
}

fn signup(email: &str, referral_code: Option<&str>) -> SignupRequest {
    SignupRequest {
        email: email.to_string(),
        password: "secret1".to_string(),
        password_confirm: Some("secret1".to_string()),
        school_level: Default::default(),
        response_style: Default::default(),
        response_language: Default::default(),
        referral_code: referral_code.map(|c| c.to_string()),
    }
}

#[tokio::test]
async fn registration_persists_account_with_defaults() {
    let pool = test_helpers::create_test_db().await.expect("test db");
    let (user_service, repository) = build_services(pool);

    let registration = user_service
        .register(signup("Student@Example.com", None), today())
        .await
        .expect("registration succeeds");

    assert_eq!(registration.account.email, "student@example.com");
    assert!(registration.referral.is_none());

    let stored = repository
        .find_by_email("student@example.com")
        .await
        .expect("lookup")
        .expect("account exists");
    assert_eq!(stored.school_level, SchoolLevel::Prepa);
    assert_eq!(stored.response_style, ResponseStyle::Steps);
    assert_eq!(stored.response_language, ResponseLanguage::French);
    assert_eq!(stored.requests_today, 0);
    assert_eq!(stored.bonus_questions, 0);
    assert!(!stored.is_unlimited);
    assert!(stored.referred_by.is_none());
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let pool = test_helpers::create_test_db().await.expect("test db");
    let (user_service, _) = build_services(pool);

    user_service
        .register(signup("student@example.com", None), today())
        .await
        .expect("first registration succeeds");

    let result = user_service
        .register(signup("student@example.com", None), today())
        .await;
    assert!(matches!(result, Err(UserServiceError::EmailTaken)));
}

#[tokio::test]
async fn referral_credits_the_sponsor_and_records_the_link() {
    let pool = test_helpers::create_test_db().await.expect("test db");
    test_helpers::insert_test_user(&pool, "sponsor@example.com", "secret1", today())
        .await
        .expect("sponsor inserted");
    let (user_service, repository) = build_services(pool);

    let registration = user_service
        .register(signup("newbie@example.com", Some("sponsor@example.com")), today())
        .await
        .expect("registration succeeds");
    assert_eq!(
        registration.account.referred_by.as_deref(),
        Some("sponsor@example.com")
    );
    // The credited outcome is what the signup page turns into the
    // confirmation notice.
    assert_eq!(
        registration.referral,
        Some(ReferralOutcome::Credited {
            referrer: "sponsor@example.com".to_string()
        })
    );

    let sponsor = repository
        .find_by_email("sponsor@example.com")
        .await
        .expect("lookup")
        .expect("sponsor exists");
    assert_eq!(sponsor.bonus_questions, 10);
}

#[tokio::test]
async fn unknown_referral_code_does_not_block_registration() {
    let pool = test_helpers::create_test_db().await.expect("test db");
    let (user_service, repository) = build_services(pool);

    let registration = user_service
        .register(signup("newbie@example.com", Some("ghost@example.com")), today())
        .await
        .expect("registration succeeds despite bad code");
    assert!(registration.account.referred_by.is_none());
    assert_eq!(registration.referral, Some(ReferralOutcome::UnknownReferrer));

    let stored = repository
        .find_by_email("newbie@example.com")
        .await
        .expect("lookup")
        .expect("account exists");
    assert!(stored.referred_by.is_none());
}

#[tokio::test]
async fn rejected_signup_credits_nobody() {
    let pool = test_helpers::create_test_db().await.expect("test db");
    test_helpers::insert_test_user(&pool, "sponsor@example.com", "secret1", today())
        .await
        .expect("sponsor inserted");
    let (user_service, repository) = build_services(pool);

    // Too-short password fails validation before the referral runs.
    let result = user_service
        .register(
            SignupRequest {
                email: "newbie@example.com".to_string(),
                password: "short".to_string(),
                password_confirm: Some("short".to_string()),
                school_level: Default::default(),
                response_style: Default::default(),
                response_language: Default::default(),
                referral_code: Some("sponsor@example.com".to_string()),
            },
            today(),
        )
        .await;
    assert!(matches!(result, Err(UserServiceError::WeakPassword)));

    let sponsor = repository
        .find_by_email("sponsor@example.com")
        .await
        .expect("lookup")
        .expect("sponsor exists");
    assert_eq!(sponsor.bonus_questions, 0);
}

#[tokio::test]
async fn login_works_after_registration() {
    let pool = test_helpers::create_test_db().await.expect("test db");
    let (user_service, _) = build_services(pool);
    let auth_service = AuthService::new(user_service.clone());

    user_service
        .register(signup("student@example.com", None), today())
        .await
        .expect("registration succeeds");

    let user = auth_service
        .login("Student@Example.com", "secret1")
        .await
        .expect("login succeeds");
    assert_eq!(user.email, "student@example.com");

    let result = auth_service.login("student@example.com", "wrong-pass").await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));

    let result = auth_service.login("nobody@example.com", "secret1").await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));
}
