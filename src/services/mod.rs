pub mod admin_service;
pub mod auth_service;
pub mod prompt;
pub mod question_service;
pub mod quota_service;
pub mod referral_service;
pub mod tutor_client;
pub mod user_service;
