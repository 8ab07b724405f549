pub mod user_repository;

pub use user_repository::{
    CredentialLevel, RepositoryError, RepositoryResult, SqliteUserRepository, UserRepository,
};
