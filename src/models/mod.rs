pub mod user;

pub use user::{NewUser, PreferenceField, ResponseLanguage, ResponseStyle, SchoolLevel, UserAccount};
