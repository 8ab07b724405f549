use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// School level of the Moroccan curriculum a student belongs to.
///
/// Stored as a short lowercase tag; the label is what the UI shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchoolLevel {
    College,
    TroncCommun,
    Bac1,
    Bac2,
    #[default]
    Prepa,
}

impl SchoolLevel {
    pub const ALL: [SchoolLevel; 5] = [
        SchoolLevel::College,
        SchoolLevel::TroncCommun,
        SchoolLevel::Bac1,
        SchoolLevel::Bac2,
        SchoolLevel::Prepa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchoolLevel::College => "college",
            SchoolLevel::TroncCommun => "tronc-commun",
            SchoolLevel::Bac1 => "bac1",
            SchoolLevel::Bac2 => "bac2",
            SchoolLevel::Prepa => "prepa",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "college" => Some(SchoolLevel::College),
            "tronc-commun" => Some(SchoolLevel::TroncCommun),
            "bac1" => Some(SchoolLevel::Bac1),
            "bac2" => Some(SchoolLevel::Bac2),
            "prepa" => Some(SchoolLevel::Prepa),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SchoolLevel::College => "الإعدادي (Collège)",
            SchoolLevel::TroncCommun => "جذع مشترك (Tronc Commun)",
            SchoolLevel::Bac1 => "الأولى بكالوريا (1ère Année Bac)",
            SchoolLevel::Bac2 => "الثانية بكالوريا (2ème Année Bac)",
            SchoolLevel::Prepa => "الدروس الخصوصية (Classes Préparatoires)",
        }
    }
}

/// How the tutor should shape its answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStyle {
    #[default]
    Steps,
    Concept,
    Answer,
}

impl ResponseStyle {
    pub const ALL: [ResponseStyle; 3] = [
        ResponseStyle::Steps,
        ResponseStyle::Concept,
        ResponseStyle::Answer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStyle::Steps => "steps",
            ResponseStyle::Concept => "concept",
            ResponseStyle::Answer => "answer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "steps" => Some(ResponseStyle::Steps),
            "concept" => Some(ResponseStyle::Concept),
            "answer" => Some(ResponseStyle::Answer),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResponseStyle::Steps => "Étapes Détaillées (Didactique)",
            ResponseStyle::Concept => "Explication Conceptuelle (Théorie)",
            ResponseStyle::Answer => "Réponse Finale (Concise)",
        }
    }
}

/// Language the tutor answers in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseLanguage {
    #[default]
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "ar")]
    Arabic,
}

impl ResponseLanguage {
    pub const ALL: [ResponseLanguage; 2] = [ResponseLanguage::French, ResponseLanguage::Arabic];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseLanguage::French => "fr",
            ResponseLanguage::Arabic => "ar",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fr" => Some(ResponseLanguage::French),
            "ar" => Some(ResponseLanguage::Arabic),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResponseLanguage::French => "Français",
            ResponseLanguage::Arabic => "العربية",
        }
    }
}

/// The three user preferences a student may edit after registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceField {
    SchoolLevel,
    ResponseStyle,
    ResponseLanguage,
}

impl PreferenceField {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "school_level" => Some(PreferenceField::SchoolLevel),
            "response_style" => Some(PreferenceField::ResponseStyle),
            "response_language" => Some(PreferenceField::ResponseLanguage),
            _ => None,
        }
    }

    /// Column this preference maps to in the user store.
    pub fn column(&self) -> &'static str {
        match self {
            PreferenceField::SchoolLevel => "school_level",
            PreferenceField::ResponseStyle => "response_style",
            PreferenceField::ResponseLanguage => "response_language",
        }
    }
}

/// One registered account, keyed by lowercase email.
///
/// `requests_today` is only meaningful when `last_request_date` equals the
/// current calendar date; a stale date means the effective count is zero.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub email: String,
    pub password_hash: String,
    pub school_level: SchoolLevel,
    pub response_style: ResponseStyle,
    pub response_language: ResponseLanguage,
    pub is_unlimited: bool,
    pub requests_today: i64,
    pub last_request_date: NaiveDate,
    pub bonus_questions: i64,
    pub referred_by: Option<String>,
    pub created_at: Option<String>,
}

/// Fields needed to insert a fresh account. Counters start at zero and the
/// unlimited flag starts off; only the admin toggle can change the latter.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub school_level: SchoolLevel,
    pub response_style: ResponseStyle,
    pub response_language: ResponseLanguage,
    pub last_request_date: NaiveDate,
    pub referred_by: Option<String>,
}
