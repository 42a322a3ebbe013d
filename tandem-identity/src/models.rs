use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tandem_shared::types::auth::UserRole;

use crate::schema::{accounts, match_preferences, password_reset_tokens, user_interests, user_settings};

// --- Enumerations ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    /// Case-insensitive, surrounding whitespace ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderFilter {
    Male,
    Female,
    Any,
}

impl GenderFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenderFilter::Male => "male",
            GenderFilter::Female => "female",
            GenderFilter::Any => "any",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "male" => Some(GenderFilter::Male),
            "female" => Some(GenderFilter::Female),
            "any" => Some(GenderFilter::Any),
            _ => None,
        }
    }
}

// --- Accounts ---

/// Public profile attributes, owned by the account row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub country_code: Option<String>,
    pub native_lang: Option<String>,
    pub target_lang: Option<String>,
    pub level: Option<i16>,
    pub about: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(skip_serializing)]
    pub external_id: Option<String>,
    pub role: UserRole,
    #[serde(flatten)]
    pub profile: Profile,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Federation-only accounts have no local password.
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: Option<String>,
    pub external_id: Option<String>,
    pub role: UserRole,
    pub profile: Profile,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = accounts)]
pub struct AccountRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub external_id: Option<String>,
    pub role: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub country_code: Option<String>,
    pub native_lang: Option<String>,
    pub target_lang: Option<String>,
    pub level: Option<i16>,
    pub about: Option<String>,
    pub timezone: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Unknown stored roles fall back to the least privileged one.
fn stored_role(account_id: Uuid, raw: &str) -> UserRole {
    raw.parse::<UserRole>().unwrap_or_else(|_| {
        tracing::warn!(user_id = %account_id, role = raw, "unknown stored role, treating as user");
        UserRole::User
    })
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            external_id: row.external_id,
            role: stored_role(row.id, &row.role),
            profile: Profile {
                display_name: row.display_name,
                avatar_url: row.avatar_url,
                age: row.age,
                gender: row.gender.as_deref().and_then(Gender::parse),
                country_code: row.country_code,
                native_lang: row.native_lang,
                target_lang: row.target_lang,
                level: row.level,
                about: row.about,
                timezone: row.timezone,
            },
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = accounts)]
pub struct NewAccountRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub external_id: Option<String>,
    pub role: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub country_code: Option<String>,
    pub native_lang: Option<String>,
    pub target_lang: Option<String>,
    pub level: Option<i16>,
    pub about: Option<String>,
    pub timezone: Option<String>,
}

impl NewAccountRow {
    pub fn new(id: Uuid, account: NewAccount) -> Self {
        let profile = account.profile;
        Self {
            id,
            email: account.email,
            password_hash: account.password_hash,
            external_id: account.external_id,
            role: account.role.as_str().to_string(),
            display_name: profile.display_name,
            avatar_url: profile.avatar_url,
            age: profile.age,
            gender: profile.gender.map(|g| g.as_str().to_string()),
            country_code: profile.country_code,
            native_lang: profile.native_lang,
            target_lang: profile.target_lang,
            level: profile.level,
            about: profile.about,
            timezone: profile.timezone,
        }
    }
}

/// Full profile write; `None` clears the column.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = accounts, treat_none_as_null = true)]
pub struct ProfileChanges {
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub country_code: Option<String>,
    pub native_lang: Option<String>,
    pub target_lang: Option<String>,
    pub level: Option<i16>,
    pub about: Option<String>,
    pub timezone: Option<String>,
}

impl From<&Profile> for ProfileChanges {
    fn from(profile: &Profile) -> Self {
        Self {
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            age: profile.age,
            gender: profile.gender.map(|g| g.as_str().to_string()),
            country_code: profile.country_code.clone(),
            native_lang: profile.native_lang.clone(),
            target_lang: profile.target_lang.clone(),
            level: profile.level,
            about: profile.about.clone(),
            timezone: profile.timezone.clone(),
        }
    }
}

// --- Password Reset Tokens ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = password_reset_tokens)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub account_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = password_reset_tokens)]
pub struct NewPasswordResetToken {
    pub id: Uuid,
    pub account_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// --- Settings & Match Preferences ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub discoverable: bool,
    pub allow_messages: bool,
    pub notify_push: bool,
    pub notify_email: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            discoverable: true,
            allow_messages: true,
            notify_push: true,
            notify_email: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchPreferences {
    pub target_lang: Option<String>,
    pub min_level: Option<i16>,
    pub max_level: Option<i16>,
    pub gender_filter: Option<GenderFilter>,
    pub min_rating: Option<i16>,
    pub countries_allow: Vec<String>,
}

/// A per-account resource and the version it was read at.
///
/// Version 0 means no row exists yet and the value holds the defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Versioned<T> {
    #[serde(flatten)]
    pub value: T,
    pub version: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T: Default> Versioned<T> {
    pub fn absent() -> Self {
        Self {
            value: T::default(),
            version: 0,
            updated_at: None,
        }
    }
}

#[derive(Debug, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = user_settings, primary_key(account_id))]
pub struct SettingsRow {
    pub account_id: Uuid,
    pub discoverable: bool,
    pub allow_messages: bool,
    pub notify_push: bool,
    pub notify_email: bool,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl SettingsRow {
    pub fn new(account_id: Uuid, settings: &UserSettings, version: i64, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            discoverable: settings.discoverable,
            allow_messages: settings.allow_messages,
            notify_push: settings.notify_push,
            notify_email: settings.notify_email,
            version,
            updated_at: now,
        }
    }
}

impl From<SettingsRow> for Versioned<UserSettings> {
    fn from(row: SettingsRow) -> Self {
        Self {
            value: UserSettings {
                discoverable: row.discoverable,
                allow_messages: row.allow_messages,
                notify_push: row.notify_push,
                notify_email: row.notify_email,
            },
            version: row.version,
            updated_at: Some(row.updated_at),
        }
    }
}

#[derive(Debug, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = match_preferences, primary_key(account_id), treat_none_as_null = true)]
pub struct MatchPreferencesRow {
    pub account_id: Uuid,
    pub target_lang: Option<String>,
    pub min_level: Option<i16>,
    pub max_level: Option<i16>,
    pub gender_filter: Option<String>,
    pub min_rating: Option<i16>,
    pub countries_allow: Vec<String>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl MatchPreferencesRow {
    pub fn new(account_id: Uuid, prefs: &MatchPreferences, version: i64, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            target_lang: prefs.target_lang.clone(),
            min_level: prefs.min_level,
            max_level: prefs.max_level,
            gender_filter: prefs.gender_filter.map(|g| g.as_str().to_string()),
            min_rating: prefs.min_rating,
            countries_allow: prefs.countries_allow.clone(),
            version,
            updated_at: now,
        }
    }
}

impl From<MatchPreferencesRow> for Versioned<MatchPreferences> {
    fn from(row: MatchPreferencesRow) -> Self {
        Self {
            value: MatchPreferences {
                target_lang: row.target_lang,
                min_level: row.min_level,
                max_level: row.max_level,
                gender_filter: row.gender_filter.as_deref().and_then(GenderFilter::parse),
                min_rating: row.min_rating,
                countries_allow: row.countries_allow,
            },
            version: row.version,
            updated_at: Some(row.updated_at),
        }
    }
}

// --- Interests ---

#[derive(Debug, Insertable)]
#[diesel(table_name = user_interests)]
pub struct NewInterest {
    pub account_id: Uuid,
    pub interest_id: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_role_parses_known_and_downgrades_unknown() {
        let id = Uuid::new_v4();
        assert_eq!(stored_role(id, "admin"), UserRole::Admin);
        assert_eq!(stored_role(id, "user"), UserRole::User);
        assert_eq!(stored_role(id, "superuser"), UserRole::User);
        assert_eq!(stored_role(id, ""), UserRole::User);
    }
}
