//! Sparse partial updates.
//!
//! A patch holds one `Option` per field; `None` (or JSON `null`) leaves the stored
//! value alone. [`merge`] normalizes and validates the whole patch before touching a
//! copy of the current value, so a rejected patch never produces a partial result.

use serde::Deserialize;

use tandem_shared::errors::{AppError, AppResult, ErrorCode};

use super::normalize;
use crate::models::{Gender, GenderFilter, MatchPreferences, Profile, UserSettings};

pub trait Patch: Sized {
    type Target: Clone;

    /// Normalizes every present field, failing on the first invalid one.
    fn normalize(self) -> AppResult<Self>;

    /// Constraints spanning several fields, checked against the patch overlaid on `current`.
    fn validate(&self, _current: &Self::Target) -> AppResult<()> {
        Ok(())
    }

    fn apply(self, target: &mut Self::Target, changes: &mut Changes);
}

/// Names of fields whose value actually changed.
#[derive(Debug, Default)]
pub struct Changes(Vec<&'static str>);

impl Changes {
    pub fn set<T: PartialEq>(&mut self, field: &'static str, slot: &mut T, value: Option<T>) {
        if let Some(value) = value {
            if *slot != value {
                *slot = value;
                self.0.push(field);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Merged<T> {
    pub value: T,
    pub changed: Vec<&'static str>,
}

impl<T> Merged<T> {
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }
}

pub fn merge<P: Patch>(current: &P::Target, patch: P) -> AppResult<Merged<P::Target>> {
    let patch = patch.normalize()?;
    patch.validate(current)?;

    let mut value = current.clone();
    let mut changes = Changes::default();
    patch.apply(&mut value, &mut changes);

    Ok(Merged { value, changed: changes.0 })
}

fn map_opt<T, U>(value: Option<T>, f: impl FnOnce(T) -> AppResult<U>) -> AppResult<Option<U>> {
    value.map(f).transpose()
}

// --- Profile ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub display_name: Option<String>,
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

impl Patch for ProfilePatch {
    type Target = Profile;

    fn normalize(self) -> AppResult<Self> {
        Ok(Self {
            display_name: map_opt(self.display_name, |v| normalize::display_name(&v))?,
            avatar_url: map_opt(self.avatar_url, |v| normalize::avatar_url(&v))?,
            age: map_opt(self.age, normalize::age)?,
            gender: map_opt(self.gender, |v| normalize::gender(&v).map(|g| g.as_str().to_string()))?,
            country_code: map_opt(self.country_code, |v| normalize::country_code(&v))?,
            native_lang: map_opt(self.native_lang, |v| normalize::language("native_lang", &v))?,
            target_lang: map_opt(self.target_lang, |v| normalize::language("target_lang", &v))?,
            level: map_opt(self.level, |v| normalize::level("level", v))?,
            about: map_opt(self.about, |v| normalize::about(&v))?,
            timezone: map_opt(self.timezone, |v| normalize::timezone(&v))?,
        })
    }

    fn apply(self, target: &mut Profile, changes: &mut Changes) {
        changes.set("display_name", &mut target.display_name, self.display_name);
        changes.set("avatar_url", &mut target.avatar_url, self.avatar_url.map(Some));
        changes.set("age", &mut target.age, self.age.map(Some));
        changes.set(
            "gender",
            &mut target.gender,
            self.gender.as_deref().and_then(Gender::parse).map(Some),
        );
        changes.set("country_code", &mut target.country_code, self.country_code.map(Some));
        changes.set("native_lang", &mut target.native_lang, self.native_lang.map(Some));
        changes.set("target_lang", &mut target.target_lang, self.target_lang.map(Some));
        changes.set("level", &mut target.level, self.level.map(Some));
        changes.set("about", &mut target.about, self.about.map(Some));
        changes.set("timezone", &mut target.timezone, self.timezone.map(Some));
    }
}

// --- Settings ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub discoverable: Option<bool>,
    pub allow_messages: Option<bool>,
    pub notify_push: Option<bool>,
    pub notify_email: Option<bool>,
}

impl Patch for SettingsPatch {
    type Target = UserSettings;

    fn normalize(self) -> AppResult<Self> {
        Ok(self)
    }

    fn apply(self, target: &mut UserSettings, changes: &mut Changes) {
        changes.set("discoverable", &mut target.discoverable, self.discoverable);
        changes.set("allow_messages", &mut target.allow_messages, self.allow_messages);
        changes.set("notify_push", &mut target.notify_push, self.notify_push);
        changes.set("notify_email", &mut target.notify_email, self.notify_email);
    }
}

// --- Match preferences ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchPrefsPatch {
    pub target_lang: Option<String>,
    pub min_level: Option<i16>,
    pub max_level: Option<i16>,
    pub gender_filter: Option<String>,
    pub min_rating: Option<i16>,
    pub countries_allow: Option<Vec<String>>,
}

impl Patch for MatchPrefsPatch {
    type Target = MatchPreferences;

    fn normalize(self) -> AppResult<Self> {
        Ok(Self {
            target_lang: map_opt(self.target_lang, |v| normalize::language("target_lang", &v))?,
            min_level: map_opt(self.min_level, |v| normalize::level("min_level", v))?,
            max_level: map_opt(self.max_level, |v| normalize::level("max_level", v))?,
            gender_filter: map_opt(self.gender_filter, |v| {
                normalize::gender_filter(&v).map(|g| g.as_str().to_string())
            })?,
            min_rating: map_opt(self.min_rating, normalize::rating)?,
            countries_allow: self.countries_allow.map(|c| normalize::country_list(&c)),
        })
    }

    fn validate(&self, current: &MatchPreferences) -> AppResult<()> {
        let min = self.min_level.or(current.min_level);
        let max = self.max_level.or(current.max_level);
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(AppError::with_details(
                    ErrorCode::ValidationError,
                    "min_level must not exceed max_level",
                    serde_json::json!({ "fields": ["min_level", "max_level"] }),
                ));
            }
        }
        Ok(())
    }

    fn apply(self, target: &mut MatchPreferences, changes: &mut Changes) {
        changes.set("target_lang", &mut target.target_lang, self.target_lang.map(Some));
        changes.set("min_level", &mut target.min_level, self.min_level.map(Some));
        changes.set("max_level", &mut target.max_level, self.max_level.map(Some));
        changes.set(
            "gender_filter",
            &mut target.gender_filter,
            self.gender_filter.as_deref().and_then(GenderFilter::parse).map(Some),
        );
        changes.set("min_rating", &mut target.min_rating, self.min_rating.map(Some));
        changes.set("countries_allow", &mut target.countries_allow, self.countries_allow);
    }
}

// --- Interests ---

/// Replaces the whole interest set.
#[derive(Debug, Clone, Deserialize)]
pub struct InterestsReplace {
    pub interest_ids: Vec<i32>,
}

impl Patch for InterestsReplace {
    type Target = Vec<i32>;

    fn normalize(self) -> AppResult<Self> {
        Ok(Self { interest_ids: normalize::interest_ids(&self.interest_ids)? })
    }

    fn apply(self, target: &mut Vec<i32>, changes: &mut Changes) {
        changes.set("interest_ids", target, Some(self.interest_ids));
    }
}
