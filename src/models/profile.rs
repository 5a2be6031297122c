use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";

pub const DIETARY_RESTRICTIONS: &[&str] =
    &["vegetarian", "vegan", "gluten-free", "dairy-free", "nut-free"];

/// Accepted commute methods. The empty string means "not set".
pub const COMMUTE_METHODS: &[&str] = &["car", "public_transit", "bike", "walk", "carpool"];

pub const TIMEZONES: &[(&str, &str)] = &[
    ("America/Los_Angeles", "Pacific Time (PT)"),
    ("America/Denver", "Mountain Time (MT)"),
    ("America/Chicago", "Central Time (CT)"),
    ("America/New_York", "Eastern Time (ET)"),
];

/// The stored profile of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: ProfileData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable profile fields, submitted wholesale on save.
///
/// Missing and `null` fields decode to their defaults so a partial profile
/// from the backend still fills the whole form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileData {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub birthday: String,
    #[serde(deserialize_with = "null_as_default")]
    pub home_address: String,
    #[serde(deserialize_with = "null_as_default")]
    pub work_address: String,
    #[serde(deserialize_with = "null_as_default")]
    pub phone: String,
    #[serde(deserialize_with = "null_as_default")]
    pub preferences: Preferences,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    #[serde(deserialize_with = "null_as_default")]
    pub dietary_restrictions: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub commute_method: String,
    /// An empty or `null` timezone falls back to [`DEFAULT_TIMEZONE`].
    #[serde(deserialize_with = "timezone_or_default")]
    pub timezone: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dietary_restrictions: Vec::new(),
            commute_method: String::new(),
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn timezone_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|tz| !tz.is_empty())
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()))
}
