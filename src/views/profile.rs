use thiserror::Error;

use crate::client::ApiClient;
use crate::models::{ProfileData, COMMUTE_METHODS, DIETARY_RESTRICTIONS, TIMEZONES};

const LOAD_ERROR: &str = "Failed to load profile";
const SAVE_ERROR: &str = "Failed to update profile";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error(
        "Unknown commute method '{0}'. Must be one of: {choices}",
        choices = COMMUTE_METHODS.join(", ")
    )]
    UnknownCommuteMethod(String),

    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error(
        "Unknown dietary restriction '{0}'. Must be one of: {choices}",
        choices = DIETARY_RESTRICTIONS.join(", ")
    )]
    UnknownRestriction(String),
}

/// Field edits collected from the command line. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ProfileEdit {
    pub name: Option<String>,
    pub birthday: Option<String>,
    pub home_address: Option<String>,
    pub work_address: Option<String>,
    pub phone: Option<String>,
    pub commute_method: Option<String>,
    pub timezone: Option<String>,
    pub toggle_restrictions: Vec<String>,
}

/// The profile form.
///
/// Starts empty, is overwritten wholesale by a successful load and is
/// submitted wholesale on save.
#[derive(Debug, Clone)]
pub struct ProfileForm {
    data: ProfileData,
    loading: bool,
    error: Option<String>,
    saved: bool,
}

impl Default for ProfileForm {
    fn default() -> Self {
        Self {
            data: ProfileData::default(),
            loading: true,
            error: None,
            saved: false,
        }
    }
}

impl ProfileForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> &ProfileData {
        &self.data
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_saved(&self) -> bool {
        self.saved
    }

    /// Load the stored profile. A missing profile (404) is not an error:
    /// the user starts from the empty form.
    pub async fn load(&mut self, client: &ApiClient) {
        self.loading = true;
        self.error = None;
        match client.get_profile().await {
            Ok(profile) => self.data = profile.data,
            Err(e) if e.is_not_found() => {
                tracing::debug!("No profile stored yet");
            }
            Err(e) => {
                tracing::error!("Failed to load profile: {}", e);
                self.error = Some(e.user_message(LOAD_ERROR));
            }
        }
        self.loading = false;
    }

    pub fn apply(&mut self, edit: ProfileEdit) -> Result<(), FormError> {
        if let Some(method) = edit.commute_method {
            self.set_commute_method(&method)?;
        }
        if let Some(timezone) = edit.timezone {
            self.set_timezone(&timezone)?;
        }
        for restriction in &edit.toggle_restrictions {
            self.toggle_restriction(restriction)?;
        }

        let data = &mut self.data;
        for (field, value) in [
            (&mut data.name, edit.name),
            (&mut data.birthday, edit.birthday),
            (&mut data.home_address, edit.home_address),
            (&mut data.work_address, edit.work_address),
            (&mut data.phone, edit.phone),
        ] {
            if let Some(value) = value {
                *field = value;
            }
        }
        Ok(())
    }

    /// Empty string clears the commute method.
    pub fn set_commute_method(&mut self, method: &str) -> Result<(), FormError> {
        if !method.is_empty() && !COMMUTE_METHODS.contains(&method) {
            return Err(FormError::UnknownCommuteMethod(method.to_string()));
        }
        self.data.preferences.commute_method = method.to_string();
        Ok(())
    }

    pub fn set_timezone(&mut self, timezone: &str) -> Result<(), FormError> {
        if !TIMEZONES.iter().any(|(tz, _)| *tz == timezone) {
            return Err(FormError::UnknownTimezone(timezone.to_string()));
        }
        self.data.preferences.timezone = timezone.to_string();
        Ok(())
    }

    pub fn toggle_restriction(&mut self, restriction: &str) -> Result<(), FormError> {
        if !DIETARY_RESTRICTIONS.contains(&restriction) {
            return Err(FormError::UnknownRestriction(restriction.to_string()));
        }
        let restrictions = &mut self.data.preferences.dietary_restrictions;
        if let Some(pos) = restrictions.iter().position(|r| r == restriction) {
            restrictions.remove(pos);
        } else {
            restrictions.push(restriction.to_string());
        }
        Ok(())
    }

    /// Submit the whole form. The form keeps what was submitted.
    pub async fn save(&mut self, client: &ApiClient) {
        self.error = None;
        self.saved = false;
        match client.update_profile(&self.data).await {
            Ok(()) => self.saved = true,
            Err(e) => {
                tracing::error!("Failed to update profile: {}", e);
                self.error = Some(e.user_message(SAVE_ERROR));
            }
        }
    }

    pub fn render(&self) -> String {
        if self.loading {
            return "Loading profile...\n".to_string();
        }

        let data = &self.data;
        let prefs = &data.preferences;
        let timezone = TIMEZONES
            .iter()
            .find(|(tz, _)| *tz == prefs.timezone)
            .map(|(_, label)| *label)
            .unwrap_or(prefs.timezone.as_str());

        let mut output = String::from("Profile Settings\n");
        if let Some(error) = &self.error {
            output.push_str(&format!("Error: {}\n", error));
        }
        if self.saved {
            output.push_str("Profile updated successfully!\n");
        }
        for (label, value) in [
            ("Name", data.name.as_str()),
            ("Birthday", data.birthday.as_str()),
            ("Phone", data.phone.as_str()),
            ("Home Address", data.home_address.as_str()),
            ("Work Address", data.work_address.as_str()),
            ("Commute Method", prefs.commute_method.as_str()),
            ("Timezone", timezone),
        ] {
            output.push_str(&format!("  {:<22}{}\n", format!("{}:", label), value));
        }
        output.push_str(&format!(
            "  {:<22}{}\n",
            "Dietary Restrictions:",
            prefs.dietary_restrictions.join(", ")
        ));
        output
    }
}
