//! The locally persisted user session.
//!
//! Holds the signed-in user's details and app preferences in a small JSON
//! file, independent of the entity store. The password is kept only as a
//! display echo for the profile screen; authentication itself is the
//! identity collaborator's concern.

use std::{
    fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, PoisonError},
};

use serde::{Deserialize, Serialize};

use crate::Error;

/// The app color theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Follow the OS setting.
    #[default]
    System,
    /// Always light.
    Light,
    /// Always dark.
    Dark,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
struct SessionData {
    logged_in: bool,
    email: Option<String>,
    password: Option<String>,
    display_name: Option<String>,
    profile_image: Option<String>,
    #[serde(default)]
    theme: Theme,
}

/// The user session, persisted to a JSON file on every change.
pub struct Session {
    path: PathBuf,
    data: Mutex<SessionData>,
}

impl Session {
    /// Load the session from `path`, or start a fresh one if the file does
    /// not exist yet.
    ///
    /// # Errors
    /// Returns an error if an existing session file cannot be read or
    /// parsed.
    pub fn load(path: PathBuf) -> Result<Self, Error> {
        let data = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            SessionData::default()
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    fn data(&self) -> MutexGuard<'_, SessionData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, data: &SessionData) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(data)?)?;

        Ok(())
    }

    /// Store the signed-in user's email and password echo. The display
    /// name defaults to the email local-part the first time a user is
    /// saved.
    ///
    /// # Errors
    /// Returns an error if the session file cannot be written.
    pub fn save_user(&self, email: &str, password: &str) -> Result<(), Error> {
        let mut data = self.data();
        data.email = Some(email.to_owned());
        data.password = Some(password.to_owned());
        if data.display_name.is_none() {
            let local_part = email.split('@').next().unwrap_or(email);
            data.display_name = Some(local_part.to_owned());
        }
        self.persist(&data)
    }

    /// Set the logged-in flag.
    ///
    /// # Errors
    /// Returns an error if the session file cannot be written.
    pub fn set_logged_in(&self, logged_in: bool) -> Result<(), Error> {
        let mut data = self.data();
        data.logged_in = logged_in;
        self.persist(&data)
    }

    /// Whether a user is currently logged in.
    pub fn is_logged_in(&self) -> bool {
        self.data().logged_in
    }

    /// The signed-in user's email, if any.
    pub fn user_email(&self) -> Option<String> {
        self.data().email.clone()
    }

    /// The stored password echo, if any.
    pub fn user_password(&self) -> Option<String> {
        self.data().password.clone()
    }

    /// The user's display name, empty if none was ever set.
    pub fn display_name(&self) -> String {
        self.data().display_name.clone().unwrap_or_default()
    }

    /// Set the user's display name.
    ///
    /// # Errors
    /// Returns an error if the session file cannot be written.
    pub fn set_display_name(&self, name: &str) -> Result<(), Error> {
        let mut data = self.data();
        data.display_name = Some(name.to_owned());
        self.persist(&data)
    }

    /// The user's profile image reference, if any.
    pub fn profile_image(&self) -> Option<String> {
        self.data().profile_image.clone()
    }

    /// Set the user's profile image reference (local path or remote URL).
    ///
    /// # Errors
    /// Returns an error if the session file cannot be written.
    pub fn set_profile_image(&self, reference: &str) -> Result<(), Error> {
        let mut data = self.data();
        data.profile_image = Some(reference.to_owned());
        self.persist(&data)
    }

    /// The theme preference.
    pub fn theme(&self) -> Theme {
        self.data().theme
    }

    /// Set the theme preference.
    ///
    /// # Errors
    /// Returns an error if the session file cannot be written.
    pub fn set_theme(&self, theme: Theme) -> Result<(), Error> {
        let mut data = self.data();
        data.theme = theme;
        self.persist(&data)
    }

    /// Clear the session. The theme preference survives logout; everything
    /// else is reset.
    ///
    /// # Errors
    /// Returns an error if the session file cannot be written.
    pub fn logout(&self) -> Result<(), Error> {
        let mut data = self.data();
        let theme = data.theme;
        *data = SessionData {
            theme,
            ..SessionData::default()
        };
        self.persist(&data)
    }
}
