use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, time::Duration};

use crate::models::AdminAccountRequest;

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@decompas.com";
pub const DEFAULT_ADMIN_PASSWORD: &str = "Admin123!";
pub const DEFAULT_ADMIN_DISPLAY_NAME: &str = "Administrador Principal";
pub const DEFAULT_USERS_COLLECTION: &str = "users";

/// Firebase requires at least six characters.
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Falls back to the service account's `project_id` when unset.
    pub project_id: Option<String>,
    pub credentials_path: Option<String>,
    pub auth_emulator_host: Option<String>,
    pub firestore_emulator_host: Option<String>,
    pub admin_email: String,
    #[serde(skip_serializing)]
    pub admin_password: String,
    /// False when `ADMIN_PASSWORD` was missing and the bootstrap default is used.
    pub admin_password_from_env: bool,
    pub admin_display_name: String,
    pub users_collection: String,
    pub request_timeout_secs: u64,
    pub reuse_existing_identity: bool,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let admin_password = non_empty("ADMIN_PASSWORD");

        Ok(Config {
            project_id: non_empty("FIREBASE_PROJECT_ID"),
            credentials_path: non_empty("GOOGLE_APPLICATION_CREDENTIALS"),
            auth_emulator_host: non_empty("FIREBASE_AUTH_EMULATOR_HOST"),
            firestore_emulator_host: non_empty("FIRESTORE_EMULATOR_HOST"),
            admin_email: non_empty("ADMIN_EMAIL")
                .unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string()),
            admin_password_from_env: admin_password.is_some(),
            admin_password: admin_password
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string()),
            admin_display_name: non_empty("ADMIN_DISPLAY_NAME")
                .unwrap_or_else(|| DEFAULT_ADMIN_DISPLAY_NAME.to_string()),
            users_collection: non_empty("USERS_COLLECTION")
                .unwrap_or_else(|| DEFAULT_USERS_COLLECTION.to_string()),
            request_timeout_secs: non_empty("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|| "10".to_string())
                .parse()
                .context("Invalid REQUEST_TIMEOUT_SECS")?,
            reuse_existing_identity: parse_flag(non_empty("REUSE_EXISTING_IDENTITY"))
                .context("Invalid REUSE_EXISTING_IDENTITY")?,
            log_level: non_empty("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.admin_email.contains('@') {
            anyhow::bail!("ADMIN_EMAIL must be an email address");
        }

        if self.admin_password.chars().count() < MIN_PASSWORD_LEN {
            anyhow::bail!("ADMIN_PASSWORD must be at least {} characters", MIN_PASSWORD_LEN);
        }

        if self.admin_display_name.trim().is_empty() {
            anyhow::bail!("ADMIN_DISPLAY_NAME must not be empty");
        }

        if self.users_collection.contains('/') {
            anyhow::bail!("USERS_COLLECTION must be a top-level collection id");
        }

        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }

        // Production endpoints need a service account; emulators accept the owner token
        if self.credentials_path.is_none() && !self.uses_emulators() {
            anyhow::bail!(
                "GOOGLE_APPLICATION_CREDENTIALS must be set unless both \
                 FIREBASE_AUTH_EMULATOR_HOST and FIRESTORE_EMULATOR_HOST are set"
            );
        }

        if self.uses_emulators() && self.project_id.is_none() {
            anyhow::bail!("FIREBASE_PROJECT_ID must be set when running against emulators");
        }

        Ok(())
    }

    pub fn uses_emulators(&self) -> bool {
        self.auth_emulator_host.is_some() && self.firestore_emulator_host.is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn admin_request(&self) -> AdminAccountRequest {
        AdminAccountRequest::new(
            self.admin_email.clone(),
            self.admin_password.clone(),
            self.admin_display_name.clone(),
        )
    }
}

fn parse_flag(value: Option<String>) -> Result<bool> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => anyhow::bail!("expected a boolean, got {:?}", other),
        },
    }
}
