// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secret resolution for tenant credentials.
//!
//! Precedence: environment variable > named profile > default profile.
//! A missing credential for any configured tenant is fatal at startup.

use std::collections::HashMap;

use thiserror::Error;

/// Name of the profile consulted when a tenant names none.
pub const DEFAULT_PROFILE: &str = "default";

/// Credential profiles loaded from config: profile name → token.
pub type Profiles = HashMap<String, String>;

#[derive(Debug, Error, PartialEq)]
pub enum CredentialError {
    #[error("no credential found: env var {env_var} unset and no {profile:?} profile")]
    Missing { env_var: String, profile: String },

    #[error("profile {0:?} resolves to an empty token")]
    Empty(String),
}

/// Resolve one secret.
///
/// `profile` is the tenant's named profile, if configured; the `default`
/// profile is the last resort.
pub fn resolve_secret(
    env_var: &str,
    profiles: &Profiles,
    profile: Option<&str>,
) -> Result<String, CredentialError> {
    if let Ok(value) = std::env::var(env_var) {
        if !value.is_empty() {
            return Ok(value);
        }
    }

    let profile_name = profile.unwrap_or(DEFAULT_PROFILE);
    match profiles.get(profile_name) {
        Some(token) if !token.is_empty() => Ok(token.clone()),
        Some(_) => Err(CredentialError::Empty(profile_name.to_string())),
        None => {
            // Fall back to the default profile when a named one is absent.
            if profile.is_some() {
                if let Some(token) = profiles.get(DEFAULT_PROFILE) {
                    if !token.is_empty() {
                        return Ok(token.clone());
                    }
                }
            }
            Err(CredentialError::Missing {
                env_var: env_var.to_string(),
                profile: profile_name.to_string(),
            })
        }
    }
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
