//! Organization service models.
//!
//! Request bodies validate themselves; response bodies serialize straight
//! from database rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum organization name length, in characters.
pub const MAX_ORGANIZATION_NAME_LENGTH: usize = 100;

/// Maximum organization description length, in characters.
pub const MAX_ORGANIZATION_DESCRIPTION_LENGTH: usize = 2000;

/// Readiness check response.
///
/// Returned by the `/ready` endpoint (readiness probe).
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// Service readiness status ("ready" or "not_ready").
    pub status: &'static str,

    /// Database connectivity status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,

    /// Key-set endpoint configuration status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_set: Option<&'static str>,

    /// Error message (generic, no infrastructure details).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Database connectivity check response.
///
/// Returned by `GET /api/db-check`.
#[derive(Debug, Clone, Serialize)]
pub struct DbCheckResponse {
    pub status: &'static str,
    pub db_response: i32,
}

/// Identity of the caller.
///
/// Returned by `GET /api/me`.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub user_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Organization as stored and returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Server-generated identifier.
    pub id: Uuid,

    /// Display name (1-100 characters).
    pub name: String,

    /// Free-form description.
    pub description: Option<String>,

    /// Whether the organization is active.
    pub is_active: bool,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Subject of the token that created the organization.
    pub owner_user_id: Uuid,
}

/// Request to create an organization.
///
/// Sent in the body of `POST /api/organizations`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOrganizationRequest {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Defaults to `true` when omitted.
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl CreateOrganizationRequest {
    /// Validate the request fields.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_name(&self.name)?;
        validate_description(self.description.as_deref())
    }
}

/// Partial update of an organization.
///
/// Sent in the body of `PUT /api/organizations/{id}`. Omitted or null
/// fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateOrganizationRequest {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub is_active: Option<bool>,
}

impl UpdateOrganizationRequest {
    /// Check if the request has any changes.
    pub fn has_changes(&self) -> bool {
        self.name.is_some() || self.description.is_some() || self.is_active.is_some()
    }

    /// Validate the request fields.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.has_changes() {
            return Err("At least one field must be provided");
        }

        if let Some(name) = &self.name {
            validate_name(name)?;
        }

        validate_description(self.description.as_deref())
    }
}

fn validate_name(name: &str) -> Result<(), &'static str> {
    let name = name.trim();

    if name.is_empty() {
        return Err("Name is required");
    }

    if name.chars().count() > MAX_ORGANIZATION_NAME_LENGTH {
        return Err("Name must be at most 100 characters");
    }

    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<(), &'static str> {
    match description {
        Some(d) if d.chars().count() > MAX_ORGANIZATION_DESCRIPTION_LENGTH => {
            Err("Description must be at most 2000 characters")
        }
        _ => Ok(()),
    }
}
