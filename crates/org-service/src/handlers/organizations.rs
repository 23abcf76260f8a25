//! Organization handlers.
//!
//! Implements the organization CRUD endpoints:
//!
//! - `POST /api/organizations` - Create an organization owned by the caller
//! - `GET /api/organizations` - List the caller's organizations
//! - `GET /api/organizations/{id}` - Fetch one of the caller's organizations
//! - `PUT /api/organizations/{id}` - Partially update one of them
//! - `DELETE /api/organizations/{id}` - Delete one of them
//!
//! # Security
//!
//! - All endpoints require a verified bearer token (auth middleware)
//! - Ownership comes from the token subject, never from the request body
//! - Another owner's organization is reported as not found

use crate::auth::AuthenticatedUser;
use crate::errors::{AuthError, OrgError};
use crate::models::{CreateOrganizationRequest, Organization, UpdateOrganizationRequest};
use crate::repositories::OrganizationsRepository;
use crate::routes::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

const NOT_FOUND: &str = "Organization not found";
const NOT_FOUND_OR_FORBIDDEN: &str = "Organization not found or no permission";

/// The caller's subject as an owner id.
fn owner_id(user: &AuthenticatedUser) -> Result<Uuid, OrgError> {
    Uuid::parse_str(&user.user_id).map_err(|_| {
        tracing::debug!(target: "org.handlers.organizations", "Token subject is not a UUID");
        OrgError::Auth(AuthError::InvalidSubject)
    })
}

fn parse_organization_id(raw: &str) -> Result<Uuid, OrgError> {
    Uuid::parse_str(raw)
        .map_err(|_| OrgError::BadRequest("Invalid organization ID format".to_string()))
}

/// Deserialize a JSON body by hand so malformed input is a 400, not axum's 422.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, OrgError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "org.handlers.organizations", error = %e, "Invalid request body");
        OrgError::BadRequest("Invalid request body".to_string())
    })
}

/// Handler for POST /api/organizations
///
/// # Response
///
/// - 201 Created: the new organization
/// - 400 Bad Request: malformed body or invalid fields
/// - 401 Unauthorized: invalid token or non-UUID subject
#[instrument(skip_all, name = "org.organizations.create")]
pub async fn create_organization(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    body: Bytes,
) -> Result<(StatusCode, Json<Organization>), OrgError> {
    let owner = owner_id(&user)?;
    let request: CreateOrganizationRequest = parse_body(&body)?;

    request
        .validate()
        .map_err(|msg| OrgError::BadRequest(msg.to_string()))?;

    let organization = OrganizationsRepository::create(
        &state.pool,
        owner,
        request.name.trim(),
        request.description.as_deref(),
        request.is_active.unwrap_or(true),
    )
    .await?;

    tracing::info!(
        target: "org.handlers.organizations",
        organization_id = %organization.id,
        "Organization created"
    );

    Ok((StatusCode::CREATED, Json(organization)))
}

/// Handler for GET /api/organizations
#[instrument(skip_all, name = "org.organizations.list")]
pub async fn list_organizations(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<Organization>>, OrgError> {
    let owner = owner_id(&user)?;

    let organizations = OrganizationsRepository::list_for_owner(&state.pool, owner).await?;

    Ok(Json(organizations))
}

/// Handler for GET /api/organizations/{id}
///
/// # Response
///
/// - 200 OK: the organization
/// - 400 Bad Request: id is not a UUID
/// - 404 Not Found: missing, or owned by someone else
#[instrument(skip_all, name = "org.organizations.get", fields(organization_id = %id))]
pub async fn get_organization(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<Organization>, OrgError> {
    let owner = owner_id(&user)?;
    let id = parse_organization_id(&id)?;

    OrganizationsRepository::get_for_owner(&state.pool, id, owner)
        .await?
        .map(Json)
        .ok_or_else(|| OrgError::NotFound(NOT_FOUND.to_string()))
}

/// Handler for PUT /api/organizations/{id}
///
/// Omitted or null fields keep their stored value. An empty update is
/// rejected.
///
/// # Response
///
/// - 200 OK: the updated organization
/// - 400 Bad Request: bad id, malformed body, invalid or no fields
/// - 404 Not Found: missing, or owned by someone else
#[instrument(skip_all, name = "org.organizations.update", fields(organization_id = %id))]
pub async fn update_organization(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Organization>, OrgError> {
    let owner = owner_id(&user)?;
    let id = parse_organization_id(&id)?;
    let request: UpdateOrganizationRequest = parse_body(&body)?;

    request
        .validate()
        .map_err(|msg| OrgError::BadRequest(msg.to_string()))?;

    let updated = OrganizationsRepository::update_for_owner(
        &state.pool,
        id,
        owner,
        request.name.as_deref().map(str::trim),
        request.description.as_deref(),
        request.is_active,
    )
    .await?
    .ok_or_else(|| OrgError::NotFound(NOT_FOUND_OR_FORBIDDEN.to_string()))?;

    tracing::info!(target: "org.handlers.organizations", "Organization updated");

    Ok(Json(updated))
}

/// Handler for DELETE /api/organizations/{id}
///
/// # Response
///
/// - 204 No Content: deleted
/// - 400 Bad Request: id is not a UUID
/// - 404 Not Found: missing, or owned by someone else
#[instrument(skip_all, name = "org.organizations.delete", fields(organization_id = %id))]
pub async fn delete_organization(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, OrgError> {
    let owner = owner_id(&user)?;
    let id = parse_organization_id(&id)?;

    if !OrganizationsRepository::delete_for_owner(&state.pool, id, owner).await? {
        return Err(OrgError::NotFound(NOT_FOUND_OR_FORBIDDEN.to_string()));
    }

    tracing::info!(target: "org.handlers.organizations", "Organization deleted");

    Ok(StatusCode::NO_CONTENT)
}
