//! Repository layer for the organization service.
//!
//! All database access goes through here using runtime-checked,
//! parameterized sqlx queries.

pub mod organizations;

pub use organizations::OrganizationsRepository;
