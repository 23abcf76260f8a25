//! HTTP request handlers for the organization service.

pub mod health;
pub mod me;
pub mod metrics;
pub mod organizations;

pub use health::{db_check, health_check, readiness_check};
pub use me::get_me;
pub use metrics::metrics_handler;
pub use organizations::{
    create_organization, delete_organization, get_organization, list_organizations,
    update_organization,
};
