//! Business logic services

pub mod auth;
pub mod availability;
pub mod catalog;
pub mod loans;

use crate::{
    config::{AuthConfig, LoansConfig},
    error::AppResult,
    repository::Repository,
};

/// Container for all services, constructed once at startup and shared
/// through `AppState`
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub availability: availability::AvailabilityService,
    pub loans: loans::LoanService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig, loans_config: LoansConfig) -> Self {
        let availability = availability::AvailabilityService::new(repository.clone());
        Self {
            auth: auth::AuthService::new(repository.clone(), auth_config),
            catalog: catalog::CatalogService::new(repository.clone()),
            loans: loans::LoanService::new(repository.clone(), availability.clone(), loans_config),
            availability,
            repository,
        }
    }

    /// Check that the database answers queries, for the readiness probe
    pub async fn database_ready(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}
