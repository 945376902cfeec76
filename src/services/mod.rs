//! Business logic services

pub mod catalog;
pub mod inventory;
pub mod ledger;
pub mod reservations;
pub mod users;

use std::sync::Arc;

use chrono::Duration;

use crate::{
    config::ReservationConfig,
    error::AppResult,
    repository::{Store, UserDirectory},
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub ledger: ledger::ReservationLedger,
    pub reservations: reservations::ReservationCoordinator,
    store: Arc<dyn Store>,
}

impl Services {
    /// Create all services over the given store and user directory
    pub fn new(
        store: Arc<dyn Store>,
        directory: Arc<dyn UserDirectory>,
        config: &ReservationConfig,
    ) -> Self {
        Self {
            catalog: catalog::CatalogService::new(store.clone()),
            users: users::UsersService::new(store.clone()),
            ledger: ledger::ReservationLedger::new(store.clone()),
            reservations: reservations::ReservationCoordinator::new(
                store.clone(),
                directory,
                Duration::days(config.loan_period_days),
            ),
            store,
        }
    }

    /// Check the store is reachable
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}
