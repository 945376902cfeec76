//! Reservation ledger: read access to reservation records

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::reservation::{Reservation, ReservationFilter, ReservationStatus, ReservationSummary},
    repository::Store,
};

#[derive(Clone)]
pub struct ReservationLedger {
    store: Arc<dyn Store>,
}

impl ReservationLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Reservation> {
        self.store.reservations_get(id).await
    }

    pub async fn all(&self) -> AppResult<Vec<Reservation>> {
        self.store.reservations_find(&ReservationFilter::default()).await
    }

    pub async fn by_user(&self, user_id: Uuid) -> AppResult<Vec<Reservation>> {
        let filter = ReservationFilter {
            user_id: Some(user_id),
            ..Default::default()
        };
        self.store.reservations_find(&filter).await
    }

    pub async fn by_book(&self, book_id: Uuid) -> AppResult<Vec<Reservation>> {
        let filter = ReservationFilter {
            book_id: Some(book_id),
            ..Default::default()
        };
        self.store.reservations_find(&filter).await
    }

    /// Reservations in a status. `Overdue` is evaluated against `now`
    /// rather than read from the stored status.
    pub async fn by_status(
        &self,
        status: ReservationStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Reservation>> {
        self.store.reservations_find(&status_filter(status, now)).await
    }

    pub async fn summary(&self, now: DateTime<Utc>) -> AppResult<ReservationSummary> {
        let active = self
            .store
            .reservations_count(&status_filter(ReservationStatus::Active, now))
            .await?;
        let overdue = self
            .store
            .reservations_count(&status_filter(ReservationStatus::Overdue, now))
            .await?;
        Ok(ReservationSummary { active, overdue })
    }
}

fn status_filter(status: ReservationStatus, now: DateTime<Utc>) -> ReservationFilter {
    match status {
        ReservationStatus::Overdue => ReservationFilter {
            overdue_at: Some(now),
            ..Default::default()
        },
        other => ReservationFilter {
            status: Some(other),
            ..Default::default()
        },
    }
}
