//! Reservation coordinator
//!
//! Owns every change that touches a reservation and its book together.
//! Each operation runs in one unit of work: the copy count and the
//! reservation status are committed together or not at all.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        reservation::{
            DisplayFields, NewReservation, Reservation, ReservationStatus, UpdateReservation,
        },
        user::UserSummary,
    },
    repository::{Store, UserDirectory},
};

use super::inventory::{BookInventory, InventoryError};

/// Ways a reservation leaves the open state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closing {
    Return,
    Cancel,
}

impl Closing {
    fn verb(&self) -> &'static str {
        match self {
            Closing::Return => "return",
            Closing::Cancel => "cancel",
        }
    }
}

/// Status reached by closing a reservation from `current`
fn next_status(current: ReservationStatus, closing: Closing) -> AppResult<ReservationStatus> {
    match (current, closing) {
        (ReservationStatus::Active | ReservationStatus::Overdue, Closing::Return) => {
            Ok(ReservationStatus::Returned)
        }
        (ReservationStatus::Active, Closing::Cancel) => Ok(ReservationStatus::Cancelled),
        (status, closing) => Err(AppError::InvalidTransition(format!(
            "Cannot {} a reservation with status {}",
            closing.verb(),
            status
        ))),
    }
}

fn display_fields(user: &UserSummary, book: &Book) -> DisplayFields {
    DisplayFields {
        user_username: Some(user.username.clone()),
        user_first_name: user.first_name.clone(),
        user_last_name: user.last_name.clone(),
        book_title: Some(book.title.clone()),
        book_author: Some(book.author.clone()),
    }
}

#[derive(Clone)]
pub struct ReservationCoordinator {
    store: Arc<dyn Store>,
    directory: Arc<dyn UserDirectory>,
    inventory: BookInventory,
    loan_period: Duration,
}

impl ReservationCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        directory: Arc<dyn UserDirectory>,
        loan_period: Duration,
    ) -> Self {
        Self {
            store,
            directory,
            inventory: BookInventory,
            loan_period,
        }
    }

    /// Reserve a copy of a book for a user
    pub async fn create(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Reservation> {
        // The directory may use its own connection, so it is read before
        // the unit of work takes one and starts locking rows.
        let user = match self.directory.get_user_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(%book_id, %user_id, "Reservation refused, unknown user");
                return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
            }
            Err(e) => {
                tracing::warn!(
                    %book_id,
                    %user_id,
                    error = %e,
                    "Reservation refused, user lookup failed"
                );
                return Err(e);
            }
        };

        let mut uow = self.store.begin().await?;

        let book = match self.inventory.reserve_copy(uow.as_mut(), book_id).await {
            Ok(book) => book,
            Err(InventoryError::NoCopiesAvailable(_)) => {
                tracing::info!(%book_id, %user_id, "Reservation refused, no copy available");
                return Err(AppError::BookUnavailable(
                    "Book is not available for reservation".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        // Holds off a concurrent user delete until commit
        if let Err(e) = uow.user_for_update(user_id).await {
            tracing::warn!(%book_id, %user_id, error = %e, "Reservation rolled back");
            return Err(e);
        }

        let now = Utc::now();
        let reservation = uow
            .reservation_insert(&NewReservation {
                user_id,
                book_id,
                reservation_date: now,
                expected_return_date: now + self.loan_period,
                display: display_fields(&user, &book),
            })
            .await?;

        uow.commit().await?;

        tracing::info!(
            reservation_id = %reservation.id,
            %book_id,
            %user_id,
            available_copies = book.available_copies,
            "Reservation created"
        );
        Ok(reservation)
    }

    /// Mark a reservation returned and give its copy back
    pub async fn return_reservation(&self, id: Uuid) -> AppResult<Reservation> {
        self.close(id, Closing::Return).await
    }

    /// Cancel an active reservation and give its copy back
    pub async fn cancel(&self, id: Uuid) -> AppResult<Reservation> {
        self.close(id, Closing::Cancel).await
    }

    async fn close(&self, id: Uuid, closing: Closing) -> AppResult<Reservation> {
        let mut uow = self.store.begin().await?;
        let mut reservation = uow.reservation_for_update(id).await?;

        let now = Utc::now();
        reservation.status = next_status(reservation.status, closing)?;
        if closing == Closing::Return {
            reservation.actual_return_date = Some(now);
        }
        reservation.updated_at = now;
        let saved = uow.reservation_save(&reservation).await?;

        let book = match self.inventory.return_copy(uow.as_mut(), saved.book_id).await {
            Ok(book) => book,
            Err(InventoryError::Store(AppError::NotFound(_))) => {
                return Err(AppError::InconsistentState(format!(
                    "Reservation {} references missing book {}",
                    id, saved.book_id
                )));
            }
            Err(e @ InventoryError::AllCopiesAlreadyAvailable(_)) => {
                return Err(AppError::InconsistentState(format!(
                    "Cannot {} reservation {}: {}",
                    closing.verb(),
                    id,
                    e
                )));
            }
            Err(e) => return Err(e.into()),
        };

        uow.commit().await?;

        tracing::info!(
            reservation_id = %id,
            book_id = %saved.book_id,
            status = %saved.status,
            available_copies = book.available_copies,
            "Reservation closed"
        );
        Ok(saved)
    }

    /// Move the expected return date and refresh the display cache
    pub async fn update(&self, id: Uuid, changes: UpdateReservation) -> AppResult<Reservation> {
        // `user_id` never changes, so the directory is read before locking
        let user_id = self.store.reservations_get(id).await?.user_id;
        let user = self.directory.get_user_by_id(user_id).await?;

        let mut uow = self.store.begin().await?;
        let mut reservation = uow.reservation_for_update(id).await?;

        if let Some(expected) = changes.expected_return_date {
            if !reservation.status.is_open() {
                return Err(AppError::InvalidTransition(format!(
                    "Cannot change the return date of a reservation with status {}",
                    reservation.status
                )));
            }
            if expected <= reservation.reservation_date {
                return Err(AppError::Validation(
                    "Expected return date must be after the reservation date".to_string(),
                ));
            }
            reservation.expected_return_date = expected;
        }

        // Display fields are refreshed from whatever still exists
        match uow.book_for_update(reservation.book_id).await {
            Ok(book) => {
                reservation.book_title = Some(book.title);
                reservation.book_author = Some(book.author);
            }
            Err(AppError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        if let Some(user) = user {
            reservation.user_username = Some(user.username);
            reservation.user_first_name = user.first_name;
            reservation.user_last_name = user.last_name;
        }

        reservation.updated_at = Utc::now();
        let saved = uow.reservation_save(&reservation).await?;
        uow.commit().await?;
        Ok(saved)
    }

    /// Delete a closed reservation. Open ones still hold a copy.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        let reservation = uow.reservation_for_update(id).await?;
        if reservation.status.is_open() {
            return Err(AppError::InvalidTransition(
                "Return or cancel the reservation before deleting it".to_string(),
            ));
        }
        uow.reservation_delete(id).await?;
        uow.commit().await?;
        tracing::info!(reservation_id = %id, "Reservation deleted");
        Ok(())
    }
}
