//! Reservation endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::reservation::{
        CreateReservation, Reservation, ReservationDetails, ReservationStatus, ReservationSummary,
        UpdateReservation,
    },
};

/// Outcome of a return or cancel
#[derive(Serialize, ToSchema)]
pub struct CloseResponse {
    /// Status message
    pub message: String,
    pub reservation: ReservationDetails,
}

fn with_flags(reservations: Vec<Reservation>) -> Vec<ReservationDetails> {
    let now = Utc::now();
    reservations
        .into_iter()
        .map(|r| r.with_overdue_flag(now))
        .collect()
}

/// List all reservations
#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    responses(
        (status = 200, description = "All reservations", body = Vec<ReservationDetails>)
    )
)]
pub async fn list_reservations(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<ReservationDetails>>> {
    let reservations = state.services.ledger.all().await?;
    Ok(Json(with_flags(reservations)))
}

/// Get reservation by ID
#[utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "reservations",
    params(
        ("id" = Uuid, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation details", body = ReservationDetails),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ReservationDetails>> {
    let reservation = state.services.ledger.get(id).await?;
    Ok(Json(reservation.with_overdue_flag(Utc::now())))
}

/// Reserve a copy of a book for a user
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    request_body = CreateReservation,
    responses(
        (status = 201, description = "Reservation created", body = ReservationDetails),
        (status = 400, description = "Book not available for reservation"),
        (status = 404, description = "User or book not found")
    )
)]
pub async fn create_reservation(
    State(state): State<crate::AppState>,
    Json(request): Json<CreateReservation>,
) -> AppResult<(StatusCode, Json<ReservationDetails>)> {
    let reservation = state
        .services
        .reservations
        .create(request.user_id, request.book_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(reservation.with_overdue_flag(Utc::now())),
    ))
}

/// Change the expected return date and refresh display fields
#[utoipa::path(
    put,
    path = "/reservations/{id}",
    tag = "reservations",
    params(
        ("id" = Uuid, Path, description = "Reservation ID")
    ),
    request_body = UpdateReservation,
    responses(
        (status = 200, description = "Reservation updated", body = ReservationDetails),
        (status = 400, description = "Reservation closed or invalid date"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn update_reservation(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Json(changes): Json<UpdateReservation>,
) -> AppResult<Json<ReservationDetails>> {
    let reservation = state.services.reservations.update(id, changes).await?;
    Ok(Json(reservation.with_overdue_flag(Utc::now())))
}

/// Delete a returned or cancelled reservation
#[utoipa::path(
    delete,
    path = "/reservations/{id}",
    tag = "reservations",
    params(
        ("id" = Uuid, Path, description = "Reservation ID")
    ),
    responses(
        (status = 204, description = "Reservation deleted"),
        (status = 400, description = "Reservation still open"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn delete_reservation(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.reservations.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reservations of a user
#[utoipa::path(
    get,
    path = "/reservations/user/{user_id}",
    tag = "reservations",
    params(
        ("user_id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User's reservations", body = Vec<ReservationDetails>)
    )
)]
pub async fn get_user_reservations(
    State(state): State<crate::AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<ReservationDetails>>> {
    let reservations = state.services.ledger.by_user(user_id).await?;
    Ok(Json(with_flags(reservations)))
}

/// Reservations of a book
#[utoipa::path(
    get,
    path = "/reservations/book/{book_id}",
    tag = "reservations",
    params(
        ("book_id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book's reservations", body = Vec<ReservationDetails>)
    )
)]
pub async fn get_book_reservations(
    State(state): State<crate::AppState>,
    Path(book_id): Path<Uuid>,
) -> AppResult<Json<Vec<ReservationDetails>>> {
    let reservations = state.services.ledger.by_book(book_id).await?;
    Ok(Json(with_flags(reservations)))
}

/// Reservations in a status (OVERDUE is computed from the due date)
#[utoipa::path(
    get,
    path = "/reservations/status/{status}",
    tag = "reservations",
    params(
        ("status" = String, Path, description = "ACTIVE, RETURNED, CANCELLED or OVERDUE")
    ),
    responses(
        (status = 200, description = "Reservations in the status", body = Vec<ReservationDetails>),
        (status = 400, description = "Unknown status")
    )
)]
pub async fn get_reservations_by_status(
    State(state): State<crate::AppState>,
    Path(status): Path<String>,
) -> AppResult<Json<Vec<ReservationDetails>>> {
    let status: ReservationStatus = status.parse().map_err(AppError::BadRequest)?;
    let reservations = state.services.ledger.by_status(status, Utc::now()).await?;
    Ok(Json(with_flags(reservations)))
}

/// Active and overdue counts
#[utoipa::path(
    get,
    path = "/reservations/summary",
    tag = "reservations",
    responses(
        (status = 200, description = "Reservation counts", body = ReservationSummary)
    )
)]
pub async fn get_summary(
    State(state): State<crate::AppState>,
) -> AppResult<Json<ReservationSummary>> {
    let summary = state.services.ledger.summary(Utc::now()).await?;
    Ok(Json(summary))
}

/// Return a reserved book
#[utoipa::path(
    post,
    path = "/reservations/{id}/return",
    tag = "reservations",
    params(
        ("id" = Uuid, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = CloseResponse),
        (status = 400, description = "Reservation is not active"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn return_reservation(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CloseResponse>> {
    let reservation = state.services.reservations.return_reservation(id).await?;

    Ok(Json(CloseResponse {
        message: "Book returned successfully".to_string(),
        reservation: reservation.with_overdue_flag(Utc::now()),
    }))
}

/// Cancel an active reservation
#[utoipa::path(
    post,
    path = "/reservations/{id}/cancel",
    tag = "reservations",
    params(
        ("id" = Uuid, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation cancelled", body = CloseResponse),
        (status = 400, description = "Reservation is not active"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn cancel_reservation(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CloseResponse>> {
    let reservation = state.services.reservations.cancel(id).await?;

    Ok(Json(CloseResponse {
        message: "Reservation cancelled successfully".to_string(),
        reservation: reservation.with_overdue_flag(Utc::now()),
    }))
}
