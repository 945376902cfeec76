//! Reservations repository for database operations

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::reservation::{Reservation, ReservationFilter},
};

#[derive(Clone)]
pub struct ReservationsRepository {
    pool: Pool<Postgres>,
}

/// WHERE clause for a filter, numbering placeholders from $1.
/// Binds must follow the same order: user_id, book_id, status, overdue_at.
fn where_clause(filter: &ReservationFilter) -> String {
    let mut conditions = Vec::new();
    let mut idx = 1;

    if filter.user_id.is_some() {
        conditions.push(format!("user_id = ${}", idx));
        idx += 1;
    }
    if filter.book_id.is_some() {
        conditions.push(format!("book_id = ${}", idx));
        idx += 1;
    }
    if filter.status.is_some() {
        conditions.push(format!("status = ${}", idx));
        idx += 1;
    }
    if filter.overdue_at.is_some() {
        conditions.push(format!(
            "status IN ('ACTIVE', 'OVERDUE') AND expected_return_date < ${}",
            idx
        ));
    }

    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

impl ReservationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get reservation by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Reservation> {
        sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))
    }

    /// Reservations matching a filter, oldest first
    pub async fn find(&self, filter: &ReservationFilter) -> AppResult<Vec<Reservation>> {
        let query = format!(
            "SELECT * FROM reservations {} ORDER BY reservation_date, id",
            where_clause(filter)
        );

        let mut builder = sqlx::query_as::<_, Reservation>(&query);
        if let Some(user_id) = filter.user_id { builder = builder.bind(user_id); }
        if let Some(book_id) = filter.book_id { builder = builder.bind(book_id); }
        if let Some(status) = filter.status { builder = builder.bind(status); }
        if let Some(at) = filter.overdue_at { builder = builder.bind(at); }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Count reservations matching a filter
    pub async fn count(&self, filter: &ReservationFilter) -> AppResult<i64> {
        let query = format!("SELECT COUNT(*) FROM reservations {}", where_clause(filter));

        let mut builder = sqlx::query_scalar::<_, i64>(&query);
        if let Some(user_id) = filter.user_id { builder = builder.bind(user_id); }
        if let Some(book_id) = filter.book_id { builder = builder.bind(book_id); }
        if let Some(status) = filter.status { builder = builder.bind(status); }
        if let Some(at) = filter.overdue_at { builder = builder.bind(at); }

        let count = builder.fetch_one(&self.pool).await?;
        Ok(count)
    }
}
