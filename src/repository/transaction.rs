//! PostgreSQL unit of work
//!
//! Rows are locked with `SELECT ... FOR UPDATE` and copy counts change
//! through a guarded `UPDATE`, so concurrent reservations of the last copy
//! serialize on the book row and only one of them sees a copy left.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, UpdateBook},
        reservation::{NewReservation, Reservation},
    },
    services::inventory::CopyAdjustment,
};

use super::UnitOfWork;

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PgUnitOfWork {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn book_for_update(&mut self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn book_adjust_copies(
        &mut self,
        id: Uuid,
        adjustment: &CopyAdjustment,
    ) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET available_copies = available_copies + $2,
                total_copies = total_copies + $3,
                updated_at = NOW()
            WHERE id = $1
              AND total_copies + $3 >= 1
              AND available_copies + $2 >= 0
              AND available_copies + $2 <= total_copies + $3
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(adjustment.available_delta())
        .bind(adjustment.total_delta())
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(book)
    }

    async fn book_update(&mut self, id: Uuid, data: &UpdateBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = $2, author = $3, categories = $4, cover_image_url = $5,
                description = $6, isbn = $7, publication_year = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.author)
        .bind(&data.categories)
        .bind(&data.cover_image_url)
        .bind(&data.description)
        .bind(&data.isbn)
        .bind(data.publication_year)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn book_delete(&mut self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }

    async fn reservation_for_update(&mut self, id: Uuid) -> AppResult<Reservation> {
        sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))
    }

    async fn reservation_insert(&mut self, reservation: &NewReservation) -> AppResult<Reservation> {
        let created = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservations (
                user_id, book_id, reservation_date, expected_return_date, status,
                user_username, user_first_name, user_last_name, book_title, book_author
            )
            VALUES ($1, $2, $3, $4, 'ACTIVE', $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(reservation.user_id)
        .bind(reservation.book_id)
        .bind(reservation.reservation_date)
        .bind(reservation.expected_return_date)
        .bind(&reservation.display.user_username)
        .bind(&reservation.display.user_first_name)
        .bind(&reservation.display.user_last_name)
        .bind(&reservation.display.book_title)
        .bind(&reservation.display.book_author)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(created)
    }

    async fn reservation_save(&mut self, reservation: &Reservation) -> AppResult<Reservation> {
        sqlx::query_as::<_, Reservation>(
            r#"
            UPDATE reservations
            SET status = $2, expected_return_date = $3, actual_return_date = $4,
                user_username = $5, user_first_name = $6, user_last_name = $7,
                book_title = $8, book_author = $9, updated_at = $10
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(reservation.id)
        .bind(reservation.status)
        .bind(reservation.expected_return_date)
        .bind(reservation.actual_return_date)
        .bind(&reservation.user_username)
        .bind(&reservation.user_first_name)
        .bind(&reservation.user_last_name)
        .bind(&reservation.book_title)
        .bind(&reservation.book_author)
        .bind(reservation.updated_at)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Reservation with id {} not found", reservation.id))
        })
    }

    async fn reservation_delete(&mut self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Reservation with id {} not found", id)));
        }
        Ok(())
    }

    async fn reservations_open_for_book(&mut self, book_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reservations WHERE book_id = $1 AND status IN ('ACTIVE', 'OVERDUE')",
        )
        .bind(book_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn reservations_open_for_user(&mut self, user_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reservations WHERE user_id = $1 AND status IN ('ACTIVE', 'OVERDUE')",
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn user_for_update(&mut self, id: Uuid) -> AppResult<()> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn user_delete(&mut self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
