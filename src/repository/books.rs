//! Books repository for database operations

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, CreateBook},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

/// Escape LIKE wildcards so user input only matches literally
pub(crate) fn like_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List all books
    pub async fn list(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Search title and author, case-insensitive
    pub async fn search(&self, text: &str) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE title ILIKE $1 OR author ILIKE $1
            ORDER BY created_at, id
            "#,
        )
        .bind(like_pattern(text))
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    /// Books sharing at least one category with the given list
    pub async fn by_categories(&self, categories: &[String]) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE categories && $1 ORDER BY created_at, id",
        )
        .bind(categories)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    /// Create a new book, all copies available
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                title, author, categories, total_copies, available_copies,
                cover_image_url, description, isbn, publication_year
            )
            VALUES ($1, $2, $3, $4, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.categories)
        .bind(book.total_copies)
        .bind(&book.cover_image_url)
        .bind(&book.description)
        .bind(&book.isbn)
        .bind(book.publication_year)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }
}
