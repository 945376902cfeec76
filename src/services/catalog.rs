//! Catalog management service

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, CreateBook, UpdateBook},
    repository::Store,
};

use super::inventory::BookInventory;

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
    inventory: BookInventory,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            inventory: BookInventory,
        }
    }

    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.store.books_list().await
    }

    pub async fn get_book(&self, id: Uuid) -> AppResult<Book> {
        self.store.books_get(id).await
    }

    /// Case-insensitive search in title and author
    pub async fn search_books(&self, query: &str) -> AppResult<Vec<Book>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::BadRequest("Search query must not be empty".to_string()));
        }
        self.store.books_search(query).await
    }

    pub async fn books_by_categories(&self, categories: &[String]) -> AppResult<Vec<Book>> {
        if categories.is_empty() {
            return Err(AppError::BadRequest("At least one category is required".to_string()));
        }
        self.store.books_by_categories(categories).await
    }

    /// Create a new book; every copy starts available
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;
        let created = self.store.books_create(&book).await?;
        tracing::info!(book_id = %created.id, total_copies = created.total_copies, "Book created");
        Ok(created)
    }

    /// Replace a book's fields. A new total is applied through the inventory.
    pub async fn update_book(&self, id: Uuid, book: UpdateBook) -> AppResult<Book> {
        book.validate()?;

        let mut uow = self.store.begin().await?;
        self.inventory
            .resize(uow.as_mut(), id, book.total_copies)
            .await?;
        let updated = uow.book_update(id, &book).await?;
        uow.commit().await?;
        Ok(updated)
    }

    /// Delete a book that no open reservation holds
    pub async fn delete_book(&self, id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        uow.book_for_update(id).await?;

        let open = uow.reservations_open_for_book(id).await?;
        if open > 0 {
            return Err(AppError::Conflict(format!(
                "Book {} still has {} open reservation(s)",
                id, open
            )));
        }

        uow.book_delete(id).await?;
        uow.commit().await?;
        tracing::info!(book_id = %id, "Book deleted");
        Ok(())
    }
}
