//! In-process store for tests and local runs
//!
//! A unit of work holds the store lock from `begin` to commit or drop and
//! edits a staged copy of the data; commit swaps the copy in. Units of work
//! are therefore fully serialized. Users live behind their own lock so the
//! user directory can be read while a unit of work is open.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, CreateBook, UpdateBook},
        reservation::{NewReservation, Reservation, ReservationFilter, ReservationStatus},
        user::{CreateUser, User, UserSummary},
    },
    services::inventory::CopyAdjustment,
};

use super::{Store, UnitOfWork, UserDirectory};

#[derive(Debug, Clone, Default)]
struct Tables {
    books: IndexMap<Uuid, Book>,
    reservations: IndexMap<Uuid, Reservation>,
}

impl Tables {
    fn book(&self, id: Uuid) -> AppResult<&Book> {
        self.books
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    fn reservation(&self, id: Uuid) -> AppResult<&Reservation> {
        self.reservations
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    users: Arc<RwLock<IndexMap<Uuid, User>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a book's copy counts without going through the inventory
    #[cfg(test)]
    pub(crate) async fn force_copies(&self, book_id: Uuid, available: i32, total: i32) {
        let mut tables = self.tables.lock().await;
        if let Some(book) = tables.books.get_mut(&book_id) {
            book.available_copies = available;
            book.total_copies = total;
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn books_list(&self) -> AppResult<Vec<Book>> {
        Ok(self.tables.lock().await.books.values().cloned().collect())
    }

    async fn books_get(&self, id: Uuid) -> AppResult<Book> {
        self.tables.lock().await.book(id).cloned()
    }

    async fn books_search(&self, text: &str) -> AppResult<Vec<Book>> {
        let needle = text.to_lowercase();
        let tables = self.tables.lock().await;
        Ok(tables
            .books
            .values()
            .filter(|b| {
                b.title.to_lowercase().contains(&needle) || b.author.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn books_by_categories(&self, categories: &[String]) -> AppResult<Vec<Book>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .books
            .values()
            .filter(|b| b.categories.iter().any(|c| categories.contains(c)))
            .cloned()
            .collect())
    }

    async fn books_create(&self, book: &CreateBook) -> AppResult<Book> {
        let now = Utc::now();
        let created = Book {
            id: Uuid::new_v4(),
            title: book.title.clone(),
            author: book.author.clone(),
            categories: book.categories.clone(),
            total_copies: book.total_copies,
            available_copies: book.total_copies,
            cover_image_url: book.cover_image_url.clone(),
            description: book.description.clone(),
            isbn: book.isbn.clone(),
            publication_year: book.publication_year,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .lock()
            .await
            .books
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn reservations_get(&self, id: Uuid) -> AppResult<Reservation> {
        self.tables.lock().await.reservation(id).cloned()
    }

    async fn reservations_find(&self, filter: &ReservationFilter) -> AppResult<Vec<Reservation>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reservations
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn reservations_count(&self, filter: &ReservationFilter) -> AppResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables.reservations.values().filter(|r| filter.matches(r)).count() as i64)
    }

    async fn users_list(&self) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn users_get(&self, id: Uuid) -> AppResult<User> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn users_create(&self, user: &CreateUser) -> AppResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict(format!(
                "Username {} is already taken",
                user.username
            )));
        }
        let created = User {
            id: Uuid::new_v4(),
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            created_at: Utc::now(),
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            staged,
            users: self.users.clone(),
            removed_users: Vec::new(),
        }))
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn get_user_by_id(&self, id: Uuid) -> AppResult<Option<UserSummary>> {
        Ok(self.users.read().await.get(&id).cloned().map(UserSummary::from))
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
    users: Arc<RwLock<IndexMap<Uuid, User>>>,
    /// Applied to `users` on commit
    removed_users: Vec<Uuid>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn book_for_update(&mut self, id: Uuid) -> AppResult<Book> {
        self.staged.book(id).cloned()
    }

    async fn book_adjust_copies(
        &mut self,
        id: Uuid,
        adjustment: &CopyAdjustment,
    ) -> AppResult<Option<Book>> {
        let Some(book) = self.staged.books.get_mut(&id) else {
            return Ok(None);
        };
        let Some((available, total)) = adjustment.apply(book.available_copies, book.total_copies)
        else {
            return Ok(None);
        };
        book.available_copies = available;
        book.total_copies = total;
        book.updated_at = Utc::now();
        Ok(Some(book.clone()))
    }

    async fn book_update(&mut self, id: Uuid, data: &UpdateBook) -> AppResult<Book> {
        let book = self
            .staged
            .books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;
        book.title = data.title.clone();
        book.author = data.author.clone();
        book.categories = data.categories.clone();
        book.cover_image_url = data.cover_image_url.clone();
        book.description = data.description.clone();
        book.isbn = data.isbn.clone();
        book.publication_year = data.publication_year;
        book.updated_at = Utc::now();
        Ok(book.clone())
    }

    async fn book_delete(&mut self, id: Uuid) -> AppResult<()> {
        self.staged
            .books
            .shift_remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn reservation_for_update(&mut self, id: Uuid) -> AppResult<Reservation> {
        self.staged.reservation(id).cloned()
    }

    async fn reservation_insert(&mut self, reservation: &NewReservation) -> AppResult<Reservation> {
        let created = Reservation {
            id: Uuid::new_v4(),
            user_id: reservation.user_id,
            book_id: reservation.book_id,
            reservation_date: reservation.reservation_date,
            expected_return_date: reservation.expected_return_date,
            actual_return_date: None,
            status: ReservationStatus::Active,
            user_username: reservation.display.user_username.clone(),
            user_first_name: reservation.display.user_first_name.clone(),
            user_last_name: reservation.display.user_last_name.clone(),
            book_title: reservation.display.book_title.clone(),
            book_author: reservation.display.book_author.clone(),
            updated_at: reservation.reservation_date,
        };
        self.staged.reservations.insert(created.id, created.clone());
        Ok(created)
    }

    async fn reservation_save(&mut self, reservation: &Reservation) -> AppResult<Reservation> {
        let stored = self
            .staged
            .reservations
            .get_mut(&reservation.id)
            .ok_or_else(|| {
                AppError::NotFound(format!("Reservation with id {} not found", reservation.id))
            })?;
        *stored = reservation.clone();
        Ok(stored.clone())
    }

    async fn reservation_delete(&mut self, id: Uuid) -> AppResult<()> {
        self.staged
            .reservations
            .shift_remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))
    }

    async fn reservations_open_for_book(&mut self, book_id: Uuid) -> AppResult<i64> {
        Ok(self
            .staged
            .reservations
            .values()
            .filter(|r| r.book_id == book_id && r.status.is_open())
            .count() as i64)
    }

    async fn reservations_open_for_user(&mut self, user_id: Uuid) -> AppResult<i64> {
        Ok(self
            .staged
            .reservations
            .values()
            .filter(|r| r.user_id == user_id && r.status.is_open())
            .count() as i64)
    }

    async fn user_for_update(&mut self, id: Uuid) -> AppResult<()> {
        let removed = self.removed_users.contains(&id);
        if removed || !self.users.read().await.contains_key(&id) {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        Ok(())
    }

    async fn user_delete(&mut self, id: Uuid) -> AppResult<()> {
        self.user_for_update(id).await?;
        self.removed_users.push(id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnitOfWork {
            mut guard,
            staged,
            users,
            removed_users,
        } = *self;
        if !removed_users.is_empty() {
            let mut users = users.write().await;
            for id in &removed_users {
                users.shift_remove(id);
            }
        }
        *guard = staged;
        Ok(())
    }
}
