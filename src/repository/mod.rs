//! Repository layer for database operations
//!
//! Services talk to storage through [`Store`] (plain reads and writes) and
//! [`UnitOfWork`] (row-locking transaction used whenever a book and a
//! reservation change together). [`Repository`] is the PostgreSQL
//! implementation; [`memory::MemoryStore`] keeps everything in process.

pub mod books;
pub mod memory;
pub mod reservations;
pub mod transaction;
pub mod users;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        book::{Book, CreateBook, UpdateBook},
        reservation::{NewReservation, Reservation, ReservationFilter},
        user::{CreateUser, User, UserSummary},
    },
    services::inventory::CopyAdjustment,
};

/// Document-store style access to books, reservations and users
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> AppResult<()>;

    async fn books_list(&self) -> AppResult<Vec<Book>>;
    async fn books_get(&self, id: Uuid) -> AppResult<Book>;
    /// Case-insensitive substring match on title or author
    async fn books_search(&self, text: &str) -> AppResult<Vec<Book>>;
    /// Books carrying at least one of the categories
    async fn books_by_categories(&self, categories: &[String]) -> AppResult<Vec<Book>>;
    /// Insert a book with every copy available
    async fn books_create(&self, book: &CreateBook) -> AppResult<Book>;

    async fn reservations_get(&self, id: Uuid) -> AppResult<Reservation>;
    async fn reservations_find(&self, filter: &ReservationFilter) -> AppResult<Vec<Reservation>>;
    async fn reservations_count(&self, filter: &ReservationFilter) -> AppResult<i64>;

    async fn users_list(&self) -> AppResult<Vec<User>>;
    async fn users_get(&self, id: Uuid) -> AppResult<User>;
    async fn users_create(&self, user: &CreateUser) -> AppResult<User>;

    /// Start a unit of work. Dropping it without [`UnitOfWork::commit`] rolls it back.
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;
}

/// Transactional access to the records a reservation workflow touches.
/// Rows read through the `*_for_update` methods stay locked until commit.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn book_for_update(&mut self, id: Uuid) -> AppResult<Book>;
    /// Apply a copy-count change; `None` when the guard rejects it
    async fn book_adjust_copies(
        &mut self,
        id: Uuid,
        adjustment: &CopyAdjustment,
    ) -> AppResult<Option<Book>>;
    /// Replace descriptive fields. Copy counts are left untouched.
    async fn book_update(&mut self, id: Uuid, data: &UpdateBook) -> AppResult<Book>;
    async fn book_delete(&mut self, id: Uuid) -> AppResult<()>;

    async fn reservation_for_update(&mut self, id: Uuid) -> AppResult<Reservation>;
    async fn reservation_insert(&mut self, reservation: &NewReservation) -> AppResult<Reservation>;
    /// Persist status, dates and display fields of an existing reservation
    async fn reservation_save(&mut self, reservation: &Reservation) -> AppResult<Reservation>;
    async fn reservation_delete(&mut self, id: Uuid) -> AppResult<()>;
    async fn reservations_open_for_book(&mut self, book_id: Uuid) -> AppResult<i64>;
    async fn reservations_open_for_user(&mut self, user_id: Uuid) -> AppResult<i64>;

    /// Lock a user row so it cannot be deleted before commit
    async fn user_for_update(&mut self, id: Uuid) -> AppResult<()>;
    async fn user_delete(&mut self, id: Uuid) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Lookup of user display data for reservation denormalization
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user_by_id(&self, id: Uuid) -> AppResult<Option<UserSummary>>;
}

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub reservations: reservations::ReservationsRepository,
    pub users: users::UsersRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            reservations: reservations::ReservationsRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl Store for Repository {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn books_list(&self) -> AppResult<Vec<Book>> {
        self.books.list().await
    }

    async fn books_get(&self, id: Uuid) -> AppResult<Book> {
        self.books.get_by_id(id).await
    }

    async fn books_search(&self, text: &str) -> AppResult<Vec<Book>> {
        self.books.search(text).await
    }

    async fn books_by_categories(&self, categories: &[String]) -> AppResult<Vec<Book>> {
        self.books.by_categories(categories).await
    }

    async fn books_create(&self, book: &CreateBook) -> AppResult<Book> {
        self.books.create(book).await
    }

    async fn reservations_get(&self, id: Uuid) -> AppResult<Reservation> {
        self.reservations.get_by_id(id).await
    }

    async fn reservations_find(&self, filter: &ReservationFilter) -> AppResult<Vec<Reservation>> {
        self.reservations.find(filter).await
    }

    async fn reservations_count(&self, filter: &ReservationFilter) -> AppResult<i64> {
        self.reservations.count(filter).await
    }

    async fn users_list(&self) -> AppResult<Vec<User>> {
        self.users.list().await
    }

    async fn users_get(&self, id: Uuid) -> AppResult<User> {
        self.users.get_by_id(id).await
    }

    async fn users_create(&self, user: &CreateUser) -> AppResult<User> {
        self.users.create(user).await
    }

    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(transaction::PgUnitOfWork::new(tx)))
    }
}

#[async_trait]
impl UserDirectory for Repository {
    async fn get_user_by_id(&self, id: Uuid) -> AppResult<Option<UserSummary>> {
        self.users.summary(id).await
    }
}
