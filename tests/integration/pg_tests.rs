//! Reservation workflow against PostgreSQL
//!
//! Needs a reachable database (`DATABASE_URL`, or the default from config).
//! Run with: cargo test --test pg_tests -- --ignored

use std::{sync::Arc, time::Duration as StdDuration};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use libris_server::{
    config::DatabaseConfig,
    error::{AppError, AppResult},
    models::{
        book::CreateBook,
        reservation::ReservationStatus,
        user::{CreateUser, UserSummary},
    },
    repository::{Repository, Store, UserDirectory},
    services::{
        ledger::ReservationLedger, reservations::ReservationCoordinator, users::UsersService,
    },
};

/// Small pool so that a create needing two connections at once would starve
async fn pool(max_connections: u32) -> PgPool {
    let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| DatabaseConfig::default().url);
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(StdDuration::from_secs(5))
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

fn coordinator(repository: &Arc<Repository>) -> ReservationCoordinator {
    ReservationCoordinator::new(repository.clone(), repository.clone(), Duration::days(14))
}

async fn create_user(store: &Repository) -> Uuid {
    store
        .users_create(&CreateUser {
            username: format!("pg_{}", Uuid::new_v4().simple()),
            email: None,
            first_name: Some("Enjolras".to_string()),
            last_name: None,
        })
        .await
        .expect("Failed to create user")
        .id
}

async fn create_book(store: &Repository, copies: i32) -> Uuid {
    store
        .books_create(&CreateBook {
            title: "Notre-Dame de Paris".to_string(),
            author: "Victor Hugo".to_string(),
            categories: vec!["roman".to_string()],
            total_copies: copies,
            cover_image_url: None,
            description: None,
            isbn: None,
            publication_year: Some(1831),
        })
        .await
        .expect("Failed to create book")
        .id
}

async fn available(store: &Repository, book_id: Uuid) -> i32 {
    store.books_get(book_id).await.unwrap().available_copies
}

async fn reservations_of(store: &Repository, book_id: Uuid) -> usize {
    ReservationLedger::new(Arc::new(store.clone()))
        .by_book(book_id)
        .await
        .unwrap()
        .len()
}

/// Concurrent creates on one book: returns (successes, unavailable)
async fn race(repository: &Arc<Repository>, book_id: Uuid, readers: usize) -> (usize, usize) {
    let mut users = Vec::new();
    for _ in 0..readers {
        users.push(create_user(repository).await);
    }

    let handles: Vec<_> = users
        .into_iter()
        .map(|user| {
            let coordinator = coordinator(repository);
            tokio::spawn(async move { coordinator.create(user, book_id).await })
        })
        .collect();

    let (mut ok, mut unavailable) = (0, 0);
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(AppError::BookUnavailable(_)) => unavailable += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    (ok, unavailable)
}

struct OfflineDirectory;

#[async_trait]
impl UserDirectory for OfflineDirectory {
    async fn get_user_by_id(&self, _id: Uuid) -> AppResult<Option<UserSummary>> {
        Err(AppError::Internal("directory offline".to_string()))
    }
}

/// Resolves every id, including users the store never had
struct StaleDirectory;

#[async_trait]
impl UserDirectory for StaleDirectory {
    async fn get_user_by_id(&self, id: Uuid) -> AppResult<Option<UserSummary>> {
        Ok(Some(UserSummary {
            id,
            username: "stale".to_string(),
            first_name: None,
            last_name: None,
        }))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_creates_on_last_copy() {
    let repository = Arc::new(Repository::new(pool(2).await));
    let book = create_book(&repository, 1).await;

    let (ok, unavailable) = race(&repository, book, 12).await;

    assert_eq!(ok, 1);
    assert_eq!(unavailable, 11);
    assert_eq!(available(&repository, book).await, 0);
    assert_eq!(reservations_of(&repository, book).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_creates_within_stock_all_succeed() {
    let repository = Arc::new(Repository::new(pool(2).await));
    let book = create_book(&repository, 5).await;

    let (ok, unavailable) = race(&repository, book, 5).await;

    assert_eq!((ok, unavailable), (5, 0));
    assert_eq!(available(&repository, book).await, 0);
}

#[tokio::test]
#[ignore]
async fn test_second_close_is_rejected() {
    let repository = Arc::new(Repository::new(pool(4).await));
    let coordinator = coordinator(&repository);
    let book = create_book(&repository, 2).await;
    let user = create_user(&repository).await;

    let returned = coordinator.create(user, book).await.unwrap();
    coordinator.return_reservation(returned.id).await.unwrap();
    let cancelled = coordinator.create(user, book).await.unwrap();
    coordinator.cancel(cancelled.id).await.unwrap();
    assert_eq!(available(&repository, book).await, 2);

    for id in [returned.id, cancelled.id] {
        let err = coordinator.return_reservation(id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        let err = coordinator.cancel(id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }
    assert_eq!(available(&repository, book).await, 2);

    let stored = repository.reservations_get(returned.id).await.unwrap();
    assert_eq!(stored.status, ReservationStatus::Returned);
    assert!(stored.actual_return_date.is_some());
}

#[tokio::test]
#[ignore]
async fn test_directory_failure_leaves_book_untouched() {
    let repository = Arc::new(Repository::new(pool(4).await));
    let coordinator = ReservationCoordinator::new(
        repository.clone(),
        Arc::new(OfflineDirectory),
        Duration::days(14),
    );
    let book = create_book(&repository, 1).await;
    let user = create_user(&repository).await;

    let err = coordinator.create(user, book).await.unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
    assert_eq!(available(&repository, book).await, 1);
    assert_eq!(reservations_of(&repository, book).await, 0);
}

#[tokio::test]
#[ignore]
async fn test_missing_user_rolls_back_decrement() {
    let repository = Arc::new(Repository::new(pool(4).await));
    let coordinator = ReservationCoordinator::new(
        repository.clone(),
        Arc::new(StaleDirectory),
        Duration::days(14),
    );
    let book = create_book(&repository, 1).await;

    let err = coordinator.create(Uuid::new_v4(), book).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(available(&repository, book).await, 1);
    assert_eq!(reservations_of(&repository, book).await, 0);
}

#[tokio::test]
#[ignore]
async fn test_overdue_is_derived_from_due_date() {
    let pool = pool(4).await;
    let repository = Arc::new(Repository::new(pool.clone()));
    let coordinator = coordinator(&repository);
    let ledger = ReservationLedger::new(repository.clone());
    let book = create_book(&repository, 2).await;
    let user = create_user(&repository).await;

    let late = coordinator.create(user, book).await.unwrap();
    let on_time = coordinator.create(user, book).await.unwrap();
    sqlx::query(
        "UPDATE reservations SET reservation_date = $2 - INTERVAL '20 days', \
         expected_return_date = $2 - INTERVAL '6 days' WHERE id = $1",
    )
    .bind(late.id)
    .bind(Utc::now())
    .execute(&pool)
    .await
    .unwrap();

    let overdue: Vec<Uuid> = ledger
        .by_status(ReservationStatus::Overdue, Utc::now())
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert!(overdue.contains(&late.id));
    assert!(!overdue.contains(&on_time.id));

    // Still stored as ACTIVE, and still returnable
    let stored = repository.reservations_get(late.id).await.unwrap();
    assert_eq!(stored.status, ReservationStatus::Active);
    assert!(stored.is_overdue(Utc::now()));
    coordinator.return_reservation(late.id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_user_with_open_reservation_cannot_be_deleted() {
    let repository = Arc::new(Repository::new(pool(4).await));
    let coordinator = coordinator(&repository);
    let users = UsersService::new(repository.clone());
    let book = create_book(&repository, 1).await;
    let user = create_user(&repository).await;

    let reservation = coordinator.create(user, book).await.unwrap();
    let err = users.delete_user(user).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    coordinator.cancel(reservation.id).await.unwrap();
    users.delete_user(user).await.unwrap();

    let err = coordinator.create(user, book).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(available(&repository, book).await, 1);
}
