//! Libris Library Catalog and Reservation Server
//!
//! A REST JSON API for managing a book catalog with per-title copy counts,
//! users, and the reservations that check copies out and back in.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<services::Services>,
}
