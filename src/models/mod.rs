//! Data models for Libris

pub mod book;
pub mod reservation;
pub mod user;

// Re-export commonly used types
pub use book::{Book, CreateBook, UpdateBook};
pub use reservation::{
    NewReservation, Reservation, ReservationDetails, ReservationFilter, ReservationStatus,
};
pub use user::{CreateUser, User, UserSummary};
