//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Book record with its copy counts
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub categories: Vec<String>,
    /// Number of copies owned by the library (at least 1)
    pub total_copies: i32,
    /// Copies not currently held by an open reservation
    pub available_copies: i32,
    pub cover_image_url: Option<String>,
    pub description: Option<String>,
    pub isbn: Option<String>,
    pub publication_year: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }

    /// Copies currently held by open reservations
    pub fn checked_out(&self) -> i32 {
        self.total_copies - self.available_copies
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Create book request. New books start with every copy available.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(custom(function = "not_blank", message = "Title is required"))]
    pub title: String,
    #[validate(custom(function = "not_blank", message = "Author is required"))]
    pub author: String,
    #[validate(length(min = 1, message = "At least one category is required"))]
    pub categories: Vec<String>,
    #[validate(range(min = 1, message = "Total copies must be at least 1"))]
    pub total_copies: i32,
    pub cover_image_url: Option<String>,
    pub description: Option<String>,
    pub isbn: Option<String>,
    pub publication_year: Option<i32>,
}

/// Replace book request.
///
/// `total_copies` is applied through the inventory so the number of
/// checked-out copies is preserved.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(custom(function = "not_blank", message = "Title is required"))]
    pub title: String,
    #[validate(custom(function = "not_blank", message = "Author is required"))]
    pub author: String,
    #[validate(length(min = 1, message = "At least one category is required"))]
    pub categories: Vec<String>,
    #[validate(range(min = 1, message = "Total copies must be at least 1"))]
    pub total_copies: i32,
    pub cover_image_url: Option<String>,
    pub description: Option<String>,
    pub isbn: Option<String>,
    pub publication_year: Option<i32>,
}

/// Free-text search over title and author
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct BookSearchQuery {
    pub query: String,
}

/// Category filter, comma separated (`categories=fiction,poetry`)
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct CategoryQuery {
    pub categories: String,
}

impl CategoryQuery {
    pub fn list(&self) -> Vec<String> {
        self.categories
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }
}
