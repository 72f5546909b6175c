//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Book model from database.
///
/// `available_copies` is bounded by `0 ..= total_copies` at the storage
/// layer; it is only ever mutated through the availability service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub category_id: Option<i32>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Book with category name for lists
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookDetails {
    pub id: i32,
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub category_id: Option<i32>,
    pub category_name: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,
}

/// Book query parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub category_id: Option<i32>,
    /// Only books with at least one available copy
    pub available: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub category_id: Option<i32>,
    #[validate(range(min = 1, message = "total_copies must be at least 1"))]
    pub total_copies: i32,
}

/// Update book request: every updatable field is enumerated explicitly,
/// `None` meaning "leave unchanged". Changing `total_copies` re-derives
/// `available_copies` so that copies currently on loan stay accounted for.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub category_id: Option<i32>,
    #[validate(range(min = 1, message = "total_copies must be at least 1"))]
    pub total_copies: Option<i32>,
}
