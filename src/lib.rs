//! Librio Library Lending System
//!
//! A Rust REST JSON API server for managing a library's books, categories,
//! users and loans. The loan lifecycle and copy-availability bookkeeping live
//! in the service layer; HTTP handlers are thin translators.

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
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
