//! Domain models and request/response types

pub mod book;
pub mod category;
pub mod loan;
pub mod user;
