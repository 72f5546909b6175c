//! Copy availability management
//!
//! Wraps the books repository's atomic bounded counter update with the
//! business validation around reserving and releasing copies. This is the
//! only code path allowed to mutate `available_copies`.

use crate::{
    error::{AppError, AppResult},
    models::book::Book,
    repository::Repository,
};

#[derive(Clone)]
pub struct AvailabilityService {
    repository: Repository,
}

impl AvailabilityService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Reserve one copy of a book for a loan.
    ///
    /// The pre-check on the loaded row gives a clean `BookNotAvailable` for
    /// the common case; the atomic decrement remains the authority. When the
    /// decrement updates no row, a racing caller took the last copy between
    /// the check and the update, which is a definitive `ReservationConflict`.
    pub async fn reserve_copy(&self, book_id: i32) -> AppResult<Book> {
        let book = self.repository.books.get_by_id(book_id).await?;

        if book.available_copies <= 0 {
            return Err(AppError::BookNotAvailable { book_id });
        }

        let updated = self
            .repository
            .books
            .adjust_available_copies(book_id, -1)
            .await?
            .ok_or(AppError::ReservationConflict { book_id })?;

        tracing::debug!(
            book_id,
            available = updated.available_copies,
            "reserved one copy"
        );

        Ok(updated)
    }

    /// Release one copy of a book back to the shelf.
    pub async fn release_copy(&self, book_id: i32) -> AppResult<Book> {
        let book = self.repository.books.get_by_id(book_id).await?;

        if book.available_copies >= book.total_copies {
            return Err(AppError::CopiesAlreadyFull { book_id });
        }

        let updated = self
            .repository
            .books
            .adjust_available_copies(book_id, 1)
            .await?
            .ok_or(AppError::CopiesAlreadyFull { book_id })?;

        tracing::debug!(
            book_id,
            available = updated.available_copies,
            "released one copy"
        );

        Ok(updated)
    }
}
