//! Books repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookDetails, BookQuery, CreateBook, UpdateBook},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::BookNotFound { id })
    }

    /// Atomically adjust `available_copies` by `delta`, bounded to
    /// `[0, total_copies]`.
    ///
    /// Returns `None` when no row was updated, i.e. the book does not exist
    /// or the adjustment would leave the counter out of bounds. Callers must
    /// treat that as a definitive failure, not something to retry: for a
    /// decrement it means a racing borrower took the last copy.
    pub async fn adjust_available_copies(&self, id: i32, delta: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET available_copies = available_copies + $2,
                updated_at = NOW()
            WHERE id = $1
              AND available_copies + $2 >= 0
              AND available_copies + $2 <= total_copies
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    /// Search books with pagination
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<BookDetails>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let only_available = query.available.unwrap_or(false);

        let books = sqlx::query_as::<_, BookDetails>(
            r#"
            SELECT b.id, b.title, b.author, b.isbn, b.category_id,
                   c.name as category_name, b.total_copies, b.available_copies
            FROM books b
            LEFT JOIN categories c ON b.category_id = c.id
            WHERE ($1::text IS NULL OR b.title ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR b.author ILIKE '%' || $2 || '%')
              AND ($3::text IS NULL OR b.isbn = $3)
              AND ($4::int IS NULL OR b.category_id = $4)
              AND (NOT $5 OR b.available_copies > 0)
            ORDER BY b.title
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(&query.title)
        .bind(&query.author)
        .bind(&query.isbn)
        .bind(query.category_id)
        .bind(only_available)
        .bind(per_page)
        .bind(crate::repository::page_offset(page, per_page))
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM books b
            WHERE ($1::text IS NULL OR b.title ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR b.author ILIKE '%' || $2 || '%')
              AND ($3::text IS NULL OR b.isbn = $3)
              AND ($4::int IS NULL OR b.category_id = $4)
              AND (NOT $5 OR b.available_copies > 0)
            "#,
        )
        .bind(&query.title)
        .bind(&query.author)
        .bind(&query.isbn)
        .bind(query.category_id)
        .bind(only_available)
        .fetch_one(&self.pool)
        .await?;

        Ok((books, total))
    }

    /// Create a new book; all copies start available
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, isbn, category_id, total_copies, available_copies)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.category_id)
        .bind(book.total_copies)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Update a book; absent fields are left unchanged. When `total_copies`
    /// changes, `available_copies` is re-derived so copies currently on loan
    /// stay accounted for, clamped at zero.
    pub async fn update(&self, id: i32, update: &UpdateBook) -> AppResult<Book> {
        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                author = COALESCE($3, author),
                isbn = COALESCE($4, isbn),
                category_id = COALESCE($5, category_id),
                available_copies = CASE
                    WHEN $6::int IS NULL THEN available_copies
                    ELSE GREATEST($6 - (total_copies - available_copies), 0)
                END,
                total_copies = COALESCE($6, total_copies),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.title)
        .bind(&update.author)
        .bind(&update.isbn)
        .bind(update.category_id)
        .bind(update.total_copies)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::BookNotFound { id })?;

        Ok(updated)
    }

    /// Delete a book
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::BookNotFound { id });
        }

        Ok(())
    }

    /// Count books in a category
    pub async fn count_in_category(&self, category_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE category_id = $1")
            .bind(category_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
