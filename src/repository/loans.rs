//! Loans repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanDetails, LoanQuery},
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

/// Row values for inserting a new loan
pub struct NewLoanRow {
    pub book_id: i32,
    pub user_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub notes: Option<String>,
}

const DETAILS_SELECT: &str = r#"
    SELECT l.id, l.book_id, l.user_id, l.loan_date, l.due_date, l.return_date,
           l.status, l.notes, b.title as book_title, b.author as book_author,
           u.login as user_login,
           (l.status = 'overdue' OR (l.status = 'active' AND l.due_date < NOW())) as is_overdue
    FROM book_loans l
    JOIN books b ON l.book_id = b.id
    JOIN users u ON l.user_id = u.id
"#;

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM book_loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::LoanNotFound { id })
    }

    /// Get loan with joined book/user display fields
    pub async fn get_details(&self, id: i32) -> AppResult<LoanDetails> {
        sqlx::query_as::<_, LoanDetails>(&format!("{} WHERE l.id = $1", DETAILS_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::LoanNotFound { id })
    }

    /// Find the non-returned loan a user holds on a book, if any.
    /// There is at most one by construction.
    pub async fn find_open_for_user_and_book(
        &self,
        user_id: i32,
        book_id: i32,
    ) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM book_loans
            WHERE user_id = $1 AND book_id = $2 AND status != 'returned'
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(loan)
    }

    /// Count loans occupying a user's borrowing slots (active and overdue)
    pub async fn count_open_for_user(&self, user_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM book_loans WHERE user_id = $1 AND status != 'returned'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Get loans for a user, most recent first
    pub async fn get_user_loans(
        &self,
        user_id: i32,
        include_returned: bool,
    ) -> AppResult<Vec<LoanDetails>> {
        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            r#"{}
            WHERE l.user_id = $1 AND ($2 OR l.status != 'returned')
            ORDER BY l.loan_date DESC
            "#,
            DETAILS_SELECT
        ))
        .bind(user_id)
        .bind(include_returned)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    /// Search loans with filters and pagination
    pub async fn search(&self, query: &LoanQuery) -> AppResult<(Vec<LoanDetails>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let status = query.status.map(|s| s.as_str().to_string());

        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            r#"{}
            WHERE ($1::text IS NULL OR l.status = $1)
              AND ($2::int IS NULL OR l.user_id = $2)
              AND ($3::int IS NULL OR l.book_id = $3)
            ORDER BY l.loan_date DESC
            LIMIT $4 OFFSET $5
            "#,
            DETAILS_SELECT
        ))
        .bind(&status)
        .bind(query.user_id)
        .bind(query.book_id)
        .bind(per_page)
        .bind(crate::repository::page_offset(page, per_page))
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM book_loans l
            WHERE ($1::text IS NULL OR l.status = $1)
              AND ($2::int IS NULL OR l.user_id = $2)
              AND ($3::int IS NULL OR l.book_id = $3)
            "#,
        )
        .bind(&status)
        .bind(query.user_id)
        .bind(query.book_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((loans, total))
    }

    /// Create a new loan row with status `active`
    pub async fn create(&self, loan: &NewLoanRow) -> AppResult<Loan> {
        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO book_loans (book_id, user_id, loan_date, due_date, status, notes)
            VALUES ($1, $2, $3, $4, 'active', $5)
            RETURNING *
            "#,
        )
        .bind(loan.book_id)
        .bind(loan.user_id)
        .bind(loan.loan_date)
        .bind(loan.due_date)
        .bind(&loan.notes)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Mark a loan returned, setting `return_date` and appending notes.
    /// Notes are concatenated with `"; "`, never replaced.
    pub async fn mark_returned(
        &self,
        id: i32,
        return_date: DateTime<Utc>,
        notes: Option<&str>,
    ) -> AppResult<Loan> {
        let updated = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE book_loans SET
                status = 'returned',
                return_date = $2,
                notes = CASE
                    WHEN $3::text IS NULL THEN notes
                    WHEN notes IS NULL OR notes = '' THEN $3
                    ELSE notes || '; ' || $3
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(return_date)
        .bind(notes)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::LoanNotFound { id })?;

        Ok(updated)
    }

    /// Extend a loan's due date, appending notes
    pub async fn extend_due_date(
        &self,
        id: i32,
        new_due_date: DateTime<Utc>,
        notes: Option<&str>,
    ) -> AppResult<Loan> {
        let updated = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE book_loans SET
                due_date = $2,
                notes = CASE
                    WHEN $3::text IS NULL THEN notes
                    WHEN notes IS NULL OR notes = '' THEN $3
                    ELSE notes || '; ' || $3
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(new_due_date)
        .bind(notes)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::LoanNotFound { id })?;

        Ok(updated)
    }

    /// Promote past-due active loans to overdue. Idempotent: loans already
    /// overdue are untouched. Returns the number of loans promoted.
    pub async fn mark_overdue(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE book_loans
            SET status = 'overdue', updated_at = NOW()
            WHERE status = 'active' AND due_date < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Count non-returned loans on a book
    pub async fn count_open_for_book(&self, book_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM book_loans WHERE book_id = $1 AND status != 'returned'",
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

}
