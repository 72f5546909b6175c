//! Loan lifecycle engine
//!
//! Orchestrates borrow, return, renew, force-return and the overdue sweep,
//! enforcing the lending invariants: borrowing caps, one open loan per
//! (user, book) pair, and the `active -> {overdue, returned}` state machine.

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
    models::{
        loan::{
            BorrowRequest, Eligibility, ForceReturnRequest, LoanDetails, LoanStatus, LoanQuery,
            RenewRequest, ReturnRequest,
        },
        user::UserClaims,
    },
    repository::{loans::NewLoanRow, Repository},
    services::availability::AvailabilityService,
};

#[derive(Clone)]
pub struct LoanService {
    repository: Repository,
    availability: AvailabilityService,
    config: LoansConfig,
}

/// A loan can be renewed while it is active and its due date has not
/// lapsed. The date check is deliberately independent of the status field:
/// a past-due loan the sweep has not promoted yet is still not renewable.
fn is_renewable(status: LoanStatus, due_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    status == LoanStatus::Active && due_date >= now
}

impl LoanService {
    pub fn new(
        repository: Repository,
        availability: AvailabilityService,
        config: LoansConfig,
    ) -> Self {
        Self {
            repository,
            availability,
            config,
        }
    }

    /// Get loans for a user
    pub async fn get_user_loans(
        &self,
        user_id: i32,
        include_returned: bool,
    ) -> AppResult<Vec<LoanDetails>> {
        // Verify user exists
        self.repository.users.get_by_id(user_id).await?;
        self.repository.loans.get_user_loans(user_id, include_returned).await
    }

    /// Search loans with filters
    pub async fn search(&self, query: &LoanQuery) -> AppResult<(Vec<LoanDetails>, i64)> {
        self.repository.loans.search(query).await
    }

    /// Borrow a book: validate the borrower, reserve a copy and create the
    /// loan row.
    ///
    /// The reservation and the loan insert are two separate statements; if
    /// the insert fails the reserved copy is released again. That
    /// compensation is best effort: a failing release is logged and the
    /// original error is returned, leaving the copy reserved until external
    /// reconciliation.
    pub async fn borrow_book(&self, user_id: i32, request: &BorrowRequest) -> AppResult<LoanDetails> {
        let book_id = request.book_id;
        let user = self.repository.users.get_by_id(user_id).await?;

        let open_loans = self.repository.loans.count_open_for_user(user_id).await?;
        if open_loans >= user.max_books_allowed as i64 {
            return Err(AppError::LoanLimitExceeded {
                limit: user.max_books_allowed,
                active: open_loans,
            });
        }

        if self
            .repository
            .loans
            .find_open_for_user_and_book(user_id, book_id)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateActiveLoan { user_id, book_id });
        }

        let period = request
            .loan_period_days
            .unwrap_or(self.config.loan_period_days);
        if period <= 0 {
            // due_date must stay strictly after loan_date
            return Err(AppError::Validation(
                "loan_period_days must be positive".to_string(),
            ));
        }

        self.availability.reserve_copy(book_id).await?;

        let now = Utc::now();
        let row = NewLoanRow {
            book_id,
            user_id,
            loan_date: now,
            due_date: now + Duration::days(period),
            notes: request.notes.clone(),
        };

        let created = match self.repository.loans.create(&row).await {
            Ok(loan) => loan,
            Err(err) => {
                tracing::error!(
                    book_id,
                    user_id,
                    "loan creation failed after reservation: {err}"
                );
                self.compensate_release(book_id).await;
                return Err(err);
            }
        };

        tracing::info!(loan_id = created.id, book_id, user_id, "book borrowed");
        self.repository.loans.get_details(created.id).await
    }

    async fn compensate_release(&self, book_id: i32) {
        if let Err(err) = self.availability.release_copy(book_id).await {
            tracing::error!(
                book_id,
                "compensating release failed, copy left reserved: {err}"
            );
        }
    }

    /// Return a borrowed book. Unless `force` is set, the caller must own
    /// the loan or be a librarian.
    pub async fn return_book(
        &self,
        loan_id: i32,
        caller: &UserClaims,
        request: &ReturnRequest,
        force: bool,
    ) -> AppResult<LoanDetails> {
        let loan = self.repository.loans.get_by_id(loan_id).await?;

        if !force && caller.user_id != loan.user_id && !caller.is_librarian() {
            return Err(AppError::NotAuthorized(
                "Only the loan owner or a librarian can return a loan".to_string(),
            ));
        }

        if loan.status == LoanStatus::Returned {
            return Err(AppError::AlreadyReturned { loan_id });
        }

        let return_date = request.return_date.unwrap_or_else(Utc::now);
        self.repository
            .loans
            .mark_returned(loan_id, return_date, request.notes.as_deref())
            .await?;

        // Release failure surfaces as-is; the loan row is already returned
        self.availability.release_copy(loan.book_id).await?;

        tracing::info!(loan_id, book_id = loan.book_id, "book returned");
        self.repository.loans.get_details(loan_id).await
    }

    /// Renew a loan, extending its due date
    pub async fn renew_loan(
        &self,
        loan_id: i32,
        caller: &UserClaims,
        request: &RenewRequest,
    ) -> AppResult<LoanDetails> {
        let loan = self.repository.loans.get_by_id(loan_id).await?;

        if caller.user_id != loan.user_id && !caller.is_librarian() {
            return Err(AppError::NotAuthorized(
                "Only the loan owner or a librarian can renew a loan".to_string(),
            ));
        }

        let now = Utc::now();
        if !is_renewable(loan.status, loan.due_date, now) {
            return Err(AppError::NotRenewable { loan_id });
        }

        let extension = request
            .extension_days
            .unwrap_or(self.config.renewal_extension_days);
        if extension <= 0 {
            return Err(AppError::Validation(
                "extension_days must be positive".to_string(),
            ));
        }

        let new_due_date = loan.due_date + Duration::days(extension);
        self.repository
            .loans
            .extend_due_date(loan_id, new_due_date, request.notes.as_deref())
            .await?;

        tracing::info!(loan_id, %new_due_date, "loan renewed");
        self.repository.loans.get_details(loan_id).await
    }

    /// Force-return a loan, bypassing the ownership check. Librarian only;
    /// requires a note explaining the action.
    pub async fn force_return_book(
        &self,
        loan_id: i32,
        caller: &UserClaims,
        request: &ForceReturnRequest,
    ) -> AppResult<LoanDetails> {
        caller.require_librarian()?;

        if request.notes.trim().len() < self.config.force_return_note_min_len {
            return Err(AppError::Validation(format!(
                "Force return requires a note of at least {} characters",
                self.config.force_return_note_min_len
            )));
        }

        let return_request = ReturnRequest {
            return_date: request.return_date,
            notes: Some(request.notes.clone()),
        };

        tracing::warn!(loan_id, librarian_id = caller.user_id, "force return");
        self.return_book(loan_id, caller, &return_request, true).await
    }

    /// Promote all past-due active loans to overdue. Availability is not
    /// touched: overdue books remain checked out.
    pub async fn update_overdue_loans(&self) -> AppResult<u64> {
        let updated = self.repository.loans.mark_overdue(Utc::now()).await?;
        if updated > 0 {
            tracing::info!(updated, "loans marked overdue");
        }
        Ok(updated)
    }

    /// Report whether a user may borrow another book. Active and overdue
    /// loans both occupy a borrowing slot.
    pub async fn check_borrowing_eligibility(&self, user_id: i32) -> AppResult<Eligibility> {
        let user = self.repository.users.get_by_id(user_id).await?;
        let active_loan_count = self.repository.loans.count_open_for_user(user_id).await?;
        let can_borrow = active_loan_count < user.max_books_allowed as i64;

        Ok(Eligibility {
            can_borrow,
            active_loan_count,
            max_allowed: user.max_books_allowed,
            reason: (!can_borrow).then(|| {
                format!(
                    "Borrowing limit reached ({}/{})",
                    active_loan_count, user.max_books_allowed
                )
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_loan_with_future_due_date_is_renewable() {
        let now = Utc::now();
        assert!(is_renewable(LoanStatus::Active, now + Duration::days(3), now));
        assert!(is_renewable(LoanStatus::Active, now, now));
    }

    #[test]
    fn past_due_loan_is_not_renewable_even_before_the_sweep() {
        let now = Utc::now();
        // status still says active, but the due date has lapsed
        assert!(!is_renewable(LoanStatus::Active, now - Duration::seconds(1), now));
        assert!(!is_renewable(LoanStatus::Overdue, now + Duration::days(3), now));
        assert!(!is_renewable(LoanStatus::Returned, now + Duration::days(3), now));
    }
}
