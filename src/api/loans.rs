//! Loan lifecycle endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::loan::{
        BorrowRequest, ForceReturnRequest, LoanDetails, LoanQuery, OverdueSweepResult,
        RenewRequest, ReturnRequest,
    },
};

use super::{AuthenticatedUser, PaginatedResponse};

/// List loans with filters (librarian only)
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("status" = Option<String>, Query, description = "Filter by status (active/overdue/returned)"),
        ("user_id" = Option<i32>, Query, description = "Filter by user"),
        ("book_id" = Option<i32>, Query, description = "Filter by book"),
        ("page" = Option<i64>, Query, description = "Page number"),
        ("per_page" = Option<i64>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "List of loans", body = PaginatedResponse<LoanDetails>),
        (status = 403, description = "Librarian role required")
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<PaginatedResponse<LoanDetails>>> {
    claims.require_librarian()?;

    let (loans, total) = state.services.loans.search(&query).await?;

    Ok(Json(PaginatedResponse {
        items: loans,
        total,
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    }))
}

/// Borrow a book for the authenticated user
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Loan created", body = LoanDetails),
        (status = 404, description = "User or book not found"),
        (status = 409, description = "No copies available or duplicate active loan"),
        (status = 422, description = "Borrowing limit reached")
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BorrowRequest>,
) -> AppResult<(StatusCode, Json<LoanDetails>)> {
    let loan = state
        .services
        .loans
        .borrow_book(claims.user_id, &request)
        .await?;

    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Book returned", body = LoanDetails),
        (status = 403, description = "Not the loan owner"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    request: Option<Json<ReturnRequest>>,
) -> AppResult<Json<LoanDetails>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();

    let loan = state
        .services
        .loans
        .return_book(loan_id, &claims, &request, false)
        .await?;

    Ok(Json(loan))
}

/// Renew a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/renew",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = RenewRequest,
    responses(
        (status = 200, description = "Loan renewed", body = LoanDetails),
        (status = 403, description = "Not the loan owner"),
        (status = 404, description = "Loan not found"),
        (status = 422, description = "Loan not renewable")
    )
)]
pub async fn renew_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    request: Option<Json<RenewRequest>>,
) -> AppResult<Json<LoanDetails>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();

    let loan = state
        .services
        .loans
        .renew_loan(loan_id, &claims, &request)
        .await?;

    Ok(Json(loan))
}

/// Force-return a loan (librarian only), e.g. for lost or damaged books
#[utoipa::path(
    post,
    path = "/loans/{id}/force-return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = ForceReturnRequest,
    responses(
        (status = 200, description = "Book force-returned", body = LoanDetails),
        (status = 400, description = "Missing or too-short note"),
        (status = 403, description = "Librarian role required"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn force_return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    Json(request): Json<ForceReturnRequest>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state
        .services
        .loans
        .force_return_book(loan_id, &claims, &request)
        .await?;

    Ok(Json(loan))
}

/// Promote past-due active loans to overdue (librarian only).
/// Intended to be invoked by an external scheduler such as cron.
#[utoipa::path(
    post,
    path = "/loans/update-overdue",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep completed", body = OverdueSweepResult),
        (status = 403, description = "Librarian role required")
    )
)]
pub async fn update_overdue_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<OverdueSweepResult>> {
    claims.require_librarian()?;

    let updated_count = state.services.loans.update_overdue_loans().await?;
    Ok(Json(OverdueSweepResult { updated_count }))
}
