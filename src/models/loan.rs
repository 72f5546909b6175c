//! Loan (borrow) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};

/// Loan lifecycle status.
///
/// Transitions: `Active -> Overdue` (sweep), `Active -> Returned`,
/// `Overdue -> Returned`. `Returned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Overdue,
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
        }
    }

    /// Whether a loan in this status occupies a borrowing slot
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, LoanStatus::Returned)
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(LoanStatus::Active),
            "overdue" => Ok(LoanStatus::Overdue),
            "returned" => Ok(LoanStatus::Returned),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

// SQLx conversion for LoanStatus (stored as text)
impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Loan {
    /// A loan is overdue once its due date has passed, whether or not the
    /// sweep has promoted its status yet.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            LoanStatus::Overdue => true,
            LoanStatus::Active => self.due_date < now,
            LoanStatus::Returned => false,
        }
    }
}

/// Loan with joined book/user display fields
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub notes: Option<String>,
    pub book_title: String,
    pub book_author: Option<String>,
    pub user_login: String,
    pub is_overdue: bool,
}

/// Loan query parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct LoanQuery {
    pub status: Option<LoanStatus>,
    pub user_id: Option<i32>,
    pub book_id: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Borrow request
#[derive(Debug, Deserialize, ToSchema)]
pub struct BorrowRequest {
    pub book_id: i32,
    /// Loan duration in days; defaults to the configured loan period
    pub loan_period_days: Option<i64>,
    pub notes: Option<String>,
}

/// Return request
#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct ReturnRequest {
    /// Return timestamp; defaults to now
    pub return_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Renew request
#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct RenewRequest {
    /// Extension in days; defaults to the configured renewal extension
    pub extension_days: Option<i64>,
    pub notes: Option<String>,
}

/// Force return request (librarian only); the note explaining the force
/// action is mandatory
#[derive(Debug, Deserialize, ToSchema)]
pub struct ForceReturnRequest {
    pub return_date: Option<DateTime<Utc>>,
    pub notes: String,
}

/// Borrowing eligibility summary for a user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Eligibility {
    pub can_borrow: bool,
    /// Loans counted against the cap: both active and overdue
    pub active_loan_count: i64,
    pub max_allowed: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Result of the overdue sweep
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OverdueSweepResult {
    pub updated_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn status_round_trips_through_text() {
        for status in [LoanStatus::Active, LoanStatus::Overdue, LoanStatus::Returned] {
            assert_eq!(status.as_str().parse::<LoanStatus>().unwrap(), status);
        }
        assert!("lost".parse::<LoanStatus>().is_err());
    }

    #[test]
    fn overdue_and_active_occupy_slots() {
        assert!(LoanStatus::Active.occupies_slot());
        assert!(LoanStatus::Overdue.occupies_slot());
        assert!(!LoanStatus::Returned.occupies_slot());
    }

    #[test]
    fn past_due_active_loan_is_overdue_before_the_sweep() {
        let now = Utc::now();
        let loan = Loan {
            id: 1,
            book_id: 1,
            user_id: 1,
            loan_date: now - Duration::days(20),
            due_date: now - Duration::days(3),
            return_date: None,
            status: LoanStatus::Active,
            notes: None,
            created_at: None,
            updated_at: None,
        };
        assert!(loan.is_overdue(now));

        let fresh = Loan {
            due_date: now + Duration::days(3),
            ..loan.clone()
        };
        assert!(!fresh.is_overdue(now));

        let returned = Loan {
            status: LoanStatus::Returned,
            return_date: Some(now),
            ..loan
        };
        assert!(!returned.is_overdue(now));
    }
}
