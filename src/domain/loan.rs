use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, ReaderId};

pub type LoanId = i64;

/// Length of every loan.
pub const LOAN_PERIOD_DAYS: i64 = 7;

/// Due date for a loan starting at `start_date`.
pub fn due_date_for(start_date: DateTime<Utc>) -> DateTime<Utc> {
    start_date + Duration::days(LOAN_PERIOD_DAYS)
}

/// Format a due date the way it is shown to readers: day/month/year.
/// Example: 2024-03-09 -> "09/03/2024"
pub fn format_due_date(due_date: DateTime<Utc>) -> String {
    due_date.format("%d/%m/%Y").to_string()
}

/// An active loan. Existence of the row is what makes it active; returning
/// the book deletes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub book_id: BookId,
    pub reader_id: ReaderId,
    pub start_date: DateTime<Utc>,
    /// Always `start_date` + 7 days, fixed at creation
    pub due_date: DateTime<Utc>,
}

impl Loan {
    /// Create a new loan starting at `start_date`. The id is assigned by the repository.
    pub fn new(book_id: BookId, reader_id: ReaderId, start_date: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            book_id,
            reader_id,
            start_date,
            due_date: due_date_for(start_date),
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        now > self.due_date
    }

    pub fn has_valid_period(&self) -> bool {
        self.due_date == due_date_for(self.start_date)
    }
}
