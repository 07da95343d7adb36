use std::collections::HashSet;

use super::{Book, BookStatus, Loan, format_due_date};

/// Result of checking the ledger invariants.
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub book_count: usize,
    pub reader_count: usize,
    pub loan_count: usize,
    pub issues: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Cross-check book statuses against active loans.
///
/// A book must be LOANED exactly when a loan references it, and every loan
/// must run for the fixed loan period.
pub fn build_integrity_report(
    books: &[Book],
    loans: &[Loan],
    reader_count: usize,
) -> IntegrityReport {
    let loaned: HashSet<_> = loans.iter().map(|l| l.book_id).collect();
    let mut issues = Vec::new();

    for book in books {
        match (book.status, loaned.contains(&book.id)) {
            (BookStatus::Loaned, false) => issues.push(format!(
                "Book {} ('{}') is marked loaned but has no active loan",
                book.id, book.title
            )),
            (BookStatus::Available, true) => issues.push(format!(
                "Book {} ('{}') is marked available but has an active loan",
                book.id, book.title
            )),
            _ => {}
        }
    }

    for loan in loans {
        if !loan.has_valid_period() {
            issues.push(format!(
                "Loan {} has due date {} which is not {} days after its start",
                loan.id,
                format_due_date(loan.due_date),
                super::LOAN_PERIOD_DAYS
            ));
        }
    }

    IntegrityReport {
        book_count: books.len(),
        reader_count,
        loan_count: loans.len(),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn book(id: i64, status: BookStatus) -> Book {
        Book {
            id,
            title: format!("Book {}", id),
            author: "Someone".into(),
            status,
        }
    }

    #[test]
    fn test_consistent_ledger_is_healthy() {
        let books = vec![book(1, BookStatus::Loaned), book(2, BookStatus::Available)];
        let loans = vec![Loan::new(1, 1, Utc::now())];

        let report = build_integrity_report(&books, &loans, 1);
        assert!(report.is_healthy());
        assert_eq!(report.book_count, 2);
        assert_eq!(report.loan_count, 1);
    }

    #[test]
    fn test_status_mismatches_are_reported() {
        let books = vec![book(1, BookStatus::Loaned), book(2, BookStatus::Available)];
        let loans = vec![Loan::new(2, 1, Utc::now())];

        let report = build_integrity_report(&books, &loans, 1);
        assert_eq!(report.issues.len(), 2);
        assert!(report.issues[0].contains("no active loan"));
        assert!(report.issues[1].contains("marked available"));
    }
}
