use chrono::{DateTime, Utc};

use crate::domain::{
    Book, BookId, BookUpdate, IntegrityReport, Loan, Reader, ReaderId, ReaderUpdate,
    build_integrity_report, format_due_date,
};
use crate::storage::{BorrowOutcome, Repository, is_foreign_key_violation, is_unique_violation};

use super::AppError;

/// Application service providing the lending operations.
/// This is the primary interface for any client (CLI, tests, ...).
pub struct LedgerService {
    repo: Repository,
}

/// An active loan together with the rows it references
pub struct LoanInfo {
    pub loan: Loan,
    pub book: Book,
    pub reader: Reader,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Book operations
    // ========================

    /// Add a new book. Every book starts out available.
    pub async fn create_book(&self, title: String, author: String) -> Result<Book, AppError> {
        let book = self.repo.insert_book(&title, &author).await?;
        log::info!("Created book {} ('{}' by {})", book.id, book.title, book.author);
        Ok(book)
    }

    /// Get a book by ID.
    pub async fn get_book(&self, id: BookId) -> Result<Book, AppError> {
        self.repo
            .get_book(id)
            .await?
            .ok_or(AppError::BookNotFound(id))
    }

    /// List all books.
    pub async fn list_books(&self) -> Result<Vec<Book>, AppError> {
        Ok(self.repo.list_books().await?)
    }

    /// Change title and/or author. Fields left out of `update` are kept.
    pub async fn update_book(&self, id: BookId, update: BookUpdate) -> Result<Book, AppError> {
        let mut book = self.get_book(id).await?;
        if update.is_empty() {
            return Ok(book);
        }

        book.apply(update);
        self.repo.update_book(&book).await?;
        log::debug!("Updated book {}", id);
        Ok(book)
    }

    /// Delete a book that is not on loan.
    pub async fn delete_book(&self, id: BookId) -> Result<(), AppError> {
        self.get_book(id).await?;

        if self.repo.get_loan_for_book(id).await?.is_some() {
            log::warn!("Refusing to delete book {}: on loan", id);
            return Err(AppError::Conflict("book is on loan".to_string()));
        }

        // A borrow may land between the check and the delete; the foreign key catches it
        self.repo.delete_book(id).await.map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::Conflict("book is on loan".to_string())
            } else {
                AppError::Database(e)
            }
        })?;

        log::info!("Deleted book {}", id);
        Ok(())
    }

    // ========================
    // Reader operations
    // ========================

    /// Register a new reader. Names must be unique.
    pub async fn create_reader(
        &self,
        name: String,
        phone: Option<String>,
    ) -> Result<Reader, AppError> {
        if self.repo.get_reader_by_name(&name).await?.is_some() {
            return Err(duplicate_name(&name));
        }

        let reader = self
            .repo
            .insert_reader(&name, phone.as_deref())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    duplicate_name(&name)
                } else {
                    AppError::Database(e)
                }
            })?;

        log::info!("Created reader {} ('{}')", reader.id, reader.name);
        Ok(reader)
    }

    /// Get a reader by ID.
    pub async fn get_reader(&self, id: ReaderId) -> Result<Reader, AppError> {
        self.repo
            .get_reader(id)
            .await?
            .ok_or(AppError::ReaderNotFound(id))
    }

    /// List all readers.
    pub async fn list_readers(&self) -> Result<Vec<Reader>, AppError> {
        Ok(self.repo.list_readers().await?)
    }

    /// Change name and/or phone. A new name must not belong to another reader.
    pub async fn update_reader(
        &self,
        id: ReaderId,
        update: ReaderUpdate,
    ) -> Result<Reader, AppError> {
        let mut reader = self.get_reader(id).await?;
        if update.is_empty() {
            return Ok(reader);
        }

        if let Some(name) = &update.name {
            if let Some(other) = self.repo.get_reader_by_name(name).await? {
                if other.id != id {
                    return Err(duplicate_name(name));
                }
            }
        }

        reader.apply(update);
        self.repo.update_reader(&reader).await.map_err(|e| {
            if is_unique_violation(&e) {
                duplicate_name(&reader.name)
            } else {
                AppError::Database(e)
            }
        })?;

        log::debug!("Updated reader {}", id);
        Ok(reader)
    }

    /// Delete a reader without an active loan.
    pub async fn delete_reader(&self, id: ReaderId) -> Result<(), AppError> {
        self.get_reader(id).await?;

        if self.repo.get_loan_for_reader(id).await?.is_some() {
            log::warn!("Refusing to delete reader {}: active loan", id);
            return Err(AppError::Conflict("reader has an active loan".to_string()));
        }

        self.repo.delete_reader(id).await.map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::Conflict("reader has an active loan".to_string())
            } else {
                AppError::Database(e)
            }
        })?;

        log::info!("Deleted reader {}", id);
        Ok(())
    }

    // ========================
    // Loan operations
    // ========================

    /// Lend a book to a reader, starting now.
    pub async fn borrow(&self, book_id: BookId, reader_id: ReaderId) -> Result<Loan, AppError> {
        self.borrow_at(book_id, reader_id, Utc::now()).await
    }

    /// Lend a book to a reader with an explicit start date.
    /// The loan is due seven days after `start_date`.
    pub async fn borrow_at(
        &self,
        book_id: BookId,
        reader_id: ReaderId,
        start_date: DateTime<Utc>,
    ) -> Result<Loan, AppError> {
        let outcome = self
            .repo
            .create_loan(Loan::new(book_id, reader_id, start_date))
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    log::warn!(
                        "Concurrent borrow lost for book {} / reader {}",
                        book_id,
                        reader_id
                    );
                    AppError::Conflict("book or reader already has an active loan".to_string())
                } else {
                    AppError::Database(e)
                }
            })?;

        match outcome {
            BorrowOutcome::Created(loan) => {
                log::info!(
                    "Book {} lent to reader {} until {}",
                    book_id,
                    reader_id,
                    format_due_date(loan.due_date)
                );
                Ok(loan)
            }
            BorrowOutcome::BookMissing => Err(AppError::BookNotFound(book_id)),
            BorrowOutcome::ReaderMissing => Err(AppError::ReaderNotFound(reader_id)),
            BorrowOutcome::ReaderHasLoan(existing) => {
                log::debug!(
                    "Reader {} already holds loan {} (book {})",
                    reader_id,
                    existing.id,
                    existing.book_id
                );
                Err(AppError::Conflict(
                    "reader already has an active loan".to_string(),
                ))
            }
            BorrowOutcome::BookOnLoan { due_date } => Err(AppError::Conflict(match due_date {
                Some(due) => format!("book already loaned, due on {}", format_due_date(due)),
                None => "book already loaned".to_string(),
            })),
        }
    }

    /// Take a book back. Returns the closed loan, or `None` when the book
    /// had no active loan, which is not an error.
    pub async fn return_book(&self, book_id: BookId) -> Result<Option<Loan>, AppError> {
        let closed = self.repo.close_loan(book_id).await?;
        match &closed {
            Some(loan) => log::info!("Book {} returned by reader {}", book_id, loan.reader_id),
            None => log::debug!("Return of book {} with no active loan", book_id),
        }
        Ok(closed)
    }

    /// Get the active loan for a book, if any.
    pub async fn get_loan_for_book(&self, book_id: BookId) -> Result<Option<Loan>, AppError> {
        Ok(self.repo.get_loan_for_book(book_id).await?)
    }

    /// List active loans ordered by due date, optionally only the overdue ones.
    pub async fn list_loans(
        &self,
        overdue_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<Loan>, AppError> {
        let mut loans = self.repo.list_loans().await?;
        if let Some(now) = overdue_at {
            loans.retain(|loan| loan.is_overdue(now));
        }
        loans.sort_by_key(|loan| (loan.due_date, loan.id));
        Ok(loans)
    }

    /// Active loans with their book and reader resolved (useful for display).
    pub async fn list_loan_info(
        &self,
        overdue_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<LoanInfo>, AppError> {
        let loans = self.list_loans(overdue_at).await?;
        let mut infos = Vec::with_capacity(loans.len());

        for loan in loans {
            let book = self.get_book(loan.book_id).await?;
            let reader = self.get_reader(loan.reader_id).await?;
            infos.push(LoanInfo { loan, book, reader });
        }

        Ok(infos)
    }

    // ========================
    // Integrity operations
    // ========================

    /// Check that book statuses agree with active loans.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let books = self.repo.list_books().await?;
        let loans = self.repo.list_loans().await?;
        let reader_count = self.repo.count_readers().await?;

        Ok(build_integrity_report(&books, &loans, reader_count as usize))
    }
}

fn duplicate_name(name: &str) -> AppError {
    AppError::Duplicate(format!("a reader named '{}' already exists", name))
}
