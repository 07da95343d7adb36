use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::domain::{Book, BookId, BookStatus, Loan, Reader, ReaderId};

use super::MIGRATION_001_INITIAL;

/// Starts a transaction holding the database write lock from its first statement
const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

/// What happened when a borrow transaction ran.
#[derive(Debug, Clone)]
pub enum BorrowOutcome {
    /// Loan inserted and book marked loaned
    Created(Loan),
    /// No book with the requested ID
    BookMissing,
    /// No reader with the requested ID
    ReaderMissing,
    /// The reader already holds an active loan
    ReaderHasLoan(Loan),
    /// The book is marked loaned; carries the due date of its loan when one exists
    BookOnLoan { due_date: Option<DateTime<Utc>> },
}

/// Repository for persisting and querying books, readers and loans.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    /// Foreign keys are always enforced.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Book operations
    // ========================

    /// Insert a new book. It starts out available.
    pub async fn insert_book(&self, title: &str, author: &str) -> Result<Book> {
        let row = sqlx::query(
            r#"
            INSERT INTO books (title, author, status)
            VALUES (?, ?, ?)
            RETURNING id, title, author, status
            "#,
        )
        .bind(title)
        .bind(author)
        .bind(BookStatus::Available.as_str())
        .fetch_one(&self.pool)
        .await
        .context("Failed to save book")?;

        Self::row_to_book(&row)
    }

    /// Get a book by ID.
    pub async fn get_book(&self, id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query("SELECT id, title, author, status FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch book")?;

        row.as_ref().map(Self::row_to_book).transpose()
    }

    /// List all books, ordered by ID.
    pub async fn list_books(&self) -> Result<Vec<Book>> {
        let rows = sqlx::query("SELECT id, title, author, status FROM books ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list books")?;

        rows.iter().map(Self::row_to_book).collect()
    }

    /// Persist title and author of an existing book. Status is owned by loans.
    pub async fn update_book(&self, book: &Book) -> Result<()> {
        sqlx::query("UPDATE books SET title = ?, author = ? WHERE id = ?")
            .bind(&book.title)
            .bind(&book.author)
            .bind(book.id)
            .execute(&self.pool)
            .await
            .context("Failed to update book")?;
        Ok(())
    }

    /// Delete a book. Fails with a foreign key violation if a loan references it.
    pub async fn delete_book(&self, id: BookId) -> Result<()> {
        sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete book")?;
        Ok(())
    }

    fn row_to_book(row: &SqliteRow) -> Result<Book> {
        let status_str: String = row.get("status");

        Ok(Book {
            id: row.get("id"),
            title: row.get("title"),
            author: row.get("author"),
            status: BookStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid book status: {}", status_str))?,
        })
    }

    // ========================
    // Reader operations
    // ========================

    /// Insert a new reader. Fails with a unique violation if the name is taken.
    pub async fn insert_reader(&self, name: &str, phone: Option<&str>) -> Result<Reader> {
        let row = sqlx::query(
            r#"
            INSERT INTO readers (name, phone)
            VALUES (?, ?)
            RETURNING id, name, phone
            "#,
        )
        .bind(name)
        .bind(phone)
        .fetch_one(&self.pool)
        .await
        .context("Failed to save reader")?;

        Ok(Self::row_to_reader(&row))
    }

    /// Get a reader by ID.
    pub async fn get_reader(&self, id: ReaderId) -> Result<Option<Reader>> {
        let row = sqlx::query("SELECT id, name, phone FROM readers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch reader")?;

        Ok(row.as_ref().map(Self::row_to_reader))
    }

    /// Get a reader by name.
    pub async fn get_reader_by_name(&self, name: &str) -> Result<Option<Reader>> {
        let row = sqlx::query("SELECT id, name, phone FROM readers WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch reader by name")?;

        Ok(row.as_ref().map(Self::row_to_reader))
    }

    /// List all readers, ordered by ID.
    pub async fn list_readers(&self) -> Result<Vec<Reader>> {
        let rows = sqlx::query("SELECT id, name, phone FROM readers ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list readers")?;

        Ok(rows.iter().map(Self::row_to_reader).collect())
    }

    /// Persist name and phone of an existing reader.
    pub async fn update_reader(&self, reader: &Reader) -> Result<()> {
        sqlx::query("UPDATE readers SET name = ?, phone = ? WHERE id = ?")
            .bind(&reader.name)
            .bind(&reader.phone)
            .bind(reader.id)
            .execute(&self.pool)
            .await
            .context("Failed to update reader")?;
        Ok(())
    }

    /// Delete a reader. Fails with a foreign key violation if a loan references it.
    pub async fn delete_reader(&self, id: ReaderId) -> Result<()> {
        sqlx::query("DELETE FROM readers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete reader")?;
        Ok(())
    }

    pub async fn count_readers(&self) -> Result<i64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) as count FROM readers")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count readers")?
            .get("count");
        Ok(count)
    }

    fn row_to_reader(row: &SqliteRow) -> Reader {
        Reader {
            id: row.get("id"),
            name: row.get("name"),
            phone: row.get("phone"),
        }
    }

    // ========================
    // Loan operations
    // ========================

    /// Run the borrow check-then-act sequence in a single transaction.
    ///
    /// The transaction takes SQLite's write lock up front, so a concurrent
    /// borrower waits for this one to commit and then sees its loan. The
    /// reader check comes before the book check. The UNIQUE columns on
    /// `loans` still reject a duplicate insert, and that error is returned as-is.
    pub async fn create_loan(&self, mut loan: Loan) -> Result<BorrowOutcome> {
        let mut tx = self
            .pool
            .begin_with(BEGIN_WRITE)
            .await
            .context("Failed to begin borrow transaction")?;

        let reader_exists = sqlx::query("SELECT 1 FROM readers WHERE id = ?")
            .bind(loan.reader_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to fetch reader")?
            .is_some();
        if !reader_exists {
            return Ok(BorrowOutcome::ReaderMissing);
        }

        let book_status = sqlx::query("SELECT status FROM books WHERE id = ?")
            .bind(loan.book_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to fetch book")?;
        let Some(book_status) = book_status else {
            return Ok(BorrowOutcome::BookMissing);
        };

        let reader_loan = sqlx::query(
            "SELECT id, book_id, reader_id, start_date, due_date FROM loans WHERE reader_id = ?",
        )
        .bind(loan.reader_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to fetch reader loan")?;
        if let Some(row) = reader_loan {
            return Ok(BorrowOutcome::ReaderHasLoan(Self::row_to_loan(&row)?));
        }

        let status_str: String = book_status.get("status");
        if BookStatus::from_str(&status_str) == Some(BookStatus::Loaned) {
            let due_date = sqlx::query("SELECT due_date FROM loans WHERE book_id = ?")
                .bind(loan.book_id)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to fetch book loan")?
                .map(|row| parse_timestamp(&row.get::<String, _>("due_date")))
                .transpose()?;
            return Ok(BorrowOutcome::BookOnLoan { due_date });
        }

        let row = sqlx::query(
            r#"
            INSERT INTO loans (book_id, reader_id, start_date, due_date)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(loan.book_id)
        .bind(loan.reader_id)
        .bind(loan.start_date.to_rfc3339())
        .bind(loan.due_date.to_rfc3339())
        .fetch_one(&mut *tx)
        .await
        .context("Failed to save loan")?;
        loan.id = row.get("id");

        sqlx::query("UPDATE books SET status = ? WHERE id = ?")
            .bind(BookStatus::Loaned.as_str())
            .bind(loan.book_id)
            .execute(&mut *tx)
            .await
            .context("Failed to mark book as loaned")?;

        tx.commit()
            .await
            .context("Failed to commit borrow transaction")?;

        Ok(BorrowOutcome::Created(loan))
    }

    /// Delete the loan for a book and mark the book available, in one transaction.
    /// Returns the removed loan, or `None` if the book had no loan.
    pub async fn close_loan(&self, book_id: BookId) -> Result<Option<Loan>> {
        let mut tx = self
            .pool
            .begin_with(BEGIN_WRITE)
            .await
            .context("Failed to begin return transaction")?;

        let row = sqlx::query(
            r#"
            DELETE FROM loans
            WHERE book_id = ?
            RETURNING id, book_id, reader_id, start_date, due_date
            "#,
        )
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to delete loan")?;

        sqlx::query("UPDATE books SET status = ? WHERE id = ?")
            .bind(BookStatus::Available.as_str())
            .bind(book_id)
            .execute(&mut *tx)
            .await
            .context("Failed to mark book as available")?;

        tx.commit()
            .await
            .context("Failed to commit return transaction")?;

        row.as_ref().map(Self::row_to_loan).transpose()
    }

    /// Get the active loan for a book.
    pub async fn get_loan_for_book(&self, book_id: BookId) -> Result<Option<Loan>> {
        let row = sqlx::query(
            "SELECT id, book_id, reader_id, start_date, due_date FROM loans WHERE book_id = ?",
        )
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch loan for book")?;

        row.as_ref().map(Self::row_to_loan).transpose()
    }

    /// Get the active loan held by a reader.
    pub async fn get_loan_for_reader(&self, reader_id: ReaderId) -> Result<Option<Loan>> {
        let row = sqlx::query(
            "SELECT id, book_id, reader_id, start_date, due_date FROM loans WHERE reader_id = ?",
        )
        .bind(reader_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch loan for reader")?;

        row.as_ref().map(Self::row_to_loan).transpose()
    }

    /// List all active loans. Ordered by ID, which is also creation order.
    pub async fn list_loans(&self) -> Result<Vec<Loan>> {
        let rows = sqlx::query(
            "SELECT id, book_id, reader_id, start_date, due_date FROM loans ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list loans")?;

        rows.iter().map(Self::row_to_loan).collect()
    }

    fn row_to_loan(row: &SqliteRow) -> Result<Loan> {
        let start_date_str: String = row.get("start_date");
        let due_date_str: String = row.get("due_date");

        Ok(Loan {
            id: row.get("id"),
            book_id: row.get("book_id"),
            reader_id: row.get("reader_id"),
            start_date: parse_timestamp(&start_date_str).context("Invalid start_date")?,
            due_date: parse_timestamp(&due_date_str).context("Invalid due_date")?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp: {}", s))?
        .with_timezone(&Utc))
}

/// True if the error came from a UNIQUE constraint.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// True if the error came from a FOREIGN KEY constraint.
pub fn is_foreign_key_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => db_err.is_foreign_key_violation(),
        _ => false,
    }
}
