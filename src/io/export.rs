use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{Book, Loan, Reader};

/// Full ledger snapshot for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub books: Vec<Book>,
    pub readers: Vec<Reader>,
    pub loans: Vec<Loan>,
}

/// Exporter for writing ledger data as CSV or JSON
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export books to CSV format
    pub async fn export_books_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let books = self.service.list_books().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "title", "author", "status"])?;
        for book in &books {
            let id = book.id.to_string();
            csv_writer.write_record([
                id.as_str(),
                book.title.as_str(),
                book.author.as_str(),
                book.status.as_str(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(books.len())
    }

    /// Export readers to CSV format
    pub async fn export_readers_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let readers = self.service.list_readers().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "name", "phone"])?;
        for reader in &readers {
            let id = reader.id.to_string();
            csv_writer.write_record([
                id.as_str(),
                reader.name.as_str(),
                reader.phone.as_deref().unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(readers.len())
    }

    /// Export active loans to CSV format, with due dates as DD/MM/YYYY
    pub async fn export_loans_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let infos = self.service.list_loan_info(None).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "book_id",
            "title",
            "reader_id",
            "reader",
            "start_date",
            "due_date",
        ])?;

        for info in &infos {
            csv_writer.write_record([
                info.loan.id.to_string(),
                info.loan.book_id.to_string(),
                info.book.title.clone(),
                info.loan.reader_id.to_string(),
                info.reader.name.clone(),
                info.loan.start_date.to_rfc3339(),
                crate::domain::format_due_date(info.loan.due_date),
            ])?;
        }

        csv_writer.flush()?;
        Ok(infos.len())
    }

    /// Export the whole ledger as a JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            books: self.service.list_books().await?,
            readers: self.service.list_readers().await?,
            loans: self.service.list_loans(None).await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
