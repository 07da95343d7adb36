// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use library_ledger::application::LedgerService;
use library_ledger::domain::{Book, Reader};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Test fixture: a couple of books and readers
pub struct Shelf {
    pub dune: Book,
    pub emma: Book,
    pub ana: Reader,
    pub bruno: Reader,
}

impl Shelf {
    pub async fn create(service: &LedgerService) -> Result<Self> {
        let dune = service
            .create_book("Dune".into(), "Herbert".into())
            .await?;
        let emma = service
            .create_book("Emma".into(), "Austen".into())
            .await?;
        let ana = service
            .create_reader("Ana".into(), Some("555-0001".into()))
            .await?;
        let bruno = service.create_reader("Bruno".into(), None).await?;
        Ok(Self {
            dune,
            emma,
            ana,
            bruno,
        })
    }
}
