use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::application::LedgerService;
use crate::domain::{Book, BookUpdate, Reader, ReaderUpdate, format_due_date};

/// Library Ledger - books, readers and loans
#[derive(Parser)]
#[command(name = "library-ledger")]
#[command(about = "Track books, readers and loans in a small lending library")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "LIBRARY_LEDGER_DB", default_value = "library.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Book management commands
    #[command(subcommand)]
    Book(BookCommands),

    /// Reader management commands
    #[command(subcommand)]
    Reader(ReaderCommands),

    /// Lend a book to a reader for seven days
    Borrow {
        /// Book ID
        book_id: i64,

        /// Reader ID
        reader_id: i64,
    },

    /// Take a book back
    Return {
        /// Book ID
        book_id: i64,
    },

    /// List active loans
    Loans {
        /// Only show loans past their due date
        #[arg(long)]
        overdue: bool,
    },

    /// Verify that book statuses match active loans
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: books, readers, loans, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum BookCommands {
    /// Add a new book
    Add {
        title: String,
        author: String,
    },

    /// Show one book, or all books when no ID is given
    Get {
        /// Book ID
        id: Option<i64>,
    },

    /// Change a book's title and/or author
    Update {
        /// Book ID
        id: i64,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        author: Option<String>,
    },

    /// Delete a book that is not on loan
    Delete {
        /// Book ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum ReaderCommands {
    /// Register a new reader
    Add {
        /// Reader name (must be unique)
        name: String,

        /// Phone number
        #[arg(short, long)]
        phone: Option<String>,
    },

    /// Show one reader, or all readers when no ID is given
    Get {
        /// Reader ID
        id: Option<i64>,
    },

    /// Change a reader's name and/or phone
    Update {
        /// Reader ID
        id: i64,

        /// New name (must be unique)
        #[arg(long)]
        name: Option<String>,

        /// New phone number
        #[arg(long, conflicts_with = "clear_phone")]
        phone: Option<String>,

        /// Remove the phone number
        #[arg(long)]
        clear_phone: bool,
    },

    /// Delete a reader without an active loan
    Delete {
        /// Reader ID
        id: i64,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                LedgerService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Book(book_cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_book_command(&service, book_cmd).await?;
            }

            Commands::Reader(reader_cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_reader_command(&service, reader_cmd).await?;
            }

            Commands::Borrow { book_id, reader_id } => {
                let service = LedgerService::connect(&self.database).await?;
                let loan = service.borrow(book_id, reader_id).await?;
                println!(
                    "Book {} lent to reader {}, due on {}",
                    loan.book_id,
                    loan.reader_id,
                    format_due_date(loan.due_date)
                );
            }

            Commands::Return { book_id } => {
                let service = LedgerService::connect(&self.database).await?;
                match service.return_book(book_id).await? {
                    Some(loan) => println!(
                        "Book {} returned by reader {}",
                        loan.book_id, loan.reader_id
                    ),
                    None => println!("Book {} had no active loan", book_id),
                }
            }

            Commands::Loans { overdue } => {
                let service = LedgerService::connect(&self.database).await?;
                run_loans_command(&service, overdue).await?;
            }

            Commands::Check => {
                let service = LedgerService::connect(&self.database).await?;
                run_check_command(&service).await?;
            }

            Commands::Export {
                export_type,
                output,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                run_export_command(&service, &export_type, output.as_deref()).await?;
            }
        }

        Ok(())
    }
}

async fn run_book_command(service: &LedgerService, cmd: BookCommands) -> Result<()> {
    match cmd {
        BookCommands::Add { title, author } => {
            let book = service.create_book(title, author).await?;
            println!("Added book {}: {} by {}", book.id, book.title, book.author);
        }

        BookCommands::Get { id: Some(id) } => {
            let book = service.get_book(id).await?;
            print_books(&[book]);
            if let Some(loan) = service.get_loan_for_book(id).await? {
                println!();
                println!(
                    "On loan to reader {} since {}, due on {}",
                    loan.reader_id,
                    loan.start_date.format("%Y-%m-%d"),
                    format_due_date(loan.due_date)
                );
            }
        }

        BookCommands::Get { id: None } => {
            let books = service.list_books().await?;
            if books.is_empty() {
                println!("No books found.");
            } else {
                print_books(&books);
            }
        }

        BookCommands::Update { id, title, author } => {
            let book = service.update_book(id, BookUpdate { title, author }).await?;
            println!("Updated book {}: {} by {}", book.id, book.title, book.author);
        }

        BookCommands::Delete { id } => {
            service.delete_book(id).await?;
            println!("Deleted book {}", id);
        }
    }
    Ok(())
}

async fn run_reader_command(service: &LedgerService, cmd: ReaderCommands) -> Result<()> {
    match cmd {
        ReaderCommands::Add { name, phone } => {
            let reader = service.create_reader(name, phone).await?;
            println!("Registered reader {}: {}", reader.id, reader.name);
        }

        ReaderCommands::Get { id: Some(id) } => {
            let reader = service.get_reader(id).await?;
            print_readers(&[reader]);
        }

        ReaderCommands::Get { id: None } => {
            let readers = service.list_readers().await?;
            if readers.is_empty() {
                println!("No readers found.");
            } else {
                print_readers(&readers);
            }
        }

        ReaderCommands::Update {
            id,
            name,
            phone,
            clear_phone,
        } => {
            let update = ReaderUpdate {
                name,
                phone: if clear_phone { Some(None) } else { phone.map(Some) },
            };
            let reader = service.update_reader(id, update).await?;
            println!("Updated reader {}: {}", reader.id, reader.name);
        }

        ReaderCommands::Delete { id } => {
            service.delete_reader(id).await?;
            println!("Deleted reader {}", id);
        }
    }
    Ok(())
}

async fn run_loans_command(service: &LedgerService, overdue: bool) -> Result<()> {
    let now = Utc::now();
    let infos = service
        .list_loan_info(if overdue { Some(now) } else { None })
        .await?;

    if infos.is_empty() {
        println!(
            "{}",
            if overdue {
                "No overdue loans."
            } else {
                "No active loans."
            }
        );
        return Ok(());
    }

    println!(
        "{:<6} {:<30} {:<20} {:<12} {}",
        "BOOK", "TITLE", "READER", "DUE", ""
    );
    println!("{}", "-".repeat(76));
    for info in infos {
        println!(
            "{:<6} {:<30} {:<20} {:<12} {}",
            info.book.id,
            truncate(&info.book.title, 30),
            truncate(&info.reader.name, 20),
            format_due_date(info.loan.due_date),
            if info.loan.is_overdue(now) {
                "OVERDUE"
            } else {
                ""
            }
        );
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Books:   {}", report.book_count);
    println!("Readers: {}", report.reader_count);
    println!("Loans:   {}", report.loan_count);
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "books" => {
            let count = exporter.export_books_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} books", count);
            }
        }
        "readers" => {
            let count = exporter.export_readers_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} readers", count);
            }
        }
        "loans" => {
            let count = exporter.export_loans_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} loans", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full database: {} books, {} readers, {} loans",
                    snapshot.books.len(),
                    snapshot.readers.len(),
                    snapshot.loans.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: books, readers, loans, full",
                export_type
            );
        }
    }

    Ok(())
}

fn print_books(books: &[Book]) {
    println!("{:<6} {:<30} {:<24} {:<10}", "ID", "TITLE", "AUTHOR", "STATUS");
    println!("{}", "-".repeat(72));
    for book in books {
        println!(
            "{:<6} {:<30} {:<24} {:<10}",
            book.id,
            truncate(&book.title, 30),
            truncate(&book.author, 24),
            book.status.as_str()
        );
    }
}

fn print_readers(readers: &[Reader]) {
    println!("{:<6} {:<30} {:<16}", "ID", "NAME", "PHONE");
    println!("{}", "-".repeat(54));
    for reader in readers {
        println!(
            "{:<6} {:<30} {:<16}",
            reader.id,
            truncate(&reader.name, 30),
            reader.phone.as_deref().unwrap_or("-")
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
