use serde::{Deserialize, Serialize};

pub type BookId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    /// On the shelf, can be borrowed
    Available,
    /// Referenced by an active loan
    Loaned,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Loaned => "loaned",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "available" => Some(BookStatus::Available),
            "loaned" => Some(BookStatus::Loaned),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single physical copy. Two copies of the same title are two books.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub status: BookStatus,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.status == BookStatus::Available
    }

    /// Apply a partial update. Absent fields keep their current value.
    pub fn apply(&mut self, update: BookUpdate) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(author) = update.author {
            self.author = author;
        }
    }
}

/// Fields to change on a book. `None` means "leave as is".
#[derive(Debug, Clone, Default)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
}

impl BookUpdate {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dune() -> Book {
        Book {
            id: 1,
            title: "Dune".into(),
            author: "Herbert".into(),
            status: BookStatus::Available,
        }
    }

    #[test]
    fn test_status_parses_case_insensitively() {
        assert_eq!(BookStatus::from_str("LOANED"), Some(BookStatus::Loaned));
        assert_eq!(BookStatus::from_str("available"), Some(BookStatus::Available));
        assert_eq!(BookStatus::from_str("lost"), None);
    }

    #[test]
    fn test_apply_only_overwrites_supplied_fields() {
        let mut book = dune();
        book.apply(BookUpdate::default().with_author("Frank Herbert"));

        assert_eq!(book.title, "Dune");
        assert_eq!(book.author, "Frank Herbert");
    }

    #[test]
    fn test_apply_accepts_empty_string() {
        // Present-but-empty is a value, not an absence
        let mut book = dune();
        book.apply(BookUpdate::default().with_title(""));
        assert_eq!(book.title, "");
        assert_eq!(book.author, "Herbert");
    }

    #[test]
    fn test_empty_update() {
        assert!(BookUpdate::default().is_empty());
        assert!(!BookUpdate::default().with_title("x").is_empty());
    }
}
