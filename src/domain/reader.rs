use serde::{Deserialize, Serialize};

pub type ReaderId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reader {
    pub id: ReaderId,
    /// Unique across all readers
    pub name: String,
    pub phone: Option<String>,
}

impl Reader {
    /// Apply a partial update. Absent fields keep their current value.
    pub fn apply(&mut self, update: ReaderUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(phone) = update.phone {
            self.phone = phone;
        }
    }
}

/// Fields to change on a reader.
///
/// `phone` is tri-state: `None` leaves it untouched, `Some(None)` clears it
/// and `Some(Some(_))` replaces it.
#[derive(Debug, Clone, Default)]
pub struct ReaderUpdate {
    pub name: Option<String>,
    pub phone: Option<Option<String>>,
}

impl ReaderUpdate {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(Some(phone.into()));
        self
    }

    pub fn clear_phone(mut self) -> Self {
        self.phone = Some(None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none()
    }
}
