mod book;
mod integrity;
mod loan;
mod reader;

pub use book::*;
pub use integrity::*;
pub use loan::*;
pub use reader::*;
