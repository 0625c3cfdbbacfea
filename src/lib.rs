pub mod aggregate;
pub mod error;
pub mod export;
pub mod filter;
pub mod loader;
pub mod session;
pub mod transaction;
pub mod workbook;

pub use error::Error;
pub use filter::FilterCriteria;
pub use session::{ReportOptions, Session};
pub use transaction::Transaction;
