//! Block and transaction types.
//!
//! Each type decodes from a shared payload buffer, materializes its fields
//! on demand under lazy parsing, and re-serializes unmodified parts by
//! copying the bytes it was decoded from.

pub mod block;
pub mod input;
pub mod outpoint;
pub mod output;
pub mod transaction;

pub use block::{Block, BlockHeader, HEADER_SIZE};
pub use input::{TransactionInput, NO_SEQUENCE};
pub use outpoint::OutPoint;
pub use output::TransactionOutput;
pub use transaction::{Transaction, CURRENT_VERSION};
