//! Paycoin Core
//!
//! Block and transaction codec for Paycoin and other Peercoin-family coins.
//! Payloads are decoded into trees of lazily parsed nodes that keep slices
//! of the bytes they came from, so unmodified parts re-serialize by copy and
//! edits only re-encode the path from the edited node to the root.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![forbid(unsafe_code)]

/// Wallet ownership queries.
pub mod bag;

/// Hashes and merkle roots.
pub mod crypto;

/// Common error types.
pub mod error;

/// The message contract and parse configuration.
pub mod message;

/// Standard script templates.
pub mod script;

/// Binary reader and varint helpers.
pub mod serialization;

/// Block and transaction types.
pub mod types;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::bag::TransactionBag;
    pub use crate::crypto::{double_sha256, Sha256Hash};
    pub use crate::error::{CodecError, Result};
    pub use crate::message::{Message, ParseConfig};
    pub use crate::serialization::ByteReader;
    pub use crate::types::*;
}

/// Re-export the prelude for convenient access to common types.
pub use prelude::*;
