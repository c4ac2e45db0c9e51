//! Core domain types.
//!
//! Module hierarchy follows type dependency order:
//! - identity: TxId, BlockId, Address
//! - tags / protocol: tag multimap and fixed wire names
//! - record: InteractionRecord and its pieces
//! - sort_key: the ledger-derived total order
//! - state: the schema-less replay state document
//! - validity: per-record outcome map

pub mod error;
pub mod identity;
pub mod protocol;
pub mod record;
pub mod sort_key;
pub mod state;
pub mod tags;
pub mod validity;

pub use error::{CoreError, InvalidId};
pub use identity::{Address, BlockId, TxId};
pub use record::{BlockRef, InteractionRecord, Winston};
pub use sort_key::SortKey;
pub use state::ReplayState;
pub use tags::{Tag, TagError, Tags};
pub use validity::ValidityMap;
