//! Weighted consistent-hash server selection for memcache-style cache clients.
//!
//! Builds a ketama-style continuum of SHA-1 derived points from a weighted
//! server list and routes keys to servers by CRC32 lookup: the same key always
//! lands on the same server while the server set and liveness state are
//! unchanged, and adding or removing a server remaps only a proportional slice
//! of the keyspace. Optional liveness probing skips dead servers, and failover
//! rehashing spreads a dead server's load across the rest of the ring instead
//! of piling it onto a neighbor.
//!
//! ```
//! use memring::{Options, Selector};
//!
//! # fn main() -> Result<(), memring::SelectorError> {
//! let selector = Selector::new(
//!     &["127.0.0.1:11210", "127.0.0.1:11211", "127.0.0.1:11212"],
//!     Options::default(),
//! )?;
//! let addr = selector.pick_server("api:foo")?;
//! assert_eq!(addr.to_string(), "127.0.0.1:11211");
//! # Ok(()) }
//! ```

mod addr;
mod errors;
mod probe;
mod ring;
mod selector;

pub use addr::ServerAddr;
pub use errors::SelectorError;
pub use probe::{Liveness, NetProbe};
pub use selector::{Options, Selector};
