use std::io;

use thiserror::Error;

/// Errors surfaced by selector construction and key lookup.
#[derive(Debug, Error)]
pub enum SelectorError {
    /// The ring is empty, or every lookup attempt landed on a dead server.
    #[error("no servers configured or available")]
    NoServers,

    /// A server label could not be resolved into a usable address. Fatal to
    /// the whole build; partial rings are never returned.
    #[error("invalid server address '{label}': {source}")]
    Resolve { label: String, source: io::Error },
}
