//! Registry boundary: filter model, attachment records, the client
//! trait, and a manifest-backed implementation.

pub mod client;
pub mod filter;
pub mod record;
pub mod snapshot;
