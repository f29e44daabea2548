//! Local cache of downloaded attachment content.

pub mod store;
