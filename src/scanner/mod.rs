//! Byte-signature detection over downloaded content.

pub mod signature;
