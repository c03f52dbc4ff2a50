//! aeroverify - A strict, hash-verified block storage layer
//!
//! Each verification block of a data storage is paired with a salted SHA-256
//! hash in a hash storage. Reads never return bytes that fail verification.

pub mod integrity;
pub mod observability;
