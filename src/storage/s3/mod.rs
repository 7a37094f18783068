//! S3-compatible object storage backend.

pub mod client;
pub mod provider;
pub mod signer;

pub use client::S3Client;
pub use provider::S3Store;
