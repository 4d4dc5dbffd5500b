//! In-memory warehouse backend for dry runs and tests

pub mod store;

pub use store::MemoryStore;
