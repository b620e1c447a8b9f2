//! Pair Resolver Adapters

pub mod memory;

pub use memory::InMemoryPairCache;
