//! Vector store port and backends for semantic retrieval.
//!
//! Provides the `VectorStore` capability trait, a flat (exact) vector index,
//! collections with atomic batch upserts, and in-memory / persistent stores.

pub mod collection;
pub mod distance;
pub mod error;
pub mod index;
pub mod meta;
pub mod store;

pub use collection::Collection;
pub use error::{Result, VectorDbError};
pub use index::{FlatIndex, VectorIndex};
pub use meta::CollectionMeta;
pub use store::{
    open_store, CollectionHandle, LocalVectorStore, MemoryVectorStore, QueryResponse, StoreHit,
    UpsertBatch, VectorStore,
};
