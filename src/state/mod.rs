pub mod pair_cache;
pub mod result_store;

pub use pair_cache::MemoryPairCache;
pub use result_store::ResultStore;
