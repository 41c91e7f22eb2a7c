//! Reference `SwapStorage` implementations (§6, §10). Any key/value store
//! satisfies the trait per `swap-core`'s out-of-scope note; these two are
//! the ones this node ships: an in-memory map for tests and a file-per-key
//! JSON store for a single-process production deployment.

pub mod file;
pub mod memory;

pub use file::FileSwapStorage;
pub use memory::MemorySwapStorage;
