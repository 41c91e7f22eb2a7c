//! Reference collaborator adapters.
//!
//! `swap-core` treats the Bitcoin node, Lightning node, SC-chain RPC, and
//! price-exchange clients as abstract interfaces out of scope for this
//! deliverable (§1). The implementations in this module are **not** those
//! production RPC clients: they are local, in-memory stand-ins that let
//! `swap-node` boot and exercise its REST surface and watchdogs end to end
//! without a live Bitcoin/Lightning/SC-chain deployment. A real deployment
//! swaps these `Arc<dyn Trait>` instances for bitcoind/LND/chain-RPC-backed
//! ones; nothing else in `swap-node` changes.

pub mod bitcoin;
pub mod chain;
pub mod lightning;
pub mod pricing;

pub use bitcoin::LocalBitcoinWatcher;
pub use chain::LocalSwapContract;
pub use lightning::LocalLightningAdapter;
pub use pricing::FixedPriceProvider;
