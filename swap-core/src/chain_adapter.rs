//! ChainAdapter (`SwapContract`): the abstract SC-chain capability the
//! engine drives — escrow creation, authorization signing, transaction
//! submission, and the `Initialize`/`Claim`/`Refund` event stream (§2, 10%).

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::CoreError;
use crate::types::{PaymentHash, SwapData};

/// An event observed from the SC chain, applied to a swap's state machine
/// in total block order (§5 ordering guarantees).
#[derive(Clone, Debug)]
pub enum ChainEvent {
    Initialize {
        payment_hash: PaymentHash,
        swap_data: SwapData,
        tx_id: String,
        block_height: u64,
    },
    Claim {
        payment_hash: PaymentHash,
        /// The preimage revealed on-chain, when the escrow is a
        /// hash-locked HTLC (FromBtcLn relies on this, §4.3).
        secret: Option<[u8; 32]>,
        tx_id: String,
        block_height: u64,
    },
    Refund {
        payment_hash: PaymentHash,
        tx_id: String,
        block_height: u64,
    },
}

impl ChainEvent {
    pub fn payment_hash(&self) -> PaymentHash {
        match self {
            ChainEvent::Initialize { payment_hash, .. } => *payment_hash,
            ChainEvent::Claim { payment_hash, .. } => *payment_hash,
            ChainEvent::Refund { payment_hash, .. } => *payment_hash,
        }
    }

    pub fn block_height(&self) -> u64 {
        match self {
            ChainEvent::Initialize { block_height, .. } => *block_height,
            ChainEvent::Claim { block_height, .. } => *block_height,
            ChainEvent::Refund { block_height, .. } => *block_height,
        }
    }
}

/// A SPV proof of Bitcoin transaction inclusion, submitted to the SC
/// chain's light-client relay when claiming a FromBtc swap (§4.2).
#[derive(Clone, Debug)]
pub struct SpvProof {
    pub block_height: u64,
    pub merkle_proof: Vec<[u8; 32]>,
    pub vout: u32,
    pub raw_tx: Vec<u8>,
}

/// The abstract SC-chain capability the engine depends on. Concrete
/// implementations live outside this crate (§1).
#[async_trait]
pub trait SwapContract: Send + Sync {
    /// Build the escrow payload for a new swap, without submitting it.
    async fn create_swap_data(
        &self,
        payment_hash: PaymentHash,
        offerer: &str,
        claimer: &str,
        token: &str,
        amount: u128,
        expiry: u64,
    ) -> Result<SwapData, CoreError>;

    /// Produce the LP's signed authorization for a user to submit an
    /// `Initialize` transaction committing `swap_data` (§4.1 signed
    /// auth). Returns an opaque signature the client attaches on-chain.
    async fn sign_init_authorization(&self, swap_data: &SwapData) -> Result<String, CoreError>;

    /// Produce a cooperative refund authorization letting the user
    /// refund before the time-lock expires (§4.5 cooperative refund).
    async fn sign_refund_authorization(
        &self,
        payment_hash: PaymentHash,
    ) -> Result<String, CoreError>;

    /// Whether a commit transaction submitted by the client has been
    /// confirmed on-chain.
    async fn commit_status(&self, tx_id: &str) -> Result<bool, CoreError>;

    /// Claim the escrow on behalf of the LP, presenting an SPV proof for
    /// FromBtc swaps or a preimage for HTLC-hashed swaps.
    async fn claim(
        &self,
        payment_hash: PaymentHash,
        proof: Option<SpvProof>,
        secret: Option<[u8; 32]>,
    ) -> Result<String, CoreError>;

    /// Refund the escrow back to the depositor after expiry.
    async fn refund(&self, payment_hash: PaymentHash) -> Result<String, CoreError>;

    /// Fast-forward the on-chain Bitcoin header relay (BtcRelaySynchronizer,
    /// §4.2) so a subsequent `claim` with an SPV proof will validate.
    async fn synchronize_btc_relay(&self) -> Result<(), CoreError>;

    /// Subscribe to the `Initialize`/`Claim`/`Refund` event stream. The
    /// returned receiver delivers events in total block order per chain.
    async fn subscribe_events(&self) -> Result<mpsc::Receiver<ChainEvent>, CoreError>;
}
