//! Shared data model: swap identity, direction, and the common envelope
//! every swap record carries regardless of direction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A 32-byte payment hash, the primary key for a swap.
///
/// Serialized as a lowercase hex string so on-disk and REST representations
/// match the wire format described in the spec.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentHash(#[serde(with = "hex_bytes32")] pub [u8; 32]);

impl PaymentHash {
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PaymentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PaymentHash({})", self.to_hex())
    }
}

impl fmt::Display for PaymentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

mod hex_bytes32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

/// Monetary amounts in base units (satoshis, or the smallest SC-chain token
/// unit). `u128` is treated as effectively unbounded for any realistic
/// token supply or Bitcoin amount, matching the spec's "unbounded integers"
/// requirement without pulling in an arbitrary-precision dependency nobody
/// else in the stack needs.
pub type Amount = u128;

/// The four user-facing swap directions, plus the trusted custodial variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    FromBtc,
    FromBtcLn,
    ToBtc,
    ToBtcLn,
    TrustedFromBtcLn,
}

impl Direction {
    /// Whether the LP is the claimer of the SC-chain escrow (I3).
    pub fn lp_is_claimer(self) -> bool {
        matches!(
            self,
            Direction::FromBtc | Direction::FromBtcLn | Direction::TrustedFromBtcLn
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::FromBtc => "from-btc-onchain",
            Direction::FromBtcLn => "from-btc-lightning",
            Direction::ToBtc => "to-btc-onchain",
            Direction::ToBtcLn => "to-btc-lightning",
            Direction::TrustedFromBtcLn => "trusted-from-btc-lightning",
        }
    }
}

/// Opaque payload describing the escrow as the SC chain understands it.
/// `ChainAdapter` implementations interpret the fields relevant to their
/// chain; the engine itself only inspects amounts, the hash, and expiry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwapData {
    pub offerer: String,
    pub claimer: String,
    pub token: String,
    pub amount: Amount,
    pub hash: [u8; 32],
    pub expiry: u64,
    pub confirmations: u32,
    pub sequence: u64,
    pub security_deposit: Amount,
    pub claimer_bounty: Amount,
    pub swap_type: SwapDataType,
    /// True when the offerer pays the escrow in (ToBtc*): the user funds
    /// the SC-chain side directly rather than the LP (I3).
    pub pay_in: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapDataType {
    Htlc,
    Chain,
    ChainNonced,
    ChainTxhash,
}

/// Snapshot of the price and fee parameters used to build a quote, frozen
/// into the swap record so later re-pricing cannot change an issued quote.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PriceInfo {
    pub base_fee_sats: Amount,
    pub fee_ppm: u64,
    pub swap_price_micro_sat_per_token: u64,
}

/// The LP's signed authorization handed back to the client alongside a
/// quote, tying the off-chain quote to an on-chain commit window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedQuote {
    pub prefix: String,
    pub timeout: u64,
    pub signature: String,
    pub fee_rate: Option<u64>,
}

/// The set of transaction ids accumulated over a swap's lifetime.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TxIds {
    pub init: Option<String>,
    pub commit: Option<String>,
    pub claim: Option<String>,
    pub refund: Option<String>,
    pub burn: Option<String>,
}

/// Timing marks used for diagnostics and for grace-period eviction (§10).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub marks: HashMap<String, u64>,
}

impl Metadata {
    pub fn mark(&mut self, name: &str, unix_secs: u64) {
        self.marks.insert(name.to_string(), unix_secs);
    }
}

/// Why a swap ended up refunded or burned — a supplement to the distilled
/// spec (§10), grounded on the teacher's `atomic_swap::monitor::RefundReason`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    Timeout,
    CounterpartyFailure,
    NetworkError,
    DoubleSpend,
    Overpaid,
}

/// Fields common to every swap record, regardless of direction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwapBase {
    pub payment_hash: PaymentHash,
    pub direction: Direction,
    pub chain_id: String,
    pub swap_data: SwapData,
    pub swap_fee: Amount,
    pub swap_fee_btc: Amount,
    pub network_fee: Option<Amount>,
    pub price_info: PriceInfo,
    pub signed_quote: SignedQuote,
    pub tx_ids: TxIds,
    pub metadata: Metadata,
    pub created_at: u64,
    pub expires_at: u64,
}
