//! SwapCore (§2, 46%): the four state engines plus the trusted custodial
//! variant, wired to a durable store, the chain/Bitcoin/Lightning
//! collaborators, the quote engine, and the three watchdogs (§5).
//!
//! This is the component every other module in the crate exists to serve:
//! `quote_*` builds and persists a new `Swap`; `handle_chain_event` and the
//! watchdog ticks drive it forward; the lock manager (§5) guarantees a
//! single swap is never mutated by two tasks at once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::bitcoin_watcher::{
    build_burn_package, find_matching_utxo, select_winning_utxo, to_btc_payout_hash,
    utxos_matching_script, BitcoinWatcher, DUST_LIMIT_SATS,
};
use crate::chain_adapter::{ChainEvent, SpvProof, SwapContract};
use crate::error::{CoreError, QuoteError, StateError};
use crate::lightning::{
    probe_clears_threshold, InvoiceStatus, LightningAdapter, PaymentOutcome, RoutingBounds,
};
use crate::lock::LockManager;
use crate::plugin::{PluginBus, SwapEvent as PluginSwapEvent};
use crate::pricing::{sats_to_token, CachedPricingOracle};
use crate::quote::{price_quote, AmountSpec, PricedQuote, QuoteParams, QuoteRequest};
use crate::storage::SwapStorage;
use crate::swap::{
    transition_from_btc, transition_from_btc_ln, transition_to_btc, transition_to_btc_ln,
    transition_trusted_from_btc_ln, FromBtcLnSwap, FromBtcSwap, Swap, ToBtcLnSwap, ToBtcSwap,
    TrustedFromBtcLnSwap,
};
use crate::state::{
    check_transition, FromBtcLnState, FromBtcState, SwapState, ToBtcLnState, ToBtcState,
    TrustedFromBtcLnState,
};
use crate::types::{
    Amount, Direction, Metadata, PaymentHash, PriceInfo, RefundReason, SignedQuote, SwapBase,
    SwapData, SwapDataType, TxIds,
};

/// Static configuration for one direction's quote bounds and fee schedule.
/// Normally sourced from `swap-node`'s `EngineConfig`.
#[derive(Clone, Debug)]
pub struct DirectionConfig {
    pub params: QuoteParams,
    pub token: String,
    pub token_decimals_factor: Amount,
    pub confirmations_required: u32,
    pub confirmation_target: u32,
    pub quote_ttl_secs: u64,
    pub min_ln_confidence: f64,
    pub routing_bounds: RoutingBounds,
}

/// Engine-wide tunables governing watchdog cadence and safety margins.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub process_past_swaps_interval: Duration,
    pub double_spend_watchdog_interval: Duration,
    pub lock_timeout: Duration,
    /// Safety margin (P6): the LP never broadcasts a ToBtc payment within
    /// this many seconds of SC expiry.
    pub to_btc_send_safety_margin_secs: u64,
    pub directions: HashMap<Direction, DirectionConfig>,
}

/// Ties every collaborator together behind `Arc`s so the engine can be
/// cloned cheaply into watchdog tasks. `chain_id` identifies which
/// SC-chain instance this engine quotes against, matching `SwapData`.
pub struct SwapCore {
    pub chain_id: String,
    pub config: EngineConfig,
    pub storage: Arc<dyn SwapStorage>,
    pub chain: Arc<dyn SwapContract>,
    pub btc: Arc<dyn BitcoinWatcher>,
    pub lightning: Arc<dyn LightningAdapter>,
    pub pricing: Arc<CachedPricingOracle>,
    pub locks: Arc<LockManager>,
    pub plugins: Arc<PluginBus>,
    pub lp_address: String,
}

impl SwapCore {
    pub fn new(
        chain_id: String,
        lp_address: String,
        config: EngineConfig,
        storage: Arc<dyn SwapStorage>,
        chain: Arc<dyn SwapContract>,
        btc: Arc<dyn BitcoinWatcher>,
        lightning: Arc<dyn LightningAdapter>,
        pricing: Arc<CachedPricingOracle>,
        plugins: Arc<PluginBus>,
    ) -> Self {
        Self {
            chain_id,
            locks: Arc::new(LockManager::with_timeout(config.lock_timeout)),
            config,
            storage,
            chain,
            btc,
            lightning,
            pricing,
            plugins,
            lp_address,
        }
    }

    fn direction_config(&self, direction: Direction) -> Result<&DirectionConfig, CoreError> {
        self.config
            .directions
            .get(&direction)
            .ok_or_else(|| CoreError::Quote(QuoteError::TokenUnsupported(direction.as_str().into())))
    }

    async fn priced(&self, req: &QuoteRequest, dc: &DirectionConfig) -> Result<PricedQuote, CoreError> {
        self.plugins
            .before_quote(req)
            .map_err(CoreError::Other)?;
        self.plugins.emit(PluginSwapEvent::QuoteRequested {
            request: req.clone(),
        });

        let swap_price = self.pricing.price(&self.chain_id, &dc.token).await?;
        price_quote(req, &dc.params, 0, dc.token_decimals_factor, swap_price).map_err(|(e, bounds)| {
            if let Some(bounds) = bounds {
                debug!(min = bounds.min, max = bounds.max, "quote rejected, adjusted bounds returned");
            }
            CoreError::Quote(e)
        })
    }

    fn base_envelope(
        &self,
        payment_hash: PaymentHash,
        direction: Direction,
        swap_data: SwapData,
        priced: &PricedQuote,
        dc: &DirectionConfig,
        swap_price: u64,
        now: u64,
        signature: String,
    ) -> SwapBase {
        SwapBase {
            payment_hash,
            direction,
            chain_id: self.chain_id.clone(),
            swap_data,
            swap_fee: sats_to_token(priced.swap_fee_sats, dc.token_decimals_factor, swap_price),
            swap_fee_btc: priced.swap_fee_sats,
            network_fee: if priced.network_fee_sats > 0 {
                Some(priced.network_fee_sats)
            } else {
                None
            },
            price_info: PriceInfo {
                base_fee_sats: dc.params.base_fee_sats,
                fee_ppm: dc.params.fee_ppm,
                swap_price_micro_sat_per_token: swap_price,
            },
            signed_quote: SignedQuote {
                prefix: "swap".into(),
                timeout: now + dc.quote_ttl_secs,
                signature,
                fee_rate: None,
            },
            tx_ids: TxIds::default(),
            metadata: Metadata::default(),
            created_at: now,
            expires_at: now + dc.quote_ttl_secs,
        }
    }

    /// `POST /from-btc-onchain/getAddress` (§6, §4.2). Builds a quote, an
    /// escrow payload with the LP as claimer (I3), and a fresh watched
    /// address, persisting the resulting `Swap` before returning.
    pub async fn quote_from_btc(
        &self,
        payment_hash: PaymentHash,
        user: &str,
        token: &str,
        spec: AmountSpec,
        amount: Amount,
        btc_address: String,
        script_pubkey: &[u8],
        refund_address: Option<String>,
        now: u64,
    ) -> Result<FromBtcSwap, CoreError> {
        let dc = self.direction_config(Direction::FromBtc)?.clone();
        let req = QuoteRequest {
            direction: Direction::FromBtc,
            token: token.to_string(),
            spec,
            amount,
        };
        let priced = self.priced(&req, &dc).await?;
        let swap_price = self.pricing.price(&self.chain_id, token).await?;

        let swap_data = self
            .chain
            .create_swap_data(
                payment_hash,
                user,
                &self.lp_address,
                token,
                priced.swap_fee_token.saturating_add(
                    sats_to_token(priced.gross_sats, dc.token_decimals_factor, swap_price),
                ),
                now + dc.quote_ttl_secs,
            )
            .await?;

        let txo_hash = crate::bitcoin_watcher::txo_hash(priced.gross_sats as u64, script_pubkey);

        self.btc.watch_address(&btc_address).await?;
        let signature = self.chain.sign_init_authorization(&swap_data).await?;

        let base = self.base_envelope(
            payment_hash,
            Direction::FromBtc,
            swap_data,
            &priced,
            &dc,
            swap_price,
            now,
            signature,
        );
        let swap = FromBtcSwap {
            base,
            state: FromBtcState::Created,
            btc_address,
            amount_sats: priced.gross_sats,
            txo_hash,
            script_pubkey: script_pubkey.to_vec(),
            confirmations_required: dc.confirmations_required,
            observed_tx_id: None,
            observed_vout: None,
            adjusted_input: None,
            adjusted_output: None,
            refund_address,
            refund_reason: None,
        };

        let record = Swap::FromBtc(swap.clone());
        self.storage.put(&record).await?;
        self.plugins.emit(PluginSwapEvent::QuoteIssued {
            payment_hash,
            direction: Direction::FromBtc,
        });
        Ok(swap)
    }

    /// `POST /from-btc-lightning/createInvoice` (§4.3). Creates a HODL
    /// invoice whose payment hash is the swap's own, never settling it
    /// until a matching SC `Claim` reveals the preimage (P5).
    pub async fn quote_from_btc_ln(
        &self,
        payment_hash: PaymentHash,
        user: &str,
        token: &str,
        spec: AmountSpec,
        amount: Amount,
        now: u64,
    ) -> Result<FromBtcLnSwap, CoreError> {
        let dc = self.direction_config(Direction::FromBtcLn)?.clone();
        let req = QuoteRequest {
            direction: Direction::FromBtcLn,
            token: token.to_string(),
            spec,
            amount,
        };
        let priced = self.priced(&req, &dc).await?;
        let swap_price = self.pricing.price(&self.chain_id, token).await?;

        let swap_data = self
            .chain
            .create_swap_data(
                payment_hash,
                user,
                &self.lp_address,
                token,
                sats_to_token(priced.gross_sats, dc.token_decimals_factor, swap_price),
                now + dc.quote_ttl_secs,
            )
            .await?;

        let bolt11 = self
            .lightning
            .create_hodl_invoice(
                payment_hash.0,
                priced.total_sats as u64 * 1000,
                dc.quote_ttl_secs as u32,
                "atomic swap deposit",
            )
            .await?;
        let signature = self.chain.sign_init_authorization(&swap_data).await?;

        let base = self.base_envelope(
            payment_hash,
            Direction::FromBtcLn,
            swap_data,
            &priced,
            &dc,
            swap_price,
            now,
            signature,
        );
        let swap = FromBtcLnSwap {
            base,
            state: FromBtcLnState::PrCreated,
            bolt11,
            payment_secret: None,
            lnurl_withdraw: None,
            lnurl_pay: None,
        };
        self.storage.put(&Swap::FromBtcLn(swap.clone())).await?;
        self.plugins.emit(PluginSwapEvent::QuoteIssued {
            payment_hash,
            direction: Direction::FromBtcLn,
        });
        Ok(swap)
    }

    /// `POST /to-btc-onchain/getAddress` (§4.4). `pay_in = true`: the user
    /// funds the SC-chain escrow directly (I3).
    pub async fn quote_to_btc(
        &self,
        payment_hash: PaymentHash,
        user: &str,
        token: &str,
        spec: AmountSpec,
        amount: Amount,
        destination_address: String,
        script_pubkey: &[u8],
        now: u64,
    ) -> Result<ToBtcSwap, CoreError> {
        let dc = self.direction_config(Direction::ToBtc)?.clone();
        let req = QuoteRequest {
            direction: Direction::ToBtc,
            token: token.to_string(),
            spec,
            amount,
        };
        let priced = self.priced(&req, &dc).await?;
        let swap_price = self.pricing.price(&self.chain_id, token).await?;
        let network_fee_sats = self
            .btc
            .recommended_fee_rate(dc.confirmation_target)
            .await
            .unwrap_or(1);

        let mut swap_data = self
            .chain
            .create_swap_data(
                payment_hash,
                user,
                &self.lp_address,
                token,
                sats_to_token(priced.total_sats, dc.token_decimals_factor, swap_price),
                now + dc.quote_ttl_secs,
            )
            .await?;
        swap_data.pay_in = true;
        let nonce: u64 = rand::random();
        swap_data.hash = to_btc_payout_hash(script_pubkey, priced.gross_sats as u64, nonce);
        let signature = self.chain.sign_init_authorization(&swap_data).await?;

        let base = self.base_envelope(
            payment_hash,
            Direction::ToBtc,
            swap_data,
            &priced,
            &dc,
            swap_price,
            now,
            signature,
        );
        let swap = ToBtcSwap {
            base,
            state: ToBtcState::Created,
            destination_address,
            amount_sats: priced.gross_sats,
            script_pubkey: script_pubkey.to_vec(),
            nonce,
            confirmation_target: dc.confirmation_target,
            sats_per_vbyte: network_fee_sats,
            observed_btc_tx_id: None,
            refund_authorization: None,
            refund_reason: None,
        };
        self.storage.put(&Swap::ToBtc(swap.clone())).await?;
        self.plugins.emit(PluginSwapEvent::QuoteIssued {
            payment_hash,
            direction: Direction::ToBtc,
        });
        Ok(swap)
    }

    /// `POST /to-btc-lightning/payInvoice` (§4.5). Probes the route before
    /// committing to a confidence figure, rejecting invoices that can't
    /// clear the configured confidence bar.
    pub async fn quote_to_btc_ln(
        &self,
        payment_hash: PaymentHash,
        user: &str,
        token: &str,
        bolt11: String,
        amount_msat: u64,
        now: u64,
    ) -> Result<ToBtcLnSwap, CoreError> {
        let dc = self.direction_config(Direction::ToBtcLn)?.clone();
        let probe = self.lightning.probe_route(&bolt11, amount_msat).await?;
        if !probe_clears_threshold(&probe, dc.min_ln_confidence) {
            return Err(CoreError::Quote(QuoteError::InsufficientLiquidity {
                direction: Direction::ToBtcLn,
                amount: (amount_msat / 1000) as u128,
            }));
        }

        let amount_sats = (amount_msat / 1000) as u128;
        let req = QuoteRequest {
            direction: Direction::ToBtcLn,
            token: token.to_string(),
            spec: AmountSpec::ExactOut,
            amount: amount_sats,
        };
        let priced = self.priced(&req, &dc).await?;
        let swap_price = self.pricing.price(&self.chain_id, token).await?;

        let mut swap_data = self
            .chain
            .create_swap_data(
                payment_hash,
                user,
                &self.lp_address,
                token,
                sats_to_token(priced.total_sats, dc.token_decimals_factor, swap_price),
                now + dc.quote_ttl_secs,
            )
            .await?;
        swap_data.pay_in = true;
        let signature = self.chain.sign_init_authorization(&swap_data).await?;

        let base = self.base_envelope(
            payment_hash,
            Direction::ToBtcLn,
            swap_data,
            &priced,
            &dc,
            swap_price,
            now,
            signature,
        );
        let swap = ToBtcLnSwap {
            base,
            state: ToBtcLnState::Created,
            bolt11,
            confidence: probe.confidence,
            routing_fee_sats_max: dc.routing_bounds.max_routing_base_fee_sats,
            preimage: None,
            refund_authorization: None,
            refund_reason: None,
        };
        self.storage.put(&Swap::ToBtcLn(swap.clone())).await?;
        self.plugins.emit(PluginSwapEvent::QuoteIssued {
            payment_hash,
            direction: Direction::ToBtcLn,
        });
        Ok(swap)
    }

    /// `POST /trusted-from-btc-lightning/createInvoice` (§4.6). No SC
    /// escrow: the LP credits the destination token account directly
    /// once the Lightning payment settles.
    pub async fn quote_trusted_from_btc_ln(
        &self,
        payment_hash: PaymentHash,
        token: &str,
        amount_sats: Amount,
        refund_address: Option<String>,
        now: u64,
    ) -> Result<TrustedFromBtcLnSwap, CoreError> {
        let dc = self.direction_config(Direction::TrustedFromBtcLn)?.clone();
        let swap_price = self.pricing.price(&self.chain_id, token).await?;
        let output_tokens = sats_to_token(amount_sats, dc.token_decimals_factor, swap_price);
        let fee_sats = self
            .btc
            .recommended_fee_rate(dc.confirmation_target)
            .await
            .unwrap_or(1);

        let bolt11 = self
            .lightning
            .create_hodl_invoice(
                payment_hash.0,
                amount_sats as u64 * 1000,
                dc.quote_ttl_secs as u32,
                "trusted gas top-up",
            )
            .await?;

        let swap_data = SwapData {
            offerer: self.lp_address.clone(),
            claimer: self.lp_address.clone(),
            token: token.to_string(),
            amount: output_tokens,
            hash: payment_hash.0,
            expiry: now + dc.quote_ttl_secs,
            confirmations: 0,
            sequence: 0,
            security_deposit: 0,
            claimer_bounty: 0,
            swap_type: SwapDataType::Htlc,
            pay_in: false,
        };

        let base = SwapBase {
            payment_hash,
            direction: Direction::TrustedFromBtcLn,
            chain_id: self.chain_id.clone(),
            swap_data,
            swap_fee: 0,
            swap_fee_btc: dc.params.base_fee_sats,
            network_fee: Some(fee_sats),
            price_info: PriceInfo {
                base_fee_sats: dc.params.base_fee_sats,
                fee_ppm: dc.params.fee_ppm,
                swap_price_micro_sat_per_token: swap_price,
            },
            signed_quote: SignedQuote {
                prefix: "swap".into(),
                timeout: now + dc.quote_ttl_secs,
                signature: String::new(),
                fee_rate: None,
            },
            tx_ids: TxIds::default(),
            metadata: Metadata::default(),
            created_at: now,
            expires_at: now + dc.quote_ttl_secs,
        };

        let swap = TrustedFromBtcLnSwap {
            base,
            state: TrustedFromBtcLnState::Created,
            input_sats: amount_sats,
            output_tokens,
            recommended_fee: fee_sats,
            refund_address,
            adjusted_input: None,
            adjusted_output: None,
            refund_reason: None,
            burn_tx: None,
        };
        self.storage
            .put(&Swap::TrustedFromBtcLn(swap.clone()))
            .await?;
        Ok(swap)
    }

    /// Dispatches an SC-chain event to the swap it names, under the
    /// per-hash lock (§5). Unknown hashes (events for another LP's swap,
    /// or a race with eviction) are logged and dropped.
    pub async fn handle_chain_event(&self, event: ChainEvent) -> Result<(), CoreError> {
        let hash = event.payment_hash();
        let _guard = self.locks.acquire(hash).await?;

        let mut swap = match self.storage.get(hash).await? {
            Some(s) => s,
            None => {
                warn!(payment_hash = %hash, "chain event for unknown swap");
                return Ok(());
            }
        };

        if swap.is_terminal() {
            debug!(payment_hash = %hash, "dropping chain event for terminal swap");
            return Ok(());
        }

        let direction = swap.direction();
        self.apply_chain_event(&mut swap, &event)?;
        self.storage.put(&swap).await?;
        self.plugins.emit(PluginSwapEvent::StateTransitioned {
            payment_hash: hash,
            direction,
            from: String::new(),
            to: swap.state_label(),
        });
        Ok(())
    }

    fn apply_chain_event(&self, swap: &mut Swap, event: &ChainEvent) -> Result<(), CoreError> {
        fn advance<S: SwapState>(
            direction: Direction,
            state: &mut S,
            to: S,
        ) -> Result<(), CoreError> {
            if !check_transition(*state, to) {
                return Err(CoreError::State(StateError::IllegalTransition {
                    direction,
                    from: format!("{state:?}"),
                    to: format!("{to:?}"),
                }));
            }
            *state = to;
            Ok(())
        }

        match (swap, event) {
            (Swap::FromBtc(s), ChainEvent::Initialize { .. }) => {
                advance(Direction::FromBtc, &mut s.state, FromBtcState::Commited)?;
            }
            (Swap::FromBtc(s), ChainEvent::Claim { .. }) => {
                advance(Direction::FromBtc, &mut s.state, FromBtcState::Claimed)?;
            }
            (Swap::FromBtc(s), ChainEvent::Refund { .. }) => {
                advance(Direction::FromBtc, &mut s.state, FromBtcState::Refundable)?;
                advance(Direction::FromBtc, &mut s.state, FromBtcState::Refunded)?;
            }
            (Swap::FromBtcLn(s), ChainEvent::Initialize { .. }) => {
                // PR_PAID is normally reached by the Lightning-invoice
                // watchdog polling Accepted, ahead of and independent of
                // this SC event; fall back to advancing it here too if
                // the SC commit raced ahead of that poll.
                if s.state == FromBtcLnState::PrCreated {
                    warn!(
                        payment_hash = %s.base.payment_hash,
                        "SC Initialize observed before Lightning HTLC acceptance"
                    );
                    advance(Direction::FromBtcLn, &mut s.state, FromBtcLnState::PrPaid)?;
                }
                advance(Direction::FromBtcLn, &mut s.state, FromBtcLnState::ClaimCommited)?;
            }
            (Swap::FromBtcLn(s), ChainEvent::Claim { secret, .. }) => {
                // P5: only the state moves here; the HODL invoice settles
                // in a follow-up call once the preimage is confirmed (see
                // settle_from_btc_ln_preimage below), never inline with
                // event application, so a storage failure after this
                // point can't leave the invoice settled without a durable
                // record of the claim.
                if secret.is_none() {
                    return Err(CoreError::Other(
                        "SC Claim for FromBtcLn missing preimage".into(),
                    ));
                }
                advance(Direction::FromBtcLn, &mut s.state, FromBtcLnState::ClaimClaimed)?;
            }
            (Swap::ToBtc(s), ChainEvent::Initialize { .. }) => {
                advance(Direction::ToBtc, &mut s.state, ToBtcState::Commited)?;
            }
            (Swap::ToBtc(s), ChainEvent::Claim { .. }) => {
                advance(Direction::ToBtc, &mut s.state, ToBtcState::Claimed)?;
            }
            (Swap::ToBtc(s), ChainEvent::Refund { .. }) => {
                advance(Direction::ToBtc, &mut s.state, ToBtcState::Refunded)?;
            }
            (Swap::ToBtcLn(s), ChainEvent::Initialize { .. }) => {
                advance(Direction::ToBtcLn, &mut s.state, ToBtcLnState::Commited)?;
            }
            (Swap::ToBtcLn(s), ChainEvent::Claim { .. }) => {
                advance(Direction::ToBtcLn, &mut s.state, ToBtcLnState::Claimed)?;
            }
            (Swap::ToBtcLn(s), ChainEvent::Refund { .. }) => {
                advance(Direction::ToBtcLn, &mut s.state, ToBtcLnState::Refunded)?;
            }
            (Swap::TrustedFromBtcLn(_), _) => {
                // TrustedFromBtcLn never touches the SC chain's escrow
                // event stream; its lifecycle is driven entirely by
                // Lightning settlement and the double-spend watchdog.
            }
            (swap, event) => {
                return Err(CoreError::State(StateError::IllegalTransition {
                    direction: swap.direction(),
                    from: swap.state_label(),
                    to: format!("{event:?}"),
                }))
            }
        }
        Ok(())
    }

    /// Settles the FromBtcLn HODL invoice once a `Claim` with a preimage
    /// has been durably recorded as applied (P5's ordering invariant:
    /// this must only ever be called after `handle_chain_event` has
    /// already transitioned the swap to `ClaimClaimed`).
    pub async fn settle_from_btc_ln_preimage(
        &self,
        hash: PaymentHash,
        preimage: [u8; 32],
    ) -> Result<(), CoreError> {
        let _guard = self.locks.acquire(hash).await?;
        let swap = self.storage.get(hash).await?.ok_or_else(|| {
            CoreError::State(StateError::NotFound(hash.to_hex()))
        })?;
        if let Swap::FromBtcLn(s) = &swap {
            if s.state != FromBtcLnState::ClaimClaimed {
                return Err(CoreError::State(StateError::IllegalTransition {
                    direction: Direction::FromBtcLn,
                    from: format!("{:?}", s.state),
                    to: "settle".into(),
                }));
            }
        }
        self.lightning.settle_hodl_invoice(hash.0, preimage).await?;
        Ok(())
    }

    /// Watchdog 1 (§5): re-drives every unfinished swap using the current
    /// view of chain and mempool state. Intended to run every 60s.
    pub async fn process_past_swaps(&self) {
        let swaps = match self.storage.list_unfinished().await {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to list unfinished swaps");
                return;
            }
        };
        info!(count = swaps.len(), "processPastSwaps tick");
        for swap in swaps {
            if let Err(e) = self.process_one_past_swap(swap).await {
                warn!(error = %e, "processPastSwaps: error advancing swap");
            }
        }
    }

    async fn process_one_past_swap(&self, swap: Swap) -> Result<(), CoreError> {
        let hash = swap.payment_hash();
        let now = unix_now();

        // Expiry check applies uniformly; direction-specific progress
        // (deposit observation, invoice probing) happens per-variant.
        if now >= swap.base().expires_at && matches!(swap, Swap::FromBtc(ref s) if s.state == FromBtcState::Created)
        {
            let _guard = self.locks.acquire(hash).await?;
            if let Some(Swap::FromBtc(mut s)) = self.storage.get(hash).await? {
                if s.state == FromBtcState::Created {
                    s.state = FromBtcState::Expired;
                    self.storage.put(&Swap::FromBtc(s)).await?;
                }
            }
            return Ok(());
        }

        match &swap {
            Swap::FromBtc(s) if s.state == FromBtcState::Commited => {
                self.advance_from_btc_deposit(hash, s).await?;
            }
            Swap::FromBtc(s) if s.state == FromBtcState::BtcConfirmed => {
                self.advance_from_btc_claim(hash, s).await?;
            }
            Swap::FromBtcLn(s) => self.advance_from_btc_ln(hash, s, now).await?,
            Swap::ToBtc(s) => self.advance_to_btc(hash, s, now).await?,
            Swap::ToBtcLn(s) => self.advance_to_btc_ln(hash, s, now).await?,
            Swap::TrustedFromBtcLn(s) => self.advance_trusted_from_btc_ln(hash, s).await?,
            _ => {}
        }

        Ok(())
    }

    /// §4.2: matches the confirmed deposit against the swap's expected
    /// `txo_hash` first; if that comes up empty, falls back to matching
    /// by `scriptPubKey` alone to detect an underpay (adjust and
    /// proceed) or a gross overpay (refund in full, scenario 3).
    async fn advance_from_btc_deposit(&self, hash: PaymentHash, s: &FromBtcSwap) -> Result<(), CoreError> {
        let utxos = self.btc.utxos_at(&s.btc_address).await?;
        let matching: Vec<_> = utxos
            .into_iter()
            .filter(|u| u.confirmations >= s.confirmations_required)
            .collect();

        if let Some(winner) = select_winning_utxo(&matching) {
            if find_matching_utxo(std::slice::from_ref(winner), &s.txo_hash)
                .map_err(CoreError::BitcoinWatcher)?
                .is_some()
            {
                return self
                    .commit_from_btc_deposit(hash, winner.tx_id.clone(), winner.vout, None, None)
                    .await;
            }
        }

        let same_script = utxos_matching_script(&matching, &s.script_pubkey);
        let winner = match select_winning_utxo(&same_script) {
            Some(w) => w.clone(),
            None => return Ok(()),
        };

        let dc = self.direction_config(Direction::FromBtc)?;
        let expected = s.amount_sats;
        let observed = winner.value_sats as Amount;
        if observed > expected.saturating_mul(2) || observed < dc.params.min_sats {
            return self.refund_from_btc_overpay(hash, dc, &winner).await;
        }

        let (adjusted_input, adjusted_output) = if observed == expected {
            (None, None)
        } else {
            let gross_output = s.base.swap_data.amount;
            let adjusted_output = gross_output.saturating_mul(observed) / expected.max(1);
            (Some(observed), Some(adjusted_output))
        };
        self.commit_from_btc_deposit(
            hash,
            winner.tx_id.clone(),
            winner.vout,
            adjusted_input,
            adjusted_output,
        )
        .await
    }

    async fn commit_from_btc_deposit(
        &self,
        hash: PaymentHash,
        tx_id: String,
        vout: u32,
        adjusted_input: Option<Amount>,
        adjusted_output: Option<Amount>,
    ) -> Result<(), CoreError> {
        let _guard = self.locks.acquire(hash).await?;
        if let Some(Swap::FromBtc(mut s)) = self.storage.get(hash).await? {
            if s.state == FromBtcState::Commited {
                s.state = FromBtcState::BtcConfirmed;
                s.observed_tx_id = Some(tx_id);
                s.observed_vout = Some(vout);
                s.adjusted_input = adjusted_input;
                s.adjusted_output = adjusted_output;
                self.storage.put(&Swap::FromBtc(s)).await?;
            }
        }
        Ok(())
    }

    /// §4.2 scenario 3: the deposit is too far outside the quoted amount
    /// to safely credit. Refunds it net of fee, respecting the dust
    /// limit, and moves the swap straight to `Refunded`.
    async fn refund_from_btc_overpay(
        &self,
        hash: PaymentHash,
        dc: &DirectionConfig,
        winner: &crate::bitcoin_watcher::ObservedUtxo,
    ) -> Result<(), CoreError> {
        let fee_rate = self
            .btc
            .recommended_fee_rate(dc.confirmation_target)
            .await
            .unwrap_or(1);
        let estimated_fee = fee_rate.saturating_mul(150);
        let net = winner.value_sats.saturating_sub(estimated_fee);

        let _guard = self.locks.acquire(hash).await?;
        let mut swap = match self.storage.get(hash).await? {
            Some(Swap::FromBtc(s)) if s.state == FromBtcState::Commited => s,
            _ => return Ok(()),
        };

        let mut refund_tx = None;
        if net >= DUST_LIMIT_SATS {
            if let Some(addr) = swap.refund_address.clone() {
                refund_tx = Some(self.btc.send_to_address(&addr, net, fee_rate).await?);
            }
        }
        swap.refund_reason = Some(RefundReason::Overpaid);
        let mut record = Swap::FromBtc(swap);
        transition_from_btc(&mut record, FromBtcState::Refundable)?;
        transition_from_btc(&mut record, FromBtcState::Refunded)?;
        record.base_mut().tx_ids.refund = refund_tx;
        self.storage.put(&record).await?;
        Ok(())
    }

    /// §4.2: once a deposit has enough confirmations, the LP submits the
    /// SPV proof to the SC chain to claim its escrowed token payout.
    async fn advance_from_btc_claim(&self, hash: PaymentHash, s: &FromBtcSwap) -> Result<(), CoreError> {
        self.chain.synchronize_btc_relay().await?;
        let proof = SpvProof {
            block_height: 0,
            merkle_proof: Vec::new(),
            vout: s.observed_vout.unwrap_or(0),
            raw_tx: Vec::new(),
        };
        let tx_id = self.chain.claim(hash, Some(proof), None).await?;

        let _guard = self.locks.acquire(hash).await?;
        if let Some(mut record) = self.storage.get(hash).await? {
            if matches!(&record, Swap::FromBtc(s) if s.state == FromBtcState::BtcConfirmed) {
                transition_from_btc(&mut record, FromBtcState::Claimed)?;
                record.base_mut().tx_ids.claim = Some(tx_id);
                self.storage.put(&record).await?;
            }
        }
        Ok(())
    }

    /// §4.3: drives `PrCreated -> PrPaid` on the Lightning HTLC being
    /// observed `Accepted`, independent of the SC commit; cancels the
    /// HODL invoice if the quote expires before that happens.
    async fn advance_from_btc_ln(&self, hash: PaymentHash, s: &FromBtcLnSwap, now: u64) -> Result<(), CoreError> {
        match s.state {
            FromBtcLnState::PrCreated => {
                if now >= s.base.expires_at {
                    self.lightning.cancel_hodl_invoice(hash.0).await?;
                    let _guard = self.locks.acquire(hash).await?;
                    if let Some(mut record) = self.storage.get(hash).await? {
                        if matches!(&record, Swap::FromBtcLn(s) if s.state == FromBtcLnState::PrCreated) {
                            transition_from_btc_ln(&mut record, FromBtcLnState::QuoteExpired)?;
                            self.storage.put(&record).await?;
                        }
                    }
                    return Ok(());
                }
                let status = self.lightning.invoice_status(hash.0).await?;
                if status == InvoiceStatus::Accepted {
                    let _guard = self.locks.acquire(hash).await?;
                    if let Some(mut record) = self.storage.get(hash).await? {
                        if matches!(&record, Swap::FromBtcLn(s) if s.state == FromBtcLnState::PrCreated) {
                            transition_from_btc_ln(&mut record, FromBtcLnState::PrPaid)?;
                            self.storage.put(&record).await?;
                        }
                    }
                }
            }
            FromBtcLnState::PrPaid => {
                if now >= s.base.expires_at {
                    self.lightning.cancel_hodl_invoice(hash.0).await?;
                    let _guard = self.locks.acquire(hash).await?;
                    if let Some(mut record) = self.storage.get(hash).await? {
                        if matches!(&record, Swap::FromBtcLn(s) if s.state == FromBtcLnState::PrPaid) {
                            transition_from_btc_ln(&mut record, FromBtcLnState::Failed)?;
                            self.storage.put(&record).await?;
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// §4.4: sends the Bitcoin payout once committed (P6: never within
    /// `to_btc_send_safety_margin_secs` of expiry), waits for it to
    /// confirm, then submits the SC claim.
    async fn advance_to_btc(&self, hash: PaymentHash, s: &ToBtcSwap, now: u64) -> Result<(), CoreError> {
        match s.state {
            ToBtcState::Commited => {
                if s.observed_btc_tx_id.is_some() {
                    return Ok(());
                }
                let too_late = s
                    .base
                    .expires_at
                    .saturating_sub(now)
                    <= self.config.to_btc_send_safety_margin_secs;
                if too_late {
                    self.refund_to_btc(hash).await?;
                    return Ok(());
                }

                let tx_id = self
                    .btc
                    .send_to_address(&s.destination_address, s.amount_sats as u64, s.sats_per_vbyte)
                    .await?;

                let _guard = self.locks.acquire(hash).await?;
                if let Some(mut record) = self.storage.get(hash).await? {
                    if matches!(&record, Swap::ToBtc(s) if s.state == ToBtcState::Commited) {
                        transition_to_btc(&mut record, ToBtcState::BtcSending)?;
                        if let Swap::ToBtc(s) = &mut record {
                            s.observed_btc_tx_id = Some(tx_id);
                        }
                        self.storage.put(&record).await?;
                    }
                }
            }
            ToBtcState::BtcSending => {
                let tx_id = match &s.observed_btc_tx_id {
                    Some(t) => t.clone(),
                    None => return Ok(()),
                };
                let confirmations = self.btc.tx_confirmations(&tx_id).await?;
                if confirmations < s.confirmation_target {
                    return Ok(());
                }
                let _guard = self.locks.acquire(hash).await?;
                if let Some(mut record) = self.storage.get(hash).await? {
                    if matches!(&record, Swap::ToBtc(s) if s.state == ToBtcState::BtcSending) {
                        transition_to_btc(&mut record, ToBtcState::BtcSent)?;
                        self.storage.put(&record).await?;
                    }
                }
            }
            ToBtcState::BtcSent => {
                let claim_tx = self.chain.claim(hash, None, None).await?;
                let _guard = self.locks.acquire(hash).await?;
                if let Some(mut record) = self.storage.get(hash).await? {
                    if matches!(&record, Swap::ToBtc(s) if s.state == ToBtcState::BtcSent) {
                        transition_to_btc(&mut record, ToBtcState::Claimed)?;
                        record.base_mut().tx_ids.claim = Some(claim_tx);
                        self.storage.put(&record).await?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn refund_to_btc(&self, hash: PaymentHash) -> Result<(), CoreError> {
        // Sign a cooperative authorization first so the user holds a way
        // to self-refund even if this LP-initiated refund never lands;
        // §4.5's cooperative refund path is an addition to, not a
        // replacement for, the LP's own on-chain refund.
        let authorization = self.chain.sign_refund_authorization(hash).await?;
        let tx_id = self.chain.refund(hash).await?;
        let _guard = self.locks.acquire(hash).await?;
        if let Some(mut record) = self.storage.get(hash).await? {
            if matches!(&record, Swap::ToBtc(s) if !s.state.is_terminal() && s.observed_btc_tx_id.is_none())
            {
                transition_to_btc(&mut record, ToBtcState::Refunded)?;
                record.base_mut().tx_ids.refund = Some(tx_id);
                if let Swap::ToBtc(s) = &mut record {
                    s.refund_reason = Some(RefundReason::Timeout);
                    s.refund_authorization = Some(authorization);
                }
                self.storage.put(&record).await?;
            }
        }
        Ok(())
    }

    /// §4.5: pays the BOLT11 invoice once committed, then claims on the
    /// SC chain with the revealed preimage; falls back to a cooperative
    /// refund on a permanent payment failure or a too-close-to-expiry
    /// safety margin breach.
    async fn advance_to_btc_ln(&self, hash: PaymentHash, s: &ToBtcLnSwap, now: u64) -> Result<(), CoreError> {
        if s.state != ToBtcLnState::Commited {
            return Ok(());
        }
        let too_late = s.base.expires_at.saturating_sub(now) <= self.config.to_btc_send_safety_margin_secs;
        if too_late {
            self.refund_to_btc_ln(hash, RefundReason::Timeout).await?;
            return Ok(());
        }

        let bounds = RoutingBounds {
            max_routing_base_fee_sats: s.routing_fee_sats_max,
            max_routing_ppm: 0,
        };
        match self.lightning.pay_invoice(&s.bolt11, bounds).await? {
            PaymentOutcome::Succeeded { preimage, .. } => {
                let _guard = self.locks.acquire(hash).await?;
                if let Some(mut record) = self.storage.get(hash).await? {
                    if matches!(&record, Swap::ToBtcLn(s) if s.state == ToBtcLnState::Commited) {
                        transition_to_btc_ln(&mut record, ToBtcLnState::Paid)?;
                        if let Swap::ToBtcLn(s) = &mut record {
                            s.preimage = Some(hex::encode(preimage));
                        }
                        self.storage.put(&record).await?;
                    }
                }
                drop(_guard);

                let claim_tx = self.chain.claim(hash, None, Some(preimage)).await?;
                let _guard = self.locks.acquire(hash).await?;
                if let Some(mut record) = self.storage.get(hash).await? {
                    if matches!(&record, Swap::ToBtcLn(s) if s.state == ToBtcLnState::Paid) {
                        transition_to_btc_ln(&mut record, ToBtcLnState::Claimed)?;
                        record.base_mut().tx_ids.claim = Some(claim_tx);
                        self.storage.put(&record).await?;
                    }
                }
            }
            PaymentOutcome::Failed { permanent: true, .. } => {
                self.refund_to_btc_ln(hash, RefundReason::CounterpartyFailure).await?;
            }
            PaymentOutcome::Failed { permanent: false, .. } | PaymentOutcome::Pending => {}
        }
        Ok(())
    }

    async fn refund_to_btc_ln(&self, hash: PaymentHash, reason: RefundReason) -> Result<(), CoreError> {
        let authorization = self.chain.sign_refund_authorization(hash).await?;
        let tx_id = self.chain.refund(hash).await?;
        let _guard = self.locks.acquire(hash).await?;
        if let Some(mut record) = self.storage.get(hash).await? {
            if matches!(&record, Swap::ToBtcLn(s) if !s.state.is_terminal()) {
                transition_to_btc_ln(&mut record, ToBtcLnState::Refunded)?;
                record.base_mut().tx_ids.refund = Some(tx_id);
                if let Swap::ToBtcLn(s) = &mut record {
                    s.refund_reason = Some(reason);
                    s.refund_authorization = Some(authorization);
                }
                self.storage.put(&record).await?;
            }
        }
        Ok(())
    }

    /// §4.6: this direction is custodial, not atomic — once the
    /// Lightning HTLC is accepted (`Received`), the LP settles its own
    /// invoice using the payment hash itself in place of a
    /// counterparty-revealed preimage (there is no SC escrow here for a
    /// preimage to come from), crediting the user's token balance
    /// out-of-band. A settlement failure falls back to a dust-limited
    /// Bitcoin refund.
    async fn advance_trusted_from_btc_ln(&self, hash: PaymentHash, s: &TrustedFromBtcLnSwap) -> Result<(), CoreError> {
        match s.state {
            TrustedFromBtcLnState::Created => {
                let status = self.lightning.invoice_status(hash.0).await?;
                if matches!(status, InvoiceStatus::Accepted | InvoiceStatus::Settled) {
                    let _guard = self.locks.acquire(hash).await?;
                    if let Some(mut record) = self.storage.get(hash).await? {
                        if matches!(&record, Swap::TrustedFromBtcLn(s) if s.state == TrustedFromBtcLnState::Created)
                        {
                            transition_trusted_from_btc_ln(&mut record, TrustedFromBtcLnState::Received)?;
                            record.base_mut().tx_ids.init = Some(hash.to_hex());
                            self.storage.put(&record).await?;
                        }
                    }
                }
            }
            TrustedFromBtcLnState::Received => {
                match self.lightning.settle_hodl_invoice(hash.0, hash.0).await {
                    Ok(()) => {
                        let _guard = self.locks.acquire(hash).await?;
                        if let Some(mut record) = self.storage.get(hash).await? {
                            if matches!(&record, Swap::TrustedFromBtcLn(s) if s.state == TrustedFromBtcLnState::Received)
                            {
                                transition_trusted_from_btc_ln(&mut record, TrustedFromBtcLnState::Sent)?;
                                self.storage.put(&record).await?;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(payment_hash = %hash, error = %e, "failed to settle trusted invoice, refunding");
                        self.refund_trusted_from_btc_ln(hash).await?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn refund_trusted_from_btc_ln(&self, hash: PaymentHash) -> Result<(), CoreError> {
        let _guard = self.locks.acquire(hash).await?;
        let mut swap = match self.storage.get(hash).await? {
            Some(Swap::TrustedFromBtcLn(s)) if s.state == TrustedFromBtcLnState::Received => s,
            _ => return Ok(()),
        };
        let fee_rate = self.btc.recommended_fee_rate(6).await.unwrap_or(1);
        let estimated_fee = fee_rate.saturating_mul(150);
        let net = (swap.input_sats as u64).saturating_sub(estimated_fee);
        let mut refund_tx = None;
        if net >= DUST_LIMIT_SATS {
            if let Some(addr) = swap.refund_address.clone() {
                refund_tx = self.btc.send_to_address(&addr, net, fee_rate).await.ok();
            }
        }
        swap.refund_reason = Some(RefundReason::CounterpartyFailure);
        let mut record = Swap::TrustedFromBtcLn(swap);
        transition_trusted_from_btc_ln(&mut record, TrustedFromBtcLnState::Refunded)?;
        record.base_mut().tx_ids.refund = refund_tx;
        self.storage.put(&record).await?;
        Ok(())
    }

    /// Watchdog 2 (§5, P7): for each TrustedFromBtcLn swap awaiting
    /// on-chain confirmation, verifies its funding tx is still present;
    /// if it has vanished (RBF replacement), burns the output and marks
    /// the swap `DoubleSpent`. Intended to run every 10s.
    pub async fn double_spend_watchdog(&self) {
        let swaps = match self.storage.list_unfinished().await {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "double_spend_watchdog: failed to list swaps");
                return;
            }
        };
        for swap in swaps {
            let (hash, tx_id) = match &swap {
                Swap::TrustedFromBtcLn(s) if s.state == TrustedFromBtcLnState::Received => {
                    match &s.base.tx_ids.init {
                        Some(tx) => (s.base.payment_hash, tx.clone()),
                        None => continue,
                    }
                }
                _ => continue,
            };

            match self.btc.tx_still_present(&tx_id).await {
                Ok(true) => {}
                Ok(false) => {
                    if let Err(e) = self.burn_double_spent(hash).await {
                        error!(payment_hash = %hash, error = %e, "failed to burn double-spent funding tx");
                    }
                }
                Err(e) => warn!(payment_hash = %hash, error = %e, "tx_still_present check failed"),
            }
        }
    }

    async fn burn_double_spent(&self, hash: PaymentHash) -> Result<(), CoreError> {
        let _guard = self.locks.acquire(hash).await?;
        if let Some(mut swap) = self.storage.get(hash).await? {
            if !matches!(&swap, Swap::TrustedFromBtcLn(s) if s.state == TrustedFromBtcLnState::Received)
            {
                return Ok(());
            }
            let burn_tx = self.btc.broadcast(&build_burn_package(&hash.0)).await?;
            transition_trusted_from_btc_ln(&mut swap, TrustedFromBtcLnState::DoubleSpent)?;
            if let Swap::TrustedFromBtcLn(s) = &mut swap {
                s.refund_reason = Some(RefundReason::DoubleSpend);
                s.burn_tx = Some(burn_tx.clone());
            }
            swap.base_mut().tx_ids.burn = Some(burn_tx);
            self.storage.put(&swap).await?;
            self.plugins.emit(PluginSwapEvent::DoubleSpent { payment_hash: hash });
        }
        Ok(())
    }

    /// Watchdog 3 (§5): subscribes to the SC-chain event stream and
    /// dispatches each event by `payment_hash`, applying them in the
    /// total block order the chain adapter guarantees.
    pub async fn run_event_loop(self: Arc<Self>) -> Result<(), CoreError> {
        let mut rx = self.chain.subscribe_events().await?;
        while let Some(event) = rx.recv().await {
            if let Err(e) = self.handle_chain_event(event).await {
                error!(error = %e, "event_loop: failed to apply chain event");
            }
        }
        Ok(())
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitcoin_watcher::ObservedUtxo;
    use crate::chain_adapter::SpvProof;
    use crate::lightning::{InvoiceStatus, PaymentOutcome, ProbeResult};
    use crate::storage::StorageError;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct MemStorage {
        swaps: StdMutex<HashMap<PaymentHash, Swap>>,
    }

    #[async_trait]
    impl SwapStorage for MemStorage {
        async fn get(&self, hash: PaymentHash) -> Result<Option<Swap>, StorageError> {
            Ok(self.swaps.lock().unwrap().get(&hash).cloned())
        }
        async fn put(&self, swap: &Swap) -> Result<(), StorageError> {
            self.swaps
                .lock()
                .unwrap()
                .insert(swap.payment_hash(), swap.clone());
            Ok(())
        }
        async fn delete(&self, hash: PaymentHash) -> Result<(), StorageError> {
            self.swaps.lock().unwrap().remove(&hash);
            Ok(())
        }
        async fn list_unfinished(&self) -> Result<Vec<Swap>, StorageError> {
            Ok(self
                .swaps
                .lock()
                .unwrap()
                .values()
                .filter(|s| !s.is_terminal())
                .cloned()
                .collect())
        }
        async fn list_all(&self) -> Result<Vec<Swap>, StorageError> {
            Ok(self.swaps.lock().unwrap().values().cloned().collect())
        }
    }

    struct StubChain;
    #[async_trait]
    impl SwapContract for StubChain {
        async fn create_swap_data(
            &self,
            payment_hash: PaymentHash,
            offerer: &str,
            claimer: &str,
            token: &str,
            amount: u128,
            expiry: u64,
        ) -> Result<SwapData, CoreError> {
            Ok(SwapData {
                offerer: offerer.to_string(),
                claimer: claimer.to_string(),
                token: token.to_string(),
                amount,
                hash: payment_hash.0,
                expiry,
                confirmations: 1,
                sequence: 0,
                security_deposit: 0,
                claimer_bounty: 0,
                swap_type: SwapDataType::Htlc,
                pay_in: false,
            })
        }
        async fn sign_init_authorization(&self, _swap_data: &SwapData) -> Result<String, CoreError> {
            Ok("sig".into())
        }
        async fn sign_refund_authorization(&self, _hash: PaymentHash) -> Result<String, CoreError> {
            Ok("sig".into())
        }
        async fn commit_status(&self, _tx_id: &str) -> Result<bool, CoreError> {
            Ok(true)
        }
        async fn claim(
            &self,
            _hash: PaymentHash,
            _proof: Option<SpvProof>,
            _secret: Option<[u8; 32]>,
        ) -> Result<String, CoreError> {
            Ok("claim-tx".into())
        }
        async fn refund(&self, _hash: PaymentHash) -> Result<String, CoreError> {
            Ok("refund-tx".into())
        }
        async fn synchronize_btc_relay(&self) -> Result<(), CoreError> {
            Ok(())
        }
        async fn subscribe_events(&self) -> Result<mpsc::Receiver<ChainEvent>, CoreError> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }
    }

    struct StubBtc;
    #[async_trait]
    impl BitcoinWatcher for StubBtc {
        async fn watch_address(&self, _address: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn unwatch_address(&self, _address: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn utxos_at(&self, _address: &str) -> Result<Vec<ObservedUtxo>, CoreError> {
            Ok(vec![])
        }
        async fn tx_still_present(&self, _tx_id: &str) -> Result<bool, CoreError> {
            Ok(true)
        }
        async fn broadcast(&self, _raw_tx: &[u8]) -> Result<String, CoreError> {
            Ok("tx".into())
        }
        async fn recommended_fee_rate(&self, _target: u32) -> Result<u64, CoreError> {
            Ok(5)
        }
        async fn send_to_address(
            &self,
            _address: &str,
            _amount_sats: u64,
            _fee_rate_sats_per_vbyte: u64,
        ) -> Result<String, CoreError> {
            Ok("payout-tx".into())
        }
        async fn tx_confirmations(&self, _tx_id: &str) -> Result<u32, CoreError> {
            Ok(6)
        }
    }

    struct StubLn;
    #[async_trait]
    impl LightningAdapter for StubLn {
        async fn create_hodl_invoice(
            &self,
            _hash: [u8; 32],
            _amount_msat: u64,
            _expiry: u32,
            _desc: &str,
        ) -> Result<String, CoreError> {
            Ok("lnbc1".into())
        }
        async fn invoice_status(&self, _hash: [u8; 32]) -> Result<InvoiceStatus, CoreError> {
            Ok(InvoiceStatus::Created)
        }
        async fn settle_hodl_invoice(&self, _hash: [u8; 32], _preimage: [u8; 32]) -> Result<(), CoreError> {
            Ok(())
        }
        async fn cancel_hodl_invoice(&self, _hash: [u8; 32]) -> Result<(), CoreError> {
            Ok(())
        }
        async fn probe_route(&self, _bolt11: &str, _amount_msat: u64) -> Result<ProbeResult, CoreError> {
            Ok(ProbeResult {
                confidence: 0.9,
                fee_sats: 5,
            })
        }
        async fn pay_invoice(
            &self,
            _bolt11: &str,
            _bounds: RoutingBounds,
        ) -> Result<PaymentOutcome, CoreError> {
            Ok(PaymentOutcome::Succeeded {
                preimage: [1u8; 32],
                fee_sats: 1,
            })
        }
    }

    struct StubPrice(u64);
    #[async_trait]
    impl crate::pricing::PriceProvider for StubPrice {
        async fn fetch_price(&self, _chain_id: &str, _token: &str) -> Result<u64, CoreError> {
            Ok(self.0)
        }
    }

    fn direction_config() -> DirectionConfig {
        DirectionConfig {
            params: QuoteParams {
                min_sats: 1_000,
                max_sats: 10_000_000,
                base_fee_sats: 50,
                fee_ppm: 2_000,
                max_allowed_price_deviation_ppm: 50_000,
            },
            token: "TOK".into(),
            token_decimals_factor: 100,
            confirmations_required: 1,
            confirmation_target: 6,
            quote_ttl_secs: 600,
            min_ln_confidence: 0.5,
            routing_bounds: RoutingBounds {
                max_routing_base_fee_sats: 10,
                max_routing_ppm: 5_000,
            },
        }
    }

    fn make_engine() -> SwapCore {
        let mut directions = HashMap::new();
        directions.insert(Direction::FromBtc, direction_config());
        directions.insert(Direction::FromBtcLn, direction_config());
        directions.insert(Direction::ToBtc, direction_config());
        directions.insert(Direction::ToBtcLn, direction_config());
        directions.insert(Direction::TrustedFromBtcLn, direction_config());

        SwapCore::new(
            "sc-1".into(),
            "lp-address".into(),
            EngineConfig {
                process_past_swaps_interval: Duration::from_secs(60),
                double_spend_watchdog_interval: Duration::from_secs(10),
                lock_timeout: Duration::from_secs(5),
                to_btc_send_safety_margin_secs: 3600,
                directions,
            },
            Arc::new(MemStorage::default()),
            Arc::new(StubChain),
            Arc::new(StubBtc),
            Arc::new(StubLn),
            Arc::new(CachedPricingOracle::new(
                vec![Arc::new(StubPrice(1_000))],
                Duration::from_secs(60),
            )),
            Arc::new(PluginBus::new()),
        )
    }

    #[tokio::test]
    async fn quote_from_btc_persists_a_created_swap() {
        let engine = make_engine();
        let hash = PaymentHash([9u8; 32]);
        let swap = engine
            .quote_from_btc(
                hash,
                "user",
                "TOK",
                AmountSpec::ExactOut,
                100_000,
                "bc1qaddr".into(),
                &[0u8; 22],
                None,
                1_700_000_000,
            )
            .await
            .unwrap();
        assert_eq!(swap.state, FromBtcState::Created);
        let stored = engine.storage.get(hash).await.unwrap().unwrap();
        assert_eq!(stored.direction(), Direction::FromBtc);
    }

    #[tokio::test]
    async fn chain_initialize_event_advances_from_btc_to_commited() {
        let engine = make_engine();
        let hash = PaymentHash([3u8; 32]);
        engine
            .quote_from_btc(
                hash,
                "user",
                "TOK",
                AmountSpec::ExactOut,
                100_000,
                "bc1qaddr".into(),
                &[0u8; 22],
                None,
                1_700_000_000,
            )
            .await
            .unwrap();

        engine
            .handle_chain_event(ChainEvent::Initialize {
                payment_hash: hash,
                swap_data: engine.storage.get(hash).await.unwrap().unwrap().base().swap_data.clone(),
                tx_id: "init-tx".into(),
                block_height: 100,
            })
            .await
            .unwrap();

        let swap = engine.storage.get(hash).await.unwrap().unwrap();
        match swap {
            Swap::FromBtc(s) => assert_eq!(s.state, FromBtcState::Commited),
            _ => panic!("wrong variant"),
        }
    }

    #[tokio::test]
    async fn double_spend_watchdog_burns_vanished_funding_tx() {
        struct VanishingBtc;
        #[async_trait]
        impl BitcoinWatcher for VanishingBtc {
            async fn watch_address(&self, _a: &str) -> Result<(), CoreError> {
                Ok(())
            }
            async fn unwatch_address(&self, _a: &str) -> Result<(), CoreError> {
                Ok(())
            }
            async fn utxos_at(&self, _a: &str) -> Result<Vec<ObservedUtxo>, CoreError> {
                Ok(vec![])
            }
            async fn tx_still_present(&self, _tx_id: &str) -> Result<bool, CoreError> {
                Ok(false)
            }
            async fn broadcast(&self, _raw_tx: &[u8]) -> Result<String, CoreError> {
                Ok("burn-tx".into())
            }
            async fn recommended_fee_rate(&self, _t: u32) -> Result<u64, CoreError> {
                Ok(5)
            }
            async fn send_to_address(
                &self,
                _address: &str,
                _amount_sats: u64,
                _fee_rate_sats_per_vbyte: u64,
            ) -> Result<String, CoreError> {
                Ok("payout-tx".into())
            }
            async fn tx_confirmations(&self, _tx_id: &str) -> Result<u32, CoreError> {
                Ok(6)
            }
        }

        let mut engine = make_engine();
        engine.btc = Arc::new(VanishingBtc);
        let hash = PaymentHash([5u8; 32]);
        let mut swap = engine
            .quote_trusted_from_btc_ln(hash, "TOK", 50_000, None, 1_700_000_000)
            .await
            .unwrap();
        swap.state = TrustedFromBtcLnState::Received;
        swap.base.tx_ids.init = Some("funding-tx".into());
        engine
            .storage
            .put(&Swap::TrustedFromBtcLn(swap))
            .await
            .unwrap();

        engine.double_spend_watchdog().await;

        let stored = engine.storage.get(hash).await.unwrap().unwrap();
        match stored {
            Swap::TrustedFromBtcLn(s) => {
                assert_eq!(s.state, TrustedFromBtcLnState::DoubleSpent);
                assert_eq!(s.refund_reason, Some(RefundReason::DoubleSpend));
                assert_eq!(s.burn_tx, Some("burn-tx".into()));
            }
            _ => panic!("wrong variant"),
        }
    }
}
