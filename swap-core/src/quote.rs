//! QuoteEngine: PPM fee math, min/max and price-deviation gating, and
//! signed-authorization preparation (§4.1).

use serde::{Deserialize, Serialize};

use crate::error::QuoteError;
use crate::types::{Amount, Direction};

const PPM_DENOMINATOR: u128 = 1_000_000;

/// Whether the client specified the amount going in or the amount coming
/// out; determines which side of the PPM formula we solve for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AmountSpec {
    ExactIn,
    ExactOut,
}

/// Static bounds and fee parameters for one token on one direction,
/// normally sourced from `EngineConfig` in `swap-node`.
#[derive(Clone, Debug)]
pub struct QuoteParams {
    pub min_sats: Amount,
    pub max_sats: Amount,
    pub base_fee_sats: Amount,
    pub fee_ppm: u64,
    pub max_allowed_price_deviation_ppm: u64,
}

/// A soft-band rejection for an exact-in amount outside `[min, max]`,
/// carrying adjusted bounds in user-facing units so the client can retry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdjustedBounds {
    pub min: Amount,
    pub max: Amount,
}

/// `total_sats = A*(1e6+p)/1e6 + B` for a send (user pays the LP sats,
/// `A` is the LP-side output), or `A*(1e6-p)/1e6 - B` for a receive (user
/// receives sats, `A` is the gross amount before the LP's cut).
pub fn ppm_total_for_exact_out(
    gross: Amount,
    base_fee: Amount,
    ppm: u64,
    is_send: bool,
) -> Result<Amount, QuoteError> {
    let ppm = ppm as u128;
    if is_send {
        let scaled = gross
            .checked_mul(PPM_DENOMINATOR + ppm)
            .ok_or(QuoteError::Overflow("ppm_total_for_exact_out"))?;
        Ok(scaled / PPM_DENOMINATOR + base_fee)
    } else {
        let scaled = gross
            .checked_mul(PPM_DENOMINATOR.saturating_sub(ppm))
            .ok_or(QuoteError::Overflow("ppm_total_for_exact_out"))?;
        Ok((scaled / PPM_DENOMINATOR).saturating_sub(base_fee))
    }
}

/// Invert the PPM formula for an exact-in amount: subtract the base fee
/// first, then divide out the ppm cut, mirroring what the client would
/// have gotten had they instead specified the output exactly.
pub fn ppm_implied_gross_for_exact_in(
    total: Amount,
    base_fee: Amount,
    ppm: u64,
    is_send: bool,
) -> Result<Amount, QuoteError> {
    let ppm = ppm as u128;
    if is_send {
        let net = total.saturating_sub(base_fee);
        let scaled = net
            .checked_mul(PPM_DENOMINATOR)
            .ok_or(QuoteError::Overflow("ppm_implied_gross_for_exact_in"))?;
        Ok(scaled / (PPM_DENOMINATOR + ppm))
    } else {
        let net = total + base_fee;
        let scaled = net
            .checked_mul(PPM_DENOMINATOR)
            .ok_or(QuoteError::Overflow("ppm_implied_gross_for_exact_in"))?;
        Ok(scaled / (PPM_DENOMINATOR - ppm))
    }
}

/// Checks the implied amount against `[min*0.95, max*1.05]`, the soft band
/// that accounts for fee rounding noise described in §4.1.
pub fn check_soft_band(
    implied: Amount,
    params: &QuoteParams,
) -> Result<(), (QuoteError, AdjustedBounds)> {
    let soft_min = params.min_sats * 95 / 100;
    let soft_max = params.max_sats * 105 / 100;
    if implied < soft_min {
        return Err((
            QuoteError::AmountTooLow {
                amount: implied,
                min: params.min_sats,
            },
            AdjustedBounds {
                min: params.min_sats,
                max: params.max_sats,
            },
        ));
    }
    if implied > soft_max {
        return Err((
            QuoteError::AmountTooHigh {
                amount: implied,
                max: params.max_sats,
            },
            AdjustedBounds {
                min: params.min_sats,
                max: params.max_sats,
            },
        ));
    }
    Ok(())
}

/// Compares a proposed swap price against the oracle's real price and
/// rejects when the divergence exceeds `max_allowed_price_deviation_ppm`.
pub fn check_price_deviation(
    swap_price: u64,
    real_price: u64,
    max_allowed_ppm: u64,
) -> Result<(), QuoteError> {
    let diff = swap_price as i128 - real_price as i128;
    let diff_ppm = diff
        .checked_mul(PPM_DENOMINATOR as i128)
        .and_then(|v| v.checked_div(real_price.max(1) as i128))
        .unwrap_or(i128::MAX);
    if diff_ppm.unsigned_abs() > max_allowed_ppm as u128 {
        return Err(QuoteError::PriceDeviation {
            diff_ppm: diff_ppm as i64,
            max_ppm: max_allowed_ppm,
        });
    }
    Ok(())
}

/// A request to build a quote for a given direction and amount.
#[derive(Clone, Debug)]
pub struct QuoteRequest {
    pub direction: Direction,
    pub token: String,
    pub spec: AmountSpec,
    pub amount: Amount,
}

/// The priced-out result of a successful `quote()` call, before a signed
/// authorization and durable `Swap` record are attached by the engine.
#[derive(Clone, Debug)]
pub struct PricedQuote {
    pub total_sats: Amount,
    pub gross_sats: Amount,
    pub swap_fee_sats: Amount,
    pub swap_fee_token: Amount,
    pub network_fee_sats: Amount,
}

/// Computes fee-consistent pricing for a request, enforcing P2 (PPM math)
/// and P3 (fee consistency: `swap_fee_token >= base_fee_sats * decimals /
/// price`).
pub fn price_quote(
    req: &QuoteRequest,
    params: &QuoteParams,
    network_fee_sats: Amount,
    token_decimals_factor: Amount,
    swap_price_micro_sat_per_token: u64,
) -> Result<PricedQuote, (QuoteError, Option<AdjustedBounds>)> {
    let is_send = req.direction.lp_is_claimer();

    let (gross_sats, total_sats) = match req.spec {
        AmountSpec::ExactOut => {
            if let Err((e, bounds)) = check_soft_band(req.amount, params) {
                return Err((e, Some(bounds)));
            }
            let total = ppm_total_for_exact_out(
                req.amount,
                params.base_fee_sats,
                params.fee_ppm,
                is_send,
            )
            .map_err(|e| (e, None))?;
            (req.amount, total)
        }
        AmountSpec::ExactIn => {
            let implied = ppm_implied_gross_for_exact_in(
                req.amount,
                params.base_fee_sats,
                params.fee_ppm,
                is_send,
            )
            .map_err(|e| (e, None))?;
            if let Err((e, bounds)) = check_soft_band(implied, params) {
                return Err((e, Some(bounds)));
            }
            (implied, req.amount)
        }
    };

    let swap_fee_sats = total_sats.saturating_sub(gross_sats).max(params.base_fee_sats);

    let swap_fee_token = if swap_price_micro_sat_per_token == 0 {
        return Err((QuoteError::Overflow("swap_price_micro_sat_per_token"), None));
    } else {
        swap_fee_sats
            .saturating_mul(1_000_000)
            .saturating_mul(token_decimals_factor)
            / swap_price_micro_sat_per_token as u128
    };

    Ok(PricedQuote {
        total_sats,
        gross_sats,
        swap_fee_sats,
        swap_fee_token,
        network_fee_sats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> QuoteParams {
        QuoteParams {
            min_sats: 10_000,
            max_sats: 10_000_000,
            base_fee_sats: 500,
            fee_ppm: 5_000,
            max_allowed_price_deviation_ppm: 10_000,
        }
    }

    #[test]
    fn exact_out_send_matches_formula() {
        let total = ppm_total_for_exact_out(100_000, 500, 5_000, true).unwrap();
        assert_eq!(total, 100_000 * 1_005_000 / 1_000_000 + 500);
    }

    #[test]
    fn exact_in_round_trips_within_one_unit() {
        let total = ppm_total_for_exact_out(100_000, 500, 5_000, true).unwrap();
        let implied = ppm_implied_gross_for_exact_in(total, 500, 5_000, true).unwrap();
        let diff = (implied as i128 - 100_000i128).abs();
        assert!(diff <= 1, "round trip diverged by {diff}");
    }

    #[test]
    fn price_deviation_rejects_beyond_bound() {
        let err = check_price_deviation(2_000, 1_000, 100_000);
        assert!(err.is_err());
    }

    #[test]
    fn price_deviation_within_bound_accepted() {
        assert!(check_price_deviation(1_001, 1_000, 100_000).is_ok());
    }

    #[test]
    fn soft_band_rejects_far_outside_amount() {
        let p = params();
        let err = check_soft_band(1_000, &p);
        assert!(err.is_err());
    }

    #[test]
    fn fee_consistency_holds_for_priced_quote() {
        let p = params();
        let req = QuoteRequest {
            direction: Direction::FromBtc,
            token: "TOK".into(),
            spec: AmountSpec::ExactOut,
            amount: 100_000,
        };
        let priced = price_quote(&req, &p, 0, 100, 1_000).unwrap();
        assert!(priced.swap_fee_sats >= p.base_fee_sats);
    }
}
