//! Uniswap-V2 constant-product math
//!
//! Exact integer arithmetic on U256 throughout. The 0.3% LP fee is applied
//! as the canonical 997/1000 factor on the input amount.

use crate::types::BPS;
use alloy::primitives::U256;

const FEE_NUMERATOR: u64 = 997;
const FEE_DENOMINATOR: u64 = 1000;

/// Output amount for a swap of `amount_in` against (`reserve_in`,
/// `reserve_out`). Zero when the inputs make the swap undefined.
pub fn get_amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256) -> U256 {
    if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return U256::ZERO;
    }
    let amount_in_with_fee = amount_in * U256::from(FEE_NUMERATOR);
    let numerator = amount_in_with_fee * reserve_out;
    let denominator = reserve_in * U256::from(FEE_DENOMINATOR) + amount_in_with_fee;
    numerator / denominator
}

/// Price impact of the swap in basis points: how far the effective price
/// falls below the pre-trade spot price.
pub fn price_impact_bps(amount_in: U256, reserve_in: U256, reserve_out: U256) -> u32 {
    if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return 0;
    }
    let out = get_amount_out(amount_in, reserve_in, reserve_out);
    // spot = reserve_out / reserve_in; effective = out / amount_in
    // impact = 1 - effective/spot = 1 - out * reserve_in / (amount_in * reserve_out)
    let scale = U256::from(BPS);
    let effective_over_spot = out * reserve_in * scale / (amount_in * reserve_out);
    let impact = scale.saturating_sub(effective_over_spot);
    u32::try_from(impact).unwrap_or(BPS as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fp18;

    #[test]
    fn test_amount_out_reference_scenario() {
        // 1,000,000 FCT / 10 WETH reserves, sell 50,000 FCT
        let reserve_in = U256::from(1_000_000u64) * fp18();
        let reserve_out = U256::from(10u64) * fp18();
        let amount_in = U256::from(50_000u64) * fp18();

        let out = get_amount_out(amount_in, reserve_in, reserve_out);
        // 50_000*997*10 / (1_000_000*1000 + 50_000*997) ≈ 0.47483 ETH
        assert!(out > U256::from(474_000_000_000_000_000u64));
        assert!(out < U256::from(475_000_000_000_000_000u64));
    }

    #[test]
    fn test_amount_out_degenerate_inputs() {
        let r = fp18();
        assert_eq!(get_amount_out(U256::ZERO, r, r), U256::ZERO);
        assert_eq!(get_amount_out(r, U256::ZERO, r), U256::ZERO);
        assert_eq!(get_amount_out(r, r, U256::ZERO), U256::ZERO);
    }

    #[test]
    fn test_price_impact_grows_with_size() {
        let reserve_in = U256::from(1_000_000u64) * fp18();
        let reserve_out = U256::from(10u64) * fp18();

        let small = price_impact_bps(U256::from(1_000u64) * fp18(), reserve_in, reserve_out);
        let large = price_impact_bps(U256::from(100_000u64) * fp18(), reserve_in, reserve_out);
        assert!(small < large);
        // 10% of the pool should move the price by several hundred bps
        assert!(large > 500);
    }

    #[test]
    fn test_small_trade_impact_near_fee_only() {
        let reserve_in = U256::from(1_000_000u64) * fp18();
        let reserve_out = U256::from(10u64) * fp18();
        // A tiny trade's impact is dominated by the 30 bps LP fee
        let impact = price_impact_bps(fp18(), reserve_in, reserve_out);
        assert!(impact >= 30 && impact <= 35, "impact {}", impact);
    }
}
