//! Order slicer
//!
//! Splits a sell into slices small enough to stay inside the configured
//! price-impact bound, with a per-slice `min_out` floor derived from the
//! plan-time reserves. Pure arithmetic; the engine owns submission.

use crate::config::MAX_SLICES;
use crate::pool::get_amount_out;
use crate::types::{OrderPlan, BPS};
use alloy::primitives::U256;
use tracing::warn;

/// Plans a sell of `total` against reserves (`reserve_in`, `reserve_out`).
///
/// Slice sizing targets `max_slippage_bps` of the input reserve per slice;
/// the plan never exceeds [`MAX_SLICES`] slices, accepting more impact per
/// slice instead when the cap binds. Slices always sum to exactly `total`.
pub fn plan(
    total: U256,
    reserve_in: U256,
    reserve_out: U256,
    max_slippage_bps: u32,
    safety_bps: u32,
) -> OrderPlan {
    if total.is_zero() {
        return OrderPlan::empty();
    }
    if reserve_in.is_zero() || reserve_out.is_zero() {
        // No usable reserves to size against: one whole-amount slice with no
        // output floor, left to the submitter's own revert protection.
        return OrderPlan {
            slices: vec![total],
            min_out_per_slice: vec![U256::ZERO],
        };
    }

    // A dust-sized input reserve rounds the target slice to zero; clamp so
    // the partition below never emits empty slices
    let approx_slice = (reserve_in * U256::from(max_slippage_bps) / U256::from(BPS))
        .max(U256::from(1u64));
    // ceil(total / approx_slice)
    let ideal = (total + approx_slice - U256::from(1u64)) / approx_slice;
    let capped = ideal > U256::from(MAX_SLICES as u64);
    let num_slices = if capped {
        warn!(
            wanted = %ideal,
            slices = MAX_SLICES,
            "slice cap reached, accepting extra per-slice impact"
        );
        MAX_SLICES
    } else {
        // ideal fits in usize here: it is at most MAX_SLICES
        usize::try_from(ideal).unwrap_or(MAX_SLICES)
    };

    let n = U256::from(num_slices as u64);
    let base = total / n;
    let remainder = total - base * n;

    let mut slices = Vec::with_capacity(num_slices);
    let mut min_out = Vec::with_capacity(num_slices);
    for i in 0..num_slices {
        // Last slice absorbs the division remainder
        let amount = if i == num_slices - 1 {
            base + remainder
        } else {
            base
        };
        let out = get_amount_out(amount, reserve_in, reserve_out);
        let floor = out * U256::from(BPS - safety_bps as u64) / U256::from(BPS);
        slices.push(amount);
        min_out.push(floor);
    }

    OrderPlan {
        slices,
        min_out_per_slice: min_out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fp18;

    fn fct(n: u64) -> U256 {
        U256::from(n) * fp18()
    }

    #[test]
    fn test_slices_sum_exactly() {
        // A total that does not divide evenly
        let total = fct(100_000) + U256::from(7u64);
        let plan = plan(total, fct(1_000_000), fct(10), 80, 50);
        assert_eq!(plan.total_in(), total);
        assert!(plan.slices.len() > 1);
    }

    #[test]
    fn test_zero_total_is_empty() {
        assert!(plan(U256::ZERO, fct(1_000_000), fct(10), 80, 50).is_empty());
    }

    #[test]
    fn test_unusable_reserves_single_slice() {
        let p = plan(fct(100), U256::ZERO, fct(10), 80, 50);
        assert_eq!(p.slices, vec![fct(100)]);
        assert_eq!(p.min_out_per_slice, vec![U256::ZERO]);
    }

    #[test]
    fn test_dust_reserves_never_emit_empty_slices() {
        // 80 bps of a 100-wei reserve rounds to zero; the clamp keeps every
        // slice positive instead of padding the plan with empty ones
        let p = plan(U256::from(10u64), U256::from(100u64), U256::from(100u64), 80, 50);
        assert_eq!(p.total_in(), U256::from(10u64));
        assert!(p.slices.iter().all(|s| !s.is_zero()));
        assert!(p.slices.len() <= MAX_SLICES);
    }

    #[test]
    fn test_cap_binds_on_huge_orders() {
        // 10x the pool at an 80 bps target would want >1000 slices
        let p = plan(fct(10_000_000), fct(1_000_000), fct(10), 80, 50);
        assert_eq!(p.slices.len(), MAX_SLICES);
        assert_eq!(p.total_in(), fct(10_000_000));
    }

    #[test]
    fn test_min_out_reference_scenario() {
        // 80 bps of a 1M reserve is 8,000 FCT per slice: ceil(50000/8000) = 7
        let p = plan(fct(50_000), fct(1_000_000), fct(10), 80, 100);
        assert_eq!(p.slices.len(), 7);

        // With a single whole-amount slice the floor is the AMM output less
        // the 100 bps haircut
        let single = plan(fct(50_000), fct(1_000_000), fct(10), 10_000, 100);
        assert_eq!(single.slices.len(), 1);
        let out = get_amount_out(fct(50_000), fct(1_000_000), fct(10));
        assert_eq!(
            single.min_out_per_slice[0],
            out * U256::from(9_900u64) / U256::from(10_000u64)
        );
    }

    #[test]
    fn test_slice_count_tracks_slippage_bound() {
        let loose = plan(fct(100_000), fct(1_000_000), fct(10), 200, 50);
        let tight = plan(fct(100_000), fct(1_000_000), fct(10), 50, 50);
        assert!(tight.slices.len() > loose.slices.len());
    }
}
