//! Mint cost estimator
//!
//! FCT is minted by burning L1 gas on calldata: the protocol credits FCT in
//! proportion to the base-fee value of the data gas spent. This module is
//! the pure economics of one mint transaction; nothing here touches the
//! chain.

use crate::types::{fp18, PPM};
use alloy::primitives::U256;

/// Envelope bytes (selector, ABI framing) that carry no mintable data.
const CALLDATA_OVERHEAD_BYTES: u64 = 160;

/// L1 calldata gas per non-zero byte.
const GAS_PER_BYTE: u64 = 40;

/// Fixed execution gas of the carrier transaction.
const BASE_TX_GAS: u64 = 21_000;

/// Economics of one mint transaction at a given fee level.
#[derive(Debug, Clone, Copy)]
pub struct MintEstimate {
    /// Mintable payload after envelope overhead
    pub payload_bytes: u64,
    /// Gas spent on calldata (the part that mints)
    pub data_gas: u64,
    /// Data gas plus the fixed execution overhead
    pub total_gas: u64,
    /// ETH-wei burned at the boosted fee
    pub burn_eth: U256,
    /// FCT-wei credited by the protocol
    pub minted_fct: U256,
    /// ETH-wei per FCT, 18-decimal fixed point
    pub cost_per_fct_fp18: U256,
    /// data_gas / total_gas in ppm
    pub efficiency_ppm: u64,
}

/// Estimates a mint of `size_kb` kilobytes of calldata.
///
/// * `base_fee_wei` — current L1 base fee per gas
/// * `gas_multiplier_ppm` — submission boost over the base fee (>= 1e6)
/// * `mint_rate_fp18` — FCT-wei credited per ETH-wei of data-gas burn,
///   18-decimal fixed point
///
/// Minted quantity is computed at the unboosted base fee (the protocol
/// credits against base fee, not the tip), while the burn uses the boosted
/// fee actually paid.
pub fn estimate(
    size_kb: u32,
    base_fee_wei: U256,
    gas_multiplier_ppm: u64,
    mint_rate_fp18: U256,
) -> MintEstimate {
    let payload_bytes = (size_kb as u64 * 1024).saturating_sub(CALLDATA_OVERHEAD_BYTES);
    let data_gas = payload_bytes * GAS_PER_BYTE;
    let total_gas = data_gas + BASE_TX_GAS;

    let boosted_fee = base_fee_wei * U256::from(gas_multiplier_ppm) / U256::from(PPM);
    let burn_eth = U256::from(total_gas) * boosted_fee;
    let minted_fct = U256::from(data_gas) * base_fee_wei * mint_rate_fp18 / fp18();

    let cost_per_fct_fp18 = if minted_fct.is_zero() {
        U256::MAX
    } else {
        burn_eth * fp18() / minted_fct
    };

    MintEstimate {
        payload_bytes,
        data_gas,
        total_gas,
        burn_eth,
        minted_fct,
        cost_per_fct_fp18,
        efficiency_ppm: data_gas * PPM / total_gas.max(1),
    }
}
