//! Core data structures for the autotrader
//!
//! All on-chain quantities are 18-decimal fixed point integers (U256);
//! ratios and percentages are parts-per-million integers so that trigger
//! comparisons stay exact across platforms.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One whole token in 18-decimal fixed point.
pub const FP18: u128 = 1_000_000_000_000_000_000;

/// Ratio scale: 1.0 == 1_000_000 ppm.
pub const PPM: u64 = 1_000_000;

/// Basis point scale: 100% == 10_000 bps.
pub const BPS: u64 = 10_000;

/// Returns 1e18 as a U256.
pub fn fp18() -> U256 {
    U256::from(FP18)
}

/// Lossy conversion for display and EMA smoothing only. Never used in
/// trigger comparisons.
pub fn u256_to_f64(x: U256) -> f64 {
    match u128::try_from(x) {
        Ok(v) => v as f64,
        // Beyond u128 range: parse the decimal string (still exact enough for f64)
        Err(_) => x.to_string().parse::<f64>().unwrap_or(f64::MAX),
    }
}

/// Lossy fp18 -> f64 conversion for display.
pub fn fp18_to_f64(x: U256) -> f64 {
    u256_to_f64(x) / FP18 as f64
}

/// Where a price quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteSource {
    /// Derived from a recent pair Sync event (reserve update)
    EventSync,
    /// Derived from a recent pair Swap event
    EventSwap,
    /// Direct on-demand read of current pool reserves
    ReserveFallback,
    /// Manually injected (tests, replay)
    Override,
}

impl fmt::Display for QuoteSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QuoteSource::EventSync => write!(f, "event_sync"),
            QuoteSource::EventSwap => write!(f, "event_swap"),
            QuoteSource::ReserveFallback => write!(f, "reserve_fallback"),
            QuoteSource::Override => write!(f, "override"),
        }
    }
}

/// Current exchange rate between FCT and the base asset (ETH).
///
/// Invariant: `value_fp18 > 0` whenever `source != Override`. A failed
/// resolution yields an error upstream, never a zero quote.
#[derive(Debug, Clone)]
pub struct PriceQuote {
    /// ETH-wei per one FCT, 18-decimal fixed point
    pub value_fp18: U256,
    pub source: QuoteSource,
    /// Observed/implied slippage in basis points, when known
    pub slippage_bps: Option<u32>,
}

/// Typed snapshot of the FCT/WETH pair reserves, validated at the boundary.
#[derive(Debug, Clone, Copy)]
pub struct PoolSnapshot {
    /// FCT-side reserve (token being sold)
    pub reserve_token: U256,
    /// WETH-side reserve (base asset received)
    pub reserve_base: U256,
    pub token0: Address,
    pub token1: Address,
    /// Block at which the reserves were read
    pub block: u64,
}

impl PoolSnapshot {
    /// Spot price of one FCT in ETH-wei, fp18. None when the token reserve
    /// is empty (price undefined, not zero).
    pub fn spot_price_fp18(&self) -> Option<U256> {
        if self.reserve_token.is_zero() {
            return None;
        }
        Some(self.reserve_base * fp18() / self.reserve_token)
    }
}

/// Kind of pair event feeding the oracle's rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairEventKind {
    Sync,
    Swap,
}

/// A pool reserve update observed from the pair contract.
#[derive(Debug, Clone)]
pub struct PairEvent {
    pub kind: PairEventKind,
    pub reserve_token: U256,
    pub reserve_base: U256,
    pub block: u64,
    pub observed_at: std::time::Instant,
}

/// External mint-cycle telemetry (progress of the current issuance period).
#[derive(Debug, Clone, Default)]
pub struct CycleInfo {
    /// Fraction of the cycle's mint cap already used, in ppm (0..=1_000_000)
    pub progress_ppm: Option<u64>,
    /// L1 blocks remaining in the cycle
    pub blocks_left: Option<u64>,
}

/// Machine-readable rejection codes emitted by the admission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoInventory,
    BelowTakeProfit,
    InsufficientDiscount,
    EdgeTooSmall,
    EfficiencyBelowFloor,
    FeeOutOfWindow,
    CycleNotEarly,
    CycleLateWeak,
    CycleNearCap,
    CooldownActive,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let code = match self {
            RejectReason::NoInventory => "no inventory",
            RejectReason::BelowTakeProfit => "below_take_profit",
            RejectReason::InsufficientDiscount => "insufficient_discount",
            RejectReason::EdgeTooSmall => "edge_too_small",
            RejectReason::EfficiencyBelowFloor => "efficiency_below_floor",
            RejectReason::FeeOutOfWindow => "fee_out_of_window",
            RejectReason::CycleNotEarly => "cycle_not_early",
            RejectReason::CycleLateWeak => "cycle_late_weak",
            RejectReason::CycleNearCap => "cycle_near_cap",
            RejectReason::CooldownActive => "cooldown_active",
        };
        write!(f, "{}", code)
    }
}

/// Verdict for one cycle. `reasons` is empty iff `accept` is true.
#[derive(Debug, Clone)]
pub struct GateDecision {
    pub accept: bool,
    pub reasons: Vec<RejectReason>,
}

impl GateDecision {
    pub fn accepted() -> Self {
        Self {
            accept: true,
            reasons: Vec::new(),
        }
    }

    pub fn rejected(reasons: Vec<RejectReason>) -> Self {
        debug_assert!(!reasons.is_empty());
        Self {
            accept: false,
            reasons,
        }
    }

    /// True when every rejection reason is in `set` (used by the relaxation
    /// and fee-wait logic).
    pub fn rejected_only_for(&self, set: &[RejectReason]) -> bool {
        !self.accept && self.reasons.iter().all(|r| set.contains(r))
    }
}

/// Sell plan: slices always sum exactly to the requested total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPlan {
    pub slices: Vec<U256>,
    pub min_out_per_slice: Vec<U256>,
}

impl OrderPlan {
    pub fn empty() -> Self {
        Self {
            slices: Vec::new(),
            min_out_per_slice: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn total_in(&self) -> U256 {
        self.slices.iter().fold(U256::ZERO, |acc, s| acc + s)
    }

    pub fn total_min_out(&self) -> U256 {
        self.min_out_per_slice
            .iter()
            .fold(U256::ZERO, |acc, s| acc + s)
    }
}

/// Confirmed sell execution result.
#[derive(Debug, Clone)]
pub struct TradeReceipt {
    pub id: String,
    /// FCT actually sold
    pub amount_in: U256,
    /// ETH-wei actually received
    pub amount_out: U256,
    pub confirmed_at: chrono::DateTime<chrono::Utc>,
}

/// Confirmed mint result (one L1 transaction's worth).
#[derive(Debug, Clone)]
pub struct MintOutcome {
    /// FCT-wei credited by the mint
    pub quantity_minted: U256,
    /// ETH-wei burned on L1 (gas_used * effective_gas_price)
    pub cost_paid: U256,
}

/// Execution failure taxonomy. Transient errors are retried without
/// consuming backoff; hard failures route the loop to Backoff; a receipt
/// timeout defers the ledger update to the next cycle's consistency check.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("transient: {0}")]
    Transient(String),
    #[error("reverted: {0}")]
    Revert(String),
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: U256, need: U256 },
    #[error("receipt wait timed out for {id}")]
    ReceiptTimeout { id: String },
}
