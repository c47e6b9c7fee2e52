//! Collaborator seams
//!
//! The engine only touches the chain through these traits. Live adapters
//! (RPC client, wallet, signer) live outside this crate; the `sim` module
//! provides deterministic in-memory implementations for dry runs and tests.

use crate::types::{ExecError, CycleInfo, MintOutcome, PairEvent, PoolSnapshot, TradeReceipt};
use alloy::primitives::U256;
use anyhow::Result;
use async_trait::async_trait;

/// Read access to the FCT/WETH pair.
#[async_trait]
pub trait PoolReader: Send + Sync {
    /// Current reserves, validated into a typed snapshot.
    async fn get_reserves(&self) -> Result<PoolSnapshot>;

    /// Sync/Swap events since `from_block`, oldest first.
    async fn recent_swap_events(&self, from_block: u64) -> Result<Vec<PairEvent>>;
}

/// Current L1 fee level in wei per gas.
#[async_trait]
pub trait FeeOracle: Send + Sync {
    async fn current_fee_level(&self) -> Result<U256>;
}

/// Protocol mint rate: FCT-wei credited per unit of data gas burned.
#[async_trait]
pub trait MintQuoter: Send + Sync {
    async fn quote_mint_rate(&self) -> Result<U256>;
}

/// Submits sell orders against the pool and tracks their receipts.
#[async_trait]
pub trait TradeSubmitter: Send + Sync {
    /// Submits one slice. Returns a receipt once confirmed, or
    /// `ExecError::ReceiptTimeout` when confirmation outlasts the wait
    /// budget (the trade may still land; callers must reconcile via
    /// `poll_receipt` before mutating state again).
    async fn submit_trade(&self, amount_in: U256, min_out: U256)
        -> Result<TradeReceipt, ExecError>;

    /// Checks on a previously submitted trade. `Ok(None)` means still
    /// pending; `Err(Revert)` means it definitively failed.
    async fn poll_receipt(&self, id: &str) -> Result<Option<TradeReceipt>, ExecError>;
}

/// Submits mint transactions (calldata burns) on L1.
#[async_trait]
pub trait MintSubmitter: Send + Sync {
    async fn submit_mint(&self, size_bytes: u64) -> Result<MintOutcome, ExecError>;
}

/// Issuance-period telemetry (progress toward the mint cap, blocks left).
#[async_trait]
pub trait CycleTelemetry: Send + Sync {
    /// Best-effort; fields the source cannot provide stay `None` and the
    /// corresponding gate criteria pass open.
    async fn cycle_info(&self) -> Result<CycleInfo>;
}
