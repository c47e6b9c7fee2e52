//! Simulated chain
//!
//! Deterministic in-memory implementations of every collaborator trait: a
//! constant-product pool that actually mutates on trades, a fixed fee level,
//! and a minter that credits FCT in proportion to data-gas burn. Backs the
//! dry-run mode of the binary and the engine tests; no network, no keys.

use crate::engine::Collaborators;
use crate::mint;
use crate::pool::get_amount_out;
use crate::traits::{CycleTelemetry, FeeOracle, MintQuoter, MintSubmitter, PoolReader, TradeSubmitter};
use crate::types::{CycleInfo, ExecError, MintOutcome, PairEvent, PoolSnapshot, TradeReceipt};
use alloy::primitives::{Address, U256};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Initial market conditions for a simulation.
#[derive(Debug, Clone, Copy)]
pub struct SimParams {
    pub reserve_fct: U256,
    pub reserve_eth: U256,
    /// L1 base fee, wei per gas
    pub fee_wei: U256,
    /// FCT-wei credited per ETH-wei of data-gas burn, fp18
    pub mint_rate_fp18: U256,
}

struct SimState {
    reserve_fct: U256,
    reserve_eth: U256,
    fee_wei: U256,
    block: u64,
    minted_total: U256,
    next_id: u64,
    pending: HashMap<String, TradeReceipt>,
    last_settled: U256,
    fee_fail: bool,
    timeout_next: bool,
    cycle_info: CycleInfo,
}

pub struct SimChain {
    inner: Mutex<SimState>,
    mint_rate_fp18: U256,
    gas_multiplier_ppm: u64,
}

impl SimChain {
    pub fn new(params: SimParams, gas_multiplier_ppm: u64) -> Self {
        Self {
            inner: Mutex::new(SimState {
                reserve_fct: params.reserve_fct,
                reserve_eth: params.reserve_eth,
                fee_wei: params.fee_wei,
                block: 1,
                minted_total: U256::ZERO,
                next_id: 0,
                pending: HashMap::new(),
                last_settled: U256::ZERO,
                fee_fail: false,
                timeout_next: false,
                cycle_info: CycleInfo::default(),
            }),
            mint_rate_fp18: params.mint_rate_fp18,
            gas_multiplier_ppm,
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// One Arc, every seam.
    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            pool: self.clone(),
            fees: self.clone(),
            mint_quoter: self.clone(),
            trades: self.clone(),
            mints: self.clone(),
            telemetry: self.clone(),
        }
    }

    pub fn reserves(&self) -> (U256, U256) {
        let s = self.state();
        (s.reserve_fct, s.reserve_eth)
    }

    pub fn minted_total(&self) -> U256 {
        self.state().minted_total
    }

    /// Amount of the most recent trade confirmed through `poll_receipt`.
    pub fn last_settled_amount(&self) -> U256 {
        self.state().last_settled
    }

    /// The next submitted trade executes but its receipt times out, leaving
    /// it to be reconciled via `poll_receipt`.
    pub fn timeout_next_trade(&self) {
        self.state().timeout_next = true;
    }

    pub fn fail_fee_oracle(&self, fail: bool) {
        self.state().fee_fail = fail;
    }

    pub fn set_fee(&self, fee_wei: U256) {
        self.state().fee_wei = fee_wei;
    }

    pub fn set_cycle_info(&self, info: CycleInfo) {
        self.state().cycle_info = info;
    }
}

#[async_trait]
impl PoolReader for SimChain {
    async fn get_reserves(&self) -> Result<PoolSnapshot> {
        let s = self.state();
        Ok(PoolSnapshot {
            reserve_token: s.reserve_fct,
            reserve_base: s.reserve_eth,
            token0: Address::ZERO,
            token1: Address::ZERO,
            block: s.block,
        })
    }

    async fn recent_swap_events(&self, _from_block: u64) -> Result<Vec<PairEvent>> {
        // The sim has no event feed; quotes come from the reserve fallback
        Ok(Vec::new())
    }
}

#[async_trait]
impl FeeOracle for SimChain {
    async fn current_fee_level(&self) -> Result<U256> {
        let s = self.state();
        if s.fee_fail {
            bail!("simulated fee oracle outage");
        }
        Ok(s.fee_wei)
    }
}

#[async_trait]
impl MintQuoter for SimChain {
    async fn quote_mint_rate(&self) -> Result<U256> {
        Ok(self.mint_rate_fp18)
    }
}

#[async_trait]
impl MintSubmitter for SimChain {
    async fn submit_mint(&self, size_bytes: u64) -> Result<MintOutcome, ExecError> {
        let size_kb = u32::try_from(size_bytes / 1024)
            .map_err(|_| ExecError::Revert("mint payload too large".into()))?;
        let mut s = self.state();
        let est = mint::estimate(size_kb, s.fee_wei, self.gas_multiplier_ppm, self.mint_rate_fp18);
        s.minted_total += est.minted_fct;
        s.block += 1;
        Ok(MintOutcome {
            quantity_minted: est.minted_fct,
            cost_paid: est.burn_eth,
        })
    }
}

#[async_trait]
impl TradeSubmitter for SimChain {
    async fn submit_trade(
        &self,
        amount_in: U256,
        min_out: U256,
    ) -> Result<TradeReceipt, ExecError> {
        let mut s = self.state();
        let out = get_amount_out(amount_in, s.reserve_fct, s.reserve_eth);
        if out < min_out {
            return Err(ExecError::Revert(format!(
                "insufficient output: {} < {}",
                out, min_out
            )));
        }
        s.reserve_fct += amount_in;
        s.reserve_eth -= out;
        s.block += 1;
        s.next_id += 1;
        let receipt = TradeReceipt {
            id: format!("sim-{}", s.next_id),
            amount_in,
            amount_out: out,
            confirmed_at: chrono::Utc::now(),
        };
        if s.timeout_next {
            s.timeout_next = false;
            let id = receipt.id.clone();
            s.pending.insert(id.clone(), receipt);
            return Err(ExecError::ReceiptTimeout { id });
        }
        Ok(receipt)
    }

    async fn poll_receipt(&self, id: &str) -> Result<Option<TradeReceipt>, ExecError> {
        let mut s = self.state();
        match s.pending.remove(id) {
            Some(receipt) => {
                s.last_settled = receipt.amount_in;
                Ok(Some(receipt))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CycleTelemetry for SimChain {
    async fn cycle_info(&self) -> Result<CycleInfo> {
        Ok(self.state().cycle_info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fp18;

    fn chain() -> Arc<SimChain> {
        Arc::new(SimChain::new(
            SimParams {
                reserve_fct: U256::from(1_000_000u64) * fp18(),
                reserve_eth: U256::from(10u64) * fp18(),
                fee_wei: U256::from(1_000_000_000u64),
                mint_rate_fp18: fp18(),
            },
            1_500_000,
        ))
    }

    #[tokio::test]
    async fn test_trade_moves_reserves() {
        let c = chain();
        let amount = U256::from(50_000u64) * fp18();
        let receipt = c.submit_trade(amount, U256::ZERO).await.unwrap();

        let (fct, eth) = c.reserves();
        assert_eq!(fct, U256::from(1_050_000u64) * fp18());
        assert_eq!(eth, U256::from(10u64) * fp18() - receipt.amount_out);
    }

    #[tokio::test]
    async fn test_min_out_reverts() {
        let c = chain();
        let amount = U256::from(50_000u64) * fp18();
        let before = c.reserves();
        let err = c.submit_trade(amount, U256::from(1u64) * fp18()).await;
        assert!(matches!(err, Err(ExecError::Revert(_))));
        // Reverted trade leaves the pool untouched
        assert_eq!(c.reserves(), before);
    }

    #[tokio::test]
    async fn test_timeout_then_poll() {
        let c = chain();
        c.timeout_next_trade();
        let amount = U256::from(1_000u64) * fp18();
        let err = c.submit_trade(amount, U256::ZERO).await;
        let id = match err {
            Err(ExecError::ReceiptTimeout { id }) => id,
            other => panic!("unexpected {:?}", other),
        };

        let receipt = c.poll_receipt(&id).await.unwrap().unwrap();
        assert_eq!(receipt.amount_in, amount);
        assert_eq!(c.last_settled_amount(), amount);
        // A second poll finds nothing
        assert!(c.poll_receipt(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mint_credits_proportionally() {
        let c = chain();
        let outcome = c.submit_mint(100 * 1024).await.unwrap();
        assert!(!outcome.quantity_minted.is_zero());
        assert!(!outcome.cost_paid.is_zero());
        assert_eq!(c.minted_total(), outcome.quantity_minted);
    }
}
