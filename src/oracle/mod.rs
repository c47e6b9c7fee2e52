//! Price oracle
//!
//! Maintains a rolling window of pair events and derives the FCT/ETH rate
//! from the freshest reserve ratio, falling back to a direct reserve read
//! when the window is cold. A process-local EMA smooths the price reported
//! to the admission gate; the slicer always sees raw plan-time reserves.

use crate::traits::PoolReader;
use crate::types::{fp18, u256_to_f64, PairEvent, PairEventKind, PriceQuote, QuoteSource};
use alloy::primitives::U256;
use anyhow::{bail, Context, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, warn};

/// EMA smoothing factor for the reported market price.
const EMA_ALPHA: f64 = 0.2;

pub struct PriceOracle {
    pool: Arc<dyn PoolReader>,
    lookback: Duration,
    window: RwLock<VecDeque<PairEvent>>,
    /// Smoothed price in ETH-wei per FCT. f64 is fine here: the EMA feeds
    /// threshold checks with plenty of slack, never exact accounting.
    ema: Mutex<Option<f64>>,
    /// Highest block already pulled into the window
    last_block: Mutex<u64>,
}

impl PriceOracle {
    pub fn new(pool: Arc<dyn PoolReader>, lookback: Duration) -> Self {
        Self {
            pool,
            lookback,
            window: RwLock::new(VecDeque::new()),
            ema: Mutex::new(None),
            last_block: Mutex::new(0),
        }
    }

    /// Appends events to the rolling window, dropping everything older than
    /// the lookback horizon.
    pub async fn record_events(&self, events: Vec<PairEvent>) {
        let mut window = self.window.write().await;
        for ev in events {
            window.push_back(ev);
        }
        let cutoff = Instant::now().checked_sub(self.lookback);
        while window
            .front()
            .map(|e| cutoff.map_or(false, |c| e.observed_at < c))
            .unwrap_or(false)
        {
            window.pop_front();
        }
    }

    /// Pulls fresh pair events into the window. Failures propagate; the
    /// caller decides whether they are fatal.
    pub async fn warm(&self) -> Result<()> {
        let from = {
            let last = self.last_block.lock().await;
            *last + 1
        };
        let events = self
            .pool
            .recent_swap_events(from)
            .await
            .context("fetching pair events")?;
        if let Some(max_block) = events.iter().map(|e| e.block).max() {
            let mut last = self.last_block.lock().await;
            if max_block > *last {
                *last = max_block;
            }
        }
        self.record_events(events).await;
        Ok(())
    }

    /// Raw market quote: freshest event in the window, or a direct reserve
    /// read when the window is cold. Errors when neither yields a positive
    /// price; a quote of zero is never produced.
    pub async fn quote(&self) -> Result<PriceQuote> {
        let cutoff = Instant::now().checked_sub(self.lookback);
        {
            let window = self.window.read().await;
            // Newest event with a usable reserve ratio wins
            for ev in window.iter().rev() {
                let stale = cutoff.map_or(false, |c| ev.observed_at < c);
                if stale || ev.reserve_token.is_zero() {
                    continue;
                }
                let value = ev.reserve_base * fp18() / ev.reserve_token;
                if value.is_zero() {
                    continue;
                }
                let source = match ev.kind {
                    PairEventKind::Sync => QuoteSource::EventSync,
                    PairEventKind::Swap => QuoteSource::EventSwap,
                };
                return Ok(PriceQuote {
                    value_fp18: value,
                    source,
                    slippage_bps: None,
                });
            }
        }

        debug!("event window cold, reading reserves directly");
        let snapshot = self
            .pool
            .get_reserves()
            .await
            .context("reserve fallback read")?;
        match snapshot.spot_price_fp18() {
            Some(value) if !value.is_zero() => Ok(PriceQuote {
                value_fp18: value,
                source: QuoteSource::ReserveFallback,
                slippage_bps: None,
            }),
            _ => bail!("pool reserves yield no usable price"),
        }
    }

    /// EMA-smoothed market quote for the admission gate. Folds the current
    /// raw quote into the smoother and reports the smoothed value.
    pub async fn smoothed_quote(&self) -> Result<PriceQuote> {
        let raw = self.quote().await?;
        let observed = u256_to_f64(raw.value_fp18);

        let mut ema = self.ema.lock().await;
        let smoothed = match *ema {
            Some(prev) => EMA_ALPHA * observed + (1.0 - EMA_ALPHA) * prev,
            None => observed,
        };
        *ema = Some(smoothed);

        Ok(PriceQuote {
            value_fp18: U256::from(smoothed.round().max(1.0) as u128),
            source: raw.source,
            slippage_bps: raw.slippage_bps,
        })
    }

    /// Background window warmer. Failures are logged and retried on the next
    /// tick; they never stop the task or touch any state beyond the window.
    pub fn spawn_warmer(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        if let Err(e) = self.warm().await {
                            warn!(error = %e, "price window warm failed");
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PoolSnapshot;
    use alloy::primitives::Address;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubPool {
        reserves_ok: AtomicBool,
    }

    #[async_trait]
    impl PoolReader for StubPool {
        async fn get_reserves(&self) -> Result<PoolSnapshot> {
            if !self.reserves_ok.load(Ordering::SeqCst) {
                bail!("rpc down");
            }
            Ok(PoolSnapshot {
                reserve_token: U256::from(1_000_000u64) * fp18(),
                reserve_base: U256::from(10u64) * fp18(),
                token0: Address::ZERO,
                token1: Address::ZERO,
                block: 100,
            })
        }

        async fn recent_swap_events(&self, _from_block: u64) -> Result<Vec<PairEvent>> {
            Ok(Vec::new())
        }
    }

    fn oracle(reserves_ok: bool) -> PriceOracle {
        PriceOracle::new(
            Arc::new(StubPool {
                reserves_ok: AtomicBool::new(reserves_ok),
            }),
            Duration::from_secs(60),
        )
    }

    fn event(kind: PairEventKind, reserve_base_eth: u64) -> PairEvent {
        PairEvent {
            kind,
            reserve_token: U256::from(1_000_000u64) * fp18(),
            reserve_base: U256::from(reserve_base_eth) * fp18(),
            block: 1,
            observed_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_quote_prefers_freshest_event() {
        let o = oracle(false);
        o.record_events(vec![
            event(PairEventKind::Sync, 10),
            event(PairEventKind::Swap, 20),
        ])
        .await;

        let q = o.quote().await.unwrap();
        assert_eq!(q.source, QuoteSource::EventSwap);
        // 20 ETH / 1M FCT = 2e13 wei per FCT
        assert_eq!(q.value_fp18, U256::from(20_000_000_000_000u64));
    }

    #[tokio::test]
    async fn test_quote_falls_back_to_reserves() {
        let o = oracle(true);
        let q = o.quote().await.unwrap();
        assert_eq!(q.source, QuoteSource::ReserveFallback);
        assert_eq!(q.value_fp18, U256::from(10_000_000_000_000u64));
    }

    #[tokio::test]
    async fn test_quote_errors_when_all_sources_fail() {
        let o = oracle(false);
        assert!(o.quote().await.is_err());
    }

    #[tokio::test]
    async fn test_ema_seeds_then_smooths() {
        let o = oracle(false);
        o.record_events(vec![event(PairEventKind::Sync, 10)]).await;
        let first = o.smoothed_quote().await.unwrap();
        // First observation seeds the EMA unchanged
        assert_eq!(first.value_fp18, U256::from(10_000_000_000_000u64));

        o.record_events(vec![event(PairEventKind::Sync, 20)]).await;
        let second = o.smoothed_quote().await.unwrap();
        // 0.2 * 2e13 + 0.8 * 1e13 = 1.2e13
        assert_eq!(second.value_fp18, U256::from(12_000_000_000_000u64));
    }

    #[tokio::test]
    async fn test_stale_events_are_ignored() {
        let o = PriceOracle::new(
            Arc::new(StubPool {
                reserves_ok: AtomicBool::new(true),
            }),
            Duration::from_millis(10),
        );
        o.record_events(vec![event(PairEventKind::Sync, 20)]).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Event aged out of the lookback: reserve fallback wins
        let q = o.quote().await.unwrap();
        assert_eq!(q.source, QuoteSource::ReserveFallback);
    }
}
