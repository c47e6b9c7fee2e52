//! Mint-cycle telemetry over HTTP
//!
//! Optional JSON endpoint reporting how far the current issuance period has
//! progressed. The feed is best-effort: the engine treats failures as
//! missing data and the gate's cycle criteria pass open.

use crate::traits::CycleTelemetry;
use crate::types::{CycleInfo, PPM};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Issuance period length in L1 blocks, used when the feed only reports
/// elapsed blocks.
const CYCLE_LENGTH_BLOCKS: u64 = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CycleInfoWire {
    /// Fraction of the cycle cap used, 0..1
    progress: Option<f64>,
    minted: Option<f64>,
    target: Option<f64>,
    blocks_left: Option<u64>,
    blocks_elapsed: Option<u64>,
}

fn convert(wire: CycleInfoWire) -> CycleInfo {
    let progress = wire.progress.or_else(|| match (wire.minted, wire.target) {
        (Some(m), Some(t)) if t > 0.0 => Some(m / t),
        _ => None,
    });
    let progress_ppm = progress
        .filter(|p| p.is_finite())
        .map(|p| (p.clamp(0.0, 1.0) * PPM as f64).round() as u64);

    let blocks_left = wire.blocks_left.or_else(|| {
        wire.blocks_elapsed
            .map(|e| CYCLE_LENGTH_BLOCKS.saturating_sub(e))
    });

    CycleInfo {
        progress_ppm,
        blocks_left,
    }
}

pub struct HttpCycleTelemetry {
    client: reqwest::Client,
    url: String,
}

impl HttpCycleTelemetry {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building telemetry http client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CycleTelemetry for HttpCycleTelemetry {
    async fn cycle_info(&self) -> Result<CycleInfo> {
        let wire: CycleInfoWire = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("cycle telemetry request")?
            .error_for_status()
            .context("cycle telemetry status")?
            .json()
            .await
            .context("cycle telemetry body")?;
        Ok(convert(wire))
    }
}
