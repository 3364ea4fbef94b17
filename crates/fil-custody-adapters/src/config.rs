use std::str::FromStr;
use std::time::Duration;

use fil_custody_core::{Network, PipelineConfig};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {key}={value:?}: {reason}")]
pub struct ConfigError {
    pub key: String,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustodyMode {
    /// AWS KMS, or a KMS-compatible service at `kms_endpoint`.
    Kms,
    /// In-process keys. Development only.
    Local,
}

impl FromStr for CustodyMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "kms" => Ok(Self::Kms),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown custody mode {other:?}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CustodyConfig {
    pub network: Network,
    pub lotus_rpc_url: String,
    pub lotus_token: Option<String>,
    pub evm_rpc_url: String,
    pub evm_chain_id: u64,
    pub evm_gas_limit: u64,
    pub custody_mode: CustodyMode,
    /// Overrides the regional KMS endpoint (VPC endpoints, local KMS).
    pub kms_endpoint: Option<String>,
    pub kms_region: String,
    pub rpc_timeout_ms: u64,
    pub receipt_poll_interval_ms: u64,
    pub receipt_timeout_ms: u64,
    pub premium_blocks: u64,
    pub wait_confidence: u64,
}

impl Default for CustodyConfig {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        Self {
            network: pipeline.network,
            lotus_rpc_url: "https://api.calibration.node.glif.io/rpc/v1".to_owned(),
            lotus_token: None,
            evm_rpc_url: "https://api.calibration.node.glif.io/rpc/v1".to_owned(),
            evm_chain_id: pipeline.evm_chain_id,
            evm_gas_limit: pipeline.evm_gas_limit,
            custody_mode: CustodyMode::Kms,
            kms_endpoint: None,
            kms_region: "us-east-1".to_owned(),
            rpc_timeout_ms: 30_000,
            receipt_poll_interval_ms: 2_000,
            receipt_timeout_ms: 10 * 60 * 1000,
            premium_blocks: pipeline.premium_blocks,
            wait_confidence: pipeline.wait_confidence,
        }
    }
}

impl CustodyConfig {
    /// Reads `FIL_CUSTODY_*` variables. Unset variables keep their defaults;
    /// a variable that is set but does not parse is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);

        Ok(Self {
            network: parsed(&lookup, "FIL_CUSTODY_NETWORK", defaults.network)?,
            lotus_rpc_url: string("FIL_CUSTODY_LOTUS_URL", defaults.lotus_rpc_url),
            lotus_token: lookup("FIL_CUSTODY_LOTUS_TOKEN").filter(|token| !token.is_empty()),
            evm_rpc_url: string("FIL_CUSTODY_EVM_URL", defaults.evm_rpc_url),
            evm_chain_id: parsed(&lookup, "FIL_CUSTODY_EVM_CHAIN_ID", defaults.evm_chain_id)?,
            evm_gas_limit: parsed(&lookup, "FIL_CUSTODY_EVM_GAS_LIMIT", defaults.evm_gas_limit)?,
            custody_mode: parsed(&lookup, "FIL_CUSTODY_MODE", defaults.custody_mode)?,
            kms_endpoint: lookup("FIL_CUSTODY_KMS_ENDPOINT").filter(|url| !url.is_empty()),
            kms_region: string("FIL_CUSTODY_KMS_REGION", defaults.kms_region),
            rpc_timeout_ms: parsed(&lookup, "FIL_CUSTODY_RPC_TIMEOUT_MS", defaults.rpc_timeout_ms)?,
            receipt_poll_interval_ms: parsed(
                &lookup,
                "FIL_CUSTODY_RECEIPT_POLL_MS",
                defaults.receipt_poll_interval_ms,
            )?,
            receipt_timeout_ms: parsed(
                &lookup,
                "FIL_CUSTODY_RECEIPT_TIMEOUT_MS",
                defaults.receipt_timeout_ms,
            )?,
            premium_blocks: parsed(&lookup, "FIL_CUSTODY_PREMIUM_BLOCKS", defaults.premium_blocks)?,
            wait_confidence: parsed(
                &lookup,
                "FIL_CUSTODY_WAIT_CONFIDENCE",
                defaults.wait_confidence,
            )?,
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            network: self.network,
            evm_chain_id: self.evm_chain_id,
            evm_gas_limit: self.evm_gas_limit,
            premium_blocks: self.premium_blocks,
            wait_confidence: self.wait_confidence,
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_millis(self.receipt_timeout_ms)
    }
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError {
            key: key.to_owned(),
            reason: e.to_string(),
            value: raw,
        }),
    }
}
