use serde::{Deserialize, Serialize};

use crate::address::Network;

/// Chain parameters fixed at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub network: Network,
    pub evm_chain_id: u64,
    pub evm_gas_limit: u64,
    /// Look-back window for `GasEstimateGasPremium`.
    pub premium_blocks: u64,
    /// Tipsets to wait after inclusion before a native receipt is final.
    pub wait_confidence: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            evm_chain_id: 314_159,
            evm_gas_limit: 30_000_000,
            premium_blocks: 10,
            wait_confidence: 1,
        }
    }
}
