//! Ethereum JSON-RPC (`eth_*` methods) as served by FEVM nodes.

use std::time::Duration;

use alloy::primitives::{Address as EthAddress, Bytes, B256, U256, U64};
use async_trait::async_trait;
use fil_custody_core::{EvmFeeData, EvmLog, EvmReceipt, EvmRpcPort, PortError};
use serde::Deserialize;
use serde_json::json;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::config::CustodyConfig;
use crate::rpc::JsonRpcClient;

pub struct EvmRpcAdapter {
    client: JsonRpcClient,
    poll_interval: Duration,
    receipt_timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlock {
    #[serde(default)]
    base_fee_per_gas: Option<U256>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: EthAddress,
    topics: Vec<B256>,
    data: Bytes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    #[serde(default)]
    status: Option<U64>,
    gas_used: U64,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

impl From<RpcReceipt> for EvmReceipt {
    fn from(receipt: RpcReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            status: receipt.status.is_some_and(|status| status == U64::from(1)),
            gas_used: receipt.gas_used.to::<u64>(),
            logs: receipt
                .logs
                .into_iter()
                .map(|log| EvmLog {
                    address: log.address,
                    topics: log.topics,
                    data: log.data,
                })
                .collect(),
        }
    }
}

impl EvmRpcAdapter {
    pub fn new(client: JsonRpcClient, poll_interval: Duration, receipt_timeout: Duration) -> Self {
        Self {
            client,
            poll_interval,
            receipt_timeout,
        }
    }

    pub fn from_config(config: &CustodyConfig) -> Result<Self, PortError> {
        Ok(Self::new(
            JsonRpcClient::new(config.evm_rpc_url.clone(), None, config.rpc_timeout())?,
            config.receipt_poll_interval(),
            config.receipt_timeout(),
        ))
    }
}

#[async_trait]
impl EvmRpcPort for EvmRpcAdapter {
    async fn transaction_count(&self, address: EthAddress) -> Result<u64, PortError> {
        let count: U64 = self
            .client
            .call("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        Ok(count.to::<u64>())
    }

    /// `maxFee = 2 * baseFee + priority`, so the transaction stays valid
    /// through a few full blocks.
    async fn fee_data(&self) -> Result<EvmFeeData, PortError> {
        let priority: U256 = self.client.call("eth_maxPriorityFeePerGas", json!([])).await?;
        let block: Option<RpcBlock> = self
            .client
            .call("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        let base_fee = block
            .and_then(|block| block.base_fee_per_gas)
            .ok_or_else(|| PortError::Decode("latest block has no base fee".to_owned()))?;

        let max_fee = base_fee
            .checked_mul(U256::from(2))
            .and_then(|doubled| doubled.checked_add(priority))
            .ok_or_else(|| PortError::Decode(format!("max fee overflows: base fee {base_fee}")))?;
        Ok(EvmFeeData {
            max_fee_per_gas: fee_u128("max fee per gas", max_fee)?,
            max_priority_fee_per_gas: fee_u128("priority fee", priority)?,
        })
    }

    async fn call(&self, to: EthAddress, data: Bytes) -> Result<Bytes, PortError> {
        self.client
            .call("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, PortError> {
        self.client.call("eth_sendRawTransaction", json!([raw])).await
    }

    async fn wait_for_receipt(&self, hash: B256) -> Result<EvmReceipt, PortError> {
        let deadline = Instant::now() + self.receipt_timeout;
        loop {
            let receipt: Option<RpcReceipt> = self
                .client
                .call("eth_getTransactionReceipt", json!([hash]))
                .await?;
            if let Some(receipt) = receipt {
                return Ok(receipt.into());
            }
            if Instant::now() >= deadline {
                return Err(PortError::Timeout(format!("receipt for {hash}")));
            }
            debug!(tx_hash = %hash, "receipt pending");
            sleep(self.poll_interval).await;
        }
    }
}

fn fee_u128(name: &str, value: U256) -> Result<u128, PortError> {
    u128::try_from(value).map_err(|_| PortError::Decode(format!("{name} {value} exceeds u128")))
}
