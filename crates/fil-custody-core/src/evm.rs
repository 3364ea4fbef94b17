//! EVM transaction pipeline: EIP-1559 transactions signed through custody.

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address as EthAddress, Bytes, PrimitiveSignature, TxKind, U256};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::domain::{ChainReceipt, EvmReceipt, KeyId};
use crate::error::{CustodyError, DecodingError};
use crate::ports::{CustodyPort, EvmRpcPort};
use crate::signature::CompactSignature;
use crate::signer::CustodySigner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmSubmission {
    pub from: EthAddress,
    pub receipt: EvmReceipt,
}

pub struct EvmPipeline<'a, C: CustodyPort, E: EvmRpcPort> {
    signer: &'a CustodySigner<C>,
    rpc: &'a E,
    config: &'a PipelineConfig,
}

impl<'a, C: CustodyPort, E: EvmRpcPort> EvmPipeline<'a, C, E> {
    pub fn new(signer: &'a CustodySigner<C>, rpc: &'a E, config: &'a PipelineConfig) -> Self {
        Self {
            signer,
            rpc,
            config,
        }
    }

    /// Builds and signs the transaction, returning its EIP-2718 encoding.
    pub async fn prepare(
        &self,
        key_id: &KeyId,
        to: EthAddress,
        value: U256,
        input: Bytes,
    ) -> Result<(EthAddress, Bytes), CustodyError> {
        let from = self.signer.evm_address(key_id).await?;
        let nonce = self.rpc.transaction_count(from).await?;
        let fees = self.rpc.fee_data().await?;
        debug!(from = %from, nonce, max_fee = fees.max_fee_per_gas, "evm transaction priced");

        let tx = TxEip1559 {
            chain_id: self.config.evm_chain_id,
            nonce,
            gas_limit: self.config.evm_gas_limit,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            to: TxKind::Call(to),
            value,
            access_list: Default::default(),
            input,
        };

        let digest = tx.signature_hash();
        let compact = self.signer.sign(key_id, &digest.0).await?;
        let signed = tx.into_signed(to_evm_signature(&compact)?);
        let raw = TxEnvelope::from(signed).encoded_2718();
        Ok((from, raw.into()))
    }

    pub async fn submit(
        &self,
        key_id: &KeyId,
        to: EthAddress,
        value: U256,
        input: Bytes,
    ) -> Result<EvmSubmission, CustodyError> {
        let (from, raw) = self.prepare(key_id, to, value, input).await?;
        let hash = self.rpc.send_raw_transaction(raw).await?;
        info!(tx_hash = %hash, from = %from, to = %to, "evm transaction sent");

        let receipt = self.rpc.wait_for_receipt(hash).await?;
        if !receipt.status {
            warn!(tx_hash = %hash, "evm transaction reverted");
            return Err(CustodyError::reverted("status 0", ChainReceipt::Evm(receipt)));
        }
        info!(tx_hash = %hash, gas_used = receipt.gas_used, "evm transaction mined");
        Ok(EvmSubmission { from, receipt })
    }
}

/// EVM signatures carry only the y-parity bit.
pub fn to_evm_signature(compact: &CompactSignature) -> Result<PrimitiveSignature, DecodingError> {
    if compact.recovery_id > 1 {
        return Err(DecodingError::MalformedSignature(format!(
            "recovery id {} cannot be expressed as y-parity",
            compact.recovery_id
        )));
    }
    Ok(PrimitiveSignature::new(
        U256::from_be_bytes(compact.r),
        U256::from_be_bytes(compact.s),
        compact.recovery_id == 1,
    ))
}
