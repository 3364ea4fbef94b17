//! Native message pipeline: nonce, gas, serialize, digest, sign, push, wait.

use num_bigint::BigUint;
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::config::PipelineConfig;
use crate::domain::{ChainReceipt, KeyId, NativeReceipt};
use crate::error::CustodyError;
use crate::gas::{GasEstimator, PricedMessage};
use crate::message::{SignedMessage, UnsignedMessage};
use crate::ports::{CustodyPort, NativeRpcPort};
use crate::signer::CustodySigner;

/// What to send; the pipeline supplies sender, nonce and gas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub to: Address,
    pub value: BigUint,
    pub method: u64,
    pub params: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSubmission {
    pub from: Address,
    pub priced: PricedMessage,
    pub receipt: NativeReceipt,
}

pub struct NativePipeline<'a, C: CustodyPort, N: NativeRpcPort> {
    signer: &'a CustodySigner<C>,
    rpc: &'a N,
    config: &'a PipelineConfig,
}

impl<'a, C: CustodyPort, N: NativeRpcPort> NativePipeline<'a, C, N> {
    pub fn new(signer: &'a CustodySigner<C>, rpc: &'a N, config: &'a PipelineConfig) -> Self {
        Self {
            signer,
            rpc,
            config,
        }
    }

    /// Builds, prices and signs a message without pushing it.
    pub async fn prepare(
        &self,
        key_id: &KeyId,
        draft: MessageDraft,
    ) -> Result<(PricedMessage, SignedMessage), CustodyError> {
        let from = self.signer.native_address(key_id, self.config.network).await?;
        let nonce = self.rpc.nonce(&from).await?;
        debug!(from = %from, nonce, "native nonce fetched");

        let draft = UnsignedMessage::new(from, draft.to, nonce, draft.value, draft.method, draft.params);
        let priced = GasEstimator::new(self.rpc, self.config.premium_blocks)
            .estimate(draft)
            .await?;

        let digest = priced.message.signing_digest()?;
        let signature = self.signer.sign(key_id, &digest).await?;
        let signed = SignedMessage::new(priced.message.clone(), &signature);
        Ok((priced, signed))
    }

    pub async fn submit(
        &self,
        key_id: &KeyId,
        draft: MessageDraft,
    ) -> Result<NativeSubmission, CustodyError> {
        let (priced, signed) = self.prepare(key_id, draft).await?;
        let local_cid = signed.content_id()?;

        let cid = self.rpc.push(&signed).await?;
        if cid != local_cid {
            warn!(node = %cid, local = %local_cid, "node returned a different message cid");
        }
        info!(
            cid = %cid,
            from = %priced.message.from,
            to = %priced.message.to,
            method = priced.message.method,
            nonce = priced.message.nonce,
            "native message pushed"
        );

        let receipt = self.rpc.wait(&cid, self.config.wait_confidence).await?;
        if receipt.exit_code != 0 {
            warn!(cid = %cid, exit_code = receipt.exit_code, "native message failed");
            let reason = format!("exit code {}", receipt.exit_code);
            return Err(CustodyError::reverted(reason, ChainReceipt::Native(receipt)));
        }
        info!(cid = %cid, gas_used = receipt.gas_used, "native message included");

        Ok(NativeSubmission {
            from: priced.message.from.clone(),
            priced,
            receipt,
        })
    }
}
