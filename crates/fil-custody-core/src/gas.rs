use num_bigint::BigUint;
use tracing::debug;

use crate::error::CustodyError;
use crate::message::UnsignedMessage;
use crate::ports::NativeRpcPort;

/// A message with gas fields filled in, plus its fee ceilings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedMessage {
    pub message: UnsignedMessage,
    /// `gas_limit * gas_fee_cap`
    pub total_fee: BigUint,
    /// `gas_limit * (gas_fee_cap + gas_premium)`
    pub premium_total_fee: BigUint,
}

pub struct GasEstimator<'a, N: NativeRpcPort> {
    rpc: &'a N,
    premium_blocks: u64,
}

impl<'a, N: NativeRpcPort> GasEstimator<'a, N> {
    pub fn new(rpc: &'a N, premium_blocks: u64) -> Self {
        Self {
            rpc,
            premium_blocks,
        }
    }

    pub async fn estimate(&self, message: UnsignedMessage) -> Result<PricedMessage, CustodyError> {
        let estimate = self.rpc.estimate_message_gas(&message).await?;
        let premium = self
            .rpc
            .estimate_gas_premium(self.premium_blocks, &message.from, estimate.gas_limit)
            .await?;

        let (total_fee, premium_total_fee) =
            fee_projection(estimate.gas_limit, &estimate.gas_fee_cap, &premium)?;
        debug!(
            gas_limit = estimate.gas_limit,
            gas_fee_cap = %estimate.gas_fee_cap,
            gas_premium = %premium,
            total_fee = %total_fee,
            "gas estimated"
        );

        let message = UnsignedMessage {
            gas_limit: estimate.gas_limit,
            gas_fee_cap: estimate.gas_fee_cap,
            gas_premium: premium,
            ..message
        };
        Ok(PricedMessage {
            message,
            total_fee,
            premium_total_fee,
        })
    }
}

/// Returns `(gas_limit * fee_cap, gas_limit * (fee_cap + premium))`.
pub fn fee_projection(
    gas_limit: i64,
    gas_fee_cap: &BigUint,
    gas_premium: &BigUint,
) -> Result<(BigUint, BigUint), CustodyError> {
    let limit = u64::try_from(gas_limit)
        .map(BigUint::from)
        .map_err(|_| CustodyError::InvalidRequest(format!("negative gas limit {gas_limit}")))?;
    let total = &limit * gas_fee_cap;
    let with_premium = &limit * (gas_fee_cap + gas_premium);
    Ok((total, with_premium))
}
