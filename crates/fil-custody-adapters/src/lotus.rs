//! Lotus JSON-RPC (`Filecoin.*` methods).

use std::str::FromStr;

use async_trait::async_trait;
use fil_custody_core::message::{params_from_base64, params_to_base64};
use fil_custody_core::{
    Address, GasEstimate, NativeReceipt, NativeRpcPort, PortError, SignedMessage, UnsignedMessage,
};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::CustodyConfig;
use crate::rpc::JsonRpcClient;

/// Lotus `StateWaitMsg` look-back limit meaning "no limit".
const LOOKBACK_NO_LIMIT: i64 = -1;

pub struct LotusRpcAdapter {
    client: JsonRpcClient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LotusMessage {
    pub version: u64,
    pub to: String,
    pub from: String,
    pub nonce: u64,
    pub value: String,
    pub gas_limit: i64,
    pub gas_fee_cap: String,
    pub gas_premium: String,
    pub method: u64,
    #[serde(default)]
    pub params: Option<String>,
}

impl From<&UnsignedMessage> for LotusMessage {
    fn from(message: &UnsignedMessage) -> Self {
        Self {
            version: message.version,
            to: message.to.to_string(),
            from: message.from.to_string(),
            nonce: message.nonce,
            value: message.value.to_string(),
            gas_limit: message.gas_limit,
            gas_fee_cap: message.gas_fee_cap.to_string(),
            gas_premium: message.gas_premium.to_string(),
            method: message.method,
            params: Some(params_to_base64(&message.params)),
        }
    }
}

impl TryFrom<LotusMessage> for UnsignedMessage {
    type Error = PortError;

    fn try_from(message: LotusMessage) -> Result<Self, Self::Error> {
        Ok(Self {
            version: message.version,
            to: parse_address(&message.to)?,
            from: parse_address(&message.from)?,
            nonce: message.nonce,
            value: parse_amount(&message.value)?,
            gas_limit: message.gas_limit,
            gas_fee_cap: parse_amount(&message.gas_fee_cap)?,
            gas_premium: parse_amount(&message.gas_premium)?,
            method: message.method,
            params: match message.params {
                Some(encoded) => params_from_base64(&encoded)
                    .map_err(|e| PortError::Decode(e.to_string()))?,
                None => Vec::new(),
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LotusSignature {
    #[serde(rename = "Type")]
    pub sig_type: u8,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LotusSignedMessage {
    pub message: LotusMessage,
    pub signature: LotusSignature,
}

impl From<&SignedMessage> for LotusSignedMessage {
    fn from(signed: &SignedMessage) -> Self {
        Self {
            message: LotusMessage::from(signed.message()),
            signature: LotusSignature {
                sig_type: signed.signature().sig_type as u8,
                data: params_to_base64(&signed.signature().data),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CidJson {
    #[serde(rename = "/")]
    pub cid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LotusReceipt {
    pub exit_code: i64,
    #[serde(default)]
    pub r#return: Option<String>,
    pub gas_used: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LotusMsgLookup {
    pub message: CidJson,
    pub receipt: LotusReceipt,
    #[serde(default)]
    pub height: i64,
}

impl LotusRpcAdapter {
    pub fn new(client: JsonRpcClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &CustodyConfig) -> Result<Self, PortError> {
        Ok(Self::new(JsonRpcClient::new(
            config.lotus_rpc_url.clone(),
            config.lotus_token.clone(),
            config.rpc_timeout(),
        )?))
    }
}

#[async_trait]
impl NativeRpcPort for LotusRpcAdapter {
    async fn nonce(&self, address: &Address) -> Result<u64, PortError> {
        self.client
            .call("Filecoin.MpoolGetNonce", json!([address.to_string()]))
            .await
    }

    async fn estimate_message_gas(&self, message: &UnsignedMessage) -> Result<GasEstimate, PortError> {
        let estimated: LotusMessage = self
            .client
            .call(
                "Filecoin.GasEstimateMessageGas",
                json!([LotusMessage::from(message), { "MaxFee": "0" }, Value::Null]),
            )
            .await?;
        Ok(GasEstimate {
            gas_limit: estimated.gas_limit,
            gas_fee_cap: parse_amount(&estimated.gas_fee_cap)?,
        })
    }

    async fn estimate_gas_premium(
        &self,
        blocks: u64,
        from: &Address,
        gas_limit: i64,
    ) -> Result<BigUint, PortError> {
        let premium: String = self
            .client
            .call(
                "Filecoin.GasEstimateGasPremium",
                json!([blocks, from.to_string(), gas_limit, Value::Null]),
            )
            .await?;
        parse_amount(&premium)
    }

    async fn lookup_id(&self, address: &Address) -> Result<Address, PortError> {
        let id: String = self
            .client
            .call("Filecoin.StateLookupID", json!([address.to_string(), Value::Null]))
            .await?;
        parse_address(&id)
    }

    async fn push(&self, message: &SignedMessage) -> Result<String, PortError> {
        let cid: CidJson = self
            .client
            .call("Filecoin.MpoolPush", json!([LotusSignedMessage::from(message)]))
            .await?;
        Ok(cid.cid)
    }

    async fn wait(&self, cid: &str, confidence: u64) -> Result<NativeReceipt, PortError> {
        let lookup: Option<LotusMsgLookup> = self
            .client
            .call(
                "Filecoin.StateWaitMsg",
                json!([{ "/": cid }, confidence, LOOKBACK_NO_LIMIT, true]),
            )
            .await?;
        let lookup = lookup.ok_or_else(|| PortError::NotFound(format!("message {cid}")))?;
        let return_data = match lookup.receipt.r#return {
            Some(encoded) => {
                params_from_base64(&encoded).map_err(|e| PortError::Decode(e.to_string()))?
            }
            None => Vec::new(),
        };
        Ok(NativeReceipt {
            cid: lookup.message.cid,
            exit_code: lookup.receipt.exit_code,
            return_data,
            gas_used: lookup.receipt.gas_used,
        })
    }
}

fn parse_address(value: &str) -> Result<Address, PortError> {
    Address::decode(value).map_err(|e| PortError::Decode(format!("address {value:?}: {e}")))
}

fn parse_amount(value: &str) -> Result<BigUint, PortError> {
    BigUint::from_str(value).map_err(|e| PortError::Decode(format!("amount {value:?}: {e}")))
}
