//! AWS KMS custody. Keys are `ECC_SECG_P256K1` and are asked to sign 32-byte
//! digests as given (`MessageType::Digest`).

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_kms::config::timeout::TimeoutConfig;
use aws_sdk_kms::config::Region;
use aws_sdk_kms::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::{MessageType, SigningAlgorithmSpec};
use aws_sdk_kms::Client;
use fil_custody_core::{CustodyPort, KeyId, PortError};
use tracing::debug;

use crate::config::CustodyConfig;

const SECP256K1_KEY_SPEC: &str = "ECC_SECG_P256K1";

/// Service errors that mean "try again later" rather than "this request is wrong".
const TRANSIENT_CODES: &[&str] = &[
    "DependencyTimeoutException",
    "KMSInternalException",
    "KeyUnavailableException",
    "ThrottlingException",
];

pub struct KmsCustodyAdapter {
    client: Client,
}

impl KmsCustodyAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Credentials come from the default AWS provider chain (environment,
    /// profile, web identity, instance metadata).
    pub async fn from_config(config: &CustodyConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.kms_region.clone()))
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(config.rpc_timeout())
                    .build(),
            );
        if let Some(endpoint) = &config.kms_endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        Self::new(Client::new(&loader.load().await))
    }
}

#[async_trait]
impl CustodyPort for KmsCustodyAdapter {
    async fn public_key(&self, key_id: &KeyId) -> Result<Vec<u8>, PortError> {
        let output = self
            .client
            .get_public_key()
            .key_id(key_id.0.as_str())
            .send()
            .await
            .map_err(|e| map_sdk_error("GetPublicKey", e))?;
        if let Some(spec) = output.key_spec() {
            if spec.as_str() != SECP256K1_KEY_SPEC {
                return Err(PortError::Decode(format!(
                    "key {key_id} has spec {}, expected {SECP256K1_KEY_SPEC}",
                    spec.as_str()
                )));
            }
        }
        output
            .public_key
            .map(Blob::into_inner)
            .ok_or_else(|| PortError::Decode(format!("GetPublicKey: no public key for {key_id}")))
    }

    async fn sign_digest(&self, key_id: &KeyId, digest: &[u8; 32]) -> Result<Vec<u8>, PortError> {
        let output = self
            .client
            .sign()
            .key_id(key_id.0.as_str())
            .message(Blob::new(digest.to_vec()))
            .message_type(MessageType::Digest)
            .signing_algorithm(SigningAlgorithmSpec::EcdsaSha256)
            .send()
            .await
            .map_err(|e| map_sdk_error("Sign", e))?;
        debug!(key_id = %key_id, "custody signature received");
        output
            .signature
            .map(Blob::into_inner)
            .ok_or_else(|| PortError::Decode(format!("Sign: no signature for {key_id}")))
    }
}

fn map_sdk_error<E>(operation: &str, err: SdkError<E>) -> PortError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let detail = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) => PortError::Timeout(format!("{operation}: {detail}")),
        SdkError::ServiceError(service) => {
            let status = service.raw().status();
            let code = service.err().code().unwrap_or_default();
            let message = service.err().message().unwrap_or_default();
            if code == "NotFoundException" {
                PortError::NotFound(format!("{operation}: {message}"))
            } else if status.is_server_error() || TRANSIENT_CODES.contains(&code) {
                PortError::Transport(format!("{operation}: {code}: {message}"))
            } else {
                PortError::Rpc {
                    code: i64::from(status.as_u16()),
                    message: format!("{code}: {message}"),
                }
            }
        }
        _ => PortError::Transport(format!("{operation}: {detail}")),
    }
}
