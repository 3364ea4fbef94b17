use thiserror::Error;

use crate::address::AddressError;
use crate::domain::{ChainReceipt, ProposalState};
use crate::ports::PortError;

/// Malformed input that can never succeed on retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodingError {
    #[error("malformed address: {0}")]
    Address(AddressError),
    #[error("malformed bignum: {0}")]
    MalformedBigNum(String),
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    #[error("malformed public key: {0}")]
    MalformedPublicKey(String),
    #[error("malformed params: {0}")]
    MalformedParams(String),
    #[error("malformed return value: {0}")]
    MalformedReturn(String),
}

/// Broad failure family, used by callers to decide what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller asked for something that cannot be built or signed.
    InvalidRequest,
    /// A cryptographic or checksum check failed.
    Integrity,
    /// A remote dependency could not be reached. Retrying may help.
    Unreachable,
    /// The chain accepted the message but the actor or contract refused it.
    ChainRejected,
}

#[derive(Debug, Error)]
pub enum CustodyError {
    #[error(transparent)]
    Decoding(#[from] DecodingError),
    #[error("address checksum mismatch")]
    ChecksumMismatch,
    #[error("unsupported address protocol: {0}")]
    UnsupportedProtocol(String),
    #[error("signature recovery failed: no recovery id over digest {digest} yields public key {public_key}")]
    RecoveryFailure { digest: String, public_key: String },
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(#[from] PortError),
    #[error("execution reverted ({reason}): {receipt}")]
    ExecutionReverted {
        reason: String,
        receipt: Box<ChainReceipt>,
        /// Proposal state after a phase whose message still changed the
        /// multisig, such as an approval that fell short of the threshold.
        proposal: Option<Box<ProposalState>>,
    },
    #[error("{0}")]
    IllegalTransition(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("encoding failed: {0}")]
    Encoding(String),
}

impl CustodyError {
    pub fn reverted(reason: impl Into<String>, receipt: ChainReceipt) -> Self {
        Self::ExecutionReverted {
            reason: reason.into(),
            receipt: Box::new(receipt),
            proposal: None,
        }
    }

    pub fn reverted_with_proposal(
        reason: impl Into<String>,
        receipt: ChainReceipt,
        proposal: ProposalState,
    ) -> Self {
        Self::ExecutionReverted {
            reason: reason.into(),
            receipt: Box::new(receipt),
            proposal: Some(Box::new(proposal)),
        }
    }

    /// The updated proposal carried by a revert, if the phase still landed.
    pub fn proposal(&self) -> Option<&ProposalState> {
        match self {
            Self::ExecutionReverted {
                proposal: Some(proposal),
                ..
            } => Some(proposal),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decoding(_) | Self::InvalidRequest(_) | Self::IllegalTransition(_) => {
                ErrorKind::InvalidRequest
            }
            Self::UnsupportedProtocol(_) | Self::Encoding(_) => ErrorKind::InvalidRequest,
            Self::ChecksumMismatch | Self::RecoveryFailure { .. } => ErrorKind::Integrity,
            Self::RemoteUnavailable(port) => match port {
                PortError::Rpc { .. } => ErrorKind::ChainRejected,
                PortError::Decode(_) => ErrorKind::Integrity,
                _ => ErrorKind::Unreachable,
            },
            Self::ExecutionReverted { .. } => ErrorKind::ChainRejected,
        }
    }

    /// Only transport-level failures are worth retrying; everything else is
    /// deterministic for the same inputs.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unreachable
    }
}

impl From<AddressError> for CustodyError {
    fn from(err: AddressError) -> Self {
        match err {
            AddressError::ChecksumMismatch => Self::ChecksumMismatch,
            AddressError::UnsupportedProtocol(protocol) => {
                Self::UnsupportedProtocol(protocol.to_string())
            }
            other => Self::Decoding(DecodingError::Address(other)),
        }
    }
}
