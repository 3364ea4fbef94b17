pub mod address;
pub mod bignum;
mod cbor;
pub mod config;
pub mod digest;
pub mod domain;
pub mod error;
pub mod evm;
pub mod gas;
pub mod leb128;
pub mod message;
pub mod native;
pub mod orchestrator;
pub mod ports;
pub mod signature;
pub mod signer;
pub mod state_machine;
pub mod target;

pub use address::{eth_address_from_id, Address, AddressError, Network, Protocol};
pub use config::PipelineConfig;
pub use domain::{
    ChainReceipt, EvmLog, EvmReceipt, KeyId, NativeReceipt, ProposalState, ProposedCall, TxIndex,
    INVOKE_EVM_METHOD, SEND_METHOD,
};
pub use error::{CustodyError, DecodingError, ErrorKind};
pub use evm::{EvmPipeline, EvmSubmission};
pub use gas::{fee_projection, GasEstimator, PricedMessage};
pub use message::{SignedMessage, UnsignedMessage};
pub use native::{MessageDraft, NativePipeline, NativeSubmission};
pub use orchestrator::{CommandResult, Orchestrator, PhaseOutcome, TxCommand};
pub use ports::{CustodyPort, EvmFeeData, EvmRpcPort, GasEstimate, NativeRpcPort, PortError};
pub use signature::{decode_der, recover_id, CompactSignature};
pub use signer::CustodySigner;
pub use state_machine::{proposal_transition, ProposalAction, ProposalStatus, StateTransition};
pub use target::{EvmMultisig, MultiSigWallet, MultisigEncoding, NativeMultisig, Target};
