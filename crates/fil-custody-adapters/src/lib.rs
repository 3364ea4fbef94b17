pub mod abi;
pub mod config;
pub mod evm_rpc;
pub mod kms;
pub mod local;
pub mod lotus;
pub mod memory_evm;
pub mod memory_lotus;
pub mod rpc;

pub use abi::{AbiEncoder, GovernedCall};
pub use config::{ConfigError, CustodyConfig, CustodyMode};
pub use evm_rpc::EvmRpcAdapter;
pub use kms::KmsCustodyAdapter;
pub use local::LocalCustody;
pub use lotus::LotusRpcAdapter;
pub use memory_evm::{ContractCall, InMemoryEvm};
pub use memory_lotus::InMemoryLotus;
pub use rpc::JsonRpcClient;
