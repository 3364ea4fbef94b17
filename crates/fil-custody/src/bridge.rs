//! Wires configuration to adapters and runs CLI commands through the
//! orchestrator. The only place that chooses concrete port implementations.

use std::fs;
use std::path::Path;

use alloy::hex;
use alloy::primitives::Address as EthAddress;
use eyre::{eyre, Result, WrapErr};
use serde::Serialize;
use tracing::{info, warn};

use fil_custody_adapters::{
    AbiEncoder, CustodyConfig, CustodyMode, EvmRpcAdapter, GovernedCall, KmsCustodyAdapter,
    LocalCustody, LotusRpcAdapter,
};
use fil_custody_core::bignum::parse_token_amount;
use fil_custody_core::message::params_from_base64;
use fil_custody_core::{
    Address, ChainReceipt, CommandResult, CustodyPort, KeyId, Network, Orchestrator,
    ProposalState, ProposalStatus, ProposedCall, Target, TxCommand,
};

use crate::cli::{CallArgs, Command, PhaseArgs, ProposeCommand};

type CustodyOrchestrator = Orchestrator<Box<dyn CustodyPort>, LotusRpcAdapter, EvmRpcAdapter>;

#[derive(Debug, Serialize)]
struct TransitionReport {
    from: ProposalStatus,
    to: ProposalStatus,
    reason: &'static str,
}

#[derive(Debug, Serialize)]
struct CommandReport {
    receipt: ChainReceipt,
    proposal: Option<ProposalState>,
    transition: Option<TransitionReport>,
}

impl From<CommandResult> for CommandReport {
    fn from(result: CommandResult) -> Self {
        Self {
            receipt: result.receipt,
            proposal: result.proposal,
            transition: result.transition.map(|t| TransitionReport {
                from: t.from,
                to: t.to,
                reason: t.reason,
            }),
        }
    }
}

pub struct CustodyBridge {
    orchestrator: CustodyOrchestrator,
    network: Network,
}

impl CustodyBridge {
    pub async fn new(
        config: &CustodyConfig,
        local_secret: Option<&str>,
        key_id: &KeyId,
    ) -> Result<Self> {
        let custody = build_custody(config, local_secret, key_id).await?;
        let native = LotusRpcAdapter::from_config(config).wrap_err("lotus rpc client")?;
        let evm = EvmRpcAdapter::from_config(config).wrap_err("evm rpc client")?;
        Ok(Self {
            orchestrator: Orchestrator::new(custody, native, evm, config.pipeline_config()),
            network: config.network,
        })
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Address { key } => self.print_addresses(&KeyId::new(key)).await,
            Command::Transfer { key, to, value } => {
                let command = TxCommand::Transfer {
                    key_id: KeyId::new(key),
                    to: self.parse_address(&to)?,
                    value: parse_token_amount(&value)?,
                };
                self.dispatch(command, None).await
            }
            Command::Invoke { key, call } => {
                let contract: EthAddress = call
                    .to
                    .parse()
                    .wrap_err_with(|| format!("contract address {:?}", call.to))?;
                let command = TxCommand::Invoke {
                    key_id: KeyId::new(key),
                    contract,
                    value: parse_token_amount(&call.value)?,
                    calldata: contract_calldata(&call)?.unwrap_or_default().into(),
                };
                self.dispatch(command, None).await
            }
            Command::Propose(propose) => self.propose(propose).await,
            Command::Confirm(args) => {
                self.phase(args, |key_id, proposal| TxCommand::Confirm { key_id, proposal })
                    .await
            }
            Command::Execute(args) => {
                self.phase(args, |key_id, proposal| TxCommand::Execute { key_id, proposal })
                    .await
            }
            Command::Cancel(args) => {
                self.phase(args, |key_id, proposal| TxCommand::Cancel { key_id, proposal })
                    .await
            }
        }
    }

    async fn print_addresses(&self, key_id: &KeyId) -> Result<()> {
        let signer = &self.orchestrator.signer;
        let native = signer.native_address(key_id, self.network).await?;
        let evm = signer.evm_address(key_id).await?;
        let report = serde_json::json!({
            "key": key_id,
            "native": native,
            "evm": evm,
            "delegated": Address::new_delegated_eth(evm, self.network),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }

    async fn propose(&self, command: ProposeCommand) -> Result<()> {
        let (key, target, call, out) = match command {
            ProposeCommand::Native {
                key,
                multisig,
                call,
                method,
                params,
                out,
            } => {
                let target = Target::native(self.parse_address(&multisig)?);
                let call = self.native_call(call, method, params)?;
                (key, target, call, out)
            }
            ProposeCommand::Evm {
                key,
                wallet,
                call,
                out,
            } => {
                let wallet: EthAddress = wallet
                    .parse()
                    .wrap_err_with(|| format!("wallet address {wallet:?}"))?;
                let to = self.parse_address(&call.to)?;
                let value = parse_token_amount(&call.value)?;
                let calldata = contract_calldata(&call)?.unwrap_or_default();
                (key, Target::evm(wallet), ProposedCall::contract_call(to, value, calldata), out)
            }
        };

        let command = TxCommand::Propose {
            key_id: KeyId::new(key),
            target,
            call,
        };
        self.dispatch(command, out.as_deref()).await
    }

    async fn phase(
        &self,
        args: PhaseArgs,
        build: impl FnOnce(KeyId, ProposalState) -> TxCommand,
    ) -> Result<()> {
        let raw = fs::read_to_string(&args.proposal)
            .wrap_err_with(|| format!("reading {}", args.proposal.display()))?;
        let proposal: ProposalState = serde_json::from_str(&raw)
            .wrap_err_with(|| format!("parsing {}", args.proposal.display()))?;
        let out = args.out.unwrap_or(args.proposal);
        self.dispatch(build(KeyId::new(args.key), proposal), Some(out.as_path()))
            .await
    }

    async fn dispatch(&self, command: TxCommand, proposal_out: Option<&Path>) -> Result<()> {
        let result = match self.orchestrator.handle(command).await {
            Ok(result) => result,
            Err(err) => {
                warn!(kind = ?err.kind(), retryable = err.is_retryable(), error = %err, "command failed");
                if let (Some(path), Some(proposal)) = (proposal_out, err.proposal()) {
                    save_proposal(path, proposal)?;
                }
                return Err(err.into());
            }
        };
        let report = CommandReport::from(result);

        if let (Some(path), Some(proposal)) = (proposal_out, report.proposal.as_ref()) {
            save_proposal(path, proposal)?;
        }
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }

    fn native_call(&self, call: CallArgs, method: u64, params: Option<String>) -> Result<ProposedCall> {
        let to = self.parse_address(&call.to)?;
        let value = parse_token_amount(&call.value)?;
        if let Some(calldata) = contract_calldata(&call)? {
            return Ok(ProposedCall::evm_invoke(to, value, &calldata)?);
        }
        match params {
            Some(encoded) => Ok(ProposedCall::actor_method(
                to,
                value,
                method,
                params_from_base64(&encoded)?,
            )),
            None if method == 0 => Ok(ProposedCall::transfer(to, value)),
            None => Ok(ProposedCall::actor_method(to, value, method, Vec::new())),
        }
    }

    /// `f…`/`t…` addresses are decoded as-is; `0x…` addresses become
    /// delegated (f410) addresses on the configured network.
    fn parse_address(&self, value: &str) -> Result<Address> {
        if value.starts_with("0x") {
            let eth: EthAddress = value
                .parse()
                .wrap_err_with(|| format!("evm address {value:?}"))?;
            return Ok(Address::new_delegated_eth(eth, self.network));
        }
        let address = Address::decode(value).wrap_err_with(|| format!("address {value:?}"))?;
        if address.network() != self.network {
            warn!(address = %address, network = ?self.network, "address network differs from configured network");
        }
        Ok(address)
    }
}

fn save_proposal(path: &Path, proposal: &ProposalState) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(proposal)?)
        .wrap_err_with(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), status = ?proposal.status, "proposal saved");
    Ok(())
}

fn contract_calldata(call: &CallArgs) -> Result<Option<Vec<u8>>> {
    if let Some(raw) = &call.calldata {
        return Ok(Some(hex::decode(raw).wrap_err("calldata is not hex")?));
    }
    if let Some(governed) = &call.governed {
        let governed: GovernedCall = governed.parse()?;
        return Ok(Some(governed.calldata()?.to_vec()));
    }
    match &call.signature {
        Some(signature) => Ok(Some(
            AbiEncoder
                .encode_signature_call(signature, &call.args)?
                .to_vec(),
        )),
        None => Ok(None),
    }
}

async fn build_custody(
    config: &CustodyConfig,
    local_secret: Option<&str>,
    key_id: &KeyId,
) -> Result<Box<dyn CustodyPort>> {
    match config.custody_mode {
        CustodyMode::Kms => Ok(Box::new(KmsCustodyAdapter::from_config(config).await)),
        CustodyMode::Local => {
            let custody = LocalCustody::default();
            match local_secret {
                Some(secret) => {
                    let bytes = hex::decode(secret).wrap_err("local secret is not hex")?;
                    let secret: [u8; 32] = bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| eyre!("local secret must be 32 bytes, got {}", bytes.len()))?;
                    custody.insert_key(key_id.clone(), &secret)?;
                }
                None => {
                    warn!(key_id = %key_id, "no local secret given, using an ephemeral key");
                    custody.generate_key(key_id.clone())?;
                }
            }
            Ok(Box::new(custody))
        }
    }
}

/// Key the command signs with; local custody is seeded for it.
pub fn command_key(command: &Command) -> KeyId {
    let key = match command {
        Command::Address { key } | Command::Transfer { key, .. } | Command::Invoke { key, .. } => {
            key
        }
        Command::Propose(ProposeCommand::Native { key, .. } | ProposeCommand::Evm { key, .. }) => {
            key
        }
        Command::Confirm(args) | Command::Execute(args) | Command::Cancel(args) => &args.key,
    };
    KeyId::new(key.as_str())
}
