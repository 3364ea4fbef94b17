use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "fil-custody", version, about = "Custodial signing for Filecoin and FEVM")]
pub struct Cli {
    /// Overrides FIL_CUSTODY_NETWORK.
    #[arg(long, global = true)]
    pub network: Option<String>,

    /// Overrides FIL_CUSTODY_MODE (`kms` or `local`).
    #[arg(long, global = true)]
    pub mode: Option<String>,

    /// Hex secret for `local` mode; a fresh key is generated when absent.
    #[arg(long, global = true, env = "FIL_CUSTODY_LOCAL_SECRET", hide_env_values = true)]
    pub local_secret: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the native and EVM addresses of a custody key.
    Address {
        #[arg(long)]
        key: String,
    },
    /// Send FIL from a custody key.
    Transfer {
        #[arg(long)]
        key: String,
        #[arg(long)]
        to: String,
        /// Amount in attoFIL.
        #[arg(long)]
        value: String,
    },
    /// Call a contract from the key's own EVM account, e.g. a pool deposit.
    Invoke {
        #[arg(long)]
        key: String,
        #[command(flatten)]
        call: CallArgs,
    },
    /// Open a multisig proposal.
    #[command(subcommand)]
    Propose(ProposeCommand),
    /// Approve a proposal.
    Confirm(PhaseArgs),
    /// Approve-and-execute (native) or execute (EVM) a proposal.
    Execute(PhaseArgs),
    /// Cancel (native) or revoke this key's confirmation (EVM).
    Cancel(PhaseArgs),
}

#[derive(Debug, Subcommand)]
pub enum ProposeCommand {
    /// Propose through a native multisig actor.
    Native {
        #[arg(long)]
        key: String,
        /// Multisig actor address.
        #[arg(long)]
        multisig: String,
        #[command(flatten)]
        call: CallArgs,
        /// Actor method for a plain actor call.
        #[arg(long, default_value_t = 0)]
        method: u64,
        /// Base64 CBOR params for a plain actor call.
        #[arg(long)]
        params: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Propose through an EVM MultiSigWallet.
    Evm {
        #[arg(long)]
        key: String,
        /// Wallet contract address (0x…).
        #[arg(long)]
        wallet: String,
        #[command(flatten)]
        call: CallArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Recipient or contract (f…/t… or 0x…).
    #[arg(long)]
    pub to: String,
    /// Amount in attoFIL.
    #[arg(long, default_value = "0")]
    pub value: String,
    /// Hex calldata for a contract call.
    #[arg(long, conflicts_with_all = ["signature", "governed"])]
    pub calldata: Option<String>,
    /// Function signature for a contract call, e.g. `setPool(address)`.
    #[arg(long)]
    pub signature: Option<String>,
    /// Arguments for `--signature`, in order.
    #[arg(long = "arg", requires = "signature")]
    pub args: Vec<String>,
    /// Governance call such as `deposit`, `setPool:0x…` or
    /// `withdraw:0x…,0x…,1000`.
    #[arg(long, conflicts_with = "signature")]
    pub governed: Option<String>,
}

#[derive(Debug, Args)]
pub struct PhaseArgs {
    #[arg(long)]
    pub key: String,
    /// Proposal JSON written by `propose` or a previous phase.
    #[arg(long)]
    pub proposal: PathBuf,
    /// Where to write the updated proposal; defaults to `--proposal`.
    #[arg(long)]
    pub out: Option<PathBuf>,
}
