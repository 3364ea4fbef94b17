//! ABI calldata for contract calls, proposed through a multisig or sent
//! directly.

use std::str::FromStr;

use alloy::dyn_abi::{DynSolType, DynSolValue, JsonAbiExt};
use alloy::json_abi::Function;
use alloy::primitives::{Address as EthAddress, Bytes, U256};
use fil_custody_core::CustodyError;

#[derive(Debug, Clone, Copy, Default)]
pub struct AbiEncoder;

impl AbiEncoder {
    /// Encodes from a human-readable signature such as `setPool(address)`.
    /// Arguments are written the way Solidity literals are: `0x…` addresses,
    /// decimal or hex integers, `true`/`false`, hex bytes, bare strings.
    pub fn encode_signature_call(&self, signature: &str, args: &[String]) -> Result<Bytes, CustodyError> {
        let function = Function::parse(signature)
            .map_err(|e| CustodyError::InvalidRequest(format!("invalid signature {signature:?}: {e}")))?;
        if function.inputs.len() != args.len() {
            return Err(CustodyError::InvalidRequest(format!(
                "{signature} takes {} arguments, got {}",
                function.inputs.len(),
                args.len()
            )));
        }

        let values = function
            .inputs
            .iter()
            .zip(args)
            .enumerate()
            .map(|(position, (input, arg))| {
                let ty: DynSolType = input.ty.parse().map_err(|e| {
                    CustodyError::InvalidRequest(format!("unsupported type {}: {e}", input.ty))
                })?;
                coerce(&ty, arg).map_err(|reason| {
                    CustodyError::InvalidRequest(format!("argument {position} ({}): {reason}", input.ty))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        function
            .abi_encode_input(&values)
            .map(Bytes::from)
            .map_err(|e| CustodyError::Encoding(format!("{signature}: {e}")))
    }
}

/// Governance types only; arrays and tuples are not taken from the command line.
fn coerce(ty: &DynSolType, arg: &str) -> Result<DynSolValue, String> {
    match ty {
        DynSolType::Address
        | DynSolType::Bool
        | DynSolType::Uint(_)
        | DynSolType::Int(_)
        | DynSolType::Bytes
        | DynSolType::String => ty.coerce_str(arg.trim()).map_err(|e| e.to_string()),
        other => Err(format!("{} arguments are not supported", other.sol_type_name())),
    }
}

/// Governance calls the custody service sends to its contracts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GovernedCall {
    SetPool(EthAddress),
    SetVault(EthAddress),
    SetZc(EthAddress),
    AddUser(EthAddress),
    RemoveUser(EthAddress),
    Withdraw {
        from: EthAddress,
        to: EthAddress,
        amount: U256,
    },
    PayPrincipal(EthAddress),
    Borrow(U256),
    /// Payable; the deposit rides on the transaction value.
    Deposit,
}

impl GovernedCall {
    pub fn signature(&self) -> &'static str {
        match self {
            Self::SetPool(_) => "setPool(address)",
            Self::SetVault(_) => "setVault(address)",
            Self::SetZc(_) => "setZC(address)",
            Self::AddUser(_) => "addUser(address)",
            Self::RemoveUser(_) => "removeUser(address)",
            Self::Withdraw { .. } => "withdraw(address,address,uint256)",
            Self::PayPrincipal(_) => "payPrincipal(address)",
            Self::Borrow(_) => "borrow(uint256)",
            Self::Deposit => "deposit()",
        }
    }

    fn args(&self) -> Vec<DynSolValue> {
        match self {
            Self::SetPool(a)
            | Self::SetVault(a)
            | Self::SetZc(a)
            | Self::AddUser(a)
            | Self::RemoveUser(a)
            | Self::PayPrincipal(a) => vec![DynSolValue::Address(*a)],
            Self::Withdraw { from, to, amount } => vec![
                DynSolValue::Address(*from),
                DynSolValue::Address(*to),
                DynSolValue::Uint(*amount, 256),
            ],
            Self::Borrow(amount) => vec![DynSolValue::Uint(*amount, 256)],
            Self::Deposit => Vec::new(),
        }
    }

    pub fn calldata(&self) -> Result<Bytes, CustodyError> {
        let function = Function::parse(self.signature())
            .map_err(|e| CustodyError::Encoding(format!("{}: {e}", self.signature())))?;
        function
            .abi_encode_input(&self.args())
            .map(Bytes::from)
            .map_err(|e| CustodyError::Encoding(format!("{}: {e}", self.signature())))
    }
}

/// Parses `name` or `name:arg,arg`, e.g. `setPool:0x…` or
/// `withdraw:0x…,0x…,1000`. Names match the contract functions.
impl FromStr for GovernedCall {
    type Err = CustodyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (name, rest) = value.split_once(':').unwrap_or((value, ""));
        let args: Vec<&str> = if rest.trim().is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(str::trim).collect()
        };
        let invalid = |reason: String| CustodyError::InvalidRequest(format!("{value:?}: {reason}"));
        let arg = |position: usize| {
            args.get(position)
                .copied()
                .ok_or_else(|| invalid(format!("missing argument {position}")))
        };
        let address = |position: usize| {
            arg(position)?
                .parse::<EthAddress>()
                .map_err(|e| invalid(format!("argument {position}: {e}")))
        };
        let amount = |position: usize| {
            arg(position)?
                .parse::<U256>()
                .map_err(|e| invalid(format!("argument {position}: {e}")))
        };

        let call = match name.trim() {
            "setPool" => Self::SetPool(address(0)?),
            "setVault" => Self::SetVault(address(0)?),
            "setZC" => Self::SetZc(address(0)?),
            "addUser" => Self::AddUser(address(0)?),
            "removeUser" => Self::RemoveUser(address(0)?),
            "withdraw" => Self::Withdraw {
                from: address(0)?,
                to: address(1)?,
                amount: amount(2)?,
            },
            "payPrincipal" => Self::PayPrincipal(address(0)?),
            "borrow" => Self::Borrow(amount(0)?),
            "deposit" => Self::Deposit,
            other => return Err(invalid(format!("unknown governed call {other:?}"))),
        };
        let expected = call.args().len();
        if args.len() != expected {
            return Err(invalid(format!("takes {expected} arguments, got {}", args.len())));
        }
        Ok(call)
    }
}
