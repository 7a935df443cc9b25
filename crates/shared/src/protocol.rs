//! Fixed identity of the deployed board contract and its interface descriptor.

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "MessageBoard DApp";
pub const CONTRACT_ADDRESS: Address = address!("709fe13caaa6f3051dcb390ff12ba444f465aa98");
pub const DEFAULT_CHAIN_ID: u64 = 10143;
pub const DEFAULT_RPC_URL: &str = "https://testnet-rpc.monad.xyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    View,
    Nonpayable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AbiParam {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AbiFunction {
    pub name: &'static str,
    pub inputs: &'static [AbiParam],
    pub outputs: &'static [AbiParam],
    #[serde(rename = "stateMutability")]
    pub state_mutability: StateMutability,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl AbiFunction {
    /// Canonical `name(type,...)` signature used for selector derivation.
    pub fn signature(&self) -> String {
        let inputs = self
            .inputs
            .iter()
            .map(|param| param.ty)
            .collect::<Vec<_>>()
            .join(",");
        format!("{}({inputs})", self.name)
    }
}

const fn view(name: &'static str, outputs: &'static [AbiParam]) -> AbiFunction {
    AbiFunction {
        name,
        inputs: &[],
        outputs,
        state_mutability: StateMutability::View,
        kind: "function",
    }
}

pub const GET_MESSAGE: AbiFunction = view("getMessage", &[AbiParam { name: "", ty: "string" }]);
pub const AUTHOR: AbiFunction = view("author", &[AbiParam { name: "", ty: "address" }]);
pub const MESSAGE_COUNT: AbiFunction =
    view("messageCount", &[AbiParam { name: "", ty: "uint256" }]);
pub const UPDATE_MESSAGE: AbiFunction = AbiFunction {
    name: "updateMessage",
    inputs: &[AbiParam {
        name: "newMessage",
        ty: "string",
    }],
    outputs: &[],
    state_mutability: StateMutability::Nonpayable,
    kind: "function",
};

/// The only operations the client relies on. Must match the deployed
/// contract exactly; mismatches surface as gateway failures.
pub const MESSAGE_BOARD_ABI: [AbiFunction; 4] =
    [GET_MESSAGE, AUTHOR, MESSAGE_COUNT, UPDATE_MESSAGE];

pub fn abi_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&MESSAGE_BOARD_ABI)
}
