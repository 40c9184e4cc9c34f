use bitcoin::{Amount, OutPoint};
use datatypes::types::{
    FeeEstimate, FeePolicy, FeeRate, SelectionRequest, SelectionResult, TransactionPlan, TxOutput,
    UnspentOutput,
};
use noderpc::{NodeRpc, RpcCause, RpcError};
use tracing::{debug, info, warn};

pub mod assembler;
pub mod catalog;
pub mod error;
pub mod fee;
pub mod plan;
pub mod request;
pub mod selector;
pub mod spender;
pub mod vsize;

pub use error::SpendError;
