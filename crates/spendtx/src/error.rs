use super::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpendError {
    #[error("no spendable outputs found for the given addresses")]
    EmptyCatalog,

    #[error("insufficient funds: {available} available, {needed} needed (short by {shortfall})")]
    InsufficientFunds {
        shortfall: Amount,
        available: Amount,
        needed: Amount,
    },

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error(
        "broadcast of {txid} has an unknown outcome ({cause}); \
         check the node's transaction history before retrying"
    )]
    SubmissionUncertain { txid: String, cause: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rejecting transaction, unreasonable fee of {fee} (limit {limit})")]
    UnreasonableFee { fee: Amount, limit: Amount },
}

impl SpendError {
    pub const EXIT_GENERIC: u8 = 1;
    pub const EXIT_INSUFFICIENT_FUNDS: u8 = 2;
    pub const EXIT_EMPTY_CATALOG: u8 = 3;
    pub const EXIT_RPC: u8 = 4;
    pub const EXIT_SIGNING_FAILED: u8 = 5;
    pub const EXIT_SUBMISSION_UNCERTAIN: u8 = 6;

    pub fn exit_code(&self) -> u8 {
        match self {
            SpendError::EmptyCatalog => Self::EXIT_EMPTY_CATALOG,
            SpendError::InsufficientFunds { .. } => Self::EXIT_INSUFFICIENT_FUNDS,
            SpendError::Rpc(_) => Self::EXIT_RPC,
            SpendError::SigningFailed(_) => Self::EXIT_SIGNING_FAILED,
            SpendError::SubmissionUncertain { .. } => Self::EXIT_SUBMISSION_UNCERTAIN,
            SpendError::InvalidRequest(_) | SpendError::UnreasonableFee { .. } => {
                Self::EXIT_GENERIC
            }
        }
    }
}
