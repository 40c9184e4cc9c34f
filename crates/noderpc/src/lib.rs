pub mod btcrpc;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

use bitcoin::{Amount, OutPoint};
use datatypes::types::{FeePolicy, SignedTransaction, TransactionHandle, UnspentOutput};
use tracing::{debug, warn};

pub use btcrpc::{BtcCli, NodeConfig};
pub use error::{RpcCause, RpcError};

/// The wallet node as seen by the spender. Every call is a single blocking
/// round trip and is never retried.
pub trait NodeRpc {
    /// Unspent outputs owned by `addresses`, or by the whole wallet when
    /// `addresses` is empty. Unconfirmed outputs are included.
    fn list_unspent(&self, addresses: &[String]) -> Result<Vec<UnspentOutput>, RpcError>;

    fn create_raw_transaction(
        &self,
        inputs: &[OutPoint],
        outputs: &[(String, Amount)],
    ) -> Result<String, RpcError>;

    fn sign_raw_transaction(&self, raw_tx_hex: &str) -> Result<SignedTransaction, RpcError>;

    fn send_raw_transaction(&self, signed_tx_hex: &str) -> Result<TransactionHandle, RpcError>;

    fn fee_policy(&self, conf_target: u16) -> Result<FeePolicy, RpcError>;

    fn raw_change_address(&self) -> Result<String, RpcError>;

    fn unlock_wallet(&self, passphrase: &str, timeout_secs: u64) -> Result<(), RpcError>;
}
