//! In-memory node used by tests. It builds real transactions so callers can
//! decode what they get back, but never signs anything.

use super::*;
use bitcoin::{
    absolute::LockTime,
    consensus::encode::{deserialize_hex, serialize_hex},
    transaction::Version,
    ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness,
};
use std::cell::RefCell;

#[derive(Debug, Clone)]
pub enum SignBehaviour {
    Complete,
    Incomplete(String),
    Fail(RpcCause),
}

#[derive(Debug, Clone)]
pub enum SendBehaviour {
    Accept,
    Fail(RpcCause),
}

#[derive(Debug)]
pub struct MockNode {
    pub utxos: Vec<UnspentOutput>,
    pub policy: FeePolicy,
    pub change_address: String,
    pub sign: SignBehaviour,
    pub send: SendBehaviour,
    calls: RefCell<Vec<&'static str>>,
    created: RefCell<Vec<Vec<(String, Amount)>>>,
}

impl MockNode {
    pub fn new(utxos: Vec<UnspentOutput>) -> Self {
        Self {
            utxos,
            policy: FeePolicy {
                fee_rate: datatypes::types::FeeRate::ZERO,
                relay_fee: datatypes::types::FeeRate::ZERO,
                dust_threshold: Amount::ZERO,
            },
            change_address: "node-change".to_string(),
            sign: SignBehaviour::Complete,
            send: SendBehaviour::Accept,
            calls: RefCell::new(Vec::new()),
            created: RefCell::new(Vec::new()),
        }
    }

    pub fn with_policy(mut self, policy: FeePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sign(mut self, sign: SignBehaviour) -> Self {
        self.sign = sign;
        self
    }

    pub fn with_send(mut self, send: SendBehaviour) -> Self {
        self.send = send;
        self
    }

    /// RPC methods invoked so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    pub fn called(&self, method: &str) -> bool {
        self.calls.borrow().iter().any(|call| *call == method)
    }

    /// Output lists passed to `createrawtransaction`.
    pub fn created_outputs(&self) -> Vec<Vec<(String, Amount)>> {
        self.created.borrow().clone()
    }

    fn record(&self, method: &'static str) {
        self.calls.borrow_mut().push(method);
    }
}

impl NodeRpc for MockNode {
    fn list_unspent(&self, addresses: &[String]) -> Result<Vec<UnspentOutput>, RpcError> {
        self.record("listunspent");
        Ok(self
            .utxos
            .iter()
            .filter(|utxo| addresses.is_empty() || addresses.contains(&utxo.address))
            .cloned()
            .collect())
    }

    fn create_raw_transaction(
        &self,
        inputs: &[OutPoint],
        outputs: &[(String, Amount)],
    ) -> Result<String, RpcError> {
        self.record("createrawtransaction");
        self.created.borrow_mut().push(outputs.to_vec());

        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: inputs
                .iter()
                .map(|out_point| TxIn {
                    previous_output: *out_point,
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
                .collect(),
            output: outputs
                .iter()
                .map(|(_, value)| TxOut {
                    value: *value,
                    script_pubkey: ScriptBuf::new(),
                })
                .collect(),
        };
        Ok(serialize_hex(&tx))
    }

    fn sign_raw_transaction(&self, raw_tx_hex: &str) -> Result<SignedTransaction, RpcError> {
        self.record("signrawtransactionwithwallet");
        match &self.sign {
            SignBehaviour::Complete => Ok(SignedTransaction {
                hex: raw_tx_hex.to_string(),
                complete: true,
                errors: vec![],
            }),
            SignBehaviour::Incomplete(reason) => Ok(SignedTransaction {
                hex: raw_tx_hex.to_string(),
                complete: false,
                errors: vec![reason.clone()],
            }),
            SignBehaviour::Fail(cause) => Err(RpcError::new(
                "signrawtransactionwithwallet",
                cause.clone(),
            )),
        }
    }

    fn send_raw_transaction(&self, signed_tx_hex: &str) -> Result<TransactionHandle, RpcError> {
        self.record("sendrawtransaction");
        if let SendBehaviour::Fail(cause) = &self.send {
            return Err(RpcError::new("sendrawtransaction", cause.clone()));
        }

        let tx = deserialize_hex::<Transaction>(signed_tx_hex).map_err(|e| {
            RpcError::new("sendrawtransaction", RpcCause::Malformed(e.to_string()))
        })?;
        Ok(TransactionHandle {
            txid: tx.compute_txid(),
        })
    }

    fn fee_policy(&self, _conf_target: u16) -> Result<FeePolicy, RpcError> {
        self.record("estimatesmartfee");
        Ok(self.policy)
    }

    fn raw_change_address(&self) -> Result<String, RpcError> {
        self.record("getrawchangeaddress");
        Ok(self.change_address.clone())
    }

    fn unlock_wallet(&self, _passphrase: &str, _timeout_secs: u64) -> Result<(), RpcError> {
        self.record("walletpassphrase");
        Ok(())
    }
}
