use super::*;
use bitcoin::{Address, Network};
use bitcoincore_rpc::{
    json::{CreateRawTransactionInput, ListUnspentResultEntry},
    jsonrpc::{self, simple_http::SimpleHttpTransport},
    Auth, Client, RpcApi,
};
use datatypes::types::FeeRate;
use std::{collections::HashMap, fmt, str::FromStr, time::Duration};

/// Size of a P2PKH output plus the input that later spends it.
const DUST_SPEND_VBYTES: u64 = 182;
/// Node default for `-dustrelayfee`, independent of `minrelaytxfee`.
pub const DUST_RELAY_FEE: FeeRate = FeeRate(3000);
/// An output is dust when spending it costs more than a third of its value.
const DUST_RELAY_MULTIPLIER: u64 = 3;

/// Everything needed to reach one node. Passed in explicitly so several
/// isolated clients can coexist.
#[derive(Clone)]
pub struct NodeConfig {
    pub url: String,
    pub auth: Auth,
    pub network: Network,
    pub timeout: Duration,
}

impl fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let auth = match &self.auth {
            Auth::None => "none",
            Auth::UserPass(..) => "user:<redacted>",
            Auth::CookieFile(_) => "cookie",
        };
        f.debug_struct("NodeConfig")
            .field("url", &self.url)
            .field("auth", &auth)
            .field("network", &self.network)
            .field("timeout", &self.timeout)
            .finish()
    }
}

pub struct BtcCli {
    rpc: Client,
    network: Network,
}

impl BtcCli {
    pub fn new(cfg: &NodeConfig) -> Result<Self, RpcError> {
        let (user, pass) = cfg
            .auth
            .clone()
            .get_user_pass()
            .map_err(|e| RpcError::from_rpc("connect", e))?;

        let mut builder = SimpleHttpTransport::builder()
            .url(&cfg.url)
            .map_err(|e| RpcError::new("connect", RpcCause::InvalidParameter(e.to_string())))?
            .timeout(cfg.timeout);
        if let Some(user) = user {
            builder = builder.auth(user, pass);
        }

        let rpc = Client::from_jsonrpc(jsonrpc::Client::with_transport(builder.build()));
        debug!("rpc client ready for {:?}", cfg);
        Ok(Self {
            rpc,
            network: cfg.network,
        })
    }

    fn checked_address(&self, addr: &str) -> Result<Address, RpcError> {
        let invalid = |e: &dyn fmt::Display| {
            RpcError::new(
                "listunspent",
                RpcCause::InvalidParameter(format!("{}: {}", addr, e)),
            )
        };
        let unchecked = Address::from_str(addr).map_err(|e| invalid(&e))?;
        unchecked
            .require_network(self.network)
            .map_err(|e| invalid(&e))
    }
}

impl NodeRpc for BtcCli {
    fn list_unspent(&self, addresses: &[String]) -> Result<Vec<UnspentOutput>, RpcError> {
        let checked = addresses
            .iter()
            .map(|addr| self.checked_address(addr))
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&Address> = checked.iter().collect();
        let filter = if refs.is_empty() {
            None
        } else {
            Some(refs.as_slice())
        };

        let entries = self
            .rpc
            .list_unspent(Some(0), None, filter, None, None)
            .map_err(|e| RpcError::from_rpc("listunspent", e))?;
        debug!("listunspent returned {} entries", entries.len());

        Ok(entries.into_iter().map(to_unspent_output).collect())
    }

    fn create_raw_transaction(
        &self,
        inputs: &[OutPoint],
        outputs: &[(String, Amount)],
    ) -> Result<String, RpcError> {
        let utxos: Vec<CreateRawTransactionInput> = inputs
            .iter()
            .map(|out_point| CreateRawTransactionInput {
                txid: out_point.txid,
                vout: out_point.vout,
                sequence: None,
            })
            .collect();

        let mut outs: HashMap<String, Amount> = HashMap::new();
        for (addr, value) in outputs {
            *outs.entry(addr.clone()).or_insert(Amount::ZERO) += *value;
        }

        self.rpc
            .create_raw_transaction_hex(&utxos, &outs, None, None)
            .map_err(|e| RpcError::from_rpc("createrawtransaction", e))
    }

    fn sign_raw_transaction(&self, raw_tx_hex: &str) -> Result<SignedTransaction, RpcError> {
        let res = self
            .rpc
            .sign_raw_transaction_with_wallet(raw_tx_hex, None, None)
            .map_err(|e| RpcError::from_rpc("signrawtransactionwithwallet", e))?;

        let errors = res
            .errors
            .unwrap_or_default()
            .into_iter()
            .map(|e| format!("{}:{} {}", e.txid, e.vout, e.error))
            .collect();
        Ok(SignedTransaction {
            hex: hex::encode(&res.hex),
            complete: res.complete,
            errors,
        })
    }

    fn send_raw_transaction(&self, signed_tx_hex: &str) -> Result<TransactionHandle, RpcError> {
        match self.rpc.send_raw_transaction(signed_tx_hex) {
            Ok(txid) => Ok(TransactionHandle { txid }),
            Err(e) => Err(RpcError::from_rpc("sendrawtransaction", e)),
        }
    }

    fn fee_policy(&self, conf_target: u16) -> Result<FeePolicy, RpcError> {
        let info = self
            .rpc
            .get_network_info()
            .map_err(|e| RpcError::from_rpc("getnetworkinfo", e))?;
        let relay_fee = FeeRate::from_amount_per_kvb(info.relay_fee);

        let estimate = self
            .rpc
            .estimate_smart_fee(conf_target, None)
            .map_err(|e| RpcError::from_rpc("estimatesmartfee", e))?;
        let fee_rate = match estimate.fee_rate {
            Some(rate) => FeeRate::from_amount_per_kvb(rate).max(relay_fee),
            None => {
                warn!(
                    "node has no fee estimate for {} blocks ({:?}), using relay fee",
                    conf_target, estimate.errors
                );
                relay_fee
            }
        };

        Ok(FeePolicy {
            fee_rate,
            relay_fee,
            dust_threshold: dust_threshold(relay_fee),
        })
    }

    fn raw_change_address(&self) -> Result<String, RpcError> {
        match self.rpc.get_raw_change_address(None) {
            Ok(addr) => Ok(addr.assume_checked().to_string()),
            Err(e) => Err(RpcError::from_rpc("getrawchangeaddress", e)),
        }
    }

    fn unlock_wallet(&self, passphrase: &str, timeout_secs: u64) -> Result<(), RpcError> {
        self.rpc
            .call::<serde_json::Value>(
                "walletpassphrase",
                &[passphrase.into(), timeout_secs.into()],
            )
            .map(|_| ())
            .map_err(|e| RpcError::from_rpc("walletpassphrase", e))
    }
}

fn to_unspent_output(entry: ListUnspentResultEntry) -> UnspentOutput {
    UnspentOutput {
        out_point: OutPoint {
            txid: entry.txid,
            vout: entry.vout,
        },
        address: entry
            .address
            .map(|addr| addr.assume_checked().to_string())
            .unwrap_or_default(),
        value: entry.amount,
        confirmations: entry.confirmations,
        spendable: entry.spendable,
    }
}

/// Smallest change worth creating under the node's relay policy. The dust
/// relay rate never drops below its 3000 sat/kvB default, even when the
/// node relays at a lower `minrelaytxfee`.
pub fn dust_threshold(relay_fee: FeeRate) -> Amount {
    let scaled = FeeRate(relay_fee.sat_per_kvb().saturating_mul(DUST_RELAY_MULTIPLIER));
    scaled.max(DUST_RELAY_FEE).fee_for_vsize(DUST_SPEND_VBYTES)
}
