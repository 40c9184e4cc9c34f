use super::*;
use std::{cmp::Reverse, collections::BTreeMap};

/// Eligible unspent outputs for one invocation, largest first. Never reuse a
/// catalog after anything has been spent.
#[derive(Debug, Clone)]
pub struct Catalog {
    outputs: Vec<UnspentOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSummary {
    pub address: String,
    pub total: Amount,
    pub count: usize,
}

impl Catalog {
    /// An empty `sources` slice means every address in the wallet.
    pub fn fetch<R: NodeRpc + ?Sized>(
        rpc: &R,
        sources: &[String],
        min_conf: u32,
    ) -> Result<Self, SpendError> {
        let listed = rpc.list_unspent(sources)?;
        Self::from_outputs(listed, sources, min_conf)
    }

    pub fn from_outputs(
        listed: Vec<UnspentOutput>,
        sources: &[String],
        min_conf: u32,
    ) -> Result<Self, SpendError> {
        let listed_len = listed.len();
        let mut outputs: Vec<UnspentOutput> = listed
            .into_iter()
            .filter(|utxo| is_eligible(utxo, sources, min_conf))
            .collect();
        if outputs.is_empty() {
            return Err(SpendError::EmptyCatalog);
        }

        // Txids compare as displayed, not in internal byte order.
        outputs.sort_by_cached_key(|utxo| {
            (
                Reverse(utxo.value),
                utxo.out_point.txid.to_string(),
                utxo.out_point.vout,
            )
        });
        outputs.dedup_by(|a, b| a.out_point == b.out_point);

        info!(
            "catalog holds {} of {} listed outputs, total {}",
            outputs.len(),
            listed_len,
            outputs.iter().map(|utxo| utxo.value).sum::<Amount>()
        );
        Ok(Self { outputs })
    }

    pub fn outputs(&self) -> &[UnspentOutput] {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn total(&self) -> Amount {
        self.outputs.iter().map(|utxo| utxo.value).sum()
    }

    pub fn get(&self, out_point: &OutPoint) -> Option<&UnspentOutput> {
        self.outputs.iter().find(|utxo| utxo.out_point == *out_point)
    }

    /// Per-address totals, ordered by address.
    pub fn summary(&self) -> Vec<AddressSummary> {
        let mut by_address: BTreeMap<&str, (Amount, usize)> = BTreeMap::new();
        for utxo in &self.outputs {
            let entry = by_address
                .entry(utxo.address.as_str())
                .or_insert((Amount::ZERO, 0));
            entry.0 += utxo.value;
            entry.1 += 1;
        }

        by_address
            .into_iter()
            .map(|(address, (total, count))| AddressSummary {
                address: address.to_string(),
                total,
                count,
            })
            .collect()
    }
}

fn is_eligible(utxo: &UnspentOutput, sources: &[String], min_conf: u32) -> bool {
    if !utxo.spendable || utxo.confirmations < min_conf || utxo.address.is_empty() {
        return false;
    }
    sources.is_empty() || sources.contains(&utxo.address)
}
