use bitcoin::{Amount, OutPoint, Txid};
use serde::Serialize;

/// A previously received output the node reports as unspent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnspentOutput {
    pub out_point: OutPoint,
    pub address: String,
    pub value: Amount,
    pub confirmations: u32,
    pub spendable: bool,
}

/// Fee rate in satoshis per 1000 virtual bytes, the unit the node reports.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct FeeRate(pub u64);

impl FeeRate {
    pub const ZERO: FeeRate = FeeRate(0);

    /// Node RPCs return rates as an amount per kvB.
    pub fn from_amount_per_kvb(amount: Amount) -> Self {
        FeeRate(amount.to_sat())
    }

    pub fn sat_per_kvb(&self) -> u64 {
        self.0
    }

    /// Fee for `vsize` virtual bytes, rounded up.
    pub fn fee_for_vsize(&self, vsize: u64) -> Amount {
        Amount::from_sat(vsize.saturating_mul(self.0).div_ceil(1000))
    }
}

/// Fee policy read from the node for the current invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeePolicy {
    pub fee_rate: FeeRate,
    pub relay_fee: FeeRate,
    pub dust_threshold: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeEstimate {
    pub vsize: u64,
    pub fee: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRequest {
    pub payment: Amount,
    pub destination: String,
    /// Coin control set, in operator order.
    pub sources: Vec<String>,
    /// Outputs spent first, in this order.
    pub forced: Vec<OutPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionResult {
    pub inputs: Vec<UnspentOutput>,
    pub total: Amount,
    pub change_required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxOutput {
    pub address: String,
    pub value: Amount,
}

/// A fully balanced spend: `inputs == payment + fee + change`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionPlan {
    pub inputs: Vec<UnspentOutput>,
    pub payment: TxOutput,
    pub change: Option<TxOutput>,
    pub fee: Amount,
    pub vsize: u64,
}

impl TransactionPlan {
    pub fn input_total(&self) -> Amount {
        self.inputs.iter().map(|input| input.value).sum()
    }

    pub fn change_value(&self) -> Amount {
        self.change
            .as_ref()
            .map(|change| change.value)
            .unwrap_or(Amount::ZERO)
    }

    pub fn output_total(&self) -> Amount {
        self.payment.value + self.change_value()
    }

    pub fn is_balanced(&self) -> bool {
        self.input_total() == self.output_total() + self.fee
    }

    pub fn out_points(&self) -> Vec<OutPoint> {
        self.inputs.iter().map(|input| input.out_point).collect()
    }

    /// Outputs as handed to `createrawtransaction`. Change sent back to the
    /// destination is merged into the payment output.
    pub fn outputs(&self) -> Vec<(String, Amount)> {
        let mut outputs = vec![(self.payment.address.clone(), self.payment.value)];
        if let Some(change) = &self.change {
            match outputs.iter_mut().find(|(addr, _)| *addr == change.address) {
                Some((_, value)) => *value += change.value,
                None => outputs.push((change.address.clone(), change.value)),
            }
        }
        outputs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedTransaction {
    pub hex: String,
    pub complete: bool,
    pub errors: Vec<String>,
}

/// Identifier the node hands back after accepting a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransactionHandle {
    pub txid: Txid,
}
