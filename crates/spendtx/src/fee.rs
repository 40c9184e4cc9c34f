use super::*;
use crate::vsize::estimate_vsize;

/// Bound on the fee/change fixed point. It settles in two rounds; anything
/// more means the inputs are inconsistent.
pub const MAX_FEE_ITERATIONS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeSpec {
    Rate(FeeRate),
    Absolute(Amount),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeModel {
    pub spec: FeeSpec,
    pub dust_threshold: Amount,
}

/// Outcome of fee and change computation for a fixed input set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub estimate: FeeEstimate,
    pub change: Option<Amount>,
}

impl FeeModel {
    pub fn new(spec: FeeSpec, dust_threshold: Amount) -> Self {
        Self {
            spec,
            dust_threshold,
        }
    }

    /// Fee model from the node policy, with operator overrides applied. A
    /// rate override below the node's relay fee would never propagate.
    pub fn from_policy(
        policy: &FeePolicy,
        rate_override: Option<FeeRate>,
        absolute_fee: Option<Amount>,
        dust_override: Option<Amount>,
    ) -> Result<Self, SpendError> {
        let spec = match (absolute_fee, rate_override) {
            (Some(_), Some(_)) => {
                return Err(SpendError::InvalidRequest(
                    "give either an absolute fee or a fee rate, not both".to_string(),
                ))
            }
            (Some(fee), None) if fee > Amount::MAX_MONEY => {
                return Err(SpendError::InvalidRequest(format!(
                    "fee {} exceeds the coin supply",
                    fee
                )))
            }
            (Some(fee), None) => FeeSpec::Absolute(fee),
            (None, Some(rate)) if rate < policy.relay_fee => {
                return Err(SpendError::InvalidRequest(format!(
                    "fee rate {} sat/kvB is below the node relay fee {} sat/kvB",
                    rate.sat_per_kvb(),
                    policy.relay_fee.sat_per_kvb()
                )))
            }
            (None, Some(rate)) => FeeSpec::Rate(rate),
            (None, None) => FeeSpec::Rate(policy.fee_rate),
        };

        let model = Self::new(spec, dust_override.unwrap_or(policy.dust_threshold));
        debug!("fee model {:?}", model);
        Ok(model)
    }

    pub fn estimate(&self, inputs: usize, outputs: usize) -> FeeEstimate {
        let vsize = estimate_vsize(inputs, outputs);
        let fee = match self.spec {
            FeeSpec::Rate(rate) => rate.fee_for_vsize(vsize),
            FeeSpec::Absolute(fee) => fee,
        };
        FeeEstimate { vsize, fee }
    }

    /// Fee paid by a one-output spend of `inputs` inputs.
    pub fn minimum_fee(&self, inputs: usize) -> Amount {
        self.estimate(inputs, 1).fee
    }

    fn is_economical(&self, change: Amount) -> bool {
        change > Amount::ZERO && change >= self.dust_threshold
    }

    /// Settle fee and change for `inputs` inputs worth `total` paying
    /// `payment`. Change below the dust threshold is folded into the fee.
    pub fn settle_change(
        &self,
        total: Amount,
        payment: Amount,
        inputs: usize,
    ) -> Result<Settlement, SpendError> {
        let mut with_change = false;
        for round in 0..MAX_FEE_ITERATIONS {
            let outputs = if with_change { 2 } else { 1 };
            let estimate = self.estimate(inputs, outputs);
            debug!(
                "fee round {}: {} outputs, vsize {}, fee {}",
                round, outputs, estimate.vsize, estimate.fee
            );

            let needed = payment
                .checked_add(estimate.fee)
                .ok_or_else(|| SpendError::InvalidRequest("payment plus fee overflows".to_string()))?;
            let change = match total.checked_sub(needed) {
                Some(change) => change,
                None if with_change => return self.fold(total, payment, inputs),
                None => {
                    return Err(SpendError::InsufficientFunds {
                        shortfall: needed - total,
                        available: total,
                        needed,
                    });
                }
            };

            match (with_change, self.is_economical(change)) {
                (true, true) => {
                    return Ok(Settlement {
                        estimate,
                        change: Some(change),
                    })
                }
                (false, true) => with_change = true,
                (_, false) => return self.fold(total, payment, inputs),
            }
        }

        Err(SpendError::InvalidRequest(format!(
            "fee and change did not settle within {} rounds",
            MAX_FEE_ITERATIONS
        )))
    }

    fn fold(&self, total: Amount, payment: Amount, inputs: usize) -> Result<Settlement, SpendError> {
        let estimate = self.estimate(inputs, 1);
        let fee = total.checked_sub(payment).ok_or_else(|| {
            SpendError::InvalidRequest("inputs do not cover the payment".to_string())
        })?;
        if fee > estimate.fee {
            debug!("folding {} of leftover into the fee", fee - estimate.fee);
        }
        Ok(Settlement {
            estimate: FeeEstimate {
                vsize: estimate.vsize,
                fee,
            },
            change: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sat(n: u64) -> Amount {
        Amount::from_sat(n)
    }

    fn policy(rate: u64, relay: u64, dust: u64) -> FeePolicy {
        FeePolicy {
            fee_rate: FeeRate(rate),
            relay_fee: FeeRate(relay),
            dust_threshold: sat(dust),
        }
    }

    #[test]
    fn change_above_dust_gets_an_output() {
        let model = FeeModel::new(FeeSpec::Absolute(sat(2)), sat(5));

        let settled = model.settle_change(sat(50), sat(40), 1).unwrap();
        assert_eq!(settled.change, Some(sat(8)));
        assert_eq!(settled.estimate.fee, sat(2));
    }

    #[test]
    fn change_below_dust_is_folded() {
        let model = FeeModel::new(FeeSpec::Absolute(sat(2)), sat(10));

        let settled = model.settle_change(sat(50), sat(40), 1).unwrap();
        assert_eq!(settled.change, None);
        assert_eq!(settled.estimate.fee, sat(10));
    }

    #[test]
    fn exact_amount_has_no_change() {
        let model = FeeModel::new(FeeSpec::Absolute(sat(2)), Amount::ZERO);

        let settled = model.settle_change(sat(42), sat(40), 1).unwrap();
        assert_eq!(settled.change, None);
        assert_eq!(settled.estimate.fee, sat(2));
    }

    #[test]
    fn change_output_pays_for_itself() {
        // 1 sat/vB: one output costs 192, two cost 226.
        let model = FeeModel::new(FeeSpec::Rate(FeeRate(1000)), sat(546));

        let settled = model.settle_change(sat(100_000), sat(50_000), 1).unwrap();
        assert_eq!(settled.estimate.fee, sat(226));
        assert_eq!(settled.change, Some(sat(100_000 - 50_000 - 226)));
        assert_eq!(settled.estimate.vsize, 226);
    }

    #[test]
    fn change_eaten_by_its_own_output_is_folded() {
        // leftover after a one-output fee is 600, the extra output costs 34
        // more and leaves 566 of change; raise dust so that fails.
        let model = FeeModel::new(FeeSpec::Rate(FeeRate(1000)), sat(580));

        let settled = model.settle_change(sat(50_792), sat(50_000), 1).unwrap();
        assert_eq!(settled.change, None);
        assert_eq!(settled.estimate.fee, sat(792));
    }

    #[test]
    fn overflowing_payment_is_invalid() {
        let model = FeeModel::new(FeeSpec::Absolute(sat(1)), Amount::ZERO);

        let err = model.settle_change(sat(50), sat(u64::MAX), 1).unwrap_err();
        assert!(matches!(err, SpendError::InvalidRequest(_)));
    }

    #[test]
    fn uncovered_payment_is_insufficient() {
        let model = FeeModel::new(FeeSpec::Absolute(sat(3)), Amount::ZERO);

        let err = model.settle_change(sat(40), sat(40), 1).unwrap_err();
        assert!(matches!(
            err,
            SpendError::InsufficientFunds { shortfall, .. } if shortfall == sat(3)
        ));
    }

    #[test]
    fn from_policy_prefers_overrides() {
        let node = policy(5000, 1000, 546);

        let model = FeeModel::from_policy(&node, None, None, None).unwrap();
        assert_eq!(model.spec, FeeSpec::Rate(FeeRate(5000)));
        assert_eq!(model.dust_threshold, sat(546));

        let model = FeeModel::from_policy(&node, Some(FeeRate(2000)), None, Some(sat(1000))).unwrap();
        assert_eq!(model.spec, FeeSpec::Rate(FeeRate(2000)));
        assert_eq!(model.dust_threshold, sat(1000));

        let model = FeeModel::from_policy(&node, None, Some(sat(300)), None).unwrap();
        assert_eq!(model.spec, FeeSpec::Absolute(sat(300)));
    }

    #[test]
    fn from_policy_rejects_bad_overrides() {
        let node = policy(5000, 1000, 546);

        let res = FeeModel::from_policy(&node, Some(FeeRate(500)), None, None);
        assert!(matches!(res, Err(SpendError::InvalidRequest(_))));

        let res = FeeModel::from_policy(&node, Some(FeeRate(2000)), Some(sat(300)), None);
        assert!(matches!(res, Err(SpendError::InvalidRequest(_))));

        let res = FeeModel::from_policy(&node, None, Some(sat(u64::MAX)), None);
        assert!(matches!(res, Err(SpendError::InvalidRequest(_))));
    }
}
