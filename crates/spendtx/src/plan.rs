use super::*;
use crate::fee::FeeModel;

/// Turns a selection into a balanced plan. `change_address` is only called
/// when a change output survives the dust check.
pub fn build_plan<F>(
    selection: SelectionResult,
    request: &SelectionRequest,
    fees: &FeeModel,
    change_address: F,
) -> Result<TransactionPlan, SpendError>
where
    F: FnOnce() -> Result<String, SpendError>,
{
    let settlement = fees.settle_change(selection.total, request.payment, selection.inputs.len())?;

    let change = match (settlement.change, selection.change_required) {
        (Some(value), true) => Some(TxOutput {
            address: change_address()?,
            value,
        }),
        (None, false) => None,
        (change, required) => {
            return Err(SpendError::InvalidRequest(format!(
                "selection expects change {} but fees settle on {:?}",
                required, change
            )))
        }
    };

    let plan = TransactionPlan {
        inputs: selection.inputs,
        payment: TxOutput {
            address: request.destination.clone(),
            value: request.payment,
        },
        change,
        fee: settlement.estimate.fee,
        vsize: settlement.estimate.vsize,
    };
    if !plan.is_balanced() {
        return Err(SpendError::InvalidRequest(format!(
            "plan does not balance: inputs {} != outputs {} + fee {}",
            plan.input_total(),
            plan.output_total(),
            plan.fee
        )));
    }

    info!(
        "plan: {} inputs {}, payment {}, change {}, fee {} (~{} vB)",
        plan.inputs.len(),
        plan.input_total(),
        plan.payment.value,
        plan.change_value(),
        plan.fee,
        plan.vsize
    );
    Ok(plan)
}

/// Ceiling on fee as a percentage of the payment; `0` disables the check.
pub fn fee_limit(payment: Amount, max_fee_percent: u64) -> Option<Amount> {
    if max_fee_percent == 0 {
        return None;
    }
    Some(Amount::from_sat(
        payment.to_sat().saturating_mul(max_fee_percent) / 100,
    ))
}

pub fn check_fee(plan: &TransactionPlan, limit: Option<Amount>) -> Result<(), SpendError> {
    match limit {
        Some(limit) if plan.fee > limit => Err(SpendError::UnreasonableFee {
            fee: plan.fee,
            limit,
        }),
        _ => Ok(()),
    }
}
