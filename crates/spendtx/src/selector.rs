use super::*;
use crate::{catalog::Catalog, fee::FeeModel};

/// Greedy coin control selection.
///
/// Forced outputs go first, in the order given. The rest of the catalog is
/// then consumed in catalog order until the inputs cover the payment plus
/// the fee of a one-output spend. Identical catalogs and requests always
/// produce the identical selection.
pub fn select_coins(
    catalog: &Catalog,
    request: &SelectionRequest,
    fees: &FeeModel,
) -> Result<SelectionResult, SpendError> {
    let mut selected: Vec<UnspentOutput> = Vec::new();
    let mut total = Amount::ZERO;

    for out_point in &request.forced {
        if selected.iter().any(|utxo| utxo.out_point == *out_point) {
            return Err(SpendError::InvalidRequest(format!(
                "output {} is forced more than once",
                out_point
            )));
        }
        let utxo = catalog.get(out_point).ok_or_else(|| {
            SpendError::InvalidRequest(format!(
                "output {} is not spendable from the given addresses",
                out_point
            ))
        })?;
        debug!("forced input {} ({})", utxo.out_point, utxo.value);
        total += utxo.value;
        selected.push(utxo.clone());
    }

    let target = |inputs: usize| {
        request
            .payment
            .checked_add(fees.minimum_fee(inputs))
            .ok_or_else(|| SpendError::InvalidRequest("payment plus fee overflows".to_string()))
    };
    for utxo in catalog.outputs() {
        if total >= target(selected.len())? {
            break;
        }
        if request.forced.contains(&utxo.out_point) {
            continue;
        }
        debug!("selected input {} ({})", utxo.out_point, utxo.value);
        total += utxo.value;
        selected.push(utxo.clone());
    }

    let needed = target(selected.len())?;
    if total < needed {
        let shortfall = needed - total;
        warn!("only {} available, need {}", total, needed);
        return Err(SpendError::InsufficientFunds {
            shortfall,
            available: total,
            needed,
        });
    }

    // Dust-sized leftovers go to the fee, so they need no change output.
    let settlement = fees.settle_change(total, request.payment, selected.len())?;
    info!(
        "selected {} of {} outputs, total {}",
        selected.len(),
        catalog.len(),
        total
    );
    Ok(SelectionResult {
        change_required: settlement.change.is_some(),
        inputs: selected,
        total,
    })
}
