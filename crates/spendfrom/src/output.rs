//! Renders a run's result for stdout. Text mode prints what a shell script
//! wants to capture: the txid after a broadcast, the signed hex after a dry
//! run.

use crate::Report;
use anyhow::Result;
use bitcoin::{Amount, Denomination};
use serde_json::json;
use spendtx::assembler::Outcome;

/// Fixed eight decimal places, exact.
pub fn btc(amount: Amount) -> String {
    format!("{:.8}", amount.display_in(Denomination::Bitcoin))
}

pub fn render(report: &Report, as_json: bool) -> Result<String> {
    if as_json {
        render_json(report)
    } else {
        Ok(render_text(report))
    }
}

fn render_text(report: &Report) -> String {
    match report {
        Report::Listing(summary) => summary
            .iter()
            .map(|entry| {
                format!(
                    "{} : {} ({} output{})",
                    entry.address,
                    btc(entry.total),
                    entry.count,
                    if entry.count == 1 { "" } else { "s" }
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Report::Spent(Outcome::Broadcast { handle, .. }) => handle.txid.to_string(),
        Report::Spent(Outcome::DryRun { signed, .. }) => signed.hex.clone(),
    }
}

fn render_json(report: &Report) -> Result<String> {
    let value = match report {
        Report::Listing(summary) => json!(summary
            .iter()
            .map(|entry| json!({
                "address": entry.address,
                "amount": btc(entry.total),
                "amount_sat": entry.total.to_sat(),
                "outputs": entry.count,
            }))
            .collect::<Vec<_>>()),
        Report::Spent(outcome) => {
            let plan = outcome.plan();
            let mut value = json!({
                "inputs": plan.inputs.iter().map(|utxo| utxo.out_point.to_string()).collect::<Vec<_>>(),
                "payment": { "address": plan.payment.address, "amount_sat": plan.payment.value.to_sat() },
                "change": plan.change.as_ref().map(|change| json!({
                    "address": change.address,
                    "amount_sat": change.value.to_sat(),
                })),
                "fee_sat": plan.fee.to_sat(),
                "vsize": plan.vsize,
            });
            match outcome {
                Outcome::Broadcast { handle, .. } => {
                    value["broadcast"] = json!(true);
                    value["txid"] = json!(handle.txid.to_string());
                }
                Outcome::DryRun { signed, .. } => {
                    value["broadcast"] = json!(false);
                    value["hex"] = json!(signed.hex);
                }
            }
            value
        }
    };
    Ok(serde_json::to_string_pretty(&value)?)
}
