use super::*;
use crate::vsize::get_tx_vsize;
use bitcoin::{consensus::encode::deserialize_hex, Transaction};
use datatypes::types::{SignedTransaction, TransactionHandle};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyState {
    Building,
    AwaitingSignature,
    AwaitingBroadcast,
    Completed,
    Failed(String),
}

impl fmt::Display for AssemblyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblyState::Building => write!(f, "building"),
            AssemblyState::AwaitingSignature => write!(f, "awaiting signature"),
            AssemblyState::AwaitingBroadcast => write!(f, "awaiting broadcast"),
            AssemblyState::Completed => write!(f, "completed"),
            AssemblyState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Broadcast {
        plan: TransactionPlan,
        handle: TransactionHandle,
    },
    /// Signed but deliberately not broadcast.
    DryRun {
        plan: TransactionPlan,
        signed: SignedTransaction,
    },
}

impl Outcome {
    pub fn plan(&self) -> &TransactionPlan {
        match self {
            Outcome::Broadcast { plan, .. } | Outcome::DryRun { plan, .. } => plan,
        }
    }
}

/// Drives one plan through create, sign and broadcast on the node. An
/// assembler runs exactly once; a signed transaction is never resubmitted.
pub struct Assembler<'a, R: NodeRpc + ?Sized> {
    rpc: &'a R,
    state: AssemblyState,
    history: Vec<AssemblyState>,
}

impl<'a, R: NodeRpc + ?Sized> Assembler<'a, R> {
    pub fn new(rpc: &'a R) -> Self {
        Self {
            rpc,
            state: AssemblyState::Building,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> &AssemblyState {
        &self.state
    }

    /// States already left behind, oldest first.
    pub fn history(&self) -> &[AssemblyState] {
        &self.history
    }

    pub fn assemble(
        &mut self,
        plan: TransactionPlan,
        dry_run: bool,
    ) -> Result<Outcome, SpendError> {
        if self.state != AssemblyState::Building {
            return Err(SpendError::InvalidRequest(format!(
                "assembler already {}",
                self.state
            )));
        }

        match self.run(plan, dry_run) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.advance(AssemblyState::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    fn run(&mut self, plan: TransactionPlan, dry_run: bool) -> Result<Outcome, SpendError> {
        if !plan.is_balanced() {
            return Err(SpendError::InvalidRequest(
                "refusing to assemble an unbalanced plan".to_string(),
            ));
        }

        let raw_hex = self
            .rpc
            .create_raw_transaction(&plan.out_points(), &plan.outputs())?;
        let raw_tx = decode("createrawtransaction", &raw_hex)?;
        check_matches_plan(&raw_tx, &plan)?;
        self.advance(AssemblyState::AwaitingSignature);

        let signed = self
            .rpc
            .sign_raw_transaction(&raw_hex)
            .map_err(|e| SpendError::SigningFailed(e.to_string()))?;
        if !signed.complete {
            let reason = if signed.errors.is_empty() {
                "node could not sign every input".to_string()
            } else {
                signed.errors.join("; ")
            };
            return Err(SpendError::SigningFailed(reason));
        }
        let signed_tx = decode("signrawtransactionwithwallet", &signed.hex)?;
        check_matches_plan(&signed_tx, &plan)?;
        let txid = signed_tx.compute_txid();
        info!(
            "signed {} ({} vB, estimated {} vB)",
            txid,
            get_tx_vsize(&signed_tx),
            plan.vsize
        );
        self.advance(AssemblyState::AwaitingBroadcast);

        if dry_run {
            info!("dry run, not broadcasting {}", txid);
            return Ok(Outcome::DryRun { plan, signed });
        }

        match self.rpc.send_raw_transaction(&signed.hex) {
            Ok(handle) => {
                info!("broadcast {}", handle.txid);
                self.advance(AssemblyState::Completed);
                Ok(Outcome::Broadcast { plan, handle })
            }
            Err(err) if err.cause.is_definitive() => {
                warn!("node rejected {}: {}", txid, err);
                Err(SpendError::Rpc(err))
            }
            Err(err) => {
                warn!("broadcast of {} has unknown outcome: {}", txid, err);
                Err(SpendError::SubmissionUncertain {
                    txid: txid.to_string(),
                    cause: err.to_string(),
                })
            }
        }
    }

    fn advance(&mut self, next: AssemblyState) {
        debug!("assembler {} -> {}", self.state, next);
        let prev = std::mem::replace(&mut self.state, next);
        self.history.push(prev);
    }
}

fn decode(method: &'static str, hex: &str) -> Result<Transaction, SpendError> {
    deserialize_hex::<Transaction>(hex).map_err(|e| {
        SpendError::Rpc(RpcError::new(method, RpcCause::Malformed(e.to_string())))
    })
}

/// The node must build exactly the transaction that was planned.
fn check_matches_plan(tx: &Transaction, plan: &TransactionPlan) -> Result<(), SpendError> {
    let spent: Vec<OutPoint> = tx.input.iter().map(|input| input.previous_output).collect();
    if spent != plan.out_points() {
        return Err(SpendError::InvalidRequest(
            "node transaction spends different inputs than planned".to_string(),
        ));
    }

    let paid: Amount = tx.output.iter().map(|output| output.value).sum();
    if paid != plan.output_total() {
        return Err(SpendError::InvalidRequest(format!(
            "node transaction pays {} but the plan pays {}",
            paid,
            plan.output_total()
        )));
    }
    Ok(())
}
