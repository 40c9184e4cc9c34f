use super::*;
use crate::{
    assembler::{Assembler, Outcome},
    catalog::Catalog,
    fee::FeeModel,
    plan, request,
    request::ChangeTarget,
    selector,
};

/// How long the wallet stays unlocked for signing.
pub const UNLOCK_SECONDS: u64 = 5;

#[derive(Debug, Clone, Default)]
pub struct SpendOptions {
    pub min_conf: u32,
    pub conf_target: u16,
    pub fee_rate: Option<FeeRate>,
    pub absolute_fee: Option<Amount>,
    pub dust_threshold: Option<Amount>,
    /// Percent of the payment; `0` disables the check.
    pub max_fee_percent: u64,
    pub change: ChangeTarget,
    pub dry_run: bool,
    pub wallet_passphrase: Option<String>,
}

/// Selects coins for `req` from the node's current unspent set, plans the
/// transaction and pushes it through signing and, unless dry running,
/// broadcast.
pub fn spend<R: NodeRpc + ?Sized>(
    rpc: &R,
    req: &SelectionRequest,
    opts: &SpendOptions,
) -> Result<Outcome, SpendError> {
    request::validate(req)?;

    let catalog = Catalog::fetch(rpc, &req.sources, opts.min_conf)?;
    let policy = rpc.fee_policy(opts.conf_target)?;
    let fees = FeeModel::from_policy(
        &policy,
        opts.fee_rate,
        opts.absolute_fee,
        opts.dust_threshold,
    )?;

    let selection = selector::select_coins(&catalog, req, &fees)?;
    let plan = plan::build_plan(selection, req, &fees, || opts.change.resolve(rpc, req))?;
    plan::check_fee(&plan, plan::fee_limit(req.payment, opts.max_fee_percent))?;

    if let Some(passphrase) = &opts.wallet_passphrase {
        rpc.unlock_wallet(passphrase, UNLOCK_SECONDS)
            .map_err(|e| SpendError::SigningFailed(format!("could not unlock wallet: {}", e)))?;
    }

    Assembler::new(rpc).assemble(plan, opts.dry_run)
}
