pub mod config;
pub mod nodeconf;
pub mod output;

use bitcoin::{Amount, Network};
use config::{Cli, Config};
use datatypes::types::SelectionRequest;
use noderpc::NodeRpc;
use spendtx::{
    assembler::Outcome,
    catalog::{AddressSummary, Catalog},
    request::{self, ChangeTarget},
    spender::{self, SpendOptions},
    SpendError,
};
use tracing::info;

/// What one run of the tool does, decided entirely from operator input
/// before the node is contacted.
#[derive(Debug, Clone)]
pub enum Invocation {
    /// Per-address unspent totals, restricted to `sources` when given.
    List { sources: Vec<String>, min_conf: u32 },
    Spend {
        request: SelectionRequest,
        options: SpendOptions,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Listing(Vec<AddressSummary>),
    Spent(Outcome),
}

impl Invocation {
    pub fn from_cli(
        cli: &Cli,
        cfg: &Config,
        network: Network,
        wallet_passphrase: Option<String>,
    ) -> Result<Self, SpendError> {
        let sources = cli
            .from
            .iter()
            .map(|addr| request::parse_address(addr, network))
            .collect::<Result<Vec<_>, _>>()?;
        let min_conf = cli.min_conf.unwrap_or(cfg.spend.min_conf);

        let Some(amount) = &cli.amount else {
            return Ok(Invocation::List { sources, min_conf });
        };

        let destination = match &cli.to {
            Some(addr) => request::parse_address(addr, network)?,
            None => {
                return Err(SpendError::InvalidRequest(
                    "--to is required when sending".to_string(),
                ))
            }
        };
        let forced = cli
            .forced
            .iter()
            .map(|op| request::parse_out_point(op))
            .collect::<Result<Vec<_>, _>>()?;

        let change = if cli.fresh_change {
            ChangeTarget::Node
        } else if let Some(addr) = &cli.change_address {
            ChangeTarget::Address(request::parse_address(addr, network)?)
        } else {
            ChangeTarget::LastSource
        };

        let options = SpendOptions {
            min_conf,
            conf_target: cfg.spend.conf_target,
            fee_rate: cli.fee_rate.as_deref().map(request::parse_fee_rate).transpose()?,
            absolute_fee: cli.fee.as_deref().map(request::parse_amount).transpose()?,
            dust_threshold: cfg.spend.dust_threshold_sat.map(Amount::from_sat),
            max_fee_percent: cfg.spend.max_fee_percent,
            change,
            dry_run: cli.dry_run,
            wallet_passphrase,
        };

        Ok(Invocation::Spend {
            request: SelectionRequest {
                payment: request::parse_amount(amount)?,
                destination,
                sources,
                forced,
            },
            options,
        })
    }
}

pub fn execute<R: NodeRpc + ?Sized>(rpc: &R, invocation: Invocation) -> Result<Report, SpendError> {
    match invocation {
        Invocation::List { sources, min_conf } => {
            let summary = match Catalog::fetch(rpc, &sources, min_conf) {
                Ok(catalog) => catalog.summary(),
                Err(SpendError::EmptyCatalog) => vec![],
                Err(err) => return Err(err),
            };
            info!("listed {} addresses", summary.len());
            Ok(Report::Listing(summary))
        }
        Invocation::Spend { request, options } => {
            spender::spend(rpc, &request, &options).map(Report::Spent)
        }
    }
}
