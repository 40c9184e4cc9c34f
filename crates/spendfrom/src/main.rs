use anyhow::{Context, Result};
use clap::Parser;
use noderpc::{BtcCli, RpcError};
use spendfrom::{
    config::{self, Cli, Config, LogConfig},
    execute, output, Invocation,
};
use spendtx::SpendError;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let cfg = match config::read_config(&cli) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {:#}", err);
            return ExitCode::from(SpendError::EXIT_GENERIC);
        }
    };

    // TIPS: guard must have same long lifetime with main
    let _guard = logger_init(&cfg.log);

    match run(&cli, &cfg) {
        Ok(rendered) => {
            if !rendered.is_empty() {
                println!("{}", rendered);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{:#}", err);
            eprintln!("error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: &Cli, cfg: &Config) -> Result<String> {
    let env = |key: &str| std::env::var(key).ok();
    let node = config::node_config(cli, cfg, env)?;
    debug!("config {:?}, node {:?}", cfg, node);

    let invocation = Invocation::from_cli(
        cli,
        cfg,
        node.network,
        config::wallet_passphrase(cfg, env),
    )?;
    let rpc = BtcCli::new(&node).map_err(SpendError::from)?;

    info!("start spendfrom against {}", node.url);
    let report = execute(&rpc, invocation)?;
    output::render(&report, cli.json).context("failed to render result")
}

fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(err) = err.downcast_ref::<SpendError>() {
        return err.exit_code();
    }
    if err.downcast_ref::<RpcError>().is_some() {
        return SpendError::EXIT_RPC;
    }
    SpendError::EXIT_GENERIC
}

fn logger_init(cfg: &LogConfig) -> Option<WorkerGuard> {
    let (file_layer, guard) = match &cfg.dir {
        Some(dir) => {
            let file_appender = RollingFileAppender::new(Rotation::HOURLY, dir, "spendfrom.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(LevelFilter::DEBUG)
                .boxed();
            (Some(file_layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    let formatting_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    Registry::default()
        .with(file_layer)
        .with(formatting_layer)
        .init();

    guard
}
