use crate::nodeconf::{self, NodeConf};
use anyhow::{anyhow, Context, Result};
use bitcoin::Network;
use bitcoincore_rpc::Auth;
use clap::Parser;
use noderpc::NodeConfig;
use serde::Deserialize;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_CONFIG: &str = "spendfrom.toml";

pub const ENV_RPC_USER: &str = "SPENDFROM_RPC_USER";
pub const ENV_RPC_PASS: &str = "SPENDFROM_RPC_PASS";
pub const ENV_RPC_URL: &str = "SPENDFROM_RPC_URL";
pub const ENV_WALLET_PASSPHRASE: &str = "SPENDFROM_WALLET_PASSPHRASE";

/// Spend exactly the coins you choose. Without --amount, lists the unspent
/// value held by each address.
#[derive(Parser, Debug, Default)]
#[command(name = "spendfrom", version, about)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: String,

    /// Node data directory, read for bitcoin.conf and the auth cookie
    #[arg(long)]
    pub datadir: Option<PathBuf>,

    /// bitcoin, testnet, signet or regtest
    #[arg(long)]
    pub network: Option<String>,

    /// Source addresses to spend from, comma separated
    #[arg(long, value_delimiter = ',')]
    pub from: Vec<String>,

    /// Destination address
    #[arg(long)]
    pub to: Option<String>,

    /// Amount to send, in coins ("0.5") or satoshis ("1500 sat")
    #[arg(long)]
    pub amount: Option<String>,

    /// Spend this output first (txid:vout); repeatable
    #[arg(long = "use", value_name = "TXID:VOUT")]
    pub forced: Vec<String>,

    /// Sign but do not broadcast
    #[arg(long)]
    pub dry_run: bool,

    /// Fee rate in sat/vB, overriding the node estimate; decimals allowed
    #[arg(long, value_name = "SAT/VB", conflicts_with = "fee")]
    pub fee_rate: Option<String>,

    /// Absolute fee, in the same units as --amount
    #[arg(long)]
    pub fee: Option<String>,

    /// Send change here instead of the last source address
    #[arg(long, conflicts_with = "fresh_change")]
    pub change_address: Option<String>,

    /// Ask the wallet for a new change address
    #[arg(long)]
    pub fresh_change: bool,

    /// Minimum confirmations for an output to be spendable
    #[arg(long)]
    pub min_conf: Option<u32>,

    /// Machine readable output
    #[arg(long)]
    pub json: bool,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub bitcoin: BitcoinConfig,
    pub spend: SpendConfig,
    pub log: LogConfig,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct BitcoinConfig {
    pub network: Option<String>,
    /// `host:port` or a full URL.
    pub endpoint: Option<String>,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub cookie_file: Option<PathBuf>,
    pub timeout_secs: u64,
    pub wallet_passphrase: Option<String>,
}

impl Default for BitcoinConfig {
    fn default() -> Self {
        Self {
            network: None,
            endpoint: None,
            user: None,
            pass: None,
            cookie_file: None,
            timeout_secs: 30,
            wallet_passphrase: None,
        }
    }
}

impl fmt::Debug for BitcoinConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |set: bool| if set { "<redacted>" } else { "<unset>" };
        f.debug_struct("BitcoinConfig")
            .field("network", &self.network)
            .field("endpoint", &self.endpoint)
            .field("user", &self.user)
            .field("pass", &redacted(self.pass.is_some()))
            .field("cookie_file", &self.cookie_file)
            .field("timeout_secs", &self.timeout_secs)
            .field(
                "wallet_passphrase",
                &redacted(self.wallet_passphrase.is_some()),
            )
            .finish()
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SpendConfig {
    pub min_conf: u32,
    pub conf_target: u16,
    /// Fee ceiling as a percentage of the payment; `0` disables it.
    pub max_fee_percent: u64,
    /// Overrides the dust threshold derived from the node's relay fee.
    pub dust_threshold_sat: Option<u64>,
}

impl Default for SpendConfig {
    fn default() -> Self {
        Self {
            min_conf: 1,
            conf_target: 6,
            max_fee_percent: 1,
            dust_threshold_sat: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct LogConfig {
    /// Hourly rolling debug log; stderr only when unset.
    pub dir: Option<PathBuf>,
}

/// A missing default file means built-in defaults; a named file must exist.
pub fn read_config(cli: &Cli) -> Result<Config> {
    if cli.config == DEFAULT_CONFIG && !Path::new(DEFAULT_CONFIG).exists() {
        return Ok(Config::default());
    }
    load_config(&cli.config)
}

pub fn load_config(path: &str) -> Result<Config> {
    let config_content =
        fs::read_to_string(path).with_context(|| format!("failed to read config file {}", path))?;
    let config: Config = toml::from_str(&config_content)
        .with_context(|| format!("failed to parse config file {}", path))?;

    Ok(config)
}

pub fn parse_network(name: &str) -> Result<Network> {
    match name.trim().to_ascii_lowercase().as_str() {
        "bitcoin" | "main" | "mainnet" => Ok(Network::Bitcoin),
        "testnet" | "test" | "testnet3" => Ok(Network::Testnet),
        "signet" => Ok(Network::Signet),
        "regtest" => Ok(Network::Regtest),
        other => Err(anyhow!("unknown network {:?}", other)),
    }
}

/// Resolves how to reach the node. Precedence, highest first: command line,
/// environment, config file, the node's bitcoin.conf, then built-in defaults.
pub fn node_config<E>(cli: &Cli, cfg: &Config, env: E) -> Result<NodeConfig>
where
    E: Fn(&str) -> Option<String>,
{
    let node_conf = match &cli.datadir {
        Some(dir) if dir.join(nodeconf::FILE_NAME).exists() => Some(NodeConf::read(dir)?),
        _ => None,
    };

    let network = match cli.network.as_deref().or(cfg.bitcoin.network.as_deref()) {
        Some(name) => parse_network(name)?,
        None => node_conf
            .as_ref()
            .and_then(NodeConf::network)
            .unwrap_or(Network::Bitcoin),
    };

    let url = match env(ENV_RPC_URL).or_else(|| cfg.bitcoin.endpoint.clone()) {
        Some(endpoint) if endpoint.contains("://") => endpoint,
        Some(endpoint) => format!("http://{}", endpoint),
        None => {
            let host = node_conf
                .as_ref()
                .and_then(|conf| conf.get("rpcconnect", network))
                .unwrap_or("127.0.0.1");
            let port = match node_conf.as_ref().and_then(|conf| conf.get("rpcport", network)) {
                Some(port) => port
                    .parse::<u16>()
                    .with_context(|| format!("bad rpcport {:?} in bitcoin.conf", port))?,
                None => nodeconf::default_rpc_port(network),
            };
            format!("http://{}:{}", host, port)
        }
    };

    Ok(NodeConfig {
        url,
        auth: resolve_auth(cli, cfg, node_conf.as_ref(), network, &env),
        network,
        timeout: Duration::from_secs(cfg.bitcoin.timeout_secs),
    })
}

fn resolve_auth<E>(
    cli: &Cli,
    cfg: &Config,
    node_conf: Option<&NodeConf>,
    network: Network,
    env: &E,
) -> Auth
where
    E: Fn(&str) -> Option<String>,
{
    let user = env(ENV_RPC_USER).or_else(|| cfg.bitcoin.user.clone());
    let pass = env(ENV_RPC_PASS).or_else(|| cfg.bitcoin.pass.clone());
    if let (Some(user), Some(pass)) = (user, pass) {
        return Auth::UserPass(user, pass);
    }
    if let Some(cookie) = &cfg.bitcoin.cookie_file {
        return Auth::CookieFile(cookie.clone());
    }
    if let Some(conf) = node_conf {
        if let (Some(user), Some(pass)) = (
            conf.get("rpcuser", network),
            conf.get("rpcpassword", network),
        ) {
            return Auth::UserPass(user.to_string(), pass.to_string());
        }
    }
    if let Some(dir) = &cli.datadir {
        let cookie = nodeconf::network_dir(dir, network).join(".cookie");
        if cookie.exists() {
            return Auth::CookieFile(cookie);
        }
    }
    Auth::None
}

pub fn wallet_passphrase<E>(cfg: &Config, env: E) -> Option<String>
where
    E: Fn(&str) -> Option<String>,
{
    env(ENV_WALLET_PASSPHRASE).or_else(|| cfg.bitcoin.wallet_passphrase.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn temp_datadir(name: &str, conf: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("spendfrom-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(nodeconf::FILE_NAME), conf).unwrap();
        dir
    }

    #[test]
    fn load_config_test() {
        let cfg_path = "spendfrom.example.toml";
        let cfg = load_config(cfg_path).unwrap();

        assert_eq!(cfg.bitcoin.network.as_deref(), Some("regtest"));
        assert_eq!(cfg.bitcoin.endpoint.as_deref(), Some("127.0.0.1:18443"));
        assert_eq!(cfg.bitcoin.timeout_secs, 15);
        assert_eq!(cfg.spend.conf_target, 6);
        assert_eq!(cfg.spend.max_fee_percent, 1);
        assert!(cfg.log.dir.is_some());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();

        assert_eq!(cfg.bitcoin.timeout_secs, 30);
        assert_eq!(cfg.spend.min_conf, 1);
        assert_eq!(cfg.spend.max_fee_percent, 1);
        assert!(cfg.log.dir.is_none());
    }

    #[test]
    fn named_config_must_exist() {
        let cli = Cli {
            config: "does-not-exist.toml".to_string(),
            ..Default::default()
        };
        assert!(read_config(&cli).is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let cfg: Config = toml::from_str(
            "[bitcoin]\nuser = \"meta\"\npass = \"hunter2\"\nwallet_passphrase = \"open sesame\"\n",
        )
        .unwrap();

        let printed = format!("{:?}", cfg);
        assert!(printed.contains("meta"));
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("open sesame"));
    }

    #[test]
    fn defaults_reach_local_mainnet_node() {
        let node = node_config(&Cli::default(), &Config::default(), no_env).unwrap();

        assert_eq!(node.url, "http://127.0.0.1:8332");
        assert_eq!(node.network, Network::Bitcoin);
        assert!(matches!(node.auth, Auth::None));
        assert_eq!(node.timeout, Duration::from_secs(30));
    }

    #[test]
    fn network_picks_default_port() {
        let cli = Cli {
            network: Some("signet".to_string()),
            ..Default::default()
        };
        let node = node_config(&cli, &Config::default(), no_env).unwrap();
        assert_eq!(node.url, "http://127.0.0.1:38332");
        assert_eq!(node.network, Network::Signet);

        let cli = Cli {
            network: Some("moon".to_string()),
            ..Default::default()
        };
        assert!(node_config(&cli, &Config::default(), no_env).is_err());
    }

    #[test]
    fn environment_overrides_config() {
        let cfg: Config = toml::from_str(
            "[bitcoin]\nendpoint = \"10.0.0.1:8332\"\nuser = \"cfg\"\npass = \"cfgpass\"\n",
        )
        .unwrap();
        let env: HashMap<&str, &str> = [
            (ENV_RPC_USER, "envuser"),
            (ENV_RPC_PASS, "envpass"),
            (ENV_RPC_URL, "https://node.example:443"),
        ]
        .into_iter()
        .collect();

        let node =
            node_config(&Cli::default(), &cfg, |key| env.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(node.url, "https://node.example:443");
        match node.auth {
            Auth::UserPass(user, pass) => {
                assert_eq!(user, "envuser");
                assert_eq!(pass, "envpass");
            }
            other => panic!("unexpected auth {:?}", other),
        }

        let node = node_config(&Cli::default(), &cfg, no_env).unwrap();
        assert_eq!(node.url, "http://10.0.0.1:8332");
        assert!(matches!(node.auth, Auth::UserPass(ref user, _) if user == "cfg"));
    }

    #[test]
    fn datadir_supplies_network_port_and_credentials() {
        let dir = temp_datadir(
            "conf",
            "regtest=1\n[regtest]\nrpcport=18555\nrpcuser=alice\nrpcpassword=pw\n",
        );
        let cli = Cli {
            datadir: Some(dir.clone()),
            ..Default::default()
        };

        let node = node_config(&cli, &Config::default(), no_env).unwrap();
        assert_eq!(node.network, Network::Regtest);
        assert_eq!(node.url, "http://127.0.0.1:18555");
        assert!(matches!(node.auth, Auth::UserPass(ref user, _) if user == "alice"));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn cookie_used_without_passwords() {
        let dir = temp_datadir("cookie", "testnet=1\n");
        let net_dir = nodeconf::network_dir(&dir, Network::Testnet);
        fs::create_dir_all(&net_dir).unwrap();
        fs::write(net_dir.join(".cookie"), "__cookie__:abc").unwrap();
        let cli = Cli {
            datadir: Some(dir.clone()),
            ..Default::default()
        };

        let node = node_config(&cli, &Config::default(), no_env).unwrap();
        assert_eq!(node.url, "http://127.0.0.1:18332");
        assert!(matches!(node.auth, Auth::CookieFile(ref path) if *path == net_dir.join(".cookie")));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn passphrase_from_env_first() {
        let cfg: Config = toml::from_str("[bitcoin]\nwallet_passphrase = \"cfg\"\n").unwrap();

        assert_eq!(wallet_passphrase(&cfg, no_env).as_deref(), Some("cfg"));
        assert_eq!(
            wallet_passphrase(&cfg, |_| Some("env".to_string())).as_deref(),
            Some("env")
        );
        assert_eq!(wallet_passphrase(&Config::default(), no_env), None);
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "spendfrom",
            "--from",
            "a,b",
            "--to",
            "c",
            "--amount",
            "0.1",
            "--use",
            "903e78a5ce44c985459ff91fb9db49338b5901b8cfdbfa1aa875efc53eed4a2f:1",
            "--dry-run",
            "--fee-rate",
            "0.5",
        ])
        .unwrap();

        assert_eq!(cli.from, vec!["a", "b"]);
        assert_eq!(cli.forced.len(), 1);
        assert!(cli.dry_run);
        assert_eq!(cli.fee_rate.as_deref(), Some("0.5"));
        assert_eq!(cli.config, DEFAULT_CONFIG);

        assert!(Cli::try_parse_from(["spendfrom", "--fee-rate", "3", "--fee", "0.0001"]).is_err());
    }
}
