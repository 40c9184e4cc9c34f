//! Reader for the node's own `bitcoin.conf`, so credentials and ports
//! need not be repeated in our configuration.

use anyhow::{Context, Result};
use bitcoin::Network;
use std::{collections::HashMap, fmt, fs, path::Path};

pub const FILE_NAME: &str = "bitcoin.conf";

#[derive(Default, Clone)]
pub struct NodeConf {
    global: HashMap<String, String>,
    sections: HashMap<String, HashMap<String, String>>,
}

impl fmt::Debug for NodeConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.global.keys().collect();
        keys.sort();
        f.debug_struct("NodeConf")
            .field("keys", &keys)
            .field("sections", &self.sections.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl NodeConf {
    pub fn read(datadir: &Path) -> Result<Self> {
        let path = datadir.join(FILE_NAME);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    /// `key=value` lines, `#` comments and `[main]`/`[test]`/`[signet]`/
    /// `[regtest]` sections. Later values win.
    pub fn parse(content: &str) -> Self {
        let mut conf = NodeConf::default();
        let mut section: Option<String> = None;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = Some(name.trim().to_string());
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim().to_string(), value.trim().to_string());
            match &section {
                Some(name) => {
                    conf.sections
                        .entry(name.clone())
                        .or_default()
                        .insert(key, value);
                }
                None => {
                    conf.global.insert(key, value);
                }
            }
        }
        conf
    }

    /// Network-section value, falling back to the global one.
    pub fn get(&self, key: &str, network: Network) -> Option<&str> {
        self.sections
            .get(section_name(network))
            .and_then(|values| values.get(key))
            .or_else(|| self.global.get(key))
            .map(String::as_str)
    }

    /// Chain selected by the node configuration, if any.
    pub fn network(&self) -> Option<Network> {
        if let Some(chain) = self.global.get("chain") {
            return match chain.as_str() {
                "main" => Some(Network::Bitcoin),
                "test" => Some(Network::Testnet),
                "signet" => Some(Network::Signet),
                "regtest" => Some(Network::Regtest),
                _ => None,
            };
        }
        let enabled = |key: &str| self.global.get(key).map(|v| v == "1").unwrap_or(false);
        if enabled("regtest") {
            Some(Network::Regtest)
        } else if enabled("testnet") {
            Some(Network::Testnet)
        } else if enabled("signet") {
            Some(Network::Signet)
        } else {
            None
        }
    }
}

fn section_name(network: Network) -> &'static str {
    match network {
        Network::Testnet => "test",
        Network::Signet => "signet",
        Network::Regtest => "regtest",
        _ => "main",
    }
}

/// Where the node keeps per-network data such as the `.cookie` file.
pub fn network_dir(datadir: &Path, network: Network) -> std::path::PathBuf {
    match network {
        Network::Testnet => datadir.join("testnet3"),
        Network::Signet => datadir.join("signet"),
        Network::Regtest => datadir.join("regtest"),
        _ => datadir.to_path_buf(),
    }
}

pub fn default_rpc_port(network: Network) -> u16 {
    match network {
        Network::Testnet => 18332,
        Network::Signet => 38332,
        Network::Regtest => 18443,
        _ => 8332,
    }
}
