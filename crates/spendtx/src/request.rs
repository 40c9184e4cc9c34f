use super::*;
use bitcoin::{Address, Denomination, Network};
use std::str::FromStr;

/// Where change goes when a change output is needed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChangeTarget {
    /// The last source address, so coins stay within the coin control set.
    #[default]
    LastSource,
    Address(String),
    /// A fresh change address from the node wallet.
    Node,
}

impl ChangeTarget {
    /// Only asks the node when the plan actually has change.
    pub fn resolve<R: NodeRpc + ?Sized>(
        &self,
        rpc: &R,
        request: &SelectionRequest,
    ) -> Result<String, SpendError> {
        match self {
            ChangeTarget::LastSource => request.sources.last().cloned().ok_or_else(|| {
                SpendError::InvalidRequest("no source address for change".to_string())
            }),
            ChangeTarget::Address(addr) => Ok(addr.clone()),
            ChangeTarget::Node => Ok(rpc.raw_change_address()?),
        }
    }
}

pub fn validate(request: &SelectionRequest) -> Result<(), SpendError> {
    if request.payment == Amount::ZERO {
        return Err(invalid("payment amount must be positive"));
    }
    if request.payment > Amount::MAX_MONEY {
        return Err(invalid("payment amount exceeds the coin supply"));
    }
    if request.destination.is_empty() {
        return Err(invalid("destination address is required"));
    }
    if request.sources.is_empty() {
        return Err(invalid("at least one source address is required"));
    }
    if request.sources.iter().any(|source| source.is_empty()) {
        return Err(invalid("source addresses must not be empty"));
    }
    Ok(())
}

/// Parses an address and checks it belongs to `network`.
pub fn parse_address(addr: &str, network: Network) -> Result<String, SpendError> {
    let unchecked = Address::from_str(addr.trim())
        .map_err(|e| SpendError::InvalidRequest(format!("malformed address {}: {}", addr, e)))?;
    let checked = unchecked.require_network(network).map_err(|e| {
        SpendError::InvalidRequest(format!("address {} is not for {}: {}", addr, network, e))
    })?;
    Ok(checked.to_string())
}

/// Amounts are decimal coins ("0.5") or satoshis with a suffix ("1500 sat").
/// Parsed exactly; never through floating point.
pub fn parse_amount(input: &str) -> Result<Amount, SpendError> {
    let trimmed = input.trim();
    let lower = trimmed.to_ascii_lowercase();
    let parsed = match lower
        .strip_suffix("sats")
        .or_else(|| lower.strip_suffix("sat"))
    {
        Some(number) => Amount::from_str_in(number.trim(), Denomination::Satoshi),
        None => {
            let number = lower.strip_suffix("btc").unwrap_or(&lower);
            Amount::from_str_in(number.trim(), Denomination::Bitcoin)
        }
    };
    let amount =
        parsed.map_err(|e| SpendError::InvalidRequest(format!("bad amount {:?}: {}", input, e)))?;
    if amount > Amount::MAX_MONEY {
        return Err(SpendError::InvalidRequest(format!(
            "amount {:?} exceeds the coin supply",
            input
        )));
    }
    Ok(amount)
}

/// Fee rate in sat/vB with up to three decimals ("0.1", "2.5"), kept
/// exact as sat/kvB.
pub fn parse_fee_rate(input: &str) -> Result<FeeRate, SpendError> {
    let bad = || SpendError::InvalidRequest(format!("bad fee rate {:?}", input));
    let trimmed = input.trim();
    let number = trimmed
        .strip_suffix("sat/vB")
        .or_else(|| trimmed.strip_suffix("sat/vb"))
        .unwrap_or(trimmed)
        .trim();

    let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(bad());
    }
    if frac.len() > 3 || !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return Err(bad());
    }
    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| bad())?
    };
    let frac: u64 = if frac.is_empty() {
        0
    } else {
        format!("{:0<3}", frac).parse().map_err(|_| bad())?
    };

    whole
        .checked_mul(1000)
        .and_then(|kvb| kvb.checked_add(frac))
        .map(FeeRate)
        .ok_or_else(bad)
}

pub fn parse_out_point(input: &str) -> Result<OutPoint, SpendError> {
    OutPoint::from_str(input.trim())
        .map_err(|e| SpendError::InvalidRequest(format!("bad output {:?}: {}", input, e)))
}

fn invalid(reason: &str) -> SpendError {
    SpendError::InvalidRequest(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use noderpc::mock::MockNode;

    fn request() -> SelectionRequest {
        SelectionRequest {
            payment: Amount::from_sat(1000),
            destination: "dest".to_string(),
            sources: vec!["a".to_string(), "b".to_string()],
            forced: vec![],
        }
    }

    #[test]
    fn rejects_zero_payment() {
        let mut req = request();
        req.payment = Amount::ZERO;
        assert!(matches!(validate(&req), Err(SpendError::InvalidRequest(_))));
    }

    #[test]
    fn rejects_missing_addresses() {
        let mut req = request();
        req.sources.clear();
        assert!(validate(&req).is_err());

        let mut req = request();
        req.destination.clear();
        assert!(validate(&req).is_err());

        assert!(validate(&request()).is_ok());
    }

    #[test]
    fn amounts_parse_exactly() {
        assert_eq!(parse_amount("0.5").unwrap(), Amount::from_sat(50_000_000));
        assert_eq!(parse_amount("0.00000001 BTC").unwrap(), Amount::from_sat(1));
        assert_eq!(parse_amount("1500 sat").unwrap(), Amount::from_sat(1500));
        assert_eq!(parse_amount("1500sats").unwrap(), Amount::from_sat(1500));
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("0.000000001").is_err());
        assert!(parse_amount("lots").is_err());
    }

    #[test]
    fn amounts_above_supply_are_invalid() {
        assert_eq!(parse_amount("21000000").unwrap(), Amount::MAX_MONEY);
        assert!(matches!(
            parse_amount("21000000.00000001"),
            Err(SpendError::InvalidRequest(_))
        ));
        assert!(matches!(
            parse_amount("184467440737.09551615"),
            Err(SpendError::InvalidRequest(_))
        ));

        let mut req = request();
        req.payment = Amount::from_sat(u64::MAX);
        assert!(matches!(validate(&req), Err(SpendError::InvalidRequest(_))));
    }

    #[test]
    fn fee_rates_allow_fractions() {
        assert_eq!(parse_fee_rate("0.1").unwrap(), FeeRate(100));
        assert_eq!(parse_fee_rate("2.5").unwrap(), FeeRate(2500));
        assert_eq!(parse_fee_rate("3").unwrap(), FeeRate(3000));
        assert_eq!(parse_fee_rate("1.234 sat/vB").unwrap(), FeeRate(1234));
        assert!(parse_fee_rate("0.0001").is_err());
        assert!(parse_fee_rate("-1").is_err());
        assert!(parse_fee_rate(".").is_err());
        assert!(parse_fee_rate("fast").is_err());
    }

    #[test]
    fn addresses_are_checked_against_network() {
        let mainnet = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

        assert_eq!(parse_address(mainnet, Network::Bitcoin).unwrap(), mainnet);
        assert!(parse_address(mainnet, Network::Regtest).is_err());
        assert!(parse_address("not-an-address", Network::Bitcoin).is_err());
    }

    #[test]
    fn out_points_parse() {
        let op = parse_out_point(
            "903e78a5ce44c985459ff91fb9db49338b5901b8cfdbfa1aa875efc53eed4a2f:3",
        )
        .unwrap();
        assert_eq!(op.vout, 3);
        assert!(parse_out_point("903e78a5:x").is_err());
    }

    #[test]
    fn change_defaults_to_last_source() {
        let node = MockNode::new(vec![]);

        let addr = ChangeTarget::default().resolve(&node, &request()).unwrap();
        assert_eq!(addr, "b");
        assert!(node.calls().is_empty());

        let addr = ChangeTarget::Node.resolve(&node, &request()).unwrap();
        assert_eq!(addr, "node-change");
        assert!(node.called("getrawchangeaddress"));
    }
}
