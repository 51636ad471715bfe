use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tracing::{info, warn};

use crate::cg::BalanceTolerance;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub balance: BalanceConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            balance: BalanceConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
    serve_docs: bool,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const DEFAULT_SERVE_DOCS: bool = true;

    const HOST_VAR: &'static str = "FREIGHT_CG_API_HOST";
    const PORT_VAR: &'static str = "FREIGHT_CG_API_PORT";
    const DOCS_VAR: &'static str = "FREIGHT_CG_API_DOCS";

    fn from_env() -> Self {
        let host_value =
            env_string(Self::HOST_VAR).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    "Could not parse {} ('{}'): {}. Using {}.",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match env_string(Self::PORT_VAR) {
            Some(raw) => parse_port(&raw).unwrap_or_else(|reason| {
                warn!(
                    "{} ('{}') {}. Using {}.",
                    Self::PORT_VAR,
                    raw,
                    reason,
                    Self::DEFAULT_PORT
                );
                Self::DEFAULT_PORT
            }),
            None => Self::DEFAULT_PORT,
        };

        let serve_docs = env_string(Self::DOCS_VAR)
            .and_then(|raw| parse_bool(&raw, Self::DOCS_VAR))
            .unwrap_or(Self::DEFAULT_SERVE_DOCS);

        Self {
            bind_ip,
            display_host: effective_host,
            port,
            serve_docs,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the OpenAPI document and its viewer are mounted.
    pub fn serve_docs(&self) -> bool {
        self.serve_docs
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Configuration for the balance classification.
#[derive(Clone, Debug)]
pub struct BalanceConfig {
    tolerance: BalanceTolerance,
}

impl BalanceConfig {
    const LENGTH_RATIO_VAR: &'static str = "FREIGHT_CG_TOLERANCE_LENGTH_RATIO";
    const WIDTH_RATIO_VAR: &'static str = "FREIGHT_CG_TOLERANCE_WIDTH_RATIO";

    fn from_env() -> Self {
        let length_ratio = load_f64_with_warning(
            Self::LENGTH_RATIO_VAR,
            BalanceTolerance::DEFAULT_LENGTH_RATIO,
            |value| (0.0..=1.0).contains(&value),
            "must be between 0 and 1",
            "Adjusted length tolerance changes which loads count as balanced",
        );

        let width_ratio = load_f64_with_warning(
            Self::WIDTH_RATIO_VAR,
            BalanceTolerance::DEFAULT_WIDTH_RATIO,
            |value| (0.0..=1.0).contains(&value),
            "must be between 0 and 1",
            "Adjusted width tolerance changes which loads count as balanced",
        );

        Self {
            tolerance: BalanceTolerance {
                length_ratio,
                width_ratio,
            },
        }
    }

    /// Returns the configured default tolerance.
    pub fn tolerance(&self) -> BalanceTolerance {
        self.tolerance
    }
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            tolerance: BalanceTolerance::default(),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_port(raw: &str) -> Result<u16, String> {
    match raw.trim().parse::<u16>() {
        Ok(0) => Err("must not be 0".to_string()),
        Ok(value) => Ok(value),
        Err(err) => Err(format!("could not be parsed: {}", err)),
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                "Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

fn parse_f64_checked(
    raw: &str,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
) -> Result<f64, String> {
    match raw.trim().parse::<f64>() {
        Ok(value) if validator(value) => Ok(value),
        Ok(_) => Err(format!("contains invalid value '{}': {}", raw, invalid_hint)),
        Err(err) => Err(format!("could not parse '{}' as number: {}", raw, err)),
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    let Some(raw) = env_string(var_name) else {
        return default;
    };

    match parse_f64_checked(&raw, validator, invalid_hint) {
        Ok(value) => {
            let tolerance = (default.abs().max(1.0)) * 1e-9;
            if (value - default).abs() > tolerance {
                info!("{} ({} = {}).", warning, var_name, value);
            }
            value
        }
        Err(reason) => {
            warn!("{} {}. Using {}.", var_name, reason, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_true_values() {
        assert_eq!(parse_bool("1", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("true", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("yes", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("y", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("on", "TEST_VAR"), Some(true));

        assert_eq!(parse_bool("TRUE", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool(" Yes ", "TEST_VAR"), Some(true));
    }

    #[test]
    fn test_parse_bool_false_values() {
        assert_eq!(parse_bool("0", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("false", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("no", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("n", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("OFF", "TEST_VAR"), Some(false));
    }

    #[test]
    fn test_parse_bool_invalid_values() {
        assert_eq!(parse_bool("invalid", "TEST_VAR"), None);
        assert_eq!(parse_bool("2", "TEST_VAR"), None);
        assert_eq!(parse_bool("", "TEST_VAR"), None);
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("9000"), Ok(9000));
        assert_eq!(parse_port(" 8080 "), Ok(8080));
        assert!(parse_port("0").is_err());
        assert!(parse_port("70000").is_err());
        assert!(parse_port("http").is_err());
    }

    #[test]
    fn test_parse_ratio_checked() {
        let in_unit = |value: f64| (0.0..=1.0).contains(&value);
        assert_eq!(parse_f64_checked("0.25", in_unit, "hint"), Ok(0.25));
        assert!(parse_f64_checked("1.5", in_unit, "hint").is_err());
        assert!(parse_f64_checked("-0.1", in_unit, "hint").is_err());
        assert!(parse_f64_checked("wide", in_unit, "hint").is_err());
        assert!(parse_f64_checked("NaN", in_unit, "hint").is_err());
    }

    #[test]
    fn test_balance_config_default_matches_engine_default() {
        assert_eq!(
            BalanceConfig::default().tolerance(),
            BalanceTolerance::default()
        );
    }
}
