//! Echo service configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 4021
//! facilitator_url = "https://x402.org/facilitator"
//! wire_format = "current"
//!
//! [resource]
//! path = "/echo"
//! description = "Echo service"
//!
//! [[accepts]]
//! network = "base-sepolia"
//! asset = "USDC@base-sepolia"
//! price = "$0.01"
//! pay_to = "$PAY_TO"
//! ```
//!
//! # Environment Variables
//!
//! - `FACILITATOR_URL` - Override the facilitator base URL
//! - `WIRE_FORMAT` - Override the wire format (`current` or `legacy`)
//! - `PAY_TO`, `PRICE`, `NETWORK`, `ASSET` - Single payment option used when
//!   the file defines no `[[accepts]]`
//! - Any variable referenced by `$VAR` in the config file; a reference left
//!   unresolved in `facilitator_url` or an `[[accepts]]` entry is an error

use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use gate402::config::{DEFAULT_ASSET, DEFAULT_MIME_TYPE, PaymentOption, ResourceConfig};
use gate402::proto::WireFormat;
use gate402_http::constants::DEFAULT_FACILITATOR_URL;
use serde::{Deserialize, Serialize};
use url::Url;

/// Price charged when neither the file nor `PRICE` sets one.
pub const DEFAULT_PRICE: &str = "$0.01";

/// Network used when neither the file nor `NETWORK` sets one.
pub const DEFAULT_NETWORK: &str = "base-sepolia";

/// Errors raised while loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The file is not valid TOML or does not match the expected shape.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// An environment override could not be parsed.
    #[error("invalid value for {name}: {reason}")]
    InvalidEnv {
        /// Name of the environment variable.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// A value still references an environment variable that was not set.
    #[error("{field} references unset environment variable {name}")]
    Unresolved {
        /// The configuration key holding the reference.
        field: String,
        /// The variable name.
        name: String,
    },
    /// No payment option is configured and `PAY_TO` is not set.
    #[error("no [[accepts]] configured and PAY_TO is not set")]
    MissingPayTo,
    /// The resource path cannot be joined onto `base_url`.
    #[error("invalid resource url: {0}")]
    ResourceUrl(#[from] url::ParseError),
}

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EchoConfig {
    /// Server bind address (default: `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Server port (default: `4021`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Facilitator base URL.
    #[serde(default = "default_facilitator_url")]
    pub facilitator_url: String,

    /// Timeout applied to every facilitator call, in seconds (default: 60).
    #[serde(default = "default_facilitator_timeout_secs")]
    pub facilitator_timeout_secs: u64,

    /// Protocol generation spoken to clients and the facilitator.
    #[serde(default)]
    pub wire_format: WireFormat,

    /// Public origin the resource URL is advertised under.
    #[serde(default)]
    pub base_url: Option<Url>,

    /// The protected resource.
    #[serde(default)]
    pub resource: ResourceSection,

    /// Accepted payment options, in preference order.
    #[serde(default)]
    pub accepts: Vec<PaymentOption>,
}

/// The `[resource]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSection {
    /// Route the gate protects (default: `/echo`).
    #[serde(default = "default_path")]
    pub path: String,

    /// What the payment grants access to.
    #[serde(default = "default_description")]
    pub description: String,

    /// MIME type of the response body.
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

impl Default for ResourceSection {
    fn default() -> Self {
        Self {
            path: default_path(),
            description: default_description(),
            mime_type: default_mime_type(),
        }
    }
}

const fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

const fn default_port() -> u16 {
    4021
}

fn default_facilitator_url() -> String {
    DEFAULT_FACILITATOR_URL.to_owned()
}

const fn default_facilitator_timeout_secs() -> u64 {
    60
}

fn default_path() -> String {
    "/echo".to_owned()
}

fn default_description() -> String {
    "Echo service".to_owned()
}

fn default_mime_type() -> String {
    DEFAULT_MIME_TYPE.to_owned()
}

impl EchoConfig {
    /// Loads configuration from `path`, reading overrides from the process
    /// environment.
    ///
    /// A missing file is not an error; defaults and environment variables
    /// are used instead.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or an
    /// override is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Loads configuration from `path`, resolving variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or an
    /// override is invalid.
    pub fn load_with<F>(path: impl AsRef<Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse_with(&content, lookup)
    }

    /// Parses configuration text, resolving variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not a valid configuration, an
    /// override is invalid, or a value references an unset variable.
    pub fn parse_with<F>(content: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = expand_env_vars(content, &lookup);
        let mut config: Self = toml::from_str(&expanded)?;
        config.apply_overrides(&lookup)?;
        config.check_resolved()?;
        Ok(config)
    }

    /// Fails on any value that reaches the gate with a `$VAR` left in it.
    fn check_resolved(&self) -> Result<(), ConfigError> {
        let unresolved = |field: String, value: &str| match unresolved_reference(value) {
            Some(name) => Err(ConfigError::Unresolved {
                field,
                name: name.to_owned(),
            }),
            None => Ok(()),
        };
        unresolved("facilitator_url".to_owned(), &self.facilitator_url)?;
        for (index, option) in self.accepts.iter().enumerate() {
            unresolved(format!("accepts[{index}].pay_to"), &option.pay_to)?;
            unresolved(format!("accepts[{index}].asset"), &option.asset)?;
            unresolved(format!("accepts[{index}].network"), &option.network)?;
        }
        Ok(())
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("FACILITATOR_URL") {
            self.facilitator_url = url;
        }
        if let Some(format) = lookup("WIRE_FORMAT") {
            self.wire_format = format.parse().map_err(|reason| ConfigError::InvalidEnv {
                name: "WIRE_FORMAT",
                reason,
            })?;
        }

        if self.accepts.is_empty() {
            let pay_to = lookup("PAY_TO")
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingPayTo)?;
            let price = lookup("PRICE")
                .unwrap_or_else(|| DEFAULT_PRICE.to_owned())
                .parse()
                .map_err(|err: gate402::amount::PriceError| ConfigError::InvalidEnv {
                    name: "PRICE",
                    reason: err.to_string(),
                })?;
            let network = lookup("NETWORK").unwrap_or_else(|| DEFAULT_NETWORK.to_owned());
            let asset = lookup("ASSET").unwrap_or_else(|| DEFAULT_ASSET.to_owned());
            self.accepts
                .push(PaymentOption::new(network, price, pay_to.trim()).with_asset(asset));
        }
        Ok(())
    }

    /// Facilitator call timeout.
    #[must_use]
    pub const fn facilitator_timeout(&self) -> Duration {
        Duration::from_secs(self.facilitator_timeout_secs)
    }

    /// The payment configuration of the protected resource.
    ///
    /// The advertised URL is the resource path joined onto `base_url`, or the
    /// bare path when no public origin is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ResourceUrl`] if the path cannot be joined.
    pub fn resource_config(&self) -> Result<ResourceConfig, ConfigError> {
        let url = match &self.base_url {
            Some(base) => base.join(&self.resource.path)?.to_string(),
            None => self.resource.path.clone(),
        };
        Ok(ResourceConfig {
            url,
            description: self.resource.description.clone(),
            mime_type: self.resource.mime_type.clone(),
            accepts: self.accepts.clone(),
        })
    }
}

/// Name of the first `$NAME` or `${NAME}` reference in `value`.
///
/// A name starts with a letter or underscore, so prices like `$0.01` are
/// not references.
fn unresolved_reference(value: &str) -> Option<&str> {
    value.match_indices('$').find_map(|(at, _)| {
        let rest = &value[at + 1..];
        let name = match rest.strip_prefix('{') {
            Some(braced) => &braced[..braced.find('}')?],
            None => {
                let end = rest
                    .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                    .unwrap_or(rest.len());
                &rest[..end]
            }
        };
        name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
            .then_some(name)
    })
}

/// Expands `$VAR` and `${VAR}` patterns in a string through `lookup`.
///
/// Unresolved variables are left as-is.
fn expand_env_vars<F>(input: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut var_name = String::new();
        let mut closed = false;
        while let Some(&c) = chars.peek() {
            if braced {
                if c == '}' {
                    chars.next();
                    closed = true;
                    break;
                }
            } else if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            var_name.push(c);
            chars.next();
        }

        match lookup(&var_name) {
            Some(value) if !var_name.is_empty() => result.push_str(&value),
            _ => {
                result.push('$');
                if braced {
                    result.push('{');
                }
                result.push_str(&var_name);
                if closed {
                    result.push('}');
                }
            }
        }
    }

    result
}
