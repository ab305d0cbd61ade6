use crate::transfer::{DEFAULT_BLOCK_SIZE, DigestAlgorithm};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::{env, path::PathBuf, str::FromStr};

/// Objects at or above this size are uploaded as manifest-linked parts.
pub const DEFAULT_CHUNK_SIZE: u64 = 32 * 1024 * 1024;

const ENV_PREFIX: &str = "OBJECT_TRANSFER_";

/// Settings shared by the transport and the transfer engine.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Authenticated storage URL, e.g. `https://storage.example.com/v1/AUTH_acct`.
    pub endpoint: String,
    /// CDN management URL; CDN operations fail locally when unset.
    pub cdn_endpoint: Option<String>,
    pub auth_token: Option<String>,
    /// Multipart threshold and part size in bytes.
    pub chunk_size: u64,
    /// Read granularity for file bodies.
    pub block_size: usize,
    pub verify_hash: bool,
    pub digest: DigestAlgorithm,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080/v1/AUTH_test".into(),
            cdn_endpoint: None,
            auth_token: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
            verify_hash: true,
            digest: DigestAlgorithm::Md5,
            connect_timeout_secs: 10,
            request_timeout_secs: 300,
        }
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Streaming object storage transfer client")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Default, Clone)]
pub struct GlobalArgs {
    /// Storage endpoint (overrides OBJECT_TRANSFER_ENDPOINT)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// CDN management endpoint (overrides OBJECT_TRANSFER_CDN_ENDPOINT)
    #[arg(long, global = true)]
    pub cdn_endpoint: Option<String>,

    /// Auth token sent as X-Auth-Token (overrides OBJECT_TRANSFER_AUTH_TOKEN)
    #[arg(long, global = true)]
    pub auth_token: Option<String>,

    /// Multipart part size in bytes (overrides OBJECT_TRANSFER_CHUNK_SIZE)
    #[arg(long, global = true)]
    pub chunk_size: Option<u64>,

    /// Digest algorithm: md5 or sha256 (overrides OBJECT_TRANSFER_DIGEST)
    #[arg(long, global = true)]
    pub digest: Option<DigestAlgorithm>,

    /// Skip comparing local digests with server ETags
    #[arg(long, global = true)]
    pub no_verify: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a file, splitting it into parts when it reaches the chunk size
    Upload {
        container: String,
        file: PathBuf,
        /// Object name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        content_type: Option<String>,
        /// Metadata entry as key=value; repeatable
        #[arg(long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, String)>,
    },
    /// Download an object to a local path
    Download {
        container: String,
        object: String,
        destination: PathBuf,
        #[arg(long)]
        overwrite: bool,
        /// Leave the partial file behind if the transfer fails
        #[arg(long)]
        keep_partial: bool,
    },
    /// List the objects in a container
    List { container: String },
    /// List containers in the account
    Containers,
    /// Show container or object metadata
    Stat {
        container: String,
        object: Option<String>,
    },
    CreateContainer { name: String },
    /// Delete an empty container
    DeleteContainer { name: String },
    Delete { container: String, object: String },
    /// Show account-wide usage counters
    Account,
    /// Publish a container through the CDN
    CdnEnable {
        container: String,
        /// Cache TTL in seconds
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Print the public CDN URL of a container or object
    CdnUrl {
        container: String,
        object: Option<String>,
    },
    /// Serve a container as a static website
    Website {
        container: String,
        #[arg(long, default_value = "index.html")]
        index: String,
        /// Object shown when a page is not found
        #[arg(long)]
        error_page: Option<String>,
    },
}

fn parse_meta(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got `{}`", raw))
}

impl ClientConfig {
    /// Parse environment variables + CLI args into a config and the command to run.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        let cli = Cli::parse();
        let cfg = Self::merge(cli.global, |key| env::var(key).ok())?;
        Ok((cfg, cli.command))
    }

    /// Merge CLI flags over values found through `lookup` (an env reader).
    pub fn merge(args: GlobalArgs, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        let env_chunk = parse_var(&var, "CHUNK_SIZE")?;
        let env_digest = parse_var::<DigestAlgorithm>(&var, "DIGEST")?;
        let env_verify = parse_var::<bool>(&var, "VERIFY_HASH")?;
        let env_connect = parse_var(&var, "CONNECT_TIMEOUT_SECS")?;
        let env_request = parse_var(&var, "REQUEST_TIMEOUT_SECS")?;

        let chunk_size = args.chunk_size.or(env_chunk).unwrap_or(defaults.chunk_size);
        if chunk_size == 0 {
            anyhow::bail!("chunk size must be greater than zero");
        }

        Ok(Self {
            endpoint: args
                .endpoint
                .or_else(|| var("ENDPOINT"))
                .unwrap_or(defaults.endpoint),
            cdn_endpoint: args.cdn_endpoint.or_else(|| var("CDN_ENDPOINT")),
            auth_token: args.auth_token.or_else(|| var("AUTH_TOKEN")),
            chunk_size,
            block_size: defaults.block_size,
            verify_hash: !args.no_verify && env_verify.unwrap_or(defaults.verify_hash),
            digest: args.digest.or(env_digest).unwrap_or(defaults.digest),
            connect_timeout_secs: env_connect.unwrap_or(defaults.connect_timeout_secs),
            request_timeout_secs: env_request.unwrap_or(defaults.request_timeout_secs),
        })
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|err| anyhow::anyhow!("{}", err))
            .with_context(|| format!("parsing {}{} value `{}`", ENV_PREFIX, name, value)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env_or_flags() {
        let cfg = ClientConfig::merge(GlobalArgs::default(), lookup(&[])).unwrap();
        assert_eq!(cfg.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(cfg.block_size, 8192);
        assert!(cfg.verify_hash);
        assert_eq!(cfg.digest, DigestAlgorithm::Md5);
        assert!(cfg.auth_token.is_none());
        assert!(cfg.cdn_endpoint.is_none());
    }

    #[test]
    fn cdn_endpoint_from_env() {
        let cfg = ClientConfig::merge(
            GlobalArgs::default(),
            lookup(&[("OBJECT_TRANSFER_CDN_ENDPOINT", "https://cdn.example.com/v1/AUTH_a")]),
        )
        .unwrap();
        assert_eq!(
            cfg.cdn_endpoint.as_deref(),
            Some("https://cdn.example.com/v1/AUTH_a")
        );
    }

    #[test]
    fn flags_override_env() {
        let args = GlobalArgs {
            endpoint: Some("http://cli/v1".into()),
            chunk_size: Some(1024),
            ..Default::default()
        };
        let env = lookup(&[
            ("OBJECT_TRANSFER_ENDPOINT", "http://env/v1"),
            ("OBJECT_TRANSFER_CHUNK_SIZE", "2048"),
            ("OBJECT_TRANSFER_AUTH_TOKEN", "secret"),
            ("OBJECT_TRANSFER_DIGEST", "sha256"),
        ]);
        let cfg = ClientConfig::merge(args, env).unwrap();
        assert_eq!(cfg.endpoint, "http://cli/v1");
        assert_eq!(cfg.chunk_size, 1024);
        assert_eq!(cfg.auth_token.as_deref(), Some("secret"));
        assert_eq!(cfg.digest, DigestAlgorithm::Sha256);
    }

    #[test]
    fn no_verify_flag_wins() {
        let args = GlobalArgs {
            no_verify: true,
            ..Default::default()
        };
        let cfg =
            ClientConfig::merge(args, lookup(&[("OBJECT_TRANSFER_VERIFY_HASH", "true")])).unwrap();
        assert!(!cfg.verify_hash);
    }

    #[test]
    fn bad_env_values_are_reported() {
        let err = ClientConfig::merge(
            GlobalArgs::default(),
            lookup(&[("OBJECT_TRANSFER_CHUNK_SIZE", "lots")]),
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("OBJECT_TRANSFER_CHUNK_SIZE"));

        let err = ClientConfig::merge(
            GlobalArgs::default(),
            lookup(&[("OBJECT_TRANSFER_CHUNK_SIZE", "0")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn parses_metadata_pairs() {
        assert_eq!(
            parse_meta("owner=alice=admin").unwrap(),
            ("owner".to_string(), "alice=admin".to_string())
        );
        assert!(parse_meta("novalue").is_err());
        assert!(parse_meta("=x").is_err());
    }
}
