//! Signet CLI - sign HTTP requests and presign URLs from the command line.
//!
//! Prints the headers to add to a request, or a presigned URL. Nothing is
//! sent over the network.
//!
//! # Usage
//!
//! ```text
//! signet sign <METHOD> <URL> [PAYLOAD]
//! signet presign <URL> <EXPIRES_SECS>
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SIGNET_ACCESS_KEY_ID` | *(required)* | Access key ID |
//! | `SIGNET_SECRET_KEY` | *(required)* | Secret key |
//! | `SIGNET_SCOPE` | *(required)* | Slash-separated scope, e.g. `us-east-1/iam/aws4_request` |
//! | `SIGNET_PRESET` | `aws` | Protocol flavour (`aws` or `ems`) |
//! | `SIGNET_LOG_LEVEL` | `warn` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `SIGNET_LOG_LEVEL`) |
//!
//! The remaining `SIGNET_*` protocol variables are read by
//! `SigningConfig::from_env`.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use signet_auth::date::format_timestamp;
use signet_auth::{AccessKey, PresignOptions, SignableRequest, Signer, SigningConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "usage:
  signet sign <METHOD> <URL> [PAYLOAD]
  signet presign <URL> <EXPIRES_SECS>";

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Sign {
        method: &'a str,
        url: &'a str,
        payload: &'a str,
    },
    Presign {
        url: &'a str,
        expires_secs: u64,
    },
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    let log_level = std::env::var("SIGNET_LOG_LEVEL").unwrap_or_else(|_| "warn".to_owned());
    init_tracing(&log_level)?;

    let signer = Signer::new(SigningConfig::from_env());
    let (access_key, scope_parts) = load_credentials()?;

    info!(
        version = VERSION,
        algorithm = %signer.config().algorithm_id(),
        access_key_id = %access_key.access_key_id(),
        "starting signet",
    );

    match command {
        Command::Sign {
            method,
            url,
            payload,
        } => {
            for (name, value) in sign(&signer, &access_key, &scope_parts, method, url, payload)? {
                println!("{name}: {value}");
            }
        }
        Command::Presign { url, expires_secs } => {
            let url = signer
                .presign_url(
                    &access_key,
                    &scope_parts,
                    url,
                    &Utc::now(),
                    expires_secs,
                    &PresignOptions::default(),
                )
                .context("failed to presign URL")?;
            println!("{url}");
        }
    }

    Ok(())
}

fn parse_args(args: &[String]) -> Result<Command<'_>> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let command = match args.as_slice() {
        &["sign", method, url] => Command::Sign {
            method,
            url,
            payload: "",
        },
        &["sign", method, url, payload] => Command::Sign {
            method,
            url,
            payload,
        },
        &["presign", url, expires] => Command::Presign {
            url,
            expires_secs: expires
                .parse()
                .with_context(|| format!("invalid expiry in seconds: {expires}"))?,
        },
        _ => bail!("{USAGE}"),
    };
    Ok(command)
}

/// Initialize the tracing subscriber, logging to stderr.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the provided log level.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Read the access key and scope from `SIGNET_ACCESS_KEY_ID`,
/// `SIGNET_SECRET_KEY` and `SIGNET_SCOPE`.
fn load_credentials() -> Result<(AccessKey, Vec<String>)> {
    let access_key_id =
        std::env::var("SIGNET_ACCESS_KEY_ID").context("SIGNET_ACCESS_KEY_ID is not set")?;
    let secret_key = std::env::var("SIGNET_SECRET_KEY").context("SIGNET_SECRET_KEY is not set")?;
    let scope = std::env::var("SIGNET_SCOPE").context("SIGNET_SCOPE is not set")?;

    let access_key = AccessKey::new(access_key_id, secret_key).context("invalid access key")?;
    Ok((access_key, parse_scope(&scope)))
}

fn parse_scope(scope: &str) -> Vec<String> {
    scope
        .split('/')
        .filter(|part| !part.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Sign a request for `url` at the current time and return every header the
/// caller must send, `host` included.
fn sign(
    signer: &Signer,
    access_key: &AccessKey,
    scope_parts: &[String],
    method: &str,
    url: &str,
    payload: &str,
) -> Result<Vec<(String, String)>> {
    let uri: http::Uri = url
        .parse()
        .with_context(|| format!("invalid URL: {url}"))?;
    let authority = uri
        .authority()
        .with_context(|| format!("URL has no host: {url}"))?
        .as_str();
    let host = authority.rsplit('@').next().unwrap_or(authority);

    let mut request = SignableRequest::new(method.to_ascii_uppercase(), uri.path())
        .with_payload(payload)
        .with_host(host);
    if let Some(query) = uri.query() {
        request = request.with_query(query);
    }

    let timestamp = format_timestamp(&Utc::now());
    let auth_headers = signer
        .sign_request(access_key, scope_parts, &timestamp, &request)
        .context("failed to sign request")?;

    let mut headers = vec![("host".to_owned(), host.to_owned())];
    headers.extend(auth_headers);
    Ok(headers)
}
