//! TCP transport to the local router.
//!
//! The router listens on a well-known port. Addresses follow `host[:port]`:
//! an empty address or host means the loopback router, a missing port means
//! the default port.
//!
//! # Example
//!
//! ```
//! use bw2_client::transport::resolve_address;
//!
//! assert_eq!(resolve_address("").unwrap(), "127.0.0.1:28589");
//! assert_eq!(resolve_address("router.local").unwrap(), "router.local:28589");
//! assert_eq!(resolve_address("[::1]").unwrap(), "[::1]:28589");
//! assert_eq!(resolve_address("10.0.0.2:4000").unwrap(), "10.0.0.2:4000");
//! ```

use tokio::net::TcpStream;

use crate::error::{Bw2Error, Result};

/// Port the router listens on when none is given.
pub const DEFAULT_PORT: u16 = 28589;

/// Host used when the address is empty.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Normalize a router address to `host:port`.
///
/// # Errors
///
/// Returns `InvalidAddress` for an unbracketed IPv6 literal, an unterminated
/// bracket, or a port that is not a number in `1..=65535`.
pub fn resolve_address(to: &str) -> Result<String> {
    let to = to.trim();
    if to.is_empty() {
        return Ok(format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT));
    }

    if let Some(rest) = to.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| Bw2Error::InvalidAddress(format!("{}: missing ']'", to)))?;
        if host.is_empty() {
            return Err(Bw2Error::InvalidAddress(format!("{}: empty host", to)));
        }
        if tail.is_empty() {
            return Ok(format!("[{}]:{}", host, DEFAULT_PORT));
        }
        let port = tail
            .strip_prefix(':')
            .ok_or_else(|| Bw2Error::InvalidAddress(format!("{}: junk after ']'", to)))?;
        validate_port(to, port)?;
        return Ok(to.to_string());
    }

    match to.split_once(':') {
        None => Ok(format!("{}:{}", to, DEFAULT_PORT)),
        Some((_, port)) if port.contains(':') => Err(Bw2Error::InvalidAddress(format!(
            "{}: too many colons (bracket IPv6 literals)",
            to
        ))),
        Some(("", port)) => {
            validate_port(to, port)?;
            Ok(format!("{}:{}", DEFAULT_HOST, port))
        }
        Some((_, port)) => {
            validate_port(to, port)?;
            Ok(to.to_string())
        }
    }
}

fn validate_port(address: &str, port: &str) -> Result<()> {
    match port.parse::<u16>() {
        Ok(p) if p != 0 => Ok(()),
        _ => Err(Bw2Error::InvalidAddress(format!(
            "{}: invalid port {:?}",
            address, port
        ))),
    }
}

/// Dial the router at an already resolved address.
pub async fn dial(address: &str) -> Result<TcpStream> {
    let stream = TcpStream::connect(address).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}
