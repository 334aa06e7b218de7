//! Endpoint selection
//!
//! A member cluster advertises one server address per client network. The
//! first pair whose CIDR contains this host's address is the one to use.

use std::net::IpAddr;

use ipnet::IpNet;

use lattice_common::crd::ServerAddressByClientCidr;
use lattice_common::Error;

/// Pick the server address advertised for the network `local_ip` lives in
///
/// Pairs are evaluated in order and the first match wins; overlapping CIDRs
/// are not scored. `Ok(None)` means no advertised network applies to this
/// host, which callers treat as "client unavailable" rather than a failure.
/// A malformed CIDR reached before a match fails with a validation error.
pub fn select_server_address(
    local_ip: IpAddr,
    pairs: &[ServerAddressByClientCidr],
) -> Result<Option<String>, Error> {
    for (i, pair) in pairs.iter().enumerate() {
        let net = parse_cidr(&pair.client_cidr).map_err(|msg| {
            Error::validation_for_field(
                lattice_common::error::UNKNOWN_CONTEXT,
                format!("spec.serverAddressByClientCIDRs[{}].clientCIDR", i),
                msg,
            )
        })?;
        if net.contains(&local_ip) {
            return Ok(Some(pair.server_address.clone()));
        }
    }
    Ok(None)
}

/// Same as [`select_server_address`], attributing errors to `cluster`
pub fn select_server_address_for(
    cluster: &str,
    local_ip: IpAddr,
    pairs: &[ServerAddressByClientCidr],
) -> Result<Option<String>, Error> {
    select_server_address(local_ip, pairs).map_err(|e| match e {
        Error::Validation { message, field, .. } => Error::Validation {
            cluster: cluster.to_string(),
            message,
            field,
        },
        other => other,
    })
}

fn parse_cidr(cidr: &str) -> Result<IpNet, String> {
    cidr.parse::<IpNet>()
        .map_err(|e| format!("invalid CIDR '{}': {}", cidr, e))
}
