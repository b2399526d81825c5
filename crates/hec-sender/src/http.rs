// Copyright 2026-Present the hec-sender authors.
// SPDX-License-Identifier: Apache-2.0

//! HTTP client construction.
//!
//! One reqwest client per sender instance, carrying the per-attempt timeout,
//! the TLS verification toggle, and the optional HTTPS proxy. An invalid
//! proxy configuration degrades to a direct-connection client rather than
//! failing construction.

use tracing::{error, warn};

use crate::config::Config;
use crate::error::SenderError;

pub(crate) fn build_client(config: &Config) -> Result<reqwest::Client, SenderError> {
    if !config.verify_tls {
        warn!("TLS certificate verification is disabled");
    }
    match build_client_inner(config, true) {
        Ok(client) => Ok(client),
        Err(e) if config.proxy_https.is_some() => {
            error!("unable to apply proxy configuration: {e}, falling back to direct connection");
            build_client_inner(config, false)
        }
        Err(e) => Err(e),
    }
}

fn build_client_inner(config: &Config, allow_proxy: bool) -> Result<reqwest::Client, SenderError> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout)
        .danger_accept_invalid_certs(!config.verify_tls);

    if allow_proxy {
        if let Some(proxy_url) = &config.proxy_https {
            let proxy = reqwest::Proxy::https(proxy_url.as_str())?;
            builder = builder.proxy(proxy);
        }
    }

    Ok(builder.build()?)
}
