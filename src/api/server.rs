//! JSON-RPC transport for the review service.
//!
//! Exposes two methods over HTTP:
//!
//! - `review`: takes a [`ReviewRequest`] (as the params object, or as the
//!   single positional param) and returns a [`ReviewResponse`]
//! - `version`: returns the analyzer and crate versions
//!
//! Malformed params are answered with a JSON-RPC error; a request never takes
//! the server down.

use std::net::SocketAddr;

use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::{ErrorObjectOwned, Params};
use jsonrpsee::RpcModule;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::review::{ReviewRequest, Reviewer};
use crate::core::errors::{BadcodeError, Result};

/// Method name of the review call
pub const REVIEW_METHOD: &str = "review";

/// Method name of the version call
pub const VERSION_METHOD: &str = "version";

/// Response of the `version` method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Configured analyzer version
    pub analyzer_version: String,
    /// Library version
    pub crate_version: String,
}

fn review_request(params: &Params<'_>) -> std::result::Result<ReviewRequest, ErrorObjectOwned> {
    params
        .parse::<ReviewRequest>()
        .or_else(|_| params.one::<ReviewRequest>())
}

/// RPC methods bound to a reviewer.
pub fn rpc_module(reviewer: Reviewer) -> Result<RpcModule<Reviewer>> {
    let mut module = RpcModule::new(reviewer);
    module
        .register_method(REVIEW_METHOD, |params, reviewer| {
            let request = review_request(&params)?;
            Ok::<_, ErrorObjectOwned>(reviewer.review(&request))
        })
        .map_err(|e| BadcodeError::internal(format!("Cannot register {}: {}", REVIEW_METHOD, e)))?;
    module
        .register_method(VERSION_METHOD, |_, reviewer| {
            Ok::<_, ErrorObjectOwned>(VersionInfo {
                analyzer_version: reviewer.analyzer_version().to_string(),
                crate_version: crate::VERSION.to_string(),
            })
        })
        .map_err(|e| BadcodeError::internal(format!("Cannot register {}: {}", VERSION_METHOD, e)))?;
    Ok(module)
}

/// Bind `address` and start serving; returns the bound address and a handle.
pub async fn start(address: &str, reviewer: Reviewer) -> Result<(SocketAddr, ServerHandle)> {
    let server = Server::builder()
        .build(address)
        .await
        .map_err(|e| BadcodeError::internal(format!("Cannot bind {}: {}", address, e)))?;
    let local = server
        .local_addr()
        .map_err(|e| BadcodeError::internal(format!("Cannot read bound address: {}", e)))?;
    let module = rpc_module(reviewer)?;
    let handle = server.start(module);
    info!("Review server listening on {}", local);
    Ok((local, handle))
}

/// Serve until the server stops or Ctrl-C is received.
pub async fn serve(address: &str, reviewer: Reviewer) -> Result<()> {
    let (_, handle) = start(address, reviewer).await?;
    tokio::select! {
        _ = handle.clone().stopped() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down review server");
            // Already stopped is fine
            let _ = handle.stop();
            handle.stopped().await;
        }
    }
    Ok(())
}
