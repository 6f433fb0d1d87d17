use crate::client::{CliClient, ObjectClient, RestClient};
use crate::error::BwError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Pick a transport from the environment.
///
/// `BW_SERVE_URL` selects the REST transport; otherwise the CLI is used with
/// `BW_CLI_PATH` and `BW_SESSION`.
pub fn client_from_env(cancel: CancellationToken) -> Result<Arc<dyn ObjectClient>, BwError> {
    if std::env::var(crate::client::ENDPOINT_ENV).is_ok() {
        let client = RestClient::builder().cancellation(cancel).build()?;
        tracing::info!(transport = client.transport(), "Using bw serve");
        Ok(Arc::new(client))
    } else {
        let client = CliClient::builder().cancellation(cancel).build();
        tracing::info!(transport = client.transport(), "Using bw CLI");
        Ok(Arc::new(client))
    }
}
