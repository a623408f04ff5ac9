//! TLS configuration shared by the REST client and the streaming client.
//!
//! Builds a single [`rustls::ClientConfig`] trusting the Mozilla root set
//! shipped in `webpki-roots`, so HTTPS and WSS connections to the
//! exchange verify against the same trust anchors.

use std::sync::Arc;

use rustls::ClientConfig;

use crate::Result;

/// Builds a [`ClientConfig`] whose root store contains the bundled
/// webpki root certificates.
///
/// # Errors
///
/// Returns [`PulseError::Tls`](crate::PulseError::Tls) if the root store
/// ends up empty.
pub fn build_tls_config() -> Result<ClientConfig> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    if root_store.is_empty() {
        return Err(crate::PulseError::Tls(
            "no trust anchors available".to_string(),
        ));
    }

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(config)
}

/// Builds the shared TLS config wrapped in an [`Arc`] for cheap cloning
/// into connectors.
///
/// # Errors
///
/// See [`build_tls_config`].
pub fn shared_tls_config() -> Result<Arc<ClientConfig>> {
    build_tls_config().map(Arc::new)
}
