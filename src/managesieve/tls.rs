use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::CertificateDer;
use tracing::debug;

pub type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// Runs the TLS handshake over an already-open connection.
///
/// Certificates are verified with `host` as the expected server name,
/// against the webpki root set plus any CA certificates in `ca_file`. The
/// handshake completes before returning so that certificate problems
/// surface here and not on the first read.
pub fn upgrade(mut tcp: TcpStream, host: &str, ca_file: Option<&Path>) -> Result<TlsStream, String> {
    let roots = root_store(ca_file)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| e.to_string())?
        .with_root_certificates(roots)
        .with_no_client_auth();

    let server_name =
        ServerName::try_from(host.to_string()).map_err(|e| format!("{}: {}", host, e))?;
    let mut conn =
        ClientConnection::new(Arc::new(config), server_name).map_err(|e| e.to_string())?;

    while conn.is_handshaking() {
        conn.complete_io(&mut tcp).map_err(|e| e.to_string())?;
    }

    Ok(StreamOwned::new(conn, tcp))
}

/// Trust anchors: the webpki roots, extended with a PEM bundle if given
fn root_store(ca_file: Option<&Path>) -> Result<RootCertStore, String> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let Some(path) = ca_file else {
        return Ok(roots);
    };

    let certs = CertificateDer::pem_file_iter(path)
        .and_then(|certs| certs.collect::<Result<Vec<_>, _>>())
        .map_err(|e| format!("{}: {}", path.display(), e))?;
    if certs.is_empty() {
        return Err(format!("{}: no certificates found", path.display()));
    }

    let (added, ignored) = roots.add_parsable_certificates(certs);
    if added == 0 {
        return Err(format!(
            "{}: none of {} certificates could be used",
            path.display(),
            ignored
        ));
    }
    debug!(ca_file = %path.display(), added, ignored, "loaded CA certificates");

    Ok(roots)
}
