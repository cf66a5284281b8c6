use std::fs::File;
use std::io::{self, BufReader, ErrorKind};
use std::path::Path;
use std::sync::Arc;

use pgwire::tokio::tokio_rustls::rustls::ServerConfig;
use pgwire::tokio::TlsAcceptor;

/// Build the server-side TLS acceptor from PEM files. Both paths or neither;
/// with neither, connections are served in plaintext.
pub fn load_tls_acceptor(cert_path: Option<&Path>, key_path: Option<&Path>) -> io::Result<Option<TlsAcceptor>> {
    let (cert_path, key_path) = match (cert_path, key_path) {
        (None, None) => return Ok(None),
        (Some(c), Some(k)) => (c, k),
        _ => {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "both COURTBOOK_TLS_CERT and COURTBOOK_TLS_KEY must be set, or neither",
            ));
        }
    };

    let certs: Vec<_> = rustls_pemfile::certs(&mut BufReader::new(File::open(cert_path)?)).collect::<Result<_, _>>()?;
    if certs.is_empty() {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("no certificate found in {}", cert_path.display()),
        ));
    }

    let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(key_path)?))?.ok_or_else(|| {
        io::Error::new(
            ErrorKind::InvalidInput,
            format!("no private key found in {}", key_path.display()),
        )
    })?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))?;

    config.alpn_protocols = vec![b"postgresql".to_vec()];

    Ok(Some(TlsAcceptor::from(Arc::new(config))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn empty_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("courtbook_test_tls");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn plaintext_without_paths() {
        assert!(load_tls_acceptor(None, None).unwrap().is_none());
    }

    #[test]
    fn half_configured_is_rejected() {
        let cert = empty_file("half.pem");
        let err = load_tls_acceptor(Some(&cert), None).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("COURTBOOK_TLS_KEY"));
    }

    #[test]
    fn missing_or_empty_files_are_errors() {
        let missing = std::env::temp_dir().join("courtbook_test_tls").join("absent.pem");
        let err = load_tls_acceptor(Some(&missing), Some(&missing)).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let cert = empty_file("cert.pem");
        let key = empty_file("key.pem");
        let err = load_tls_acceptor(Some(&cert), Some(&key)).err().unwrap();
        assert!(err.to_string().contains("no certificate found"));
    }
}
