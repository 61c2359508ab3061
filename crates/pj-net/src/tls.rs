//! TLS policy and the rustls connector.

use pj_core::PjaxError;
use pj_core::PjaxResult;
use std::io::Read;
use std::io::Write;
use std::net::TcpStream;

#[cfg(feature = "tls-rustls")]
use rustls::RootCertStore;
#[cfg(feature = "tls-rustls")]
use rustls::SupportedProtocolVersion;
#[cfg(feature = "tls-rustls")]
use rustls::pki_types::ServerName;
#[cfg(feature = "tls-rustls")]
use std::sync::Arc;

/// Trait-object-safe stream shared by plain and TLS connections.
pub trait IoStream: Read + Write {}
impl<T> IoStream for T where T: Read + Write {}

pub type BoxedIoStream = Box<dyn IoStream>;

/// Supported TLS protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    V1_2,
    V1_3,
}

/// Controls which trust anchors are used for server certificate verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustStoreMode {
    /// Use only the embedded Mozilla/WebPKI roots.
    WebPkiOnly,
    /// Use WebPKI roots and merge operating-system roots (enterprise/local CAs).
    WebPkiAndOs,
}

/// TLS requirements for HTTPS requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPolicy {
    pub minimum_version: TlsVersion,
    pub maximum_version: TlsVersion,
    pub trust_store_mode: TrustStoreMode,
}

impl Default for TlsPolicy {
    fn default() -> Self {
        Self {
            minimum_version: TlsVersion::V1_2,
            maximum_version: TlsVersion::V1_3,
            trust_store_mode: TrustStoreMode::WebPkiOnly,
        }
    }
}

impl TlsPolicy {
    pub fn with_trust_store_mode(mut self, mode: TrustStoreMode) -> Self {
        self.trust_store_mode = mode;
        self
    }

    pub fn validate(&self) -> PjaxResult<()> {
        if self.minimum_version > self.maximum_version {
            return Err(PjaxError::new(
                "net.tls.invalid_version_range",
                "minimum TLS version cannot be greater than maximum version",
            ));
        }

        Ok(())
    }
}

/// Upgrades `stream` to TLS for `server_name`.
#[cfg(feature = "tls-rustls")]
pub fn connect_tls(
    mut stream: TcpStream,
    server_name: &str,
    policy: &TlsPolicy,
) -> PjaxResult<BoxedIoStream> {
    use rustls::ClientConfig;
    use rustls::ClientConnection;
    use rustls::StreamOwned;

    let versions = supported_versions(policy.minimum_version, policy.maximum_version)?;
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let roots = root_store(policy.trust_store_mode)?;

    let mut config = ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&versions)
        .map_err(|error| {
            PjaxError::new(
                "net.tls.config_versions_invalid",
                format!("failed to configure TLS protocol versions: {error}"),
            )
        })?
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    let name = ServerName::try_from(server_name.to_owned()).map_err(|error| {
        PjaxError::new(
            "net.tls.server_name_invalid",
            format!("invalid TLS server name `{server_name}`: {error}"),
        )
    })?;

    let mut connection = ClientConnection::new(Arc::new(config), name).map_err(|error| {
        PjaxError::new(
            "net.tls.connection_init_failed",
            format!("failed to initialize TLS connection for `{server_name}`: {error}"),
        )
    })?;

    connection.complete_io(&mut stream).map_err(|error| {
        PjaxError::new(
            "net.tls.handshake_failed",
            format!("TLS handshake failed for `{server_name}`: {error}"),
        )
    })?;

    Ok(Box::new(StreamOwned::new(connection, stream)))
}

#[cfg(not(feature = "tls-rustls"))]
pub fn connect_tls(
    _stream: TcpStream,
    _server_name: &str,
    _policy: &TlsPolicy,
) -> PjaxResult<BoxedIoStream> {
    Err(PjaxError::new(
        "net.tls.backend_unavailable",
        "rustls backend is disabled for this build; enable `pj-net/tls-rustls`",
    ))
}

#[cfg(feature = "tls-rustls")]
fn root_store(mode: TrustStoreMode) -> PjaxResult<RootCertStore> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if mode == TrustStoreMode::WebPkiAndOs {
        let native = rustls_native_certs::load_native_certs();
        if native.certs.is_empty() && !native.errors.is_empty() {
            let details = native
                .errors
                .iter()
                .map(std::string::ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(PjaxError::new(
                "net.tls.os_roots_load_failed",
                format!("failed to load operating-system roots: {details}"),
            ));
        }

        for cert in native.certs {
            if let Err(error) = roots.add(cert) {
                log::debug!("skipping operating-system root: {error}");
            }
        }
    }

    if roots.is_empty() {
        return Err(PjaxError::new(
            "net.tls.root_store_empty",
            "no trust anchors available for TLS verification",
        ));
    }

    Ok(roots)
}

#[cfg(feature = "tls-rustls")]
fn supported_versions(
    minimum: TlsVersion,
    maximum: TlsVersion,
) -> PjaxResult<Vec<&'static SupportedProtocolVersion>> {
    let versions: Vec<&'static SupportedProtocolVersion> = [TlsVersion::V1_3, TlsVersion::V1_2]
        .into_iter()
        .filter(|version| *version >= minimum && *version <= maximum)
        .map(|version| match version {
            TlsVersion::V1_2 => &rustls::version::TLS12,
            TlsVersion::V1_3 => &rustls::version::TLS13,
        })
        .collect();

    if versions.is_empty() {
        return Err(PjaxError::new(
            "net.tls.version_set_empty",
            "no supported TLS versions match the requested policy",
        ));
    }

    Ok(versions)
}

#[cfg(test)]
mod tests {
    use super::TlsPolicy;
    use super::TlsVersion;
    use super::TrustStoreMode;

    #[test]
    fn validates_version_range() {
        let policy = TlsPolicy {
            minimum_version: TlsVersion::V1_3,
            maximum_version: TlsVersion::V1_2,
            ..TlsPolicy::default()
        };

        assert!(policy.validate().is_err());
        assert!(TlsPolicy::default().validate().is_ok());
    }

    #[test]
    fn trust_store_mode_can_be_overridden() {
        let policy = TlsPolicy::default();
        assert_eq!(policy.trust_store_mode, TrustStoreMode::WebPkiOnly);

        let policy = policy.with_trust_store_mode(TrustStoreMode::WebPkiAndOs);
        assert_eq!(policy.trust_store_mode, TrustStoreMode::WebPkiAndOs);
    }
}
