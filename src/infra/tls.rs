//! Certificate provisioning contract.
//!
//! TLS termination happens outside this process. What lives here is the
//! lookup side: "give me the certificate for domain X", restricted to an
//! allow-list of domains.

use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{info, warn};

/// PEM-encoded certificate chain and private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub domain: String,
    pub chain_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("domain `{0}` is not in the allow-list")]
    NotAllowed(String),
    #[error("no certificate available for `{0}`")]
    Missing(String),
    #[error("failed to read `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub trait CertificateProvider: Send + Sync {
    fn certificate_for(&self, domain: &str) -> Result<Certificate, CertificateError>;
}

/// Rejects domains outside the configured set before asking `inner`.
pub struct AllowList<P> {
    domains: HashSet<String>,
    inner: P,
}

impl<P: CertificateProvider> AllowList<P> {
    pub fn new<I, S>(domains: I, inner: P) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains = domains
            .into_iter()
            .map(|domain| domain.as_ref().trim().to_ascii_lowercase())
            .filter(|domain| !domain.is_empty())
            .collect();
        Self { domains, inner }
    }

    pub fn is_allowed(&self, domain: &str) -> bool {
        self.domains.contains(&domain.trim().to_ascii_lowercase())
    }

    /// Allowed domains in sorted order.
    pub fn domains(&self) -> Vec<&str> {
        let mut domains: Vec<&str> = self.domains.iter().map(String::as_str).collect();
        domains.sort_unstable();
        domains
    }
}

impl<P: CertificateProvider> CertificateProvider for AllowList<P> {
    fn certificate_for(&self, domain: &str) -> Result<Certificate, CertificateError> {
        if !self.is_allowed(domain) {
            return Err(CertificateError::NotAllowed(domain.to_string()));
        }
        self.inner.certificate_for(&domain.trim().to_ascii_lowercase())
    }
}

/// Reads `<dir>/<domain>.crt` and `<dir>/<domain>.key`.
pub struct DirCertificateProvider {
    dir: PathBuf,
}

impl DirCertificateProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read(&self, domain: &str, extension: &str) -> Result<Vec<u8>, CertificateError> {
        let path = self.dir.join(format!("{domain}.{extension}"));
        fs::read(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                CertificateError::Missing(domain.to_string())
            } else {
                CertificateError::Read { path, source }
            }
        })
    }
}

impl CertificateProvider for DirCertificateProvider {
    fn certificate_for(&self, domain: &str) -> Result<Certificate, CertificateError> {
        // Domain names never contain path separators.
        if domain.is_empty() || domain.contains(['/', '\\']) || domain.starts_with('.') {
            return Err(CertificateError::Missing(domain.to_string()));
        }

        Ok(Certificate {
            domain: domain.to_string(),
            chain_pem: self.read(domain, "crt")?,
            key_pem: self.read(domain, "key")?,
        })
    }
}

/// Log certificate availability for every allowed domain.
///
/// Returns the number of domains with a usable certificate.
pub fn check_certificates<P: CertificateProvider>(provider: &AllowList<P>) -> usize {
    let mut available = 0;
    for domain in provider.domains() {
        match provider.certificate_for(domain) {
            Ok(_) => {
                available += 1;
                info!(target = "vitrine::tls", domain, "Certificate available");
            }
            Err(err) => {
                warn!(
                    target = "vitrine::tls",
                    domain,
                    error = %err,
                    "Certificate unavailable"
                );
            }
        }
    }
    available
}

/// Allow-listed directory provider built from settings.
pub fn dir_provider(domains: &[String], dir: &Path) -> AllowList<DirCertificateProvider> {
    AllowList::new(domains, DirCertificateProvider::new(dir))
}
