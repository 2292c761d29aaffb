//! TLS identity management and acceptor construction.
//!
//! # Responsibilities
//! - Load a configured certificate chain and private key (PEM)
//! - Reuse or generate a self-signed identity when the policy demands TLS
//! - Persist generated identities together with their expiry
//! - Build the `TlsAcceptor` used by the accept loop
//!
//! # Design Decisions
//! - Configured files always win over the store, under both policies
//! - A stored identity is regenerated once expired or when its names differ
//! - A configured key may be an encrypted PKCS#8 PEM when `key_password` is set
//! - Certificate dates are computed with checked arithmetic; an out-of-range
//!   validity is an error, never a panic

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use pkcs8::{EncryptedPrivateKeyInfo, SecretDocument};
use rcgen::{CertificateParams, DnType, KeyPair};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use serde::{Deserialize, Serialize};
use tokio_rustls::TlsAcceptor;

use crate::config::{TlsConfig, TlsPolicy};

const CERT_FILE: &str = "cert.pem";
const KEY_FILE: &str = "key.pem";
const METADATA_FILE: &str = "identity.json";
const ENCRYPTED_KEY_LABEL: &str = "ENCRYPTED PRIVATE KEY";
/// X.509 `GeneralizedTime` stops at year 9999.
const LAST_CERTIFICATE_YEAR: i32 = 9999;

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No certificates found in {0}")]
    NoCertificates(PathBuf),

    #[error("No private key found in {0}")]
    NoPrivateKey(PathBuf),

    #[error("Certificate and key must be configured together")]
    IncompleteConfig,

    #[error("Key {path} is `{label}`, expected an encrypted PKCS#8 key")]
    UnencryptedKey { path: PathBuf, label: String },

    #[error("Failed to decrypt key {path}: {source}")]
    KeyDecrypt {
        path: PathBuf,
        #[source]
        source: pkcs8::Error,
    },

    #[error("Certificate validity of {0} days ends past year 9999")]
    ValidityOutOfRange(u32),

    #[error("Failed to generate certificate: {0}")]
    Generate(#[from] rcgen::Error),

    #[error("Invalid identity metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("TLS config error: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Where an identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    Configured,
    Stored,
    Generated,
}

/// Certificate chain and key ready for rustls.
#[derive(Debug)]
pub struct Identity {
    /// Leaf certificate first.
    pub cert_chain: Vec<CertificateDer<'static>>,
    /// Decrypted private key for the leaf.
    pub key: PrivateKeyDer<'static>,
    pub source: IdentitySource,
}

/// Sidecar written next to a generated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct IdentityMetadata {
    /// Last day the certificate is valid.
    not_after: NaiveDate,
    /// Names the certificate was issued for.
    subject_alt_names: Vec<String>,
}

impl IdentityMetadata {
    fn is_usable(&self, sans: &[String], today: NaiveDate) -> bool {
        today < self.not_after && self.subject_alt_names == sans
    }
}

pub struct IdentityManager {
    config: TlsConfig,
}

impl IdentityManager {
    pub fn new(config: TlsConfig) -> Self {
        Self { config }
    }

    /// Resolve the identity the listener should present, if any.
    pub fn obtain(&self) -> Result<Option<Identity>, TlsError> {
        match (&self.config.cert_path, &self.config.key_path) {
            (Some(cert), Some(key)) => {
                let identity = load_identity(
                    cert,
                    key,
                    self.config.key_password.as_deref(),
                    IdentitySource::Configured,
                )?;
                tracing::info!(cert = %cert.display(), "Using configured TLS certificate");
                return Ok(Some(identity));
            }
            (None, None) => {}
            _ => return Err(TlsError::IncompleteConfig),
        }

        match self.config.policy {
            TlsPolicy::PlaintextIfAbsent => Ok(None),
            TlsPolicy::Always => self.stored_or_generated().map(Some),
        }
    }

    fn stored_or_generated(&self) -> Result<Identity, TlsError> {
        let dir = &self.config.store_dir;
        let today = Utc::now().date_naive();

        if let Some(metadata) = read_metadata(&dir.join(METADATA_FILE))? {
            if metadata.is_usable(&self.config.subject_alt_names, today) {
                let cert = dir.join(CERT_FILE);
                let key = dir.join(KEY_FILE);
                if cert.exists() && key.exists() {
                    tracing::info!(
                        store = %dir.display(),
                        not_after = %metadata.not_after,
                        "Reusing stored self-signed certificate"
                    );
                    return load_identity(&cert, &key, None, IdentitySource::Stored);
                }
            } else {
                tracing::warn!(
                    store = %dir.display(),
                    not_after = %metadata.not_after,
                    "Stored certificate expired or names changed, regenerating"
                );
            }
        }

        self.generate(today)
    }

    fn generate(&self, today: NaiveDate) -> Result<Identity, TlsError> {
        let dir = &self.config.store_dir;
        let (not_before, not_after) = validity_window(today, self.config.validity_days)?;

        let mut params = CertificateParams::new(self.config.subject_alt_names.clone())?;
        params
            .distinguished_name
            .push(DnType::CommonName, "portico self-signed");
        params.not_before =
            rcgen::date_time_ymd(not_before.year(), not_before.month() as u8, not_before.day() as u8);
        params.not_after =
            rcgen::date_time_ymd(not_after.year(), not_after.month() as u8, not_after.day() as u8);

        let key_pair = KeyPair::generate()?;
        let cert = params.self_signed(&key_pair)?;

        fs::create_dir_all(dir).map_err(|source| TlsError::Io {
            path: dir.clone(),
            source,
        })?;
        write_file(&dir.join(CERT_FILE), cert.pem().as_bytes())?;
        write_file(&dir.join(KEY_FILE), key_pair.serialize_pem().as_bytes())?;
        let metadata = IdentityMetadata {
            not_after,
            subject_alt_names: self.config.subject_alt_names.clone(),
        };
        write_file(
            &dir.join(METADATA_FILE),
            serde_json::to_string_pretty(&metadata)?.as_bytes(),
        )?;

        tracing::info!(
            store = %dir.display(),
            not_after = %not_after,
            "Generated self-signed certificate"
        );

        Ok(Identity {
            cert_chain: vec![cert.der().clone()],
            key: PrivateKeyDer::Pkcs8(key_pair.serialize_der().into()),
            source: IdentitySource::Generated,
        })
    }
}

/// First and last day of a certificate issued `today`, backdated by one day.
fn validity_window(today: NaiveDate, days: u32) -> Result<(NaiveDate, NaiveDate), TlsError> {
    let out_of_range = || TlsError::ValidityOutOfRange(days);
    let not_before = today
        .checked_sub_signed(Duration::days(1))
        .ok_or_else(out_of_range)?;
    let not_after = today
        .checked_add_signed(Duration::days(i64::from(days)))
        .filter(|date| date.year() <= LAST_CERTIFICATE_YEAR)
        .ok_or_else(out_of_range)?;
    Ok((not_before, not_after))
}

/// Build a TLS acceptor presenting the given identity.
pub fn acceptor(identity: &Identity) -> Result<TlsAcceptor, TlsError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(identity.cert_chain.clone(), identity.key.clone_key())?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_identity(
    cert_path: &Path,
    key_path: &Path,
    key_password: Option<&str>,
    source: IdentitySource,
) -> Result<Identity, TlsError> {
    let mut cert_reader = BufReader::new(open(cert_path)?);
    let cert_chain = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: cert_path.to_path_buf(),
            source,
        })?;
    if cert_chain.is_empty() {
        return Err(TlsError::NoCertificates(cert_path.to_path_buf()));
    }

    let key = match key_password {
        Some(password) => decrypt_key(key_path, password)?,
        None => {
            let mut key_reader = BufReader::new(open(key_path)?);
            rustls_pemfile::private_key(&mut key_reader)
                .map_err(|source| TlsError::Io {
                    path: key_path.to_path_buf(),
                    source,
                })?
                .ok_or_else(|| TlsError::NoPrivateKey(key_path.to_path_buf()))?
        }
    };

    Ok(Identity {
        cert_chain,
        key,
        source,
    })
}

fn decrypt_key(path: &Path, password: &str) -> Result<PrivateKeyDer<'static>, TlsError> {
    let decrypt_error = |source: pkcs8::Error| TlsError::KeyDecrypt {
        path: path.to_path_buf(),
        source,
    };

    let pem = fs::read_to_string(path).map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (label, document) =
        SecretDocument::from_pem(&pem).map_err(|e| decrypt_error(e.into()))?;
    if label != ENCRYPTED_KEY_LABEL {
        return Err(TlsError::UnencryptedKey {
            path: path.to_path_buf(),
            label: label.to_string(),
        });
    }

    let encrypted =
        EncryptedPrivateKeyInfo::try_from(document.as_bytes()).map_err(decrypt_error)?;
    let decrypted = encrypted.decrypt(password).map_err(decrypt_error)?;
    Ok(PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
        decrypted.as_bytes().to_vec(),
    )))
}

fn read_metadata(path: &Path) -> Result<Option<IdentityMetadata>, TlsError> {
    match fs::read(path) {
        Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(TlsError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn open(path: &Path) -> Result<File, TlsError> {
    File::open(path).map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), TlsError> {
    fs::write(path, contents).map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always(dir: &Path) -> TlsConfig {
        TlsConfig {
            policy: TlsPolicy::Always,
            store_dir: dir.to_path_buf(),
            ..TlsConfig::default()
        }
    }

    #[test]
    fn plaintext_policy_without_files_yields_none() {
        let manager = IdentityManager::new(TlsConfig::default());
        assert!(manager.obtain().unwrap().is_none());
    }

    #[test]
    fn half_configured_identity_is_rejected() {
        let config = TlsConfig {
            cert_path: Some(PathBuf::from("cert.pem")),
            ..TlsConfig::default()
        };
        assert!(matches!(
            IdentityManager::new(config).obtain(),
            Err(TlsError::IncompleteConfig)
        ));
    }

    #[test]
    fn always_policy_generates_then_reuses() {
        let dir = tempfile::tempdir().unwrap();
        let manager = IdentityManager::new(always(dir.path()));

        let first = manager.obtain().unwrap().unwrap();
        assert_eq!(first.source, IdentitySource::Generated);
        assert!(dir.path().join(CERT_FILE).exists());
        assert!(dir.path().join(KEY_FILE).exists());

        let second = manager.obtain().unwrap().unwrap();
        assert_eq!(second.source, IdentitySource::Stored);
        assert_eq!(first.cert_chain, second.cert_chain);
    }

    #[test]
    fn expired_identity_is_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let manager = IdentityManager::new(always(dir.path()));
        manager.obtain().unwrap();

        let expired = IdentityMetadata {
            not_after: Utc::now().date_naive() - Duration::days(1),
            subject_alt_names: vec!["localhost".to_string()],
        };
        fs::write(
            dir.path().join(METADATA_FILE),
            serde_json::to_vec(&expired).unwrap(),
        )
        .unwrap();

        let renewed = manager.obtain().unwrap().unwrap();
        assert_eq!(renewed.source, IdentitySource::Generated);
    }

    #[test]
    fn configured_files_win_under_both_policies() {
        let dir = tempfile::tempdir().unwrap();
        IdentityManager::new(always(dir.path())).obtain().unwrap();

        for policy in [TlsPolicy::Always, TlsPolicy::PlaintextIfAbsent] {
            let config = TlsConfig {
                policy,
                cert_path: Some(dir.path().join(CERT_FILE)),
                key_path: Some(dir.path().join(KEY_FILE)),
                ..TlsConfig::default()
            };
            let identity = IdentityManager::new(config).obtain().unwrap().unwrap();
            assert_eq!(identity.source, IdentitySource::Configured);
            assert!(acceptor(&identity).is_ok());
        }
    }

    #[test]
    fn empty_certificate_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("empty.pem");
        fs::write(&cert, "").unwrap();
        let err = load_identity(&cert, &cert, None, IdentitySource::Configured).unwrap_err();
        assert!(matches!(err, TlsError::NoCertificates(_)));
    }

    #[test]
    fn oversized_validity_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let config = TlsConfig {
            validity_days: 3_000_000,
            ..always(dir.path())
        };
        let err = IdentityManager::new(config).obtain().unwrap_err();
        assert!(matches!(err, TlsError::ValidityOutOfRange(3_000_000)));
        assert!(!dir.path().join(CERT_FILE).exists());
    }

    #[test]
    fn validity_window_stops_at_year_9999() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let (not_before, not_after) = validity_window(today, 365).unwrap();
        assert_eq!(not_before, NaiveDate::from_ymd_opt(2026, 10, 15).unwrap());
        assert_eq!(not_after, NaiveDate::from_ymd_opt(2027, 10, 16).unwrap());

        let late = NaiveDate::from_ymd_opt(9999, 12, 1).unwrap();
        assert!(validity_window(late, 30).is_ok());
        assert!(matches!(
            validity_window(late, 31),
            Err(TlsError::ValidityOutOfRange(31))
        ));
    }

    /// Writes a fresh certificate plus its key encrypted under `password`.
    fn write_encrypted_identity(dir: &Path, password: &str) -> (PathBuf, PathBuf) {
        use pkcs8::pkcs5::pbes2;
        use pkcs8::{LineEnding, PrivateKeyInfo};

        let key_pair = KeyPair::generate().unwrap();
        let cert = CertificateParams::new(vec!["localhost".to_string()])
            .unwrap()
            .self_signed(&key_pair)
            .unwrap();

        let der = key_pair.serialize_der();
        let salt = [7u8; 16];
        let iv = [3u8; 16];
        let params = pbes2::Parameters::pbkdf2_sha256_aes256cbc(2048, &salt, &iv).unwrap();
        let encrypted = PrivateKeyInfo::try_from(der.as_slice())
            .unwrap()
            .encrypt_with_params(params, password)
            .unwrap();
        let pem = encrypted
            .to_pem(ENCRYPTED_KEY_LABEL, LineEnding::LF)
            .unwrap();

        let cert_path = dir.join("server.pem");
        let key_path = dir.join("server.key");
        fs::write(&cert_path, cert.pem()).unwrap();
        fs::write(&key_path, pem.as_bytes()).unwrap();
        (cert_path, key_path)
    }

    fn configured(cert: PathBuf, key: PathBuf, password: &str) -> TlsConfig {
        TlsConfig {
            cert_path: Some(cert),
            key_path: Some(key),
            key_password: Some(password.to_string()),
            ..TlsConfig::default()
        }
    }

    #[test]
    fn encrypted_key_is_decrypted_with_password() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = write_encrypted_identity(dir.path(), "correct horse");

        let identity = IdentityManager::new(configured(cert, key, "correct horse"))
            .obtain()
            .unwrap()
            .unwrap();
        assert_eq!(identity.source, IdentitySource::Configured);
        assert!(matches!(identity.key, PrivateKeyDer::Pkcs8(_)));
        assert!(acceptor(&identity).is_ok());
    }

    #[test]
    fn wrong_password_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = write_encrypted_identity(dir.path(), "correct horse");

        let result = IdentityManager::new(configured(cert, key, "battery staple")).obtain();
        assert!(matches!(result, Err(TlsError::KeyDecrypt { .. })));
    }

    #[test]
    fn password_with_plain_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        IdentityManager::new(always(dir.path())).obtain().unwrap();

        let config = configured(dir.path().join(CERT_FILE), dir.path().join(KEY_FILE), "x");
        let err = IdentityManager::new(config).obtain().unwrap_err();
        assert!(
            matches!(&err, TlsError::UnencryptedKey { label, .. } if label == "PRIVATE KEY"),
            "{err}"
        );
    }
}
