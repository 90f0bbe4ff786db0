use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::tls::{DEFAULT_KEY_SIZE, MIN_KEY_SIZE, TlsError, TlsErrorKind};

pub const CA_CERTIFICATE_FILENAME: &str = "CertificateAuthorityCertificate.pem";
pub const CA_PUBLIC_KEY_FILENAME: &str = "CertificateAuthorityPublicKey.pem";
pub const CA_PRIVATE_KEY_FILENAME: &str = "CertificateAuthorityPrivateKey.pem";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CertificateConfig {
    pub pem_directory: String,
    pub common_name: String,
    pub ca_certificate_path: Option<String>,
    pub ca_private_key_path: Option<String>,
    pub ca_key_size: u32,
    pub leaf_key_size: u32,
    pub leaf_certificate_name: String,
    pub leaf_private_key_name: String,
    pub subject: DistinguishedNameConfig,
    pub subject_alternative_names: SubjectAlternativeNames,
}

/// Fixed distinguished-name fields shared by the root and every leaf.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DistinguishedNameConfig {
    pub ca_common_name: String,
    pub organization: String,
    pub locality: String,
    pub state: String,
    pub country: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SubjectAlternativeNames {
    pub domains: Vec<String>,
    pub ips: Vec<String>,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            pem_directory: String::new(),
            common_name: "localhost".to_string(),
            ca_certificate_path: None,
            ca_private_key_path: None,
            ca_key_size: DEFAULT_KEY_SIZE,
            leaf_key_size: DEFAULT_KEY_SIZE,
            leaf_certificate_name: "DynamicCertificate".to_string(),
            leaf_private_key_name: "DynamicPrivateKey".to_string(),
            subject: DistinguishedNameConfig::default(),
            subject_alternative_names: SubjectAlternativeNames::default(),
        }
    }
}

impl Default for DistinguishedNameConfig {
    fn default() -> Self {
        Self {
            ca_common_name: "www.mockserver.com".to_string(),
            organization: "MockServer".to_string(),
            locality: "London".to_string(),
            state: "England".to_string(),
            country: "UK".to_string(),
        }
    }
}

impl CertificateConfig {
    pub fn load_or_create(path: &Path) -> Result<Self, TlsError> {
        if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|err| {
                TlsError::with_source(
                    TlsErrorKind::Configuration,
                    format!("failed to read {}", path.display()),
                    err,
                )
            })?;
            toml::from_str(&raw).map_err(|err| {
                TlsError::with_source(
                    TlsErrorKind::Configuration,
                    format!("invalid configuration in {}", path.display()),
                    err,
                )
            })
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), TlsError> {
        let contents = toml::to_string_pretty(self).map_err(|err| {
            TlsError::with_source(
                TlsErrorKind::Configuration,
                "failed to serialize configuration",
                err,
            )
        })?;
        std::fs::write(path, contents).map_err(|err| {
            TlsError::persistence(format!("failed to write {}", path.display()), err)
        })
    }

    pub fn validate(&self) -> Result<(), TlsError> {
        match (&self.ca_certificate_path, &self.ca_private_key_path) {
            (Some(_), Some(_)) | (None, None) => {}
            _ => {
                return Err(TlsError::configuration(
                    "ca_certificate_path and ca_private_key_path must either both be set or both be unset",
                ));
            }
        }
        for (name, value) in [
            ("ca_certificate_path", &self.ca_certificate_path),
            ("ca_private_key_path", &self.ca_private_key_path),
        ] {
            if value.as_deref().is_some_and(|path| path.trim().is_empty()) {
                return Err(TlsError::configuration(format!("{name} must not be blank")));
            }
        }
        for (name, bits) in [
            ("ca_key_size", self.ca_key_size),
            ("leaf_key_size", self.leaf_key_size),
        ] {
            if bits < MIN_KEY_SIZE {
                return Err(TlsError::configuration(format!(
                    "{name} must be at least {MIN_KEY_SIZE} bits, got {bits}"
                )));
            }
        }
        for (name, value) in [
            ("leaf_certificate_name", &self.leaf_certificate_name),
            ("leaf_private_key_name", &self.leaf_private_key_name),
            ("subject.ca_common_name", &self.subject.ca_common_name),
        ] {
            if value.trim().is_empty() {
                return Err(TlsError::configuration(format!("{name} must not be empty")));
            }
        }
        for (name, value) in [
            ("leaf_certificate_name", &self.leaf_certificate_name),
            ("leaf_private_key_name", &self.leaf_private_key_name),
        ] {
            if value.contains(['/', '\\']) {
                return Err(TlsError::configuration(format!(
                    "{name} must not contain path separators"
                )));
            }
        }
        Ok(())
    }

    /// The configured PEM directory when it is non-blank and exists, `None`
    /// when files fall back to the process temp location.
    pub fn target_directory(&self) -> Option<PathBuf> {
        configured_pem_directory(&self.pem_directory)
    }

    /// Configured CA certificate and key paths, or the fixed file names in
    /// the directory stable files are written to.
    pub fn ca_paths(&self) -> (PathBuf, PathBuf) {
        match (&self.ca_certificate_path, &self.ca_private_key_path) {
            (Some(cert), Some(key)) => (PathBuf::from(cert), PathBuf::from(key)),
            _ => {
                let dir = stable_directory(&self.pem_directory);
                (
                    dir.join(CA_CERTIFICATE_FILENAME),
                    dir.join(CA_PRIVATE_KEY_FILENAME),
                )
            }
        }
    }
}

/// `pem_directory` resolved for writing, or `None` when it is blank or does
/// not exist.
pub fn configured_pem_directory(pem_directory: &str) -> Option<PathBuf> {
    let dir = pem_directory.trim();
    if dir.is_empty() {
        return None;
    }
    let path = PathBuf::from(dir);
    path.is_dir().then_some(path)
}

/// Where files with fixed names live: the configured directory, else the
/// process temp directory.
pub fn stable_directory(pem_directory: &str) -> PathBuf {
    configured_pem_directory(pem_directory).unwrap_or_else(std::env::temp_dir)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::{CA_CERTIFICATE_FILENAME, CA_PRIVATE_KEY_FILENAME, CertificateConfig};
    use crate::TlsErrorKind;

    #[test]
    fn defaults_preserve_distinguished_name_constants() {
        let config = CertificateConfig::default();
        assert_eq!(config.subject.ca_common_name, "www.mockserver.com");
        assert_eq!(config.subject.organization, "MockServer");
        assert_eq!(config.subject.locality, "London");
        assert_eq!(config.subject.state, "England");
        assert_eq!(config.subject.country, "UK");
        assert_eq!(config.ca_key_size, 2048);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("certificates.toml");
        let mut config = CertificateConfig::default();
        config.common_name = "example.com".to_string();
        config.pem_directory = dir.path().to_string_lossy().into_owned();
        config.subject_alternative_names.ips = vec!["10.0.0.5".to_string()];
        config.save(&path).unwrap();

        let loaded = CertificateConfig::load_or_create(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("certificates.toml");
        let config = CertificateConfig::load_or_create(&path).unwrap();
        assert_eq!(config, CertificateConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn rejects_half_configured_ca_paths() {
        let config = CertificateConfig {
            ca_certificate_path: Some("ca.pem".to_string()),
            ..CertificateConfig::default()
        };
        assert_matches!(
            config.validate().unwrap_err().kind,
            TlsErrorKind::Configuration
        );
    }

    #[test]
    fn rejects_small_keys_and_separators_in_leaf_names() {
        let config = CertificateConfig {
            leaf_key_size: 512,
            ..CertificateConfig::default()
        };
        assert!(config.validate().is_err());

        let config = CertificateConfig {
            leaf_private_key_name: "../key".to_string(),
            ..CertificateConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn target_directory_falls_back_when_missing_or_blank() {
        let mut config = CertificateConfig::default();
        assert_eq!(config.target_directory(), None);
        assert_eq!(
            config.ca_paths(),
            (
                std::env::temp_dir().join(CA_CERTIFICATE_FILENAME),
                std::env::temp_dir().join(CA_PRIVATE_KEY_FILENAME)
            )
        );

        config.pem_directory = "/definitely/not/here".to_string();
        assert_eq!(config.target_directory(), None);
        let (cert, _key) = config.ca_paths();
        assert_eq!(cert, std::env::temp_dir().join(CA_CERTIFICATE_FILENAME));

        let dir = tempfile::tempdir().unwrap();
        config.pem_directory = dir.path().to_string_lossy().into_owned();
        assert_eq!(config.target_directory(), Some(dir.path().to_path_buf()));
        let (cert, _key) = config.ca_paths();
        assert_eq!(cert, dir.path().join(CA_CERTIFICATE_FILENAME));
    }

    #[test]
    fn explicit_ca_paths_win() {
        let config = CertificateConfig {
            ca_certificate_path: Some("/etc/ca.pem".to_string()),
            ca_private_key_path: Some("/etc/ca-key.pem".to_string()),
            ..CertificateConfig::default()
        };
        assert_eq!(
            config.ca_paths(),
            ("/etc/ca.pem".into(), "/etc/ca-key.pem".into())
        );
    }
}
