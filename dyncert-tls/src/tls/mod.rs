mod ca;
mod cert;
mod extensions;
mod keys;
mod manager;
mod provider;
mod store;
mod types;

pub use ca::{CertificateAuthority, generate_ca, load_ca, write_ca};
pub use cert::{
    CertificateTemplate, Validity, build_name, issue_leaf_certificate, random_serial,
    sign_certificate, verify_certificate,
};
pub use extensions::{leaf_extensions, root_extensions};
pub use keys::{DEFAULT_KEY_SIZE, MIN_KEY_SIZE, generate_key_pair};
pub use manager::DynamicCertificateManager;
pub use provider::init_crypto;
pub use store::{CertificateStore, PemMaterial};
pub use types::{
    ActiveCertificateHandle, CaMaterial, CaMaterialPaths, CertificateError, LeafCertificate,
    TlsError, TlsErrorKind,
};
