use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;

use super::types::{TlsError, TlsErrorKind};

pub const DEFAULT_KEY_SIZE: u32 = 2048;
pub const MIN_KEY_SIZE: u32 = 1024;

/// Generates an RSA key pair from OpenSSL's CSPRNG.
pub fn generate_key_pair(bits: u32) -> Result<PKey<Private>, TlsError> {
    if bits < MIN_KEY_SIZE {
        return Err(TlsError::new(
            TlsErrorKind::Configuration,
            format!("RSA key size {bits} is below the minimum of {MIN_KEY_SIZE} bits"),
        ));
    }
    let rsa = Rsa::generate(bits)
        .map_err(|err| TlsError::crypto(format!("failed to generate {bits} bit RSA key"), err))?;
    PKey::from_rsa(rsa).map_err(|err| TlsError::crypto("failed to wrap RSA key", err))
}
