use std::sync::Once;

static INIT: Once = Once::new();

/// Loads the OpenSSL error strings and algorithm tables. Safe to call from
/// any thread, any number of times; only the first call does work.
pub fn init_crypto() {
    INIT.call_once(|| {
        openssl::init();
        tracing::debug!("crypto provider initialized");
    });
}
