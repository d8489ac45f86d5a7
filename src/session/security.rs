//! SSH algorithm preferences and host-key verification policy.
//!
//! Network devices need broad algorithm compatibility; this fleet tool talks to hosts
//! the operator controls, so it only ever offers the modern, secure algorithm set and
//! always verifies the remote host key against `~/.ssh/known_hosts`.

use std::borrow::Cow;

use async_ssh2_tokio::ServerCheckMethod;
use russh::{Preferred, cipher, kex, mac};

/// Modern key-exchange algorithms, Curve25519 first.
const SECURE_KEX_ORDER: &[kex::Name] = &[
    kex::CURVE25519,
    kex::CURVE25519_PRE_RFC_8731,
    kex::ECDH_SHA2_NISTP256,
    kex::ECDH_SHA2_NISTP384,
    kex::ECDH_SHA2_NISTP521,
    kex::DH_G16_SHA512,
    kex::DH_G14_SHA256,
];

/// AEAD and counter-mode ciphers only; no `NONE`/`CLEAR`/CBC.
const SECURE_CIPHERS: &[cipher::Name] = &[
    cipher::AES_256_GCM,
    cipher::AES_256_CTR,
    cipher::AES_192_CTR,
    cipher::AES_128_CTR,
    cipher::CHACHA20_POLY1305,
];

/// HMAC variants with ETM preferred; no `NONE`/SHA1-non-ETM.
const SECURE_MAC_ALGORITHMS: &[mac::Name] = &[
    mac::HMAC_SHA256_ETM,
    mac::HMAC_SHA512_ETM,
    mac::HMAC_SHA256,
    mac::HMAC_SHA512,
];

/// Host-key verification policy used when dialing a node.
#[derive(Debug, Clone)]
pub struct ConnectionSecurityOptions {
    pub server_check: ServerCheckMethod,
}

impl Default for ConnectionSecurityOptions {
    fn default() -> Self {
        Self {
            server_check: ServerCheckMethod::DefaultKnownHostsFile,
        }
    }
}

impl ConnectionSecurityOptions {
    pub(super) fn preferred(&self) -> Preferred {
        Preferred {
            kex: Cow::Borrowed(SECURE_KEX_ORDER),
            cipher: Cow::Borrowed(SECURE_CIPHERS),
            mac: Cow::Borrowed(SECURE_MAC_ALGORITHMS),
            ..Preferred::DEFAULT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_security_options_check_known_hosts() {
        let opts = ConnectionSecurityOptions::default();
        assert!(matches!(
            opts.server_check,
            ServerCheckMethod::DefaultKnownHostsFile
        ));
    }

    #[test]
    fn secure_profile_excludes_weak_algorithms() {
        let preferred = ConnectionSecurityOptions::default().preferred();
        assert!(preferred.cipher.iter().all(|alg| *alg != cipher::NONE));
        assert!(preferred.cipher.iter().all(|alg| *alg != cipher::CLEAR));
        assert!(preferred.mac.iter().all(|alg| *alg != mac::NONE));
    }
}
