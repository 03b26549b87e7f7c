//! User key pair and certificate signing request

use crate::error::DcmError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rcgen::{CertificateParams, DistinguishedName, DnType, DnValue, KeyPair, PKCS_RSA_SHA256};
use rsa::RsaPrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};

/// Smallest modulus accepted for user keys
pub const MIN_KEY_BITS: usize = 2048;
/// Modulus used unless configured otherwise
pub const DEFAULT_KEY_BITS: usize = 4096;

/// Freshly generated credentials of a Logical Cloud user
#[derive(Clone)]
pub struct UserCredentials {
    /// PEM CSR with the user name as common name
    pub csr_pem: String,
    /// Base64 of the PKCS#1 PEM private key, as stored under `privatekey`
    pub private_key: String,
}

impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("csr_pem", &self.csr_pem)
            .finish_non_exhaustive()
    }
}

fn generate_blocking(user_name: &str, key_bits: usize) -> Result<UserCredentials, DcmError> {
    let key = RsaPrivateKey::new(&mut rand::thread_rng(), key_bits)
        .map_err(|e| DcmError::internal("generating user key", e))?;

    let pkcs1 = key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| DcmError::internal("encoding user key", e))?;
    let pkcs8 = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| DcmError::internal("encoding user key", e))?;

    let key_pair = KeyPair::from_pem_and_sign_algo(&pkcs8, &PKCS_RSA_SHA256)
        .map_err(|e| DcmError::internal("loading user key", e))?;

    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DnValue::Utf8String(user_name.to_string()));
    params.distinguished_name = dn;

    let csr = params
        .serialize_request(&key_pair)
        .map_err(|e| DcmError::internal("creating CSR", e))?;
    let csr_pem = csr.pem().map_err(|e| DcmError::internal("serializing CSR", e))?;

    Ok(UserCredentials {
        csr_pem,
        private_key: STANDARD.encode(pkcs1.as_bytes()),
    })
}

/// Generate an RSA key pair and a CSR for `user_name`.
///
/// Key generation is CPU-bound and runs on the blocking pool. Sizes below
/// [`MIN_KEY_BITS`] are raised to it.
///
/// # Errors
///
/// Returns [`DcmError::Internal`] if generation or encoding fails.
pub async fn generate_user_credentials(user_name: &str, key_bits: usize) -> Result<UserCredentials, DcmError> {
    let user_name = user_name.to_string();
    let key_bits = key_bits.max(MIN_KEY_BITS);
    tokio::task::spawn_blocking(move || generate_blocking(&user_name, key_bits))
        .await
        .map_err(|e| DcmError::internal("key generation task", e))?
}
