// RSA Encryption Implementation
// Textbook RSA: UTF-8 text -> big-endian integer -> m^e mod n

use base64::{engine::general_purpose::STANDARD, Engine};

use super::bigint::{from_bytes, mod_pow, to_minimal_bytes, RsaBigInt};
use super::error::RsaError;
use super::keygen::RsaPublicKey;

/// Encrypt an integer message. Fails if `m >= n`; nothing is truncated.
pub fn encrypt_integer(m: &RsaBigInt, public_key: &RsaPublicKey) -> Result<RsaBigInt, RsaError> {
    if m >= &public_key.n {
        return Err(RsaError::MessageTooLarge {
            message_bits: m.bits(),
            modulus_bits: public_key.bit_length(),
        });
    }

    // Compute c = m^e mod n
    Ok(mod_pow(m, &public_key.e, &public_key.n))
}

/// Encrypt a string using RSA public key
/// The UTF-8 bytes are read as one big-endian integer, so the whole
/// message has to fit below the modulus.
pub fn encrypt(message: &str, public_key: &RsaPublicKey) -> Result<RsaBigInt, RsaError> {
    let m = from_bytes(message.as_bytes());
    encrypt_integer(&m, public_key)
}

/// Encrypt a string and return the ciphertext in its Base64 transport form
pub fn encrypt_to_text(message: &str, public_key: &RsaPublicKey) -> Result<String, RsaError> {
    let c = encrypt(message, public_key)?;
    Ok(ciphertext_to_text(&c))
}

/// Standard padded Base64 of the minimal big-endian bytes of `c`
pub fn ciphertext_to_text(c: &RsaBigInt) -> String {
    STANDARD.encode(to_minimal_bytes(c))
}
