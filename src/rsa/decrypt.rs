// RSA Decryption Implementation
// Textbook RSA: c^d mod n -> minimal big-endian bytes -> UTF-8 text

use base64::{engine::general_purpose::STANDARD, Engine};

use super::bigint::{from_bytes, mod_pow, to_minimal_bytes, RsaBigInt};
use super::error::RsaError;
use super::keygen::RsaPrivateKey;

/// Decrypt an integer ciphertext. Values `>= n` are reduced mod n first.
pub fn decrypt_integer(c: &RsaBigInt, private_key: &RsaPrivateKey) -> RsaBigInt {
    // Compute m = c^d mod n
    mod_pow(c, &private_key.d, &private_key.n)
}

/// Decrypt ciphertext to a string
///
/// The recovered integer is re-encoded with no leading zero bytes, so
/// plaintexts that started with NUL characters come back without them.
pub fn decrypt(ciphertext: &RsaBigInt, private_key: &RsaPrivateKey) -> Result<String, RsaError> {
    let m = decrypt_integer(ciphertext, private_key);
    let plaintext = String::from_utf8(to_minimal_bytes(&m))?;
    Ok(plaintext)
}

/// Decrypt a Base64 transport ciphertext to a string
pub fn decrypt_from_text(
    ciphertext: &str,
    private_key: &RsaPrivateKey,
) -> Result<String, RsaError> {
    let c = ciphertext_from_text(ciphertext)?;
    decrypt(&c, private_key)
}

/// Parse the Base64 transport form back into the ciphertext integer
pub fn ciphertext_from_text(ciphertext: &str) -> Result<RsaBigInt, RsaError> {
    let bytes = STANDARD.decode(ciphertext.trim())?;
    Ok(from_bytes(&bytes))
}
