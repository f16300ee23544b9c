// RSA Errors
// Error values for key generation and the encrypt/decrypt pipeline

use std::string::FromUtf8Error;

use num_bigint::BigUint;
use thiserror::Error;

/// Broad failure classes, used by callers to map errors to responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad sizes, malformed keys, mismatched key halves
    InvalidParameter,
    /// No modular inverse, exponent search exhausted
    ArithmeticImpossibility,
    /// Plaintext integer does not fit below the modulus
    CapacityViolation,
    /// Ciphertext or plaintext bytes could not be decoded
    DecodingFailure,
    /// Key artifacts missing or unreadable
    StorageFailure,
}

#[derive(Debug, Error)]
pub enum RsaError {
    #[error("size of {bits} bits is too small, at least {minimum} bits are required")]
    InvalidBitSize { bits: u64, minimum: u64 },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("no modular inverse exists for {a} modulo {m}")]
    NoInverse { a: BigUint, m: BigUint },

    #[error("no public exponent coprime with phi(n) = {phi}")]
    ExponentSearchExhausted { phi: BigUint },

    #[error(
        "message too large for the key size: {message_bits} bits, modulus has {modulus_bits} bits"
    )]
    MessageTooLarge { message_bits: u64, modulus_bits: u64 },

    #[error("decrypted message is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    #[error("ciphertext is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

impl RsaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RsaError::InvalidBitSize { .. } | RsaError::InvalidKey(_) => {
                ErrorKind::InvalidParameter
            }
            RsaError::NoInverse { .. } | RsaError::ExponentSearchExhausted { .. } => {
                ErrorKind::ArithmeticImpossibility
            }
            RsaError::MessageTooLarge { .. } => ErrorKind::CapacityViolation,
            RsaError::InvalidUtf8(_) | RsaError::InvalidBase64(_) => ErrorKind::DecodingFailure,
        }
    }
}
