//! Textbook RSA: key pair generation, per-user key storage and
//! unpadded encryption/decryption of short UTF-8 messages.
//!
//! Not secure. There is no padding and the default key sizes are tiny;
//! this is for demonstrating the arithmetic.

pub mod rsa;
pub mod store;
pub mod util;

pub use rsa::{
    decrypt, decrypt_from_text, encrypt, encrypt_to_text, generate_keypair, ErrorKind, RsaError,
    RsaKeyPair, RsaPrivateKey, RsaPublicKey,
};
pub use store::{KeyStore, KeyStoreError, StoreConfig};
