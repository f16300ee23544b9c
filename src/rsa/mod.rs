// RSA Module - Main module file
// Exports all RSA-related functionality

pub mod bigint;
pub mod decrypt;
pub mod encrypt;
pub mod error;
pub mod keygen;

pub use bigint::{extended_gcd, gcd, generate_prime, is_prime, lcm, mod_inverse, mod_pow, RsaBigInt};
pub use decrypt::{ciphertext_from_text, decrypt, decrypt_from_text, decrypt_integer};
pub use encrypt::{ciphertext_to_text, encrypt, encrypt_integer, encrypt_to_text};
pub use error::{ErrorKind, RsaError};
pub use keygen::{
    choose_public_exponent, generate_keypair, generate_keypair_with_rng, RsaKeyPair,
    RsaPrivateKey, RsaPublicKey,
};
