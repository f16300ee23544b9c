// RSA Key Generation
// Implements RSA key pair generation (public and private keys)

use std::fmt;

use log::{debug, info};
use num_traits::{One, Zero};
use rand::{thread_rng, Rng};

use super::bigint::{
    from_u64, gcd, generate_prime_with_rng, mod_inverse, to_minimal_bytes, RsaBigInt,
};
use super::error::RsaError;

/// Smallest modulus size accepted by [`generate_keypair`]
pub const MIN_KEY_BITS: u64 = 8;

/// Conventional public exponent, tried before any other candidate
pub const PREFERRED_PUBLIC_EXPONENT: u64 = 65537;

/// RSA Public Key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    pub n: RsaBigInt, // Modulus
    pub e: RsaBigInt, // Public exponent
}

/// RSA Private Key
#[derive(Clone, PartialEq, Eq)]
pub struct RsaPrivateKey {
    pub n: RsaBigInt, // Modulus (same as public)
    pub d: RsaBigInt, // Private exponent
}

/// RSA Key Pair (both public and private keys)
///
/// The two halves come from one generation event and share the modulus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKeyPair {
    pub public_key: RsaPublicKey,
    pub private_key: RsaPrivateKey,
}

impl RsaPublicKey {
    pub fn new(n: RsaBigInt, e: RsaBigInt) -> Self {
        Self { n, e }
    }

    /// Parse a peer key given as two decimal strings
    pub fn from_decimal(n: &str, e: &str) -> Result<Self, RsaError> {
        let n = parse_decimal("n", n)?;
        let e = parse_decimal("e", e)?;

        if n <= RsaBigInt::one() {
            return Err(RsaError::InvalidKey("modulus must be greater than 1".to_string()));
        }
        if e.is_zero() {
            return Err(RsaError::InvalidKey("exponent must be positive".to_string()));
        }

        Ok(Self { n, e })
    }

    /// Get the bit length of the modulus
    pub fn bit_length(&self) -> u64 {
        self.n.bits()
    }

    /// Longest byte string that always encodes below the modulus
    pub fn max_message_bytes(&self) -> usize {
        (self.bit_length().saturating_sub(1) / 8) as usize
    }

    /// Hex of the modulus, for identifying a key in logs and output
    pub fn fingerprint(&self) -> String {
        hex::encode(to_minimal_bytes(&self.n))
    }

    /// Encrypt a text message using this public key
    pub fn encrypt(&self, message: &str) -> Result<RsaBigInt, RsaError> {
        use super::encrypt::encrypt;
        encrypt(message, self)
    }
}

impl fmt::Display for RsaPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={}, e={}", self.n, self.e)
    }
}

impl RsaPrivateKey {
    pub fn new(n: RsaBigInt, d: RsaBigInt) -> Self {
        Self { n, d }
    }

    /// Get the bit length of the modulus
    pub fn bit_length(&self) -> u64 {
        self.n.bits()
    }

    /// Decrypt a ciphertext integer using this private key
    pub fn decrypt(&self, ciphertext: &RsaBigInt) -> Result<String, RsaError> {
        use super::decrypt::decrypt;
        decrypt(ciphertext, self)
    }
}

// d stays out of debug output
impl fmt::Debug for RsaPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaPrivateKey")
            .field("n", &self.n)
            .field("d", &"<redacted>")
            .finish()
    }
}

impl RsaKeyPair {
    /// Build a key pair from two primes, choosing `e` by [`choose_public_exponent`].
    /// `p` and `q` are assumed to be prime.
    pub fn from_primes(p: &RsaBigInt, q: &RsaBigInt) -> Result<Self, RsaError> {
        let phi = totient(p, q)?;
        let e = choose_public_exponent(&phi)?;
        Self::from_primes_with_exponent(p, q, &e)
    }

    /// Build a key pair from two primes and a fixed public exponent
    pub fn from_primes_with_exponent(
        p: &RsaBigInt,
        q: &RsaBigInt,
        e: &RsaBigInt,
    ) -> Result<Self, RsaError> {
        let phi = totient(p, q)?;

        if e <= &RsaBigInt::one() {
            return Err(RsaError::InvalidKey(
                "public exponent must be greater than 1".to_string(),
            ));
        }

        // d = e^(-1) mod φ(n)
        let d = mod_inverse(e, &phi)?;
        let n = p * q;

        Ok(Self {
            public_key: RsaPublicKey::new(n.clone(), e.clone()),
            private_key: RsaPrivateKey::new(n, d),
        })
    }

    /// Get the bit length of the key
    pub fn bit_length(&self) -> u64 {
        self.public_key.bit_length()
    }
}

// φ(n) = (p-1)(q-1) for distinct primes
fn totient(p: &RsaBigInt, q: &RsaBigInt) -> Result<RsaBigInt, RsaError> {
    if p == q {
        return Err(RsaError::InvalidKey("p and q must be distinct".to_string()));
    }
    if p < &from_u64(2) || q < &from_u64(2) {
        return Err(RsaError::InvalidKey("p and q must be at least 2".to_string()));
    }
    Ok((p - 1u8) * (q - 1u8))
}

/// Choose `e` with `gcd(e, φ) == 1`.
///
/// 65537 is taken whenever it is coprime with φ, even for tiny keys where it
/// exceeds φ. Otherwise odd candidates are tried from 3 upward; reaching φ
/// without a hit is an error.
pub fn choose_public_exponent(phi: &RsaBigInt) -> Result<RsaBigInt, RsaError> {
    let preferred = from_u64(PREFERRED_PUBLIC_EXPONENT);
    if gcd(&preferred, phi).is_one() {
        return Ok(preferred);
    }

    debug!("e={} unusable for this modulus, searching odd exponents", preferred);

    let mut e = from_u64(3);
    while &e < phi {
        if gcd(&e, phi).is_one() {
            return Ok(e);
        }
        e += 2u8;
    }

    Err(RsaError::ExponentSearchExhausted { phi: phi.clone() })
}

/// Generate RSA key pair with specified bit length using the thread-local RNG
pub fn generate_keypair(bits: u64) -> Result<RsaKeyPair, RsaError> {
    generate_keypair_with_rng(&mut thread_rng(), bits)
}

/// Generate RSA key pair with specified bit length
/// bits: size of the modulus; each prime gets `bits / 2` bits
pub fn generate_keypair_with_rng<R: Rng + ?Sized>(
    rng: &mut R,
    bits: u64,
) -> Result<RsaKeyPair, RsaError> {
    if bits < MIN_KEY_BITS {
        return Err(RsaError::InvalidBitSize {
            bits,
            minimum: MIN_KEY_BITS,
        });
    }

    let half_bits = bits / 2;

    // Step 1: Generate two distinct random primes p and q
    let p = generate_prime_with_rng(rng, half_bits)?;
    let mut q = generate_prime_with_rng(rng, half_bits)?;
    while q == p {
        q = generate_prime_with_rng(rng, half_bits)?;
    }

    // Step 2: n, φ(n), e and d
    let keypair = RsaKeyPair::from_primes(&p, &q)?;

    info!(
        "generated {}-bit RSA key pair, e={}, modulus {}",
        keypair.bit_length(),
        keypair.public_key.e,
        keypair.public_key.fingerprint()
    );

    Ok(keypair)
}

fn parse_decimal(name: &str, value: &str) -> Result<RsaBigInt, RsaError> {
    value
        .trim()
        .parse::<RsaBigInt>()
        .map_err(|e| RsaError::InvalidKey(format!("{} is not a decimal integer: {}", name, e)))
}
