// RSA Big Integer Operations
// Number theory primitives over num-bigint: gcd, modular inverse, primality, prime generation

use log::debug;
use num_bigint::{BigInt, BigUint, RandBigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::{thread_rng, Rng};

use super::error::RsaError;

/// RSA Big Integer type alias
pub type RsaBigInt = BigUint;

/// Numbers up to this many bits are tested by plain trial division.
pub const TRIAL_DIVISION_MAX_BITS: u64 = 40;

/// Miller-Rabin with these bases is exact for every n < 3,317,044,064,679,887,385,961,981.
const DETERMINISTIC_BASES: [u32; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Extra random witnesses used above the deterministic bound (error <= 4^-20).
const RANDOM_WITNESS_ROUNDS: u32 = 20;

/// Create a big integer from u64
pub fn from_u64(n: u64) -> RsaBigInt {
    RsaBigInt::from(n)
}

/// Create a big integer from bytes (big-endian)
pub fn from_bytes(bytes: &[u8]) -> RsaBigInt {
    RsaBigInt::from_bytes_be(bytes)
}

/// Convert big integer to its minimal big-endian bytes, `ceil(bits / 8)` long.
/// Zero encodes to an empty vector.
pub fn to_minimal_bytes(n: &RsaBigInt) -> Vec<u8> {
    if n.is_zero() {
        return Vec::new();
    }
    n.to_bytes_be()
}

/// Modular exponentiation: base^exp mod modulus
/// Uses square-and-multiply algorithm
pub fn mod_pow(base: &RsaBigInt, exp: &RsaBigInt, modulus: &RsaBigInt) -> RsaBigInt {
    if modulus.is_one() {
        return RsaBigInt::zero();
    }

    let mut result = RsaBigInt::one();
    let mut base = base % modulus;
    let mut exp = exp.clone();

    while !exp.is_zero() {
        if exp.is_odd() {
            result = (&result * &base) % modulus;
        }
        base = (&base * &base) % modulus;
        exp >>= 1;
    }

    result
}

/// Greatest common divisor, iterative Euclid. `gcd(0, 0) == 0`.
pub fn gcd(a: &RsaBigInt, b: &RsaBigInt) -> RsaBigInt {
    let mut a = a.clone();
    let mut b = b.clone();
    while !b.is_zero() {
        let r = &a % &b;
        a = b;
        b = r;
    }
    a
}

/// Extended Euclidean Algorithm
/// Returns (g, x, y) such that a*x + b*y = g = gcd(a, b)
///
/// Iterative form of the recursive definition with base case `(a, 1, 0)`
/// when `b == 0`; both produce the same coefficients.
pub fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    let (mut old_r, mut r) = (a.clone(), b.clone());
    let (mut old_x, mut x) = (BigInt::one(), BigInt::zero());
    let (mut old_y, mut y) = (BigInt::zero(), BigInt::one());

    while !r.is_zero() {
        // Floor division keeps the coefficients identical to the recursive form
        let q = old_r.div_floor(&r);

        let next_r = &old_r - &q * &r;
        old_r = std::mem::replace(&mut r, next_r);

        let next_x = &old_x - &q * &x;
        old_x = std::mem::replace(&mut x, next_x);

        let next_y = &old_y - &q * &y;
        old_y = std::mem::replace(&mut y, next_y);
    }

    (old_r, old_x, old_y)
}

/// Compute modular inverse: a^(-1) mod m, in `[0, m)`
pub fn mod_inverse(a: &RsaBigInt, m: &RsaBigInt) -> Result<RsaBigInt, RsaError> {
    let no_inverse = || RsaError::NoInverse {
        a: a.clone(),
        m: m.clone(),
    };

    if m.is_zero() {
        return Err(no_inverse());
    }

    let signed_m = BigInt::from_biguint(Sign::Plus, m.clone());
    let (g, x, _) = extended_gcd(&BigInt::from_biguint(Sign::Plus, a.clone()), &signed_m);

    if !g.is_one() {
        return Err(no_inverse());
    }

    // mod_floor lands in [0, m) for positive m
    x.mod_floor(&signed_m).to_biguint().ok_or_else(no_inverse)
}

/// Least common multiple, 0 if either input is 0
pub fn lcm(a: &RsaBigInt, b: &RsaBigInt) -> RsaBigInt {
    if a.is_zero() || b.is_zero() {
        return RsaBigInt::zero();
    }
    (a * b) / gcd(a, b)
}

/// Deterministic trial division up to floor(sqrt(n)).
/// Exact for every n but only practical for small widths.
pub fn is_prime_trial_division(n: &RsaBigInt) -> bool {
    if n <= &RsaBigInt::one() {
        return false;
    }
    if n <= &from_u64(3) {
        return true;
    }
    if n.is_even() {
        return false;
    }

    let limit = n.sqrt();
    let mut i = from_u64(3);
    while i <= limit {
        if (n % &i).is_zero() {
            return false;
        }
        i += 2u8;
    }
    true
}

/// Primality test.
///
/// Small values (<= [`TRIAL_DIVISION_MAX_BITS`] bits) use exact trial division.
/// Larger values use Miller-Rabin: deterministic bases first, which are exact
/// below ~2^81, then [`RANDOM_WITNESS_ROUNDS`] random witnesses for anything bigger.
pub fn is_prime(n: &RsaBigInt) -> bool {
    if n.bits() <= TRIAL_DIVISION_MAX_BITS {
        return is_prime_trial_division(n);
    }

    for p in DETERMINISTIC_BASES {
        if (n % p).is_zero() {
            return false;
        }
    }

    let (d, s) = split_power_of_two(n);

    for base in DETERMINISTIC_BASES {
        if !miller_rabin_round(n, &d, s, &from_u64(u64::from(base))) {
            return false;
        }
    }

    if n.bits() <= 81 {
        return true;
    }

    let mut rng = thread_rng();
    let two = from_u64(2);
    let n_minus_one = n - 1u8;
    for _ in 0..RANDOM_WITNESS_ROUNDS {
        // Pick random witness a in [2, n-1)
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        if !miller_rabin_round(n, &d, s, &a) {
            return false;
        }
    }

    true
}

// Write n-1 as d * 2^s with d odd
fn split_power_of_two(n: &RsaBigInt) -> (RsaBigInt, u64) {
    let n_minus_one = n - 1u8;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    (n_minus_one >> s, s)
}

// One Miller-Rabin witness; false means n is certainly composite.
fn miller_rabin_round(n: &RsaBigInt, d: &RsaBigInt, s: u64, a: &RsaBigInt) -> bool {
    let n_minus_one = n - 1u8;
    let mut x = mod_pow(a, d, n);

    if x.is_one() || x == n_minus_one {
        return true;
    }

    for _ in 1..s {
        x = (&x * &x) % n;
        if x == n_minus_one {
            return true;
        }
    }

    false
}

/// Generate a random prime of exactly `bits` bits using the thread-local RNG
pub fn generate_prime(bits: u64) -> Result<RsaBigInt, RsaError> {
    generate_prime_with_rng(&mut thread_rng(), bits)
}

/// Generate a random prime of exactly `bits` bits.
/// Candidates get the top bit and the low bit forced to 1 and are resampled until prime.
pub fn generate_prime_with_rng<R: Rng + ?Sized>(
    rng: &mut R,
    bits: u64,
) -> Result<RsaBigInt, RsaError> {
    if bits < 2 {
        return Err(RsaError::InvalidBitSize { bits, minimum: 2 });
    }

    let top_bit = RsaBigInt::one() << (bits - 1);
    let mut attempts: u64 = 0;

    loop {
        attempts += 1;
        let candidate = rng.gen_biguint(bits) | &top_bit | RsaBigInt::one();

        if is_prime(&candidate) {
            debug!("found {}-bit prime after {} candidates", bits, attempts);
            return Ok(candidate);
        }
    }
}
