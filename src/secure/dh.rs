//! Diffie-Hellman key agreement over a fixed prime group.

use rand::rngs::OsRng;
use rand::Rng;

/// Public prime modulus shared by both sides.
pub const PRIME: u64 = 9_007_199_254_740_881;

/// Public generator.
pub const GENERATOR: u64 = 2;

/// Modular exponentiation with u128 intermediates to avoid overflow.
fn mod_pow(base: u64, mut exp: u64, modulus: u64) -> u64 {
    let mut result: u128 = 1;
    let mut base = (base as u128) % (modulus as u128);
    let m = modulus as u128;

    while exp > 0 {
        if exp & 1 == 1 {
            result = result * base % m;
        }
        base = base * base % m;
        exp >>= 1;
    }

    result as u64
}

/// Draw a private exponent from the full exponent range using the OS
/// secure random generator.
pub fn generate_private_key() -> u64 {
    OsRng.gen_range(2..PRIME - 1)
}

/// Compute the public value `G^private mod P`.
pub fn public_key(private: u64) -> u64 {
    mod_pow(GENERATOR, private, PRIME)
}

/// Compute the shared secret `peer_public^private mod P`.
pub fn shared_secret(peer_public: u64, private: u64) -> u64 {
    mod_pow(peer_public, private, PRIME)
}
