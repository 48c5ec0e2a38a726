//! Randomness for DH exponents and OAuth nonces

use rand::rngs::OsRng;
use rand::RngCore;
use rsa::BigUint;

use crate::error::{AuthError, AuthResult};

/// Bit length of OAuth nonces
pub const NONCE_BITS: usize = 128;

/// Source of cryptographically secure random bytes
pub trait EntropySource: Send + Sync {
    /// Fill `dest` entirely or fail
    fn fill(&self, dest: &mut [u8]) -> AuthResult<()>;
}

/// Operating system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, dest: &mut [u8]) -> AuthResult<()> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| AuthError::Randomness(e.to_string()))
    }
}

/// Draw a random unsigned integer below `2^bits`
pub fn random_biguint(source: &dyn EntropySource, bits: usize) -> AuthResult<BigUint> {
    let mut bytes = zeroize::Zeroizing::new(vec![0u8; bits.div_ceil(8)]);
    source.fill(&mut bytes)?;

    let excess = bytes.len() * 8 - bits;
    if excess > 0 {
        bytes[0] &= 0xff >> excess;
    }

    Ok(BigUint::from_bytes_be(&bytes))
}

/// Fresh OAuth nonce: a 128-bit random integer as lower-case hex
pub fn generate_nonce(source: &dyn EntropySource) -> AuthResult<String> {
    Ok(random_biguint(source, NONCE_BITS)?.to_str_radix(16))
}

/// Entropy source that repeats one byte
///
/// Makes exponents and nonces predictable so negotiation output can be
/// compared against precomputed vectors.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone, Copy)]
pub struct FixedEntropy(pub u8);

#[cfg(any(test, feature = "test-utils"))]
impl EntropySource for FixedEntropy {
    fn fill(&self, dest: &mut [u8]) -> AuthResult<()> {
        dest.fill(self.0);
        Ok(())
    }
}
