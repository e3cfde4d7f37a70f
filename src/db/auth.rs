//! chap-sha1 authentication.

use crate::error::{GatewayError, Result};
use sha1::{Digest, Sha1};

/// Authentication mechanism name sent in the AUTH tuple.
pub const CHAP_SHA1: &str = "chap-sha1";

/// Length of a SHA-1 digest and of the salt prefix that is mixed in.
pub const SCRAMBLE_SIZE: usize = 20;

/// Computes `sha1(password) XOR sha1(salt[..20] ++ sha1(sha1(password)))`.
pub fn scramble(salt: &[u8], password: &str) -> Result<[u8; SCRAMBLE_SIZE]> {
    if salt.len() < SCRAMBLE_SIZE {
        return Err(GatewayError::connection(format!(
            "salt too short: {} bytes",
            salt.len()
        )));
    }

    let step1 = Sha1::digest(password.as_bytes());
    let step2 = Sha1::digest(step1);

    let mut hasher = Sha1::new();
    hasher.update(&salt[..SCRAMBLE_SIZE]);
    hasher.update(step2);
    let step3 = hasher.finalize();

    let mut out = [0u8; SCRAMBLE_SIZE];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = step1[i] ^ step3[i];
    }
    Ok(out)
}
