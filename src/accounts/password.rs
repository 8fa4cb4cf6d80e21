use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

/// Random salt length in bytes before hex encoding.
const SALT_BYTES: usize = 16;

/// PBKDF2-HMAC-SHA256 rounds. Changing this invalidates every stored hash.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

const HASH_BYTES: usize = 32;

/// Salt used when there is no stored salt to hash against (unknown account).
const DUMMY_SALT: &str = "00000000000000000000000000000000";

pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Derive the stored hash for `password`, returning `(hash, salt)`.
///
/// A fresh salt is generated when none is given. The hex salt string itself
/// (not its decoded bytes) is the PBKDF2 salt input.
pub fn hash_password(password: &str, salt: Option<&str>) -> (String, String) {
    let salt = match salt {
        Some(s) => s.to_owned(),
        None => generate_salt(),
    };
    let mut out = [0u8; HASH_BYTES];
    pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        salt.as_bytes(),
        PBKDF2_ITERATIONS,
        &mut out,
    );
    (hex::encode(out), salt)
}

pub fn verify_password(password: &str, salt: &str, stored_hash: &str) -> bool {
    let (candidate, _) = hash_password(password, Some(salt));
    constant_time_eq(candidate.as_bytes(), stored_hash.as_bytes())
}

/// Burn the same amount of work as a real verification.
pub fn dummy_verify(password: &str) {
    let _ = hash_password(password, Some(DUMMY_SALT));
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
