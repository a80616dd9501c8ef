//! License code generation and normalization.
//!
//! Codes are 16 characters drawn from an unambiguous uppercase alphabet
//! (no I/O/0/1), giving 80 bits of entropy. Uniqueness is enforced by the
//! `licenses` table's primary key, not by the generator; the issue path
//! retries on a duplicate insert.

use rand::Rng;

/// Length of a generated license code.
pub const CODE_LENGTH: usize = 16;

/// Unambiguous uppercase alphabet, URL-safe (32 symbols).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a new license code from the OS-seeded CSPRNG.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Normalize a caller-supplied code: strip surrounding whitespace, uppercase.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Cheap shape check to reject garbage before hitting the database.
///
/// Expects an already-normalized code.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}
