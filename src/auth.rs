//! Password hashing and API token generation.
//!
//! Hashes are stored as `sha256$<iterations>$<salt>$<hex digest>`, where the
//! digest is SHA-256 applied `iterations` times over `salt || password`.

use sha2::{Digest, Sha256};
use uuid::Uuid;

const ALGORITHM: &str = "sha256";
const ITERATIONS: u32 = 36_000;
pub const TOKEN_LENGTH: usize = 40;

pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    encode(password, &salt, ITERATIONS)
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(4, '$');
    let (Some(algorithm), Some(iterations), Some(salt), Some(_)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if algorithm != ALGORITHM {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    constant_time_eq(encode(password, salt, iterations).as_bytes(), stored.as_bytes())
}

fn encode(password: &str, salt: &str, iterations: u32) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..iterations {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt.as_bytes())
            .finalize();
    }
    format!("{ALGORITHM}${iterations}${salt}${}", hex::encode(digest))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// New random token key: 40 lowercase hex characters.
pub fn generate_token() -> String {
    let seed = Sha256::new()
        .chain_update(Uuid::new_v4().as_bytes())
        .chain_update(Uuid::new_v4().as_bytes())
        .finalize();
    let mut key = hex::encode(seed);
    key.truncate(TOKEN_LENGTH);
    key
}

/// Extracts the key from an `Authorization: Token <key>` header value.
pub fn parse_token_header(value: &str) -> Option<&str> {
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(key), None) if scheme.eq_ignore_ascii_case("token") => Some(key),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let stored = hash_password("s3cret-pass");
        assert!(stored.starts_with("sha256$"));
        assert!(verify_password("s3cret-pass", &stored));
        assert!(!verify_password("s3cret-Pass", &stored));
    }

    #[test]
    fn same_password_gets_different_salts() {
        assert_ne!(hash_password("password1"), hash_password("password1"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$1$salt$abc"));
        assert!(!verify_password("x", "sha256$notanumber$salt$abc"));
    }

    #[test]
    fn tokens_are_hex_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn token_header_parsing() {
        assert_eq!(parse_token_header("Token abc123"), Some("abc123"));
        assert_eq!(parse_token_header("token   abc123"), Some("abc123"));
        assert_eq!(parse_token_header("Bearer abc123"), None);
        assert_eq!(parse_token_header("Token"), None);
        assert_eq!(parse_token_header("Token a b"), None);
    }
}
