//! Password hashing and credential generation.
//!
//! Uses Argon2id for resource-owner passwords.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;

/// Hash a password using Argon2id.
///
/// Returns the PHC-formatted hash string suitable for storage.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// 256 bits from the OS random source, URL-safe base64 without padding.
///
/// Used for authorization codes, access and refresh tokens, and generated
/// client ids and secrets.
pub fn generate_token() -> Result<String, getrandom::Error> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let password = "my-secure-password-123!";
        let hash = hash_password(password).expect("Failed to hash password");

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(password, &hash));
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn test_hash_produces_different_salts() {
        let hash1 = hash_password("same-password").expect("Failed to hash");
        let hash2 = hash_password("same-password").expect("Failed to hash");
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_invalid_hash_format() {
        // Invalid hash formats should return false, not panic
        assert!(!verify_password("password", "not-a-valid-hash"));
        assert!(!verify_password("password", ""));
    }

    #[test]
    fn test_generate_token() {
        let token1 = generate_token().unwrap();
        let token2 = generate_token().unwrap();

        assert_ne!(token1, token2);
        assert!(!token1.contains('+'));
        assert!(!token1.contains('/'));
        assert!(!token1.contains('='));
        assert_eq!(token1.len(), 43);
    }
}
