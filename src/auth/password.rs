use crate::social::domain::MAX_PASSWORD_BYTES;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password is longer than 72 bytes")]
    TooLong,

    #[error(transparent)]
    Bcrypt(#[from] bcrypt::BcryptError),
}

/// Hash a password with bcrypt. Every call draws a fresh salt, so hashing the
/// same password twice gives two different strings.
///
/// bcrypt ignores input past 72 bytes, so longer passwords are refused
/// rather than silently truncated.
pub fn hash_password(plaintext: &str, cost: u32) -> Result<String, PasswordError> {
    if plaintext.len() > MAX_PASSWORD_BYTES {
        return Err(PasswordError::TooLong);
    }
    Ok(bcrypt::hash(plaintext, cost)?)
}

/// Check a password against a stored bcrypt hash.
///
/// A malformed hash, or a password too long to have been hashed, counts as
/// a mismatch.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    if plaintext.len() > MAX_PASSWORD_BYTES {
        return false;
    }
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(
    plaintext: String,
    cost: u32,
) -> Result<String, crate::error::AppError> {
    let hash = tokio::task::spawn_blocking(move || hash_password(&plaintext, cost)).await??;
    Ok(hash)
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(
    plaintext: String,
    hash: String,
) -> Result<bool, crate::error::AppError> {
    Ok(tokio::task::spawn_blocking(move || verify_password(&plaintext, &hash)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    // bcrypt's minimum cost keeps the tests fast
    const COST: u32 = 4;

    #[test]
    fn hash_verifies_against_same_password() {
        let hash = hash_password("correct horse", COST).unwrap();
        assert!(verify_password("correct horse", &hash));
    }

    #[test]
    fn hash_rejects_other_password() {
        let hash = hash_password("correct horse", COST).unwrap();
        assert!(!verify_password("correct horse ", &hash));
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("", &hash));
    }

    #[test]
    fn same_password_hashes_differently() {
        let h1 = hash_password("repeat me", COST).unwrap();
        let h2 = hash_password("repeat me", COST).unwrap();
        assert_ne!(h1, h2);
        assert!(verify_password("repeat me", &h1));
        assert!(verify_password("repeat me", &h2));
    }

    #[test]
    fn hash_does_not_contain_plaintext() {
        let hash = hash_password("plain-text-secret", COST).unwrap();
        assert!(!hash.contains("plain-text-secret"));
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn passwords_sharing_a_72_byte_prefix_do_not_match() {
        let prefix = "a".repeat(MAX_PASSWORD_BYTES);
        let stored = format!("{}other-suffix", prefix);
        let attempt = format!("{}first-suffix", prefix);

        assert!(matches!(
            hash_password(&stored, COST),
            Err(PasswordError::TooLong)
        ));

        let hash = hash_password(&prefix, COST).unwrap();
        assert!(verify_password(&prefix, &hash));
        assert!(!verify_password(&attempt, &hash));
        assert!(!verify_password(&stored, &hash));
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
        assert!(!verify_password("anything", ""));
    }

    #[tokio::test]
    async fn blocking_wrappers_round_trip() {
        let hash = hash_password_blocking("over the wall".into(), COST)
            .await
            .unwrap();
        assert!(verify_password_blocking("over the wall".into(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password_blocking("under the wall".into(), hash)
            .await
            .unwrap());
    }
}
