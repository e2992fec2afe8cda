pub mod credentials;

use rand::{rngs::OsRng, RngCore};

use crate::error::EntropySourceError;
use crate::models::SecretToken;

pub const SECRET_SIZE: usize = 32;

/// Generate a secret for `INIT_ADMIN_SECRET` from the OS random source
pub fn generate_secret() -> Result<SecretToken, EntropySourceError> {
    generate_secret_with(&mut OsRng)
}

/// Generate a secret from the given source. There is no fallback: a source
/// that cannot fill the buffer fails the whole call.
pub fn generate_secret_with<R: RngCore + ?Sized>(
    rng: &mut R,
) -> Result<SecretToken, EntropySourceError> {
    let mut bytes = [0u8; SECRET_SIZE];
    rng.try_fill_bytes(&mut bytes)?;
    Ok(SecretToken::from_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct BrokenRng;

    impl RngCore for BrokenRng {
        fn next_u32(&mut self) -> u32 {
            unreachable!("only try_fill_bytes is used")
        }

        fn next_u64(&mut self) -> u64 {
            unreachable!("only try_fill_bytes is used")
        }

        fn fill_bytes(&mut self, _dest: &mut [u8]) {
            unreachable!("only try_fill_bytes is used")
        }

        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "entropy pool closed",
            )))
        }
    }

    fn is_lower_hex_64(s: &str) -> bool {
        s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    #[test]
    fn test_secret_is_64_lowercase_hex() {
        for _ in 0..50 {
            let secret = generate_secret().unwrap();
            assert!(is_lower_hex_64(secret.as_str()), "bad secret format: {}", secret);
        }
    }

    #[test]
    fn test_secrets_are_distinct() {
        let secrets: HashSet<String> = (0..1000)
            .map(|_| generate_secret().unwrap().into_string())
            .collect();
        assert_eq!(secrets.len(), 1000, "secrets should never collide");
    }

    #[test]
    fn test_broken_source_is_an_error() {
        let err = generate_secret_with(&mut BrokenRng).unwrap_err();
        assert!(err.to_string().contains("secure random source unavailable"));
    }
}
