//! Random code and token generators.
//!
//! One-time codes are fixed-length numeric strings sent out-of-band (email or
//! SMS) and never stored in plaintext. Opaque tokens are 64-character hex
//! strings used as one-time bearer secrets in links (e.g. password reset).

use rand::Rng;

/// Length of a one-time numeric code.
pub const OTP_CODE_LENGTH: usize = 6;

/// Length of a referral code.
pub const REFERRAL_CODE_LENGTH: usize = 8;

/// Number of random bytes behind an opaque bearer token (hex-encoded to 64 chars).
const OPAQUE_TOKEN_BYTES: usize = 32;

/// Generate a fixed-length numeric one-time code.
pub fn numeric_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Generate an opaque bearer token: 32 random bytes, hex-encoded.
pub fn opaque_token() -> String {
    let mut rng = rand::rng();
    let mut out = String::with_capacity(OPAQUE_TOKEN_BYTES * 2);
    for _ in 0..OPAQUE_TOKEN_BYTES {
        let byte: u8 = rng.random();
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Generate an alphanumeric referral code (uppercased for readability).
pub fn referral_code() -> String {
    let code: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(REFERRAL_CODE_LENGTH)
        .map(char::from)
        .collect();
    code.to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_code_has_requested_length_and_digits_only() {
        let code = numeric_code(OTP_CODE_LENGTH);
        assert_eq!(code.len(), OTP_CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn opaque_token_is_64_hex_chars() {
        let token = opaque_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn opaque_tokens_are_unique() {
        assert_ne!(opaque_token(), opaque_token());
    }

    #[test]
    fn referral_code_is_8_uppercase_alphanumeric() {
        let code = referral_code();
        assert_eq!(code.len(), REFERRAL_CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
