//! Mailbox address and access-token generation.
//!
//! Both values come from `rand::rng()`, a CSPRNG reseeded from the operating
//! system. The token is the only capability granting read access to a
//! mailbox and is independent of the address.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;

/// Number of random bytes in an access token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Length of a generated local part.
pub const LOCAL_PART_LENGTH: usize = 10;

/// Maximum length of a custom local part (RFC 5321).
pub const MAX_LOCAL_PART_LENGTH: usize = 64;

const LOCAL_PART_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a new URL-safe mailbox access token.
pub fn new_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a random local part of lowercase letters and digits.
pub fn new_local_part() -> String {
    let mut rng = rand::rng();
    (0..LOCAL_PART_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..LOCAL_PART_CHARS.len());
            LOCAL_PART_CHARS[idx] as char
        })
        .collect()
}

/// Join a local part and a domain into an address.
pub fn compose(local_part: &str, domain: &str) -> String {
    format!("{local_part}@{domain}")
}

/// Split an address at its last `@` into local part and domain.
pub fn split(address: &str) -> Option<(&str, &str)> {
    let (local, domain) = address.rsplit_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some((local, domain))
}

/// The lowercased domain of an address, if it has one.
pub fn domain_of(address: &str) -> Option<String> {
    split(address).map(|(_, domain)| domain.to_lowercase())
}

/// Normalize a caller-chosen local part (trim + lowercase) and validate it.
///
/// Accepts `[a-z0-9._+-]`, 1 to 64 characters, without a leading or trailing
/// dot and without consecutive dots.
pub fn normalize_local_part(raw: &str) -> Option<String> {
    let local = raw.trim().to_lowercase();
    if local.is_empty() || local.len() > MAX_LOCAL_PART_LENGTH {
        return None;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return None;
    }
    let valid = local
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'.' | b'_' | b'+' | b'-'));
    valid.then_some(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_is_url_safe_and_long_enough() {
        let token = new_token();
        // 32 bytes -> 43 base64 characters without padding
        assert_eq!(token.len(), 43);
        assert!(token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
        let decoded = URL_SAFE_NO_PAD.decode(&token).unwrap();
        assert_eq!(decoded.len(), TOKEN_BYTES);
    }

    #[test]
    fn test_tokens_do_not_collide() {
        let tokens: HashSet<String> = (0..10_000).map(|_| new_token()).collect();
        assert_eq!(tokens.len(), 10_000);
    }

    #[test]
    fn test_token_bytes_are_well_distributed() {
        // 10,000 tokens * 32 bytes; each byte value expected ~1250 times.
        let mut counts = [0u32; 256];
        for _ in 0..10_000 {
            for b in URL_SAFE_NO_PAD.decode(new_token()).unwrap() {
                counts[b as usize] += 1;
            }
        }
        let expected = (10_000 * TOKEN_BYTES) as f64 / 256.0;
        let chi_square: f64 = counts
            .iter()
            .map(|&c| {
                let diff = c as f64 - expected;
                diff * diff / expected
            })
            .sum();
        // 255 degrees of freedom; 400 is far beyond the 99.99th percentile.
        assert!(chi_square < 400.0, "chi-square too high: {chi_square}");
        assert!(counts.iter().all(|&c| c > 0));
    }

    #[test]
    fn test_local_part_shape() {
        for _ in 0..100 {
            let local = new_local_part();
            assert_eq!(local.len(), LOCAL_PART_LENGTH);
            assert!(local
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_local_parts_vary() {
        let locals: HashSet<String> = (0..1_000).map(|_| new_local_part()).collect();
        assert_eq!(locals.len(), 1_000);
    }

    #[test]
    fn test_split_and_domain_of() {
        assert_eq!(split("alice@example.com"), Some(("alice", "example.com")));
        assert_eq!(split("odd@local@example.com"), Some(("odd@local", "example.com")));
        assert_eq!(split("no-at-sign"), None);
        assert_eq!(split("@example.com"), None);
        assert_eq!(split("alice@"), None);
        assert_eq!(domain_of("Bob@Example.COM"), Some("example.com".to_string()));
    }

    #[test]
    fn test_compose() {
        assert_eq!(compose("alice", "example.com"), "alice@example.com");
    }

    #[test]
    fn test_normalize_local_part() {
        assert_eq!(normalize_local_part("  Alice "), Some("alice".to_string()));
        assert_eq!(normalize_local_part("first.last+tag"), Some("first.last+tag".to_string()));
        assert_eq!(normalize_local_part(""), None);
        assert_eq!(normalize_local_part("has space"), None);
        assert_eq!(normalize_local_part("a@b"), None);
        assert_eq!(normalize_local_part(".dot"), None);
        assert_eq!(normalize_local_part("dot."), None);
        assert_eq!(normalize_local_part("a..b"), None);
        assert_eq!(normalize_local_part(&"x".repeat(65)), None);
        assert!(normalize_local_part(&"x".repeat(64)).is_some());
    }
}
