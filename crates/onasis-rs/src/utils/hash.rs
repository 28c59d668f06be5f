use sha2::{Digest, Sha256};

/// Length of the truncated hex digest used for rate-limit bucket keys.
const BUCKET_KEY_LEN: usize = 16;

/// Derives a rate-limit bucket key from caller identity material.
///
/// The key is the SHA-256 of the material, truncated to a short hex
/// prefix: long bearer tokens collapse into fixed-size map keys and raw
/// credentials never sit in the bucket map.
pub fn bucket_key(material: &str) -> String {
    let digest = Sha256::digest(material.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(BUCKET_KEY_LEN);
    key
}

/// SHA-256 of a request body, base64-encoded, as used by the HMAC
/// request-signing scheme.
pub fn body_digest(body: &[u8]) -> String {
    use base64::Engine as _;
    let digest = Sha256::digest(body);
    base64::engine::general_purpose::STANDARD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_key_is_stable_and_short() {
        let a = bucket_key("sess-1");
        let b = bucket_key("sess-1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_material_distinct_keys() {
        assert_ne!(bucket_key("alice"), bucket_key("bob"));
    }

    #[test]
    fn empty_body_digest_matches_known_value() {
        // base64(sha256(""))
        assert_eq!(body_digest(b""), "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=");
    }
}
