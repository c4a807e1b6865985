use sha2::{Digest, Sha256};

/// Content hash stored on photo vertices, `sha256+<hex>`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256+{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash() {
        assert_eq!(
            content_hash(b"abc"),
            "sha256+ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_content_hash_differs_by_content() {
        assert_ne!(content_hash(b"one"), content_hash(b"two"));
    }
}
