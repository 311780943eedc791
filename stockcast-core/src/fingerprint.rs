//! Content hashing for artifacts, sources and configurations.
//!
//! Every hash is a lowercase BLAKE3 hex digest, stable across builds and
//! platforms.

use serde::Serialize;
use std::fs::File;
use std::io;
use std::path::Path;

pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Hash the canonical JSON form of `value`.
///
/// Maps must be `BTreeMap`s (or structs) for the key order to be stable.
pub fn hash_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(hash_bytes(&json))
}

/// Stream a file through the hasher.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Write;

    #[test]
    fn hash_is_deterministic_hex() {
        let a = hash_bytes(b"stockcast");
        assert_eq!(a, hash_bytes(b"stockcast"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, hash_bytes(b"stockcast "));
    }

    #[test]
    fn json_hash_ignores_insertion_order() {
        let mut m1 = BTreeMap::new();
        m1.insert("n_trees", 50);
        m1.insert("max_depth", 10);
        let mut m2 = BTreeMap::new();
        m2.insert("max_depth", 10);
        m2.insert("n_trees", 50);
        assert_eq!(hash_json(&m1).unwrap(), hash_json(&m2).unwrap());
    }

    #[test]
    fn file_hash_matches_byte_hash() {
        let path = std::env::temp_dir().join(format!("stockcast_fp_{}.bin", std::process::id()));
        let mut f = File::create(&path).unwrap();
        f.write_all(b"symbol,timestamp\n").unwrap();
        drop(f);

        assert_eq!(hash_file(&path).unwrap(), hash_bytes(b"symbol,timestamp\n"));
        std::fs::remove_file(&path).unwrap();
    }
}
