use xxhash_rust::xxh3::Xxh3;

/// Hash a pair of strings (typically vertex and fragment shader sources).
///
/// The two inputs are separated so that moving text across the boundary changes the hash.
pub fn calculate_hash(first: &str, second: &str) -> u64 {
    let mut h = Xxh3::new();
    h.update(first.as_bytes());
    h.update(&[0]);
    h.update(second.as_bytes());
    h.digest()
}

/// Hash a single byte payload.
pub fn calculate_hash_bytes(bytes: &[u8]) -> u64 {
    xxhash_rust::xxh3::xxh3_64(bytes)
}
