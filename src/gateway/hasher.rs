//! Stable 64-bit node identifiers.
//!
//! FNV-1a is used: fast, well distributed, and deterministic across runs.
//! Distinct inputs may collide; the kernel-side table tolerates that.

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// FNV-1a 64 of a whole string.
pub fn hash_str(s: &str) -> u64 {
    fnv1a(FNV_OFFSET, s.as_bytes())
}

/// Identifier for the node named `name` whose object is `cid`.
///
/// Equal to `hash_str(&format!("{cid}/{name}"))` without the allocation.
pub fn stable_id(cid: &str, name: &str) -> u64 {
    let hash = fnv1a(FNV_OFFSET, cid.as_bytes());
    let hash = fnv1a(hash, b"/");
    fnv1a(hash, name.as_bytes())
}
