//! TSID Generator
//!
//! Time-sorted identifiers encoded as 13-character Crockford Base32 strings.

use rand::Rng;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Crockford Base32 alphabet (excludes I, L, O, U)
const ALPHABET: &[u8] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

static COUNTER: AtomicU16 = AtomicU16::new(0);

/// TSID Generator for creating unique, time-sorted identifiers
pub struct TsidGenerator;

impl TsidGenerator {
    /// Generate a new TSID, e.g. "0HZXEQ5Y8JY5Z"
    ///
    /// Layout (64 bits):
    /// - 42 bits: milliseconds since the Unix epoch
    /// - 10 bits: random
    /// - 12 bits: counter
    pub fn generate() -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        let counter = COUNTER.fetch_add(1, Ordering::SeqCst) as u64;
        let random: u64 = rand::thread_rng().gen_range(0..1024);

        let tsid = ((now & 0x3FF_FFFF_FFFF) << 22) | (random << 12) | (counter & 0xFFF);

        encode_crockford(tsid)
    }

    /// Whether a string looks like a TSID
    pub fn is_valid(value: &str) -> bool {
        value.len() == 13
            && value
                .bytes()
                .all(|b| ALPHABET.contains(&b.to_ascii_uppercase()))
    }
}

fn encode_crockford(mut value: u64) -> String {
    let mut result = [b'0'; 13];

    for slot in result.iter_mut().rev() {
        *slot = ALPHABET[(value & 0x1F) as usize];
        value >>= 5;
    }

    result.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_tsid() {
        let id = TsidGenerator::generate();
        assert_eq!(id.len(), 13);
        assert!(TsidGenerator::is_valid(&id));
    }

    #[test]
    fn test_uniqueness() {
        let mut ids = std::collections::HashSet::new();
        for _ in 0..1000 {
            let id = TsidGenerator::generate();
            assert!(ids.insert(id), "Duplicate TSID generated");
        }
    }

    #[test]
    fn test_sortability() {
        let id1 = TsidGenerator::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = TsidGenerator::generate();
        assert!(id1 < id2, "TSIDs should be lexicographically sortable");
    }

    #[test]
    fn test_is_valid_rejects_ambiguous_letters() {
        assert!(!TsidGenerator::is_valid("0HZXEQ5Y8JY5U"));
        assert!(!TsidGenerator::is_valid("short"));
    }
}
