//! Identifier generation for newly created remote objects.
//!
//! Ids and codes are usability identifiers, not security tokens. Uniqueness
//! against the remote system is the caller's problem (see the conflict
//! resolution path in `provisioning`).

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

/// Length of a remote object id.
pub const OBJECT_ID_LEN: usize = 11;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Source of object ids and codes. Injected so tests can be deterministic.
pub trait IdGenerator: Send + Sync {
    /// An 11-character id drawn from `[A-Za-z0-9]`, starting with a letter.
    fn new_object_id(&self) -> String;

    /// A code of total length `length`: `prefix` followed by `[A-Z0-9]`
    /// characters. A prefix longer than `length` is cut to `length`.
    fn new_code(&self, prefix: &str, length: usize) -> String;
}

/// Uniform pseudo-random generator backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl RandomIdGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl IdGenerator for RandomIdGenerator {
    fn new_object_id(&self) -> String {
        let mut rng = rand::rng();
        let mut id = String::with_capacity(OBJECT_ID_LEN);
        id.push(LETTERS[rng.random_range(0..LETTERS.len())] as char);
        for _ in 1..OBJECT_ID_LEN {
            id.push(ALPHANUMERIC[rng.random_range(0..ALPHANUMERIC.len())] as char);
        }
        id
    }

    fn new_code(&self, prefix: &str, length: usize) -> String {
        let mut code: String = prefix.chars().take(length).collect();
        let mut rng = rand::rng();
        while code.chars().count() < length {
            code.push(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char);
        }
        code
    }
}

/// Deterministic generator for tests: ids and codes come from a shared counter.
#[derive(Debug, Default)]
pub struct SequenceIdGenerator {
    counter: AtomicU64,
}

impl SequenceIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

fn base36_upper(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(CODE_ALPHABET[(26 + (n % 36) as usize) % 36]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

impl IdGenerator for SequenceIdGenerator {
    fn new_object_id(&self) -> String {
        format!("id{:09}", self.next())
    }

    fn new_code(&self, prefix: &str, length: usize) -> String {
        let mut code: String = prefix.chars().take(length).collect();
        let room = length.saturating_sub(code.chars().count());
        if room > 0 {
            let suffix = base36_upper(self.next());
            let padded = format!("{:0>width$}", suffix, width = room);
            code.push_str(&padded[padded.len().saturating_sub(room)..]);
        }
        code
    }
}
