//! # Deterministic Shuffle
//!
//! Shuffle orders are derived, not stored: the same nonce, head track and
//! context length always give the same permutation, so an order can be
//! rebuilt after a context refresh without surprising the listener.
//!
//! The seed is the 32-bit FNV-1a hash of `"{nonce}|{head}|{len}"`; the
//! random stream is mulberry32; the permutation is a Fisher-Yates shuffle of
//! everything except the head, which stays in front.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1a over the UTF-8 bytes of `input`.
pub fn fnv1a_32(input: &str) -> u32 {
    input.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// mulberry32 pseudo-random generator.
#[derive(Debug, Clone)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6d2b_79f5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        let out = t ^ (t >> 14);
        f64::from(out) / 4_294_967_296.0
    }
}

/// Seed for a shuffle of `len` items headed by `head`.
pub fn shuffle_seed(nonce: u64, head: &str, len: usize) -> u32 {
    fnv1a_32(&format!("{}|{}|{}", nonce, head, len))
}

/// Build a shuffle order of `sequence`.
///
/// The head is `current` when it is part of `sequence`, otherwise the first
/// element. The result is a permutation of `sequence` starting with the head.
pub fn shuffle_order(sequence: &[String], current: Option<&str>, nonce: u64) -> Vec<String> {
    let Some(first) = sequence.first() else {
        return Vec::new();
    };

    let head = current
        .filter(|id| sequence.iter().any(|s| s == id))
        .unwrap_or(first.as_str());

    let mut rest: Vec<String> = sequence.iter().filter(|s| *s != head).cloned().collect();

    let mut rng = Mulberry32::new(shuffle_seed(nonce, head, sequence.len()));
    for i in (1..rest.len()).rev() {
        let j = (rng.next_f64() * (i as f64 + 1.0)).floor() as usize;
        rest.swap(i, j.min(i));
    }

    let mut order = Vec::with_capacity(sequence.len());
    order.push(head.to_string());
    order.extend(rest);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{}", i)).collect()
    }

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(fnv1a_32(""), 0x811c_9dc5);
        assert_eq!(fnv1a_32("a"), 0xe40c_292c);
        assert_eq!(fnv1a_32("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_mulberry32_is_deterministic_and_bounded() {
        let mut a = Mulberry32::new(42);
        let mut b = Mulberry32::new(42);
        for _ in 0..1000 {
            let x = a.next_f64();
            assert_eq!(x, b.next_f64());
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn test_order_is_permutation_with_head() {
        let seq = ids(20);
        let order = shuffle_order(&seq, Some("t7"), 3);

        assert_eq!(order.len(), seq.len());
        assert_eq!(order[0], "t7");
        let a: HashSet<_> = order.iter().collect();
        let b: HashSet<_> = seq.iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_same_inputs_same_order() {
        let seq = ids(50);
        assert_eq!(
            shuffle_order(&seq, Some("t3"), 9),
            shuffle_order(&seq, Some("t3"), 9)
        );
        assert_ne!(
            shuffle_order(&seq, Some("t3"), 9),
            shuffle_order(&seq, Some("t3"), 10)
        );
    }

    #[test]
    fn test_absent_current_uses_first() {
        let seq = ids(5);
        let order = shuffle_order(&seq, Some("nope"), 1);
        assert_eq!(order[0], "t0");

        let order = shuffle_order(&seq, None, 1);
        assert_eq!(order[0], "t0");
    }

    #[test]
    fn test_empty_and_single() {
        assert!(shuffle_order(&[], Some("x"), 0).is_empty());
        assert_eq!(shuffle_order(&ids(1), None, 0), vec!["t0".to_string()]);
    }
}
