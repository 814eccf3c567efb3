//! Revision gate.
//!
//! Every scan source reports an opaque fingerprint. The gate joins them in
//! a fixed order (locals in configured order, then remotes) and lets a pass
//! through only when the joined value differs from the last applied one.

/// Separator between per-source fingerprints.
pub const REVISION_SEPARATOR: &str = "|";

/// Join per-source fingerprints into one combined revision.
pub fn combine<'a, L, R>(local: L, remote: R) -> String
where
    L: IntoIterator<Item = &'a str>,
    R: IntoIterator<Item = &'a str>,
{
    local
        .into_iter()
        .chain(remote)
        .collect::<Vec<_>>()
        .join(REVISION_SEPARATOR)
}

/// Remembers the last applied combined revision.
#[derive(Debug, Default, Clone)]
pub struct RevisionGate {
    applied: Option<String>,
}

impl RevisionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a pass with this combined revision would change anything.
    pub fn is_changed(&self, combined: &str) -> bool {
        self.applied.as_deref() != Some(combined)
    }

    /// Records `combined` as applied. Returns `false` when it was already
    /// the applied revision, in which case the pass must be discarded.
    pub fn admit(&mut self, combined: &str) -> bool {
        if !self.is_changed(combined) {
            return false;
        }
        self.applied = Some(combined.to_string());
        true
    }

    /// Records `combined` unconditionally.
    pub fn prime(&mut self, combined: String) {
        self.applied = Some(combined);
    }

    pub fn applied(&self) -> Option<&str> {
        self.applied.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_orders_local_before_remote() {
        let combined = combine(["a1", "a2"], ["r1"]);
        assert_eq!(combined, "a1|a2|r1");
        assert_eq!(combine(Vec::<&str>::new(), Vec::<&str>::new()), "");
    }

    #[test]
    fn test_gate_rejects_repeat() {
        let mut gate = RevisionGate::new();
        assert!(gate.is_changed("x|y"));
        assert!(gate.admit("x|y"));
        assert!(!gate.admit("x|y"));
        assert!(gate.admit("x|z"));
        assert_eq!(gate.applied(), Some("x|z"));
    }

    #[test]
    fn test_empty_library_is_a_revision() {
        let mut gate = RevisionGate::new();
        assert!(gate.admit(""));
        assert!(!gate.admit(""));
    }

    #[test]
    fn test_prime_overrides() {
        let mut gate = RevisionGate::new();
        gate.prime("initial".to_string());
        assert!(!gate.is_changed("initial"));
    }
}
