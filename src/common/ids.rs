//! Deterministic fingerprints for cohorts and artefacts.

/// FNV-1a (64-bit) over arbitrary bytes. Not cryptographic.
#[derive(Copy, Clone, Debug)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Create a new state with the FNV offset basis.
    pub fn new() -> Self {
        Self(0xcbf2_9ce4_8422_2325)
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.0 = (self.0 ^ u64::from(*b)).wrapping_mul(0x0000_0100_0000_01b3);
        }
    }

    /// 16-character lowercase hex string.
    pub fn finish_hex(&self) -> String {
        format!("{:016x}", self.0)
    }

    /// One-shot helper.
    pub fn of(bytes: &[u8]) -> String {
        let mut fp = Self::new();
        fp.update(bytes);
        fp.finish_hex()
    }
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self::new()
    }
}
