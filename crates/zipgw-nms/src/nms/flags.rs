// crates/zipgw-nms/src/nms/flags.rs
use core::ops::BitOr;

/// Sub-mode flags that qualify the current network management operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubFlags(pub u16);

impl SubFlags {
    // --- Flag Constants ---
    pub const S2_ADD: Self = Self(1 << 0);
    pub const PROXY_INCLUSION: Self = Self(1 << 1);
    pub const LEARNMODE_NEW: Self = Self(1 << 2);
    pub const LEARNMODE_NWI: Self = Self(1 << 3);
    pub const LEARNMODE_NWE: Self = Self(1 << 4);
    pub const CONTROLLER_REPLICATION: Self = Self(1 << 5);
    pub const SMART_START: Self = Self(1 << 6);
    pub const REPORT_DSK: Self = Self(1 << 7);
    pub const CSA_INCLUSION: Self = Self(1 << 8);

    // --- Methods ---

    pub fn from_bits_truncate(bits: u16) -> Self {
        Self(bits & 0x01FF)
    }

    /// Checks if all of the specified flags are set.
    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn is_smart_start(&self) -> bool {
        self.contains(Self::SMART_START)
    }

    pub fn is_s2_add(&self) -> bool {
        self.contains(Self::S2_ADD)
    }

    pub fn is_proxy_inclusion(&self) -> bool {
        self.contains(Self::PROXY_INCLUSION)
    }

    /// Network-wide inclusion or exclusion was requested for learn mode.
    pub fn is_network_wide_learn(&self) -> bool {
        self.contains(Self::LEARNMODE_NWI) || self.contains(Self::LEARNMODE_NWE)
    }
}

impl BitOr for SubFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Per-node security flags as stored in the resource directory.
///
/// The low byte carries the granted-key bits. Bits 16..24 carry the KEX fail
/// type of the last failed bootstrap, which is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SecurityFlags(pub u32);

impl SecurityFlags {
    pub const SECURITY0: Self = Self(0x01);
    pub const KNOWN_BAD: Self = Self(0x02);
    pub const SECURITY2_UNAUTHENTICATED: Self = Self(0x10);
    pub const SECURITY2_AUTHENTICATED: Self = Self(0x20);
    pub const SECURITY2_ACCESS: Self = Self(0x40);

    /// All S2 classes.
    pub const SECURITY2: Self = Self(0x70);

    /// Bits that may be persisted in the resource directory.
    pub const PERSISTED_MASK: u32 = 0xFF;

    pub fn from_bits_truncate(bits: u32) -> Self {
        Self(bits)
    }

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn intersects(&self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn is_known_bad(&self) -> bool {
        self.contains(Self::KNOWN_BAD)
    }

    pub fn has_any_s2(&self) -> bool {
        self.intersects(Self::SECURITY2)
    }

    /// KEX fail type reported by the security engine for a failed bootstrap.
    pub fn kex_fail_type(&self) -> u8 {
        ((self.0 >> 16) & 0xFF) as u8
    }

    pub fn with_kex_fail_type(self, kex_fail: u8) -> Self {
        Self((self.0 & !0x00FF_0000) | ((kex_fail as u32) << 16))
    }

    /// The flags with transient bits stripped, ready to be persisted.
    pub fn persisted(&self) -> Self {
        Self(self.0 & Self::PERSISTED_MASK)
    }

    /// Converts the granted-key bits into the key-class bitmask used on the wire.
    pub fn key_classes(&self) -> KeyClasses {
        let mut keys = KeyClasses::empty();
        if self.contains(Self::SECURITY0) {
            keys.insert(KeyClasses::S0);
        }
        if self.contains(Self::SECURITY2_UNAUTHENTICATED) {
            keys.insert(KeyClasses::S2_UNAUTHENTICATED);
        }
        if self.contains(Self::SECURITY2_AUTHENTICATED) {
            keys.insert(KeyClasses::S2_AUTHENTICATED);
        }
        if self.contains(Self::SECURITY2_ACCESS) {
            keys.insert(KeyClasses::S2_ACCESS);
        }
        keys
    }
}

impl BitOr for SecurityFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Security key classes as encoded in the `NODE_ADD_KEYS_*` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyClasses(pub u8);

impl KeyClasses {
    pub const S2_UNAUTHENTICATED: Self = Self(0x01);
    pub const S2_AUTHENTICATED: Self = Self(0x02);
    pub const S2_ACCESS: Self = Self(0x04);
    pub const S0: Self = Self(0x80);

    pub fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & 0x87)
    }

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn intersects(&self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for KeyClasses {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}
