//! Register storage and register bitsets.
//!
//! Every architecture exposes its register file as a slice of
//! `RegisterStorage`. Register numbers index into that file and into
//! `RegisterSet`, a bitset sized to the file.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Types of CPU registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterKind {
    /// General purpose registers
    General,
    /// Multiply/divide result registers (MIPS hi/lo)
    Special,
    /// Status/flags registers
    Flags,
    /// Stack pointer
    Stack,
    /// Program counter
    ProgramCounter,
}

impl fmt::Display for RegisterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterKind::General => write!(f, "General"),
            RegisterKind::Special => write!(f, "Special"),
            RegisterKind::Flags => write!(f, "Flags"),
            RegisterKind::Stack => write!(f, "Stack"),
            RegisterKind::ProgramCounter => write!(f, "ProgramCounter"),
        }
    }
}

/// One architectural register.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisterStorage {
    /// Register name (e.g., "r28", "sp", "a")
    pub name: String,
    /// Index in the architecture's register file
    pub number: usize,
    /// Size in bits
    pub bits: u16,
    /// Type of register
    pub kind: RegisterKind,
}

impl RegisterStorage {
    pub fn new(name: impl Into<String>, number: usize, bits: u16, kind: RegisterKind) -> Self {
        Self {
            name: name.into(),
            number,
            bits,
            kind,
        }
    }

    /// Create a general purpose register
    pub fn general(name: impl Into<String>, number: usize, bits: u16) -> Self {
        Self::new(name, number, bits, RegisterKind::General)
    }
}

impl fmt::Display for RegisterStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Fixed-size bitset indexed by register number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RegisterSet {
    words: Vec<u64>,
    len: usize,
}

impl RegisterSet {
    /// Empty set with room for `len` registers.
    pub fn with_capacity(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    pub fn capacity(&self) -> usize {
        self.len
    }

    /// Mark register `n`. Numbers outside the register file are ignored.
    pub fn insert(&mut self, n: usize) {
        if n < self.len {
            self.words[n / 64] |= 1u64 << (n % 64);
        }
    }

    pub fn remove(&mut self, n: usize) {
        if n < self.len {
            self.words[n / 64] &= !(1u64 << (n % 64));
        }
    }

    pub fn contains(&self, n: usize) -> bool {
        n < self.len && self.words[n / 64] & (1u64 << (n % 64)) != 0
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Register numbers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |n| self.contains(*n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_creation() {
        let reg = RegisterStorage::general("r28", 28, 32);
        assert_eq!(reg.name, "r28");
        assert_eq!(reg.number, 28);
        assert_eq!(reg.kind, RegisterKind::General);
        assert_eq!(reg.to_string(), "r28");
    }

    #[test]
    fn test_register_set_membership() {
        let mut set = RegisterSet::with_capacity(70);
        set.insert(28);
        set.insert(65);
        assert!(set.contains(28));
        assert!(set.contains(65));
        assert!(!set.contains(29));
        assert_eq!(set.count(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![28, 65]);
        set.remove(28);
        assert!(!set.contains(28));
    }

    #[test]
    fn test_register_set_ignores_out_of_range() {
        let mut set = RegisterSet::with_capacity(8);
        set.insert(8);
        assert!(set.is_empty());
        assert!(!set.contains(100));
    }
}
