//! Procedure frame: the identifiers one procedure uses.

use crate::core::expression::{DataType, Identifier, Storage};
use crate::core::register::RegisterStorage;

/// Owns the identifiers created while rewriting one procedure. Asking for
/// the same register twice returns the same identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Width of the architecture's stack slots / pointers
    pub word_bits: u32,
    identifiers: Vec<Identifier>,
    next_temp: usize,
}

impl Frame {
    pub fn new(word_bits: u32) -> Self {
        Self {
            word_bits,
            identifiers: Vec::new(),
            next_temp: 0,
        }
    }

    pub fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }

    fn find(&self, storage: &Storage) -> Option<&Identifier> {
        self.identifiers.iter().find(|id| &id.storage == storage)
    }

    /// Identifier for a whole register, created on first use.
    pub fn ensure_register(&mut self, reg: &RegisterStorage) -> Identifier {
        let storage = Storage::Register(reg.clone());
        if let Some(id) = self.find(&storage) {
            return id.clone();
        }
        let id = Identifier::register(reg, DataType::word(reg.bits as u32));
        self.identifiers.push(id.clone());
        id
    }

    /// Identifier for the bits `mask` of the flags register `reg`.
    pub fn ensure_flag_group(&mut self, reg: &RegisterStorage, mask: u32, name: &str) -> Identifier {
        let storage = Storage::FlagGroup {
            register: reg.clone(),
            mask,
        };
        if let Some(id) = self.find(&storage) {
            return id.clone();
        }
        let id = Identifier {
            name: name.to_string(),
            data_type: if mask.count_ones() == 1 {
                DataType::Bool
            } else {
                DataType::Byte
            },
            storage,
        };
        self.identifiers.push(id.clone());
        id
    }

    /// A fresh temporary.
    pub fn create_temporary(&mut self, data_type: DataType) -> Identifier {
        let n = self.next_temp;
        self.next_temp += 1;
        let id = Identifier {
            name: format!("v{}", n),
            data_type,
            storage: Storage::Temporary(n),
        };
        self.identifiers.push(id.clone());
        id
    }
}
