//! Processor state tracked while rewriting one procedure.
//!
//! The state is a plain value owned by the rewriter. Each instruction may
//! record or forget register values; callers get it back with
//! `into_state()` once the rewriter is done.

use std::collections::BTreeMap;

use crate::core::expression::Constant;
use crate::core::register::RegisterStorage;

/// Known register contents, keyed by register number.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessorState {
    values: BTreeMap<usize, Constant>,
}

impl ProcessorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_register(&self, reg: &RegisterStorage) -> Option<Constant> {
        self.values.get(&reg.number).copied()
    }

    pub fn set_register(&mut self, reg: &RegisterStorage, value: Constant) {
        self.values.insert(reg.number, value);
    }

    /// Forget what is known about `reg`.
    pub fn invalidate(&mut self, reg: &RegisterStorage) {
        self.values.remove(&reg.number);
    }

    pub fn known_registers(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_invalidate() {
        let r2 = RegisterStorage::general("r2", 2, 32);
        let mut st = ProcessorState::new();
        assert_eq!(st.get_register(&r2), None);
        st.set_register(&r2, Constant::word32(0x40_0000));
        assert_eq!(st.get_register(&r2), Some(Constant::word32(0x40_0000)));
        st.invalidate(&r2);
        assert_eq!(st.known_registers(), 0);
    }
}
