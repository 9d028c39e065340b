//! 6502 to RTL rewriter.

use tracing::debug;

use crate::arch::mos6502::disassembler::Mos6502Disassembler;
use crate::arch::mos6502::instruction::{AddressMode, Mnemonic, Mos6502Instruction};
use crate::arch::mos6502::{flags, register, A, P, S, X, Y};
use crate::arch::RewriterHost;
use crate::core::address::Address;
use crate::core::disassembler::{Disassembler, DisassemblerResult};
use crate::core::expression::{
    ConditionCode, Constant, DataType, Expression, Operator, UnaryOperator,
};
use crate::core::frame::Frame;
use crate::core::image::ImageReader;
use crate::core::instruction::MachineInstruction;
use crate::core::rtl::{RtlClass, RtlInstruction, RtlInstructionCluster};
use crate::core::state::ProcessorState;

const STACK_PAGE: u16 = 0x0100;

pub struct Mos6502Rewriter<'a> {
    dasm: Mos6502Disassembler<'a>,
    state: ProcessorState,
    frame: Frame,
    host: &'a dyn RewriterHost,
    done: bool,
}

impl<'a> Mos6502Rewriter<'a> {
    pub fn new(
        rdr: ImageReader<'a>,
        state: ProcessorState,
        frame: Frame,
        host: &'a dyn RewriterHost,
    ) -> Self {
        Self {
            dasm: Mos6502Disassembler::new(rdr),
            state,
            frame,
            host,
            done: false,
        }
    }

    pub fn into_state(self) -> (ProcessorState, Frame) {
        (self.state, self.frame)
    }

    fn reg(&mut self, n: usize) -> Expression {
        Expression::id(&self.frame.ensure_register(register(n)))
    }

    fn flag_group(&mut self, mask: u32) -> Expression {
        let name: String = [
            (flags::N, 'N'),
            (flags::V, 'V'),
            (flags::D, 'D'),
            (flags::I, 'I'),
            (flags::Z, 'Z'),
            (flags::C, 'C'),
        ]
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|(_, c)| *c)
        .collect();
        Expression::id(&self.frame.ensure_flag_group(register(P), mask, &name))
    }

    fn set_flags(&mut self, m: &mut Vec<RtlInstruction>, mask: u32, e: Expression) {
        let grf = self.flag_group(mask);
        m.push(RtlInstruction::assign(grf, Expression::cond(e)));
    }

    fn write_reg(&mut self, m: &mut Vec<RtlInstruction>, n: usize, src: Expression) {
        match src.as_constant() {
            Some(c) => self.state.set_register(register(n), *c),
            None => self.state.invalidate(register(n)),
        }
        let dst = self.reg(n);
        m.push(RtlInstruction::assign(dst, src));
    }

    fn abs(v: u16) -> Expression {
        Expression::Address(Address::ptr16(v))
    }

    fn indexed(&mut self, base: Expression, index: usize) -> Expression {
        let i = self.reg(index);
        Expression::binary(
            Operator::IAdd,
            DataType::Ptr16,
            base,
            Expression::cast(DataType::Word16, false, i),
        )
    }

    /// Effective address of a memory operand.
    fn ea(&mut self, instr: &Mos6502Instruction) -> Option<Expression> {
        let v = instr.operand.value;
        let ea = match instr.operand.mode {
            AddressMode::ZeroPage | AddressMode::Absolute => Self::abs(v),
            AddressMode::ZeroPageX | AddressMode::AbsoluteX => self.indexed(Self::abs(v), X),
            AddressMode::ZeroPageY | AddressMode::AbsoluteY => self.indexed(Self::abs(v), Y),
            AddressMode::IndexedIndirect => {
                let ptr = self.indexed(Self::abs(v), X);
                Expression::mem(ptr, DataType::Ptr16)
            }
            AddressMode::IndirectIndexed => {
                let ptr = Expression::mem(Self::abs(v), DataType::Ptr16);
                self.indexed(ptr, Y)
            }
            _ => return None,
        };
        Some(ea)
    }

    /// Source operand value: immediate, accumulator or memory byte.
    fn source(&mut self, instr: &Mos6502Instruction) -> Option<Expression> {
        match instr.operand.mode {
            AddressMode::Immediate => Some(Expression::constant(Constant::byte(instr.operand.value as u8))),
            AddressMode::Accumulator => Some(self.reg(A)),
            _ => {
                let ea = self.ea(instr)?;
                Some(Expression::mem(ea, DataType::Byte))
            }
        }
    }

    fn stack_slot(&mut self) -> Expression {
        let s = self.reg(S);
        Expression::mem(
            Expression::binary(
                Operator::IAdd,
                DataType::Ptr16,
                Self::abs(STACK_PAGE),
                Expression::cast(DataType::Word16, false, s),
            ),
            DataType::Byte,
        )
    }

    fn adjust_stack(&mut self, m: &mut Vec<RtlInstruction>, op: Operator) {
        let s = self.reg(S);
        let src = Expression::binary(op, DataType::Byte, s, Expression::constant(Constant::byte(1)));
        self.write_reg(m, S, src);
    }

    fn push(&mut self, m: &mut Vec<RtlInstruction>, value: Expression) {
        let slot = self.stack_slot();
        m.push(RtlInstruction::assign(slot, value));
        self.adjust_stack(m, Operator::ISub);
    }

    fn pop(&mut self, m: &mut Vec<RtlInstruction>) -> Expression {
        self.adjust_stack(m, Operator::IAdd);
        self.stack_slot()
    }

    /// Apply `f` to a read-modify-write operand, accumulator or memory.
    fn modify(
        &mut self,
        m: &mut Vec<RtlInstruction>,
        instr: &Mos6502Instruction,
        mask: u32,
        f: impl FnOnce(&mut Self, Expression) -> Expression,
    ) -> Option<()> {
        if instr.operand.mode == AddressMode::Accumulator {
            let a = self.reg(A);
            let src = f(self, a.clone());
            self.write_reg(m, A, src);
            self.set_flags(m, mask, a);
        } else {
            let ea = self.ea(instr)?;
            let tmp = Expression::id(&self.frame.create_temporary(DataType::Byte));
            m.push(RtlInstruction::assign(tmp.clone(), Expression::mem(ea.clone(), DataType::Byte)));
            let src = f(self, tmp.clone());
            m.push(RtlInstruction::assign(tmp.clone(), src));
            m.push(RtlInstruction::assign(Expression::mem(ea, DataType::Byte), tmp.clone()));
            self.set_flags(m, mask, tmp);
        }
        Some(())
    }

    fn branch(&mut self, m: &mut Vec<RtlInstruction>, cc: ConditionCode, flag: u32, target: u16) {
        let grf = self.flag_group(flag);
        m.push(RtlInstruction::Branch {
            condition: Expression::test(cc, grf),
            target: Self::abs(target),
            class: RtlClass::TRANSFER | RtlClass::CONDITIONAL,
        });
    }

    fn set_flag(&mut self, m: &mut Vec<RtlInstruction>, flag: u32, value: bool) {
        let grf = self.flag_group(flag);
        m.push(RtlInstruction::assign(grf, Expression::constant(Constant::bool(value))));
    }

    fn rewrite(&mut self, instr: &Mos6502Instruction) -> Vec<RtlInstruction> {
        self.try_rewrite(instr)
            .unwrap_or_else(|| vec![RtlInstruction::Invalid])
    }

    fn try_rewrite(&mut self, instr: &Mos6502Instruction) -> Option<Vec<RtlInstruction>> {
        use Mnemonic::*;
        let nz = flags::N | flags::Z;
        let mut m = Vec::new();
        match instr.mnemonic {
            Lda | Ldx | Ldy => {
                let r = match instr.mnemonic {
                    Lda => A,
                    Ldx => X,
                    _ => Y,
                };
                let src = self.source(instr)?;
                self.write_reg(&mut m, r, src);
                let v = self.reg(r);
                self.set_flags(&mut m, nz, v);
            }
            Sta | Stx | Sty => {
                let r = match instr.mnemonic {
                    Sta => A,
                    Stx => X,
                    _ => Y,
                };
                let ea = self.ea(instr)?;
                let v = self.reg(r);
                m.push(RtlInstruction::assign(Expression::mem(ea, DataType::Byte), v));
            }
            Tax | Tay | Txa | Tya | Tsx | Txs => {
                let (src, dst) = match instr.mnemonic {
                    Tax => (A, X),
                    Tay => (A, Y),
                    Txa => (X, A),
                    Tya => (Y, A),
                    Tsx => (S, X),
                    _ => (X, S),
                };
                let v = self.reg(src);
                self.write_reg(&mut m, dst, v);
                if dst != S {
                    let d = self.reg(dst);
                    self.set_flags(&mut m, nz, d);
                }
            }
            And | Ora | Eor => {
                let op = match instr.mnemonic {
                    And => Operator::And,
                    Ora => Operator::Or,
                    _ => Operator::Xor,
                };
                let src = self.source(instr)?;
                let a = self.reg(A);
                self.write_reg(&mut m, A, Expression::binary(op, DataType::Byte, a.clone(), src));
                self.set_flags(&mut m, nz, a);
            }
            Adc | Sbc => {
                let src = self.source(instr)?;
                let a = self.reg(A);
                let c = self.flag_group(flags::C);
                let e = if instr.mnemonic == Adc {
                    Expression::binary(
                        Operator::IAdd,
                        DataType::Byte,
                        Expression::binary(Operator::IAdd, DataType::Byte, a.clone(), src),
                        c,
                    )
                } else {
                    Expression::binary(
                        Operator::ISub,
                        DataType::Byte,
                        Expression::binary(Operator::ISub, DataType::Byte, a.clone(), src),
                        Expression::unary(UnaryOperator::Not, DataType::Bool, c),
                    )
                };
                self.write_reg(&mut m, A, e);
                self.set_flags(&mut m, flags::N | flags::V | flags::Z | flags::C, a);
            }
            Asl | Lsr => {
                let op = if instr.mnemonic == Asl {
                    Operator::Shl
                } else {
                    Operator::Shr
                };
                self.modify(&mut m, instr, nz | flags::C, |_, v| {
                    Expression::binary(op, DataType::Byte, v, Expression::constant(Constant::byte(1)))
                })?;
            }
            Rol | Ror => {
                let function = if instr.mnemonic == Rol { "__rcl" } else { "__rcr" };
                self.modify(&mut m, instr, nz | flags::C, |rw, v| {
                    let c = rw.flag_group(flags::C);
                    Expression::Application {
                        function: function.into(),
                        args: vec![v, Expression::constant(Constant::byte(1)), c],
                        data_type: DataType::Byte,
                    }
                })?;
            }
            Inc | Dec => {
                let op = if instr.mnemonic == Inc {
                    Operator::IAdd
                } else {
                    Operator::ISub
                };
                self.modify(&mut m, instr, nz, |_, v| {
                    Expression::binary(op, DataType::Byte, v, Expression::constant(Constant::byte(1)))
                })?;
            }
            Inx | Iny | Dex | Dey => {
                let (r, op) = match instr.mnemonic {
                    Inx => (X, Operator::IAdd),
                    Iny => (Y, Operator::IAdd),
                    Dex => (X, Operator::ISub),
                    _ => (Y, Operator::ISub),
                };
                let one = Constant::byte(1);
                let known = self
                    .state
                    .get_register(register(r))
                    .map(|v| op.apply_constants(&v, &one));
                let v = self.reg(r);
                self.write_reg(&mut m, r, Expression::binary(op, DataType::Byte, v.clone(), Expression::constant(one)));
                if let Some(k) = known {
                    self.state.set_register(register(r), k);
                }
                self.set_flags(&mut m, nz, v);
            }
            Cmp | Cpx | Cpy => {
                let r = match instr.mnemonic {
                    Cmp => A,
                    Cpx => X,
                    _ => Y,
                };
                let src = self.source(instr)?;
                let v = self.reg(r);
                self.set_flags(
                    &mut m,
                    nz | flags::C,
                    Expression::binary(Operator::ISub, DataType::Byte, v, src),
                );
            }
            Bit => {
                let src = self.source(instr)?;
                let a = self.reg(A);
                self.set_flags(
                    &mut m,
                    flags::N | flags::V | flags::Z,
                    Expression::binary(Operator::And, DataType::Byte, a, src),
                );
            }
            Bpl => self.branch(&mut m, ConditionCode::Ns, flags::N, instr.operand.value),
            Bmi => self.branch(&mut m, ConditionCode::Sg, flags::N, instr.operand.value),
            Bvc => self.branch(&mut m, ConditionCode::No, flags::V, instr.operand.value),
            Bvs => self.branch(&mut m, ConditionCode::Ov, flags::V, instr.operand.value),
            Bcc => self.branch(&mut m, ConditionCode::Uge, flags::C, instr.operand.value),
            Bcs => self.branch(&mut m, ConditionCode::Ult, flags::C, instr.operand.value),
            Bne => self.branch(&mut m, ConditionCode::Ne, flags::Z, instr.operand.value),
            Beq => self.branch(&mut m, ConditionCode::Eq, flags::Z, instr.operand.value),
            Jmp => {
                let target = if instr.operand.mode == AddressMode::Indirect {
                    Expression::mem(Self::abs(instr.operand.value), DataType::Ptr16)
                } else {
                    Self::abs(instr.operand.value)
                };
                m.push(RtlInstruction::goto(target, RtlClass::TRANSFER));
            }
            Jsr => {
                let target = Address::ptr16(instr.operand.value);
                let continuation = instr.next_address();
                let callee = match self.host.get_imported_procedure(target, continuation) {
                    Some(p) => Expression::ExternalProcedure(p.name),
                    None => Expression::Address(target),
                };
                m.push(RtlInstruction::Call {
                    target: callee,
                    return_address_size: 2,
                    class: RtlClass::TRANSFER | RtlClass::CALL,
                });
            }
            Rts => m.push(RtlInstruction::Return {
                return_address_size: 2,
                class: RtlClass::TRANSFER,
            }),
            Rti => {
                let v = self.pop(&mut m);
                self.write_reg(&mut m, P, v);
                m.push(RtlInstruction::Return {
                    return_address_size: 2,
                    class: RtlClass::TRANSFER,
                });
            }
            Brk => m.push(RtlInstruction::SideEffect(Expression::Application {
                function: "__brk".into(),
                args: vec![],
                data_type: DataType::Byte,
            })),
            Pha | Php => {
                let r = if instr.mnemonic == Pha { A } else { P };
                let v = self.reg(r);
                self.push(&mut m, v);
            }
            Pla | Plp => {
                let r = if instr.mnemonic == Pla { A } else { P };
                let v = self.pop(&mut m);
                self.write_reg(&mut m, r, v);
                if r == A {
                    let a = self.reg(A);
                    self.set_flags(&mut m, nz, a);
                }
            }
            Clc => self.set_flag(&mut m, flags::C, false),
            Sec => self.set_flag(&mut m, flags::C, true),
            Cli => self.set_flag(&mut m, flags::I, false),
            Sei => self.set_flag(&mut m, flags::I, true),
            Cld => self.set_flag(&mut m, flags::D, false),
            Sed => self.set_flag(&mut m, flags::D, true),
            Clv => self.set_flag(&mut m, flags::V, false),
            Nop => m.push(RtlInstruction::Nop),
        }
        Some(m)
    }
}

impl Iterator for Mos6502Rewriter<'_> {
    type Item = DisassemblerResult<RtlInstructionCluster>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.dasm.reader().is_at_end() {
            return None;
        }
        match self.dasm.disassemble_instruction() {
            Ok(instr) => {
                let rtls = self.rewrite(&instr);
                Some(Ok(RtlInstructionCluster::new(instr.address(), instr.length(), rtls)))
            }
            Err(e) => {
                debug!(error = %e, "6502 rewrite stopped");
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::mos6502::Mos6502Architecture;
    use crate::arch::ProcessorArchitecture;
    use crate::core::image::LoadedImage;
    use crate::core::procedure::ExternalProcedure;

    struct NoHost;

    impl RewriterHost for NoHost {
        fn get_imported_procedure(&self, _: Address, _: Address) -> Option<ExternalProcedure> {
            None
        }

        fn get_intercepted_call(&self, _: Address) -> Option<ExternalProcedure> {
            None
        }
    }

    fn rewrite(bytes: &[u8]) -> Vec<RtlInstructionCluster> {
        let img = LoadedImage::new(Address::ptr16(0x0800), bytes.to_vec());
        let arch = Mos6502Architecture::new();
        let rdr = arch.create_image_reader(&img, img.base()).unwrap();
        Mos6502Rewriter::new(rdr, arch.create_processor_state(), arch.create_frame(), &NoHost)
            .map(|c| c.unwrap())
            .collect()
    }

    fn rtl(bytes: &[u8]) -> Vec<String> {
        rewrite(bytes)
            .into_iter()
            .flat_map(|c| c.instructions)
            .map(|i| i.to_string())
            .collect()
    }

    #[test]
    fn rw6502_lda_imm() {
        assert_eq!(rtl(&[0xA9, 0x10]), vec!["a = 0x10", "NZ = cond(a)"]);
    }

    #[test]
    fn rw6502_sta_abs_y() {
        assert_eq!(
            rtl(&[0x99, 0x00, 0x03]),
            vec!["Mem[0300 + (word16) y:byte] = a"]
        );
    }

    #[test]
    fn rw6502_asl_memory_uses_temporary() {
        assert_eq!(
            rtl(&[0x06, 0x06]),
            vec![
                "v0 = Mem[0006:byte]",
                "v0 = v0 << 0x01",
                "Mem[0006:byte] = v0",
                "NZC = cond(v0)",
            ]
        );
    }

    #[test]
    fn rw6502_branch() {
        let c = rewrite(&[0xB0, 0x02]);
        assert_eq!(c[0].class, RtlClass::TRANSFER | RtlClass::CONDITIONAL);
        assert_eq!(c[0].instructions[0].to_string(), "if (Test(ULT,C)) branch 0804");
    }

    #[test]
    fn rw6502_jsr_rts() {
        assert_eq!(rtl(&[0x20, 0x00, 0x10, 0x60]), vec!["call 1000", "return"]);
    }

    #[test]
    fn rw6502_pha() {
        assert_eq!(
            rtl(&[0x48]),
            vec!["Mem[0100 + (word16) s:byte] = a", "s = s - 0x01"]
        );
    }

    #[test]
    fn rw6502_clc() {
        assert_eq!(rtl(&[0x18]), vec!["C = 0x0"]);
    }

    #[test]
    fn rw6502_state_tracks_ldx_inx() {
        let img = LoadedImage::new(Address::ptr16(0x0800), vec![0xA2, 0xFF, 0xE8]);
        let arch = Mos6502Architecture::new();
        let rdr = arch.create_image_reader(&img, img.base()).unwrap();
        let mut rw = Mos6502Rewriter::new(rdr, arch.create_processor_state(), arch.create_frame(), &NoHost);
        assert_eq!(rw.by_ref().count(), 2);
        let (state, _) = rw.into_state();
        assert_eq!(state.get_register(register(X)), Some(Constant::byte(0)));
    }

    #[test]
    fn rw6502_cluster_lengths() {
        let c = rewrite(&[0xEA, 0xAD, 0x00, 0x02, 0xA9, 0x01]);
        let pairs: Vec<_> = c.iter().map(|c| (c.address.value, c.length)).collect();
        assert_eq!(pairs, vec![(0x800, 1), (0x801, 3), (0x804, 2)]);
    }
}
