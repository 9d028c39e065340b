//! MIPS32 to RTL rewriter.
//!
//! `r0` always reads as zero and writes to it are dropped. Branches and jumps
//! carry `RtlClass::DELAY`; the delay-slot instruction follows as a separate
//! cluster.

use tracing::debug;

use crate::arch::mips::disassembler::MipsDisassembler;
use crate::arch::mips::instruction::{MipsInstruction, MipsOperand, Opcode};
use crate::arch::mips::{register, HI, LO, RA};
use crate::arch::RewriterHost;
use crate::core::address::Address;
use crate::core::disassembler::{Disassembler, DisassemblerResult};
use crate::core::expression::{Constant, DataType, Expression, Operator, UnaryOperator};
use crate::core::frame::Frame;
use crate::core::image::ImageReader;
use crate::core::instruction::MachineInstruction;
use crate::core::rtl::{RtlClass, RtlInstruction, RtlInstructionCluster};
use crate::core::state::ProcessorState;

const W32: DataType = DataType::Word32;

fn reg_at(i: &MipsInstruction, n: usize) -> Option<usize> {
    match i.op(n)? {
        MipsOperand::Register(r) => Some(*r as usize),
        _ => None,
    }
}

fn simm_at(i: &MipsInstruction, n: usize) -> Option<i32> {
    match i.op(n)? {
        MipsOperand::SignedImmediate(v) => Some(*v),
        _ => None,
    }
}

fn uimm_at(i: &MipsInstruction, n: usize) -> Option<u32> {
    match i.op(n)? {
        MipsOperand::UnsignedImmediate(v) => Some(*v),
        _ => None,
    }
}

fn mem_at(i: &MipsInstruction, n: usize) -> Option<(usize, i16)> {
    match i.op(n)? {
        MipsOperand::Memory { base, offset } => Some((*base as usize, *offset)),
        _ => None,
    }
}

fn addr_at(i: &MipsInstruction, n: usize) -> Option<Address> {
    match i.op(n)? {
        MipsOperand::Address(a) => Some(*a),
        _ => None,
    }
}

pub struct MipsRewriter<'a> {
    dasm: MipsDisassembler<'a>,
    state: ProcessorState,
    frame: Frame,
    host: &'a dyn RewriterHost,
    done: bool,
}

impl<'a> MipsRewriter<'a> {
    pub fn new(
        rdr: ImageReader<'a>,
        state: ProcessorState,
        frame: Frame,
        host: &'a dyn RewriterHost,
    ) -> Self {
        Self {
            dasm: MipsDisassembler::new(rdr),
            state,
            frame,
            host,
            done: false,
        }
    }

    /// Hand back the processor state and frame once rewriting is over.
    pub fn into_state(self) -> (ProcessorState, Frame) {
        (self.state, self.frame)
    }

    fn read(&mut self, r: usize) -> Expression {
        if r == 0 {
            return Expression::word32(0);
        }
        Expression::id(&self.frame.ensure_register(register(r)))
    }

    fn write(&mut self, m: &mut Vec<RtlInstruction>, r: usize, src: Expression) {
        if r == 0 {
            m.push(RtlInstruction::Nop);
            return;
        }
        let reg = register(r);
        match src.as_constant() {
            Some(c) => self.state.set_register(reg, *c),
            None => self.state.invalidate(reg),
        }
        let dst = Expression::id(&self.frame.ensure_register(reg));
        m.push(RtlInstruction::assign(dst, src));
    }

    /// Record the folded value of `s op c` for `d` when `s` is known.
    fn track(&mut self, d: usize, known: Option<Constant>) {
        if d != 0 {
            if let Some(v) = known {
                self.state.set_register(register(d), v);
            }
        }
    }

    fn known(&self, s: usize, op: Operator, c: Constant) -> Option<Constant> {
        let v = if s == 0 {
            Constant::word32(0)
        } else {
            self.state.get_register(register(s))?
        };
        Some(op.apply_constants(&v, &c))
    }

    fn ea(&mut self, base: usize, offset: i16) -> Expression {
        if base == 0 {
            return Expression::word32(offset as i32 as u32);
        }
        let b = self.read(base);
        Expression::binary(
            Operator::IAdd,
            W32,
            b,
            Expression::constant(Constant::int32(offset as i32)),
        )
    }

    fn rewrite(&mut self, instr: &MipsInstruction) -> Vec<RtlInstruction> {
        self.try_rewrite(instr)
            .unwrap_or_else(|| vec![RtlInstruction::Invalid])
    }

    fn try_rewrite(&mut self, instr: &MipsInstruction) -> Option<Vec<RtlInstruction>> {
        let mut m = Vec::new();
        let delayed = RtlClass::TRANSFER | RtlClass::DELAY;
        match instr.opcode {
            Opcode::Nop => m.push(RtlInstruction::Nop),
            Opcode::Sll | Opcode::Srl | Opcode::Sra => {
                let (d, s, sa) = (reg_at(instr, 0)?, reg_at(instr, 1)?, uimm_at(instr, 2)?);
                let op = match instr.opcode {
                    Opcode::Sll => Operator::Shl,
                    Opcode::Srl => Operator::Shr,
                    _ => Operator::Sar,
                };
                let src = Expression::binary(op, W32, self.read(s), Expression::word32(sa));
                self.write(&mut m, d, src);
            }
            Opcode::Sllv | Opcode::Srlv | Opcode::Srav => {
                let (d, s, sh) = (reg_at(instr, 0)?, reg_at(instr, 1)?, reg_at(instr, 2)?);
                let op = match instr.opcode {
                    Opcode::Sllv => Operator::Shl,
                    Opcode::Srlv => Operator::Shr,
                    _ => Operator::Sar,
                };
                let src = Expression::binary(op, W32, self.read(s), self.read(sh));
                self.write(&mut m, d, src);
            }
            Opcode::Add
            | Opcode::Addu
            | Opcode::Sub
            | Opcode::Subu
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor => {
                let (d, s, t) = (reg_at(instr, 0)?, reg_at(instr, 1)?, reg_at(instr, 2)?);
                let op = match instr.opcode {
                    Opcode::Add | Opcode::Addu => Operator::IAdd,
                    Opcode::Sub | Opcode::Subu => Operator::ISub,
                    Opcode::And => Operator::And,
                    Opcode::Or => Operator::Or,
                    _ => Operator::Xor,
                };
                let moves = matches!(op, Operator::IAdd | Operator::Or);
                let src = if moves && t == 0 {
                    self.read(s)
                } else if moves && s == 0 {
                    self.read(t)
                } else {
                    Expression::binary(op, W32, self.read(s), self.read(t))
                };
                self.write(&mut m, d, src);
            }
            Opcode::Nor => {
                let (d, s, t) = (reg_at(instr, 0)?, reg_at(instr, 1)?, reg_at(instr, 2)?);
                let or = Expression::binary(Operator::Or, W32, self.read(s), self.read(t));
                self.write(&mut m, d, Expression::unary(UnaryOperator::Not, W32, or));
            }
            Opcode::Slt | Opcode::Sltu => {
                let (d, s, t) = (reg_at(instr, 0)?, reg_at(instr, 1)?, reg_at(instr, 2)?);
                let op = if instr.opcode == Opcode::Slt {
                    Operator::Lt
                } else {
                    Operator::Ult
                };
                let cmp = Expression::binary(op, DataType::Bool, self.read(s), self.read(t));
                self.write(&mut m, d, Expression::cast(W32, false, cmp));
            }
            Opcode::Addi | Opcode::Addiu => {
                let (d, s, imm) = (reg_at(instr, 0)?, reg_at(instr, 1)?, simm_at(instr, 2)?);
                let c = Constant::word32(imm as u32);
                let known = self.known(s, Operator::IAdd, c);
                let src = if s == 0 {
                    Expression::constant(c)
                } else {
                    Expression::binary(Operator::IAdd, W32, self.read(s), Expression::constant(Constant::int32(imm)))
                };
                self.write(&mut m, d, src);
                self.track(d, known);
            }
            Opcode::Slti | Opcode::Sltiu => {
                let (d, s, imm) = (reg_at(instr, 0)?, reg_at(instr, 1)?, simm_at(instr, 2)?);
                let (op, c) = if instr.opcode == Opcode::Slti {
                    (Operator::Lt, Constant::int32(imm))
                } else {
                    (Operator::Ult, Constant::word32(imm as u32))
                };
                let cmp = Expression::binary(op, DataType::Bool, self.read(s), Expression::constant(c));
                self.write(&mut m, d, Expression::cast(W32, false, cmp));
            }
            Opcode::Andi | Opcode::Ori | Opcode::Xori => {
                let (d, s, imm) = (reg_at(instr, 0)?, reg_at(instr, 1)?, uimm_at(instr, 2)?);
                let op = match instr.opcode {
                    Opcode::Andi => Operator::And,
                    Opcode::Ori => Operator::Or,
                    _ => Operator::Xor,
                };
                let c = Constant::word32(imm);
                let known = self.known(s, op, c);
                let src = if s == 0 && op != Operator::And {
                    Expression::constant(c)
                } else {
                    Expression::binary(op, W32, self.read(s), Expression::constant(c))
                };
                self.write(&mut m, d, src);
                self.track(d, known);
            }
            Opcode::Lui => {
                let (d, imm) = (reg_at(instr, 0)?, uimm_at(instr, 1)?);
                self.write(&mut m, d, Expression::word32(imm << 16));
            }
            Opcode::Lb | Opcode::Lbu | Opcode::Lh | Opcode::Lhu | Opcode::Lw => {
                let (d, (base, off)) = (reg_at(instr, 0)?, mem_at(instr, 1)?);
                let ea = self.ea(base, off);
                let src = match instr.opcode {
                    Opcode::Lw => Expression::mem(ea, W32),
                    Opcode::Lb => Expression::cast(DataType::Int32, true, Expression::mem(ea, DataType::Byte)),
                    Opcode::Lbu => Expression::cast(W32, false, Expression::mem(ea, DataType::Byte)),
                    Opcode::Lh => Expression::cast(DataType::Int32, true, Expression::mem(ea, DataType::Word16)),
                    _ => Expression::cast(W32, false, Expression::mem(ea, DataType::Word16)),
                };
                self.write(&mut m, d, src);
            }
            Opcode::Sb | Opcode::Sh | Opcode::Sw => {
                let (s, (base, off)) = (reg_at(instr, 0)?, mem_at(instr, 1)?);
                let ea = self.ea(base, off);
                let value = self.read(s);
                let (dt, src) = match instr.opcode {
                    Opcode::Sw => (W32, value),
                    Opcode::Sh => (DataType::Word16, Expression::cast(DataType::Word16, false, value)),
                    _ => (DataType::Byte, Expression::cast(DataType::Byte, false, value)),
                };
                m.push(RtlInstruction::assign(Expression::mem(ea, dt), src));
            }
            Opcode::Mult | Opcode::Multu | Opcode::Div | Opcode::Divu => {
                let (s, t) = (reg_at(instr, 0)?, reg_at(instr, 1)?);
                let (a, b) = (self.read(s), self.read(t));
                let (lo, hi) = match instr.opcode {
                    Opcode::Mult => (
                        Expression::binary(Operator::IMul, W32, a.clone(), b.clone()),
                        Expression::Application {
                            function: "__smul_hi".into(),
                            args: vec![a, b],
                            data_type: W32,
                        },
                    ),
                    Opcode::Multu => (
                        Expression::binary(Operator::UMul, W32, a.clone(), b.clone()),
                        Expression::Application {
                            function: "__umul_hi".into(),
                            args: vec![a, b],
                            data_type: W32,
                        },
                    ),
                    Opcode::Div => (
                        Expression::binary(Operator::SDiv, W32, a.clone(), b.clone()),
                        Expression::binary(Operator::SMod, W32, a, b),
                    ),
                    _ => (
                        Expression::binary(Operator::UDiv, W32, a.clone(), b.clone()),
                        Expression::binary(Operator::UMod, W32, a, b),
                    ),
                };
                self.write(&mut m, LO, lo);
                self.write(&mut m, HI, hi);
            }
            Opcode::Mfhi | Opcode::Mflo => {
                let d = reg_at(instr, 0)?;
                let src = if instr.opcode == Opcode::Mfhi { HI } else { LO };
                let v = self.read(src);
                self.write(&mut m, d, v);
            }
            Opcode::Mthi | Opcode::Mtlo => {
                let s = reg_at(instr, 0)?;
                let dst = if instr.opcode == Opcode::Mthi { HI } else { LO };
                let v = self.read(s);
                self.write(&mut m, dst, v);
            }
            Opcode::Beq | Opcode::Bne => {
                let (s, t, target) = (reg_at(instr, 0)?, reg_at(instr, 1)?, addr_at(instr, 2)?);
                if instr.opcode == Opcode::Beq && s == t {
                    m.push(RtlInstruction::goto(Expression::Address(target), delayed));
                } else {
                    let op = if instr.opcode == Opcode::Beq {
                        Operator::Eq
                    } else {
                        Operator::Ne
                    };
                    m.push(RtlInstruction::Branch {
                        condition: Expression::binary(op, DataType::Bool, self.read(s), self.read(t)),
                        target: Expression::Address(target),
                        class: delayed | RtlClass::CONDITIONAL,
                    });
                }
            }
            Opcode::Blez | Opcode::Bgtz | Opcode::Bltz | Opcode::Bgez | Opcode::Bltzal | Opcode::Bgezal => {
                let (s, target) = (reg_at(instr, 0)?, addr_at(instr, 1)?);
                let op = match instr.opcode {
                    Opcode::Blez => Operator::Le,
                    Opcode::Bgtz => Operator::Gt,
                    Opcode::Bltz | Opcode::Bltzal => Operator::Lt,
                    _ => Operator::Ge,
                };
                let condition = Expression::binary(
                    op,
                    DataType::Bool,
                    self.read(s),
                    Expression::constant(Constant::int32(0)),
                );
                let mut class = delayed | RtlClass::CONDITIONAL;
                if matches!(instr.opcode, Opcode::Bltzal | Opcode::Bgezal) {
                    // ra is written whether or not the branch is taken.
                    class |= RtlClass::CALL;
                    let link = Expression::Address(instr.address.add_offset(8));
                    self.write(&mut m, RA, link);
                }
                m.push(RtlInstruction::Branch {
                    condition,
                    target: Expression::Address(target),
                    class,
                });
            }
            Opcode::J => {
                let target = addr_at(instr, 0)?;
                m.push(RtlInstruction::goto(Expression::Address(target), delayed));
            }
            Opcode::Jal => {
                let target = addr_at(instr, 0)?;
                // Execution resumes after the delay slot.
                let continuation = instr.address.add_offset(8);
                let callee = match self.host.get_imported_procedure(target, continuation) {
                    Some(p) => Expression::ExternalProcedure(p.name),
                    None => Expression::Address(target),
                };
                self.state.invalidate(register(RA));
                m.push(RtlInstruction::Call {
                    target: callee,
                    return_address_size: 0,
                    class: delayed | RtlClass::CALL,
                });
            }
            Opcode::Jr => {
                let s = reg_at(instr, 0)?;
                if s == RA {
                    m.push(RtlInstruction::Return {
                        return_address_size: 0,
                        class: delayed,
                    });
                } else {
                    let t = self.read(s);
                    m.push(RtlInstruction::goto(t, delayed));
                }
            }
            Opcode::Jalr => {
                let (d, s) = (reg_at(instr, 0)?, reg_at(instr, 1)?);
                let t = self.read(s);
                if d != RA && d != 0 {
                    let link = Expression::Address(instr.address.add_offset(8));
                    self.write(&mut m, d, link);
                }
                self.state.invalidate(register(RA));
                m.push(RtlInstruction::Call {
                    target: t,
                    return_address_size: 0,
                    class: delayed | RtlClass::CALL,
                });
            }
            Opcode::Syscall | Opcode::Break => {
                let function = if instr.opcode == Opcode::Syscall {
                    "__syscall"
                } else {
                    "__break"
                };
                m.push(RtlInstruction::SideEffect(Expression::Application {
                    function: function.into(),
                    args: vec![],
                    data_type: DataType::Word32,
                }));
            }
        }
        Some(m)
    }
}

impl Iterator for MipsRewriter<'_> {
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
                debug!(error = %e, "MIPS rewrite stopped");
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::mips::{MipsArchitecture, GP};
    use crate::arch::ProcessorArchitecture;
    use crate::core::disassembler::DisassemblerError;
    use crate::core::expression::Identifier;
    use crate::core::image::{Endianness, LoadedImage};
    use crate::core::procedure::ExternalProcedure;

    struct Host;

    impl RewriterHost for Host {
        fn get_imported_procedure(&self, target: Address, _continuation: Address) -> Option<ExternalProcedure> {
            (target == Address::ptr32(0x0040_0100)).then(|| ExternalProcedure::new("printf", None))
        }

        fn get_intercepted_call(&self, _target: Address) -> Option<ExternalProcedure> {
            None
        }
    }

    fn image(words: &[u32]) -> LoadedImage {
        let bytes = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        LoadedImage::new(Address::ptr32(0x0040_0000), bytes)
    }

    fn rewrite(words: &[u32]) -> Vec<DisassemblerResult<RtlInstructionCluster>> {
        let img = image(words);
        let arch = MipsArchitecture::new(Endianness::Little);
        let rdr = arch.create_image_reader(&img, img.base()).unwrap();
        MipsRewriter::new(rdr, arch.create_processor_state(), arch.create_frame(), &Host).collect()
    }

    fn rtl(words: &[u32]) -> Vec<String> {
        rewrite(words)
            .into_iter()
            .flat_map(|c| c.unwrap().instructions)
            .map(|i| i.to_string())
            .collect()
    }

    #[test]
    fn rw_trampoline_sequence() {
        assert_eq!(
            rtl(&[0x3C02_0040, 0x8C43_1234, 0x0060_0008]),
            vec![
                "r2 = 0x00400000",
                "r3 = Mem[r2 + 0x00001234:word32]",
                "goto r3 (delay)",
            ]
        );
    }

    #[test]
    fn rw_cluster_matches_instruction() {
        let clusters = rewrite(&[0x3C02_0040, 0x0000_0000]);
        let c1 = clusters[1].as_ref().unwrap();
        assert_eq!(c1.address, Address::ptr32(0x0040_0004));
        assert_eq!(c1.length, 4);
    }

    #[test]
    fn rw_write_to_r0_is_nop() {
        // addiu r0,r2,1
        assert_eq!(rtl(&[0x2440_0001]), vec!["nop"]);
    }

    #[test]
    fn rw_addiu_from_r0_is_constant() {
        // addiu r4,r0,-1
        assert_eq!(rtl(&[0x2404_FFFF]), vec!["r4 = 0xFFFFFFFF"]);
    }

    #[test]
    fn rw_move_idiom() {
        // addu r4,r5,r0
        assert_eq!(rtl(&[0x00A0_2021]), vec!["r4 = r5"]);
    }

    #[test]
    fn rw_jr_ra_returns() {
        assert_eq!(rtl(&[0x03E0_0008]), vec!["return (delay)"]);
    }

    #[test]
    fn rw_jal_resolves_import() {
        assert_eq!(rtl(&[0x0C10_0040]), vec!["call printf (delay)"]);
        // jal 0x00400200 is not an import
        assert_eq!(rtl(&[0x0C10_0080]), vec!["call 00400200 (delay)"]);
    }

    #[test]
    fn rw_jalr_links_rd() {
        // jalr r5,r4
        assert_eq!(rtl(&[0x0080_2809]), vec!["r5 = 00400008", "call r4 (delay)"]);
        // jalr r4 links through ra implicitly
        assert_eq!(rtl(&[0x0080_F809]), vec!["call r4 (delay)"]);
    }

    #[test]
    fn rw_jalr_reads_target_before_link() {
        // jalr r4,r4
        let clusters = rewrite(&[0x0080_2009]);
        let c = clusters[0].as_ref().unwrap();
        assert_eq!(c.instructions[0].to_string(), "r4 = 00400008");
        assert_eq!(
            c.instructions[1],
            RtlInstruction::Call {
                target: Expression::id(&Identifier::register(register(4), W32)),
                return_address_size: 0,
                class: RtlClass::TRANSFER | RtlClass::DELAY | RtlClass::CALL,
            }
        );
    }

    #[test]
    fn rw_bltzal_links_ra() {
        // bltzal r4,+2
        let clusters = rewrite(&[0x0490_0002]);
        let c = clusters[0].as_ref().unwrap();
        assert!(c.class.contains(RtlClass::CALL | RtlClass::CONDITIONAL | RtlClass::DELAY));
        let text: Vec<_> = c.instructions.iter().map(|i| i.to_string()).collect();
        assert_eq!(
            text,
            vec!["ra = 00400008", "if (r4 < 0x00000000) branch 0040000C (delay)"]
        );
        // bltz does not link
        assert_eq!(
            rtl(&[0x0480_0002]),
            vec!["if (r4 < 0x00000000) branch 0040000C (delay)"]
        );
    }

    #[test]
    fn rw_bne_is_conditional_delayed() {
        let clusters = rewrite(&[0x1485_0002]);
        let c = clusters[0].as_ref().unwrap();
        assert!(c.class.contains(RtlClass::CONDITIONAL | RtlClass::DELAY));
        assert_eq!(c.instructions[0].to_string(), "if (r4 != r5) branch 0040000C (delay)");
    }

    #[test]
    fn rw_store_byte() {
        // sb r5,-0x4(sp)
        assert_eq!(rtl(&[0xA3A5_FFFC]), vec!["Mem[sp + 0xFFFFFFFC:byte] = (byte) r5"]);
    }

    #[test]
    fn rw_state_tracks_lui_ori() {
        let img = image(&[0x3C1C_0041, 0x379C_8000]);
        let arch = MipsArchitecture::new(Endianness::Little);
        let rdr = arch.create_image_reader(&img, img.base()).unwrap();
        let mut rw = MipsRewriter::new(rdr, arch.create_processor_state(), arch.create_frame(), &Host);
        assert!(rw.by_ref().all(|c| c.is_ok()));
        let (state, frame) = rw.into_state();
        assert_eq!(state.get_register(register(GP)), Some(Constant::word32(0x0041_8000)));
        assert_eq!(frame.identifiers().len(), 1);
    }

    #[test]
    fn rw_stops_after_malformed() {
        let results = rewrite(&[0x3C02_0040, 0xFC00_0000, 0x0000_0000]);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(
            results[1],
            Err(DisassemblerError::malformed(Address::ptr32(0x0040_0004)))
        );
    }

    #[test]
    fn rw_truncated_tail_is_malformed() {
        // lui r2,0x40 followed by two stray bytes
        let img = LoadedImage::new(Address::ptr32(0x0040_0000), vec![0x40, 0x00, 0x02, 0x3C, 0x00, 0x00]);
        let arch = MipsArchitecture::new(Endianness::Little);
        let rdr = arch.create_image_reader(&img, img.base()).unwrap();
        let results: Vec<_> =
            MipsRewriter::new(rdr, arch.create_processor_state(), arch.create_frame(), &Host).collect();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[1],
            Err(DisassemblerError::malformed(Address::ptr32(0x0040_0004)))
        );
    }

    #[test]
    fn rw_is_repeatable() {
        let words = [0x3C02_0040, 0x8C43_1234, 0x0060_0008, 0x27BD_FFF0];
        assert_eq!(rewrite(&words), rewrite(&words));
    }
}
