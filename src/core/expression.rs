//! Architecture-neutral expression trees.
//!
//! Expressions are plain values. Two expressions are equal when their trees
//! have the same shape and the same leaves, which is what the pattern matcher
//! relies on when a capture name is reused.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::address::Address;
use crate::core::register::RegisterStorage;

/// Primitive data types carried by expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Byte,
    Word16,
    Word32,
    Word64,
    Int32,
    Ptr16,
    Ptr32,
}

impl DataType {
    pub fn bits(&self) -> u32 {
        match self {
            DataType::Bool => 1,
            DataType::Byte => 8,
            DataType::Word16 | DataType::Ptr16 => 16,
            DataType::Word32 | DataType::Int32 | DataType::Ptr32 => 32,
            DataType::Word64 => 64,
        }
    }

    /// Unsigned word type of the given width.
    pub fn word(bits: u32) -> Self {
        match bits {
            1 => DataType::Bool,
            8 => DataType::Byte,
            16 => DataType::Word16,
            32 => DataType::Word32,
            _ => DataType::Word64,
        }
    }

    pub fn mask(&self) -> u64 {
        match self.bits() {
            64 => u64::MAX,
            n => (1u64 << n) - 1,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Bool => "bool",
            DataType::Byte => "byte",
            DataType::Word16 => "word16",
            DataType::Word32 => "word32",
            DataType::Word64 => "word64",
            DataType::Int32 => "int32",
            DataType::Ptr16 => "ptr16",
            DataType::Ptr32 => "ptr32",
        };
        write!(f, "{}", s)
    }
}

/// A literal value. The value is always truncated to the type's width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constant {
    pub value: u64,
    pub data_type: DataType,
}

impl Constant {
    pub fn new(value: u64, data_type: DataType) -> Self {
        Self {
            value: value & data_type.mask(),
            data_type,
        }
    }

    pub fn byte(value: u8) -> Self {
        Self::new(value as u64, DataType::Byte)
    }

    pub fn word16(value: u16) -> Self {
        Self::new(value as u64, DataType::Word16)
    }

    pub fn word32(value: u32) -> Self {
        Self::new(value as u64, DataType::Word32)
    }

    /// Signed 32-bit constant; stored two's-complement in 32 bits.
    pub fn int32(value: i32) -> Self {
        Self::new(value as u32 as u64, DataType::Int32)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(value as u64, DataType::Bool)
    }

    /// Value sign-extended from the type's width.
    pub fn signed(&self) -> i64 {
        let bits = self.data_type.bits();
        if bits >= 64 {
            return self.value as i64;
        }
        let shift = 64 - bits;
        ((self.value << shift) as i64) >> shift
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = (self.data_type.bits() as usize).div_ceil(4);
        write!(f, "0x{:0width$X}", self.value, width = digits)
    }
}

/// Where an identifier lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Storage {
    Register(RegisterStorage),
    /// A subset of the bits of a flags register.
    FlagGroup { register: RegisterStorage, mask: u32 },
    Temporary(usize),
}

/// A named storage reference: register, flag group or temporary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
    pub data_type: DataType,
    pub storage: Storage,
}

impl Identifier {
    pub fn register(reg: &RegisterStorage, data_type: DataType) -> Self {
        Self {
            name: reg.name.clone(),
            data_type,
            storage: Storage::Register(reg.clone()),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    IAdd,
    ISub,
    IMul,
    UMul,
    SDiv,
    UDiv,
    SMod,
    UMod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Sar,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Ult,
    Uge,
}

impl Operator {
    /// Fold two constants at the width of `a`, wrapping on overflow.
    /// Comparisons yield a `Bool`. Division by zero folds to zero.
    pub fn apply_constants(&self, a: &Constant, b: &Constant) -> Constant {
        let dt = a.data_type;
        let bits = dt.bits();
        let (x, y) = (a.value, b.value & dt.mask());
        let (sx, sy) = (a.signed(), Constant::new(y, dt).signed());
        let shift = (b.value as u32).min(63);
        let value = match self {
            Operator::IAdd => x.wrapping_add(y),
            Operator::ISub => x.wrapping_sub(y),
            Operator::IMul | Operator::UMul => x.wrapping_mul(y),
            Operator::SDiv => {
                if sy == 0 {
                    0
                } else {
                    sx.wrapping_div(sy) as u64
                }
            }
            Operator::UDiv => x.checked_div(y).unwrap_or(0),
            Operator::SMod => {
                if sy == 0 {
                    0
                } else {
                    sx.wrapping_rem(sy) as u64
                }
            }
            Operator::UMod => x.checked_rem(y).unwrap_or(0),
            Operator::And => x & y,
            Operator::Or => x | y,
            Operator::Xor => x ^ y,
            Operator::Shl => {
                if shift >= bits {
                    0
                } else {
                    x << shift
                }
            }
            Operator::Shr => {
                if shift >= bits {
                    0
                } else {
                    x >> shift
                }
            }
            Operator::Sar => (sx >> shift.min(bits - 1)) as u64,
            Operator::Eq => return Constant::bool(x == y),
            Operator::Ne => return Constant::bool(x != y),
            Operator::Lt => return Constant::bool(sx < sy),
            Operator::Le => return Constant::bool(sx <= sy),
            Operator::Gt => return Constant::bool(sx > sy),
            Operator::Ge => return Constant::bool(sx >= sy),
            Operator::Ult => return Constant::bool(x < y),
            Operator::Uge => return Constant::bool(x >= y),
        };
        Constant::new(value, dt)
    }

    fn symbol(&self) -> &'static str {
        match self {
            Operator::IAdd => "+",
            Operator::ISub => "-",
            Operator::IMul => "*",
            Operator::UMul => "*u",
            Operator::SDiv => "/",
            Operator::UDiv => "/u",
            Operator::SMod => "%",
            Operator::UMod => "%u",
            Operator::And => "&",
            Operator::Or => "|",
            Operator::Xor => "^",
            Operator::Shl => "<<",
            Operator::Shr => ">>u",
            Operator::Sar => ">>",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Ult => "<u",
            Operator::Uge => ">=u",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Neg,
}

/// Condition codes tested against a flag group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionCode {
    Eq,
    Ne,
    /// Sign set
    Sg,
    /// Sign clear
    Ns,
    /// Overflow set
    Ov,
    /// Overflow clear
    No,
    /// Carry set
    Ult,
    /// Carry clear
    Uge,
}

impl fmt::Display for ConditionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionCode::Eq => "EQ",
            ConditionCode::Ne => "NE",
            ConditionCode::Sg => "SG",
            ConditionCode::Ns => "NS",
            ConditionCode::Ov => "OV",
            ConditionCode::No => "NO",
            ConditionCode::Ult => "ULT",
            ConditionCode::Uge => "UGE",
        };
        write!(f, "{}", s)
    }
}

/// An expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expression {
    Identifier(Identifier),
    Constant(Constant),
    Address(Address),
    Binary {
        op: Operator,
        data_type: DataType,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOperator,
        data_type: DataType,
        operand: Box<Expression>,
    },
    /// Width conversion; `signed` selects sign- over zero-extension.
    Cast {
        data_type: DataType,
        signed: bool,
        operand: Box<Expression>,
    },
    /// Memory load or store location.
    MemoryAccess {
        ea: Box<Expression>,
        data_type: DataType,
    },
    /// Flags produced by evaluating the operand.
    ConditionOf(Box<Expression>),
    /// Test a condition code against a flag group.
    Test {
        cc: ConditionCode,
        flags: Box<Expression>,
    },
    /// Call of an intrinsic that has no RTL equivalent (`__syscall`, ...).
    Application {
        function: String,
        args: Vec<Expression>,
        data_type: DataType,
    },
    /// A procedure resolved outside the image, named by the host.
    ExternalProcedure(String),
}

impl Expression {
    pub fn id(id: &Identifier) -> Self {
        Expression::Identifier(id.clone())
    }

    pub fn constant(c: Constant) -> Self {
        Expression::Constant(c)
    }

    pub fn word32(value: u32) -> Self {
        Expression::Constant(Constant::word32(value))
    }

    pub fn binary(op: Operator, data_type: DataType, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            data_type,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOperator, data_type: DataType, operand: Expression) -> Self {
        Expression::Unary {
            op,
            data_type,
            operand: Box::new(operand),
        }
    }

    pub fn cast(data_type: DataType, signed: bool, operand: Expression) -> Self {
        Expression::Cast {
            data_type,
            signed,
            operand: Box::new(operand),
        }
    }

    pub fn mem(ea: Expression, data_type: DataType) -> Self {
        Expression::MemoryAccess {
            ea: Box::new(ea),
            data_type,
        }
    }

    pub fn cond(e: Expression) -> Self {
        Expression::ConditionOf(Box::new(e))
    }

    pub fn test(cc: ConditionCode, flags: Expression) -> Self {
        Expression::Test {
            cc,
            flags: Box::new(flags),
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Expression::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self {
            Expression::Identifier(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(id) => write!(f, "{}", id),
            Expression::Constant(c) => write!(f, "{}", c),
            Expression::Address(a) => write!(f, "{}", a),
            Expression::Binary { op, left, right, .. } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
            Expression::Unary { op, operand, .. } => match op {
                UnaryOperator::Not => write!(f, "~{}", operand),
                UnaryOperator::Neg => write!(f, "-{}", operand),
            },
            Expression::Cast {
                data_type, operand, ..
            } => write!(f, "({}) {}", data_type, operand),
            Expression::MemoryAccess { ea, data_type } => write!(f, "Mem[{}:{}]", ea, data_type),
            Expression::ConditionOf(e) => write!(f, "cond({})", e),
            Expression::Test { cc, flags } => write!(f, "Test({},{})", cc, flags),
            Expression::Application { function, args, .. } => {
                write!(f, "{}(", function)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            Expression::ExternalProcedure(name) => write!(f, "{}", name),
        }
    }
}
