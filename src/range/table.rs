//! Opcode to range-operator dispatch.

use crate::hir::{BinOp, IntType, UnOp};
use crate::range::ops::{
    OperatorCast, OperatorEqual, OperatorGe, OperatorGt, OperatorIdentity, OperatorLe, OperatorLt,
    OperatorNotEqual, RangeOperator,
};
use crate::range::ops_arith::{
    OperatorAbs, OperatorAbsu, OperatorDiv, OperatorMax, OperatorMin, OperatorMinus, OperatorMult,
    OperatorNegate, OperatorPlus, OperatorTruncMod,
};
use crate::range::ops_bitwise::{
    OperatorBitwiseAnd, OperatorBitwiseNot, OperatorBitwiseOr, OperatorBitwiseXor,
    OperatorLogicalAnd, OperatorLogicalNot, OperatorLogicalOr, OperatorLshift, OperatorRshift,
};
use crate::range::wide::DivRounding;
use crate::range::Range;

static PLUS: OperatorPlus = OperatorPlus;
static MINUS: OperatorMinus = OperatorMinus;
static MULT: OperatorMult = OperatorMult;
static DIV_TRUNC: OperatorDiv = OperatorDiv { rounding: DivRounding::Trunc };
static DIV_FLOOR: OperatorDiv = OperatorDiv { rounding: DivRounding::Floor };
static DIV_CEIL: OperatorDiv = OperatorDiv { rounding: DivRounding::Ceil };
static DIV_ROUND: OperatorDiv = OperatorDiv { rounding: DivRounding::Round };
static DIV_EXACT: OperatorDiv = OperatorDiv { rounding: DivRounding::Exact };
static TRUNC_MOD: OperatorTruncMod = OperatorTruncMod;
static MIN: OperatorMin = OperatorMin;
static MAX: OperatorMax = OperatorMax;
static BIT_AND: OperatorBitwiseAnd = OperatorBitwiseAnd;
static BIT_OR: OperatorBitwiseOr = OperatorBitwiseOr;
static BIT_XOR: OperatorBitwiseXor = OperatorBitwiseXor;
static BIT_NOT: OperatorBitwiseNot = OperatorBitwiseNot;
static SHL: OperatorLshift = OperatorLshift;
static SHR: OperatorRshift = OperatorRshift;
static EQ: OperatorEqual = OperatorEqual;
static NE: OperatorNotEqual = OperatorNotEqual;
static LT: OperatorLt = OperatorLt;
static LE: OperatorLe = OperatorLe;
static GT: OperatorGt = OperatorGt;
static GE: OperatorGe = OperatorGe;
static LOGICAL_AND: OperatorLogicalAnd = OperatorLogicalAnd;
static LOGICAL_OR: OperatorLogicalOr = OperatorLogicalOr;
static LOGICAL_NOT: OperatorLogicalNot = OperatorLogicalNot;
static NEGATE: OperatorNegate = OperatorNegate;
static ABS: OperatorAbs = OperatorAbs;
static ABSU: OperatorAbsu = OperatorAbsu;
static CAST: OperatorCast = OperatorCast;
static IDENTITY: OperatorIdentity = OperatorIdentity;

/// Handler for a binary opcode, if range folding understands it.
pub fn binary_handler(op: BinOp) -> Option<&'static dyn RangeOperator> {
    Some(match op {
        BinOp::Add => &PLUS,
        BinOp::Sub => &MINUS,
        BinOp::Mul => &MULT,
        BinOp::DivTrunc => &DIV_TRUNC,
        BinOp::DivFloor => &DIV_FLOOR,
        BinOp::DivCeil => &DIV_CEIL,
        BinOp::DivRound => &DIV_ROUND,
        BinOp::DivExact => &DIV_EXACT,
        BinOp::Mod => &TRUNC_MOD,
        BinOp::Min => &MIN,
        BinOp::Max => &MAX,
        BinOp::BitAnd => &BIT_AND,
        BinOp::BitOr => &BIT_OR,
        BinOp::BitXor => &BIT_XOR,
        BinOp::Shl => &SHL,
        BinOp::Shr => &SHR,
        BinOp::Eq => &EQ,
        BinOp::Ne => &NE,
        BinOp::Lt => &LT,
        BinOp::Le => &LE,
        BinOp::Gt => &GT,
        BinOp::Ge => &GE,
        BinOp::LogicalAnd => &LOGICAL_AND,
        BinOp::LogicalOr => &LOGICAL_OR,
    })
}

pub fn unary_handler(op: UnOp) -> Option<&'static dyn RangeOperator> {
    Some(match op {
        UnOp::Neg => &NEGATE,
        UnOp::BitNot => &BIT_NOT,
        UnOp::LogicalNot => &LOGICAL_NOT,
        UnOp::Abs => &ABS,
        UnOp::Absu => &ABSU,
        UnOp::Cast => &CAST,
        UnOp::Ident => &IDENTITY,
    })
}

/// Convert a range to another integer type; unary folds take a varying
/// placeholder of the result type as their second operand.
pub fn range_cast(r: &Range, to: IntType) -> Range {
    CAST.fold_range(to, r, &Range::varying(to))
}
