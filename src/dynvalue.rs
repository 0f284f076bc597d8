use crate::ssa::{BinOp, GlobalId, Literal, UnOp};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// A tracked heap object: a nominal handle with a debug label. Identity
/// is handle equality. Used to model runtime globals such as the
/// per-thread current-G pointer so the analyzer can follow stack
/// switches across calls.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(pub u32);

#[derive(Debug, Default)]
pub struct HeapArena {
    labels: Vec<String>,
}

impl HeapArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, label: &str) -> HeapId {
        let id = HeapId(self.labels.len() as u32);
        self.labels.push(label.to_string());

        id
    }

    pub fn label(&self, id: HeapId) -> &str {
        &self.labels[id.0 as usize]
    }
}

/// The abstract value of an SSA register or tracked heap cell.
///
/// `Unknown` is bottom: the analyzer failed to track the value. Address
/// variants support only equality, inequality, and dereference; constant
/// variants fold fully.
#[derive(Debug, Clone, PartialEq)]
pub enum DynValue {
    Unknown,
    Const(Literal),
    /// Address of a named global.
    Global(GlobalId),
    /// Address of one field of a named global.
    FieldOfGlobal(GlobalId, String),
    /// Pointer to a tracked heap object.
    HeapPtr(HeapId),
    /// The fields of a tracked heap cell, modeled independently.
    HeapStruct(BTreeMap<String, HeapId>),
}

impl DynValue {
    pub fn is_unknown(&self) -> bool {
        matches!(self, DynValue::Unknown)
    }

    fn is_address(&self) -> bool {
        matches!(
            self,
            DynValue::Global(_) | DynValue::FieldOfGlobal(..) | DynValue::HeapPtr(_)
        )
    }

    /// Applies a binary operator. Returns `Unknown` on any type mismatch
    /// or unsupported operation.
    pub fn binop(op: BinOp, lhs: &DynValue, rhs: &DynValue) -> DynValue {
        if lhs.is_unknown() || rhs.is_unknown() {
            return DynValue::Unknown;
        }

        if let (DynValue::Const(a), DynValue::Const(b)) = (lhs, rhs) {
            return fold_const(op, a, b);
        }

        // globals, fields of globals, and tracked heap pointers cannot
        // alias each other: each is introduced by a distinct abstraction
        // layer, so a cross-variant pair compares unequal
        if lhs.is_address() && rhs.is_address() {
            let equal = match (lhs, rhs) {
                (DynValue::Global(a), DynValue::Global(b)) => a == b,
                (DynValue::FieldOfGlobal(a, fa), DynValue::FieldOfGlobal(b, fb)) => {
                    a == b && fa == fb
                }
                (DynValue::HeapPtr(a), DynValue::HeapPtr(b)) => a == b,
                _ => false,
            };
            return match op {
                BinOp::Eq => DynValue::Const(Literal::Bool(equal)),
                BinOp::Ne => DynValue::Const(Literal::Bool(!equal)),
                _ => DynValue::Unknown,
            };
        }

        DynValue::Unknown
    }

    /// Applies a unary operator. Dereference is handled by the value
    /// state, which owns the heap map.
    pub fn unop(op: UnOp, operand: &DynValue) -> DynValue {
        match (op, operand) {
            (UnOp::Neg, DynValue::Const(Literal::Int(value))) => value
                .checked_neg()
                .map(|negated| DynValue::Const(Literal::Int(negated)))
                .unwrap_or(DynValue::Unknown),
            (UnOp::Neg, DynValue::Const(Literal::Float(value))) => {
                DynValue::Const(Literal::Float(-value))
            }
            (UnOp::Not, DynValue::Const(Literal::Bool(value))) => {
                DynValue::Const(Literal::Bool(!value))
            }
            _ => DynValue::Unknown,
        }
    }
}

fn fold_const(op: BinOp, lhs: &Literal, rhs: &Literal) -> DynValue {
    let folded = match (lhs, rhs) {
        (Literal::Int(a), Literal::Int(b)) => fold_int(op, *a, *b),
        (Literal::Bool(a), Literal::Bool(b)) => fold_bool(op, *a, *b),
        (Literal::Float(a), Literal::Float(b)) => fold_float(op, *a, *b),
        (Literal::Str(a), Literal::Str(b)) => fold_str(op, a, b),
        (Literal::Nil, Literal::Nil) => match op {
            BinOp::Eq => Some(Literal::Bool(true)),
            BinOp::Ne => Some(Literal::Bool(false)),
            _ => None,
        },
        _ => None,
    };

    folded.map(DynValue::Const).unwrap_or(DynValue::Unknown)
}

fn fold_int(op: BinOp, a: i128, b: i128) -> Option<Literal> {
    let arithmetic = |value: Option<i128>| value.map(Literal::Int);
    match op {
        BinOp::Add => arithmetic(a.checked_add(b)),
        BinOp::Sub => arithmetic(a.checked_sub(b)),
        BinOp::Mul => arithmetic(a.checked_mul(b)),
        BinOp::Div => arithmetic(a.checked_div(b)),
        BinOp::Rem => arithmetic(a.checked_rem(b)),
        BinOp::And => Some(Literal::Int(a & b)),
        BinOp::Or => Some(Literal::Int(a | b)),
        BinOp::Xor => Some(Literal::Int(a ^ b)),
        BinOp::Shl => arithmetic(u32::try_from(b).ok().and_then(|shift| a.checked_shl(shift))),
        BinOp::Shr => arithmetic(u32::try_from(b).ok().and_then(|shift| a.checked_shr(shift))),
        BinOp::Eq => Some(Literal::Bool(a == b)),
        BinOp::Ne => Some(Literal::Bool(a != b)),
        BinOp::Lt => Some(Literal::Bool(a < b)),
        BinOp::Le => Some(Literal::Bool(a <= b)),
        BinOp::Gt => Some(Literal::Bool(a > b)),
        BinOp::Ge => Some(Literal::Bool(a >= b)),
    }
}

fn fold_bool(op: BinOp, a: bool, b: bool) -> Option<Literal> {
    match op {
        BinOp::And => Some(Literal::Bool(a && b)),
        BinOp::Or => Some(Literal::Bool(a || b)),
        BinOp::Xor => Some(Literal::Bool(a ^ b)),
        BinOp::Eq => Some(Literal::Bool(a == b)),
        BinOp::Ne => Some(Literal::Bool(a != b)),
        _ => None,
    }
}

fn fold_float(op: BinOp, a: f64, b: f64) -> Option<Literal> {
    match op {
        BinOp::Add => Some(Literal::Float(a + b)),
        BinOp::Sub => Some(Literal::Float(a - b)),
        BinOp::Mul => Some(Literal::Float(a * b)),
        BinOp::Div => Some(Literal::Float(a / b)),
        BinOp::Eq => Some(Literal::Bool(a == b)),
        BinOp::Ne => Some(Literal::Bool(a != b)),
        BinOp::Lt => Some(Literal::Bool(a < b)),
        BinOp::Le => Some(Literal::Bool(a <= b)),
        BinOp::Gt => Some(Literal::Bool(a > b)),
        BinOp::Ge => Some(Literal::Bool(a >= b)),
        _ => None,
    }
}

fn fold_str(op: BinOp, a: &str, b: &str) -> Option<Literal> {
    match op {
        BinOp::Add => Some(Literal::Str(format!("{a}{b}"))),
        BinOp::Eq => Some(Literal::Bool(a == b)),
        BinOp::Ne => Some(Literal::Bool(a != b)),
        BinOp::Lt => Some(Literal::Bool(a < b)),
        BinOp::Le => Some(Literal::Bool(a <= b)),
        BinOp::Gt => Some(Literal::Bool(a > b)),
        BinOp::Ge => Some(Literal::Bool(a >= b)),
        _ => None,
    }
}

impl Display for DynValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DynValue::Unknown => write!(f, "unknown"),
            DynValue::Const(Literal::Bool(value)) => write!(f, "{value}"),
            DynValue::Const(Literal::Int(value)) => write!(f, "{value}"),
            DynValue::Const(Literal::Float(value)) => write!(f, "{value}"),
            DynValue::Const(Literal::Str(value)) => write!(f, "{value:?}"),
            DynValue::Const(Literal::Nil) => write!(f, "nil"),
            DynValue::Global(global) => write!(f, "&global#{}", global.0),
            DynValue::FieldOfGlobal(global, field) => {
                write!(f, "&global#{}.{field}", global.0)
            }
            DynValue::HeapPtr(heap) => write!(f, "&heap#{}", heap.0),
            DynValue::HeapStruct(fields) => {
                write!(f, "struct{{")?;
                for (index, (field, heap)) in fields.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}: heap#{}", heap.0)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: i128) -> DynValue {
        DynValue::Const(Literal::Int(value))
    }

    #[test]
    fn succeed_when_folding_integer_arithmetic() {
        // arrange / act / assert
        assert_eq!(DynValue::binop(BinOp::Add, &int(40), &int(2)), int(42));
        assert_eq!(DynValue::binop(BinOp::Mul, &int(-6), &int(7)), int(-42));
        assert_eq!(DynValue::binop(BinOp::Shl, &int(1), &int(5)), int(32));
        assert_eq!(
            DynValue::binop(BinOp::Lt, &int(3), &int(4)),
            DynValue::Const(Literal::Bool(true))
        );
    }

    #[test]
    fn succeed_when_degrading_to_unknown() {
        // arrange / act / assert
        assert_eq!(
            DynValue::binop(BinOp::Div, &int(1), &int(0)),
            DynValue::Unknown
        );
        assert_eq!(
            DynValue::binop(BinOp::Mul, &int(i128::MAX), &int(2)),
            DynValue::Unknown
        );
        assert_eq!(
            DynValue::binop(BinOp::Add, &int(1), &DynValue::Unknown),
            DynValue::Unknown
        );
        assert_eq!(
            DynValue::binop(BinOp::Add, &int(1), &DynValue::Const(Literal::Bool(true))),
            DynValue::Unknown
        );
    }

    #[test]
    fn succeed_when_comparing_addresses() {
        // arrange
        let global_a = DynValue::Global(GlobalId(0));
        let global_b = DynValue::Global(GlobalId(1));
        let field = DynValue::FieldOfGlobal(GlobalId(0), "mu".to_string());
        let heap = DynValue::HeapPtr(HeapId(0));

        // act / assert
        assert_eq!(
            DynValue::binop(BinOp::Eq, &global_a, &global_a),
            DynValue::Const(Literal::Bool(true))
        );
        assert_eq!(
            DynValue::binop(BinOp::Ne, &global_a, &global_b),
            DynValue::Const(Literal::Bool(true))
        );
        // distinct abstraction layers never alias
        assert_eq!(
            DynValue::binop(BinOp::Eq, &global_a, &field),
            DynValue::Const(Literal::Bool(false))
        );
        assert_eq!(
            DynValue::binop(BinOp::Eq, &heap, &global_a),
            DynValue::Const(Literal::Bool(false))
        );
        // addresses support no ordering
        assert_eq!(
            DynValue::binop(BinOp::Lt, &global_a, &global_b),
            DynValue::Unknown
        );
    }

    #[test]
    fn succeed_when_applying_unary_operators() {
        // arrange / act / assert
        assert_eq!(DynValue::unop(UnOp::Neg, &int(5)), int(-5));
        assert_eq!(
            DynValue::unop(UnOp::Not, &DynValue::Const(Literal::Bool(false))),
            DynValue::Const(Literal::Bool(true))
        );
        assert_eq!(
            DynValue::unop(UnOp::Deref, &DynValue::Global(GlobalId(0))),
            DynValue::Unknown
        );
    }
}
