use crate::intern::{ClassId, InternTable};
use crate::stack::Stack;
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;

/// A fixed-width-word bitset over lock-class IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitSet(Vec<u64>);

impl BitSet {
    pub fn set(&mut self, bit: u32) {
        let word = (bit / 64) as usize;
        if word >= self.0.len() {
            self.0.resize(word + 1, 0);
        }
        self.0[word] |= 1u64 << (bit % 64);
    }

    pub fn clear(&mut self, bit: u32) {
        let word = (bit / 64) as usize;
        if word < self.0.len() {
            self.0[word] &= !(1u64 << (bit % 64));
        }
        // trailing zero words would break equality
        while self.0.last() == Some(&0) {
            self.0.pop();
        }
    }

    pub fn test(&self, bit: u32) -> bool {
        let word = (bit / 64) as usize;
        word < self.0.len() && self.0[word] & (1u64 << (bit % 64)) != 0
    }
}

/// The set of locks held at a program point along one explored path.
///
/// Immutable: every operation returns a new set. Each member carries the
/// interned analyzer stack at which it was acquired; the stack map's
/// domain always equals the bitset's 1-bits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockSet {
    bits: BitSet,
    stacks: BTreeMap<ClassId, Stack>,
}

/// Hashable canonical form of a lock set, folding the bitset members and
/// the interned stack identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockSetKey(Vec<(u32, u32)>);

impl LockSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn contains(&self, class: ClassId) -> bool {
        self.bits.test(class.0)
    }

    /// Members in ascending class order with their acquisition stacks.
    pub fn iter(&self) -> impl Iterator<Item = (ClassId, Stack)> + '_ {
        self.stacks.iter().map(|(class, stack)| (*class, *stack))
    }

    /// Adds every class in `classes` with the given acquisition stack.
    /// A class already in the set keeps its earlier stack.
    pub fn plus(&self, classes: &[ClassId], stack: Stack) -> LockSet {
        let mut next = self.clone();
        for class in classes {
            if !next.bits.test(class.0) {
                next.bits.set(class.0);
                next.stacks.insert(*class, stack);
            }
        }

        next
    }

    pub fn plus_label(
        &self,
        label: &str,
        is_unique: bool,
        stack: Stack,
        intern: &mut InternTable,
    ) -> LockSet {
        self.plus(&[intern.intern(label, is_unique)], stack)
    }

    pub fn minus(&self, classes: &[ClassId]) -> LockSet {
        let mut next = self.clone();
        for class in classes {
            next.bits.clear(class.0);
            next.stacks.remove(class);
        }

        next
    }

    pub fn minus_label(&self, label: &str, intern: &InternTable) -> LockSet {
        match intern.lookup(label) {
            Some(class) => self.minus(&[class]),
            None => self.clone(),
        }
    }

    /// Set union. Members present in both sets keep `self`'s stack.
    pub fn union(&self, other: &LockSet) -> LockSet {
        let mut next = self.clone();
        for (class, stack) in other.iter() {
            if !next.bits.test(class.0) {
                next.bits.set(class.0);
                next.stacks.insert(class, stack);
            }
        }

        next
    }

    pub fn key(&self) -> LockSetKey {
        LockSetKey(
            self.stacks
                .iter()
                .map(|(class, stack)| (class.0, stack.index()))
                .collect(),
        )
    }

    /// Printable form, e.g. `{runtime.sched, runtime.allglock}`.
    pub fn display(&self, intern: &InternTable) -> String {
        let mut out = String::from("{");
        for (index, (class, _)) in self.iter().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            let _ = write!(&mut out, "{}", intern.label(class));
        }
        out.push('}');

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::FuncId;
    use crate::stack::{CallSite, StackArena};

    fn stack(arena: &mut StackArena, line: usize) -> Stack {
        arena.extend(
            Stack::EMPTY,
            CallSite {
                caller: FuncId(0),
                callee: "runtime.lock".to_string(),
                line,
            },
        )
    }

    #[test]
    fn succeed_when_plus_then_minus_restores_bitset() {
        // arrange
        let mut intern = InternTable::new();
        let mut arena = StackArena::new();
        let a = intern.intern("a", true);
        let b = intern.intern("b", true);
        let held = LockSet::new().plus(&[a], stack(&mut arena, 1));

        // act
        let grown = held.plus(&[a, b], stack(&mut arena, 2));
        let shrunk = grown.minus(&[b]);

        // assert
        assert_eq!(shrunk, held);
        // the surviving member kept its original acquisition stack
        assert_eq!(
            shrunk.iter().next(),
            Some((a, stack(&mut arena, 1)))
        );
    }

    #[test]
    fn succeed_when_keys_reflect_stack_identity() {
        // arrange
        let mut intern = InternTable::new();
        let mut arena = StackArena::new();
        let a = intern.intern("a", true);

        // act
        let at_one = LockSet::new().plus(&[a], stack(&mut arena, 1));
        let at_one_again = LockSet::new().plus(&[a], stack(&mut arena, 1));
        let at_two = LockSet::new().plus(&[a], stack(&mut arena, 2));

        // assert
        assert_eq!(at_one.key(), at_one_again.key());
        assert_ne!(at_one.key(), at_two.key());
        assert_ne!(at_one.key(), LockSet::new().key());
    }

    #[test]
    fn succeed_when_union_keeps_first_acquisition() {
        // arrange
        let mut intern = InternTable::new();
        let mut arena = StackArena::new();
        let a = intern.intern("a", true);
        let b = intern.intern("b", true);
        let left = LockSet::new().plus(&[a], stack(&mut arena, 1));
        let right = LockSet::new()
            .plus(&[a], stack(&mut arena, 2))
            .plus(&[b], stack(&mut arena, 3));

        // act
        let union = left.union(&right);

        // assert
        assert!(union.contains(a));
        assert!(union.contains(b));
        // the member present in both keeps the left stack
        assert_eq!(union.iter().next(), Some((a, stack(&mut arena, 1))));
    }

    #[test]
    fn succeed_when_removing_by_label() {
        // arrange
        let mut intern = InternTable::new();
        let mut arena = StackArena::new();
        let acquired = stack(&mut arena, 4);

        // act
        let held = LockSet::new().plus_label("_Gscan", false, acquired, &mut intern);
        let released = held.minus_label("_Gscan", &intern);

        // assert
        assert!(held.contains(intern.lookup("_Gscan").expect("interned")));
        assert!(released.is_empty());
    }

    #[test]
    fn succeed_when_printing_members_in_order() {
        // arrange
        let mut intern = InternTable::new();
        let mut arena = StackArena::new();
        let b = intern.intern("b", true);
        let a = intern.intern("a", true);
        let acquired = stack(&mut arena, 1);

        // act
        let held = LockSet::new().plus(&[a], acquired).plus(&[b], acquired);

        // assert
        assert_eq!(held.display(&intern), "{b, a}");
        assert_eq!(held.len(), 2);
    }
}
