use crate::ssa::FuncId;
use std::collections::HashMap;

/// One inlined call: the calling function, the display name of what it
/// called, and the source line of the call instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSite {
    pub caller: FuncId,
    pub callee: String,
    pub line: usize,
}

/// A hash-consed call stack. Slot 0 of the arena is the empty stack, so
/// handle equality implies value equality.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Stack(u32);

impl Stack {
    pub const EMPTY: Stack = Stack(0);

    pub fn is_empty(&self) -> bool {
        *self == Stack::EMPTY
    }

    /// The arena slot of this stack; stable for the lifetime of the
    /// analysis because cells are never removed.
    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug)]
enum Cell {
    Root,
    Frame { parent: Stack, site: CallSite },
}

/// Arena of interned stack cells. Extension interns immediately, so two
/// structurally equal stacks always share the same handle.
#[derive(Debug)]
pub struct StackArena {
    cells: Vec<Cell>,
    dedup: HashMap<(Stack, CallSite), Stack>,
}

impl StackArena {
    pub fn new() -> Self {
        StackArena {
            cells: vec![Cell::Root],
            dedup: HashMap::new(),
        }
    }

    /// Pushes one call site onto `parent`, reusing the interned cell when
    /// the same extension has been made before.
    pub fn extend(&mut self, parent: Stack, site: CallSite) -> Stack {
        if let Some(stack) = self.dedup.get(&(parent, site.clone())) {
            return *stack;
        }

        let stack = Stack(self.cells.len() as u32);
        self.cells.push(Cell::Frame {
            parent,
            site: site.clone(),
        });
        self.dedup.insert((parent, site), stack);

        stack
    }

    /// Rebuilds an interned stack from an ordered sequence of call sites
    /// (outermost first) on top of `base`.
    pub fn stack_of(&mut self, base: Stack, sites: &[CallSite]) -> Stack {
        let mut stack = base;
        for site in sites {
            stack = self.extend(stack, site.clone());
        }

        stack
    }

    /// Returns the call sites of `stack`, outermost first.
    pub fn flatten(&self, stack: Stack) -> Vec<CallSite> {
        let mut sites = Vec::new();
        let mut current = stack;

        while let Cell::Frame { parent, site } = &self.cells[current.0 as usize] {
            sites.push(site.clone());
            current = *parent;
        }

        sites.reverse();
        sites
    }

    /// Drops the longest common prefix of two stacks and returns the two
    /// remainders as interned stacks rooted at the empty stack.
    pub fn trim_common_prefix(&mut self, a: Stack, b: Stack) -> (Stack, Stack) {
        let sites_a = self.flatten(a);
        let sites_b = self.flatten(b);

        let mut common = 0;
        while common < sites_a.len()
            && common < sites_b.len()
            && sites_a[common] == sites_b[common]
        {
            common += 1;
        }

        (
            self.stack_of(Stack::EMPTY, &sites_a[common..]),
            self.stack_of(Stack::EMPTY, &sites_b[common..]),
        )
    }
}

impl Default for StackArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(caller: u32, callee: &str, line: usize) -> CallSite {
        CallSite {
            caller: FuncId(caller),
            callee: callee.to_string(),
            line,
        }
    }

    #[test]
    fn succeed_when_flattening_round_trips() {
        // arrange
        let mut arena = StackArena::new();
        let sites = vec![site(0, "f", 3), site(1, "g", 7), site(2, "runtime.lock", 9)];

        // act
        let stack = arena.stack_of(Stack::EMPTY, &sites);
        let flattened = arena.flatten(stack);
        let rebuilt = arena.stack_of(Stack::EMPTY, &flattened);

        // assert
        assert_eq!(flattened, sites);
        assert_eq!(rebuilt, stack);
    }

    #[test]
    fn succeed_when_interning_shares_handles() {
        // arrange
        let mut arena = StackArena::new();

        // act
        let first = arena.stack_of(Stack::EMPTY, &[site(0, "f", 3), site(1, "g", 7)]);
        let second = arena.stack_of(Stack::EMPTY, &[site(0, "f", 3), site(1, "g", 7)]);
        let other = arena.stack_of(Stack::EMPTY, &[site(0, "f", 3), site(1, "g", 8)]);

        // assert
        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn succeed_when_trimming_common_prefix() {
        // arrange
        let mut arena = StackArena::new();
        let prefix = vec![site(0, "f", 3), site(1, "g", 7)];
        let tail_a = vec![site(2, "h", 2)];
        let tail_b = vec![site(2, "k", 5), site(3, "runtime.lock", 1)];
        let a = arena.stack_of(Stack::EMPTY, &[prefix.clone(), tail_a.clone()].concat());
        let b = arena.stack_of(Stack::EMPTY, &[prefix.clone(), tail_b.clone()].concat());

        // act
        let (rest_a, rest_b) = arena.trim_common_prefix(a, b);

        // assert
        let flat_a = arena.flatten(rest_a);
        let flat_b = arena.flatten(rest_b);
        assert_eq!(flat_a, tail_a);
        assert_eq!(flat_b, tail_b);
        // the remainders share no common prefix element
        assert_ne!(flat_a.first(), flat_b.first());
        // reattaching the common prefix reconstructs the originals
        assert_eq!(arena.stack_of(Stack::EMPTY, &[prefix.clone(), flat_a].concat()), a);
        assert_eq!(arena.stack_of(Stack::EMPTY, &[prefix, flat_b].concat()), b);
    }

    #[test]
    fn succeed_when_trimming_identical_stacks() {
        // arrange
        let mut arena = StackArena::new();
        let stack = arena.stack_of(Stack::EMPTY, &[site(0, "f", 3)]);

        // act
        let (rest_a, rest_b) = arena.trim_common_prefix(stack, stack);

        // assert
        assert!(rest_a.is_empty());
        assert!(rest_b.is_empty());
    }
}
