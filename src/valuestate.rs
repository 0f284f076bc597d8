use crate::dynvalue::{DynValue, HeapArena, HeapId};
use crate::ssa::{Instr, InstrKind, ValueId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;
use std::rc::Rc;

/// Override chains longer than this are flattened into a fresh map.
const FLATTEN_BUDGET: u8 = 4;

/// A persistent map built from single-binding override cells rooted at a
/// flat hash map. `bind` is O(1) until the chain reaches the flatten
/// budget; `get` walks the chain.
#[derive(Debug, Clone)]
struct Chain<K, V> {
    node: Rc<Node<K, V>>,
}

#[derive(Debug)]
enum Node<K, V> {
    Flat(HashMap<K, V>),
    Bind {
        key: K,
        value: V,
        rest: Rc<Node<K, V>>,
        depth: u8,
    },
}

impl<K, V> Chain<K, V>
where
    K: Copy + Eq + Hash + Ord,
    V: Clone + PartialEq,
{
    fn new() -> Self {
        Chain {
            node: Rc::new(Node::Flat(HashMap::new())),
        }
    }

    fn get(&self, key: K) -> Option<&V> {
        let mut node = self.node.as_ref();
        loop {
            match node {
                Node::Flat(map) => return map.get(&key),
                Node::Bind {
                    key: bound,
                    value,
                    rest,
                    ..
                } => {
                    if *bound == key {
                        return Some(value);
                    }
                    node = rest.as_ref();
                }
            }
        }
    }

    fn depth(&self) -> u8 {
        match self.node.as_ref() {
            Node::Flat(_) => 0,
            Node::Bind { depth, .. } => *depth,
        }
    }

    fn bind(&self, key: K, value: V) -> Chain<K, V> {
        if self.get(key) == Some(&value) {
            return self.clone();
        }

        if self.depth() >= FLATTEN_BUDGET {
            let mut map = self.snapshot_map();
            map.insert(key, value);
            return Chain {
                node: Rc::new(Node::Flat(map)),
            };
        }

        Chain {
            node: Rc::new(Node::Bind {
                key,
                value,
                rest: self.node.clone(),
                depth: self.depth() + 1,
            }),
        }
    }

    fn remove(&self, key: K) -> Chain<K, V> {
        if self.get(key).is_none() {
            return self.clone();
        }

        let mut map = self.snapshot_map();
        map.remove(&key);
        Chain {
            node: Rc::new(Node::Flat(map)),
        }
    }

    fn snapshot_map(&self) -> HashMap<K, V> {
        let mut map = HashMap::new();
        let mut shadowed = HashSet::new();
        let mut node = self.node.as_ref();
        loop {
            match node {
                Node::Flat(flat) => {
                    for (key, value) in flat {
                        if !shadowed.contains(key) {
                            map.insert(*key, value.clone());
                        }
                    }
                    return map;
                }
                Node::Bind {
                    key, value, rest, ..
                } => {
                    if shadowed.insert(*key) {
                        map.insert(*key, value.clone());
                    }
                    node = rest.as_ref();
                }
            }
        }
    }

    fn snapshot(&self) -> BTreeMap<K, V> {
        self.snapshot_map().into_iter().collect()
    }
}

/// The value half of a path state: persistent maps from SSA value and
/// tracked heap object to abstract dynamic value. Binding `Unknown` is
/// equivalent to absence; neither map ever stores it.
#[derive(Debug, Clone)]
pub struct ValueState {
    regs: Chain<ValueId, DynValue>,
    heap: Chain<HeapId, DynValue>,
}

impl ValueState {
    pub fn new() -> Self {
        ValueState {
            regs: Chain::new(),
            heap: Chain::new(),
        }
    }

    pub fn get(&self, value: ValueId) -> Option<&DynValue> {
        self.regs.get(value)
    }

    pub fn bind(&self, value: ValueId, bound: DynValue) -> ValueState {
        let regs = if bound.is_unknown() {
            self.regs.remove(value)
        } else {
            self.regs.bind(value, bound)
        };

        ValueState {
            regs,
            heap: self.heap.clone(),
        }
    }

    pub fn get_heap(&self, heap: HeapId) -> Option<&DynValue> {
        self.heap.get(heap)
    }

    pub fn set_heap(&self, heap: HeapId, bound: DynValue) -> ValueState {
        let heap = if bound.is_unknown() {
            self.heap.remove(heap)
        } else {
            self.heap.bind(heap, bound)
        };

        ValueState {
            regs: self.regs.clone(),
            heap,
        }
    }

    /// Discards the SSA-value map but keeps the heap map. Used when
    /// crossing into a callee whose frame is distinct.
    pub fn limit_to_heap(&self) -> ValueState {
        ValueState {
            regs: Chain::new(),
            heap: self.heap.clone(),
        }
    }

    pub fn heap_snapshot(&self) -> BTreeMap<HeapId, DynValue> {
        self.heap.snapshot()
    }

    /// Equality on an observable set of SSA values plus the entire heap
    /// map.
    pub fn eq_on(&self, observed: &HashSet<ValueId>, other: &ValueState) -> bool {
        observed
            .iter()
            .all(|value| self.regs.get(*value) == other.regs.get(*value))
            && self.heap_snapshot() == other.heap_snapshot()
    }

    /// Applies the abstract semantics of a single SSA instruction.
    /// Calls and phis are handled by the walker and leave the state
    /// unchanged here.
    pub fn do_instr(&self, instr: &Instr, arena: &mut HeapArena) -> ValueState {
        match &instr.kind {
            InstrKind::Const(literal) => self.bind_result(instr, DynValue::Const(literal.clone())),
            InstrKind::Global(global) => self.bind_result(instr, DynValue::Global(*global)),
            InstrKind::ChangeType(operand) => {
                let value = self.value_of(*operand);
                self.bind_result(instr, value)
            }
            InstrKind::BinOp { op, lhs, rhs } => {
                let value = DynValue::binop(*op, &self.value_of(*lhs), &self.value_of(*rhs));
                self.bind_result(instr, value)
            }
            InstrKind::UnOp {
                op: crate::ssa::UnOp::Deref,
                operand,
            } => {
                let value = match self.value_of(*operand) {
                    DynValue::HeapPtr(heap) => {
                        self.get_heap(heap).cloned().unwrap_or(DynValue::Unknown)
                    }
                    _ => DynValue::Unknown,
                };
                self.bind_result(instr, value)
            }
            InstrKind::UnOp { op, operand } => {
                let value = DynValue::unop(*op, &self.value_of(*operand));
                self.bind_result(instr, value)
            }
            InstrKind::FieldAddr { base, field } => match self.value_of(*base) {
                DynValue::Global(global) => {
                    self.bind_result(instr, DynValue::FieldOfGlobal(global, field.clone()))
                }
                DynValue::HeapPtr(heap) => self.field_of_heap(instr, heap, field, arena),
                _ => self.bind_result(instr, DynValue::Unknown),
            },
            InstrKind::Store { addr, value } => {
                if let DynValue::HeapPtr(heap) = self.value_of(*addr) {
                    let stored = self.value_of(*value);
                    if !stored.is_unknown() {
                        return self.set_heap(heap, stored);
                    }
                }
                self.clone()
            }
            InstrKind::Phi(_) | InstrKind::Call { .. } => self.clone(),
        }
    }

    fn value_of(&self, value: ValueId) -> DynValue {
        self.get(value).cloned().unwrap_or(DynValue::Unknown)
    }

    fn bind_result(&self, instr: &Instr, value: DynValue) -> ValueState {
        match instr.result {
            Some(result) => self.bind(result, value),
            None => self.clone(),
        }
    }

    /// Models `&p.field` for a tracked heap cell: the cell's value is a
    /// struct of per-field heap objects, materialized on demand.
    fn field_of_heap(
        &self,
        instr: &Instr,
        heap: HeapId,
        field: &str,
        arena: &mut HeapArena,
    ) -> ValueState {
        match self.get_heap(heap) {
            Some(DynValue::HeapStruct(fields)) => {
                if let Some(child) = fields.get(field) {
                    return self.bind_result(instr, DynValue::HeapPtr(*child));
                }
                let mut fields = fields.clone();
                let label = format!("{}.{field}", arena.label(heap));
                let child = arena.alloc(&label);
                fields.insert(field.to_string(), child);
                self.set_heap(heap, DynValue::HeapStruct(fields))
                    .bind_result(instr, DynValue::HeapPtr(child))
            }
            None => {
                let label = format!("{}.{field}", arena.label(heap));
                let child = arena.alloc(&label);
                let mut fields = BTreeMap::new();
                fields.insert(field.to_string(), child);
                self.set_heap(heap, DynValue::HeapStruct(fields))
                    .bind_result(instr, DynValue::HeapPtr(child))
            }
            Some(_) => self.bind_result(instr, DynValue::Unknown),
        }
    }
}

impl Default for ValueState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::{GlobalId, Literal};

    fn int(value: i128) -> DynValue {
        DynValue::Const(Literal::Int(value))
    }

    #[test]
    fn succeed_when_binding_and_reading_values() {
        // arrange
        let state = ValueState::new();

        // act
        let bound = state.bind(ValueId(0), int(1)).bind(ValueId(1), int(2));

        // assert
        assert_eq!(bound.get(ValueId(0)), Some(&int(1)));
        assert_eq!(bound.get(ValueId(1)), Some(&int(2)));
        assert_eq!(bound.get(ValueId(2)), None);
        // the original state is untouched
        assert_eq!(state.get(ValueId(0)), None);
    }

    #[test]
    fn succeed_when_chain_flattens_past_budget() {
        // arrange
        let mut state = ValueState::new();

        // act: exceed the override budget several times over
        for index in 0..20 {
            state = state.bind(ValueId(index), int(index as i128));
        }
        let rebound = state.bind(ValueId(0), int(-1));

        // assert
        for index in 1..20 {
            assert_eq!(state.get(ValueId(index)), Some(&int(index as i128)));
        }
        assert_eq!(rebound.get(ValueId(0)), Some(&int(-1)));
        assert_eq!(state.get(ValueId(0)), Some(&int(0)));
    }

    #[test]
    fn succeed_when_binding_unknown_removes() {
        // arrange
        let state = ValueState::new().bind(ValueId(3), int(7));

        // act
        let removed = state.bind(ValueId(3), DynValue::Unknown);

        // assert
        assert_eq!(removed.get(ValueId(3)), None);
    }

    #[test]
    fn succeed_when_extending_heap() {
        // arrange
        let mut arena = HeapArena::new();
        let cell = arena.alloc("curg");
        let state = ValueState::new();

        // act
        let bound = state.set_heap(cell, int(9));

        // assert
        assert_eq!(bound.get_heap(cell), Some(&int(9)));
        assert_eq!(state.get_heap(cell), None);
    }

    #[test]
    fn succeed_when_comparing_on_observable_set() {
        // arrange
        let mut arena = HeapArena::new();
        let cell = arena.alloc("curg");
        let observed: HashSet<ValueId> = [ValueId(0)].into_iter().collect();
        let left = ValueState::new().bind(ValueId(0), int(1)).bind(ValueId(1), int(2));
        let same = ValueState::new().bind(ValueId(0), int(1)).bind(ValueId(1), int(3));
        let different = ValueState::new().bind(ValueId(0), int(4));

        // act / assert: only the observable register and the heap matter
        assert!(left.eq_on(&observed, &same));
        assert!(!left.eq_on(&observed, &different));
        assert!(!left.eq_on(&observed, &same.set_heap(cell, int(0))));
    }

    #[test]
    fn succeed_when_limiting_to_heap() {
        // arrange
        let mut arena = HeapArena::new();
        let cell = arena.alloc("curg");
        let state = ValueState::new()
            .bind(ValueId(0), int(1))
            .set_heap(cell, DynValue::Global(GlobalId(0)));

        // act
        let limited = state.limit_to_heap();

        // assert
        assert_eq!(limited.get(ValueId(0)), None);
        assert_eq!(limited.get_heap(cell), Some(&DynValue::Global(GlobalId(0))));
    }

    #[test]
    fn succeed_when_taking_field_of_tracked_cell() {
        // arrange
        let mut arena = HeapArena::new();
        let cell = arena.alloc("g");
        let instr = Instr {
            result: Some(ValueId(1)),
            kind: InstrKind::FieldAddr {
                base: ValueId(0),
                field: "m".to_string(),
            },
            line: 1,
        };
        let state = ValueState::new().bind(ValueId(0), DynValue::HeapPtr(cell));

        // act
        let first = state.do_instr(&instr, &mut arena);
        let second = first
            .bind(ValueId(1), DynValue::Unknown)
            .do_instr(&instr, &mut arena);

        // assert: the same field child is reused
        let child = match first.get(ValueId(1)) {
            Some(DynValue::HeapPtr(child)) => *child,
            other => panic!("expected heap pointer, got {other:?}"),
        };
        assert_eq!(arena.label(child), "g.m");
        assert_eq!(second.get(ValueId(1)), Some(&DynValue::HeapPtr(child)));
    }
}
