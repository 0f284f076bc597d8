use crate::dynvalue::{DynValue, HeapArena, HeapId};
use crate::error::AnalysisError;
use crate::handlers::{handler_table, Handler};
use crate::intern::{ClassId, InternTable};
use crate::lockgraph::{LockOrder, Witness};
use crate::lockset::{LockSet, LockSetKey};
use crate::ssa::{
    Block, BlockId, Callee, Function, FuncId, Instr, InstrKind, Literal, Program, Terminator,
    ValueId,
};
use crate::stack::{CallSite, Stack, StackArena};
use crate::valuestate::ValueState;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Paths through one block under one lock set are explored at most this
/// many times before the state space is considered blown.
const BLOCK_STATE_BUDGET: usize = 10;

/// The pair (lock set, value state) at a program point along one
/// explored path.
#[derive(Debug, Clone)]
pub struct PathState {
    pub locks: LockSet,
    pub vs: ValueState,
}

/// What a call handler sees of the call instruction.
#[derive(Debug, Clone)]
pub struct CallCtx {
    pub func: FuncId,
    pub result: ValueId,
    pub args: Vec<ValueId>,
    pub line: usize,
}

type BlockCache = HashMap<(BlockId, LockSetKey), Vec<ValueState>>;

/// Everything the analysis accumulates: intern tables, the lock graph,
/// and the warning count. Handed to the report once walking finishes.
#[derive(Debug)]
pub struct AnalysisResult {
    pub intern: InternTable,
    pub stacks: StackArena,
    pub graph: LockOrder,
    pub warnings: usize,
    pub root_class: ClassId,
}

/// The analysis context: the single owner of all long-lived state of one
/// run. The walker is sequential; nothing here is shared.
pub struct Analysis<'p> {
    prog: &'p Program,
    pub intern: InternTable,
    pub stacks: StackArena,
    pub heap: HeapArena,
    pub graph: LockOrder,
    /// The analyzer's current position as an inlined call stack.
    pub cur_stack: Stack,
    pub warnings: usize,
    /// Tracked heap cell holding the current G.
    pub curg: HeapId,
    /// The g0 system-stack sentinel.
    pub g0: HeapId,
    /// The current M.
    pub curm: HeapId,
    initial_g: HeapId,
    root_class: ClassId,
    handlers: HashMap<&'static str, Handler>,
    /// Escape hatch: functions whose effect the abstract interpreter
    /// cannot express, mapped to the lock-class label they release on
    /// return.
    release_rules: HashMap<String, String>,
    memo: HashMap<(FuncId, LockSetKey), Option<Rc<Vec<LockSet>>>>,
    live: HashMap<FuncId, Rc<Vec<HashSet<ValueId>>>>,
}

impl<'p> Analysis<'p> {
    pub fn new(prog: &'p Program) -> Self {
        let mut intern = InternTable::new();
        let root_class = intern.intern("<root>", true);
        let mut heap = HeapArena::new();
        let curg = heap.alloc("curg");
        let initial_g = heap.alloc("g");
        let g0 = heap.alloc("g0");
        let curm = heap.alloc("m");

        Analysis {
            prog,
            intern,
            stacks: StackArena::new(),
            heap,
            graph: LockOrder::new(),
            cur_stack: Stack::EMPTY,
            warnings: 0,
            curg,
            g0,
            curm,
            initial_g,
            root_class,
            handlers: handler_table(),
            release_rules: HashMap::new(),
            memo: HashMap::new(),
            live: HashMap::new(),
        }
    }

    pub fn program(&self) -> &'p Program {
        self.prog
    }

    pub fn add_release_rule(&mut self, function: &str, label: &str) {
        self.release_rules
            .insert(function.to_string(), label.to_string());
    }

    /// The value state at an analysis entry point: the current-G cell
    /// holds the initial user G.
    pub fn initial_value_state(&self) -> ValueState {
        ValueState::new().set_heap(self.curg, DynValue::HeapPtr(self.initial_g))
    }

    /// Walks every entry point with an empty lock set.
    pub fn run(&mut self, entries: &[FuncId]) -> Result<(), AnalysisError> {
        for entry in entries {
            debug!("walking entry '{}'", self.prog.function(*entry).name);
            self.cur_stack = Stack::EMPTY;
            self.walk_function(*entry, &LockSet::new(), self.initial_value_state())?;
        }

        Ok(())
    }

    pub fn into_result(self) -> AnalysisResult {
        AnalysisResult {
            intern: self.intern,
            stacks: self.stacks,
            graph: self.graph,
            warnings: self.warnings,
            root_class: self.root_class,
        }
    }

    /// Walks `func` under `entry` locks and returns the set of exit lock
    /// sets. Memoized per (function, entry-lock-set); a recursive call
    /// finds the in-progress marker and contributes no exit states.
    pub fn walk_function(
        &mut self,
        func: FuncId,
        entry: &LockSet,
        entry_vs: ValueState,
    ) -> Result<Rc<Vec<LockSet>>, AnalysisError> {
        let function = self.prog.function(func);
        if function.is_external() {
            return Ok(Rc::new(vec![entry.clone()]));
        }

        let live = self.control_flow_live(func)?;
        let key = (func, entry.key());
        match self.memo.get(&key) {
            Some(Some(exits)) => return Ok(exits.clone()),
            Some(None) => return Ok(Rc::new(Vec::new())),
            None => {}
        }
        self.memo.insert(key.clone(), None);

        let mut cache: BlockCache = HashMap::new();
        let mut exits = Vec::new();
        let state = PathState {
            locks: entry.clone(),
            vs: entry_vs,
        };
        self.walk_block(func, BlockId(0), state, &live, &mut cache, &mut exits)?;

        let exits = Rc::new(exits);
        self.memo.insert(key, Some(exits.clone()));

        Ok(exits)
    }

    /// Walks a named call: extends the analyzer stack with the call
    /// site, walks the callee, and restores the stack.
    pub fn walk_named_call(
        &mut self,
        ctx: &CallCtx,
        callee: &str,
        func: FuncId,
        locks: &LockSet,
        entry_vs: ValueState,
    ) -> Result<Rc<Vec<LockSet>>, AnalysisError> {
        let site = CallSite {
            caller: ctx.func,
            callee: callee.to_string(),
            line: ctx.line,
        };
        let saved = self.cur_stack;
        self.cur_stack = self.stacks.extend(saved, site);
        let exits = self.walk_function(func, locks, entry_vs);
        self.cur_stack = saved;

        exits
    }

    fn walk_block(
        &mut self,
        func: FuncId,
        block_id: BlockId,
        state: PathState,
        live: &Rc<Vec<HashSet<ValueId>>>,
        cache: &mut BlockCache,
        exits: &mut Vec<LockSet>,
    ) -> Result<(), AnalysisError> {
        let prog = self.prog;
        let function = prog.function(func);
        let block = function.block(block_id);
        let observed = &live[block_id.0 as usize];

        {
            let seen = cache.entry((block_id, state.locks.key())).or_default();
            if seen
                .iter()
                .any(|previous| state.vs.eq_on(observed, previous))
            {
                // already explored under equivalent preconditions
                return Ok(());
            }
            if seen.len() >= BLOCK_STATE_BUDGET {
                warn!(
                    "too many states at block '{}' of '{}' ({}:{}); trimming path",
                    block.label, function.name, prog.file, block.term_line
                );
                self.warnings += 1;
                return Ok(());
            }
            seen.push(state.vs.clone());
        }

        let mut states = vec![state];
        for instr in &block.instrs {
            match &instr.kind {
                InstrKind::Call { callee, args } => {
                    let mut next = Vec::new();
                    for current in states {
                        self.handle_call(func, instr, callee, args, current, &mut next)?;
                    }
                    states = next;
                    if states.is_empty() {
                        return Ok(());
                    }
                }
                // phis are bound when the edge into this block is taken
                InstrKind::Phi(_) => {}
                _ => {
                    for current in &mut states {
                        current.vs = current.vs.do_instr(instr, &mut self.heap);
                    }
                }
            }
        }

        for state in states {
            match &block.term {
                Terminator::Ret(_) => {
                    let mut locks = state.locks;
                    if let Some(label) = self.release_rules.get(&function.name).cloned() {
                        locks = locks.minus_label(&label, &self.intern);
                    }
                    if !exits.contains(&locks) {
                        exits.push(locks);
                    }
                }
                Terminator::Br(target) => {
                    self.flow_edge(func, block_id, *target, state, live, cache, exits)?;
                }
                Terminator::CondBr {
                    cond,
                    then_block,
                    else_block,
                } => match state.vs.get(*cond).cloned() {
                    Some(DynValue::Const(Literal::Bool(true))) => {
                        self.flow_edge(func, block_id, *then_block, state, live, cache, exits)?;
                    }
                    Some(DynValue::Const(Literal::Bool(false))) => {
                        self.flow_edge(func, block_id, *else_block, state, live, cache, exits)?;
                    }
                    _ => {
                        self.flow_edge(
                            func,
                            block_id,
                            *then_block,
                            state.clone(),
                            live,
                            cache,
                            exits,
                        )?;
                        self.flow_edge(func, block_id, *else_block, state, live, cache, exits)?;
                    }
                },
            }
        }

        Ok(())
    }

    /// Enters `to` from `from`, binding each phi at the top of `to` to
    /// the operand supplied by `from`. Bindings are computed before any
    /// are applied; phis are parallel assignments.
    #[allow(clippy::too_many_arguments)]
    fn flow_edge(
        &mut self,
        func: FuncId,
        from: BlockId,
        to: BlockId,
        mut state: PathState,
        live: &Rc<Vec<HashSet<ValueId>>>,
        cache: &mut BlockCache,
        exits: &mut Vec<LockSet>,
    ) -> Result<(), AnalysisError> {
        let prog = self.prog;
        let block = prog.function(func).block(to);

        let mut bindings = Vec::new();
        for instr in &block.instrs {
            if let (InstrKind::Phi(edges), Some(result)) = (&instr.kind, instr.result) {
                if let Some((_, operand)) = edges.iter().find(|(pred, _)| *pred == from) {
                    if let Some(known) = state.vs.get(*operand) {
                        bindings.push((result, known.clone()));
                    }
                }
            }
        }
        for (result, value) in bindings {
            state.vs = state.vs.bind(result, value);
        }

        self.walk_block(func, to, state, live, cache, exits)
    }

    /// Dispatches one call instruction: a named handler runs in lieu of
    /// the callee; otherwise every resolvable callee is walked and the
    /// union of exit lock sets is carried forward. An unresolvable call
    /// is logged and has no effect.
    fn handle_call(
        &mut self,
        func: FuncId,
        instr: &Instr,
        callee: &Callee,
        args: &[ValueId],
        state: PathState,
        out: &mut Vec<PathState>,
    ) -> Result<(), AnalysisError> {
        let prog = self.prog;
        let result = match instr.result {
            Some(result) => result,
            None => {
                out.push(state);
                return Ok(());
            }
        };
        let ctx = CallCtx {
            func,
            result,
            args: args.to_vec(),
            line: instr.line,
        };

        if let Callee::Named { name, .. } = callee {
            if let Some(handler) = self.handlers.get(name.as_str()).copied() {
                return handler(self, &ctx, state, out);
            }
        }

        let targets: Vec<FuncId> = match callee {
            Callee::Named {
                func: Some(target), ..
            } => vec![*target],
            _ => prog
                .call_graph
                .get(&(func, result))
                .cloned()
                .unwrap_or_default(),
        };

        if targets.is_empty() {
            debug!(
                "unresolved callee in '{}' ({}:{})",
                prog.function(func).name,
                prog.file,
                instr.line
            );
            out.push(state);
            return Ok(());
        }

        for target in targets {
            let name = prog.function(target).name.clone();
            let exits =
                self.walk_named_call(&ctx, &name, target, &state.locks, state.vs.limit_to_heap())?;
            for exit in exits.iter() {
                out.push(PathState {
                    locks: exit.clone(),
                    vs: state.vs.clone(),
                });
            }
        }

        Ok(())
    }

    /// The interned analyzer stack extended with the call site of the
    /// instruction currently being handled; lock-set members record this
    /// as their acquisition stack.
    pub fn call_stack_here(&mut self, ctx: &CallCtx, callee: &str) -> Stack {
        self.stacks.extend(
            self.cur_stack,
            CallSite {
                caller: ctx.func,
                callee: callee.to_string(),
                line: ctx.line,
            },
        )
    }

    /// Records an acquired-before edge from every held lock (or from the
    /// root pseudo-class when none is held) to every acquired class,
    /// with common-prefix-trimmed witness stacks.
    pub fn record_acquire(&mut self, locks: &LockSet, classes: &[ClassId], acquired: Stack) {
        if locks.is_empty() {
            for to in classes {
                self.graph.add_edge(
                    self.root_class,
                    *to,
                    Witness {
                        from: Stack::EMPTY,
                        to: acquired,
                    },
                );
            }
            return;
        }

        for (from, from_stack) in locks.iter() {
            for to in classes {
                let (from_trimmed, to_trimmed) =
                    self.stacks.trim_common_prefix(from_stack, acquired);
                self.graph.add_edge(
                    from,
                    *to,
                    Witness {
                        from: from_trimmed,
                        to: to_trimmed,
                    },
                );
            }
        }
    }

    /// Derives the lock classes of a lock operation's argument: first
    /// from the tracked value state (globals and fields of globals are
    /// unique classes), then from the external points-to oracle.
    pub fn resolve_lock_classes(
        &mut self,
        ctx: &CallCtx,
        vs: &ValueState,
    ) -> Result<Vec<ClassId>, AnalysisError> {
        let prog = self.prog;
        let function = prog.function(ctx.func);
        let arg = match ctx.args.first() {
            Some(arg) => *arg,
            None => {
                return Err(AnalysisError::UnresolvedLockClass {
                    function: function.name.clone(),
                    value: "<missing argument>".to_string(),
                    line: ctx.line,
                })
            }
        };

        match vs.get(arg) {
            Some(DynValue::Global(global)) => {
                Ok(vec![self.intern.intern(&prog.global(*global).name, true)])
            }
            Some(DynValue::FieldOfGlobal(global, field)) => {
                let label = format!("{}.{}", prog.global(*global).name, field);
                Ok(vec![self.intern.intern(&label, true)])
            }
            _ => match prog.points_to.get(&(ctx.func, arg)) {
                Some(labels) => Ok(labels
                    .iter()
                    .map(|label| self.intern.intern(&label.label, label.is_unique))
                    .collect()),
                None => Err(AnalysisError::UnresolvedLockClass {
                    function: function.name.clone(),
                    value: format!("%{}", function.value_name(arg)),
                    line: ctx.line,
                }),
            },
        }
    }

    /// Per-block sets of SSA values whose bindings may influence future
    /// branch decisions, computed once per function. Backward liveness
    /// from `If` conditions over the def-use graph; phi-selected values
    /// are followed only along the predecessor that supplied them.
    fn control_flow_live(
        &mut self,
        func: FuncId,
    ) -> Result<Rc<Vec<HashSet<ValueId>>>, AnalysisError> {
        if let Some(live) = self.live.get(&func) {
            return Ok(live.clone());
        }

        let function = self.prog.function(func);
        let live = match compute_control_flow_live(function) {
            Some(live) => Rc::new(live),
            None => {
                return Err(AnalysisError::ControlFlowLiveness {
                    function: function.name.clone(),
                    dump: function.to_string(),
                })
            }
        };
        self.live.insert(func, live.clone());

        Ok(live)
    }
}

fn successors(term: &Terminator) -> Vec<BlockId> {
    match term {
        Terminator::Ret(_) => Vec::new(),
        Terminator::Br(target) => vec![*target],
        Terminator::CondBr {
            then_block,
            else_block,
            ..
        } => vec![*then_block, *else_block],
    }
}

enum PhiLookup {
    NotPhi,
    Operand(ValueId),
    MissingEdge,
}

fn phi_operand(block: &Block, value: ValueId, pred: BlockId) -> PhiLookup {
    for instr in &block.instrs {
        if let InstrKind::Phi(edges) = &instr.kind {
            if instr.result == Some(value) {
                return match edges.iter().find(|(from, _)| *from == pred) {
                    Some((_, operand)) => PhiLookup::Operand(*operand),
                    None => PhiLookup::MissingEdge,
                };
            }
        }
    }

    PhiLookup::NotPhi
}

/// Returns `None` when the walk fails to converge or a phi lacks an
/// operand for a predecessor edge.
fn compute_control_flow_live(function: &Function) -> Option<Vec<HashSet<ValueId>>> {
    let block_count = function.blocks.len();
    let mut defs: HashMap<ValueId, &InstrKind> = HashMap::new();
    for block in &function.blocks {
        for instr in &block.instrs {
            if let Some(result) = instr.result {
                defs.insert(result, &instr.kind);
            }
        }
    }

    // transitive operand closure through pure instructions; phis, calls,
    // constants, and parameters are leaves
    let close = |seed: ValueId, set: &mut HashSet<ValueId>| {
        let mut worklist = vec![seed];
        while let Some(value) = worklist.pop() {
            if !set.insert(value) {
                continue;
            }
            match defs.get(&value) {
                Some(InstrKind::BinOp { lhs, rhs, .. }) => {
                    worklist.push(*lhs);
                    worklist.push(*rhs);
                }
                Some(InstrKind::UnOp { operand, .. }) | Some(InstrKind::ChangeType(operand)) => {
                    worklist.push(*operand);
                }
                Some(InstrKind::FieldAddr { base, .. }) => {
                    worklist.push(*base);
                }
                _ => {}
            }
        }
    };

    let mut live: Vec<HashSet<ValueId>> = vec![HashSet::new(); block_count];
    let max_rounds = block_count * function.value_names.len() + 8;
    let mut rounds = 0;

    loop {
        let mut changed = false;

        for index in (0..block_count).rev() {
            let block = &function.blocks[index];
            let mut set = HashSet::new();

            if let Terminator::CondBr { cond, .. } = &block.term {
                close(*cond, &mut set);
            }

            for succ in successors(&block.term) {
                let succ_block = &function.blocks[succ.0 as usize];
                for value in live[succ.0 as usize].clone() {
                    match phi_operand(succ_block, value, BlockId(index as u32)) {
                        PhiLookup::NotPhi => {
                            set.insert(value);
                        }
                        PhiLookup::Operand(operand) => close(operand, &mut set),
                        PhiLookup::MissingEdge => return None,
                    }
                }
            }

            if set != live[index] {
                live[index] = set;
                changed = true;
            }
        }

        if !changed {
            return Some(live);
        }
        rounds += 1;
        if rounds > max_rounds {
            return None;
        }
    }
}

/// Runs the whole analysis over a resolved program.
pub fn run_analysis(prog: &Program, entries: &[FuncId]) -> Result<AnalysisResult, AnalysisError> {
    let mut analysis = Analysis::new(prog);
    analysis.run(entries)?;

    Ok(analysis.into_result())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::load_program;

    fn analyze(path: &str) -> (Program, AnalysisResult) {
        let program = load_program(path).expect("load");
        let entries = program.entries.clone();
        let result = run_analysis(&program, &entries).expect("analysis");

        (program, result)
    }

    fn class(result: &AnalysisResult, label: &str) -> ClassId {
        result
            .intern
            .lookup(label)
            .unwrap_or_else(|| panic!("lock class '{label}' was never interned"))
    }

    #[test]
    fn succeed_when_straight_line_locks_produce_no_cycle() {
        // arrange / act: lock a, unlock a, lock b, unlock b
        let (_program, mut result) = analyze("test/scenario_no_cycle.ssa");

        // assert
        let a = class(&result, "a");
        let b = class(&result, "b");
        assert!(result.graph.has_edge(result.root_class, a));
        assert!(result.graph.has_edge(result.root_class, b));
        assert!(!result.graph.has_edge(a, b));
        assert_eq!(result.graph.edge_count(), 2);
        assert!(result.graph.cycles().is_empty());
    }

    #[test]
    fn succeed_when_opposed_orders_form_direct_cycle() {
        // arrange / act: f locks a then b; g locks b then a
        let (_program, mut result) = analyze("test/scenario_direct_cycle.ssa");

        // assert
        let a = class(&result, "a");
        let b = class(&result, "b");
        assert!(result.graph.has_edge(a, b));
        assert!(result.graph.has_edge(b, a));
        let cycles = result.graph.cycles();
        assert_eq!(cycles.as_ref(), &vec![vec![a, b]]);
        assert_eq!(result.graph.witnesses(a, b).map(|w| w.len()), Some(1));
        assert_eq!(result.graph.witnesses(b, a).map(|w| w.len()), Some(1));
    }

    #[test]
    fn succeed_when_three_functions_form_transitive_cycle() {
        // arrange / act: f: a->b, g: b->c, h: c->a
        let (_program, mut result) = analyze("test/scenario_transitive_cycle.ssa");

        // assert
        let a = class(&result, "a");
        let b = class(&result, "b");
        let c = class(&result, "c");
        let cycles = result.graph.cycles();
        assert_eq!(cycles.as_ref(), &vec![vec![a, b, c]]);
    }

    #[test]
    fn succeed_when_self_deadlock_trims_path() {
        // arrange / act: one function locks the unique global g twice
        let (_program, mut result) = analyze("test/scenario_self_deadlock.ssa");

        // assert: the second acquisition added no edge
        let g = class(&result, "g");
        assert_eq!(result.warnings, 1);
        assert!(!result.graph.has_edge(g, g));
        assert_eq!(result.graph.edge_count(), 1);
        assert!(result.graph.cycles().is_empty());
    }

    #[test]
    fn succeed_when_constant_branch_is_pruned() {
        // arrange / act: a known-true condition guards lock a, the dead
        // branch locks b
        let (_program, result) = analyze("test/scenario_branch_pruning.ssa");

        // assert: only the taken branch contributed
        let a = class(&result, "a");
        assert!(result.graph.has_edge(result.root_class, a));
        assert_eq!(result.intern.lookup("b"), None);
    }

    #[test]
    fn succeed_when_locking_across_system_stack_switch() {
        // arrange / act: lock x on the system stack, then y after the
        // switch back; both are held together
        let (_program, result) = analyze("test/scenario_system_stack.ssa");

        // assert
        let x = class(&result, "x");
        let y = class(&result, "y");
        assert!(result.graph.has_edge(x, y));
    }

    #[test]
    fn succeed_when_recursion_terminates() {
        // arrange / act: f locks and releases a, then calls itself; the
        // in-progress memo entry stops the recursion with no exit states
        let (_program, result) = analyze("test/scenario_recursion.ssa");

        // assert
        let a = class(&result, "a");
        assert!(result.graph.has_edge(result.root_class, a));
        assert_eq!(result.graph.edge_count(), 1);
    }

    #[test]
    fn succeed_when_scan_status_branches() {
        // arrange / act: lock a is only taken when castogscanstatus
        // succeeded, so the edge source is the pseudo-lock
        let (_program, result) = analyze("test/scenario_gscan.ssa");

        // assert
        let gscan = class(&result, "_Gscan");
        let a = class(&result, "a");
        assert!(result.graph.has_edge(result.root_class, gscan));
        assert!(result.graph.has_edge(gscan, a));
    }

    #[test]
    fn succeed_when_indirect_call_fans_out() {
        // arrange / act: main locks m, then calls through a register;
        // the call graph names f, which locks a
        let (_program, result) = analyze("test/scenario_indirect.ssa");

        // assert
        let m = class(&result, "m");
        let a = class(&result, "a");
        assert!(result.graph.has_edge(m, a));
    }

    #[test]
    fn succeed_when_morestack_walks_newstack() {
        // arrange / act: a function holding a triggers a stack grow;
        // newstack locks b
        let (_program, result) = analyze("test/scenario_morestack.ssa");

        // assert
        let a = class(&result, "a");
        let b = class(&result, "b");
        assert!(result.graph.has_edge(a, b));
    }

    #[test]
    fn succeed_when_release_rule_drops_lock_at_return() {
        // arrange
        let program = load_program("test/scenario_release_rule.ssa").expect("load");
        let entries = program.entries.clone();
        let mut analysis = Analysis::new(&program);
        analysis.add_release_rule("helper", "a");

        // act
        analysis.run(&entries).expect("analysis");
        let result = analysis.into_result();

        // assert: helper released a, so b is acquired with nothing held
        let a = class(&result, "a");
        let b = class(&result, "b");
        assert!(!result.graph.has_edge(a, b));
        assert!(result.graph.has_edge(result.root_class, b));
    }

    #[test]
    fn succeed_when_phi_binds_along_taken_edge() {
        // arrange / act: a phi merges two constants; the second branch
        // condition folds to the value supplied by the taken edge
        let (_program, result) = analyze("test/scenario_phi.ssa");

        // assert: only lock a is ever reachable
        assert!(result.intern.lookup("a").is_some());
        assert_eq!(result.intern.lookup("b"), None);
    }
}
