use crate::dynvalue::DynValue;
use crate::error::AnalysisError;
use crate::ssa::Literal;
use crate::walker::{Analysis, CallCtx, PathState};
use log::{debug, info, warn};
use std::collections::HashMap;

/// Pseudo-lock modeling the G scan bit taken by status CAS operations.
/// Non-unique: there is one per G.
pub const GSCAN_LABEL: &str = "_Gscan";

/// Special abstract semantics for one named runtime function, run in
/// lieu of walking the callee. A handler appends zero or more successor
/// path states; appending none trims the path, appending several
/// branches it.
pub type Handler =
    fn(&mut Analysis, &CallCtx, PathState, &mut Vec<PathState>) -> Result<(), AnalysisError>;

pub fn handler_table() -> HashMap<&'static str, Handler> {
    let mut table: HashMap<&'static str, Handler> = HashMap::new();
    table.insert("runtime.lock", handle_lock);
    table.insert("runtime.unlock", handle_unlock);
    table.insert("runtime.casgstatus", handle_casgstatus);
    table.insert("runtime.castogscanstatus", handle_castogscanstatus);
    table.insert("runtime.casfrom_Gscanstatus", handle_casfrom_gscanstatus);
    table.insert("runtime.restartg", handle_casfrom_gscanstatus);
    table.insert("runtime.getg", handle_getg);
    table.insert("runtime.acquirem", handle_acquirem);
    table.insert("runtime.presystemstack", handle_presystemstack);
    table.insert("runtime.postsystemstack", handle_postsystemstack);
    table.insert("runtime.morestack", handle_morestack);

    table
}

/// `runtime.lock(l)`: records an acquired-before edge from every held
/// lock to every class `l` may point to, then extends the lock set.
/// Re-acquiring a held unique class cannot succeed at runtime, so the
/// path is dropped with a warning.
fn handle_lock(
    analysis: &mut Analysis,
    ctx: &CallCtx,
    state: PathState,
    out: &mut Vec<PathState>,
) -> Result<(), AnalysisError> {
    let classes = match analysis.resolve_lock_classes(ctx, &state.vs) {
        Ok(classes) => classes,
        Err(error) => {
            info!("lock: {error}");
            analysis.warnings += 1;
            out.push(state);
            return Ok(());
        }
    };

    if classes.is_empty() {
        info!(
            "lock: empty points-to set in '{}' (line {})",
            analysis.program().function(ctx.func).name,
            ctx.line
        );
        analysis.warnings += 1;
        out.push(state);
        return Ok(());
    }

    for class in &classes {
        if state.locks.contains(*class) && analysis.intern.is_unique(*class) {
            warn!(
                "possible self-deadlock {} {}; trimming path",
                state.locks.display(&analysis.intern),
                analysis.intern.label(*class)
            );
            analysis.warnings += 1;
            return Ok(());
        }
    }

    let acquired = analysis.call_stack_here(ctx, "runtime.lock");
    analysis.record_acquire(&state.locks, &classes, acquired);
    out.push(PathState {
        locks: state.locks.plus(&classes, acquired),
        vs: state.vs,
    });

    Ok(())
}

/// `runtime.unlock(l)`: removes `l`'s points-to classes from the lock
/// set. An unresolvable argument leaves the set unchanged.
fn handle_unlock(
    analysis: &mut Analysis,
    ctx: &CallCtx,
    state: PathState,
    out: &mut Vec<PathState>,
) -> Result<(), AnalysisError> {
    match analysis.resolve_lock_classes(ctx, &state.vs) {
        Ok(classes) => {
            out.push(PathState {
                locks: state.locks.minus(&classes),
                vs: state.vs,
            });
        }
        Err(error) => {
            info!("unlock: {error}");
            analysis.warnings += 1;
            out.push(state);
        }
    }

    Ok(())
}

/// `runtime.casgstatus`: acquires and immediately releases the `_Gscan`
/// pseudo-lock. The edge is recorded; the lock set is unchanged.
fn handle_casgstatus(
    analysis: &mut Analysis,
    ctx: &CallCtx,
    state: PathState,
    out: &mut Vec<PathState>,
) -> Result<(), AnalysisError> {
    let gscan = analysis.intern.intern(GSCAN_LABEL, false);
    let acquired = analysis.call_stack_here(ctx, "runtime.casgstatus");
    analysis.record_acquire(&state.locks, &[gscan], acquired);
    out.push(state);

    Ok(())
}

/// `runtime.castogscanstatus`: records the `_Gscan` edge and branches
/// into a success state (pseudo-lock held, result `true`) and a failure
/// state (result `false`).
fn handle_castogscanstatus(
    analysis: &mut Analysis,
    ctx: &CallCtx,
    state: PathState,
    out: &mut Vec<PathState>,
) -> Result<(), AnalysisError> {
    let gscan = analysis.intern.intern(GSCAN_LABEL, false);
    let acquired = analysis.call_stack_here(ctx, "runtime.castogscanstatus");
    analysis.record_acquire(&state.locks, &[gscan], acquired);

    out.push(PathState {
        locks: state.locks.plus(&[gscan], acquired),
        vs: state.vs.bind(ctx.result, DynValue::Const(Literal::Bool(true))),
    });
    out.push(PathState {
        locks: state.locks.clone(),
        vs: state.vs.bind(ctx.result, DynValue::Const(Literal::Bool(false))),
    });

    Ok(())
}

/// `runtime.casfrom_Gscanstatus` and `runtime.restartg`: release the
/// `_Gscan` pseudo-lock.
fn handle_casfrom_gscanstatus(
    analysis: &mut Analysis,
    _ctx: &CallCtx,
    state: PathState,
    out: &mut Vec<PathState>,
) -> Result<(), AnalysisError> {
    out.push(PathState {
        locks: state.locks.minus_label(GSCAN_LABEL, &analysis.intern),
        vs: state.vs,
    });

    Ok(())
}

/// `runtime.getg`: the result is the current-G tracked heap value.
fn handle_getg(
    analysis: &mut Analysis,
    ctx: &CallCtx,
    state: PathState,
    out: &mut Vec<PathState>,
) -> Result<(), AnalysisError> {
    let current = state
        .vs
        .get_heap(analysis.curg)
        .cloned()
        .unwrap_or(DynValue::Unknown);
    out.push(PathState {
        locks: state.locks,
        vs: state.vs.bind(ctx.result, current),
    });

    Ok(())
}

/// `runtime.acquirem`: the result is the current-M tracked heap pointer.
fn handle_acquirem(
    analysis: &mut Analysis,
    ctx: &CallCtx,
    state: PathState,
    out: &mut Vec<PathState>,
) -> Result<(), AnalysisError> {
    out.push(PathState {
        locks: state.locks,
        vs: state
            .vs
            .bind(ctx.result, DynValue::HeapPtr(analysis.curm)),
    });

    Ok(())
}

/// `runtime.presystemstack`: returns the current G and switches the
/// current-G cell to the g0 sentinel.
fn handle_presystemstack(
    analysis: &mut Analysis,
    ctx: &CallCtx,
    state: PathState,
    out: &mut Vec<PathState>,
) -> Result<(), AnalysisError> {
    let saved = state
        .vs
        .get_heap(analysis.curg)
        .cloned()
        .unwrap_or(DynValue::Unknown);
    let vs = state
        .vs
        .bind(ctx.result, saved)
        .set_heap(analysis.curg, DynValue::HeapPtr(analysis.g0));
    out.push(PathState {
        locks: state.locks,
        vs,
    });

    Ok(())
}

/// `runtime.postsystemstack(g)`: restores the saved G into the
/// current-G cell.
fn handle_postsystemstack(
    analysis: &mut Analysis,
    ctx: &CallCtx,
    state: PathState,
    out: &mut Vec<PathState>,
) -> Result<(), AnalysisError> {
    let restored = ctx
        .args
        .first()
        .and_then(|arg| state.vs.get(*arg))
        .cloned()
        .unwrap_or(DynValue::Unknown);
    out.push(PathState {
        locks: state.locks,
        vs: state.vs.set_heap(analysis.curg, restored),
    });

    Ok(())
}

/// `runtime.morestack`: branches between the fast path (the stack was
/// big enough) and a recursive walk of `runtime.newstack` on g0, after
/// which the current G is restored.
fn handle_morestack(
    analysis: &mut Analysis,
    ctx: &CallCtx,
    state: PathState,
    out: &mut Vec<PathState>,
) -> Result<(), AnalysisError> {
    out.push(state.clone());

    let newstack = match analysis.program().lookup_function("runtime.newstack") {
        Some(newstack) => newstack,
        None => {
            debug!("morestack: module defines no runtime.newstack");
            return Ok(());
        }
    };

    let on_g0 = state
        .vs
        .set_heap(analysis.curg, DynValue::HeapPtr(analysis.g0));
    let exits = analysis.walk_named_call(ctx, "runtime.newstack", newstack, &state.locks, on_g0.limit_to_heap())?;

    // the caller's value state still holds the original G
    for exit in exits.iter() {
        out.push(PathState {
            locks: exit.clone(),
            vs: state.vs.clone(),
        });
    }

    Ok(())
}
