use crate::intern::{ClassId, InternTable};
use crate::lockgraph::{LockOrder, Witness};
use crate::ssa::Program;
use crate::stack::{CallSite, StackArena};
use crate::walker::AnalysisResult;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write as FmtWrite;
use std::io;
use std::io::Write;
use std::sync::Arc;

/// Paths shown per edge unless the verbose flag asks for all of them.
const WITNESS_PREVIEW: usize = 3;

/// Renders the lock graph: the textual cycle report, the GraphViz
/// description, and the JSON witness side-car for the HTML adapter.
pub struct Report<'a> {
    prog: &'a Program,
    intern: &'a InternTable,
    stacks: &'a StackArena,
    graph: &'a LockOrder,
    cycles: Arc<Vec<Vec<ClassId>>>,
    cycle_edges: BTreeSet<(ClassId, ClassId)>,
}

impl<'a> Report<'a> {
    pub fn new(prog: &'a Program, result: &'a mut AnalysisResult) -> Report<'a> {
        let cycles = result.graph.cycles();
        let cycle_edges = result.graph.cycle_edges();

        Report {
            prog,
            intern: &result.intern,
            stacks: &result.stacks,
            graph: &result.graph,
            cycles,
            cycle_edges,
        }
    }

    pub fn cycle_count(&self) -> usize {
        self.cycles.len()
    }

    /// Writes the textual cycle report: one header per cycle, then each
    /// edge with its witnessing paths and source positions.
    pub fn write_text(&self, out: &mut dyn Write, verbose: bool) -> io::Result<()> {
        for cycle in self.cycles.iter() {
            let mut labels: Vec<&str> = cycle.iter().map(|class| self.intern.label(*class)).collect();
            labels.push(self.intern.label(cycle[0]));
            writeln!(out, "lock cycle: {}", labels.join(" → "))?;

            for index in 0..cycle.len() {
                let from = cycle[index];
                let to = cycle[(index + 1) % cycle.len()];
                let witnesses = match self.graph.witnesses(from, to) {
                    Some(witnesses) => witnesses,
                    None => continue,
                };

                writeln!(
                    out,
                    "  {} → {} ({} path{}):",
                    self.intern.label(from),
                    self.intern.label(to),
                    witnesses.len(),
                    if witnesses.len() == 1 { "" } else { "s" }
                )?;

                for (count, witness) in witnesses.iter().enumerate() {
                    if !verbose && count >= WITNESS_PREVIEW {
                        writeln!(
                            out,
                            "    … and {} more paths",
                            witnesses.len() - WITNESS_PREVIEW
                        )?;
                        break;
                    }
                    self.write_witness(out, from, to, witness)?;
                }
            }

            writeln!(out)?;
        }

        Ok(())
    }

    /// One witness: the root function, the call chain to the first
    /// acquisition, and the call chain to the second.
    fn write_witness(
        &self,
        out: &mut dyn Write,
        from: ClassId,
        to: ClassId,
        witness: &Witness,
    ) -> io::Result<()> {
        let from_sites = self.stacks.flatten(witness.from);
        let to_sites = self.stacks.flatten(witness.to);

        let root = from_sites.first().or_else(|| to_sites.first());
        if let Some(site) = root {
            writeln!(out, "    {}", self.prog.function(site.caller).name)?;
        }

        self.write_chain(out, &from_sites, from)?;
        self.write_chain(out, &to_sites, to)?;

        Ok(())
    }

    fn write_chain(
        &self,
        out: &mut dyn Write,
        sites: &[CallSite],
        acquires: ClassId,
    ) -> io::Result<()> {
        if sites.is_empty() {
            return Ok(());
        }

        for site in &sites[..sites.len() - 1] {
            writeln!(
                out,
                "      {}:{}: calls {}",
                self.prog.file, site.line, site.callee
            )?;
        }
        let last = &sites[sites.len() - 1];
        writeln!(
            out,
            "      {}:{}: acquires {}",
            self.prog.file,
            last.line,
            self.intern.label(acquires)
        )?;

        Ok(())
    }

    /// GraphViz description of the whole lock graph. Node IDs are class
    /// IDs; edges on a cycle are red with a weight proportional to their
    /// witness count.
    pub fn render_dot(&self) -> String {
        let mut dot = String::new();
        writeln!(&mut dot, "digraph lockgraph {{").unwrap();

        let mut nodes = BTreeSet::new();
        for (from, to, _) in self.graph.edges() {
            nodes.insert(from);
            nodes.insert(to);
        }
        for node in &nodes {
            writeln!(
                &mut dot,
                "    L{} [label=\"{}\"];",
                node.0,
                escape(self.intern.label(*node))
            )
            .unwrap();
        }

        for (from, to, witnesses) in self.graph.edges() {
            if self.cycle_edges.contains(&(from, to)) {
                writeln!(
                    &mut dot,
                    "    L{} -> L{} [label=\"{}\", color=\"red\", penwidth=\"{}\"];",
                    from.0,
                    to.0,
                    witnesses.len(),
                    1 + witnesses.len()
                )
                .unwrap();
            } else {
                writeln!(
                    &mut dot,
                    "    L{} -> L{} [label=\"{}\"];",
                    from.0,
                    to.0,
                    witnesses.len()
                )
                .unwrap();
            }
        }

        writeln!(&mut dot, "}}").unwrap();

        dot
    }

    /// JSON side-car describing every edge's witnesses, consumed by the
    /// HTML report's side panel.
    pub fn witnesses_json(&self) -> String {
        let edges: Vec<EdgeJson> = self
            .graph
            .edges()
            .map(|(from, to, witnesses)| EdgeJson {
                from: self.intern.label(from).to_string(),
                to: self.intern.label(to).to_string(),
                on_cycle: self.cycle_edges.contains(&(from, to)),
                witnesses: witnesses
                    .iter()
                    .map(|witness| WitnessJson {
                        from_stack: self.frames(witness.from),
                        to_stack: self.frames(witness.to),
                    })
                    .collect(),
            })
            .collect();

        serde_json::to_string_pretty(&edges).unwrap()
    }

    fn frames(&self, stack: crate::stack::Stack) -> Vec<String> {
        self.stacks
            .flatten(stack)
            .iter()
            .map(|site| {
                format!(
                    "{} ({}:{}) calls {}",
                    self.prog.function(site.caller).name,
                    self.prog.file,
                    site.line,
                    site.callee
                )
            })
            .collect()
    }
}

fn escape(label: &str) -> String {
    label.replace('"', "\\\"")
}

#[derive(Serialize)]
struct EdgeJson {
    from: String,
    to: String,
    on_cycle: bool,
    witnesses: Vec<WitnessJson>,
}

#[derive(Serialize)]
struct WitnessJson {
    from_stack: Vec<String>,
    to_stack: Vec<String>,
}
