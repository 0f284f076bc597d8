use crate::error::AnalysisError;
use crate::lexer::tokenize_module;
use crate::parser::{
    parse_module, Module, RawCallee, RawInstrKind, RawLit, RawTerm,
};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;

/// Dense handles into the resolved program. Blocks and values are
/// numbered per function, functions and globals per module.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
    Deref,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    Nil,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    /// Direct call. `func` is present when the module defines the name;
    /// calls to undefined names are still meaningful because the handler
    /// table dispatches on the name alone.
    Named { name: String, func: Option<FuncId> },
    /// Indirect call through an SSA value; possible targets come from the
    /// external call graph, keyed by the call's result register.
    Indirect(ValueId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstrKind {
    Const(Literal),
    Global(GlobalId),
    FieldAddr { base: ValueId, field: String },
    BinOp { op: BinOp, lhs: ValueId, rhs: ValueId },
    UnOp { op: UnOp, operand: ValueId },
    ChangeType(ValueId),
    Phi(Vec<(BlockId, ValueId)>),
    Call { callee: Callee, args: Vec<ValueId> },
    Store { addr: ValueId, value: ValueId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    /// Result register; `None` only for stores.
    pub result: Option<ValueId>,
    pub kind: InstrKind,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Ret(Option<ValueId>),
    Br(BlockId),
    CondBr {
        cond: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub label: String,
    pub instrs: Vec<Instr>,
    pub term: Terminator,
    pub term_line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<ValueId>,
    /// Register names indexed by `ValueId`, for diagnostics and dumps.
    pub value_names: Vec<String>,
    /// Empty for external functions.
    pub blocks: Vec<Block>,
}

impl Function {
    pub fn is_external(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn value_name(&self, value: ValueId) -> &str {
        &self.value_names[value.0 as usize]
    }

    pub fn block(&self, block: BlockId) -> &Block {
        &self.blocks[block.0 as usize]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: String,
}

/// A lock-class label produced by the points-to oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct PointsToLabel {
    pub label: String,
    pub is_unique: bool,
}

/// The resolved SSA program together with the externally supplied call
/// graph and points-to oracle. This is the whole input of the walker.
#[derive(Debug)]
pub struct Program {
    pub file: String,
    pub functions: Vec<Function>,
    pub globals: Vec<Global>,
    pub entries: Vec<FuncId>,
    pub points_to: HashMap<(FuncId, ValueId), Vec<PointsToLabel>>,
    pub call_graph: HashMap<(FuncId, ValueId), Vec<FuncId>>,
    func_index: HashMap<String, FuncId>,
}

impl Program {
    pub fn function(&self, func: FuncId) -> &Function {
        &self.functions[func.0 as usize]
    }

    pub fn global(&self, global: GlobalId) -> &Global {
        &self.globals[global.0 as usize]
    }

    pub fn lookup_function(&self, name: &str) -> Option<FuncId> {
        self.func_index.get(name).copied()
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let params = self
            .params
            .iter()
            .map(|p| format!("%{}", self.value_name(*p)))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "fn {}({}) {{", self.name, params)?;

        for block in &self.blocks {
            writeln!(f, "{}:", block.label)?;

            for instr in &block.instrs {
                let result = match instr.result {
                    Some(value) => format!("%{} = ", self.value_name(value)),
                    None => String::new(),
                };
                writeln!(f, "  {}{:?}", result, instr.kind)?;
            }

            writeln!(f, "  {:?}", block.term)?;
        }

        writeln!(f, "}}")
    }
}

struct FunctionResolver<'m> {
    name: &'m str,
    value_ids: HashMap<&'m str, ValueId>,
    block_ids: HashMap<&'m str, BlockId>,
}

impl<'m> FunctionResolver<'m> {
    fn value(&self, register: &str, line: usize) -> Result<ValueId, AnalysisError> {
        self.value_ids
            .get(register)
            .copied()
            .ok_or_else(|| AnalysisError::Resolve {
                message: format!("unknown register '%{register}' in function '{}'", self.name),
                line,
            })
    }

    fn block(&self, label: &str, line: usize) -> Result<BlockId, AnalysisError> {
        self.block_ids
            .get(label)
            .copied()
            .ok_or_else(|| AnalysisError::Resolve {
                message: format!("unknown block '{label}' in function '{}'", self.name),
                line,
            })
    }
}

/// Resolves a parsed module into a `Program`, checking single assignment,
/// register and label references, and the cross-references of the
/// `pointsto`/`callgraph` sections.
pub fn resolve_module(module: Module, file: String) -> Result<Program, AnalysisError> {
    let mut globals = Vec::new();
    let mut global_index = HashMap::new();

    for name in &module.globals {
        if global_index
            .insert(name.clone(), GlobalId(globals.len() as u32))
            .is_some()
        {
            return Err(AnalysisError::Resolve {
                message: format!("duplicate global '{name}'"),
                line: 0,
            });
        }
        globals.push(Global { name: name.clone() });
    }

    let mut func_index = HashMap::new();

    for (index, function) in module.functions.iter().enumerate() {
        if func_index
            .insert(function.name.clone(), FuncId(index as u32))
            .is_some()
        {
            return Err(AnalysisError::Resolve {
                message: format!("duplicate function '{}'", function.name),
                line: function.line,
            });
        }
    }

    let mut functions = Vec::new();

    for raw in &module.functions {
        // collect every register and block label before translating
        // bodies, so phis may reference forward definitions
        let mut resolver = FunctionResolver {
            name: &raw.name,
            value_ids: HashMap::new(),
            block_ids: HashMap::new(),
        };
        let mut value_names = Vec::new();
        let mut params = Vec::new();

        for param in &raw.params {
            let id = ValueId(value_names.len() as u32);
            if resolver.value_ids.insert(param.as_str(), id).is_some() {
                return Err(AnalysisError::Resolve {
                    message: format!("duplicate parameter '%{param}' in function '{}'", raw.name),
                    line: raw.line,
                });
            }
            value_names.push(param.clone());
            params.push(id);
        }

        for block in &raw.blocks {
            let next_block = BlockId(resolver.block_ids.len() as u32);
            if resolver
                .block_ids
                .insert(block.label.as_str(), next_block)
                .is_some()
            {
                return Err(AnalysisError::Resolve {
                    message: format!("duplicate block '{}' in function '{}'", block.label, raw.name),
                    line: block.term_line,
                });
            }

            for instr in &block.instrs {
                if let Some(result) = &instr.result {
                    let id = ValueId(value_names.len() as u32);
                    if resolver.value_ids.insert(result.as_str(), id).is_some() {
                        return Err(AnalysisError::Resolve {
                            message: format!(
                                "register '%{result}' assigned twice in function '{}'",
                                raw.name
                            ),
                            line: instr.line,
                        });
                    }
                    value_names.push(result.clone());
                }
            }
        }

        let mut blocks = Vec::new();

        for block in &raw.blocks {
            let mut instrs = Vec::new();

            for instr in &block.instrs {
                let line = instr.line;
                let kind = match &instr.kind {
                    RawInstrKind::Const(literal) => InstrKind::Const(match literal {
                        RawLit::Bool(value) => Literal::Bool(*value),
                        RawLit::Int(value) => Literal::Int(*value),
                        RawLit::Float(value) => Literal::Float(*value),
                        RawLit::Str(value) => Literal::Str(value.clone()),
                        RawLit::Nil => Literal::Nil,
                    }),
                    RawInstrKind::Global(name) => {
                        let id = global_index.get(name).copied().ok_or_else(|| {
                            AnalysisError::Resolve {
                                message: format!("unknown global '{name}'"),
                                line,
                            }
                        })?;
                        InstrKind::Global(id)
                    }
                    RawInstrKind::FieldAddr { base, field } => InstrKind::FieldAddr {
                        base: resolver.value(base, line)?,
                        field: field.clone(),
                    },
                    RawInstrKind::BinOp { op, lhs, rhs } => InstrKind::BinOp {
                        op: *op,
                        lhs: resolver.value(lhs, line)?,
                        rhs: resolver.value(rhs, line)?,
                    },
                    RawInstrKind::UnOp { op, operand } => InstrKind::UnOp {
                        op: *op,
                        operand: resolver.value(operand, line)?,
                    },
                    RawInstrKind::ChangeType(operand) => {
                        InstrKind::ChangeType(resolver.value(operand, line)?)
                    }
                    RawInstrKind::Phi(edges) => {
                        let mut resolved = Vec::new();
                        for (label, register) in edges {
                            resolved.push((
                                resolver.block(label, line)?,
                                resolver.value(register, line)?,
                            ));
                        }
                        InstrKind::Phi(resolved)
                    }
                    RawInstrKind::Call { callee, args } => {
                        let callee = match callee {
                            RawCallee::Named(name) => Callee::Named {
                                name: name.clone(),
                                func: func_index.get(name).copied(),
                            },
                            RawCallee::Register(register) => {
                                Callee::Indirect(resolver.value(register, line)?)
                            }
                        };
                        let mut resolved = Vec::new();
                        for arg in args {
                            resolved.push(resolver.value(arg, line)?);
                        }
                        InstrKind::Call {
                            callee,
                            args: resolved,
                        }
                    }
                    RawInstrKind::Store { addr, value } => InstrKind::Store {
                        addr: resolver.value(addr, line)?,
                        value: resolver.value(value, line)?,
                    },
                };

                instrs.push(Instr {
                    result: instr
                        .result
                        .as_ref()
                        .map(|name| resolver.value_ids[name.as_str()]),
                    kind,
                    line,
                });
            }

            let term_line = block.term_line;
            let term = match &block.term {
                RawTerm::Ret(value) => Terminator::Ret(match value {
                    Some(register) => Some(resolver.value(register, term_line)?),
                    None => None,
                }),
                RawTerm::Br(target) => Terminator::Br(resolver.block(target, term_line)?),
                RawTerm::CondBr {
                    cond,
                    then_label,
                    else_label,
                } => Terminator::CondBr {
                    cond: resolver.value(cond, term_line)?,
                    then_block: resolver.block(then_label, term_line)?,
                    else_block: resolver.block(else_label, term_line)?,
                },
            };

            blocks.push(Block {
                label: block.label.clone(),
                instrs,
                term,
                term_line,
            });
        }

        functions.push(Function {
            name: raw.name.clone(),
            params,
            value_names,
            blocks,
        });
    }

    let lookup_func = |name: &str, line: usize| -> Result<FuncId, AnalysisError> {
        func_index
            .get(name)
            .copied()
            .ok_or_else(|| AnalysisError::Resolve {
                message: format!("unknown function '{name}'"),
                line,
            })
    };

    let mut entries = Vec::new();
    for name in &module.entries {
        entries.push(lookup_func(name, 0)?);
    }

    let lookup_value =
        |functions: &[Function], func: FuncId, register: &str, line: usize| -> Result<ValueId, AnalysisError> {
            let function = &functions[func.0 as usize];
            function
                .value_names
                .iter()
                .position(|name| name == register)
                .map(|index| ValueId(index as u32))
                .ok_or_else(|| AnalysisError::Resolve {
                    message: format!(
                        "unknown register '%{register}' in function '{}'",
                        function.name
                    ),
                    line,
                })
        };

    let mut points_to: HashMap<(FuncId, ValueId), Vec<PointsToLabel>> = HashMap::new();
    for entry in &module.points_to {
        let func = lookup_func(&entry.function, entry.line)?;
        let value = lookup_value(&functions, func, &entry.value, entry.line)?;
        let labels = entry
            .labels
            .iter()
            .map(|(label, is_unique)| PointsToLabel {
                label: label.clone(),
                is_unique: *is_unique,
            })
            .collect();
        points_to.insert((func, value), labels);
    }

    let mut call_graph: HashMap<(FuncId, ValueId), Vec<FuncId>> = HashMap::new();
    for entry in &module.call_graph {
        let func = lookup_func(&entry.function, entry.line)?;
        let value = lookup_value(&functions, func, &entry.value, entry.line)?;
        let mut targets = Vec::new();
        for target in &entry.targets {
            targets.push(lookup_func(target, entry.line)?);
        }
        call_graph.insert((func, value), targets);
    }

    Ok(Program {
        file,
        functions,
        globals,
        entries,
        points_to,
        call_graph,
        func_index,
    })
}

/// Reads, tokenizes, parses, and resolves an SSA module file.
pub fn load_program<P: AsRef<Path>>(path: P) -> Result<Program, AnalysisError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path)?;
    let (tokens, lines) = tokenize_module(&source)?;
    let module = parse_module(&tokens, &lines)?;
    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    resolve_module(module, file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_source(source: &str) -> Result<Program, AnalysisError> {
        let (tokens, lines) = tokenize_module(source)?;
        let module = parse_module(&tokens, &lines)?;
        resolve_module(module, "inline.ssa".to_string())
    }

    #[test]
    fn succeed_when_resolving_valid_module() -> Result<(), AnalysisError> {
        // arrange
        let program = load_program("test/valid_module.ssa")?;

        // act
        let main = program.lookup_function("main");

        // assert
        assert_eq!(main, Some(FuncId(0)));
        assert_eq!(program.entries, vec![FuncId(0)]);
        assert_eq!(program.globals.len(), 2);
        assert!(!program.function(FuncId(0)).is_external());

        Ok(())
    }

    #[test]
    fn succeed_when_resolving_phi_forward_reference() -> Result<(), AnalysisError> {
        // arrange
        let source = "fn f(%p) {\nb0:\n  br b1\nb1:\n  %x = phi [b0: %p, b2: %y]\n  br b2\nb2:\n  %y = changetype %x\n  ret\n}";

        // act
        let program = resolve_source(source)?;

        // assert
        let function = program.function(FuncId(0));
        assert_eq!(function.blocks.len(), 3);
        assert_eq!(
            function.blocks[1].instrs[0].kind,
            InstrKind::Phi(vec![(BlockId(0), ValueId(0)), (BlockId(2), ValueId(2))])
        );

        Ok(())
    }

    #[test]
    fn fail_when_register_assigned_twice() {
        // arrange
        let source = "fn f() {\nb0:\n  %x = const 1\n  %x = const 2\n  ret\n}";

        // act
        let error = resolve_source(source).unwrap_err();

        // assert
        assert!(match error {
            AnalysisError::Resolve { message, line } => {
                assert!(message.contains("assigned twice"));
                assert_eq!(line, 4);

                true
            }
            _ => false,
        });
    }

    #[test]
    fn fail_when_branching_to_unknown_block() {
        // arrange
        let source = "fn f() {\nb0:\n  br b9\n}";

        // act
        let error = resolve_source(source).unwrap_err();

        // assert
        assert!(match error {
            AnalysisError::Resolve { message, .. } => {
                assert!(message.contains("unknown block"));

                true
            }
            _ => false,
        });
    }
}
