use crate::error::AnalysisError;
use crate::lexer::Token;
use crate::ssa::{BinOp, UnOp};
use peg::parser;

/// Name-based abstract syntax of one SSA module, as written in the input
/// file. Register, block, and function references are still strings here;
/// `ssa::resolve_module` turns them into dense indices.
#[derive(Debug, Default, PartialEq)]
pub struct Module {
    pub entries: Vec<String>,
    pub globals: Vec<String>,
    pub functions: Vec<RawFunction>,
    pub points_to: Vec<RawPointsTo>,
    pub call_graph: Vec<RawCallEdge>,
}

#[derive(Debug, PartialEq)]
pub struct RawFunction {
    pub name: String,
    pub params: Vec<String>,
    pub blocks: Vec<RawBlock>,
    pub line: usize,
}

#[derive(Debug, PartialEq)]
pub struct RawBlock {
    pub label: String,
    pub instrs: Vec<RawInstr>,
    pub term: RawTerm,
    pub term_line: usize,
}

#[derive(Debug, PartialEq)]
pub struct RawInstr {
    pub result: Option<String>,
    pub kind: RawInstrKind,
    pub line: usize,
}

#[derive(Debug, PartialEq)]
pub enum RawInstrKind {
    Const(RawLit),
    Global(String),
    FieldAddr { base: String, field: String },
    BinOp { op: BinOp, lhs: String, rhs: String },
    UnOp { op: UnOp, operand: String },
    ChangeType(String),
    Phi(Vec<(String, String)>),
    Call { callee: RawCallee, args: Vec<String> },
    Store { addr: String, value: String },
}

#[derive(Debug, PartialEq)]
pub enum RawLit {
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    Nil,
}

#[derive(Debug, PartialEq)]
pub enum RawCallee {
    Named(String),
    Register(String),
}

#[derive(Debug, PartialEq)]
pub enum RawTerm {
    Ret(Option<String>),
    Br(String),
    CondBr {
        cond: String,
        then_label: String,
        else_label: String,
    },
}

#[derive(Debug, PartialEq)]
pub struct RawPointsTo {
    pub function: String,
    pub value: String,
    pub labels: Vec<(String, bool)>,
    pub line: usize,
}

#[derive(Debug, PartialEq)]
pub struct RawCallEdge {
    pub function: String,
    pub value: String,
    pub targets: Vec<String>,
    pub line: usize,
}

enum Item {
    Entry(String),
    Global(String),
    Function(RawFunction),
    PointsTo(Vec<RawPointsTo>),
    CallGraph(Vec<RawCallEdge>),
}

parser!(
    pub grammar module_grammar<'a>(lines: &'a [usize]) for [Token<'a>] {
        use crate::lexer::Token::*;

        pub rule module() -> Module
            = items:item()* {
                let mut module = Module::default();

                for item in items {
                    match item {
                        Item::Entry(name) => module.entries.push(name),
                        Item::Global(name) => module.globals.push(name),
                        Item::Function(function) => module.functions.push(function),
                        Item::PointsTo(entries) => module.points_to.extend(entries),
                        Item::CallGraph(entries) => module.call_graph.extend(entries),
                    }
                }

                module
            }

        rule item() -> Item
            = [Entry] name:identifier() { Item::Entry(name.to_string()) }
            / [Global] name:identifier() { Item::Global(name.to_string()) }
            / function:function() { Item::Function(function) }
            / entries:points_to_section() { Item::PointsTo(entries) }
            / entries:call_graph_section() { Item::CallGraph(entries) }

        rule function() -> RawFunction
            = p:position!() [Fn] name:identifier() [LeftParenthesis] params:(register() ** [Comma]) [RightParenthesis] blocks:body()? {
                RawFunction {
                    name: name.to_string(),
                    params: params.into_iter().map(str::to_string).collect(),
                    blocks: blocks.unwrap_or_default(),
                    line: lines[p],
                }
            }

        rule body() -> Vec<RawBlock>
            = [LeftBrace] blocks:block()* [RightBrace] { blocks }

        rule block() -> RawBlock
            = label:identifier() [Colon] instrs:instruction()* term:terminator() {
                RawBlock {
                    label: label.to_string(),
                    instrs,
                    term: term.0,
                    term_line: term.1,
                }
            }

        rule instruction() -> RawInstr
            = p:position!() [Store] addr:register() value:register() {
                RawInstr {
                    result: None,
                    kind: RawInstrKind::Store { addr: addr.to_string(), value: value.to_string() },
                    line: lines[p],
                }
            }
            / p:position!() [Register(result)] [Assign] kind:right_hand_side() {
                RawInstr {
                    result: Some(result.to_string()),
                    kind,
                    line: lines[p],
                }
            }

        rule right_hand_side() -> RawInstrKind
            = [Const] literal:literal() { RawInstrKind::Const(literal) }
            / [Global] name:identifier() { RawInstrKind::Global(name.to_string()) }
            / [FieldAddr] base:register() field:identifier() {
                RawInstrKind::FieldAddr { base: base.to_string(), field: field.to_string() }
            }
            / [ChangeType] operand:register() { RawInstrKind::ChangeType(operand.to_string()) }
            / [Phi] [LeftSquareBracket] edges:(phi_edge() ** [Comma]) [RightSquareBracket] {
                RawInstrKind::Phi(edges)
            }
            / [Call] callee:callee() [LeftParenthesis] args:(register() ** [Comma]) [RightParenthesis] {
                RawInstrKind::Call { callee, args: args.into_iter().map(str::to_string).collect() }
            }
            / lhs:register() op:binary_operator() rhs:register() {
                RawInstrKind::BinOp { op, lhs: lhs.to_string(), rhs: rhs.to_string() }
            }
            / [Minus] operand:register() { RawInstrKind::UnOp { op: UnOp::Neg, operand: operand.to_string() } }
            / [Bang] operand:register() { RawInstrKind::UnOp { op: UnOp::Not, operand: operand.to_string() } }
            / [Star] operand:register() { RawInstrKind::UnOp { op: UnOp::Deref, operand: operand.to_string() } }

        rule terminator() -> (RawTerm, usize)
            = p:position!() [Ret] value:register()? { (RawTerm::Ret(value.map(str::to_string)), lines[p]) }
            / p:position!() [Br] cond:register() then_label:identifier() else_label:identifier() {
                (
                    RawTerm::CondBr {
                        cond: cond.to_string(),
                        then_label: then_label.to_string(),
                        else_label: else_label.to_string(),
                    },
                    lines[p],
                )
            }
            / p:position!() [Br] target:identifier() { (RawTerm::Br(target.to_string()), lines[p]) }

        rule literal() -> RawLit
            = [Integer(value)] { RawLit::Int(value) }
            / [Float(value)] { RawLit::Float(value) }
            / [True] { RawLit::Bool(true) }
            / [False] { RawLit::Bool(false) }
            / [Nil] { RawLit::Nil }
            / [Str(value)] { RawLit::Str(value.to_string()) }

        rule binary_operator() -> BinOp
            = [Plus] { BinOp::Add }
            / [Minus] { BinOp::Sub }
            / [Star] { BinOp::Mul }
            / [Slash] { BinOp::Div }
            / [Rem] { BinOp::Rem }
            / [Ampersand] { BinOp::And }
            / [Pipe] { BinOp::Or }
            / [Caret] { BinOp::Xor }
            / [ShiftLeft] { BinOp::Shl }
            / [ShiftRight] { BinOp::Shr }
            / [EqualEqual] { BinOp::Eq }
            / [NotEqual] { BinOp::Ne }
            / [LessEqual] { BinOp::Le }
            / [Less] { BinOp::Lt }
            / [GreaterEqual] { BinOp::Ge }
            / [Greater] { BinOp::Gt }

        rule phi_edge() -> (String, String)
            = block:identifier() [Colon] value:register() { (block.to_string(), value.to_string()) }

        rule callee() -> RawCallee
            = name:identifier() { RawCallee::Named(name.to_string()) }
            / value:register() { RawCallee::Register(value.to_string()) }

        rule points_to_section() -> Vec<RawPointsTo>
            = [PointsTo] [LeftBrace] entries:points_to_entry()* [RightBrace] { entries }

        rule points_to_entry() -> RawPointsTo
            = p:position!() function:identifier() value:register() [Colon] labels:(points_to_label() ** [Comma]) {
                RawPointsTo {
                    function: function.to_string(),
                    value: value.to_string(),
                    labels,
                    line: lines[p],
                }
            }

        rule points_to_label() -> (String, bool)
            = label:identifier() unique:([Unique])? { (label.to_string(), unique.is_some()) }

        rule call_graph_section() -> Vec<RawCallEdge>
            = [CallGraph] [LeftBrace] entries:call_graph_entry()* [RightBrace] { entries }

        rule call_graph_entry() -> RawCallEdge
            = p:position!() function:identifier() value:register() [Colon] targets:(identifier() ** [Comma]) {
                RawCallEdge {
                    function: function.to_string(),
                    value: value.to_string(),
                    targets: targets.into_iter().map(str::to_string).collect(),
                    line: lines[p],
                }
            }

        rule register() -> &'a str
            = [Register(name)] { name }

        rule identifier() -> &'a str
            = [Identifier(name)] { name }
    }
);

pub fn parse_module<'a>(
    tokens: &'a [Token<'a>],
    lines: &'a [usize],
) -> Result<Module, AnalysisError> {
    module_grammar::module(tokens, lines).map_err(AnalysisError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize_module;
    use std::fs::read_to_string;

    #[test]
    fn succeed_when_parsing_valid_module() -> Result<(), AnalysisError> {
        // arrange
        let input = read_to_string("test/valid_module.ssa")?;
        let (tokens, lines) = tokenize_module(&input)?;

        // act
        let module = parse_module(&tokens, &lines)?;

        // assert
        assert_eq!(module.entries, vec!["main".to_string()]);
        assert_eq!(module.globals, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.functions[0].name, "main");
        assert_eq!(module.functions[0].blocks.len(), 1);
        assert_eq!(module.functions[0].blocks[0].instrs.len(), 6);

        Ok(())
    }

    #[test]
    fn succeed_when_parsing_sections() -> Result<(), AnalysisError> {
        // arrange
        let input = "fn f(%p) pointsto { f %p: sync.Mutex.mu, g unique } callgraph { }";
        let (tokens, lines) = tokenize_module(input)?;

        // act
        let module = parse_module(&tokens, &lines)?;

        // assert
        assert_eq!(module.points_to.len(), 1);
        assert_eq!(
            module.points_to[0].labels,
            vec![
                ("sync.Mutex.mu".to_string(), false),
                ("g".to_string(), true)
            ]
        );
        assert!(module.call_graph.is_empty());

        Ok(())
    }

    #[test]
    fn fail_when_parsing_invalid_tokens() -> Result<(), AnalysisError> {
        // arrange
        let input = "fn f %p";
        let (tokens, lines) = tokenize_module(input)?;

        // act
        let error = parse_module(&tokens, &lines).unwrap_err();

        // assert
        assert!(match error {
            AnalysisError::ParserError(inner) => {
                assert_eq!(inner.location, 2);

                true
            }
            _ => false,
        });

        Ok(())
    }
}
