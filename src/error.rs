use peg::error::ParseError;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::io::Error as IOError;

#[derive(Debug)]
pub enum AnalysisError {
    /// A pointer handed to a lock operation is neither a global, a field
    /// of a global, nor covered by the points-to oracle. Recoverable: the
    /// lock handler logs it and leaves the lock set unchanged.
    UnresolvedLockClass {
        function: String,
        value: String,
        line: usize,
    },
    /// A name in the module could not be resolved (duplicate definition,
    /// unknown register, unknown block label, unknown function).
    Resolve { message: String, line: usize },
    /// The control-flow liveness walk for a function did not converge.
    /// Fatal; carries the function's SSA dump for diagnosis.
    ControlFlowLiveness { function: String, dump: String },
    /// The module declares no entry point and none was given on the
    /// command line.
    NoEntryPoints,
    // wrapped errors
    IOError(IOError),
    LexerError { error: LexerError, line: usize },
    ParserError(ParseError<usize>),
}

impl Error for AnalysisError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AnalysisError::IOError(error) => Some(error),
            AnalysisError::LexerError { error, .. } => Some(error),
            AnalysisError::ParserError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for AnalysisError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let description = match self {
            AnalysisError::UnresolvedLockClass {
                function,
                value,
                line,
            } => {
                format!("cannot find lock class of '{value}' in function '{function}' (line {line}): value is not a global or field-of-global expression and has no points-to entry")
            }
            AnalysisError::Resolve { message, line } => {
                format!("cannot resolve module at line {line}: {message}")
            }
            AnalysisError::ControlFlowLiveness { function, dump } => {
                format!("control-flow liveness did not converge for function '{function}'; SSA follows\n{dump}")
            }
            AnalysisError::NoEntryPoints => {
                "module declares no entry point and none was given with --entry".to_string()
            }
            AnalysisError::IOError(error) => {
                format!("analyzer encountered an error while performing I/O operations: {error}")
            }
            AnalysisError::LexerError { error, line } => {
                format!("analyzer encountered an error while lexing line {line}: {error}")
            }
            AnalysisError::ParserError(error) => {
                format!(
                    "analyzer encountered a parser error at token '{}': {}",
                    error.location, error.expected
                )
            }
        };

        write!(f, "{}", description)
    }
}

impl From<IOError> for AnalysisError {
    fn from(error: IOError) -> Self {
        AnalysisError::IOError(error)
    }
}

impl From<ParseError<usize>> for AnalysisError {
    fn from(error: ParseError<usize>) -> Self {
        AnalysisError::ParserError(error)
    }
}

#[derive(Default, Debug, Clone, PartialEq)]
pub enum LexerError {
    #[default]
    UnexpectedCharacter,
}

impl Display for LexerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LexerError::UnexpectedCharacter => {
                write!(f, "logos encountered an unexpected character")
            }
        }
    }
}

impl Error for LexerError {}
