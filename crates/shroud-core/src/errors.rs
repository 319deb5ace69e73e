use thiserror::Error;

/// Error surfaced by the obfuscation pipeline.
///
/// Transformation passes themselves never fail on well-formed trees; any node
/// shape a pass does not recognize is passed through unchanged. The variants
/// here come from the collaborators at the pipeline boundary (parsing input
/// text, evaluating programs during verification, loading configuration).
#[derive(Debug, Error)]
pub enum ObfuscateError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] crate::interp::EvalError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
#[error("parse error at line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        ParseError {
            line,
            message: message.into(),
        }
    }
}
