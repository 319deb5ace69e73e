pub mod ast;
pub mod config;
pub mod errors;
pub mod interp;
pub mod lexer;
pub mod naming;
pub mod obfuscator;
pub mod parser;
pub mod passes;
pub mod printer;

pub use ast::Program;
pub use config::{
    IdentityStrategy, LoopStrategy, NumberSchemeKind, ObfuscatorConfig,
};
pub use errors::{ObfuscateError, ParseError};
pub use interp::{EvalError, Interpreter, Value};
pub use naming::NameRegistry;
pub use obfuscator::Obfuscator;
pub use passes::{ObfuscationPass, PassContext};
