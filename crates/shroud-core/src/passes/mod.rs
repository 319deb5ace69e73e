use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::ast::Program;
use crate::errors::ObfuscateError;
use crate::naming::NameRegistry;

pub mod conditional;
pub mod identity;
pub mod junk;
pub mod loops;
pub mod numbers;
pub mod rename;

pub use conditional::ConditionalInjector;
pub use identity::IdentityInjector;
pub use junk::JunkInjector;
pub use loops::LoopObscurer;
pub use numbers::NumberObscurer;
pub use rename::IdentifierRenamer;

/// State shared by every pass in a run: the one fresh-name registry and the
/// one seeded RNG. Passes never construct either themselves, so a fixed seed
/// pins the entire pipeline's output.
pub struct PassContext {
    pub names: NameRegistry,
    pub rng: StdRng,
}

impl PassContext {
    pub fn new(seed: u64) -> Self {
        PassContext {
            names: NameRegistry::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Registry pre-populated from `program` so fresh names cannot collide
    /// with anything already present.
    pub fn for_program(program: &Program, seed: u64) -> Self {
        let mut ctx = Self::new(seed);
        ctx.names.analyze(program);
        ctx
    }
}

/// A single tree-rewriting stage of the pipeline.
pub trait ObfuscationPass {
    /// Name of the pass for logging and diagnostics.
    fn name(&self) -> &'static str;

    /// Rewrite the program in place.
    fn run(&mut self, program: &mut Program, ctx: &mut PassContext)
        -> Result<(), ObfuscateError>;
}
