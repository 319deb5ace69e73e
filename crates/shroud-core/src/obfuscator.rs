use tracing::info;

use crate::ast::Program;
use crate::config::ObfuscatorConfig;
use crate::errors::ObfuscateError;
use crate::parser;
use crate::passes::{
    ConditionalInjector, IdentifierRenamer, IdentityInjector, JunkInjector, LoopObscurer,
    NumberObscurer, ObfuscationPass, PassContext,
};
use crate::printer;

/// Drives the pass pipeline in its fixed order.
///
/// Junk and loop rewriting run first so later stages obscure their scaffolding
/// too; number encoding runs late enough to catch every constant the earlier
/// stages synthesized; renaming runs last so it covers every helper the other
/// passes introduced.
pub struct Obfuscator {
    config: ObfuscatorConfig,
}

impl Obfuscator {
    pub fn new(config: ObfuscatorConfig) -> Self {
        Obfuscator { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ObfuscatorConfig::default())
    }

    pub fn config(&self) -> &ObfuscatorConfig {
        &self.config
    }

    /// Obfuscate a parsed program in place.
    pub fn obfuscate(&self, program: &mut Program) -> Result<(), ObfuscateError> {
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let mut ctx = PassContext::for_program(program, seed);

        let mut passes: Vec<Box<dyn ObfuscationPass>> = Vec::new();
        if self.config.junk.enabled {
            passes.push(Box::new(JunkInjector::new(self.config.junk.passes)));
        }
        if self.config.loops.enabled {
            passes.push(Box::new(LoopObscurer::new(self.config.loops.strategy)));
        }
        if self.config.conditionals.enabled {
            passes.push(Box::new(ConditionalInjector::new(
                self.config.conditionals.passes,
            )));
        }
        if self.config.identity.enabled {
            passes.push(Box::new(IdentityInjector::new(
                self.config.identity.chance,
                self.config.identity.strategy,
            )));
        }
        if self.config.numbers.enabled {
            for kind in &self.config.numbers.schemes {
                passes.push(Box::new(NumberObscurer::new(
                    *kind,
                    self.config.numbers.rounds,
                )));
            }
        }
        if self.config.rename.enabled {
            passes.push(Box::new(IdentifierRenamer::new()));
        }

        for pass in &mut passes {
            info!(pass = pass.name(), "running pass");
            pass.run(program, &mut ctx)?;
        }
        Ok(())
    }

    /// Parse, obfuscate, and print in one step.
    pub fn obfuscate_source(&self, source: &str) -> Result<String, ObfuscateError> {
        let mut program = parser::parse(source)?;
        self.obfuscate(&mut program)?;
        Ok(printer::print(&program))
    }
}
