use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::ObfuscateError;

/// Which scrambling scheme a number-encoding stage uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumberSchemeKind {
    #[serde(rename = "identity")]
    Identity,
    #[serde(rename = "feistel")]
    Feistel,
    #[serde(rename = "feistel-random")]
    FeistelRandom,
    #[serde(rename = "xor-string")]
    XorString,
}

/// How for-loops are lowered to while-loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopStrategy {
    #[serde(rename = "plain")]
    Plain,
    #[serde(rename = "collatz")]
    Collatz,
}

impl Default for LoopStrategy {
    fn default() -> Self {
        LoopStrategy::Collatz
    }
}

/// Which identity-expression rewrite the wrapper applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityStrategy {
    #[serde(rename = "and-true")]
    AndTrue,
    #[serde(rename = "or-self")]
    OrSelf,
    #[serde(rename = "conditional")]
    Conditional,
    #[serde(rename = "lambda")]
    Lambda,
    #[serde(rename = "list-index")]
    ListIndex,
    #[serde(rename = "dict-key")]
    DictKey,
    #[serde(rename = "mixed")]
    Mixed,
}

impl Default for IdentityStrategy {
    fn default() -> Self {
        IdentityStrategy::Mixed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JunkOptions {
    /// Inject scratch-variable junk statements (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of injection sweeps; per-site probability is 0.3 / passes
    #[serde(default = "default_one")]
    pub passes: u32,
}

impl Default for JunkOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            passes: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalOptions {
    /// Wrap top-level statements in always-true branches (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of wrapping sweeps; per-site probability is 0.3 / passes
    #[serde(default = "default_one")]
    pub passes: u32,
}

impl Default for ConditionalOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            passes: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityOptions {
    /// Wrap name reads and literals in value-preserving expressions
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Per-expression wrap probability (default: 0.3)
    #[serde(default = "default_chance")]
    pub chance: f64,

    #[serde(default)]
    pub strategy: IdentityStrategy,
}

impl Default for IdentityOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            chance: 0.3,
            strategy: IdentityStrategy::Mixed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberOptions {
    /// Encode integer literals and prepend decoders (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scheme stages applied in order, each with its own decoder
    #[serde(default = "default_schemes")]
    pub schemes: Vec<NumberSchemeKind>,

    /// Feistel round count for the randomized-key scheme (default: 3)
    #[serde(default = "default_rounds")]
    pub rounds: u32,
}

impl Default for NumberOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            schemes: default_schemes(),
            rounds: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopOptions {
    /// Flatten, normalize, and lower for-loops (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub strategy: LoopStrategy,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: LoopStrategy::Collatz,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameOptions {
    /// Replace every defined identifier with a random one (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for RenameOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Full pipeline configuration. Every section has serde defaults so a partial
/// JSON file only overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObfuscatorConfig {
    /// RNG seed; the same seed and input produce identical output
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub junk: JunkOptions,

    #[serde(default)]
    pub conditionals: ConditionalOptions,

    #[serde(default)]
    pub identity: IdentityOptions,

    #[serde(default)]
    pub numbers: NumberOptions,

    #[serde(default)]
    pub loops: LoopOptions,

    #[serde(default)]
    pub rename: RenameOptions,
}

impl Default for ObfuscatorConfig {
    fn default() -> Self {
        Self {
            seed: None,
            junk: JunkOptions::default(),
            conditionals: ConditionalOptions::default(),
            identity: IdentityOptions::default(),
            numbers: NumberOptions::default(),
            loops: LoopOptions::default(),
            rename: RenameOptions::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_one() -> u32 {
    1
}

fn default_chance() -> f64 {
    0.3
}

fn default_rounds() -> u32 {
    3
}

fn default_schemes() -> Vec<NumberSchemeKind> {
    vec![NumberSchemeKind::FeistelRandom, NumberSchemeKind::XorString]
}

impl ObfuscatorConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ObfuscateError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ObfuscateError::Config(format!("{}: {e}", path.display())))?;
        let config: ObfuscatorConfig = serde_json::from_str(&content)
            .map_err(|e| ObfuscateError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Create a default configuration and write it to a file
    pub fn init_file(path: &Path) -> Result<(), ObfuscateError> {
        let config = ObfuscatorConfig::default();
        let json = serde_json::to_string_pretty(&config)
            .map_err(|e| ObfuscateError::Config(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| ObfuscateError::Config(e.to_string()))?;
        Ok(())
    }
}
