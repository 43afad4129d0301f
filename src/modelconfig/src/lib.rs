//! Analysis-directive parsing and validation.
//!
//! Configuration text is a sequence of directives separated by newlines and
//! semicolons (`Theta 0-0.5:0.05; LD`). Directive names match
//! case-insensitively by unambiguous prefix. Handlers record what was seen;
//! `ConfigBuilder::finish` then checks the full compatibility lattice in one
//! pass (faults accumulate and are reported together) and fills canonical
//! defaults, yielding the validated [`Model`].
//!
//! ```
//! use modelconfig::ConfigBuilder;
//!
//! let mut builder = ConfigBuilder::new();
//! builder.parse_text("FixedModels\nTheta 0-0.5:0.1\nDiseaseGeneFrequency 0.1\n\
//!                     Alpha 0.05\nPenetrance DD 0.9; Penetrance Dd 0.5; Penetrance dd 0.01")
//!     .unwrap();
//! let model = builder.finish().unwrap();
//! assert!(!model.options.integration);
//! ```

pub mod defaults;
pub mod dispatch;
pub mod error;
pub mod expand;
pub mod model;
pub mod tokens;
pub mod validate;

pub use dispatch::ConfigBuilder;
pub use error::ConfigError;
pub use expand::{expand_parameter, TraitVector};
pub use model::{
    AnalysisKind, Constraint, ConstraintKind, ConstraintOp, ConstraintTerm, Equilibrium,
    GenotypeValues, MapFlavor, MarkerAnalysis, Model, ModelOptions, ModelRange, ModelType,
    QtDistribution, TraitGenotype, TraitModel,
};
pub use tokens::{parse_doubles, parse_values, tokenize, TokenGroup, Value};
