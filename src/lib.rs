//! lodscore: a genetic-linkage likelihood engine with a random-access
//! result store.
//!
//! The workspace splits into three subsystems plus logging:
//! - [`pedprob`]: the pedigree likelihood core (genotype elimination,
//!   allele-set recoding, parental pairs, transmission tensor, peeling,
//!   loop breakers),
//! - [`modelconfig`]: the analysis-directive parser and its compatibility
//!   validator,
//! - [`radsmm`]: the RADSMM binary store caching one scalar likelihood per
//!   cell of the analysis model grid.
//!
//! This crate re-exports the members and offers a small bridge from a
//! validated configuration to the engine's options.

pub use logger::Logger;
pub use modelconfig;
pub use pedprob;
pub use radsmm;

use modelconfig::{Equilibrium, MapFlavor, Model};
use pedprob::EngineOptions;

/// Engine switches implied by a validated analysis model.
pub fn engine_options(model: &Model) -> EngineOptions {
    EngineOptions {
        sex_linked: model.options.sex_linked,
        imprinting: model.options.imprinting,
        linkage_disequilibrium: model.options.equilibrium == Equilibrium::Disequilibrium,
    }
}

/// Whether the model asks for separate male and female recombination maps.
pub fn sex_specific_maps(model: &Model) -> bool {
    model.options.map_flavor == MapFlavor::SexSpecific
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelconfig::ConfigBuilder;

    #[test]
    fn options_bridge_follows_the_model() {
        let mut builder = ConfigBuilder::new();
        builder.parse_text("LD; Imprinting; SexLinked").unwrap();
        let model = builder.finish().unwrap();
        let options = engine_options(&model);
        assert!(options.sex_linked);
        assert!(options.imprinting);
        assert!(options.linkage_disequilibrium);
        assert!(!sex_specific_maps(&model));
    }
}
