use log::{error, warn};

use crate::dispatch::ConfigBuilder;
use crate::error::ConfigError;
use crate::model::{
    Equilibrium, MapFlavor, MarkerAnalysis, QtDistribution, TraitGenotype, TraitModel,
};

struct Faults(Vec<String>);

impl Faults {
    fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{message}");
        self.0.push(message);
    }

    fn bail(self) -> Result<(), ConfigError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Faults { faults: self.0 })
        }
    }
}

/// Check that the configured directives are both compatible and sufficient.
/// Faults accumulate; any fault is fatal once the whole configuration has
/// been inspected. Nothing is implied from partial input beyond what the
/// defaults pass fills in afterwards.
pub(crate) fn validate(builder: &ConfigBuilder) -> Result<(), ConfigError> {
    let options = &builder.options;
    let range = &builder.range;
    let model_type = &builder.model_type;
    let observed = &builder.observed;
    let mut faults = Faults(Vec::new());

    if options.polynomial_scale > 0 && !options.polynomial {
        faults.push("PolynomialScale is incompatible with NonPolynomial");
    }

    if options.marker_analysis != MarkerAnalysis::None {
        // Marker-to-marker only supports two-point, LD, fixed-grid thetas
        // and D-primes. Everything trait-related is out.
        if options.imprinting {
            faults.push("Trait directives (Imprinting) are incompatible with MarkerToMarker");
        }
        if observed.pheno_code_count > 0 {
            faults.push("Trait directives (PhenoCodes) are incompatible with MarkerToMarker");
        }
        if range.disease_alleles != 2 {
            faults.push("Trait directives (DiseaseAlleles) are incompatible with MarkerToMarker");
        }
        if range.liability_classes != 1 {
            faults.push("Trait directives (LiabilityClasses) are incompatible with MarkerToMarker");
        }
        if model_type.trait_model == TraitModel::Quantitative {
            faults.push("Trait directives (QT) are incompatible with MarkerToMarker");
        }
        if model_type.trait_model == TraitModel::Combined {
            faults.push("Trait directives (QTT) are incompatible with MarkerToMarker");
        }
        if !range.thresholds.is_empty() {
            faults.push("Trait directives (Threshold) are incompatible with MarkerToMarker");
        }
        if model_type.truncated() {
            faults.push("Trait directives (Truncate) are incompatible with MarkerToMarker");
        }
        if model_type.kind.is_multipoint() {
            faults.push("Multipoint is incompatible with MarkerToMarker");
        }
        if observed.trait_positions {
            faults.push("Multipoint directives (TraitPositions) are incompatible with MarkerToMarker");
        }
        if !range.marker_allele_freqs.is_empty() {
            faults.push("MarkerAlleleFrequency is incompatible with MarkerToMarker");
        }
        if !range.gene_freqs.is_empty() {
            faults.push("Trait directives (DiseaseGeneFrequency) are incompatible with MarkerToMarker");
        }
        if !range.alphas.is_empty() {
            faults.push("Trait directives (Alpha) are incompatible with MarkerToMarker");
        }
        if range.penetrance.observed() {
            faults.push("Trait directives (Penetrance) are incompatible with MarkerToMarker");
        }
        if range.mean.observed() {
            faults.push("Trait directives (Mean) are incompatible with MarkerToMarker");
        }
        if range.standard_dev.observed() {
            faults.push("Trait directives (StandardDev) are incompatible with MarkerToMarker");
        }
        if range.degrees_of_freedom.observed() {
            faults.push("Trait directives (DegreesOfFreedom) are incompatible with MarkerToMarker");
        }
        if observed.constraints {
            faults.push("Trait directives (Constraint) are incompatible with MarkerToMarker");
        }

        if !options.integration {
            if range.dprimes.is_empty() && options.equilibrium == Equilibrium::Disequilibrium {
                faults.push("FixedModels and LD require DPrime");
            }
            if !range.dprimes.is_empty() && options.equilibrium == Equilibrium::Linkage {
                faults.push("FixedModels and DPrime requires LD");
            }
            if range.thetas[0].is_empty() {
                faults.push("MarkerToMarker and FixedModels require Theta");
            }
        } else {
            if !range.dprimes.is_empty() {
                faults.push("MarkerToMarker and DPrime require FixedModels");
            }
            if !range.thetas[0].is_empty() {
                faults.push("MarkerToMarker and Theta require FixedModels");
            }
        }
        return faults.bail();
    }

    // Everything hereafter is trait-to-marker.

    if range.disease_alleles != 2 {
        faults.push("DiseaseAlleles must be set to 2; polyallelic traits are not supported");
    }

    if observed.pheno_code_count == 3 && model_type.trait_model == TraitModel::Quantitative {
        faults.push("PhenoCodes with 3 arguments is incompatible with QT");
    }
    if observed.pheno_code_count == 1 && model_type.trait_model != TraitModel::Quantitative {
        faults.push("PhenoCodes with 1 argument requires QT");
    }

    if model_type.kind.is_multipoint() {
        if options.equilibrium == Equilibrium::Disequilibrium {
            faults.push("LD is incompatible with Multipoint");
        }
        if options.extra_mods {
            faults.push("ExtraMODs is incompatible with Multipoint");
        }
        if !range.marker_allele_freqs.is_empty() {
            faults.push("MarkerAlleleFrequency is incompatible with Multipoint");
        }
        if !options.ppl_file.is_empty() {
            warn!(
                "Multipoint analysis will write no output to PPLFile '{}', \
                 but will write PPLs in BayesRatioFile '{}'",
                options.ppl_file, options.bayes_ratio_file
            );
        }
        if !observed.trait_positions {
            faults.push("Multipoint requires TraitPositions");
        }
    } else if observed.trait_positions {
        faults.push("TraitPositions requires Multipoint");
    }

    if options.equilibrium == Equilibrium::Disequilibrium
        && options.map_flavor == MapFlavor::SexSpecific
    {
        faults.push("SexSpecific is not supported with LD");
    }

    let qt_normal = model_type.distribution == Some(QtDistribution::Normal)
        && model_type.trait_model != TraitModel::Dichotomous;
    let qt_chisq = model_type.distribution == Some(QtDistribution::ChiSq)
        && model_type.trait_model != TraitModel::Dichotomous;

    if range.mean.observed() && !qt_normal {
        faults.push("Mean requires QT Normal or QTT Normal");
    }
    if range.standard_dev.observed() && !qt_normal {
        faults.push("StandardDev requires QT Normal or QTT Normal");
    }
    if range.degrees_of_freedom.observed() && !qt_chisq {
        faults.push("DegreesOfFreedom requires QT ChiSq or QTT ChiSq");
    }

    if options.integration {
        // Dynamic sampling: explicit fixed-model grids are forbidden.
        if range.penetrance.observed() {
            faults.push("Penetrance requires FixedModels");
        }
        if range.mean.observed_genotype() {
            faults.push("Mean with trait genotypes requires FixedModels");
        }
        if range.degrees_of_freedom.observed_genotype() {
            faults.push("DegreesOfFreedom with trait genotypes requires FixedModels");
        }
        if observed.constraints {
            faults.push("Constraint requires FixedModels");
        }
        if !range.thetas[0].is_empty() {
            faults.push("Theta requires FixedModels");
        }
        if !range.dprimes.is_empty() && !model_type.kind.is_multipoint() {
            // under multipoint the D-primes are simply never consulted
            faults.push("DPrime requires FixedModels");
        }
        if !range.gene_freqs.is_empty() {
            faults.push("DiseaseGeneFrequency requires FixedModels");
        }
        if !range.marker_allele_freqs.is_empty() {
            faults.push("MarkerAlleleFrequency requires FixedModels");
        }
        if !range.alphas.is_empty() {
            faults.push("Alpha requires FixedModels");
        }
        if model_type.trait_model == TraitModel::Combined
            && !range.thresholds.is_empty()
            && range.thresholds.len() != 2
        {
            faults.push("QTT allows exactly two Threshold values (min and max)");
        }
        return faults.bail();
    }

    // Fixed grid from here on.

    if !options.ni_detail_file.is_empty() {
        warn!(
            "Analysis with FixedModels will write no output to NIDetailFile '{}'",
            options.ni_detail_file
        );
    }

    if model_type.kind.is_multipoint() {
        if !range.thetas[0].is_empty() {
            faults.push("Theta is incompatible with Multipoint");
        }
        if !range.dprimes.is_empty() {
            faults.push("DPrime is incompatible with Multipoint");
        }
    } else {
        if options.equilibrium == Equilibrium::Disequilibrium && range.dprimes.is_empty() {
            faults.push("FixedModels with LD requires DPrime");
        }
        if options.equilibrium == Equilibrium::Linkage && !range.dprimes.is_empty() {
            faults.push("FixedModels with DPrime requires LD");
        }
        if range.thetas[0].is_empty() {
            faults.push("FixedModels without Multipoint requires Theta");
        }
    }

    if range.gene_freqs.is_empty() {
        faults.push("FixedModels requires DiseaseGeneFrequency");
    }
    if range.alphas.is_empty() {
        faults.push("FixedModels requires Alpha");
    }

    if model_type.trait_model == TraitModel::Dichotomous {
        if !range.penetrance.observed() {
            faults.push("Dichotomous trait requires Penetrance");
        }
        if range.mean.observed() {
            faults.push("Mean requires QT Normal or QTT Normal");
        }
        if range.standard_dev.observed() {
            faults.push("StandardDev requires QT Normal or QTT Normal");
        }
        if range.degrees_of_freedom.observed() {
            faults.push("DegreesOfFreedom requires QT ChiSq or QTT ChiSq");
        }
        if !range.thresholds.is_empty() {
            faults.push("Threshold requires QTT");
        }
    } else {
        let qt_name = if model_type.trait_model == TraitModel::Quantitative { "QT" } else { "QTT" };
        if range.penetrance.observed() {
            faults.push(format!("Penetrance is incompatible with {qt_name}"));
        }
        if model_type.distribution == Some(QtDistribution::Normal) {
            if !range.mean.observed() {
                faults.push(format!("{qt_name} Normal requires Mean"));
            } else if !range.mean.observed_genotype() {
                faults.push(format!(
                    "FixedModels and {qt_name} Normal requires Mean with trait genotypes"
                ));
            }
            if !range.standard_dev.observed() {
                faults.push(format!("{qt_name} Normal requires StandardDev"));
            }
        }
        if model_type.distribution == Some(QtDistribution::ChiSq) {
            if !range.degrees_of_freedom.observed() {
                faults.push(format!("{qt_name} ChiSq requires DegreesOfFreedom"));
            } else if !range.degrees_of_freedom.observed_genotype() {
                faults.push(format!(
                    "FixedModels and {qt_name} ChiSq requires DegreesOfFreedom with trait genotypes"
                ));
            }
        }
        if model_type.trait_model == TraitModel::Combined {
            if range.thresholds.is_empty() {
                faults.push("QTT requires Threshold");
            }
        } else if !range.thresholds.is_empty() {
            faults.push("Threshold requires QTT");
        }
    }

    // Imprinting pairs with the dD trait-genotype forms, in both directions.
    let has_dd_form = range.penetrance.has(TraitGenotype::dD)
        || range.mean.has(TraitGenotype::dD)
        || range.degrees_of_freedom.has(TraitGenotype::dD);
    if options.imprinting && !has_dd_form {
        match model_type.trait_model {
            TraitModel::Dichotomous => {
                faults.push("Imprinting requires Penetrance values for the dD trait genotype");
            }
            _ if model_type.distribution == Some(QtDistribution::Normal) => {
                faults.push("Imprinting requires Mean values for the dD trait genotype");
            }
            _ => {
                faults.push("Imprinting requires DegreesOfFreedom values for the dD trait genotype");
            }
        }
    }
    if !options.imprinting && has_dd_form {
        match model_type.trait_model {
            TraitModel::Dichotomous => {
                faults.push("Penetrance values for the dD trait genotype require Imprinting");
            }
            _ if model_type.distribution == Some(QtDistribution::Normal) => {
                faults.push("Mean values for the dD trait genotype require Imprinting");
            }
            _ => {
                faults.push("DegreesOfFreedom values for the dD trait genotype require Imprinting");
            }
        }
    }

    if observed.max_constraint_class != 0 && range.liability_classes < observed.max_constraint_class
    {
        faults.push(format!(
            "A Constraint references a liability class {} that is not specified with LiabilityClasses",
            observed.max_constraint_class
        ));
    }

    faults.bail()
}
