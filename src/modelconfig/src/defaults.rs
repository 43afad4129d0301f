use crate::dispatch::ConfigBuilder;
use crate::model::{
    sort_dedup, AnalysisKind, Constraint, ConstraintKind, ConstraintOp, ConstraintTerm,
    Equilibrium, MapFlavor, MarkerAnalysis, ModelRange, QtDistribution, TraitGenotype, TraitModel,
    DEFAULT_PPL_FILE,
};

const ERROR_MARGIN: f64 = 1.0e-9;

/// The dynamic-integration D' sampling grid. These 67 points are fixed
/// abscissae, not user-configurable values.
#[rustfmt::skip]
const INTEGRATION_LD_DPRIME_VALUES: [f64; 67] = [
    -0.9991215920266, -0.9978005239276, -0.9895111329084, -0.9795480315810, -0.9380736582515,
    -0.9363710600566, -0.8506966822267, -0.8291384627634, -0.8246142162823, -0.7833333333333,
    -0.7500000000000, -0.6904495567970, -0.6791307322941, -0.6258564671727, -0.6038888888889,
    -0.5797272329149, -0.5000000000000, -0.4202727670851, -0.3961111111111, -0.3741435328273,
    -0.3208692677059, -0.3095504432030, -0.2500000000000, -0.2166666666667, -0.1753857837177,
    -0.1708615372366, -0.1493033177733, -0.0636289399434, -0.0619263417485, -0.0204519684190,
    -0.0104888670916, -0.0021994760724, -0.0008784079734,  0.0000000000000,  0.0008784079734,
     0.0021994760724,  0.0104888670916,  0.0204519684190,  0.0619263417485,  0.0636289399434,
     0.1493033177733,  0.1708615372366,  0.1753857837177,  0.2166666666667,  0.2500000000000,
     0.3095504432030,  0.3208692677059,  0.3741435328273,  0.3961111111111,  0.4202727670851,
     0.5000000000000,  0.5797272329149,  0.6038888888889,  0.6258564671727,  0.6791307322941,
     0.6904495567970,  0.7500000000000,  0.7833333333333,  0.8246142162823,  0.8291384627634,
     0.8506966822267,  0.9363710600566,  0.9380736582515,  0.9795480315810,  0.9895111329084,
     0.9978005239276,  0.9991215920266,
];

/// Insert canonical values for everything that could have been configured
/// but was not. Runs after validation, so the combinations are known good.
pub(crate) fn fill_defaults(builder: &mut ConfigBuilder) {
    let options = &mut builder.options;
    let range = &mut builder.range;
    let model_type = &mut builder.model_type;

    // Phenotype codes: 0/1/2 for dichotomous, the QT sentinels otherwise.
    if model_type.trait_model == TraitModel::Dichotomous {
        if options.pheno_codes[0].is_none() {
            options.pheno_codes = [Some(0.0), Some(1.0), Some(2.0)];
        }
    } else {
        if options.pheno_codes[0].is_none() {
            options.pheno_codes[0] = Some(-99.99);
        }
        if options.pheno_codes[1].is_none() {
            options.pheno_codes[1] = Some(-88.88);
            options.pheno_codes[2] = Some(88.88);
        }
    }

    if options.polynomial && options.polynomial_scale == 0 {
        options.polynomial_scale = 1;
    }
    if model_type.kind == AnalysisKind::TwoPoint && options.ppl_file.is_empty() {
        options.ppl_file = DEFAULT_PPL_FILE.to_owned();
    }

    // MarkerToMarker forces fixed models and supplies default grids.
    if options.marker_analysis != MarkerAnalysis::None {
        options.integration = false;
        if options.equilibrium == Equilibrium::Disequilibrium && range.dprimes.is_empty() {
            for i in -50..=50 {
                range.dprimes.push(0.02 * f64::from(i));
            }
        }
        if range.thetas[0].is_empty() {
            for i in 0..50 {
                range.thetas[0].push(0.01 * f64::from(i));
            }
        }
    }

    if options.equilibrium == Equilibrium::Disequilibrium {
        if options.integration {
            // dynamic grid: no user D-primes at all, insert the magic ones
            range.dprimes.extend_from_slice(&INTEGRATION_LD_DPRIME_VALUES);
        } else if !range.dprimes.iter().any(|d| d.abs() <= ERROR_MARGIN) {
            // fixed models: silently make sure 0 is in the range
            range.dprimes.push(0.0);
        }
    }

    if options.integration {
        match model_type.distribution {
            Some(QtDistribution::Normal) => {
                if !range.mean.observed() {
                    range.mean.bare.extend([-3.0, 3.0]);
                }
                if !range.standard_dev.observed() {
                    range.standard_dev.bare.extend([0.7, 1.0]);
                }
                if model_type.trait_model == TraitModel::Combined && range.thresholds.is_empty() {
                    range.thresholds.extend([0.0, 3.0]);
                }
            }
            Some(QtDistribution::ChiSq) => {
                if !range.degrees_of_freedom.observed() {
                    range.degrees_of_freedom.bare.extend([0.05, 30.0]);
                }
                if model_type.trait_model == TraitModel::Combined && range.thresholds.is_empty() {
                    range.thresholds.extend([0.05, 30.0]);
                }
            }
            None => {}
        }
        if model_type.trait_model != TraitModel::Dichotomous && !options.imprinting {
            duplicate_heterozygote_values(range);
        }
    } else {
        if model_type.kind == AnalysisKind::TwoPoint {
            if !range.thetas[0].iter().any(|t| (0.5 - t).abs() <= ERROR_MARGIN) {
                range.thetas[0].push(0.5);
            }
            if options.map_flavor == MapFlavor::SexSpecific {
                let male = range.thetas[0].clone();
                range.thetas[1].extend(male);
            }
        }
        // keep the two heterozygote parameter columns in sync without
        // imprinting
        if model_type.trait_model != TraitModel::Dichotomous && !options.imprinting {
            range.constraints.push(Constraint {
                kind: ConstraintKind::Penetrance,
                left: ConstraintTerm { genotype: TraitGenotype::dD, class: None },
                op: ConstraintOp::Eq,
                right: ConstraintTerm { genotype: TraitGenotype::Dd, class: None },
            });
        }
    }

    range.liability_class_labels = (1..=range.liability_classes).collect();
}

/// Without imprinting the dD column mirrors Dd for every quantitative
/// parameter.
fn duplicate_heterozygote_values(range: &mut ModelRange) {
    for values in [&mut range.penetrance, &mut range.mean, &mut range.standard_dev, &mut range.degrees_of_freedom]
    {
        let from = values.per_genotype[TraitGenotype::Dd.index()].clone();
        let to = &mut values.per_genotype[TraitGenotype::dD.index()];
        if to.is_empty() {
            *to = from;
        }
    }
}

/// Sort every parameter list and drop duplicates; sorted values better
/// support constraint application downstream.
pub(crate) fn sort_and_dedup(range: &mut ModelRange) {
    sort_dedup(&mut range.gene_freqs);
    sort_dedup(&mut range.marker_allele_freqs);
    sort_dedup(&mut range.alphas);
    sort_dedup(&mut range.thetas[0]);
    sort_dedup(&mut range.thetas[1]);
    sort_dedup(&mut range.dprimes);
    sort_dedup(&mut range.trait_positions);
    sort_dedup(&mut range.thresholds);
    range.penetrance.sort_dedup();
    range.mean.sort_dedup();
    range.standard_dev.sort_dedup();
    range.degrees_of_freedom.sort_dedup();
}
