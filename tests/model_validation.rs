//! Configuration-lattice scenarios across the full parse -> validate ->
//! defaults pipeline.

use lodscore::modelconfig::{AnalysisKind, ConfigBuilder, ConfigError, TraitModel};

fn faults_of(text: &str) -> Vec<String> {
    let mut builder = ConfigBuilder::new();
    builder.parse_text(text).unwrap();
    match builder.finish() {
        Ok(_) => Vec::new(),
        Err(ConfigError::Faults { faults }) => faults,
        Err(other) => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn ld_under_multipoint_is_a_named_fault() {
    let faults = faults_of("Multipoint 2; TraitPositions 0-10:1; LD; DPrime 0-0.5:0.1");
    assert!(
        faults.iter().any(|f| f.contains("LD") && f.contains("Multipoint")),
        "no LD/Multipoint fault in {faults:?}"
    );

    // dropping LD clears the configuration entirely
    let faults = faults_of("Multipoint 2; TraitPositions 0-10:1; DPrime 0-0.5:0.1");
    assert!(faults.is_empty(), "unexpected faults {faults:?}");
}

#[test]
fn multipoint_requires_trait_positions_and_vice_versa() {
    let faults = faults_of("Multipoint 4");
    assert!(faults.iter().any(|f| f.contains("TraitPositions")));

    let faults = faults_of("TraitPositions 1-5:1");
    assert!(faults.iter().any(|f| f.contains("Multipoint")));
}

#[test]
fn fixed_grid_requires_its_parameter_grids() {
    let faults = faults_of("FixedModels; Theta 0-0.5:0.1");
    assert!(faults.iter().any(|f| f.contains("DiseaseGeneFrequency")));
    assert!(faults.iter().any(|f| f.contains("Alpha")));
    assert!(faults.iter().any(|f| f.contains("Penetrance")));
}

#[test]
fn dynamic_integration_forbids_explicit_grids() {
    let faults = faults_of("Theta 0-0.5:0.1");
    assert!(faults.iter().any(|f| f.contains("Theta") && f.contains("FixedModels")));

    let faults = faults_of("Penetrance DD 0.9");
    assert!(faults.iter().any(|f| f.contains("Penetrance") && f.contains("FixedModels")));
}

#[test]
fn sex_specific_maps_are_incompatible_with_ld() {
    let faults = faults_of("LD; SexSpecific");
    assert!(faults.iter().any(|f| f.contains("SexSpecific")));
}

#[test]
fn qt_parameter_coupling() {
    // Mean without a QT model
    let faults = faults_of("Mean -3 3");
    assert!(faults.iter().any(|f| f.contains("Mean")));

    // QTT Normal on a fixed grid without Threshold
    let faults = faults_of(
        "FixedModels; QTT Normal; Theta 0-0.5:0.1; DiseaseGeneFrequency 0.1; Alpha 0.05\n\
         Mean DD 1.0; Mean Dd 0.5; Mean dd 0.0\n\
         StandardDev DD 1.0; StandardDev Dd 1.0; StandardDev dd 1.0",
    );
    assert!(faults.iter().any(|f| f.contains("Threshold")));

    // ChiSq requires DegreesOfFreedom
    let faults = faults_of(
        "FixedModels; QT ChiSq; Theta 0-0.5:0.1; DiseaseGeneFrequency 0.1; Alpha 0.05",
    );
    assert!(faults.iter().any(|f| f.contains("DegreesOfFreedom")));
}

#[test]
fn imprinting_couples_to_the_dd_genotype_forms() {
    // imprinting without dD penetrance values
    let faults = faults_of(
        "FixedModels; Imprinting; Theta 0-0.5:0.1; DiseaseGeneFrequency 0.1; Alpha 0.05\n\
         Penetrance DD 0.9; Penetrance Dd 0.5; Penetrance dd 0.01",
    );
    assert!(faults.iter().any(|f| f.contains("Imprinting") && f.contains("dD")));

    // dD penetrance values without imprinting
    let faults = faults_of(
        "FixedModels; Theta 0-0.5:0.1; DiseaseGeneFrequency 0.1; Alpha 0.05\n\
         Penetrance DD 0.9; Penetrance Dd 0.5; Penetrance dD 0.4; Penetrance dd 0.01",
    );
    assert!(faults.iter().any(|f| f.contains("dD") && f.contains("Imprinting")));

    // together they are fine
    let faults = faults_of(
        "FixedModels; Imprinting; Theta 0-0.5:0.1; DiseaseGeneFrequency 0.1; Alpha 0.05\n\
         Penetrance DD 0.9; Penetrance Dd 0.5; Penetrance dD 0.4; Penetrance dd 0.01",
    );
    assert!(faults.is_empty(), "unexpected faults {faults:?}");
}

#[test]
fn constraints_respect_the_liability_class_count() {
    let faults = faults_of(
        "FixedModels; LiabilityClasses 2; Theta 0-0.5:0.1; DiseaseGeneFrequency 0.1; Alpha 0.05\n\
         Penetrance DD 0.9; Penetrance Dd 0.5; Penetrance dd 0.01\n\
         Constraint Penetrance DD 3 >= Dd 3",
    );
    assert!(faults.iter().any(|f| f.contains("liability class")));
}

#[test]
fn marker_to_marker_excludes_trait_directives() {
    let faults = faults_of("MarkerToMarker All; DiseaseGeneFrequency 0.1; Imprinting");
    assert!(faults.iter().any(|f| f.contains("DiseaseGeneFrequency")));
    assert!(faults.iter().any(|f| f.contains("Imprinting")));
}

#[test]
fn a_complete_two_point_model_validates_and_fills() {
    let mut builder = ConfigBuilder::new();
    builder
        .parse_text(
            "PedigreeFile peds.post; LocusFile data.dat\n\
             FixedModels\n\
             Theta 0-0.45:0.05\n\
             DiseaseGeneFrequency 0.001 0.01 0.1\n\
             Alpha 0.05 1.0\n\
             Penetrance DD 0.999; Penetrance Dd 0.9; Penetrance dd 0.02",
        )
        .unwrap();
    let model = builder.finish().unwrap();
    assert_eq!(model.model_type.kind, AnalysisKind::TwoPoint);
    assert_eq!(model.model_type.trait_model, TraitModel::Dichotomous);
    assert_eq!(model.options.pedigree_file, "peds.post");
    // defaults pass injected theta 0.5 and the PPL file name
    assert!(model.range.thetas[0].contains(&0.5));
    assert!(!model.options.ppl_file.is_empty());
    // values come out sorted and unique
    let mut sorted = model.range.gene_freqs.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(model.range.gene_freqs, sorted);
    model.log_yaml();
}
