use serde::Serialize;

pub const DEFAULT_FREQUENCY_FILE: &str = "markers.dat";
pub const DEFAULT_MAP_FILE: &str = "mapfile.dat";
pub const DEFAULT_PEDIGREE_FILE: &str = "pedfile.dat";
pub const DEFAULT_LOCUS_FILE: &str = "datafile.dat";
pub const DEFAULT_BAYES_RATIO_FILE: &str = "br.out";
pub const DEFAULT_PPL_FILE: &str = "ppl.out";
pub const DEFAULT_SURFACES_PATH: &str = "./";

/// Linkage equilibrium vs disequilibrium between the trait and the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Equilibrium {
    Linkage,
    Disequilibrium,
}

/// Two-point against each marker, or multipoint over a sliding marker set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnalysisKind {
    TwoPoint,
    Multipoint { markers: usize },
}

impl AnalysisKind {
    pub fn is_multipoint(self) -> bool {
        matches!(self, AnalysisKind::Multipoint { .. })
    }
}

/// What kind of trait drives the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TraitModel {
    /// Dichotomous (affected / unaffected).
    Dichotomous,
    /// Quantitative.
    Quantitative,
    /// Combined: quantitative with an affection threshold.
    Combined,
}

/// Distribution family for quantitative traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QtDistribution {
    Normal,
    ChiSq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MapFlavor {
    SexAveraged,
    SexSpecific,
}

/// Marker-to-marker analysis mode; `None` is the usual trait-to-marker run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarkerAnalysis {
    None,
    All,
    Adjacent,
}

/// The four phased trait genotypes a parameter list can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TraitGenotype {
    DD,
    Dd,
    #[allow(non_camel_case_types)]
    dD,
    #[allow(non_camel_case_types)]
    dd,
}

impl TraitGenotype {
    pub const ALL: [TraitGenotype; 4] =
        [TraitGenotype::DD, TraitGenotype::Dd, TraitGenotype::dD, TraitGenotype::dd];

    /// Case matters: `Dd` and `dD` are distinct under imprinting.
    pub fn parse(token: &str) -> Option<TraitGenotype> {
        match token {
            "DD" => Some(TraitGenotype::DD),
            "Dd" => Some(TraitGenotype::Dd),
            "dD" => Some(TraitGenotype::dD),
            "dd" => Some(TraitGenotype::dd),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            TraitGenotype::DD => 0,
            TraitGenotype::Dd => 1,
            TraitGenotype::dD => 2,
            TraitGenotype::dd => 3,
        }
    }
}

/// Values for one trait parameter (penetrance, mean, ...), either bare
/// (no genotype, dynamic-integration brackets) or attached to trait
/// genotypes (fixed-grid form).
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenotypeValues {
    pub bare: Vec<f64>,
    pub per_genotype: [Vec<f64>; 4],
}

impl GenotypeValues {
    pub fn observed_bare(&self) -> bool {
        !self.bare.is_empty()
    }

    pub fn observed_genotype(&self) -> bool {
        self.per_genotype.iter().any(|v| !v.is_empty())
    }

    pub fn observed(&self) -> bool {
        self.observed_bare() || self.observed_genotype()
    }

    pub fn has(&self, genotype: TraitGenotype) -> bool {
        !self.per_genotype[genotype.index()].is_empty()
    }

    pub fn push(&mut self, genotype: Option<TraitGenotype>, value: f64) {
        match genotype {
            None => self.bare.push(value),
            Some(g) => self.per_genotype[g.index()].push(value),
        }
    }

    pub fn sort_dedup(&mut self) {
        sort_dedup(&mut self.bare);
        for list in &mut self.per_genotype {
            sort_dedup(list);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConstraintOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl ConstraintOp {
    pub fn parse(token: &str) -> Option<ConstraintOp> {
        match token {
            "==" | "=" => Some(ConstraintOp::Eq),
            "!=" => Some(ConstraintOp::Ne),
            ">"  => Some(ConstraintOp::Gt),
            ">=" => Some(ConstraintOp::Ge),
            "<"  => Some(ConstraintOp::Lt),
            "<=" => Some(ConstraintOp::Le),
            _ => None,
        }
    }
}

/// Which trait parameter a constraint binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConstraintKind {
    Penetrance,
    Mean,
    StandardDev,
    DegreesOfFreedom,
}

/// One side of a constraint: a trait genotype, optionally qualified by a
/// 1-based liability class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConstraintTerm {
    pub genotype: TraitGenotype,
    pub class: Option<usize>,
}

/// An ordering constraint between two trait-parameter entries, applied when
/// the fixed grid is expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub left: ConstraintTerm,
    pub op: ConstraintOp,
    pub right: ConstraintTerm,
}

/// Analysis switches and file names.
#[derive(Debug, Clone, Serialize)]
pub struct ModelOptions {
    pub frequency_file: String,
    pub map_file: String,
    pub pedigree_file: String,
    pub locus_file: String,
    pub bayes_ratio_file: String,
    pub ppl_file: String,
    pub count_file: String,
    pub mod_file: String,
    pub surface_file: String,
    pub ni_detail_file: String,
    pub surfaces_path: String,

    pub polynomial: bool,
    pub integration: bool,
    pub imprinting: bool,
    pub sex_linked: bool,
    pub dry_run: bool,
    pub extra_mods: bool,
    pub force_br_file: bool,

    pub polynomial_scale: u32,
    pub max_iterations: i64,

    pub equilibrium: Equilibrium,
    pub marker_analysis: MarkerAnalysis,
    pub map_flavor: MapFlavor,

    /// Phenotype codes for unknown / unaffected / affected, in that order.
    /// `None` until PhenoCodes or the defaults pass sets them.
    pub pheno_codes: [Option<f64>; 3],

    pub unknown_person_id: String,

    // PPL weighting parameters
    pub theta_cutoff: [f64; 2],
    pub theta_weight: f64,
    pub prior: f64,
    pub ld_prior: f64,
}

impl Default for ModelOptions {
    fn default() -> ModelOptions {
        ModelOptions {
            frequency_file: DEFAULT_FREQUENCY_FILE.to_owned(),
            map_file: DEFAULT_MAP_FILE.to_owned(),
            pedigree_file: DEFAULT_PEDIGREE_FILE.to_owned(),
            locus_file: DEFAULT_LOCUS_FILE.to_owned(),
            bayes_ratio_file: DEFAULT_BAYES_RATIO_FILE.to_owned(),
            ppl_file: String::new(),
            count_file: String::new(),
            mod_file: String::new(),
            surface_file: String::new(),
            ni_detail_file: String::new(),
            surfaces_path: DEFAULT_SURFACES_PATH.to_owned(),
            polynomial: true,
            integration: true,
            imprinting: false,
            sex_linked: false,
            dry_run: false,
            extra_mods: false,
            force_br_file: false,
            polynomial_scale: 0,
            max_iterations: -1,
            equilibrium: Equilibrium::Linkage,
            marker_analysis: MarkerAnalysis::None,
            map_flavor: MapFlavor::SexAveraged,
            pheno_codes: [None; 3],
            unknown_person_id: "0".to_owned(),
            theta_cutoff: [0.05, 0.05],
            theta_weight: 0.95,
            prior: 0.02,
            ld_prior: 0.02,
        }
    }
}

/// Expanded grids of model parameter values.
#[derive(Debug, Clone, Serialize)]
pub struct ModelRange {
    pub gene_freqs: Vec<f64>,
    pub marker_allele_freqs: Vec<f64>,
    pub alphas: Vec<f64>,
    /// Sex-averaged (male under a sex-specific map) and female thetas.
    pub thetas: [Vec<f64>; 2],
    pub dprimes: Vec<f64>,
    pub trait_positions: Vec<f64>,
    /// Open-ended TraitPositions sweep: start and increment of an `i-end:k`
    /// range, resolved against the map once markers are known.
    pub trait_position_sweep: Option<(f64, f64)>,
    /// TraitPositions mentioned the `Marker` symbol: evaluate at every
    /// marker position too.
    pub trait_positions_at_markers: bool,

    pub penetrance: GenotypeValues,
    pub mean: GenotypeValues,
    pub standard_dev: GenotypeValues,
    pub degrees_of_freedom: GenotypeValues,
    pub thresholds: Vec<f64>,

    pub liability_classes: usize,
    pub liability_class_labels: Vec<usize>,
    pub disease_alleles: usize,
    pub constraints: Vec<Constraint>,
}

impl Default for ModelRange {
    fn default() -> ModelRange {
        ModelRange {
            gene_freqs: Vec::new(),
            marker_allele_freqs: Vec::new(),
            alphas: Vec::new(),
            thetas: [Vec::new(), Vec::new()],
            dprimes: Vec::new(),
            trait_positions: Vec::new(),
            trait_position_sweep: None,
            trait_positions_at_markers: false,
            penetrance: GenotypeValues::default(),
            mean: GenotypeValues::default(),
            standard_dev: GenotypeValues::default(),
            degrees_of_freedom: GenotypeValues::default(),
            thresholds: Vec::new(),
            liability_classes: 1,
            liability_class_labels: Vec::new(),
            disease_alleles: 2,
            constraints: Vec::new(),
        }
    }
}

/// Trait typing: analysis kind, trait model, QT distribution, censoring.
#[derive(Debug, Clone, Serialize)]
pub struct ModelType {
    pub kind: AnalysisKind,
    pub trait_model: TraitModel,
    pub distribution: Option<QtDistribution>,
    pub truncate_min: f64,
    pub truncate_max: f64,
}

pub const TRUNCATE_UNSET_MIN: f64 = -999_999_999.0;
pub const TRUNCATE_UNSET_MAX: f64 = 999_999_999.0;

impl Default for ModelType {
    fn default() -> ModelType {
        ModelType {
            kind: AnalysisKind::TwoPoint,
            trait_model: TraitModel::Dichotomous,
            distribution: None,
            truncate_min: TRUNCATE_UNSET_MIN,
            truncate_max: TRUNCATE_UNSET_MAX,
        }
    }
}

impl ModelType {
    pub fn truncated(&self) -> bool {
        self.truncate_min != TRUNCATE_UNSET_MIN || self.truncate_max != TRUNCATE_UNSET_MAX
    }
}

/// The validated analysis model handed to the engine.
#[derive(Debug, Clone, Serialize)]
pub struct Model {
    pub options: ModelOptions,
    pub range: ModelRange,
    pub model_type: ModelType,
}

impl Model {
    /// Dump the whole validated model through the log, for provenance.
    pub fn log_yaml(&self) {
        match serde_yaml::to_string(self) {
            Ok(dump) => log::info!("\n---- Validated analysis model ----\n{dump}\n---"),
            Err(err) => log::warn!("could not serialise the analysis model: {err}"),
        }
    }
}

/// Bookkeeping for directives whose mere presence matters to validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Observed {
    pub trait_positions: bool,
    pub constraints: bool,
    pub max_constraint_class: usize,
    pub pheno_code_count: usize,
}

pub(crate) fn sort_dedup(values: &mut Vec<f64>) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genotype_parse_is_case_sensitive() {
        assert_eq!(TraitGenotype::parse("Dd"), Some(TraitGenotype::Dd));
        assert_eq!(TraitGenotype::parse("dD"), Some(TraitGenotype::dD));
        assert_ne!(TraitGenotype::parse("Dd"), TraitGenotype::parse("dD"));
        assert_eq!(TraitGenotype::parse("dx"), None);
    }

    #[test]
    fn genotype_values_track_observation_form() {
        let mut values = GenotypeValues::default();
        assert!(!values.observed());
        values.push(None, 0.5);
        assert!(values.observed_bare() && !values.observed_genotype());
        values.push(Some(TraitGenotype::dD), 0.7);
        assert!(values.observed_genotype());
        assert!(values.has(TraitGenotype::dD));
        assert!(!values.has(TraitGenotype::DD));
    }

    #[test]
    fn sort_dedup_orders_and_uniques() {
        let mut values = vec![0.5, 0.1, 0.5, 0.3];
        sort_dedup(&mut values);
        assert_eq!(values, vec![0.1, 0.3, 0.5]);
    }
}
