//! Trait loci: penetrance tables for dichotomous traits, mean/stddev tables
//! and distribution functions for quantitative and combined traits.

use log::warn;
use statrs::distribution::{Continuous, ContinuousCDF, Normal, StudentsT};

pub const AFFECTION_UNKNOWN: usize = 0;
pub const AFFECTION_UNAFFECTED: usize = 1;
pub const AFFECTION_AFFECTED: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraitKind {
    Dichotomous,
    Quantitative,
    /// Quantitative with an affection threshold.
    Combined,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraitDistribution {
    Normal,
    /// Student t with fixed degrees of freedom.
    StudentT { degrees_of_freedom: f64 },
}

/// `status x liability class x allele x allele` penetrance matrix for a
/// dichotomous or combined trait. Alleles are 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct PenetranceTable {
    classes: usize,
    alleles: usize,
    values: Vec<f64>,
}

impl PenetranceTable {
    pub fn new(classes: usize, alleles: usize) -> PenetranceTable {
        PenetranceTable { classes, alleles, values: vec![1.0; 3 * classes * alleles * alleles] }
    }

    fn slot(&self, status: usize, class: usize, a1: usize, a2: usize) -> usize {
        ((status * self.classes + class) * self.alleles + (a1 - 1)) * self.alleles + (a2 - 1)
    }

    pub fn get(&self, status: usize, class: usize, a1: usize, a2: usize) -> f64 {
        self.values[self.slot(status, class, a1, a2)]
    }

    /// Set the affected-status penetrance of one ordered genotype; the
    /// unaffected row becomes its complement.
    pub fn set(&mut self, class: usize, a1: usize, a2: usize, penetrance: f64) {
        let affected = self.slot(AFFECTION_AFFECTED, class, a1, a2);
        self.values[affected] = penetrance;
        let unaffected = self.slot(AFFECTION_UNAFFECTED, class, a1, a2);
        self.values[unaffected] = 1.0 - penetrance;
    }

    /// Set both phase orderings at once (no imprinting).
    pub fn set_symmetric(&mut self, class: usize, a1: usize, a2: usize, penetrance: f64) {
        self.set(class, a1, a2, penetrance);
        self.set(class, a2, a1, penetrance);
    }
}

/// `liability class x allele x allele` table of means or deviations.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantTable {
    classes: usize,
    alleles: usize,
    values: Vec<f64>,
}

impl QuantTable {
    pub fn new(classes: usize, alleles: usize) -> QuantTable {
        QuantTable { classes, alleles, values: vec![0.0; classes * alleles * alleles] }
    }

    fn slot(&self, class: usize, a1: usize, a2: usize) -> usize {
        (class * self.alleles + (a1 - 1)) * self.alleles + (a2 - 1)
    }

    pub fn get(&self, class: usize, a1: usize, a2: usize) -> f64 {
        self.values[self.slot(class, a1, a2)]
    }

    pub fn set(&mut self, class: usize, a1: usize, a2: usize, value: f64) {
        let at = self.slot(class, a1, a2);
        self.values[at] = value;
    }

    pub fn set_symmetric(&mut self, class: usize, a1: usize, a2: usize, value: f64) {
        self.set(class, a1, a2, value);
        self.set(class, a2, a1, value);
    }
}

/// One trait attached to a trait locus.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitDef {
    pub kind: TraitKind,
    pub liability_classes: usize,
    pub penetrance: Option<PenetranceTable>,
    pub means: Option<QuantTable>,
    pub stddevs: Option<QuantTable>,
    pub distribution: TraitDistribution,
    /// Phenotype codes marking unknown / unaffected / affected persons.
    pub unknown_code: f64,
    pub unaffected_code: f64,
    pub affected_code: f64,
    /// A trait value equal to one of these flags means the observation is
    /// censored at the per-class cutoff, from the left or the right.
    pub less_cutoff_flag: Option<f64>,
    pub more_cutoff_flag: Option<f64>,
    /// Per-class censoring or affection cutoff.
    pub cutoffs: Vec<f64>,
}

impl TraitDef {
    pub fn dichotomous(penetrance: PenetranceTable, liability_classes: usize) -> TraitDef {
        TraitDef {
            kind: TraitKind::Dichotomous,
            liability_classes,
            penetrance: Some(penetrance),
            means: None,
            stddevs: None,
            distribution: TraitDistribution::Normal,
            unknown_code: 0.0,
            unaffected_code: 1.0,
            affected_code: 2.0,
            less_cutoff_flag: None,
            more_cutoff_flag: None,
            cutoffs: vec![0.0; liability_classes],
        }
    }

    pub fn quantitative(
        means: QuantTable,
        stddevs: QuantTable,
        distribution: TraitDistribution,
        liability_classes: usize,
    ) -> TraitDef {
        TraitDef {
            kind: TraitKind::Quantitative,
            liability_classes,
            penetrance: None,
            means: Some(means),
            stddevs: Some(stddevs),
            distribution,
            unknown_code: -99.99,
            unaffected_code: -88.88,
            affected_code: 88.88,
            less_cutoff_flag: None,
            more_cutoff_flag: None,
            cutoffs: vec![0.0; liability_classes],
        }
    }

    /// Penetrance factor of one phased trait genotype `(a1, a2)` given a
    /// person's trait value and liability class (0-based). An unknown value
    /// contributes 1.
    pub fn penetrance_for(&self, value: Option<f64>, class: usize, a1: usize, a2: usize) -> f64 {
        let Some(value) = value else { return 1.0 };
        if codes_match(value, self.unknown_code) {
            return 1.0;
        }
        match self.kind {
            TraitKind::Dichotomous => {
                let status = if codes_match(value, self.affected_code) {
                    AFFECTION_AFFECTED
                } else if codes_match(value, self.unaffected_code) {
                    AFFECTION_UNAFFECTED
                } else {
                    return 1.0;
                };
                self.penetrance.as_ref().map_or(1.0, |t| t.get(status, class, a1, a2))
            }
            TraitKind::Quantitative | TraitKind::Combined => {
                self.quantitative_penetrance(value, class, a1, a2)
            }
        }
    }

    fn quantitative_penetrance(&self, value: f64, class: usize, a1: usize, a2: usize) -> f64 {
        let (Some(means), Some(stddevs)) = (self.means.as_ref(), self.stddevs.as_ref()) else {
            return 1.0;
        };
        let mean = means.get(class, a1, a2);
        let sd = stddevs.get(class, a1, a2);
        if sd <= 0.0 {
            warn!("non-positive standard deviation for trait genotype ({a1},{a2})");
            return 0.0;
        }

        // affection codes on a combined trait integrate the tail at the
        // class cutoff instead of using the density
        if self.kind == TraitKind::Combined {
            let cutoff = self.cutoffs[class];
            if codes_match(value, self.affected_code) {
                return 1.0 - self.cdf(cutoff, mean, sd);
            }
            if codes_match(value, self.unaffected_code) {
                return self.cdf(cutoff, mean, sd);
            }
        }
        // censored observations integrate at the per-class cutoff
        if self.less_cutoff_flag.is_some_and(|flag| codes_match(value, flag)) {
            return self.cdf(self.cutoffs[class], mean, sd);
        }
        if self.more_cutoff_flag.is_some_and(|flag| codes_match(value, flag)) {
            return 1.0 - self.cdf(self.cutoffs[class], mean, sd);
        }

        self.pdf(value, mean, sd)
    }

    fn pdf(&self, x: f64, mean: f64, sd: f64) -> f64 {
        match self.distribution {
            TraitDistribution::Normal => {
                Normal::new(mean, sd).map_or(0.0, |d| d.pdf(x))
            }
            TraitDistribution::StudentT { degrees_of_freedom } => {
                StudentsT::new(mean, sd, degrees_of_freedom).map_or(0.0, |d| d.pdf(x))
            }
        }
    }

    fn cdf(&self, x: f64, mean: f64, sd: f64) -> f64 {
        match self.distribution {
            TraitDistribution::Normal => {
                Normal::new(mean, sd).map_or(0.0, |d| d.cdf(x))
            }
            TraitDistribution::StudentT { degrees_of_freedom } => {
                StudentsT::new(mean, sd, degrees_of_freedom).map_or(0.0, |d| d.cdf(x))
            }
        }
    }
}

/// A locus may carry several traits; all are assumed to share the one
/// disease gene.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitLocus {
    pub traits: Vec<TraitDef>,
    /// Map position in cM, used by multipoint sub-list construction.
    pub map_position: f64,
}

fn codes_match(value: f64, code: f64) -> bool {
    (value - code).abs() < 1.0e-9
}
