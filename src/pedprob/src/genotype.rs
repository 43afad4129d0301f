//! Phased genotypes and per-locus genotype lists.

use crate::allele_set::AlleleBits;
use crate::locus::Locus;

/// Paternal / maternal side selectors, used to index parent pairs,
/// genotype sides, and inheritance flags alike.
pub const DAD: usize = 0;
pub const MOM: usize = 1;

/// Inheritance flag bits: which of a parent's two alleles may have been
/// transmitted to a child.
pub const INHERIT_PATERNAL: u8 = 1;
pub const INHERIT_MATERNAL: u8 = 2;
pub const INHERIT_EITHER: u8 = 3;

/// One phased genotype: an ordered (paternal, maternal) pair of allele-set
/// identifiers with the matching bitmasks.
#[derive(Debug, Clone, PartialEq)]
pub struct Genotype {
    pub alleles: [usize; 2],
    pub bits: [AlleleBits; 2],
    /// Set by genotype elimination: per parent, which of that parent's
    /// alleles is compatible with this genotype.
    pub inheritance: [u8; 2],
    /// Stable index into the person's list, used for conditional-table
    /// flattening. Assigned once when the lists are frozen.
    pub position: usize,
    /// Index of the phase partner (same alleles, swapped) if present.
    pub dual: Option<usize>,
    /// Founder weight: product of the two allele-set frequencies.
    pub weight: f64,
    /// Penetrance factor at a trait locus; 1 for markers.
    pub penetrance: f64,
}

impl Genotype {
    pub fn new(locus: &Locus, paternal: usize, maternal: usize) -> Genotype {
        Genotype {
            alleles: [paternal, maternal],
            bits: [locus.set(paternal).bits.clone(), locus.set(maternal).bits.clone()],
            inheritance: [INHERIT_EITHER; 2],
            position: 0,
            dual: None,
            weight: locus.set(paternal).sum_freq * locus.set(maternal).sum_freq,
            penetrance: 1.0,
        }
    }

    pub fn is_het(&self) -> bool {
        self.alleles[DAD] != self.alleles[MOM]
    }
}

/// Assign positions and rediscover dual (phase-partner) links after the
/// list has settled. Recoding and elimination can remove or rewrite
/// entries, so both are recomputed from the surviving alleles.
pub fn freeze_positions(genotypes: &mut [Genotype]) {
    for i in 0..genotypes.len() {
        genotypes[i].position = i;
        genotypes[i].dual = None;
    }
    for i in 0..genotypes.len() {
        if !genotypes[i].is_het() || genotypes[i].dual.is_some() {
            continue;
        }
        let swapped = [genotypes[i].alleles[MOM], genotypes[i].alleles[DAD]];
        if let Some(j) = genotypes.iter().position(|g| g.alleles == swapped) {
            genotypes[i].dual = Some(j);
            genotypes[j].dual = Some(i);
        }
    }
}

/// All ordered allele-set pairs over the original alleles of a locus:
/// the baseline list for an untyped person.
pub fn all_pairs(locus: &Locus) -> Vec<Genotype> {
    let n = locus.num_original_alleles();
    let mut genotypes = Vec::with_capacity(n * n);
    for paternal in 1..=n {
        for maternal in 1..=n {
            genotypes.push(Genotype::new(locus, paternal, maternal));
        }
    }
    genotypes
}

/// The list for a typed person: the observed pair, plus its phase partner
/// when the observation is heterozygous and unphased.
pub fn observed_pair(locus: &Locus, a1: usize, a2: usize, phased: bool) -> Vec<Genotype> {
    let mut genotypes = vec![Genotype::new(locus, a1, a2)];
    if a1 != a2 && !phased {
        genotypes.push(Genotype::new(locus, a2, a1));
    }
    genotypes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locus::Locus;

    #[test]
    fn untyped_person_gets_every_ordered_pair() {
        let locus = Locus::marker("m", &[0.6, 0.4]);
        let genotypes = all_pairs(&locus);
        assert_eq!(genotypes.len(), 4);
        assert!((genotypes[0].weight - 0.36).abs() < 1e-12);
        assert!((genotypes[1].weight - 0.24).abs() < 1e-12);
    }

    #[test]
    fn unphased_het_observation_yields_a_dual_pair() {
        let locus = Locus::marker("m", &[0.6, 0.4]);
        let mut genotypes = observed_pair(&locus, 1, 2, false);
        assert_eq!(genotypes.len(), 2);
        freeze_positions(&mut genotypes);
        assert_eq!(genotypes[0].dual, Some(1));
        assert_eq!(genotypes[1].dual, Some(0));

        let phased = observed_pair(&locus, 1, 2, true);
        assert_eq!(phased.len(), 1);
        let homozygous = observed_pair(&locus, 2, 2, false);
        assert_eq!(homozygous.len(), 1);
    }

    #[test]
    fn freeze_relinks_duals_after_removal() {
        let locus = Locus::marker("m", &[0.5, 0.3, 0.2]);
        let mut genotypes = all_pairs(&locus);
        // drop everything involving allele 3
        genotypes.retain(|g| !g.alleles.contains(&3));
        freeze_positions(&mut genotypes);
        for (i, g) in genotypes.iter().enumerate() {
            assert_eq!(g.position, i);
            if g.is_het() {
                let partner = g.dual.expect("het genotype lost its dual");
                assert_eq!(genotypes[partner].alleles, [g.alleles[MOM], g.alleles[DAD]]);
            } else {
                assert_eq!(g.dual, None);
            }
        }
    }
}
