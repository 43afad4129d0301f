//! Parental-pair enumeration: for one nuclear family and one locus, every
//! compatible ordered pair of parent genotypes, each carrying the children's
//! shadow genotype lists and inheritance patterns. Pairs differing only by a
//! phase flip of one parent are emitted contiguously so the peeling engine
//! can recognise the group and reuse work across phases.

use crate::elimination::parent_child_compatibility;
use crate::genotype::{DAD, MOM};
use crate::pedigree::{FamilyId, Pedigree};

/// One parental pair at one locus, with the per-child compatible genotypes.
#[derive(Debug, Clone)]
pub struct ParentalPair {
    /// Index into each parent's current genotype list.
    pub genotypes: [usize; 2],
    /// 1 when that parent's phase is flipped relative to the group leader.
    pub phase: [u8; 2],
    /// Per child, the indices of its compatible genotypes (the shadow list).
    pub child_genotypes: Vec<Vec<usize>>,
    /// Per parent, per child, per shadow entry: the 2-bit inheritance
    /// pattern. A flipped parent phase flips the pattern by XOR 3.
    pub child_inheritance: [Vec<Vec<u8>>; 2],
}

/// Build the parental-pair list for `family` at original locus `locus`.
/// The head parent's genotypes drive the outer loop; the head is the
/// proband when a parent is the proband.
pub fn construct_parental_pairs(
    ped: &Pedigree,
    family: FamilyId,
    locus: usize,
    sex_linked: bool,
) -> Vec<ParentalPair> {
    let fam = &ped.families[family.0];
    let head = fam.head;
    let spouse = fam.spouse;
    let head_list = ped.genotypes(fam.parents[head], locus);
    let spouse_list = ped.genotypes(fam.parents[spouse], locus);

    let mut pairs = Vec::new();
    for head_ix in 0..head_list.len() {
        // a genotype whose dual precedes it was already covered as a phase
        // variant of that dual
        if head_list[head_ix].dual.is_some_and(|d| d < head_ix) {
            continue;
        }
        for spouse_ix in 0..spouse_list.len() {
            if spouse_list[spouse_ix].dual.is_some_and(|d| d < spouse_ix) {
                continue;
            }
            let mut ordered = [0usize; 2];
            ordered[head] = head_ix;
            ordered[spouse] = spouse_ix;

            let Some((child_genotypes, child_inheritance)) =
                shadow_eliminate(ped, family, locus, ordered, sex_linked)
            else {
                continue;
            };

            // one pair per phase combination, group leader first
            let head_variants = variant_list(head_list, head_ix);
            let spouse_variants = variant_list(spouse_list, spouse_ix);
            for (h_adjust, &h_ix) in head_variants.iter().enumerate() {
                for (s_adjust, &s_ix) in spouse_variants.iter().enumerate() {
                    let mut genotypes = [0usize; 2];
                    genotypes[head] = h_ix;
                    genotypes[spouse] = s_ix;
                    let mut phase = [0u8; 2];
                    phase[head] = h_adjust as u8;
                    phase[spouse] = s_adjust as u8;

                    let adjusted = [
                        flip_inheritance(&child_inheritance[DAD], phase[DAD] != 0),
                        flip_inheritance(&child_inheritance[MOM], phase[MOM] != 0),
                    ];
                    pairs.push(ParentalPair {
                        genotypes,
                        phase,
                        child_genotypes: child_genotypes.clone(),
                        child_inheritance: adjusted,
                    });
                }
            }
        }
    }
    pairs
}

fn variant_list(list: &[crate::genotype::Genotype], canonical: usize) -> Vec<usize> {
    match list[canonical].dual {
        Some(dual) if dual > canonical => vec![canonical, dual],
        _ => vec![canonical],
    }
}

fn flip_inheritance(per_child: &[Vec<u8>], flip: bool) -> Vec<Vec<u8>> {
    if !flip {
        return per_child.to_vec();
    }
    per_child
        .iter()
        .map(|flags| flags.iter().map(|f| f ^ 3).collect())
        .collect()
}

/// For a candidate pair, walk every child's genotype list and keep the
/// entries compatible with both parents. Any child with an empty shadow
/// list vetoes the pair.
#[allow(clippy::type_complexity)]
fn shadow_eliminate(
    ped: &Pedigree,
    family: FamilyId,
    locus: usize,
    pair: [usize; 2],
    sex_linked: bool,
) -> Option<(Vec<Vec<usize>>, [Vec<Vec<u8>>; 2])> {
    let fam = &ped.families[family.0];
    let dad_geno = &ped.genotypes(fam.parents[DAD], locus)[pair[DAD]];
    let mom_geno = &ped.genotypes(fam.parents[MOM], locus)[pair[MOM]];

    let mut child_genotypes = Vec::with_capacity(fam.children.len());
    let mut inheritance = [Vec::with_capacity(fam.children.len()), Vec::with_capacity(fam.children.len())];
    for &child in &fam.children {
        let sex = ped.persons[child.0].sex;
        let mut shadow = Vec::new();
        let mut dad_flags = Vec::new();
        let mut mom_flags = Vec::new();
        for (k, child_geno) in ped.genotypes(child, locus).iter().enumerate() {
            let Some(dad_flag) =
                parent_child_compatibility(dad_geno, child_geno, DAD, sex, sex_linked)
            else {
                continue;
            };
            let Some(mom_flag) =
                parent_child_compatibility(mom_geno, child_geno, MOM, sex, sex_linked)
            else {
                continue;
            };
            shadow.push(k);
            dad_flags.push(dad_flag);
            mom_flags.push(mom_flag);
        }
        if shadow.is_empty() {
            return None;
        }
        child_genotypes.push(shadow);
        inheritance[DAD].push(dad_flags);
        inheritance[MOM].push(mom_flags);
    }
    Some((child_genotypes, inheritance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elimination::pedigree_genotype_elimination;
    use crate::locus::{Locus, LocusList};
    use crate::pedigree::{PersonDef, Phenotype, Sex};

    fn geno(a: usize, b: usize) -> Phenotype {
        Phenotype::Genotyped { alleles: (a, b), phased: false }
    }

    fn family(defs: &[PersonDef], loci: &LocusList) -> Pedigree {
        let mut ped = Pedigree::assemble("t", defs).unwrap();
        ped.build_genotypes(loci).unwrap();
        pedigree_genotype_elimination(&mut ped, 0, false);
        ped.freeze_and_save();
        ped
    }

    #[test]
    fn phase_variants_are_contiguous_behind_their_leader() {
        let mut loci = LocusList::new();
        loci.push(Locus::marker("m", &[0.6, 0.4]));
        let defs = vec![
            PersonDef::new("dad", Sex::Male).with_phenotypes(vec![geno(1, 2)]),
            PersonDef::new("mom", Sex::Female).with_phenotypes(vec![geno(1, 1)]),
            PersonDef::new("kid", Sex::Male)
                .with_parents("dad", "mom")
                .with_phenotypes(vec![geno(1, 1)]),
        ];
        let ped = family(&defs, &loci);
        let pairs = construct_parental_pairs(&ped, FamilyId(0), 0, false);
        // dad is an unphased het: one canonical pair plus its flip
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].phase, [0, 0]);
        assert_eq!(pairs[1].phase, [1, 0]);
        assert_ne!(pairs[0].genotypes[DAD], pairs[1].genotypes[DAD]);
        assert_eq!(pairs[0].genotypes[MOM], pairs[1].genotypes[MOM]);
    }

    #[test]
    fn flipped_phase_flips_inheritance_patterns() {
        let mut loci = LocusList::new();
        loci.push(Locus::marker("m", &[0.6, 0.4]));
        let defs = vec![
            PersonDef::new("dad", Sex::Male).with_phenotypes(vec![geno(1, 2)]),
            PersonDef::new("mom", Sex::Female).with_phenotypes(vec![geno(1, 1)]),
            PersonDef::new("kid", Sex::Male)
                .with_parents("dad", "mom")
                .with_phenotypes(vec![geno(1, 1)]),
        ];
        let ped = family(&defs, &loci);
        let pairs = construct_parental_pairs(&ped, FamilyId(0), 0, false);
        let leader = &pairs[0];
        let flipped = &pairs[1];
        for (a, b) in leader.child_inheritance[DAD][0]
            .iter()
            .zip(flipped.child_inheritance[DAD][0].iter())
        {
            assert_eq!(a ^ 3, *b);
        }
        // the mom side is untouched by the dad flip
        assert_eq!(leader.child_inheritance[MOM], flipped.child_inheritance[MOM]);
    }

    #[test]
    fn incompatible_pairs_are_dropped_entirely() {
        let mut loci = LocusList::new();
        loci.push(Locus::marker("m", &[0.5, 0.3, 0.2]));
        let defs = vec![
            PersonDef::new("dad", Sex::Male).with_phenotypes(vec![Phenotype::Untyped]),
            PersonDef::new("mom", Sex::Female).with_phenotypes(vec![Phenotype::Untyped]),
            PersonDef::new("kid", Sex::Male)
                .with_parents("dad", "mom")
                .with_phenotypes(vec![geno(1, 2)]),
        ];
        let ped = family(&defs, &loci);
        let pairs = construct_parental_pairs(&ped, FamilyId(0), 0, false);
        assert!(!pairs.is_empty());
        // every emitted pair satisfies the child
        for pair in &pairs {
            assert_eq!(pair.child_genotypes.len(), 1);
            assert!(!pair.child_genotypes[0].is_empty());
        }
        // no pair may pass where dad cannot supply 1 or 2
        let dad_list = ped.genotypes(crate::pedigree::PersonId(0), 0);
        for pair in &pairs {
            let dad_geno = &dad_list[pair.genotypes[DAD]];
            assert!(dad_geno.alleles.contains(&1) || dad_geno.alleles.contains(&2));
        }
    }

    #[test]
    fn head_follows_the_proband_parent() {
        let mut loci = LocusList::new();
        loci.push(Locus::marker("m", &[0.6, 0.4]));
        let defs = vec![
            PersonDef::new("dad", Sex::Male).with_phenotypes(vec![geno(1, 2)]),
            PersonDef::new("mom", Sex::Female).with_phenotypes(vec![geno(1, 2)]).proband(),
            PersonDef::new("kid", Sex::Male)
                .with_parents("dad", "mom")
                .with_phenotypes(vec![geno(1, 1)]),
        ];
        let mut ped = family(&defs, &loci);
        ped.families[0].head = MOM;
        ped.families[0].spouse = DAD;
        let pairs = construct_parental_pairs(&ped, FamilyId(0), 0, false);
        // both parents are unphased hets: 4 phase combinations per group
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[0].phase, [0, 0]);
        // head (mom) flips last within the group
        assert_eq!(pairs[1].phase, [1, 0]);
        assert_eq!(pairs[2].phase, [0, 1]);
        assert_eq!(pairs[3].phase, [1, 1]);
    }
}
