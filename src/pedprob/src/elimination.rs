//! Mendelian genotype elimination over nuclear families, iterated to a
//! fixed point. A child's paternal allele has to come from the father and
//! its maternal allele from the mother, so a parent genotype survives only
//! if every child still has a compatible genotype, and vice versa.

use log::{debug, warn};

use crate::genotype::{Genotype, INHERIT_EITHER, INHERIT_MATERNAL, INHERIT_PATERNAL, DAD, MOM};
use crate::pedigree::{Pedigree, PersonId, Sex};

/// Outcome of an elimination pass over one locus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elimination {
    /// Fixed point reached; the total number of genotypes removed.
    Pruned(usize),
    /// Some person's list emptied: the pedigree cannot produce the data at
    /// this locus and its likelihood is zero.
    Infeasible(PersonId),
}

/// Which of a parent's alleles could have produced this child genotype on
/// the parent's side. `None` means the pair is Mendelian-impossible.
///
/// The test runs on allele-set masks: the parent's allele must be a subset
/// of the child's allele set on the matching side. An X-linked father with
/// a male child transmits no X, so anything goes there.
pub fn parent_child_compatibility(
    parent_geno: &Genotype,
    child_geno: &Genotype,
    parent_side: usize,
    child_sex: Sex,
    sex_linked: bool,
) -> Option<u8> {
    if sex_linked && parent_side == DAD && child_sex == Sex::Male {
        return Some(INHERIT_EITHER);
    }
    let child_bits = &child_geno.bits[parent_side];
    let mut flag = 0u8;
    if parent_geno.bits[DAD].is_subset_of(child_bits) {
        flag |= INHERIT_PATERNAL;
    }
    if parent_geno.bits[MOM].is_subset_of(child_bits) {
        flag |= INHERIT_MATERNAL;
    }
    if flag == 0 {
        None
    } else {
        Some(flag)
    }
}

fn compatible(
    parent_geno: &Genotype,
    child_geno: &Genotype,
    parent_side: usize,
    child_sex: Sex,
    sex_linked: bool,
) -> bool {
    parent_child_compatibility(parent_geno, child_geno, parent_side, child_sex, sex_linked)
        .is_some()
}

/// Drop the genotypes not marked for keeping from `person`'s list at
/// `locus` (resolved through a duplicate's original).
fn remove_unkept(ped: &mut Pedigree, person: PersonId, locus: usize, keep: &[bool]) -> usize {
    let owner = ped.genotype_owner(person);
    let list = &mut ped.persons[owner.0].loci[locus].genotypes;
    let before = list.len();
    let mut ix = 0;
    list.retain(|_| {
        let kept = keep[ix];
        ix += 1;
        kept
    });
    before - list.len()
}

/// Filter 1: a parent genotype survives only if every child has at least
/// one genotype compatible with it.
fn parent_children(
    ped: &mut Pedigree,
    family: usize,
    parent_side: usize,
    locus: usize,
    sex_linked: bool,
) -> Result<usize, PersonId> {
    let parent = ped.families[family].parents[parent_side];
    let children = ped.families[family].children.clone();
    let keep: Vec<bool> = ped
        .genotypes(parent, locus)
        .iter()
        .map(|pg| {
            children.iter().all(|&child| {
                let child_sex = ped.persons[child.0].sex;
                ped.genotypes(child, locus)
                    .iter()
                    .any(|cg| compatible(pg, cg, parent_side, child_sex, sex_linked))
            })
        })
        .collect();

    let removed = remove_unkept(ped, parent, locus, &keep);
    if ped.genotypes(parent, locus).is_empty() {
        return Err(parent);
    }
    Ok(removed)
}

/// Filter 2: a child genotype survives only if some parent-genotype pair is
/// jointly compatible with it.
fn child_parents(
    ped: &mut Pedigree,
    family: usize,
    child: PersonId,
    locus: usize,
    sex_linked: bool,
) -> Result<usize, PersonId> {
    let [dad, mom] = ped.families[family].parents;
    let child_sex = ped.persons[child.0].sex;
    let keep: Vec<bool> = ped
        .genotypes(child, locus)
        .iter()
        .map(|cg| {
            ped.genotypes(dad, locus).iter().any(|dg| {
                compatible(dg, cg, DAD, child_sex, sex_linked)
                    && ped
                        .genotypes(mom, locus)
                        .iter()
                        .any(|mg| compatible(mg, cg, MOM, child_sex, sex_linked))
            })
        })
        .collect();

    let removed = remove_unkept(ped, child, locus, &keep);
    if ped.genotypes(child, locus).is_empty() {
        return Err(child);
    }
    Ok(removed)
}

/// Filter 3: a parent genotype survives only if a spouse genotype exists
/// such that the pair satisfies every child.
fn parent_spouse_children(
    ped: &mut Pedigree,
    family: usize,
    parent_side: usize,
    locus: usize,
    sex_linked: bool,
) -> Result<usize, PersonId> {
    let parent = ped.families[family].parents[parent_side];
    let spouse_side = 1 - parent_side;
    let spouse = ped.families[family].parents[spouse_side];
    let children = ped.families[family].children.clone();

    let pair_satisfies_children = |pg: &Genotype, sg: &Genotype| {
        children.iter().all(|&child| {
            let child_sex = ped.persons[child.0].sex;
            ped.genotypes(child, locus).iter().any(|cg| {
                compatible(pg, cg, parent_side, child_sex, sex_linked)
                    && compatible(sg, cg, spouse_side, child_sex, sex_linked)
            })
        })
    };
    let keep: Vec<bool> = ped
        .genotypes(parent, locus)
        .iter()
        .map(|pg| ped.genotypes(spouse, locus).iter().any(|sg| pair_satisfies_children(pg, sg)))
        .collect();

    let removed = remove_unkept(ped, parent, locus, &keep);
    if ped.genotypes(parent, locus).is_empty() {
        return Err(parent);
    }
    Ok(removed)
}

/// Filter 4: a child genotype survives only if a parent pair exists that
/// satisfies both this child and every sibling.
fn child_siblings_parents(
    ped: &mut Pedigree,
    family: usize,
    child: PersonId,
    locus: usize,
    sex_linked: bool,
) -> Result<usize, PersonId> {
    let [dad, mom] = ped.families[family].parents;
    let child_sex = ped.persons[child.0].sex;
    let siblings: Vec<PersonId> =
        ped.families[family].children.iter().copied().filter(|&c| c != child).collect();

    let pair_satisfies_siblings = |dg: &Genotype, mg: &Genotype| {
        siblings.iter().all(|&sib| {
            let sib_sex = ped.persons[sib.0].sex;
            ped.genotypes(sib, locus).iter().any(|sg| {
                compatible(dg, sg, DAD, sib_sex, sex_linked)
                    && compatible(mg, sg, MOM, sib_sex, sex_linked)
            })
        })
    };
    let keep: Vec<bool> = ped
        .genotypes(child, locus)
        .iter()
        .map(|cg| {
            ped.genotypes(dad, locus).iter().any(|dg| {
                compatible(dg, cg, DAD, child_sex, sex_linked)
                    && ped.genotypes(mom, locus).iter().any(|mg| {
                        compatible(mg, cg, MOM, child_sex, sex_linked)
                            && pair_satisfies_siblings(dg, mg)
                    })
            })
        })
        .collect();

    let removed = remove_unkept(ped, child, locus, &keep);
    if ped.genotypes(child, locus).is_empty() {
        return Err(child);
    }
    Ok(removed)
}

fn nuclear_family_elimination(
    ped: &mut Pedigree,
    family: usize,
    locus: usize,
    sex_linked: bool,
) -> Result<usize, PersonId> {
    let mut removed = 0;
    removed += parent_children(ped, family, DAD, locus, sex_linked)?;
    removed += parent_children(ped, family, MOM, locus, sex_linked)?;
    for child_ix in 0..ped.families[family].children.len() {
        let child = ped.families[family].children[child_ix];
        removed += child_parents(ped, family, child, locus, sex_linked)?;
    }
    removed += parent_spouse_children(ped, family, DAD, locus, sex_linked)?;
    removed += parent_spouse_children(ped, family, MOM, locus, sex_linked)?;
    for child_ix in 0..ped.families[family].children.len() {
        let child = ped.families[family].children[child_ix];
        removed += child_siblings_parents(ped, family, child, locus, sex_linked)?;
    }
    Ok(removed)
}

/// Run the four filters over every nuclear family until nothing more can
/// be removed.
pub fn pedigree_genotype_elimination(
    ped: &mut Pedigree,
    locus: usize,
    sex_linked: bool,
) -> Elimination {
    let mut total = 0;
    let mut pass = 1;
    loop {
        let mut removed_this_pass = 0;
        for family in 0..ped.families.len() {
            match nuclear_family_elimination(ped, family, locus, sex_linked) {
                Ok(removed) => removed_this_pass += removed,
                Err(person) => {
                    warn!(
                        "pedigree {} person {} is not compatible at locus {}",
                        ped.id, ped.persons[person.0].id, locus
                    );
                    return Elimination::Infeasible(person);
                }
            }
        }
        total += removed_this_pass;
        debug!("genotype elimination pass {pass}: removed {removed_this_pass}");
        if removed_this_pass == 0 {
            return Elimination::Pruned(total);
        }
        pass += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locus::{Locus, LocusList};
    use crate::pedigree::{PersonDef, Phenotype, Sex};

    fn marker_loci(freqs: &[f64]) -> LocusList {
        let mut loci = LocusList::new();
        loci.push(Locus::marker("m1", freqs));
        loci
    }

    fn build(defs: &[PersonDef], loci: &LocusList) -> Pedigree {
        let mut ped = Pedigree::assemble("t", defs).unwrap();
        ped.build_genotypes(loci).unwrap();
        ped
    }

    fn geno(a: usize, b: usize) -> Phenotype {
        Phenotype::Genotyped { alleles: (a, b), phased: false }
    }

    #[test]
    fn typed_child_constrains_untyped_parents() {
        let loci = marker_loci(&[0.4, 0.3, 0.3]);
        let defs = vec![
            PersonDef::new("dad", Sex::Male).with_phenotypes(vec![Phenotype::Untyped]),
            PersonDef::new("mom", Sex::Female).with_phenotypes(vec![Phenotype::Untyped]),
            PersonDef::new("kid", Sex::Male)
                .with_parents("dad", "mom")
                .with_phenotypes(vec![geno(3, 3)]),
        ];
        let mut ped = build(&defs, &loci);
        assert_eq!(ped.genotypes(PersonId(0), 0).len(), 9);
        let outcome = pedigree_genotype_elimination(&mut ped, 0, false);
        assert!(matches!(outcome, Elimination::Pruned(_)));
        // every surviving parent genotype must carry a 3
        for parent in [PersonId(0), PersonId(1)] {
            assert!(!ped.genotypes(parent, 0).is_empty());
            for g in ped.genotypes(parent, 0) {
                assert!(g.alleles.contains(&3), "{:?} survived", g.alleles);
            }
        }
    }

    #[test]
    fn impossible_trio_is_infeasible() {
        let loci = marker_loci(&[0.5, 0.5]);
        let defs = vec![
            PersonDef::new("dad", Sex::Male).with_phenotypes(vec![geno(1, 1)]),
            PersonDef::new("mom", Sex::Female).with_phenotypes(vec![geno(1, 1)]),
            PersonDef::new("kid", Sex::Male)
                .with_parents("dad", "mom")
                .with_phenotypes(vec![geno(2, 2)]),
        ];
        let mut ped = build(&defs, &loci);
        assert!(matches!(
            pedigree_genotype_elimination(&mut ped, 0, false),
            Elimination::Infeasible(_)
        ));
    }

    #[test]
    fn elimination_is_idempotent() {
        let loci = marker_loci(&[0.4, 0.3, 0.3]);
        let defs = vec![
            PersonDef::new("dad", Sex::Male).with_phenotypes(vec![geno(1, 2)]),
            PersonDef::new("mom", Sex::Female).with_phenotypes(vec![Phenotype::Untyped]),
            PersonDef::new("kid1", Sex::Male)
                .with_parents("dad", "mom")
                .with_phenotypes(vec![geno(2, 3)]),
            PersonDef::new("kid2", Sex::Female)
                .with_parents("dad", "mom")
                .with_phenotypes(vec![Phenotype::Untyped]),
        ];
        let mut ped = build(&defs, &loci);
        let first = pedigree_genotype_elimination(&mut ped, 0, false);
        assert!(matches!(first, Elimination::Pruned(n) if n > 0));
        let second = pedigree_genotype_elimination(&mut ped, 0, false);
        assert_eq!(second, Elimination::Pruned(0));
    }

    #[test]
    fn mendelian_soundness_after_elimination() {
        let loci = marker_loci(&[0.25, 0.25, 0.25, 0.25]);
        let defs = vec![
            PersonDef::new("dad", Sex::Male).with_phenotypes(vec![Phenotype::Untyped]),
            PersonDef::new("mom", Sex::Female).with_phenotypes(vec![geno(1, 4)]),
            PersonDef::new("kid1", Sex::Male)
                .with_parents("dad", "mom")
                .with_phenotypes(vec![geno(1, 2)]),
            PersonDef::new("kid2", Sex::Female)
                .with_parents("dad", "mom")
                .with_phenotypes(vec![Phenotype::Untyped]),
        ];
        let mut ped = build(&defs, &loci);
        pedigree_genotype_elimination(&mut ped, 0, false);
        // every surviving parent genotype is witnessed by every child
        for parent_side in [DAD, MOM] {
            let parent = ped.families[0].parents[parent_side];
            for pg in ped.genotypes(parent, 0) {
                for &child in &ped.families[0].children {
                    let sex = ped.persons[child.0].sex;
                    assert!(ped
                        .genotypes(child, 0)
                        .iter()
                        .any(|cg| compatible(pg, cg, parent_side, sex, false)));
                }
            }
        }
    }

    #[test]
    fn x_linked_father_never_blocks_a_son() {
        let loci = marker_loci(&[0.5, 0.5]);
        let defs = vec![
            PersonDef::new("dad", Sex::Male).with_phenotypes(vec![geno(1, 1)]),
            PersonDef::new("mom", Sex::Female).with_phenotypes(vec![geno(2, 2)]),
            PersonDef::new("son", Sex::Male)
                .with_parents("dad", "mom")
                .with_phenotypes(vec![geno(2, 2)]),
        ];
        // autosomal: impossible; X-linked: the son's X comes from mom only
        let mut ped = build(&defs, &loci);
        assert!(matches!(
            pedigree_genotype_elimination(&mut ped, 0, false),
            Elimination::Infeasible(_)
        ));
        let mut ped = build(&defs, &loci);
        assert!(matches!(
            pedigree_genotype_elimination(&mut ped, 0, true),
            Elimination::Pruned(_)
        ));
    }
}
