//! Allele-set recoding: track which alleles are ever seen transmitted along
//! founder lines, clump the rest into super alleles, and rewrite untyped
//! persons' genotypes onto them. Fewer distinct genotypes, identical
//! likelihood: a super allele's frequency is the sum of its members, and no
//! super allele sits on a transmission path carrying one of its members.

use log::trace;

use crate::allele_set::AlleleBits;
use crate::genotype::{DAD, MOM};
use crate::locus::{LocusKind, LocusList};
use crate::pedigree::{Pedigree, PersonId, Sex};

/// Recode one marker locus over one pedigree. Trait loci are never recoded.
pub fn allele_set_recoding(
    ped: &mut Pedigree,
    loci: &mut LocusList,
    locus: usize,
    sex_linked: bool,
) {
    if loci.loci[locus].kind == LocusKind::Trait {
        return;
    }

    initialize_transmitted(ped, locus, loci.loci[locus].num_original_alleles());
    identify_transmitted(ped, locus, sex_linked);
    if ped.has_loop() {
        // duplicates are tracked on their originals; a second pass lets
        // evidence reached through a duplicate settle
        identify_transmitted(ped, locus, sex_linked);
    }
    recode_genotypes(ped, loci, locus);
}

/// Start every person with no transmitted alleles and a non-transmitted set
/// covering everything their genotype list mentions. A genotype already
/// carrying a multi-allele mask widens the set to all alleles.
fn initialize_transmitted(ped: &mut Pedigree, locus: usize, num_alleles: usize) {
    for person_ix in 0..ped.persons.len() {
        if ped.persons[person_ix].is_duplicate() {
            continue;
        }
        let mut nontransmitted = [AlleleBits::empty(num_alleles), AlleleBits::empty(num_alleles)];
        let mut widen = [false, false];
        for genotype in &ped.persons[person_ix].loci[locus].genotypes {
            for side in [DAD, MOM] {
                nontransmitted[side].union_with(&genotype.bits[side]);
                if genotype.bits[side].count() > 1 {
                    widen[side] = true;
                }
            }
        }
        for side in [DAD, MOM] {
            if widen[side] {
                nontransmitted[side] = AlleleBits::all(num_alleles);
            }
        }
        let pl = &mut ped.persons[person_ix].loci[locus];
        pl.transmitted = [AlleleBits::empty(num_alleles), AlleleBits::empty(num_alleles)];
        pl.nontransmitted = nontransmitted;
    }
}

/// Descend from every untyped person through their children, pulling
/// transmission evidence back up: a typed child pins down what the parent
/// passed, an untyped child contributes whatever its own subtree proved.
fn identify_transmitted(ped: &mut Pedigree, locus: usize, sex_linked: bool) {
    let mut done = vec![false; ped.persons.len()];
    for person_ix in 0..ped.persons.len() {
        let person = PersonId(person_ix);
        let first_child = ped.persons[person_ix].first_child;
        let owner = ped.genotype_owner(person);
        if ped.persons[owner.0].loci[locus].typed || done[person_ix] {
            continue;
        }
        done[person_ix] = true;
        let sex = ped.persons[person_ix].sex;
        let mut child = first_child;
        while let Some(c) = child {
            child = descend_child(ped, owner, sex, c, locus, sex_linked, &mut done);
        }
    }
}

/// Fold one child (and its descendants) into the mask pair of `owner`, the
/// person whose transmissions we are reconstructing. Returns the next
/// sibling on the parent's side of the chain.
fn descend_child(
    ped: &mut Pedigree,
    owner: PersonId,
    parent_sex: Sex,
    child: PersonId,
    locus: usize,
    sex_linked: bool,
    done: &mut Vec<bool>,
) -> Option<PersonId> {
    let parent_side = parent_sex.side();
    let child_typed = ped.persons[ped.genotype_owner(child).0].loci[locus].typed;

    if !child_typed {
        let child_sex = ped.persons[child.0].sex;
        let mut grandchild = ped.persons[child.0].first_child;
        while let Some(gc) = grandchild {
            grandchild = descend_child(ped, child, child_sex, gc, locus, sex_linked, done);
        }
        // a father passes no X to his sons
        if !(sex_linked && parent_sex == Sex::Male && ped.persons[child.0].sex == Sex::Male) {
            let child_non = ped.persons[child.0].loci[locus].nontransmitted[parent_side].clone();
            let child_trans = ped.persons[child.0].loci[locus].transmitted[parent_side].clone();
            let masks = &mut ped.persons[owner.0].loci[locus];
            for side in [DAD, MOM] {
                masks.nontransmitted[side].intersect_with(&child_non);
                masks.transmitted[side].union_with(&child_trans);
            }
        }
    } else if !(sex_linked && parent_sex == Sex::Male && ped.persons[child.0].sex == Sex::Male) {
        // typed child: its parent-of-origin alleles were transmitted
        let evidence: Vec<AlleleBits> = ped
            .genotypes(child, locus)
            .iter()
            .map(|g| g.bits[parent_side].clone())
            .collect();
        let masks = &mut ped.persons[owner.0].loci[locus];
        for bits in &evidence {
            for side in [DAD, MOM] {
                masks.nontransmitted[side].subtract(bits);
                masks.transmitted[side].union_with(bits);
            }
        }
    }

    if ped.persons[child.0].loop_breaker == 0 {
        done[child.0] = true;
    }
    ped.persons[child.0].next_sib[parent_side]
}

/// Rewrite genotypes onto super alleles: any untyped person whose
/// non-transmitted set still holds more than one allele gets (or reuses)
/// the matching super-allele set, and duplicates collapse out of the list.
fn recode_genotypes(ped: &mut Pedigree, loci: &mut LocusList, locus: usize) {
    for person_ix in 0..ped.persons.len() {
        if ped.persons[person_ix].is_duplicate()
            || ped.persons[person_ix].loci[locus].typed
        {
            continue;
        }
        for side in [DAD, MOM] {
            let mask = ped.persons[person_ix].loci[locus].nontransmitted[side].clone();
            if mask.count() <= 1 {
                continue;
            }
            let set_id = loci.loci[locus]
                .find_allele_set(&mask)
                .unwrap_or_else(|| loci.loci[locus].add_allele_set(mask.clone()));
            trace!(
                "person {} side {side}: recoding onto super allele {set_id}",
                ped.persons[person_ix].id
            );
            for genotype in &mut ped.persons[person_ix].loci[locus].genotypes {
                if genotype.bits[side].is_subset_of(&mask) {
                    genotype.alleles[side] = set_id;
                    genotype.bits[side] = mask.clone();
                }
            }
        }

        // deduplicate and refresh the founder weights from the set sums
        let locus_ref = &loci.loci[locus];
        let list = &mut ped.persons[person_ix].loci[locus].genotypes;
        let mut seen: Vec<[usize; 2]> = Vec::with_capacity(list.len());
        list.retain(|g| {
            if seen.contains(&g.alleles) {
                false
            } else {
                seen.push(g.alleles);
                true
            }
        });
        for genotype in list.iter_mut() {
            genotype.weight = locus_ref.set(genotype.alleles[DAD]).sum_freq
                * locus_ref.set(genotype.alleles[MOM]).sum_freq;
        }
    }
}
