//! Loop-breaker enumeration: a looped pedigree is made acyclic by
//! duplicating one or more persons; the likelihood is then the sum, over
//! every multi-locus genotype assignment of the duplicated individuals, of
//! the peeled likelihood with those genotypes pinned.

use itertools::Itertools;
use log::{debug, warn};

use crate::elimination::{pedigree_genotype_elimination, Elimination};
use crate::genotype::Genotype;
use crate::peeling::{peel_once, PeelContext, PeelWorkspace};
use crate::pedigree::Pedigree;

/// Sum the pedigree likelihood over every loop-breaker genotype
/// configuration. Genotype lists are restored from their snapshots between
/// configurations; configurations ruled out by re-elimination contribute
/// nothing. Exhausting them all without one feasible configuration is
/// infeasibility for the whole pedigree.
pub(crate) fn sum_over_configurations(
    ped: &mut Pedigree,
    ctx: &PeelContext,
    ws: &mut PeelWorkspace,
) -> f64 {
    let breakers = ped.loop_breakers.clone();

    // every multi-locus genotype vector of every breaker, off the saved lists
    let vectors: Vec<Vec<Vec<Genotype>>> = breakers
        .iter()
        .map(|&breaker| {
            ctx.sub
                .indices
                .iter()
                .map(|&orig| ped.persons[breaker.0].loci[orig].saved.clone())
                .multi_cartesian_product()
                .collect()
        })
        .collect();
    if vectors.iter().any(Vec::is_empty) {
        warn!("a loop breaker in pedigree {} has no genotypes at all", ped.id);
        return 0.0;
    }

    let mut counters = vec![0usize; breakers.len()];
    let mut total = 0.0;
    let mut any_feasible = false;
    let mut configurations = 0u64;

    loop {
        configurations += 1;
        ped.restore_from_saved();
        for (breaker_ix, &breaker) in breakers.iter().enumerate() {
            let combo = &vectors[breaker_ix][counters[breaker_ix]];
            for (slot, &orig) in ctx.sub.indices.iter().enumerate() {
                ped.persons[breaker.0].loci[orig].genotypes = vec![combo[slot].clone()];
            }
        }

        // with the breakers fixed, re-run elimination so the rest of the
        // pedigree reflects the pinned genotypes
        let feasible = ctx.sub.indices.iter().all(|&orig| {
            !matches!(
                pedigree_genotype_elimination(ped, orig, ctx.options.sex_linked),
                Elimination::Infeasible(_)
            )
        });
        if feasible {
            any_feasible = true;
            total += peel_once(ped, ctx, ws);
        }

        // odometer over the breaker vectors
        let mut rolled_over = true;
        for (counter, vector) in counters.iter_mut().zip(vectors.iter()) {
            *counter += 1;
            if *counter < vector.len() {
                rolled_over = false;
                break;
            }
            *counter = 0;
        }
        if rolled_over {
            break;
        }
    }

    ped.restore_from_saved();
    debug!(
        "pedigree {}: summed {configurations} loop-breaker configuration(s)",
        ped.id
    );
    if !any_feasible {
        warn!("pedigree {}: no feasible loop-breaker configuration", ped.id);
    }
    total
}
