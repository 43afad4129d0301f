//! Front door for one evaluation: run the preparation pipeline (baseline
//! genotypes, elimination, recoding, penetrances, snapshots, conditional
//! tables), build the transmission tensor, and peel.

use log::warn;

use crate::elimination::{pedigree_genotype_elimination, Elimination};
use crate::error::PedigreeError;
use crate::locus::{LocusList, SubLocusList};
use crate::peeling::{pedigree_likelihood, EngineOptions, PeelContext};
use crate::pedigree::Pedigree;
use crate::recoding::allele_set_recoding;
use crate::transmission::TransmissionMatrix;

/// Make a pedigree ready for likelihood evaluation over one analysis
/// sub-list. Returns `false` when the pedigree is Mendelian-infeasible at
/// some locus, in which case its likelihood is zero by definition.
pub fn prepare_pedigree(
    ped: &mut Pedigree,
    loci: &mut LocusList,
    sub: &SubLocusList,
    options: &EngineOptions,
) -> Result<bool, PedigreeError> {
    ped.build_genotypes(loci)?;

    for &orig in &sub.indices {
        if let Elimination::Infeasible(person) =
            pedigree_genotype_elimination(ped, orig, options.sex_linked)
        {
            warn!(
                "pedigree {} is infeasible at locus {orig} (person {})",
                ped.id, ped.persons[person.0].id
            );
            return Ok(false);
        }
    }
    for &orig in &sub.indices {
        allele_set_recoding(ped, loci, orig, options.sex_linked);
    }
    ped.apply_penetrances(loci);
    ped.freeze_and_save();
    ped.allocate_conditionals(&sub.indices);
    Ok(true)
}

/// Prepare and evaluate in one go. Infeasible pedigrees yield zero.
pub fn evaluate_pedigree(
    ped: &mut Pedigree,
    loci: &mut LocusList,
    sub: &SubLocusList,
    options: EngineOptions,
) -> Result<f64, PedigreeError> {
    if !prepare_pedigree(ped, loci, sub, &options)? {
        return Ok(0.0);
    }
    let xmission = TransmissionMatrix::build(sub);
    let ctx = PeelContext { loci: &*loci, sub, xmission: &xmission, options };
    Ok(pedigree_likelihood(ped, &ctx))
}

/// The log10 placeholder reported when any pedigree zeroes the set.
pub const LOG10_ZERO_SET: f64 = -9999.99;

/// Aggregate likelihood of a set of pedigrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetLikelihood {
    /// Product over the pedigrees, each raised to its case count.
    pub product: f64,
    /// Sum of the weighted log10 likelihoods, or [`LOG10_ZERO_SET`] when
    /// any pedigree contributes zero.
    pub log10: f64,
}

/// Evaluate every pedigree of a set and combine them multiplicatively.
/// `counts` weights each pedigree (case-control style repetition); pass an
/// empty slice when every pedigree occurs once. An infeasible pedigree
/// zeroes the whole set but evaluation still visits the rest, so their
/// per-pedigree likelihood slots stay meaningful.
pub fn evaluate_pedigree_set(
    pedigrees: &mut [Pedigree],
    counts: &[u32],
    loci: &mut LocusList,
    sub: &SubLocusList,
    options: EngineOptions,
) -> Result<SetLikelihood, PedigreeError> {
    let mut product = 1.0f64;
    let mut log10 = 0.0f64;
    let mut any_zero = false;

    for (ix, ped) in pedigrees.iter_mut().enumerate() {
        let likelihood = evaluate_pedigree(ped, loci, sub, options)?;
        let count = counts.get(ix).copied().unwrap_or(1);
        if likelihood <= 0.0 {
            any_zero = true;
            continue;
        }
        if count == 1 {
            product *= likelihood;
            log10 += likelihood.log10();
        } else {
            product *= likelihood.powi(count as i32);
            log10 += likelihood.log10() * f64::from(count);
        }
    }

    if any_zero {
        return Ok(SetLikelihood { product: 0.0, log10: LOG10_ZERO_SET });
    }
    Ok(SetLikelihood { product, log10 })
}
