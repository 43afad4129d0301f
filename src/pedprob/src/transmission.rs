//! The transmission-probability tensor: for every multi-locus inheritance
//! pattern, the probability that a parent produces a gamete with that
//! pattern, given the recombination fractions between successive
//! heterozygous loci. One entry per pattern in `{0..=3}^L`, three values per
//! entry (sex-averaged, male, female maps).
//!
//! Patterns use two bits per locus: 1 = paternal strand, 2 = maternal
//! strand, 3 = both (parent homozygous there), 0 = alias of 3 so that a
//! phase flip is a plain XOR of the packed index.

use crate::locus::SubLocusList;

pub const PATERNAL_ONLY: u8 = 1;
pub const MATERNAL_ONLY: u8 = 2;

#[derive(Debug, Clone)]
pub struct TransmissionMatrix {
    num_loci: usize,
    entries: Vec<[f64; 3]>,
}

impl TransmissionMatrix {
    /// Dense build over all `4^L` patterns. The tensor is immutable after
    /// this.
    pub fn build(sub: &SubLocusList) -> TransmissionMatrix {
        let num_loci = sub.len();
        let mut matrix = TransmissionMatrix {
            num_loci,
            entries: vec![[0.0; 3]; 4usize.pow(num_loci as u32)],
        };
        if num_loci > 0 {
            populate(&mut matrix, sub, [1.0; 3], [1.0; 3], [1.0; 3], 0, None, 0, 0);
        }
        matrix
    }

    pub fn num_loci(&self) -> usize {
        self.num_loci
    }

    /// The three map-flavor probabilities at a packed pattern index.
    pub fn prob(&self, index: usize) -> &[f64; 3] {
        &self.entries[index]
    }
}

/// Walk the loci left to right, carrying for each map flavor the probability
/// of ending at the previous locus without (`prob`) and with (`prob2`) a
/// recombination since the last heterozygous locus, plus the value at that
/// last het locus (`het_prob`) for trailing-homozygote patterns.
#[allow(clippy::too_many_arguments)]
fn populate(
    matrix: &mut TransmissionMatrix,
    sub: &SubLocusList,
    prob: [f64; 3],
    prob2: [f64; 3],
    het_prob: [f64; 3],
    cell: usize,
    last_het: Option<usize>,
    prev_pattern: u8,
    loc: usize,
) {
    let total = sub.len();
    let last = loc == total - 1;

    for pattern in 0u8..=3 {
        let mut new_prob = prob;
        let mut new_prob2 = prob2;
        let mut new_het_prob = het_prob;
        let mut new_last_het = last_het;
        let theta = |flavor: usize| sub.prev_distance[flavor][loc];

        if pattern == PATERNAL_ONLY || pattern == MATERNAL_ONLY {
            if last_het.is_some() {
                if prev_pattern == PATERNAL_ONLY || prev_pattern == MATERNAL_ONLY {
                    for flavor in 0..3 {
                        new_prob[flavor] = if prev_pattern == pattern {
                            prob[flavor] * (1.0 - theta(flavor))
                        } else {
                            prob[flavor] * theta(flavor)
                        };
                    }
                } else {
                    // previous locus homozygous: its split recombines in
                    for flavor in 0..3 {
                        new_prob[flavor] = if pattern == PATERNAL_ONLY {
                            prob[flavor] * (1.0 - theta(flavor)) + prob2[flavor] * theta(flavor)
                        } else {
                            prob2[flavor] * (1.0 - theta(flavor)) + prob[flavor] * theta(flavor)
                        };
                    }
                }
            } else {
                // the first heterozygous locus: either strand, evenly
                new_prob = [0.5; 3];
            }
            new_last_het = Some(loc);
            new_het_prob = new_prob;
        } else if last_het.is_some() {
            if last {
                // trailing homozygote: marginalise back to the last het
                new_prob = het_prob;
            } else if prev_pattern == 0 || prev_pattern == 3 {
                for flavor in 0..3 {
                    let th = theta(flavor);
                    new_prob[flavor] = prob[flavor] * (1.0 - th) + prob2[flavor] * th;
                    new_prob2[flavor] = prob2[flavor] * (1.0 - th) + prob[flavor] * th;
                }
            } else {
                // het -> homo: the strands split by recombination state
                for flavor in 0..3 {
                    let th = theta(flavor);
                    if prev_pattern == PATERNAL_ONLY {
                        new_prob[flavor] = prob[flavor] * (1.0 - th);
                        new_prob2[flavor] = prob[flavor] * th;
                    } else {
                        new_prob2[flavor] = prob[flavor] * (1.0 - th);
                        new_prob[flavor] = prob[flavor] * th;
                    }
                }
            }
        }

        let new_cell = cell * 4 + pattern as usize;
        if last {
            matrix.entries[new_cell] = new_prob;
        } else {
            populate(
                matrix,
                sub,
                new_prob,
                new_prob2,
                new_het_prob,
                new_cell,
                new_last_het,
                pattern,
                loc + 1,
            );
        }
    }
}
