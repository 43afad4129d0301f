//! Loci and locus lists: the master list of trait and marker loci as read,
//! LD parameter blocks between locus pairs, and the per-analysis sub-list
//! with its inter-locus recombination fractions.

use ahash::AHashMap;

use crate::allele_set::{singleton_sets, AlleleBits, AlleleSet};
use crate::error::PedigreeError;
use crate::trait_model::TraitLocus;

pub const MAP_SEX_AVERAGED: usize = 0;
pub const MAP_MALE: usize = 1;
pub const MAP_FEMALE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocusKind {
    Trait,
    Marker,
}

/// One locus: its original alleles and frequencies, the growing allele-set
/// list, and the trait attachment when this is a disease locus.
#[derive(Debug, Clone)]
pub struct Locus {
    pub name: String,
    pub kind: LocusKind,
    pub allele_freqs: Vec<f64>,
    /// Singletons first (ids `1..=n`), super alleles appended by recoding.
    pub allele_sets: Vec<AlleleSet>,
    pub trait_locus: Option<TraitLocus>,
    /// Sex-averaged map position in cM; meaningful for multipoint markers.
    pub map_position: f64,
}

impl Locus {
    pub fn marker(name: &str, allele_freqs: &[f64]) -> Locus {
        Locus::marker_at(name, allele_freqs, 0.0)
    }

    pub fn marker_at(name: &str, allele_freqs: &[f64], map_position: f64) -> Locus {
        Locus {
            name: name.to_owned(),
            kind: LocusKind::Marker,
            allele_freqs: allele_freqs.to_vec(),
            allele_sets: singleton_sets(allele_freqs),
            trait_locus: None,
            map_position,
        }
    }

    pub fn trait_locus(name: &str, allele_freqs: &[f64], trait_locus: TraitLocus) -> Locus {
        let map_position = trait_locus.map_position;
        Locus {
            name: name.to_owned(),
            kind: LocusKind::Trait,
            allele_freqs: allele_freqs.to_vec(),
            allele_sets: singleton_sets(allele_freqs),
            trait_locus: Some(trait_locus),
            map_position,
        }
    }

    pub fn num_original_alleles(&self) -> usize {
        self.allele_freqs.len()
    }

    /// The allele set with identifier `id` (1-based).
    pub fn set(&self, id: usize) -> &AlleleSet {
        &self.allele_sets[id - 1]
    }

    /// Linear scan for a set with this exact mask; the list stays short.
    pub fn find_allele_set(&self, bits: &AlleleBits) -> Option<usize> {
        self.allele_sets.iter().find(|s| &s.bits == bits).map(|s| s.id)
    }

    /// Append a new super-allele set and return its identifier.
    pub fn add_allele_set(&mut self, bits: AlleleBits) -> usize {
        let id = self.allele_sets.len() + 1;
        self.allele_sets.push(AlleleSet::from_bits(id, bits, &self.allele_freqs));
        id
    }
}

/// D' and haplotype-frequency parameters between two loci, indexed by the
/// original allele numbers of each.
#[derive(Debug, Clone)]
pub struct LdBlock {
    pub locus1: usize,
    pub locus2: usize,
    /// `(m-1) x (n-1)` D' values.
    pub dprime: Vec<Vec<f64>>,
    /// `m x n` haplotype frequencies.
    pub haplo_freq: Vec<Vec<f64>>,
}

impl LdBlock {
    /// Derive the full `m x n` haplotype-frequency matrix from the
    /// `(m-1) x (n-1)` D' block. Each D' scales against its admissible
    /// maximum; the last row and column absorb the leftovers so every row
    /// marginalises to its allele frequency.
    pub fn from_dprime(
        locus1: usize,
        locus2: usize,
        freqs1: &[f64],
        freqs2: &[f64],
        dprime: Vec<Vec<f64>>,
    ) -> LdBlock {
        let m = freqs1.len();
        let n = freqs2.len();
        let mut d = vec![vec![0.0f64; n]; m];
        for i in 0..m - 1 {
            for j in 0..n - 1 {
                let p = freqs1[i];
                let q = freqs2[j];
                let dp = dprime[i][j];
                let dmax = if dp >= 0.0 {
                    (p * (1.0 - q)).min((1.0 - p) * q)
                } else {
                    (p * q).min((1.0 - p) * (1.0 - q))
                };
                d[i][j] = dp * dmax;
            }
        }
        for row in d.iter_mut().take(m - 1) {
            row[n - 1] = -row[..n - 1].iter().sum::<f64>();
        }
        for j in 0..n {
            let column_sum: f64 = d[..m - 1].iter().map(|row| row[j]).sum();
            d[m - 1][j] = -column_sum;
        }

        let haplo_freq = (0..m)
            .map(|i| (0..n).map(|j| freqs1[i] * freqs2[j] + d[i][j]).collect())
            .collect();
        LdBlock { locus1, locus2, dprime, haplo_freq }
    }
}

/// The master list of loci plus the LD blocks between pairs of them.
#[derive(Debug, Clone, Default)]
pub struct LocusList {
    pub loci: Vec<Locus>,
    ld: AHashMap<(usize, usize), LdBlock>,
}

impl LocusList {
    pub fn new() -> LocusList {
        LocusList::default()
    }

    pub fn push(&mut self, locus: Locus) -> usize {
        self.loci.push(locus);
        self.loci.len() - 1
    }

    pub fn len(&self) -> usize {
        self.loci.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loci.is_empty()
    }

    pub fn add_ld_block(&mut self, block: LdBlock) {
        self.ld.insert((block.locus1, block.locus2), block);
    }

    pub fn find_ld(&self, locus1: usize, locus2: usize) -> Option<&LdBlock> {
        self.ld.get(&(locus1, locus2)).or_else(|| self.ld.get(&(locus2, locus1)))
    }

    /// Widest allele count of any locus; every mask in the pedigree is
    /// sized for it.
    pub fn max_alleles(&self) -> usize {
        self.loci.iter().map(Locus::num_original_alleles).max().unwrap_or(0)
    }
}

/// An analysis-time selection of loci in a specific order, with the
/// recombination fraction to the previous and next entry per map flavor
/// (sex-averaged, male, female).
#[derive(Debug, Clone)]
pub struct SubLocusList {
    /// Indices into the master `LocusList`.
    pub indices: Vec<usize>,
    /// `prev_distance[flavor][i]` is theta between sub-locus `i-1` and `i`.
    pub prev_distance: [Vec<f64>; 3],
    pub next_distance: [Vec<f64>; 3],
    /// Position of the trait locus within `indices`, if one is included.
    pub trait_index: Option<usize>,
}

impl SubLocusList {
    /// Assemble a sub-list over `indices` with one sex-averaged theta per
    /// adjacent pair; male and female flavors start out identical.
    pub fn new(
        locus_list: &LocusList,
        indices: Vec<usize>,
        thetas: &[f64],
    ) -> Result<SubLocusList, PedigreeError> {
        for &ix in &indices {
            if ix >= locus_list.len() {
                return Err(PedigreeError::BadLocusIndex(ix));
            }
        }
        let trait_index = indices
            .iter()
            .position(|&ix| locus_list.loci[ix].kind == LocusKind::Trait);

        let mut prev = vec![0.0; indices.len()];
        for (i, &theta) in thetas.iter().enumerate() {
            if i + 1 < prev.len() {
                prev[i + 1] = theta;
            }
        }
        let mut next = vec![0.0; indices.len()];
        for i in 0..indices.len().saturating_sub(1) {
            next[i] = prev[i + 1];
        }

        Ok(SubLocusList {
            indices,
            prev_distance: [prev.clone(), prev.clone(), prev],
            next_distance: [next.clone(), next.clone(), next],
            trait_index,
        })
    }

    /// Multipoint selection: the trait locus dropped at `trait_position`
    /// cM among its `window` nearest markers, with the inter-locus map
    /// distances converted to recombination fractions.
    pub fn multipoint(
        locus_list: &LocusList,
        trait_locus: usize,
        trait_position: f64,
        window: usize,
        haldane: bool,
    ) -> Result<SubLocusList, PedigreeError> {
        if trait_locus >= locus_list.len() {
            return Err(PedigreeError::BadLocusIndex(trait_locus));
        }
        let mut markers: Vec<(usize, f64)> = locus_list
            .loci
            .iter()
            .enumerate()
            .filter(|(_, l)| l.kind == LocusKind::Marker)
            .map(|(ix, l)| (ix, l.map_position))
            .collect();
        // nearest `window` markers to the trait position
        markers.sort_by(|a, b| {
            let da = (a.1 - trait_position).abs();
            let db = (b.1 - trait_position).abs();
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        });
        markers.truncate(window.max(1));
        markers.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        // splice the trait locus in at its map position
        let mut ordered: Vec<(usize, f64)> = Vec::with_capacity(markers.len() + 1);
        let mut placed = false;
        for &(ix, position) in &markers {
            if !placed && trait_position <= position {
                ordered.push((trait_locus, trait_position));
                placed = true;
            }
            ordered.push((ix, position));
        }
        if !placed {
            ordered.push((trait_locus, trait_position));
        }

        let indices: Vec<usize> = ordered.iter().map(|&(ix, _)| ix).collect();
        let thetas: Vec<f64> = ordered
            .windows(2)
            .map(|pair| cm_to_recombination_fraction(pair[1].1 - pair[0].1, haldane))
            .collect();
        SubLocusList::new(locus_list, indices, &thetas)
    }

    /// Override the male/female recombination fractions for a sex-specific
    /// map.
    pub fn set_sex_specific(&mut self, male: &[f64], female: &[f64]) {
        for (i, &theta) in male.iter().enumerate() {
            if i + 1 < self.prev_distance[MAP_MALE].len() {
                self.prev_distance[MAP_MALE][i + 1] = theta;
            }
            if i < self.next_distance[MAP_MALE].len() {
                self.next_distance[MAP_MALE][i] = theta;
            }
        }
        for (i, &theta) in female.iter().enumerate() {
            if i + 1 < self.prev_distance[MAP_FEMALE].len() {
                self.prev_distance[MAP_FEMALE][i + 1] = theta;
            }
            if i < self.next_distance[MAP_FEMALE].len() {
                self.next_distance[MAP_FEMALE][i] = theta;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The master-list locus index of sub-locus `i`.
    pub fn orig(&self, i: usize) -> usize {
        self.indices[i]
    }
}

/// Convert a map distance in centiMorgans to a recombination fraction.
pub fn cm_to_recombination_fraction(distance_cm: f64, haldane: bool) -> f64 {
    let d = distance_cm / 100.0;
    if haldane {
        // Haldane: theta = (1 - exp(-2d)) / 2
        0.5 * (1.0 - (-2.0 * d).exp())
    } else {
        // Kosambi: theta = tanh(2d) / 2
        0.5 * (2.0 * d).tanh()
    }
}
