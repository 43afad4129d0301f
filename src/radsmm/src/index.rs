use log::debug;

use crate::error::StoreError;
use crate::header::{Header, ModelKind, ThetaMatrix};

// Lookup tolerances. Theta and penetrance lists are stored as f32 so the
// comparison slack must absorb a double -> float round trip.
const THETA_EPS: f64 = 1.0e-5;
const PENETRANCE_EPS: f32 = 1.0e-5;
const GENE_FREQ_EPS: f64 = 1.0e-6;
const DISEQ_EPS: f64 = 1.0e-6;
const MARKER_EPS: f64 = 1.0e-5;

/// Value-to-index lookups over the header's axis lists. Every accessor
/// returns `ValueNotInList` when no entry matches within tolerance.
impl Header {
    pub fn pedigree_index(&self, pedigree_id: i32) -> Result<usize, StoreError> {
        self.pedigrees
            .iter()
            .position(|&id| id == pedigree_id)
            .ok_or(StoreError::ValueNotInList)
    }

    pub fn marker_index(&self, location: f64) -> Result<usize, StoreError> {
        self.markers
            .iter()
            .position(|&m| (f64::from(m) - location).abs() < MARKER_EPS)
            .ok_or(StoreError::ValueNotInList)
    }

    /// Index of a (male, female) theta pair. Diagonal stores require both
    /// sexes to carry the same value; grid stores flatten the pair.
    pub fn theta_index(&self, male_theta: f64, female_theta: f64) -> Result<usize, StoreError> {
        if self.model() == ModelKind::Quantitative {
            return Err(StoreError::WrongModel);
        }
        match self.theta_matrix() {
            ThetaMatrix::Diagonal => {
                if (male_theta - female_theta).abs() > 2.0 * THETA_EPS {
                    return Err(StoreError::BadParam(
                        "male and female thetas differ in a diagonal store",
                    ));
                }
                match self.thetas.iter().position(|&t| (f64::from(t) - male_theta).abs() < THETA_EPS) {
                    Some(i) => Ok(i),
                    None => {
                        debug!("theta {male_theta:.8} not found in the index list");
                        Err(StoreError::ValueNotInList)
                    }
                }
            }
            ThetaMatrix::Grid => {
                let male = self
                    .thetas
                    .iter()
                    .position(|&t| (f64::from(t) - male_theta).abs() < THETA_EPS)
                    .ok_or(StoreError::ValueNotInList)?;
                let female = self
                    .thetas
                    .iter()
                    .position(|&t| (f64::from(t) - female_theta).abs() < THETA_EPS)
                    .ok_or(StoreError::ValueNotInList)?;
                Ok(male * self.thetas.len() + female)
            }
        }
    }

    pub fn penetrance_index(
        &self,
        lc_index: usize,
        pen1: f32,
        pen2: f32,
        pen3: f32,
    ) -> Result<usize, StoreError> {
        if self.model() == ModelKind::Quantitative {
            return Err(StoreError::WrongModel);
        }
        if lc_index >= self.lc_count {
            return Err(StoreError::BadParam("liability class index out of range"));
        }
        self.penetrances[lc_index]
            .iter()
            .position(|p| {
                (p.0[0] - pen1).abs() < PENETRANCE_EPS
                    && (p.0[1] - pen2).abs() < PENETRANCE_EPS
                    && (p.0[2] - pen3).abs() < PENETRANCE_EPS
            })
            .ok_or(StoreError::ValueNotInList)
    }

    pub fn gene_freq_index(&self, gene_freq: f64) -> Result<usize, StoreError> {
        if self.model() == ModelKind::Quantitative {
            return Err(StoreError::WrongModel);
        }
        self.gene_freqs
            .iter()
            .position(|&f| (f64::from(f) - gene_freq).abs() < GENE_FREQ_EPS)
            .ok_or(StoreError::ValueNotInList)
    }

    pub fn diseq_index(&self, lambda: f64) -> Result<usize, StoreError> {
        if !self.uses_diseq() {
            return Err(StoreError::WrongModel);
        }
        self.diseqs
            .iter()
            .position(|&d| (f64::from(d) - lambda).abs() < DISEQ_EPS)
            .ok_or(StoreError::ValueNotInList)
    }
}
