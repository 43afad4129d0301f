//! Pedigree likelihood engine.
//!
//! Given a pedigree, a locus list and an analysis sub-list, the engine
//! prunes per-person genotype lists to Mendelian consistency, clumps
//! never-transmitted alleles into super alleles, enumerates parental pairs
//! per nuclear family, and peels the family graph toward a proband,
//! combining child inheritance patterns through a precomputed transmission
//! tensor. Looped pedigrees sum over loop-breaker genotype assignments.
//!
//! The crate is purely computational: file parsing and result reporting
//! live elsewhere, and all I/O-free state is owned by [`pedigree::Pedigree`]
//! and [`locus::LocusList`].

pub mod allele_set;
pub mod analysis;
pub mod elimination;
pub mod error;
pub mod genotype;
pub mod locus;
pub mod loop_breaker;
pub mod parental_pair;
pub mod pedigree;
pub mod peeling;
pub mod recoding;
pub mod trait_model;
pub mod transmission;

pub use allele_set::{AlleleBits, AlleleSet};
pub use analysis::{
    evaluate_pedigree, evaluate_pedigree_set, prepare_pedigree, SetLikelihood, LOG10_ZERO_SET,
};
pub use elimination::{pedigree_genotype_elimination, Elimination};
pub use error::PedigreeError;
pub use genotype::{Genotype, DAD, MOM};
pub use locus::{LdBlock, Locus, LocusKind, LocusList, SubLocusList};
pub use parental_pair::{construct_parental_pairs, ParentalPair};
pub use pedigree::{
    ConditionalLikelihood, Connector, FamilyId, NuclearFamily, Pedigree, Person, PersonDef,
    PersonId, PersonLocus, Phenotype, Sex,
};
pub use peeling::{pedigree_likelihood, EngineOptions, PeelContext, PeelWorkspace};
pub use recoding::allele_set_recoding;
pub use trait_model::{
    PenetranceTable, QuantTable, TraitDef, TraitDistribution, TraitKind, TraitLocus,
};
pub use transmission::TransmissionMatrix;
