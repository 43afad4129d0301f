use thiserror::Error;

#[derive(Error, Debug)]
pub enum PedigreeError {
    #[error("person '{0}' appears twice in the pedigree")]
    DuplicatePerson(String),

    #[error("person '{person}' names unknown parent '{parent}'")]
    UnknownParent { person: String, parent: String },

    #[error("person '{person}' has only one parent in the pedigree")]
    SingleParent { person: String },

    #[error("loop breaker '{person}' references unknown original '{original}'")]
    UnknownOriginal { person: String, original: String },

    #[error("pedigree '{0}' designates more than one proband")]
    MultipleProbands(String),

    #[error("pedigree '{0}' has no members")]
    Empty(String),

    #[error("the nuclear families of pedigree '{0}' are not connected")]
    Disconnected(String),

    #[error("person '{person}' carries allele {allele} but locus '{locus}' has only {count}")]
    AlleleOutOfRange { person: String, locus: String, allele: usize, count: usize },

    #[error("locus '{locus}' phenotype given for person '{person}' does not match the locus type")]
    PhenotypeMismatch { person: String, locus: String },

    #[error("analysis locus list references locus {0} which does not exist")]
    BadLocusIndex(usize),
}
