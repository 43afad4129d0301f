//! The pedigree arena: persons, nuclear families and their connectors, all
//! referenced by index so cyclic structures (loops, sibling rings) stay
//! representable.

use std::collections::HashMap;

use log::debug;

use crate::allele_set::AlleleBits;
use crate::error::PedigreeError;
use crate::genotype::{all_pairs, freeze_positions, observed_pair, Genotype, DAD, MOM};
use crate::locus::{LocusKind, LocusList};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PersonId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FamilyId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// 0 for male (paternal side), 1 for female (maternal side).
    pub fn side(self) -> usize {
        match self {
            Sex::Male => DAD,
            Sex::Female => MOM,
        }
    }
}

/// Per-locus observation for one person, as the pedigree file reported it.
#[derive(Debug, Clone, PartialEq)]
pub enum Phenotype {
    Untyped,
    /// Marker genotype, allele numbers 1-based; `(0, 0)` means untyped.
    Genotyped { alleles: (usize, usize), phased: bool },
    /// Dichotomous affection status (0 unknown, 1 unaffected, 2 affected).
    Affection { status: usize, liability_class: usize },
    /// Quantitative trait value, `None` when unknown.
    Quantitative { value: Option<f64>, liability_class: usize },
}

/// Declarative description of one person, input to `Pedigree::assemble`.
#[derive(Debug, Clone)]
pub struct PersonDef {
    pub id: String,
    pub sex: Sex,
    pub father: Option<String>,
    pub mother: Option<String>,
    pub loop_breaker: u32,
    pub original: Option<String>,
    pub proband: bool,
    /// One entry per locus of the master locus list.
    pub phenotypes: Vec<Phenotype>,
}

impl PersonDef {
    pub fn new(id: &str, sex: Sex) -> PersonDef {
        PersonDef {
            id: id.to_owned(),
            sex,
            father: None,
            mother: None,
            loop_breaker: 0,
            original: None,
            proband: false,
            phenotypes: Vec::new(),
        }
    }

    pub fn with_parents(mut self, father: &str, mother: &str) -> PersonDef {
        self.father = Some(father.to_owned());
        self.mother = Some(mother.to_owned());
        self
    }

    pub fn with_phenotypes(mut self, phenotypes: Vec<Phenotype>) -> PersonDef {
        self.phenotypes = phenotypes;
        self
    }

    pub fn proband(mut self) -> PersonDef {
        self.proband = true;
        self
    }

    /// Mark this person as loop-breaker duplicate `k` of `original`.
    /// The duplicate carries no ancestry of its own.
    pub fn duplicate_of(mut self, original: &str, k: u32) -> PersonDef {
        self.original = Some(original.to_owned());
        self.loop_breaker = k;
        self
    }

    /// Mark the original copy of a broken loop.
    pub fn loop_breaker(mut self, k: u32) -> PersonDef {
        self.loop_breaker = k;
        self
    }
}

/// Conditional likelihood of the peeled-away part of the pedigree given one
/// multi-locus genotype of this person. The `touched` flag records that the
/// genotype-probability / penetrance factor has been absorbed, so it is
/// multiplied in exactly once however many families arrive here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionalLikelihood {
    pub likelihood: f64,
    pub weight: f64,
    pub touched: bool,
    pub tmp: f64,
    pub tmp_touched: bool,
}

impl Default for ConditionalLikelihood {
    fn default() -> ConditionalLikelihood {
        ConditionalLikelihood { likelihood: 0.0, weight: 1.0, touched: false, tmp: 0.0, tmp_touched: false }
    }
}

/// Per-person per-locus state: the live genotype list, the frozen snapshot
/// it is restored from, the raw observation, and the transmitted /
/// non-transmitted masks used by allele-set recoding.
#[derive(Debug, Clone, Default)]
pub struct PersonLocus {
    pub genotypes: Vec<Genotype>,
    pub saved: Vec<Genotype>,
    pub typed: bool,
    pub phased: bool,
    pub phenotype: [usize; 2],
    pub trait_value: Option<f64>,
    /// 1-based; 0 means no class recorded.
    pub liability_class: usize,
    pub transmitted: [AlleleBits; 2],
    pub nontransmitted: [AlleleBits; 2],
}

#[derive(Debug, Clone)]
pub struct Person {
    pub id: String,
    pub sex: Sex,
    pub parents: [Option<PersonId>; 2],
    pub first_child: Option<PersonId>,
    /// Next sibling sharing the same father (`[DAD]`) or mother (`[MOM]`).
    pub next_sib: [Option<PersonId>; 2],
    /// 0 for a regular person; duplicates of one individual share a value.
    pub loop_breaker: u32,
    /// For a parentless duplicate, the person whose genotype storage it
    /// shares.
    pub original: Option<PersonId>,
    pub proband: bool,
    pub families: Vec<FamilyId>,
    pub loci: Vec<PersonLocus>,
    pub conditionals: Vec<ConditionalLikelihood>,
    /// Conditional-table stride per analysis sub-locus.
    pub strides: Vec<usize>,
    pub touched: bool,
    pub tmp_indices: Vec<usize>,
}

impl Person {
    pub fn is_founder(&self) -> bool {
        self.parents[DAD].is_none() && self.parents[MOM].is_none()
    }

    /// A loop-breaker duplicate: flagged and parentless. Its genotype lists
    /// live on the original person.
    pub fn is_duplicate(&self) -> bool {
        self.loop_breaker >= 1 && self.is_founder()
    }
}

/// A person shared with another nuclear family, and that family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connector {
    pub person: PersonId,
    pub family: FamilyId,
}

/// Two parents and their common children. Families interlock through
/// connector persons; each is peeled at most once per traversal.
#[derive(Debug, Clone)]
pub struct NuclearFamily {
    pub parents: [PersonId; 2],
    pub children: Vec<PersonId>,
    /// Families sharing one of this family's parents.
    pub up_connectors: Vec<Connector>,
    /// Families in which one of this family's children is a parent.
    pub down_connectors: Vec<Connector>,

    // ---- per-peel state ----
    pub done: bool,
    /// Head / spouse ordering: the proband parent peels as head.
    pub head: usize,
    pub spouse: usize,
    pub child_proband: bool,
    pub likelihood: f64,
    pub het_flag: [Vec<bool>; 2],
    pub tmp_num_het: [Vec<usize>; 2],
    pub first_het_locus: [Option<usize>; 2],
    pub num_het: [usize; 2],
    pub het_bits: [usize; 2],
    pub related_start: Vec<usize>,
    pub related_count: Vec<usize>,
    pub related_total: Vec<usize>,
    pub pair_groups: usize,
    pub similar_pairs: usize,
    /// How many times the child sums were computed in full, replayed from
    /// the per-child factor cache, or skipped via a phase-matrix reuse.
    pub full_computations: usize,
    pub cache_replays: usize,
    pub phase_reuses: usize,
}

impl NuclearFamily {
    fn new(parents: [PersonId; 2]) -> NuclearFamily {
        NuclearFamily {
            parents,
            children: Vec::new(),
            up_connectors: Vec::new(),
            down_connectors: Vec::new(),
            done: false,
            head: DAD,
            spouse: MOM,
            child_proband: false,
            likelihood: 0.0,
            het_flag: [Vec::new(), Vec::new()],
            tmp_num_het: [Vec::new(), Vec::new()],
            first_het_locus: [None, None],
            num_het: [0, 0],
            het_bits: [0, 0],
            related_start: Vec::new(),
            related_count: Vec::new(),
            related_total: Vec::new(),
            pair_groups: 0,
            similar_pairs: 0,
            full_computations: 0,
            cache_replays: 0,
            phase_reuses: 0,
        }
    }

    /// Size the per-locus peel bookkeeping for an `num_loci`-locus sub-list.
    pub fn reset_peel_state(&mut self, num_loci: usize) {
        self.done = false;
        self.likelihood = 0.0;
        for i in [DAD, MOM] {
            self.het_flag[i] = vec![false; num_loci];
            self.tmp_num_het[i] = vec![0; num_loci];
            self.first_het_locus[i] = None;
            self.num_het[i] = 0;
            self.het_bits[i] = 0;
        }
        self.related_start = vec![0; num_loci];
        self.related_count = vec![0; num_loci];
        self.related_total = vec![0; num_loci];
        self.pair_groups = 0;
        self.similar_pairs = 0;
        self.full_computations = 0;
        self.cache_replays = 0;
        self.phase_reuses = 0;
    }
}

#[derive(Debug, Clone)]
pub struct Pedigree {
    pub id: String,
    pub persons: Vec<Person>,
    pub families: Vec<NuclearFamily>,
    pub founders: Vec<PersonId>,
    /// Original persons whose duplicates break loops.
    pub loop_breakers: Vec<PersonId>,
    pub proband: PersonId,
    pub peeling_family: Option<FamilyId>,
    pub likelihood: f64,
}

impl Pedigree {
    /// Wire up a pedigree from person definitions: parent links, sibling
    /// chains, nuclear families, connectors, founders and loop breakers.
    pub fn assemble(id: &str, defs: &[PersonDef]) -> Result<Pedigree, PedigreeError> {
        if defs.is_empty() {
            return Err(PedigreeError::Empty(id.to_owned()));
        }
        let mut by_id: HashMap<&str, PersonId> = HashMap::new();
        for (ix, def) in defs.iter().enumerate() {
            if by_id.insert(def.id.as_str(), PersonId(ix)).is_some() {
                return Err(PedigreeError::DuplicatePerson(def.id.clone()));
            }
        }

        let mut persons: Vec<Person> = Vec::with_capacity(defs.len());
        for def in defs {
            let resolve = |name: &Option<String>| -> Result<Option<PersonId>, PedigreeError> {
                match name {
                    None => Ok(None),
                    Some(parent) => by_id
                        .get(parent.as_str())
                        .copied()
                        .map(Some)
                        .ok_or_else(|| PedigreeError::UnknownParent {
                            person: def.id.clone(),
                            parent: parent.clone(),
                        }),
                }
            };
            let father = resolve(&def.father)?;
            let mother = resolve(&def.mother)?;
            if father.is_some() != mother.is_some() {
                return Err(PedigreeError::SingleParent { person: def.id.clone() });
            }
            let original = match &def.original {
                None => None,
                Some(orig) => Some(*by_id.get(orig.as_str()).ok_or_else(|| {
                    PedigreeError::UnknownOriginal {
                        person: def.id.clone(),
                        original: orig.clone(),
                    }
                })?),
            };
            persons.push(Person {
                id: def.id.clone(),
                sex: def.sex,
                parents: [father, mother],
                first_child: None,
                next_sib: [None, None],
                loop_breaker: def.loop_breaker,
                original,
                proband: def.proband,
                families: Vec::new(),
                loci: def
                    .phenotypes
                    .iter()
                    .map(|p| {
                        let mut pl = PersonLocus::default();
                        match p {
                            Phenotype::Untyped => {}
                            Phenotype::Genotyped { alleles, phased } => {
                                pl.phenotype = [alleles.0, alleles.1];
                                pl.typed = alleles.0 != 0 && alleles.1 != 0;
                                pl.phased = *phased;
                            }
                            Phenotype::Affection { status, liability_class } => {
                                pl.trait_value = Some(*status as f64);
                                pl.liability_class = *liability_class;
                            }
                            Phenotype::Quantitative { value, liability_class } => {
                                pl.trait_value = *value;
                                pl.liability_class = *liability_class;
                            }
                        }
                        pl
                    })
                    .collect(),
                conditionals: Vec::new(),
                strides: Vec::new(),
                touched: false,
                tmp_indices: Vec::new(),
            });
        }

        // sibling chains: children of each parent, pedigree order
        let mut last_child_of: HashMap<(PersonId, usize), PersonId> = HashMap::new();
        for ix in 0..persons.len() {
            let child = PersonId(ix);
            for side in [DAD, MOM] {
                let Some(parent) = persons[ix].parents[side] else { continue };
                match last_child_of.get(&(parent, side)) {
                    None => persons[parent.0].first_child.get_or_insert(child),
                    Some(&prev) => persons[prev.0].next_sib[side].get_or_insert(child),
                };
                last_child_of.insert((parent, side), child);
            }
        }

        // nuclear families keyed by the parent couple
        let mut families: Vec<NuclearFamily> = Vec::new();
        let mut family_of: HashMap<[PersonId; 2], FamilyId> = HashMap::new();
        for ix in 0..persons.len() {
            let (Some(father), Some(mother)) = (persons[ix].parents[DAD], persons[ix].parents[MOM])
            else {
                continue;
            };
            let couple = [father, mother];
            let fam = *family_of.entry(couple).or_insert_with(|| {
                families.push(NuclearFamily::new(couple));
                FamilyId(families.len() - 1)
            });
            families[fam.0].children.push(PersonId(ix));
        }
        for (fam_ix, family) in families.iter().enumerate() {
            for &member in family.parents.iter().chain(family.children.iter()) {
                persons[member.0].families.push(FamilyId(fam_ix));
            }
        }

        // connectors between families sharing a person
        for fam_ix in 0..families.len() {
            let parents = families[fam_ix].parents;
            let children = families[fam_ix].children.clone();
            for &parent in &parents {
                for &other in &persons[parent.0].families {
                    if other.0 != fam_ix {
                        families[fam_ix]
                            .up_connectors
                            .push(Connector { person: parent, family: other });
                    }
                }
            }
            for &child in &children {
                for &other in &persons[child.0].families {
                    if other.0 != fam_ix {
                        families[fam_ix]
                            .down_connectors
                            .push(Connector { person: child, family: other });
                    }
                }
            }
        }

        let founders: Vec<PersonId> = (0..persons.len())
            .map(PersonId)
            .filter(|p| persons[p.0].is_founder() && !persons[p.0].is_duplicate())
            .collect();

        let mut loop_breakers: Vec<PersonId> = Vec::new();
        for person in &persons {
            if let (true, Some(original)) = (person.is_duplicate(), person.original) {
                if !loop_breakers.contains(&original) {
                    loop_breakers.push(original);
                }
            }
        }

        let mut proband = None;
        for (ix, person) in persons.iter().enumerate() {
            if person.proband {
                if proband.is_some() {
                    return Err(PedigreeError::MultipleProbands(id.to_owned()));
                }
                proband = Some(PersonId(ix));
            }
        }
        let proband = proband.unwrap_or(PersonId(0));

        // peel toward a family holding the proband, parent-side preferred
        let peeling_family = persons[proband.0]
            .families
            .iter()
            .copied()
            .find(|f| families[f.0].parents.contains(&proband))
            .or_else(|| persons[proband.0].families.first().copied());

        let pedigree = Pedigree {
            id: id.to_owned(),
            persons,
            families,
            founders,
            loop_breakers,
            proband,
            peeling_family,
            likelihood: 0.0,
        };
        pedigree.check_connected()?;
        debug!(
            "pedigree {}: {} persons, {} nuclear families, {} loop breaker group(s)",
            pedigree.id,
            pedigree.persons.len(),
            pedigree.families.len(),
            pedigree.loop_breakers.len()
        );
        Ok(pedigree)
    }

    fn check_connected(&self) -> Result<(), PedigreeError> {
        if self.families.len() <= 1 {
            return Ok(());
        }
        let mut seen = vec![false; self.families.len()];
        let mut stack = vec![0usize];
        seen[0] = true;
        while let Some(at) = stack.pop() {
            for connector in self.families[at]
                .up_connectors
                .iter()
                .chain(self.families[at].down_connectors.iter())
            {
                if !seen[connector.family.0] {
                    seen[connector.family.0] = true;
                    stack.push(connector.family.0);
                }
            }
        }
        if seen.iter().all(|&s| s) {
            Ok(())
        } else {
            Err(PedigreeError::Disconnected(self.id.clone()))
        }
    }

    pub fn has_loop(&self) -> bool {
        !self.loop_breakers.is_empty()
    }

    /// The person whose genotype lists to consult: a duplicate resolves to
    /// its original.
    pub fn genotype_owner(&self, person: PersonId) -> PersonId {
        let p = &self.persons[person.0];
        if p.is_duplicate() {
            p.original.unwrap_or(person)
        } else {
            person
        }
    }

    pub fn genotypes(&self, person: PersonId, locus: usize) -> &[Genotype] {
        &self.persons[self.genotype_owner(person).0].loci[locus].genotypes
    }

    pub fn saved_count(&self, person: PersonId, locus: usize) -> usize {
        self.persons[self.genotype_owner(person).0].loci[locus].saved.len()
    }

    /// Populate every person's baseline genotype lists for every locus:
    /// the observed pair (with its phase partner) for typed persons, all
    /// ordered pairs otherwise. Duplicates carry no lists of their own.
    pub fn build_genotypes(&mut self, loci: &LocusList) -> Result<(), PedigreeError> {
        for person_ix in 0..self.persons.len() {
            if self.persons[person_ix].is_duplicate() {
                continue;
            }
            for (locus_ix, locus) in loci.loci.iter().enumerate() {
                let pl = &self.persons[person_ix].loci[locus_ix];
                let list = match locus.kind {
                    LocusKind::Marker if pl.typed => {
                        let [a1, a2] = pl.phenotype;
                        let n = locus.num_original_alleles();
                        for allele in [a1, a2] {
                            if allele == 0 || allele > n {
                                return Err(PedigreeError::AlleleOutOfRange {
                                    person: self.persons[person_ix].id.clone(),
                                    locus: locus.name.clone(),
                                    allele,
                                    count: n,
                                });
                            }
                        }
                        observed_pair(locus, a1, a2, pl.phased)
                    }
                    _ => all_pairs(locus),
                };
                self.persons[person_ix].loci[locus_ix].genotypes = list;
            }
        }
        Ok(())
    }

    /// Apply trait penetrances to every genotype at every trait locus.
    pub fn apply_penetrances(&mut self, loci: &LocusList) {
        for person in &mut self.persons {
            if person.is_duplicate() {
                continue;
            }
            for (locus_ix, locus) in loci.loci.iter().enumerate() {
                let Some(trait_locus) = &locus.trait_locus else { continue };
                let pl = &mut person.loci[locus_ix];
                let class = pl.liability_class.saturating_sub(1);
                let value = pl.trait_value;
                for genotype in &mut pl.genotypes {
                    genotype.penetrance = trait_locus
                        .traits
                        .iter()
                        .map(|t| t.penetrance_for(value, class, genotype.alleles[DAD], genotype.alleles[MOM]))
                        .product();
                }
            }
        }
    }

    /// Freeze positions and dual links, then snapshot every genotype list.
    /// The snapshots are what loop-breaker iteration and proband pinning
    /// restore from.
    pub fn freeze_and_save(&mut self) {
        for person in &mut self.persons {
            for pl in &mut person.loci {
                freeze_positions(&mut pl.genotypes);
                pl.saved = pl.genotypes.clone();
            }
        }
    }

    /// Restore every genotype list from its snapshot.
    pub fn restore_from_saved(&mut self) {
        for person in &mut self.persons {
            for pl in &mut person.loci {
                pl.genotypes = pl.saved.clone();
            }
        }
    }

    /// Allocate each person's conditional-likelihood table for the analysis
    /// sub-list: one slot per combination of saved genotype positions, with
    /// the per-locus strides cached on the person.
    pub fn allocate_conditionals(&mut self, sub_loci: &[usize]) {
        for person_ix in 0..self.persons.len() {
            if self.persons[person_ix].is_duplicate() {
                self.persons[person_ix].conditionals.clear();
                self.persons[person_ix].strides.clear();
                continue;
            }
            let counts: Vec<usize> = sub_loci
                .iter()
                .map(|&l| self.persons[person_ix].loci[l].saved.len().max(1))
                .collect();
            let mut strides = vec![1; counts.len()];
            for i in (0..counts.len().saturating_sub(1)).rev() {
                strides[i] = strides[i + 1] * counts[i + 1];
            }
            let total = counts.iter().product();
            let person = &mut self.persons[person_ix];
            person.strides = strides;
            person.conditionals = vec![ConditionalLikelihood::default(); total];
        }
    }

    /// Zero the conditional tables and touched flags before a fresh peel,
    /// keeping the allocated sizes.
    pub fn reset_conditionals(&mut self) {
        for person in &mut self.persons {
            for cell in &mut person.conditionals {
                *cell = ConditionalLikelihood::default();
            }
            person.touched = false;
            person.tmp_indices.clear();
        }
    }
}
