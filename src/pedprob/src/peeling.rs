//! The peeling engine: traverse nuclear families toward the proband,
//! accumulating each person's conditional likelihood over multi-locus
//! genotypes, then fold the proband's table into the pedigree likelihood.
//!
//! The inner loops follow the parental-pair algorithm: for every complete
//! multi-locus parental pair, the family contribution is the product of the
//! parent factors and, per child, the sum over compatible genotypes of the
//! transmission probability times the child's own factor. Pairs differing
//! only in phase share one full computation via the phase matrix and the
//! per-child factor cache.

use log::{debug, warn};

use crate::genotype::{DAD, MOM};
use crate::locus::{LocusList, SubLocusList, MAP_FEMALE, MAP_MALE};
use crate::loop_breaker;
use crate::parental_pair::{construct_parental_pairs, ParentalPair};
use crate::pedigree::{FamilyId, Pedigree, PersonId, Sex};
use crate::transmission::TransmissionMatrix;

/// Analysis switches the engine honours.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    pub sex_linked: bool,
    pub imprinting: bool,
    /// Linkage disequilibrium between trait and marker: founder weights come
    /// from haplotype frequencies instead of allele-frequency products.
    pub linkage_disequilibrium: bool,
}

/// Read-only state shared by every call in one evaluation.
pub struct PeelContext<'a> {
    pub loci: &'a LocusList,
    pub sub: &'a SubLocusList,
    pub xmission: &'a TransmissionMatrix,
    pub options: EngineOptions,
}

/// One cell of the phase matrix: likelihood of the family under one
/// (head-phase, spouse-phase) combination, plus how many phase variants
/// share that value.
#[derive(Debug, Clone, Copy, Default)]
struct PhaseCell {
    likelihood_index: usize,
    count: u32,
    likelihood: f64,
}

/// One cached child term: the transmission indices and the child factor of
/// one multi-locus child genotype, replayable under a phase flip by XORing
/// the indices.
#[derive(Debug, Clone, Copy, Default)]
struct ChildElement {
    xmission_index: [usize; 2],
    factor: f64,
}

/// Parental pairs for the family currently being peeled, one list per
/// analysis locus. Rebuilt for every family computation and read-only while
/// the pair loops run.
struct PairSpace {
    per_locus: Vec<Vec<ParentalPair>>,
}

/// Mutable scratch shared across the pair loops.
pub struct PeelWorkspace {
    ppair: Vec<Vec<PhaseCell>>,
    bit_mask: Vec<usize>,
    /// Current pair per locus, set while walking pair groups.
    pair_ix: Vec<usize>,
    /// Current shadow-list slot per locus while walking a child.
    child_geno_ix: Vec<usize>,
    /// Phase flag per parent per locus of the current pair.
    phase: [Vec<u8>; 2],
    /// Penetrance of the pinned proband genotype per locus.
    proband_pen: Vec<f64>,
    child_elements: Vec<ChildElement>,
    child_counts: Vec<usize>,
    /// 0: one-shot result, 1: compute and cache, 2: replay the cache.
    calc_flag: u8,
    mult_count: usize,
}

impl PeelWorkspace {
    pub fn new(num_loci: usize) -> PeelWorkspace {
        let size = 1usize << num_loci;
        PeelWorkspace {
            ppair: vec![vec![PhaseCell::default(); size]; size],
            bit_mask: (0..=num_loci).map(|i| (1usize << i) - 1).collect(),
            pair_ix: vec![0; num_loci],
            child_geno_ix: vec![0; num_loci],
            phase: [vec![0; num_loci], vec![0; num_loci]],
            proband_pen: vec![1.0; num_loci],
            child_elements: Vec::new(),
            child_counts: Vec::new(),
            calc_flag: 0,
            mult_count: 0,
        }
    }

    fn cache_child_element(&mut self, element: ChildElement) {
        if self.mult_count < self.child_elements.len() {
            self.child_elements[self.mult_count] = element;
        } else {
            self.child_elements.push(element);
        }
        self.mult_count += 1;
    }
}

/// Likelihood of one pedigree under the prepared engine state. Looped
/// pedigrees sum over their loop-breaker genotype assignments; a pedigree
/// that cannot produce its data yields zero, never an error.
pub fn pedigree_likelihood(ped: &mut Pedigree, ctx: &PeelContext) -> f64 {
    let mut ws = PeelWorkspace::new(ctx.sub.len());
    let likelihood = if ped.has_loop() {
        loop_breaker::sum_over_configurations(ped, ctx, &mut ws)
    } else {
        peel_once(ped, ctx, &mut ws)
    };
    ped.likelihood = likelihood;
    if likelihood == 0.0 {
        warn!("pedigree {} has likelihood 0", ped.id);
    }
    likelihood
}

/// One full peel of the pedigree in its current genotype configuration.
pub(crate) fn peel_once(ped: &mut Pedigree, ctx: &PeelContext, ws: &mut PeelWorkspace) -> f64 {
    ped.reset_conditionals();
    for family in &mut ped.families {
        family.reset_peel_state(ctx.sub.len());
    }

    match ped.peeling_family {
        Some(family) => peel_graph(ped, ctx, ws, family, ped.proband),
        // a pedigree of unrelated persons: the proband's genotype
        // probabilities stand alone
        None => return singleton_likelihood(ped, ctx),
    }

    let proband = &ped.persons[ped.proband.0];
    let mut total = 0.0;
    for cell in &proband.conditionals {
        if cell.touched {
            total += cell.likelihood * cell.weight;
        }
    }
    if !total.is_finite() {
        warn!("pedigree {} produced a non-finite likelihood; treating as zero", ped.id);
        return 0.0;
    }
    debug!("pedigree {}: likelihood {total:e}", ped.id);
    total
}

fn singleton_likelihood(ped: &Pedigree, ctx: &PeelContext) -> f64 {
    let proband = ped.proband;
    let mut total = 1.0;
    for locus in 0..ctx.sub.len() {
        let orig = ctx.sub.orig(locus);
        let genotypes = ped.genotypes(proband, orig);
        let sum: f64 = genotypes.iter().map(|g| g.weight * g.penetrance).sum();
        total *= sum;
    }
    total
}

/// Depth-first traversal over connected nuclear families. Recurse through
/// the up connectors, then the down connectors, then compute this family's
/// contribution into the connector person's conditional table.
fn peel_graph(ped: &mut Pedigree, ctx: &PeelContext, ws: &mut PeelWorkspace, family: FamilyId, proband: PersonId) {
    if ped.families[family.0].done {
        return;
    }
    ped.families[family.0].done = true;
    debug!(
        "peeling family {} with parents {} x {}",
        family.0,
        ped.persons[ped.families[family.0].parents[DAD].0].id,
        ped.persons[ped.families[family.0].parents[MOM].0].id
    );

    let ups = ped.families[family.0].up_connectors.clone();
    for connector in ups {
        peel_graph(ped, ctx, ws, connector.family, connector.person);
    }
    let downs = ped.families[family.0].down_connectors.clone();
    for connector in downs {
        peel_graph(ped, ctx, ws, connector.family, connector.person);
    }

    // save the proband's genotype lists; child-proband enumeration pins
    // them one genotype at a time
    let owner = ped.genotype_owner(proband);
    let stash: Vec<Vec<crate::genotype::Genotype>> = ctx
        .sub
        .indices
        .iter()
        .map(|&orig| ped.persons[owner.0].loci[orig].genotypes.clone())
        .collect();

    let child_proband = !ped.families[family.0].parents.contains(&proband);
    ped.families[family.0].child_proband = child_proband;

    if child_proband {
        loop_child_proband_genotype(ped, ctx, ws, family, proband, 0, 0);
    } else {
        compute_nuclear_family_likelihood(ped, ctx, ws, family, proband);
        // fold the temporary results into the permanent slots
        let touched_before = ped.persons[proband.0].touched;
        let indices = std::mem::take(&mut ped.persons[proband.0].tmp_indices);
        for ix in indices {
            let cell = &mut ped.persons[proband.0].conditionals[ix];
            cell.touched = true;
            if !touched_before {
                cell.likelihood = 1.0;
            }
            cell.likelihood *= cell.tmp;
            cell.tmp = 0.0;
            cell.tmp_touched = false;
        }
    }

    ped.persons[proband.0].touched = true;

    for (slot, &orig) in ctx.sub.indices.iter().enumerate() {
        ped.persons[owner.0].loci[orig].genotypes = stash[slot].clone();
    }
}

/// Child-proband leaf: fix the proband to each of its multi-locus genotypes
/// in turn, compute the family likelihood, and store it at the flattened
/// index. Penetrance and the (unit) weight are absorbed on first touch only.
fn loop_child_proband_genotype(
    ped: &mut Pedigree,
    ctx: &PeelContext,
    ws: &mut PeelWorkspace,
    family: FamilyId,
    proband: PersonId,
    locus: usize,
    multi_locus_index: usize,
) {
    let orig = ctx.sub.orig(locus);
    let owner = ped.genotype_owner(proband);
    let genotypes = ped.persons[owner.0].loci[orig].genotypes.clone();
    let count = ped.saved_count(proband, orig).max(1);
    let base = multi_locus_index * count;

    for genotype in &genotypes {
        let position = genotype.position;
        ws.proband_pen[locus] = genotype.penetrance;
        ped.persons[owner.0].loci[orig].genotypes = vec![genotype.clone()];
        let index = base + position;

        if locus + 1 < ctx.sub.len() {
            loop_child_proband_genotype(ped, ctx, ws, family, proband, locus + 1, index);
        } else {
            compute_nuclear_family_likelihood(ped, ctx, ws, family, proband);
            let family_likelihood = ped.families[family.0].likelihood;
            let touched_before = ped.persons[proband.0].touched;
            let penetrance = match ctx.sub.trait_index {
                Some(tl) => ws.proband_pen[tl],
                None => 1.0,
            };
            let cell = &mut ped.persons[proband.0].conditionals[index];
            cell.touched = true;
            if !touched_before {
                cell.likelihood = penetrance * family_likelihood;
                cell.weight = 1.0;
            } else {
                cell.likelihood *= family_likelihood;
            }
        }
    }

    // un-pin this locus before returning to the caller's iteration
    ped.persons[owner.0].loci[orig].genotypes = genotypes;
}

/// Build the parental pairs for every locus, then drive the pair loops.
/// The family's likelihood accumulator holds the result when a child is the
/// proband; otherwise the proband's tmp slots collect per-genotype sums.
fn compute_nuclear_family_likelihood(
    ped: &mut Pedigree,
    ctx: &PeelContext,
    ws: &mut PeelWorkspace,
    family: FamilyId,
    proband: PersonId,
) {
    ped.families[family.0].likelihood = 0.0;

    // head and spouse: flipping order follows the proband parent
    let (head, spouse) = if ped.families[family.0].parents[MOM] == proband {
        (MOM, DAD)
    } else {
        (DAD, MOM)
    };
    ped.families[family.0].head = head;
    ped.families[family.0].spouse = spouse;
    for side in [DAD, MOM] {
        ped.families[family.0].first_het_locus[side] = None;
        ped.families[family.0].het_flag[side].fill(false);
        ped.families[family.0].tmp_num_het[side].fill(0);
    }

    let pairs = PairSpace {
        per_locus: (0..ctx.sub.len())
            .map(|locus| {
                construct_parental_pairs(ped, family, ctx.sub.orig(locus), ctx.options.sex_linked)
            })
            .collect(),
    };
    if pairs.per_locus.iter().any(Vec::is_empty) {
        // some locus admits no parental pair at all: zero contribution
        return;
    }

    ws.child_counts = vec![0; ped.families[family.0].children.len()];
    loop_parental_pair(ped, ctx, ws, &pairs, family, proband, 0, [0, 0], [1.0, 1.0]);
}

/// Walk the parental-pair groups of one locus, recursing across loci; a
/// complete multi-locus group leader triggers the phase loop (or a direct
/// computation when it has no phase variants).
#[allow(clippy::too_many_arguments)]
fn loop_parental_pair(
    ped: &mut Pedigree,
    ctx: &PeelContext,
    ws: &mut PeelWorkspace,
    pairs: &PairSpace,
    family: FamilyId,
    proband: PersonId,
    locus: usize,
    multi_locus_index: [usize; 2],
    weight: [f64; 2],
) {
    let orig = ctx.sub.orig(locus);
    let parents = ped.families[family.0].parents;
    let counts = [
        ped.saved_count(parents[DAD], orig).max(1),
        ped.saved_count(parents[MOM], orig).max(1),
    ];
    let base = [multi_locus_index[DAD] * counts[DAD], multi_locus_index[MOM] * counts[MOM]];

    let list = &pairs.per_locus[locus];
    let mut group_start = 0;
    while group_start < list.len() {
        let mut group_len = 1;
        while group_start + group_len < list.len()
            && list[group_start + group_len].phase != [0, 0]
        {
            group_len += 1;
        }
        let leader = &list[group_start];
        ws.pair_ix[locus] = group_start;

        // het bookkeeping from the leader's genotypes
        let mut new_weight = weight;
        let mut mli2 = [0usize; 2];
        for side in [DAD, MOM] {
            let (is_het, position, genotype_weight) = {
                let g = &ped.genotypes(parents[side], orig)[leader.genotypes[side]];
                (g.is_het(), g.position, g.weight)
            };
            let fam = &mut ped.families[family.0];
            fam.tmp_num_het[side][locus] =
                if locus == 0 { 0 } else { fam.tmp_num_het[side][locus - 1] };
            if fam.first_het_locus[side].is_some_and(|f| f >= locus) {
                fam.first_het_locus[side] = None;
            }
            if is_het {
                fam.het_flag[side][locus] = true;
                if fam.first_het_locus[side].is_none() {
                    fam.first_het_locus[side] = Some(locus);
                }
                fam.tmp_num_het[side][locus] += 1;
            } else {
                fam.het_flag[side][locus] = false;
            }
            mli2[side] = base[side] + position;

            // founder weights multiply in here under linkage equilibrium;
            // LD weights wait for the haplotype-frequency lookup
            let parent = &ped.persons[parents[side].0];
            if !ctx.options.linkage_disequilibrium
                && parent.is_founder()
                && parent.loop_breaker == 0
            {
                new_weight[side] = weight[side] * genotype_weight;
            }
        }
        {
            let fam = &mut ped.families[family.0];
            fam.related_start[locus] = group_start;
            fam.related_count[locus] = group_len;
            fam.related_total[locus] =
                if locus == 0 { group_len } else { fam.related_total[locus - 1] * group_len };
        }

        if locus + 1 < ctx.sub.len() {
            loop_parental_pair(ped, ctx, ws, pairs, family, proband, locus + 1, mli2, new_weight);
        } else {
            let related_total = ped.families[family.0].related_total[locus];
            ped.families[family.0].pair_groups += 1;
            ped.families[family.0].similar_pairs += related_total - 1;

            if related_total == 1 {
                ws.calc_flag = 0;
                calculate_likelihood(ped, ctx, ws, pairs, family, proband, mli2, [0, 0], new_weight, None);
                let head = ped.families[family.0].head;
                let cell = ws.ppair[0][0];
                ws.ppair[0][0].count = 0;
                post_single(ped, family, proband, cell.likelihood, mli2[head]);
            } else {
                let fam = &mut ped.families[family.0];
                for side in [DAD, MOM] {
                    fam.num_het[side] = fam.tmp_num_het[side][locus];
                    fam.het_bits[side] = ws.bit_mask[fam.num_het[side]];
                }
                loop_phases(ped, ctx, ws, pairs, family, proband, 0, [0, 0], [0, 0], [0, 0], new_weight);
                harvest_phase_matrix(ped, ws, family, proband);
            }
        }
        group_start += group_len;
    }
}

/// Deposit one computed group result: into the family accumulator when a
/// child is the proband, else into the proband's tmp slot.
fn post_single(
    ped: &mut Pedigree,
    family: FamilyId,
    proband: PersonId,
    likelihood: f64,
    likelihood_index: usize,
) {
    if ped.families[family.0].child_proband {
        ped.families[family.0].likelihood += likelihood;
    } else {
        let person = &mut ped.persons[proband.0];
        let cell = &mut person.conditionals[likelihood_index];
        cell.tmp += likelihood;
        if !cell.tmp_touched {
            cell.tmp_touched = true;
            person.tmp_indices.push(likelihood_index);
        }
    }
}

/// Sum the populated phase-matrix cells into the proband (or the family),
/// multiplying by each cell's reuse count, and reset the counts.
fn harvest_phase_matrix(ped: &mut Pedigree, ws: &mut PeelWorkspace, family: FamilyId, proband: PersonId) {
    let (head, spouse) = {
        let fam = &ped.families[family.0];
        (fam.head, fam.spouse)
    };
    let rows = ws.bit_mask[ped.families[family.0].num_het[head]];
    let cols = ws.bit_mask[ped.families[family.0].num_het[spouse]];
    if ped.families[family.0].child_proband {
        let mut sum = 0.0;
        for row in 0..=rows {
            for col in 0..=cols {
                let cell = &mut ws.ppair[row][col];
                if cell.count > 0 {
                    sum += cell.likelihood * f64::from(cell.count);
                    cell.count = 0;
                }
            }
        }
        ped.families[family.0].likelihood += sum;
    } else {
        for row in 0..=rows {
            let likelihood_index = ws.ppair[row][0].likelihood_index;
            for col in 0..=cols {
                let cell = &mut ws.ppair[row][col];
                if cell.count == 0 {
                    continue;
                }
                let addend = cell.likelihood * f64::from(cell.count);
                cell.count = 0;
                let person = &mut ped.persons[proband.0];
                let slot = &mut person.conditionals[likelihood_index];
                if !slot.tmp_touched {
                    slot.tmp_touched = true;
                    person.tmp_indices.push(likelihood_index);
                }
                slot.tmp += addend;
            }
        }
    }
}

/// Walk the phase variants of the current related-pair group across all
/// loci. A variant whose first heterozygous locus is flipped on a founder
/// (or proband) side reuses the matching computed cell instead of running
/// the full child loops; otherwise the per-child factor cache replays the
/// computation under the accumulated flip mask.
#[allow(clippy::too_many_arguments)]
fn loop_phases(
    ped: &mut Pedigree,
    ctx: &PeelContext,
    ws: &mut PeelWorkspace,
    pairs: &PairSpace,
    family: FamilyId,
    proband: PersonId,
    locus: usize,
    multi_locus_index: [usize; 2],
    multi_locus_phase: [usize; 2],
    flip_mask: [usize; 2],
    weight: [f64; 2],
) {
    let orig = ctx.sub.orig(locus);
    let parents = ped.families[family.0].parents;
    let mut mli = multi_locus_index;
    let mut mlp = multi_locus_phase;
    for side in [DAD, MOM] {
        mli[side] *= ped.saved_count(parents[side], orig).max(1);
        if ped.families[family.0].het_flag[side][locus] {
            mlp[side] <<= 1;
        }
    }
    let flip = [flip_mask[DAD] << 2, flip_mask[MOM] << 2];

    let start = ped.families[family.0].related_start[locus];
    let end = start + ped.families[family.0].related_count[locus];
    for pair_ix in start..end {
        let pair = &pairs.per_locus[locus][pair_ix];
        ws.pair_ix[locus] = pair_ix;

        let mut mlp2 = [0usize; 2];
        let mut flip2 = [0usize; 2];
        let mut mli2 = [0usize; 2];
        for side in [DAD, MOM] {
            ws.phase[side][locus] = pair.phase[side];
            mlp2[side] = mlp[side] | usize::from(pair.phase[side]);
            flip2[side] = if pair.phase[side] == 0 { flip[side] } else { flip[side] | 3 };
            let genotype = &ped.genotypes(parents[side], orig)[pair.genotypes[side]];
            mli2[side] = mli[side] + genotype.position;
        }

        if locus + 1 < ctx.sub.len() {
            loop_phases(ped, ctx, ws, pairs, family, proband, locus + 1, mli2, mlp2, flip2, weight);
            continue;
        }

        // a complete multi-locus phase variant
        let (head, spouse) = {
            let fam = &ped.families[family.0];
            (fam.head, fam.spouse)
        };
        ws.ppair[mlp2[head]][mlp2[spouse]].likelihood_index = mli2[head];
        let mut calculate = true;

        if ped.families[family.0].child_proband {
            let mut phase = mlp2;
            for side in [DAD, MOM] {
                let fam = &ped.families[family.0];
                let Some(first_het) = fam.first_het_locus[side] else { continue };
                if !ctx.options.imprinting
                    && ws.phase[side][first_het] != 0
                    && ped.persons[parents[side].0].is_founder()
                {
                    phase[side] = mlp2[side] ^ fam.het_bits[side];
                    if ws.ppair[phase[head]][phase[spouse]].count > 0 {
                        calculate = false;
                    }
                }
            }
            if !calculate {
                ws.ppair[phase[head]][phase[spouse]].count += 1;
            }
        } else {
            let fam_first_het = ped.families[family.0].first_het_locus;
            let het_bits = ped.families[family.0].het_bits;
            let spouse_flippable = !ctx.options.imprinting
                && fam_first_het[spouse].is_some_and(|f| ws.phase[spouse][f] != 0)
                && ped.persons[parents[spouse].0].is_founder();
            let proband_flippable = !ctx.options.imprinting
                && fam_first_het[head].is_some_and(|f| ws.phase[head][f] != 0);
            if spouse_flippable {
                let flipped = mlp2[spouse] ^ het_bits[spouse];
                if ws.ppair[mlp2[head]][flipped].count > 0 {
                    ws.ppair[mlp2[head]][flipped].count += 1;
                    calculate = false;
                }
            } else if proband_flippable {
                let flipped = mlp2[head] ^ het_bits[head];
                if ws.ppair[flipped][mlp2[spouse]].count > 0 {
                    let source = ws.ppair[flipped][mlp2[spouse]];
                    let cell = &mut ws.ppair[mlp2[head]][mlp2[spouse]];
                    cell.count = 1;
                    cell.likelihood = source.likelihood;
                    let copied_weight =
                        ped.persons[proband.0].conditionals[source.likelihood_index].weight;
                    ped.persons[proband.0].conditionals[mli2[head]].weight = copied_weight;
                    calculate = false;
                }
            }
        }

        if calculate {
            let child_product = if ctx.options.imprinting {
                ws.calc_flag = 0;
                None
            } else if mlp2 == [0, 0] {
                ws.child_counts.fill(0);
                ws.calc_flag = 1;
                None
            } else {
                ws.calc_flag = 2;
                ped.families[family.0].cache_replays += 1;
                Some(recalculate_child_likelihood(ctx, ws, flip2))
            };
            calculate_likelihood(ped, ctx, ws, pairs, family, proband, mli2, mlp2, weight, child_product);
        } else {
            ped.families[family.0].phase_reuses += 1;
        }
    }
}

/// Replay the cached child terms under a phase flip: XOR each cached
/// transmission index with the flip mask and re-look-up the tensor.
fn recalculate_child_likelihood(ctx: &PeelContext, ws: &PeelWorkspace, flip_mask: [usize; 2]) -> f64 {
    let mut product = 1.0;
    let mut offset = 0;
    for &count in &ws.child_counts {
        let mut sum = 0.0;
        for element in &ws.child_elements[offset..offset + count] {
            let dad_ix = element.xmission_index[DAD] ^ flip_mask[DAD];
            let mom_ix = element.xmission_index[MOM] ^ flip_mask[MOM];
            sum += ctx.xmission.prob(dad_ix)[MAP_MALE]
                * ctx.xmission.prob(mom_ix)[MAP_FEMALE]
                * element.factor;
        }
        product *= sum;
        offset += count;
    }
    product
}

/// The basic likelihood of the family conditional on one complete parental
/// pair and phase: parent factors (stored conditionals, founder weights or
/// LD haplotype frequencies, first-touch penetrances) times the per-child
/// sums over compatible genotypes.
#[allow(clippy::too_many_arguments)]
fn calculate_likelihood(
    ped: &mut Pedigree,
    ctx: &PeelContext,
    ws: &mut PeelWorkspace,
    pairs: &PairSpace,
    family: FamilyId,
    proband: PersonId,
    multi_locus_index: [usize; 2],
    multi_locus_phase: [usize; 2],
    weight: [f64; 2],
    child_product: Option<f64>,
) {
    let parents = ped.families[family.0].parents;
    let (head, spouse) = {
        let fam = &ped.families[family.0];
        (fam.head, fam.spouse)
    };

    let mut factor = [1.0f64; 2];
    let mut penetrance = [1.0f64; 2];
    for side in [DAD, MOM] {
        let parent_id = parents[side];
        let parent = &ped.persons[parent_id.0];
        if parent.touched {
            if parent_id != proband {
                let cell = &parent.conditionals[multi_locus_index[side]];
                factor[side] = cell.likelihood * cell.weight;
            }
        } else if parent.is_founder() {
            if !ctx.options.linkage_disequilibrium {
                factor[side] = weight[side];
            } else if parent.loop_breaker == 0 {
                factor[side] = haplotype_frequency(ped, ctx, ws, pairs, family, side);
            }
        }
        if !ped.persons[parent_id.0].touched && parent_id == proband {
            ped.persons[parent_id.0].conditionals[multi_locus_index[side]].weight = factor[side];
            factor[side] = 1.0;
        }
        if let Some(trait_locus) = ctx.sub.trait_index {
            let parent = &ped.persons[parent_id.0];
            if !parent.touched && (parent.loop_breaker == 0 || !parent.is_founder()) {
                let pair = &pairs.per_locus[trait_locus][ws.pair_ix[trait_locus]];
                let genotype =
                    &ped.genotypes(parent_id, ctx.sub.orig(trait_locus))[pair.genotypes[side]];
                penetrance[side] = genotype.penetrance;
            }
        }
    }

    let child_product = match child_product {
        Some(replayed) => replayed,
        None => {
            ped.families[family.0].full_computations += 1;
            let mut product = 1.0;
            ws.mult_count = 0;
            for child_ix in 0..ped.families[family.0].children.len() {
                let mut sum = 0.0;
                loop_child_multi_locus_genotype(
                    ped, ctx, ws, pairs, family, proband, child_ix, 0, 0, [0, 0], &mut sum,
                );
                product *= sum;
            }
            product
        }
    };

    let cell = &mut ws.ppair[multi_locus_phase[head]][multi_locus_phase[spouse]];
    cell.likelihood_index = multi_locus_index[head];
    cell.count = 1;
    cell.likelihood =
        factor[head] * factor[spouse] * penetrance[head] * penetrance[spouse] * child_product;
}

/// Enumerate one child's compatible multi-locus genotypes under the current
/// parental pair, summing transmission probability times the child factor.
#[allow(clippy::too_many_arguments)]
fn loop_child_multi_locus_genotype(
    ped: &Pedigree,
    ctx: &PeelContext,
    ws: &mut PeelWorkspace,
    pairs: &PairSpace,
    family: FamilyId,
    proband: PersonId,
    child_ix: usize,
    locus: usize,
    multi_locus_index: usize,
    xmission_index: [usize; 2],
    sum: &mut f64,
) {
    let orig = ctx.sub.orig(locus);
    let child = ped.families[family.0].children[child_ix];
    let base = multi_locus_index * ped.saved_count(child, orig).max(1);
    let shifted = [xmission_index[DAD] << 2, xmission_index[MOM] << 2];

    let pair = &pairs.per_locus[locus][ws.pair_ix[locus]];
    for (slot, &geno_ix) in pair.child_genotypes[child_ix].iter().enumerate() {
        let genotype = &ped.genotypes(child, orig)[geno_ix];
        ws.child_geno_ix[locus] = slot;
        let index = base + genotype.position;
        let next_xmission = [
            shifted[DAD] | usize::from(pair.child_inheritance[DAD][child_ix][slot]),
            shifted[MOM] | usize::from(pair.child_inheritance[MOM][child_ix][slot]),
        ];

        if locus + 1 < ctx.sub.len() {
            loop_child_multi_locus_genotype(
                ped, ctx, ws, pairs, family, proband, child_ix, locus + 1, index, next_xmission, sum,
            );
            continue;
        }

        // the X-linked shortcut: a male child's X always comes from mom
        let prob = if ctx.options.sex_linked && ped.persons[child.0].sex == Sex::Male {
            ctx.xmission.prob(next_xmission[MOM])[MAP_FEMALE]
        } else {
            ctx.xmission.prob(next_xmission[DAD])[MAP_MALE]
                * ctx.xmission.prob(next_xmission[MOM])[MAP_FEMALE]
        };

        let factor = if child == proband {
            // the proband's own penetrance is folded in later, exactly once
            1.0
        } else if ped.persons[child.0].touched {
            ped.persons[child.0].conditionals[index].likelihood
        } else if let Some(trait_locus) = ctx.sub.trait_index {
            let tpair = &pairs.per_locus[trait_locus][ws.pair_ix[trait_locus]];
            let trait_geno_ix = tpair.child_genotypes[child_ix][ws.child_geno_ix[trait_locus]];
            ped.genotypes(child, ctx.sub.orig(trait_locus))[trait_geno_ix].penetrance
        } else {
            1.0
        };

        *sum += prob * factor;
        if ws.calc_flag == 1 {
            ws.cache_child_element(ChildElement { xmission_index: next_xmission, factor });
            ws.child_counts[child_ix] += 1;
        }
    }
}

/// Founder weight under linkage disequilibrium: the product of the paternal
/// and maternal haplotype frequencies of the parent's current multi-locus
/// genotype, read from the LD block between the last two analysis loci.
fn haplotype_frequency(
    ped: &Pedigree,
    ctx: &PeelContext,
    ws: &PeelWorkspace,
    pairs: &PairSpace,
    family: FamilyId,
    parent_side: usize,
) -> f64 {
    let last = ctx.sub.len() - 1;
    if last == 0 {
        return 1.0;
    }
    let orig1 = ctx.sub.orig(last - 1);
    let orig2 = ctx.sub.orig(last);
    let Some(block) = ctx.loci.find_ld(orig1, orig2) else {
        warn!("no LD parameters between loci {orig1} and {orig2}");
        return f64::NAN;
    };

    let parent = ped.families[family.0].parents[parent_side];
    let pair1 = &pairs.per_locus[last - 1][ws.pair_ix[last - 1]];
    let pair2 = &pairs.per_locus[last][ws.pair_ix[last]];
    let geno1 = &ped.genotypes(parent, orig1)[pair1.genotypes[parent_side]];
    let geno2 = &ped.genotypes(parent, orig2)[pair2.genotypes[parent_side]];

    let mut freq = [0.0f64; 2];
    for strand in [DAD, MOM] {
        let set1 = ctx.loci.loci[orig1].set(geno1.alleles[strand]);
        let set2 = ctx.loci.loci[orig2].set(geno2.alleles[strand]);
        for &allele1 in &set1.alleles {
            for &allele2 in &set2.alleles {
                freq[strand] += block.haplo_freq[allele1 - 1][allele2 - 1];
            }
        }
        // an X-linked father carries a single haplotype
        if ctx.options.sex_linked && parent_side == DAD {
            freq[MOM] = 1.0;
            break;
        }
    }
    freq[DAD] * freq[MOM]
}
