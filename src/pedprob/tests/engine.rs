//! End-to-end likelihood checks against a brute-force oracle that
//! enumerates every phased multi-locus genotype assignment directly.

use pedprob::trait_model::{PenetranceTable, TraitDef, TraitLocus};
use pedprob::{
    evaluate_pedigree, EngineOptions, Locus, LocusList, Pedigree, PersonDef, Phenotype, Sex,
    SubLocusList,
};

// ---- Oracle ------------------------------------------------------------

/// One person for the oracle: optional parents (indices into the person
/// list), per-locus observations, and per-locus penetrance.
struct OraclePerson {
    parents: Option<(usize, usize)>,
    /// Unordered observed genotype per locus; `None` means untyped.
    observed: Vec<Option<(usize, usize)>>,
    /// Penetrance of a phased genotype per locus.
    penetrance: Vec<fn(usize, usize) -> f64>,
}

fn no_penetrance(_: usize, _: usize) -> f64 {
    1.0
}

/// Probability that a parent with the given phased multi-locus genotype
/// transmits the haplotype: sum over strand paths with recombination at
/// rate `theta` between adjacent loci.
fn transmit(parent: &[(usize, usize)], haplotype: &[usize], thetas: &[f64]) -> f64 {
    let loci = parent.len();
    let mut total = 0.0;
    for path in 0..(1usize << loci) {
        let mut p = 0.5;
        let mut ok = true;
        for locus in 0..loci {
            let strand = (path >> locus) & 1;
            let allele = if strand == 0 { parent[locus].0 } else { parent[locus].1 };
            if allele != haplotype[locus] {
                ok = false;
                break;
            }
            if locus > 0 {
                let prev = (path >> (locus - 1)) & 1;
                p *= if strand == prev { 1.0 - thetas[locus - 1] } else { thetas[locus - 1] };
            }
        }
        if ok {
            total += p;
        }
    }
    total
}

/// Direct summation over all phased genotype assignments.
fn oracle(freqs: &[Vec<f64>], thetas: &[f64], persons: &[OraclePerson]) -> f64 {
    let loci = freqs.len();
    // state per person per locus: index into the n*n ordered pairs
    let dims: Vec<usize> = persons
        .iter()
        .flat_map(|_| freqs.iter().map(|f| f.len() * f.len()))
        .collect();
    let mut state = vec![0usize; dims.len()];
    let mut total = 0.0;

    'outer: loop {
        // decode: genotype[person][locus] = (paternal, maternal)
        let genotype: Vec<Vec<(usize, usize)>> = persons
            .iter()
            .enumerate()
            .map(|(p, _)| {
                (0..loci)
                    .map(|l| {
                        let n = freqs[l].len();
                        let s = state[p * loci + l];
                        (s / n + 1, s % n + 1)
                    })
                    .collect()
            })
            .collect();

        let mut term = 1.0;
        for (p, person) in persons.iter().enumerate() {
            for l in 0..loci {
                let (a, b) = genotype[p][l];
                if let Some((x, y)) = person.observed[l] {
                    if !((a, b) == (x, y) || (a, b) == (y, x)) {
                        term = 0.0;
                    }
                }
                term *= (person.penetrance[l])(a, b);
            }
            if term == 0.0 {
                break;
            }
            match person.parents {
                None => {
                    for l in 0..loci {
                        let (a, b) = genotype[p][l];
                        term *= freqs[l][a - 1] * freqs[l][b - 1];
                    }
                }
                Some((father, mother)) => {
                    let paternal: Vec<usize> = (0..loci).map(|l| genotype[p][l].0).collect();
                    let maternal: Vec<usize> = (0..loci).map(|l| genotype[p][l].1).collect();
                    term *= transmit(&genotype[father], &paternal, thetas);
                    term *= transmit(&genotype[mother], &maternal, thetas);
                }
            }
            if term == 0.0 {
                break;
            }
        }
        total += term;

        // odometer
        for i in 0..dims.len() {
            state[i] += 1;
            if state[i] < dims[i] {
                continue 'outer;
            }
            state[i] = 0;
        }
        break;
    }
    total
}

// ---- Fixtures ----------------------------------------------------------

fn disease_locus() -> Locus {
    let mut table = PenetranceTable::new(1, 2);
    table.set_symmetric(0, 1, 1, 0.9); // DD
    table.set_symmetric(0, 1, 2, 0.5); // Dd
    table.set_symmetric(0, 2, 2, 0.01); // dd
    Locus::trait_locus(
        "disease",
        &[0.1, 0.9],
        TraitLocus { traits: vec![TraitDef::dichotomous(table, 1)], map_position: 0.0 },
    )
}

fn dt_penetrance_affected(a: usize, b: usize) -> f64 {
    match (a, b) {
        (1, 1) => 0.9,
        (2, 2) => 0.01,
        _ => 0.5,
    }
}

fn dt_penetrance_unaffected(a: usize, b: usize) -> f64 {
    1.0 - dt_penetrance_affected(a, b)
}

fn affection(status: usize) -> Phenotype {
    Phenotype::Affection { status, liability_class: 1 }
}

fn geno(a: usize, b: usize) -> Phenotype {
    Phenotype::Genotyped { alleles: (a, b), phased: false }
}

// ---- Scenarios ---------------------------------------------------------

/// Affected father, unaffected mother, affected child; one dichotomous
/// trait locus with penetrances (0.9, 0.5, 0.01) and disease frequency 0.1.
///
/// Closed form: sum over the father's, mother's and child's phased
/// genotypes of
///   freq(father) * pen_aff(father) * freq(mother) * (1 - pen_aff(mother))
///     * P(child | father, mother) * pen_aff(child),
/// whose leading term is 2*0.1*0.9*0.9 * 0.5 * ... as in the by-hand
/// expansion; the oracle below performs exactly that summation.
#[test]
fn nuclear_trio_dichotomous_trait() {
    let mut loci = LocusList::new();
    loci.push(disease_locus());
    let sub = SubLocusList::new(&loci, vec![0], &[]).unwrap();

    let defs = vec![
        PersonDef::new("dad", Sex::Male).with_phenotypes(vec![affection(2)]),
        PersonDef::new("mom", Sex::Female).with_phenotypes(vec![affection(1)]),
        PersonDef::new("kid", Sex::Male)
            .with_parents("dad", "mom")
            .with_phenotypes(vec![affection(2)])
            .proband(),
    ];
    let mut ped = Pedigree::assemble("s1", &defs).unwrap();
    let likelihood =
        evaluate_pedigree(&mut ped, &mut loci, &sub, EngineOptions::default()).unwrap();

    let expected = oracle(
        &[vec![0.1, 0.9]],
        &[],
        &[
            OraclePerson {
                parents: None,
                observed: vec![None],
                penetrance: vec![dt_penetrance_affected],
            },
            OraclePerson {
                parents: None,
                observed: vec![None],
                penetrance: vec![dt_penetrance_unaffected],
            },
            OraclePerson {
                parents: Some((0, 1)),
                observed: vec![None],
                penetrance: vec![dt_penetrance_affected],
            },
        ],
    );
    assert!(
        (likelihood - expected).abs() < 1.0e-12,
        "engine {likelihood:e} vs oracle {expected:e}"
    );
    assert!(likelihood > 0.0);
}

/// Two-point: the trait locus linked to a typed marker at theta 0.15.
#[test]
fn trio_trait_plus_marker_two_point() {
    let mut loci = LocusList::new();
    loci.push(disease_locus());
    loci.push(Locus::marker("m1", &[0.6, 0.4]));
    let theta = 0.15;
    let sub = SubLocusList::new(&loci, vec![0, 1], &[theta]).unwrap();

    let defs = vec![
        PersonDef::new("dad", Sex::Male).with_phenotypes(vec![affection(2), geno(1, 2)]),
        PersonDef::new("mom", Sex::Female).with_phenotypes(vec![affection(1), geno(1, 1)]),
        PersonDef::new("kid", Sex::Male)
            .with_parents("dad", "mom")
            .with_phenotypes(vec![affection(2), geno(1, 2)])
            .proband(),
    ];
    let mut ped = Pedigree::assemble("s2", &defs).unwrap();
    let likelihood =
        evaluate_pedigree(&mut ped, &mut loci, &sub, EngineOptions::default()).unwrap();

    let expected = oracle(
        &[vec![0.1, 0.9], vec![0.6, 0.4]],
        &[theta],
        &[
            OraclePerson {
                parents: None,
                observed: vec![None, Some((1, 2))],
                penetrance: vec![dt_penetrance_affected, no_penetrance],
            },
            OraclePerson {
                parents: None,
                observed: vec![None, Some((1, 1))],
                penetrance: vec![dt_penetrance_unaffected, no_penetrance],
            },
            OraclePerson {
                parents: Some((0, 1)),
                observed: vec![None, Some((1, 2))],
                penetrance: vec![dt_penetrance_affected, no_penetrance],
            },
        ],
    );
    assert!(
        (likelihood - expected).abs() < 1.0e-12,
        "engine {likelihood:e} vs oracle {expected:e}"
    );
}

/// The pedigree likelihood must not depend on which person anchors the
/// peeling.
#[test]
fn peeling_is_proband_order_independent() {
    let mut reference = None;
    for proband in ["gpa", "dad", "mom", "kid", "aunt"] {
        let mut loci = LocusList::new();
        loci.push(Locus::marker("m1", &[0.3, 0.3, 0.4]));
        let sub = SubLocusList::new(&loci, vec![0], &[]).unwrap();
        let defs = vec![
            PersonDef::new("gpa", Sex::Male).with_phenotypes(vec![geno(1, 2)]),
            PersonDef::new("gma", Sex::Female).with_phenotypes(vec![Phenotype::Untyped]),
            PersonDef::new("dad", Sex::Male)
                .with_parents("gpa", "gma")
                .with_phenotypes(vec![Phenotype::Untyped]),
            PersonDef::new("aunt", Sex::Female)
                .with_parents("gpa", "gma")
                .with_phenotypes(vec![geno(2, 3)]),
            PersonDef::new("mom", Sex::Female).with_phenotypes(vec![geno(1, 3)]),
            PersonDef::new("kid", Sex::Female)
                .with_parents("dad", "mom")
                .with_phenotypes(vec![geno(1, 1)]),
        ];
        let defs: Vec<PersonDef> = defs
            .into_iter()
            .map(|d| if d.id == proband { d.proband() } else { d })
            .collect();
        let mut ped = Pedigree::assemble("order", &defs).unwrap();
        let likelihood =
            evaluate_pedigree(&mut ped, &mut loci, &sub, EngineOptions::default()).unwrap();
        assert!(likelihood > 0.0);
        match reference {
            None => reference = Some(likelihood),
            Some(expected) => assert!(
                (likelihood - expected).abs() <= 1.0e-12 * expected,
                "proband {proband}: {likelihood:e} vs {expected:e}"
            ),
        }
    }
}

/// First-cousin marriage broken with a duplicate: the sum over the
/// duplicate's genotype assignments must equal the direct enumeration of
/// the true (cyclic) pedigree.
#[test]
fn loop_breaker_sum_matches_direct_enumeration() {
    let mut loci = LocusList::new();
    loci.push(Locus::marker("m1", &[0.7, 0.3]));
    let sub = SubLocusList::new(&loci, vec![0], &[]).unwrap();

    let untyped = vec![Phenotype::Untyped];
    let defs = vec![
        PersonDef::new("g1", Sex::Male).with_phenotypes(untyped.clone()),
        PersonDef::new("g2", Sex::Female).with_phenotypes(untyped.clone()),
        PersonDef::new("p1", Sex::Male).with_parents("g1", "g2").with_phenotypes(untyped.clone()),
        PersonDef::new("p2", Sex::Female).with_parents("g1", "g2").with_phenotypes(untyped.clone()),
        PersonDef::new("s1", Sex::Female).with_phenotypes(untyped.clone()),
        PersonDef::new("s2", Sex::Male).with_phenotypes(untyped.clone()),
        PersonDef::new("c1", Sex::Male).with_parents("p1", "s1").with_phenotypes(untyped.clone()),
        PersonDef::new("c2", Sex::Female)
            .with_parents("s2", "p2")
            .with_phenotypes(untyped.clone())
            .loop_breaker(1),
        PersonDef::new("c2dup", Sex::Female)
            .with_phenotypes(untyped.clone())
            .duplicate_of("c2", 1),
        PersonDef::new("kid", Sex::Male)
            .with_parents("c1", "c2dup")
            .with_phenotypes(vec![geno(2, 2)])
            .proband(),
    ];
    let mut ped = Pedigree::assemble("loop", &defs).unwrap();
    assert!(ped.has_loop());
    let likelihood =
        evaluate_pedigree(&mut ped, &mut loci, &sub, EngineOptions::default()).unwrap();

    // direct enumeration of the collapsed pedigree: kid's mother is c2
    let person = |parents: Option<(usize, usize)>, observed: Option<(usize, usize)>| OraclePerson {
        parents,
        observed: vec![observed],
        penetrance: vec![no_penetrance],
    };
    let expected = oracle(
        &[vec![0.7, 0.3]],
        &[],
        &[
            person(None, None),            // g1
            person(None, None),            // g2
            person(Some((0, 1)), None),    // p1
            person(Some((0, 1)), None),    // p2
            person(None, None),            // s1
            person(None, None),            // s2
            person(Some((2, 4)), None),    // c1
            person(Some((5, 3)), None),    // c2
            person(Some((6, 7)), Some((2, 2))), // kid
        ],
    );
    assert!(
        (likelihood - expected).abs() < 1.0e-12,
        "engine {likelihood:e} vs oracle {expected:e}"
    );
}

/// Disabling recoding must not change the likelihood, only the work done.
#[test]
fn recoding_preserves_likelihood() {
    use pedprob::peeling::{pedigree_likelihood, PeelContext};
    use pedprob::transmission::TransmissionMatrix;
    use pedprob::{allele_set_recoding, pedigree_genotype_elimination};

    let defs = vec![
        PersonDef::new("dad", Sex::Male).with_phenotypes(vec![Phenotype::Untyped]),
        PersonDef::new("mom", Sex::Female).with_phenotypes(vec![geno(1, 2)]),
        PersonDef::new("kid1", Sex::Male)
            .with_parents("dad", "mom")
            .with_phenotypes(vec![geno(1, 1)])
            .proband(),
        PersonDef::new("kid2", Sex::Female)
            .with_parents("dad", "mom")
            .with_phenotypes(vec![Phenotype::Untyped]),
    ];

    let run = |recode: bool| -> f64 {
        let mut loci = LocusList::new();
        loci.push(Locus::marker("m1", &[0.4, 0.3, 0.2, 0.1]));
        let sub = SubLocusList::new(&loci, vec![0], &[]).unwrap();
        let mut ped = Pedigree::assemble("recode", &defs).unwrap();
        ped.build_genotypes(&loci).unwrap();
        pedigree_genotype_elimination(&mut ped, 0, false);
        if recode {
            allele_set_recoding(&mut ped, &mut loci, 0, false);
        }
        ped.apply_penetrances(&loci);
        ped.freeze_and_save();
        ped.allocate_conditionals(&sub.indices);
        let xmission = TransmissionMatrix::build(&sub);
        let ctx = PeelContext {
            loci: &loci,
            sub: &sub,
            xmission: &xmission,
            options: EngineOptions::default(),
        };
        pedigree_likelihood(&mut ped, &ctx)
    };

    let with_recoding = run(true);
    let without_recoding = run(false);
    assert!(with_recoding > 0.0);
    assert!(
        (with_recoding - without_recoding).abs() <= 1.0e-10 * without_recoding,
        "{with_recoding:e} vs {without_recoding:e}"
    );
}

/// A father heterozygous and unphased at both of two loci spawns a
/// related-pair group of four phase variants; at most half of them may run
/// the full child sums, the rest reuse phase symmetry or the factor cache.
#[test]
fn phase_variants_reuse_computations() {
    let mut loci = LocusList::new();
    loci.push(Locus::marker("m1", &[0.6, 0.4]));
    loci.push(Locus::marker("m2", &[0.5, 0.5]));
    let sub = SubLocusList::new(&loci, vec![0, 1], &[0.1]).unwrap();

    let defs = vec![
        PersonDef::new("dad", Sex::Male).with_phenotypes(vec![geno(1, 2), geno(1, 2)]),
        PersonDef::new("mom", Sex::Female).with_phenotypes(vec![geno(1, 1), geno(1, 1)]),
        PersonDef::new("kid", Sex::Male)
            .with_parents("dad", "mom")
            .with_phenotypes(vec![geno(1, 1), geno(1, 2)])
            .proband(),
    ];
    let mut ped = Pedigree::assemble("phase", &defs).unwrap();
    let likelihood =
        evaluate_pedigree(&mut ped, &mut loci, &sub, EngineOptions::default()).unwrap();
    assert!(likelihood > 0.0);

    let family = &ped.families[0];
    assert!(family.similar_pairs > 0, "expected a related-pair group");
    let group_size = family.similar_pairs + family.pair_groups;
    let allowed = (group_size + 1) / 2;
    assert!(
        family.full_computations <= allowed,
        "{} full computations where at most {allowed} are expected",
        family.full_computations,
    );
    assert!(family.phase_reuses + family.cache_replays > 0);

    // the reuse must be invisible in the result: compare against imprinting
    // mode, which disables every shortcut
    let mut ped2 = Pedigree::assemble("phase", &defs).unwrap();
    let mut loci2 = LocusList::new();
    loci2.push(Locus::marker("m1", &[0.6, 0.4]));
    loci2.push(Locus::marker("m2", &[0.5, 0.5]));
    let options = EngineOptions { imprinting: true, ..EngineOptions::default() };
    let exhaustive = evaluate_pedigree(&mut ped2, &mut loci2, &sub, options).unwrap();
    assert!((likelihood - exhaustive).abs() <= 1.0e-12 * exhaustive);
}

/// Under linkage disequilibrium the founder weights come from the
/// haplotype-frequency block instead of allele-frequency products.
#[test]
fn ld_founder_weights_use_haplotype_frequencies() {
    use pedprob::LdBlock;

    let mut loci = LocusList::new();
    loci.push(Locus::marker("m1", &[0.6, 0.4]));
    loci.push(Locus::marker("m2", &[0.7, 0.3]));
    let block = LdBlock::from_dprime(0, 1, &[0.6, 0.4], &[0.7, 0.3], vec![vec![0.5]]);
    let h = block.haplo_freq.clone();
    loci.add_ld_block(block);
    let theta = 0.1;
    let sub = SubLocusList::new(&loci, vec![0, 1], &[theta]).unwrap();

    let defs = vec![
        PersonDef::new("dad", Sex::Male).with_phenotypes(vec![geno(1, 1), geno(1, 1)]),
        PersonDef::new("mom", Sex::Female).with_phenotypes(vec![geno(1, 2), geno(1, 2)]),
        PersonDef::new("kid", Sex::Male)
            .with_parents("dad", "mom")
            .with_phenotypes(vec![geno(1, 1), geno(1, 1)])
            .proband(),
    ];
    let mut ped = Pedigree::assemble("ld", &defs).unwrap();
    let options = EngineOptions { linkage_disequilibrium: true, ..EngineOptions::default() };
    let likelihood = evaluate_pedigree(&mut ped, &mut loci, &sub, options).unwrap();

    // dad is doubly homozygous for the 1-1 haplotype; mom's four phase
    // configurations pair the 1-1/2-2 and 1-2/2-1 haplotypes, and the kid
    // receives mom's 1-1 with or without a recombination
    let expected = h[0][0] * h[0][0]
        * (h[0][0] * h[1][1] * (1.0 - theta) + h[0][1] * h[1][0] * theta);
    assert!(
        (likelihood - expected).abs() < 1.0e-12,
        "engine {likelihood:e} vs expected {expected:e}"
    );
}

/// Mendelian-impossible data zeroes the pedigree, it does not error.
#[test]
fn infeasible_pedigree_yields_zero() {
    let mut loci = LocusList::new();
    loci.push(Locus::marker("m1", &[0.5, 0.5]));
    let sub = SubLocusList::new(&loci, vec![0], &[]).unwrap();
    let defs = vec![
        PersonDef::new("dad", Sex::Male).with_phenotypes(vec![geno(1, 1)]),
        PersonDef::new("mom", Sex::Female).with_phenotypes(vec![geno(1, 1)]),
        PersonDef::new("kid", Sex::Male)
            .with_parents("dad", "mom")
            .with_phenotypes(vec![geno(2, 2)])
            .proband(),
    ];
    let mut ped = Pedigree::assemble("bad", &defs).unwrap();
    let likelihood =
        evaluate_pedigree(&mut ped, &mut loci, &sub, EngineOptions::default()).unwrap();
    assert_eq!(likelihood, 0.0);
}

fn normal_pdf(x: f64, mean: f64) -> f64 {
    (-(x - mean) * (x - mean) / 2.0).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

fn qt_mean_of(a: usize, b: usize) -> f64 {
    match (a, b) {
        (1, 1) => 2.0,
        (2, 2) => 0.0,
        _ => 1.0,
    }
}

fn qt_pen_dad(a: usize, b: usize) -> f64 {
    normal_pdf(1.5, qt_mean_of(a, b))
}

fn qt_pen_kid(a: usize, b: usize) -> f64 {
    normal_pdf(2.2, qt_mean_of(a, b))
}

/// Quantitative trait: the per-genotype factor is the normal density of
/// the observed value, and an unknown value contributes one.
#[test]
fn quantitative_trait_uses_the_normal_density() {
    use pedprob::trait_model::{QuantTable, TraitDistribution};

    let mut means = QuantTable::new(1, 2);
    means.set_symmetric(0, 1, 1, 2.0);
    means.set_symmetric(0, 1, 2, 1.0);
    means.set_symmetric(0, 2, 2, 0.0);
    let mut sds = QuantTable::new(1, 2);
    for (a, b) in [(1, 1), (1, 2), (2, 2)] {
        sds.set_symmetric(0, a, b, 1.0);
    }
    let mut loci = LocusList::new();
    loci.push(Locus::trait_locus(
        "qt",
        &[0.3, 0.7],
        TraitLocus {
            traits: vec![TraitDef::quantitative(means, sds, TraitDistribution::Normal, 1)],
            map_position: 0.0,
        },
    ));
    let sub = SubLocusList::new(&loci, vec![0], &[]).unwrap();

    let quantitative = |value: Option<f64>| Phenotype::Quantitative { value, liability_class: 1 };
    let defs = vec![
        PersonDef::new("dad", Sex::Male).with_phenotypes(vec![quantitative(Some(1.5))]),
        PersonDef::new("mom", Sex::Female).with_phenotypes(vec![quantitative(None)]),
        PersonDef::new("kid", Sex::Female)
            .with_parents("dad", "mom")
            .with_phenotypes(vec![quantitative(Some(2.2))])
            .proband(),
    ];
    let mut ped = Pedigree::assemble("qt", &defs).unwrap();
    let likelihood =
        evaluate_pedigree(&mut ped, &mut loci, &sub, EngineOptions::default()).unwrap();

    let expected = oracle(
        &[vec![0.3, 0.7]],
        &[],
        &[
            OraclePerson { parents: None, observed: vec![None], penetrance: vec![qt_pen_dad] },
            OraclePerson { parents: None, observed: vec![None], penetrance: vec![no_penetrance] },
            OraclePerson {
                parents: Some((0, 1)),
                observed: vec![None],
                penetrance: vec![qt_pen_kid],
            },
        ],
    );
    assert!(
        (likelihood - expected).abs() <= 1.0e-9 * expected,
        "engine {likelihood:e} vs oracle {expected:e}"
    );
}

fn lc1_affected(a: usize, b: usize) -> f64 {
    dt_penetrance_affected(a, b)
}

fn lc2_unaffected(a: usize, b: usize) -> f64 {
    1.0 - match (a, b) {
        (1, 1) => 0.6,
        (2, 2) => 0.05,
        _ => 0.3,
    }
}

/// Liability classes select which penetrance column applies per person.
#[test]
fn liability_classes_pick_their_own_penetrances() {
    let mut table = PenetranceTable::new(2, 2);
    table.set_symmetric(0, 1, 1, 0.9);
    table.set_symmetric(0, 1, 2, 0.5);
    table.set_symmetric(0, 2, 2, 0.01);
    table.set_symmetric(1, 1, 1, 0.6);
    table.set_symmetric(1, 1, 2, 0.3);
    table.set_symmetric(1, 2, 2, 0.05);
    let mut loci = LocusList::new();
    loci.push(Locus::trait_locus(
        "disease",
        &[0.1, 0.9],
        TraitLocus { traits: vec![TraitDef::dichotomous(table, 2)], map_position: 0.0 },
    ));
    let sub = SubLocusList::new(&loci, vec![0], &[]).unwrap();

    let defs = vec![
        PersonDef::new("dad", Sex::Male)
            .with_phenotypes(vec![Phenotype::Affection { status: 2, liability_class: 1 }]),
        PersonDef::new("mom", Sex::Female)
            .with_phenotypes(vec![Phenotype::Affection { status: 1, liability_class: 2 }]),
        PersonDef::new("kid", Sex::Male)
            .with_parents("dad", "mom")
            .with_phenotypes(vec![Phenotype::Affection { status: 2, liability_class: 1 }])
            .proband(),
    ];
    let mut ped = Pedigree::assemble("lc", &defs).unwrap();
    let likelihood =
        evaluate_pedigree(&mut ped, &mut loci, &sub, EngineOptions::default()).unwrap();

    let expected = oracle(
        &[vec![0.1, 0.9]],
        &[],
        &[
            OraclePerson { parents: None, observed: vec![None], penetrance: vec![lc1_affected] },
            OraclePerson { parents: None, observed: vec![None], penetrance: vec![lc2_unaffected] },
            OraclePerson {
                parents: Some((0, 1)),
                observed: vec![None],
                penetrance: vec![lc1_affected],
            },
        ],
    );
    assert!(
        (likelihood - expected).abs() < 1.0e-12,
        "engine {likelihood:e} vs oracle {expected:e}"
    );
}

/// Three-locus multipoint: marker - trait - marker, sub-list assembled
/// from map positions.
#[test]
fn multipoint_three_locus_matches_the_oracle() {
    let mut table = PenetranceTable::new(1, 2);
    table.set_symmetric(0, 1, 1, 0.9);
    table.set_symmetric(0, 1, 2, 0.5);
    table.set_symmetric(0, 2, 2, 0.01);
    let mut loci = LocusList::new();
    loci.push(Locus::trait_locus(
        "disease",
        &[0.1, 0.9],
        TraitLocus { traits: vec![TraitDef::dichotomous(table, 1)], map_position: 5.0 },
    ));
    loci.push(Locus::marker_at("m1", &[0.6, 0.4], 0.0));
    loci.push(Locus::marker_at("m2", &[0.5, 0.5], 12.0));

    let sub = SubLocusList::multipoint(&loci, 0, 5.0, 2, true).unwrap();
    assert_eq!(sub.indices, vec![1, 0, 2]);
    let theta1 = sub.prev_distance[1][1];
    let theta2 = sub.prev_distance[1][2];

    let defs = vec![
        PersonDef::new("dad", Sex::Male)
            .with_phenotypes(vec![affection(2), geno(1, 2), geno(1, 2)]),
        PersonDef::new("mom", Sex::Female)
            .with_phenotypes(vec![affection(1), geno(1, 1), geno(1, 2)]),
        PersonDef::new("kid", Sex::Male)
            .with_parents("dad", "mom")
            .with_phenotypes(vec![affection(2), geno(1, 2), geno(2, 2)])
            .proband(),
    ];
    let mut ped = Pedigree::assemble("mp", &defs).unwrap();
    let likelihood =
        evaluate_pedigree(&mut ped, &mut loci, &sub, EngineOptions::default()).unwrap();

    // oracle locus order follows the sub-list: m1, trait, m2
    let expected = oracle(
        &[vec![0.6, 0.4], vec![0.1, 0.9], vec![0.5, 0.5]],
        &[theta1, theta2],
        &[
            OraclePerson {
                parents: None,
                observed: vec![Some((1, 2)), None, Some((1, 2))],
                penetrance: vec![no_penetrance, dt_penetrance_affected, no_penetrance],
            },
            OraclePerson {
                parents: None,
                observed: vec![Some((1, 1)), None, Some((1, 2))],
                penetrance: vec![no_penetrance, dt_penetrance_unaffected, no_penetrance],
            },
            OraclePerson {
                parents: Some((0, 1)),
                observed: vec![Some((1, 2)), None, Some((2, 2))],
                penetrance: vec![no_penetrance, dt_penetrance_affected, no_penetrance],
            },
        ],
    );
    assert!(
        (likelihood - expected).abs() <= 1.0e-12 * expected.max(1e-300),
        "engine {likelihood:e} vs oracle {expected:e}"
    );
}

/// A pedigree set multiplies its members, honouring case counts, and any
/// zero member zeroes the set.
#[test]
fn pedigree_sets_combine_multiplicatively() {
    use pedprob::{evaluate_pedigree_set, LOG10_ZERO_SET};

    let trio = |tag: &str, kid_geno: Phenotype| -> Vec<PersonDef> {
        vec![
            PersonDef::new(&format!("{tag}-dad"), Sex::Male)
                .with_phenotypes(vec![geno(1, 2)]),
            PersonDef::new(&format!("{tag}-mom"), Sex::Female)
                .with_phenotypes(vec![Phenotype::Untyped]),
            PersonDef::new(&format!("{tag}-kid"), Sex::Male)
                .with_parents(&format!("{tag}-dad"), &format!("{tag}-mom"))
                .with_phenotypes(vec![kid_geno])
                .proband(),
        ]
    };

    let mut loci = LocusList::new();
    loci.push(Locus::marker("m1", &[0.6, 0.4]));
    let sub = SubLocusList::new(&loci, vec![0], &[]).unwrap();

    let mut a = Pedigree::assemble("a", &trio("a", geno(1, 1))).unwrap();
    let mut b = Pedigree::assemble("b", &trio("b", geno(1, 2))).unwrap();
    let la = evaluate_pedigree(&mut a, &mut loci, &sub, EngineOptions::default()).unwrap();
    let lb = evaluate_pedigree(&mut b, &mut loci, &sub, EngineOptions::default()).unwrap();

    let mut set = vec![
        Pedigree::assemble("a", &trio("a", geno(1, 1))).unwrap(),
        Pedigree::assemble("b", &trio("b", geno(1, 2))).unwrap(),
    ];
    let combined =
        evaluate_pedigree_set(&mut set, &[1, 2], &mut loci, &sub, EngineOptions::default())
            .unwrap();
    let expected = la * lb * lb;
    assert!((combined.product - expected).abs() <= 1.0e-12 * expected);
    assert!((combined.log10 - expected.log10()).abs() < 1.0e-9);

    // an infeasible member zeroes the whole set
    let impossible = vec![
        PersonDef::new("c-dad", Sex::Male).with_phenotypes(vec![geno(1, 1)]),
        PersonDef::new("c-mom", Sex::Female).with_phenotypes(vec![geno(1, 1)]),
        PersonDef::new("c-kid", Sex::Male)
            .with_parents("c-dad", "c-mom")
            .with_phenotypes(vec![geno(2, 2)])
            .proband(),
    ];
    let mut set = vec![
        Pedigree::assemble("a", &trio("a", geno(1, 1))).unwrap(),
        Pedigree::assemble("c", &impossible).unwrap(),
    ];
    let combined =
        evaluate_pedigree_set(&mut set, &[], &mut loci, &sub, EngineOptions::default()).unwrap();
    assert_eq!(combined.product, 0.0);
    assert_eq!(combined.log10, LOG10_ZERO_SET);
}

/// X-linked: a male child's X always comes from his mother.
#[test]
fn x_linked_son_follows_the_maternal_line() {
    let mut loci = LocusList::new();
    loci.push(Locus::marker("mX", &[0.8, 0.2]));
    let sub = SubLocusList::new(&loci, vec![0], &[]).unwrap();
    let defs = vec![
        PersonDef::new("dad", Sex::Male).with_phenotypes(vec![geno(1, 1)]),
        PersonDef::new("mom", Sex::Female).with_phenotypes(vec![geno(1, 2)]),
        PersonDef::new("son", Sex::Male)
            .with_parents("dad", "mom")
            .with_phenotypes(vec![geno(2, 2)])
            .proband(),
    ];
    let mut ped = Pedigree::assemble("xlink", &defs).unwrap();
    let options = EngineOptions { sex_linked: true, ..EngineOptions::default() };
    let likelihood = evaluate_pedigree(&mut ped, &mut loci, &sub, options).unwrap();

    // male X genotypes are carried as doubled homozygotes, so dad 1/1
    // weighs 0.8^2; mom 1/2 unphased (two phased configurations at
    // 0.8*0.2 each) transmits her 2 with probability one half; the father
    // contributes nothing to his son's X
    let expected = (0.8 * 0.8) * 2.0 * (0.8 * 0.2) * 0.5;
    assert!(
        (likelihood - expected).abs() < 1.0e-12,
        "engine {likelihood:e} vs expected {expected:e}"
    );
}
