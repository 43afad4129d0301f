//! End-to-end RADSMM store scenarios: dense round trips, random-order
//! reads, rewrite tolerance, the overwrite guard, sharding, the six axis
//! orderings and header validation.

use rand::seq::SliceRandom;
use rand::SeedableRng;

use lodscore::radsmm::{
    CellIndex, ElementType, Header, MarkerMode, ModelKind, OpenMode, Ordering, Store, ThetaMatrix,
    DEFAULT_MAX_FILE_BYTES,
};

const PEDIGREES: usize = 3;
const MARKERS: usize = 4;
const THETAS: usize = 5;
const GENE_FREQS: usize = 2;
const PENETRANCES: usize = 3;

/// The deterministic dense fill pattern.
fn pattern(ped: usize, marker: usize, theta: usize, gf: usize, pen: usize) -> f64 {
    ped as f64 + 100.0 * theta as f64 + 1000.0 * pen as f64 + 10000.0 * gf as f64
        + 0.01 * marker as f64
}

fn dense_header(element: ElementType, ordering: Ordering, use_diseq: bool) -> Header {
    let mut header = Header::new();
    header.set_type(MarkerMode::TwoPoint, ModelKind::Dichotomous, use_diseq);
    header.set_element_type(element);
    header.set_ordering(ordering);
    header.set_sequential_markers(MARKERS).unwrap();
    header.set_sequential_pedigrees(PEDIGREES).unwrap();
    header
        .set_thetas(&(0..THETAS).map(|i| i as f64 * 0.1).collect::<Vec<_>>(), ThetaMatrix::Diagonal)
        .unwrap();
    header.set_penetrances(0, &[0.9, 0.8, 0.7], &[0.5, 0.4, 0.3], &[0.01, 0.02, 0.03]).unwrap();
    header.set_gene_freqs(&[0.05, 0.1]).unwrap();
    if use_diseq {
        header.set_diseqs(&[-0.5, 0.0, 0.5]).unwrap();
    }
    header.set_description("dense round trip");
    header
}

fn all_cells() -> Vec<CellIndex> {
    let mut cells = Vec::new();
    for pedigree in 0..PEDIGREES {
        for marker in 0..MARKERS {
            for theta in 0..THETAS {
                for gene_freq in 0..GENE_FREQS {
                    for penetrance in 0..PENETRANCES {
                        cells.push(CellIndex {
                            pedigree,
                            marker,
                            theta,
                            gene_freq,
                            penetrance,
                            ..CellIndex::default()
                        });
                    }
                }
            }
        }
    }
    cells
}

#[test]
fn dense_round_trip_sequential_and_random() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dense.rad");
    let mut store = Store::create(dense_header(ElementType::Float, Ordering::A, false), &path).unwrap();

    // every cell starts EMPTY
    for ix in all_cells() {
        assert!(lodscore::radsmm::sentinel::is_empty(store.read(ix).unwrap()));
    }
    for ix in all_cells() {
        let value = pattern(ix.pedigree, ix.marker, ix.theta, ix.gene_freq, ix.penetrance);
        store.write(ix, value).unwrap();
    }
    store.sync().unwrap();
    store.close().unwrap();

    // reopen and read back in order
    let mut store = Store::open(&path, OpenMode::Read).unwrap();
    for ix in all_cells() {
        let expected = pattern(ix.pedigree, ix.marker, ix.theta, ix.gene_freq, ix.penetrance);
        // the store held a float, so compare through the same conversion
        assert_eq!(store.read(ix).unwrap(), f64::from(expected as f32));
    }

    // and in a shuffled order
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
    let mut cells = all_cells();
    cells.shuffle(&mut rng);
    for ix in cells {
        let expected = pattern(ix.pedigree, ix.marker, ix.theta, ix.gene_freq, ix.penetrance);
        assert_eq!(store.read(ix).unwrap(), f64::from(expected as f32));
    }
    store.close().unwrap();

    // reissuing the identical writes must pass the overwrite guard
    let mut store = Store::open(&path, OpenMode::ReadWrite).unwrap();
    store.set_write_check(true);
    for ix in all_cells() {
        let value = pattern(ix.pedigree, ix.marker, ix.theta, ix.gene_freq, ix.penetrance);
        store.write(ix, value).unwrap();
    }
}

#[test]
fn overwrite_guard_rejects_conflicting_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("guard.rad");
    let mut store = Store::create(dense_header(ElementType::Double, Ordering::A, false), &path).unwrap();
    store.set_write_check(true);

    let ix = CellIndex { pedigree: 1, theta: 2, ..CellIndex::default() };
    store.write(ix, 1.0).unwrap();
    let err = store.write(ix, 2.0).unwrap_err();
    assert_eq!(err.code().raw(), -16);
    // within one part in 5e5 is a rewrite, not a conflict
    store.write(ix, 1.000_000_1).unwrap();
}

#[test]
fn sharding_is_transparent_to_readers() {
    assert_eq!(DEFAULT_MAX_FILE_BYTES, i32::MAX as u64);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sharded.rad");
    let mut header = dense_header(ElementType::Double, Ordering::A, false);
    // force the 2880-byte data region over a tiny per-file cap
    header.set_max_file_bytes(1024);
    let (_, files) = header.file_size().unwrap();
    assert!(files > 2, "expected several shards, got {files}");

    let mut store = Store::create(header, &path).unwrap();
    let shards = store.header().number_of_files();
    assert!(shards >= 2);
    for number in 1..=shards {
        let mut shard = path.as_os_str().to_owned();
        shard.push(format!("_{number:02}"));
        assert!(std::path::Path::new(&shard).exists(), "missing shard {number}");
    }

    for ix in all_cells() {
        let value = pattern(ix.pedigree, ix.marker, ix.theta, ix.gene_freq, ix.penetrance);
        store.write(ix, value).unwrap();
    }
    store.close().unwrap();

    let mut store = Store::open(&path, OpenMode::Read).unwrap();
    assert_eq!(store.header().number_of_files(), shards);
    for ix in all_cells() {
        let expected = pattern(ix.pedigree, ix.marker, ix.theta, ix.gene_freq, ix.penetrance);
        assert_eq!(store.read(ix).unwrap(), expected);
    }
}

#[test]
fn every_ordering_recovers_every_cell() {
    for ordering in [Ordering::A, Ordering::B, Ordering::C, Ordering::D, Ordering::E, Ordering::F] {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ordered.rad");
        let mut store =
            Store::create(dense_header(ElementType::Double, ordering, true), &path).unwrap();
        for base in all_cells() {
            for diseq in 0..3 {
                let ix = CellIndex { diseq, ..base };
                let value = pattern(ix.pedigree, ix.marker, ix.theta, ix.gene_freq, ix.penetrance)
                    + 1.0e6 * diseq as f64;
                store.write(ix, value).unwrap();
            }
        }
        store.close().unwrap();

        let mut store = Store::open(&path, OpenMode::Read).unwrap();
        assert_eq!(store.header().ordering(), ordering);
        for base in all_cells() {
            for diseq in 0..3 {
                let ix = CellIndex { diseq, ..base };
                let expected = pattern(ix.pedigree, ix.marker, ix.theta, ix.gene_freq, ix.penetrance)
                    + 1.0e6 * diseq as f64;
                assert_eq!(store.read(ix).unwrap(), expected, "ordering {ordering:?} at {ix:?}");
            }
        }
    }
}

#[test]
fn quantitative_stores_swap_the_live_axes() {
    use lodscore::radsmm::QuantModel;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("qmodel.rad");
    let mut header = Header::new();
    header.set_type(MarkerMode::TwoPoint, ModelKind::Quantitative, false);
    header.set_element_type(ElementType::Double);
    header.set_sequential_markers(2).unwrap();
    header.set_sequential_pedigrees(2).unwrap();
    header.set_thetas(&[0.0, 0.5], ThetaMatrix::Diagonal).unwrap();
    let qmodels: Vec<QuantModel> = (0..4)
        .map(|i| QuantModel {
            means: [i as f32, 1.0 + i as f32, 2.0 + i as f32],
            variances: [1.0; 3],
        })
        .collect();
    header.set_qmodels(&qmodels).unwrap();
    // penetrance and gene-frequency setup are dichotomous-only
    assert_eq!(header.set_penetrances(0, &[0.9], &[0.5], &[0.1]).unwrap_err().code().raw(), -18);
    assert_eq!(header.set_liability_classes(2).unwrap_err().code().raw(), -18);
    header.set_description("quantitative axes");

    let mut store = Store::create(header, &path).unwrap();
    // 2 peds x 2 markers x 2 thetas x 4 qmodels
    for pedigree in 0..2 {
        for marker in 0..2 {
            for theta in 0..2 {
                for qmodel in 0..4 {
                    let ix = CellIndex { pedigree, marker, theta, qmodel, ..CellIndex::default() };
                    let value = (pedigree * 1000 + marker * 100 + theta * 10 + qmodel) as f64;
                    store.write(ix, value).unwrap();
                }
            }
        }
    }
    store.close().unwrap();

    let mut store = Store::open(&path, OpenMode::Read).unwrap();
    assert_eq!(store.header().model(), ModelKind::Quantitative);
    for pedigree in 0..2 {
        for marker in 0..2 {
            for theta in 0..2 {
                for qmodel in 0..4 {
                    // the dead penetrance/gene-freq axes canonicalise away
                    let ix = CellIndex {
                        pedigree,
                        marker,
                        theta,
                        qmodel,
                        penetrance: 7,
                        gene_freq: 9,
                        ..CellIndex::default()
                    };
                    let expected = (pedigree * 1000 + marker * 100 + theta * 10 + qmodel) as f64;
                    assert_eq!(store.read(ix).unwrap(), expected);
                }
            }
        }
    }
}

#[test]
fn corrupted_cookie_fails_with_file_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cookie.rad");
    Store::create(dense_header(ElementType::Float, Ordering::A, false), &path)
        .unwrap()
        .close()
        .unwrap();

    // clobber the magic: RDMM -> XDMM
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] = b'X';
    std::fs::write(&path, bytes).unwrap();

    let err = Store::open(&path, OpenMode::Read).unwrap_err();
    assert_eq!(err.code().raw(), -13);
}

#[test]
fn labels_survive_the_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labels.rad");
    let mut header = dense_header(ElementType::Float, Ordering::A, false);
    header.setup_marker_labels(10).unwrap();
    header.set_marker_label(0, "D1S243").unwrap();
    header.setup_pedigree_labels(12).unwrap();
    header.set_pedigree_label(2, "ped042").unwrap();
    Store::create(header, &path).unwrap().close().unwrap();

    let store = Store::open(&path, OpenMode::Read).unwrap();
    assert_eq!(store.header().marker_label(0).unwrap(), "D1S243");
    // unset labels fall back to their generated defaults
    assert_eq!(store.header().marker_label(1).unwrap(), "Marker2");
    assert_eq!(store.header().pedigree_label(2).unwrap(), "ped042");
    assert_eq!(store.header().pedigree_label_index("ped042"), Some(2));
}
