use std::io::Cursor;

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::error::StoreError;
use crate::label::{LabelKind, LabelTable};

// ---- Magic values and range-check bounds
pub const COOKIE: &[u8; 4] = b"RDMM";
pub const VERSION: i32 = 1;

pub const MAX_MARKERS: usize            = 200;
pub const MAX_PEDIGREES: usize          = 1000;
pub const MAX_THETAS: usize             = 84_000;
pub const MAX_PENETRANCES: usize        = 176_750;
pub const MAX_QMODELS: usize            = 80_000;
pub const MAX_GENE_FREQS: usize         = 100;
pub const MAX_MARKER_LABEL_LEN: usize   = 48;
pub const MAX_PEDIGREE_LABEL_LEN: usize = 80;
pub const MAX_LIABILITY_CLASSES: usize  = 12;
pub const MAX_DISEQ_PARAMS: usize       = 400;

/// Size of the fixed on-disk header: every field of §layout written back to
/// back in native byte order, with the two explicit padding runs.
pub const HEADER_LEN: u64 = 306;

/// Historic single-file maximum (a 32-bit signed file size). Data beyond it
/// spills into `_NN` sibling shards.
pub const DEFAULT_MAX_FILE_BYTES: u64 = i32::MAX as u64;

/// On-disk cell representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Float,
    Double,
}

impl ElementType {
    pub fn size(self) -> u64 {
        match self {
            ElementType::Float  => 4,
            ElementType::Double => 8,
        }
    }

    pub(crate) fn as_char(self) -> u8 {
        match self {
            ElementType::Float  => b'F',
            ElementType::Double => b'D',
        }
    }

    pub(crate) fn from_char(c: u8) -> Result<ElementType, StoreError> {
        match c {
            b'F' | b'f' => Ok(ElementType::Float),
            b'D' | b'd' => Ok(ElementType::Double),
            _ => Err(StoreError::FileHeader("bad element data type")),
        }
    }
}

/// Dichotomous vs quantitative trait model. Selects which of the
/// penetrance/gene-frequency and q-model dimensions are live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Dichotomous,
    Quantitative,
}

impl ModelKind {
    pub(crate) fn as_char(self) -> u8 {
        match self {
            ModelKind::Dichotomous  => b'D',
            ModelKind::Quantitative => b'Q',
        }
    }

    pub(crate) fn from_char(c: u8) -> Result<ModelKind, StoreError> {
        match c {
            b'D' | b'd' => Ok(ModelKind::Dichotomous),
            b'Q' | b'q' => Ok(ModelKind::Quantitative),
            _ => Err(StoreError::FileHeader("bad model type")),
        }
    }
}

/// Two-point vs multipoint analysis. Multipoint stores collapse the theta
/// dimension to a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerMode {
    TwoPoint,
    Multipoint,
}

impl MarkerMode {
    pub(crate) fn as_char(self) -> u8 {
        match self {
            MarkerMode::TwoPoint   => b'2',
            MarkerMode::Multipoint => b'M',
        }
    }

    pub(crate) fn from_char(c: u8) -> Result<MarkerMode, StoreError> {
        match c {
            b'2' => Ok(MarkerMode::TwoPoint),
            b'M' | b'm' => Ok(MarkerMode::Multipoint),
            _ => Err(StoreError::FileHeader("bad marker type")),
        }
    }
}

/// Shape of the theta dimension: full male x female grid, or the diagonal
/// where both sexes share one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThetaMatrix {
    Grid,
    Diagonal,
}

impl ThetaMatrix {
    pub(crate) fn as_char(self) -> u8 {
        match self {
            ThetaMatrix::Grid     => b'G',
            ThetaMatrix::Diagonal => b'D',
        }
    }

    pub(crate) fn from_char(c: u8) -> Result<ThetaMatrix, StoreError> {
        match c {
            b'G' | b'g' => Ok(ThetaMatrix::Grid),
            b'D' | b'd' => Ok(ThetaMatrix::Diagonal),
            _ => Err(StoreError::FileHeader("bad theta matrix type")),
        }
    }
}

/// Axis nesting order of the data region. Each letter names one of six
/// fixed permutations of the seven model axes (see `seek`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Ordering {
    pub(crate) fn as_char(self) -> u8 {
        match self {
            Ordering::A => b'A',
            Ordering::B => b'B',
            Ordering::C => b'C',
            Ordering::D => b'D',
            Ordering::E => b'E',
            Ordering::F => b'F',
        }
    }

    pub(crate) fn from_char(c: u8) -> Result<Ordering, StoreError> {
        match c {
            b'A' => Ok(Ordering::A),
            b'B' => Ok(Ordering::B),
            b'C' => Ok(Ordering::C),
            b'D' => Ok(Ordering::D),
            b'E' => Ok(Ordering::E),
            b'F' => Ok(Ordering::F),
            _ => Err(StoreError::FileHeader("bad ordering")),
        }
    }
}

/// One penetrance vector (typically DD / Dd / dd).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Penetrance(pub [f32; 3]);

/// One quantitative model: per-genotype means and variances.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QuantModel {
    pub means: [f32; 3],
    pub variances: [f32; 3],
}

/// In-memory description of a store: model characters, the index lists for
/// each enabled axis, label tables and the derived sharding geometry.
#[derive(Debug, Clone)]
pub struct Header {
    pub(crate) version: i32,
    pub(crate) subversion: i32,
    pub(crate) element_type: ElementType,
    pub(crate) model: ModelKind,
    pub(crate) marker_mode: MarkerMode,
    pub(crate) use_diseq: bool,
    pub(crate) ordering: Ordering,
    pub(crate) theta_matrix: ThetaMatrix,

    pub(crate) markers: Vec<f32>,
    pub(crate) pedigrees: Vec<i32>,
    pub(crate) thetas: Vec<f32>,
    pub(crate) lc_count: usize,
    pub(crate) penetrances: Vec<Vec<Penetrance>>,
    pub(crate) qmodels: Vec<QuantModel>,
    pub(crate) diseqs: Vec<f32>,
    pub(crate) gene_freqs: Vec<f32>,

    pub(crate) marker_labels: LabelTable,
    pub(crate) pedigree_labels: LabelTable,

    pub(crate) description: String,
    pub(crate) date_string: String,

    // derived when the store is created or opened
    pub(crate) start_of_data: u64,
    pub(crate) chunks_per_file: u64,
    pub(crate) number_of_files: usize,
    pub(crate) max_file_bytes: u64,
}

impl Default for Header {
    fn default() -> Header {
        Header::new()
    }
}

impl Header {
    pub fn new() -> Header {
        Header {
            version: VERSION,
            subversion: 0,
            element_type: ElementType::Float,
            model: ModelKind::Dichotomous,
            marker_mode: MarkerMode::TwoPoint,
            use_diseq: false,
            ordering: Ordering::A,
            theta_matrix: ThetaMatrix::Diagonal,
            markers: Vec::new(),
            pedigrees: Vec::new(),
            thetas: Vec::new(),
            lc_count: 1,
            penetrances: Vec::new(),
            qmodels: Vec::new(),
            diseqs: Vec::new(),
            gene_freqs: Vec::new(),
            marker_labels: LabelTable::empty(),
            pedigree_labels: LabelTable::empty(),
            description: String::new(),
            date_string: String::new(),
            start_of_data: 0,
            chunks_per_file: 0,
            number_of_files: 0,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }

    // ---- Setup (pre-creation) -------------------------------------------

    pub fn set_type(&mut self, marker_mode: MarkerMode, model: ModelKind, use_diseq: bool) {
        self.marker_mode = marker_mode;
        self.model = model;
        self.use_diseq = use_diseq;
    }

    pub fn set_element_type(&mut self, element_type: ElementType) {
        self.element_type = element_type;
    }

    pub fn set_ordering(&mut self, ordering: Ordering) {
        self.ordering = ordering;
    }

    /// Cap on the byte size of a single file. Exceeding it spreads the data
    /// region over `_NN` sibling shards. Mostly useful to exercise sharding
    /// without multi-gigabyte fixtures; defaults to the 32-bit maximum.
    pub fn set_max_file_bytes(&mut self, max: u64) {
        self.max_file_bytes = max.max(1);
    }

    pub fn set_markers(&mut self, list: &[f32]) -> Result<(), StoreError> {
        if list.is_empty() || list.len() > MAX_MARKERS {
            return Err(StoreError::BadParam("marker count out of range"));
        }
        self.markers = list.to_vec();
        Ok(())
    }

    /// No positions known: index markers 0..count.
    pub fn set_sequential_markers(&mut self, count: usize) -> Result<(), StoreError> {
        if count == 0 || count > MAX_MARKERS {
            return Err(StoreError::BadParam("marker count out of range"));
        }
        self.markers = (0..count).map(|i| i as f32).collect();
        Ok(())
    }

    pub fn set_pedigrees(&mut self, list: &[i32]) -> Result<(), StoreError> {
        if list.is_empty() || list.len() >= MAX_PEDIGREES {
            return Err(StoreError::BadParam("pedigree count out of range"));
        }
        self.pedigrees = list.to_vec();
        Ok(())
    }

    pub fn set_sequential_pedigrees(&mut self, count: usize) -> Result<(), StoreError> {
        if count == 0 || count >= MAX_PEDIGREES {
            return Err(StoreError::BadParam("pedigree count out of range"));
        }
        self.pedigrees = (0..count as i32).collect();
        Ok(())
    }

    pub fn set_thetas(&mut self, list: &[f64], matrix: ThetaMatrix) -> Result<(), StoreError> {
        if list.is_empty() || list.len() >= MAX_THETAS {
            return Err(StoreError::BadParam("theta count out of range"));
        }
        self.theta_matrix = matrix;
        self.thetas = list.iter().map(|&t| t as f32).collect();
        Ok(())
    }

    pub fn set_liability_classes(&mut self, count: usize) -> Result<(), StoreError> {
        if self.model != ModelKind::Dichotomous {
            return Err(StoreError::WrongModel);
        }
        if count == 0 || count >= MAX_LIABILITY_CLASSES {
            return Err(StoreError::BadParam("liability class count out of range"));
        }
        self.lc_count = count;
        self.penetrances.resize(count, Vec::new());
        Ok(())
    }

    /// Install the penetrance table for one liability class. The three input
    /// slices hold the per-genotype values; they are interleaved per entry.
    pub fn set_penetrances(
        &mut self,
        lc_index: usize,
        pen1: &[f32],
        pen2: &[f32],
        pen3: &[f32],
    ) -> Result<(), StoreError> {
        if self.model != ModelKind::Dichotomous {
            return Err(StoreError::WrongModel);
        }
        let count = pen1.len();
        if count == 0 || count >= MAX_PENETRANCES {
            return Err(StoreError::BadParam("penetrance count out of range"));
        }
        if pen2.len() != count || pen3.len() != count {
            return Err(StoreError::BadParam("penetrance slices differ in length"));
        }
        if lc_index >= self.lc_count {
            return Err(StoreError::BadParam("liability class index out of range"));
        }
        if self.penetrances.len() < self.lc_count {
            self.penetrances.resize(self.lc_count, Vec::new());
        }
        self.penetrances[lc_index] = (0..count)
            .map(|i| Penetrance([pen1[i], pen2[i], pen3[i]]))
            .collect();
        Ok(())
    }

    pub fn set_gene_freqs(&mut self, list: &[f64]) -> Result<(), StoreError> {
        if list.is_empty() || list.len() >= MAX_GENE_FREQS {
            return Err(StoreError::BadParam("gene frequency count out of range"));
        }
        self.gene_freqs = list.iter().map(|&f| f as f32).collect();
        Ok(())
    }

    pub fn set_qmodels(&mut self, list: &[QuantModel]) -> Result<(), StoreError> {
        if self.model != ModelKind::Quantitative {
            return Err(StoreError::WrongModel);
        }
        if list.is_empty() || list.len() >= MAX_QMODELS {
            return Err(StoreError::BadParam("qmodel count out of range"));
        }
        self.qmodels = list.to_vec();
        Ok(())
    }

    pub fn set_diseqs(&mut self, list: &[f32]) -> Result<(), StoreError> {
        if !self.use_diseq {
            return Err(StoreError::WrongModel);
        }
        if list.is_empty() || list.len() >= MAX_DISEQ_PARAMS {
            return Err(StoreError::BadParam("disequilibrium count out of range"));
        }
        self.diseqs = list.to_vec();
        Ok(())
    }

    /// Record a free-form description and stamp the creation date.
    pub fn set_description(&mut self, comment: &str) {
        self.description = comment.chars().take(64).collect();
        self.date_string = chrono::Local::now().format("%m/%d/%y %H:%M:%S").to_string();
    }

    pub fn setup_marker_labels(&mut self, width: usize) -> Result<(), StoreError> {
        if width > MAX_MARKER_LABEL_LEN {
            return Err(StoreError::BadParam("marker label width out of range"));
        }
        self.marker_labels = LabelTable::with_defaults(width, self.markers.len(), LabelKind::Marker);
        Ok(())
    }

    pub fn setup_pedigree_labels(&mut self, width: usize) -> Result<(), StoreError> {
        if width > MAX_PEDIGREE_LABEL_LEN {
            return Err(StoreError::BadParam("pedigree label width out of range"));
        }
        self.pedigree_labels =
            LabelTable::with_defaults(width, self.pedigrees.len(), LabelKind::Pedigree);
        Ok(())
    }

    pub fn set_marker_label(&mut self, index: usize, label: &str) -> Result<(), StoreError> {
        self.marker_labels.set(index, label)
    }

    pub fn set_pedigree_label(&mut self, index: usize, label: &str) -> Result<(), StoreError> {
        self.pedigree_labels.set(index, label)
    }

    pub fn marker_label(&self, index: usize) -> Option<String> {
        self.marker_labels.get(index)
    }

    pub fn pedigree_label(&self, index: usize) -> Option<String> {
        self.pedigree_labels.get(index)
    }

    pub fn marker_label_index(&self, label: &str) -> Option<usize> {
        self.marker_labels.index_of(label)
    }

    pub fn pedigree_label_index(&self, label: &str) -> Option<usize> {
        self.pedigree_labels.index_of(label)
    }

    // ---- Accessors ------------------------------------------------------

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn model(&self) -> ModelKind {
        self.model
    }

    pub fn marker_mode(&self) -> MarkerMode {
        self.marker_mode
    }

    pub fn uses_diseq(&self) -> bool {
        self.use_diseq
    }

    pub fn ordering(&self) -> Ordering {
        self.ordering
    }

    pub fn theta_matrix(&self) -> ThetaMatrix {
        self.theta_matrix
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn date_string(&self) -> &str {
        &self.date_string
    }

    pub fn number_of_files(&self) -> usize {
        self.number_of_files
    }

    pub fn chunks_per_file(&self) -> u64 {
        self.chunks_per_file
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn pedigree_count(&self) -> usize {
        self.pedigrees.len()
    }

    pub fn theta_count(&self) -> usize {
        self.thetas.len()
    }

    pub fn chunk_size(&self) -> u64 {
        self.element_type.size()
    }

    // ---- Dimension extents as used by seek ------------------------------
    // A disabled axis contributes a single cell.

    pub(crate) fn theta_dim(&self) -> u64 {
        match self.marker_mode {
            MarkerMode::Multipoint => 1,
            MarkerMode::TwoPoint => {
                let n = self.thetas.len().max(1) as u64;
                match self.theta_matrix {
                    ThetaMatrix::Diagonal => n,
                    ThetaMatrix::Grid     => n * n,
                }
            }
        }
    }

    pub(crate) fn penetrance_dim(&self) -> u64 {
        match self.model {
            ModelKind::Dichotomous  => self.penetrance_count() as u64,
            ModelKind::Quantitative => 1,
        }
    }

    pub(crate) fn gene_freq_dim(&self) -> u64 {
        match self.model {
            ModelKind::Dichotomous  => self.gene_freqs.len().max(1) as u64,
            ModelKind::Quantitative => 1,
        }
    }

    pub(crate) fn qmodel_dim(&self) -> u64 {
        match self.model {
            ModelKind::Dichotomous  => 1,
            ModelKind::Quantitative => self.qmodels.len().max(1) as u64,
        }
    }

    pub(crate) fn diseq_dim(&self) -> u64 {
        if self.use_diseq { self.diseqs.len().max(1) as u64 } else { 1 }
    }

    pub fn penetrance_count(&self) -> usize {
        self.penetrances.first().map_or(1, |t| t.len().max(1))
    }

    /// Total number of data cells across all shards.
    pub fn logical_cells(&self) -> u64 {
        self.pedigrees.len().max(1) as u64
            * self.markers.len().max(1) as u64
            * self.theta_dim()
            * self.gene_freq_dim()
            * self.penetrance_dim()
            * self.qmodel_dim()
            * self.diseq_dim()
    }

    // ---- On-disk geometry ------------------------------------------------

    pub(crate) fn table_offsets(&self) -> TableOffsets {
        let mut cursor = HEADER_LEN;
        let marker = cursor;
        cursor += self.markers.len() as u64 * 4;
        let pedigree = cursor;
        cursor += self.pedigrees.len() as u64 * 4;
        let theta = if self.marker_mode == MarkerMode::TwoPoint {
            let at = cursor;
            cursor += self.thetas.len() as u64 * 4;
            at
        } else {
            0
        };
        let penetrance = if self.model == ModelKind::Dichotomous {
            let at = cursor;
            cursor += self.penetrance_count() as u64 * 12 * self.lc_count as u64;
            at
        } else {
            0
        };
        let qmodel = if self.model == ModelKind::Quantitative {
            let at = cursor;
            cursor += self.qmodels.len() as u64 * 24;
            at
        } else {
            0
        };
        let diseq = if self.use_diseq {
            let at = cursor;
            cursor += self.diseqs.len() as u64 * 4;
            at
        } else {
            0
        };
        let gene_freq = if self.model == ModelKind::Dichotomous {
            let at = cursor;
            cursor += self.gene_freqs.len() as u64 * 4;
            at
        } else {
            0
        };
        let marker_label = cursor;
        cursor += self.marker_labels.byte_len() as u64;
        let pedigree_label = cursor;
        cursor += self.pedigree_labels.byte_len() as u64;

        TableOffsets {
            marker,
            pedigree,
            theta,
            penetrance,
            qmodel,
            diseq,
            gene_freq,
            marker_label,
            pedigree_label,
            start_of_data: cursor,
        }
    }

    /// Validate the model and compute the store geometry: total byte size,
    /// and how many sibling shards (if any) the data region needs.
    /// Returns `(total_bytes, total_file_count)`.
    pub fn file_size(&mut self) -> Result<(u64, usize), StoreError> {
        if self.markers.is_empty() {
            return Err(StoreError::BadParam("no markers configured"));
        }
        if self.pedigrees.is_empty() {
            return Err(StoreError::BadParam("no pedigrees configured"));
        }
        match self.model {
            ModelKind::Dichotomous => {
                if self.penetrances.iter().all(Vec::is_empty) {
                    return Err(StoreError::BadParam("no penetrances configured"));
                }
                if self.gene_freqs.is_empty() {
                    return Err(StoreError::BadParam("no gene frequencies configured"));
                }
            }
            ModelKind::Quantitative => {
                if self.qmodels.is_empty() {
                    return Err(StoreError::BadParam("no quantitative models configured"));
                }
            }
        }
        if self.marker_mode == MarkerMode::TwoPoint && self.thetas.is_empty() {
            return Err(StoreError::BadParam("no thetas configured"));
        }
        if self.use_diseq && self.diseqs.is_empty() {
            return Err(StoreError::BadParam("no disequilibrium values configured"));
        }

        let cells = self.logical_cells();
        let data_bytes = cells
            .checked_mul(self.chunk_size())
            .ok_or(StoreError::BadParam("model grid too large"))?;
        let total = data_bytes + self.table_offsets().start_of_data;

        if total > self.max_file_bytes {
            let shards = 1 + data_bytes / self.max_file_bytes;
            self.number_of_files = shards as usize;
            self.chunks_per_file = (cells + shards - 1) / shards;
            debug!(
                "store spans {} extra shard(s) of {} cells each",
                self.number_of_files, self.chunks_per_file
            );
            Ok((total, self.number_of_files + 1))
        } else {
            self.number_of_files = 0;
            self.chunks_per_file = cells;
            Ok((total, 1))
        }
    }

    // ---- Serialisation ---------------------------------------------------

    pub(crate) fn encode(&self) -> Vec<u8> {
        let offsets = self.table_offsets();
        let mut buf = Vec::with_capacity(HEADER_LEN as usize);
        buf.extend_from_slice(COOKIE);
        buf.write_i32::<NativeEndian>(self.version).unwrap();
        buf.write_i32::<NativeEndian>(self.subversion).unwrap();
        buf.write_i64::<NativeEndian>(offsets.start_of_data as i64).unwrap();

        buf.write_i64::<NativeEndian>(self.markers.len() as i64).unwrap();
        buf.write_i64::<NativeEndian>(offsets.marker as i64).unwrap();

        buf.write_i64::<NativeEndian>(self.pedigrees.len() as i64).unwrap();
        buf.write_i64::<NativeEndian>(offsets.pedigree as i64).unwrap();

        if self.marker_mode == MarkerMode::TwoPoint {
            buf.write_i64::<NativeEndian>(self.thetas.len() as i64).unwrap();
            buf.write_i64::<NativeEndian>(offsets.theta as i64).unwrap();
            buf.push(self.theta_matrix.as_char());
        } else {
            buf.write_i64::<NativeEndian>(0).unwrap();
            buf.write_i64::<NativeEndian>(0).unwrap();
            buf.push(ThetaMatrix::Diagonal.as_char());
        }
        buf.extend_from_slice(&[0u8; 3]);

        if self.model == ModelKind::Dichotomous {
            buf.write_i64::<NativeEndian>(self.penetrance_count() as i64).unwrap();
            buf.write_i64::<NativeEndian>(self.lc_count as i64).unwrap();
            buf.write_i64::<NativeEndian>(offsets.penetrance as i64).unwrap();
        } else {
            buf.write_i64::<NativeEndian>(0).unwrap();
            buf.write_i64::<NativeEndian>(self.lc_count as i64).unwrap();
            buf.write_i64::<NativeEndian>(0).unwrap();
        }

        if self.model == ModelKind::Quantitative {
            buf.write_i64::<NativeEndian>(self.qmodels.len() as i64).unwrap();
            buf.write_i64::<NativeEndian>(offsets.qmodel as i64).unwrap();
        } else {
            buf.write_i64::<NativeEndian>(0).unwrap();
            buf.write_i64::<NativeEndian>(0).unwrap();
        }

        if self.use_diseq {
            buf.write_i64::<NativeEndian>(self.diseqs.len() as i64).unwrap();
            buf.write_i64::<NativeEndian>(offsets.diseq as i64).unwrap();
        } else {
            buf.write_i64::<NativeEndian>(0).unwrap();
            buf.write_i64::<NativeEndian>(0).unwrap();
        }

        if self.model == ModelKind::Dichotomous {
            buf.write_i64::<NativeEndian>(self.gene_freqs.len() as i64).unwrap();
            buf.write_i64::<NativeEndian>(offsets.gene_freq as i64).unwrap();
        } else {
            buf.write_i64::<NativeEndian>(0).unwrap();
            buf.write_i64::<NativeEndian>(0).unwrap();
        }

        buf.write_i64::<NativeEndian>(self.marker_labels.width() as i64).unwrap();
        buf.write_i64::<NativeEndian>(offsets.marker_label as i64).unwrap();

        buf.write_i64::<NativeEndian>(self.pedigree_labels.width() as i64).unwrap();
        buf.write_i64::<NativeEndian>(offsets.pedigree_label as i64).unwrap();

        buf.push(self.element_type.as_char());
        buf.push(self.model.as_char());
        buf.push(self.marker_mode.as_char());
        buf.push(if self.use_diseq { b'Y' } else { b'N' });

        buf.write_i64::<NativeEndian>(self.chunks_per_file as i64).unwrap();
        buf.write_i32::<NativeEndian>(self.number_of_files as i32).unwrap();
        buf.push(self.ordering.as_char());
        buf.extend_from_slice(&[0u8; 32]);

        let mut date = [0u8; 17];
        let date_bytes = self.date_string.as_bytes();
        let n = date_bytes.len().min(17);
        date[..n].copy_from_slice(&date_bytes[..n]);
        buf.extend_from_slice(&date);

        let mut descr = [0u8; 64];
        let descr_bytes = self.description.as_bytes();
        let n = descr_bytes.len().min(64);
        descr[..n].copy_from_slice(&descr_bytes[..n]);
        buf.extend_from_slice(&descr);

        debug_assert_eq!(buf.len() as u64, HEADER_LEN);
        buf
    }

    pub(crate) fn decode(buf: &[u8]) -> Result<RawHeader, StoreError> {
        if buf.len() < HEADER_LEN as usize {
            return Err(StoreError::FileHeader("truncated header"));
        }
        if &buf[0..4] != COOKIE {
            return Err(StoreError::FileHeader("bad magic cookie"));
        }
        let mut rdr = Cursor::new(&buf[4..]);
        let io = |_: std::io::Error| StoreError::FileHeader("truncated header");

        let version = rdr.read_i32::<NativeEndian>().map_err(io)?;
        let subversion = rdr.read_i32::<NativeEndian>().map_err(io)?;
        let start_of_data = rdr.read_i64::<NativeEndian>().map_err(io)?;

        let marker_count = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let marker_offset = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let pedigree_count = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let pedigree_offset = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let theta_count = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let theta_offset = rdr.read_i64::<NativeEndian>().map_err(io)?;

        let mut small = [0u8; 4];
        std::io::Read::read_exact(&mut rdr, &mut small).map_err(io)?;
        let theta_matrix_char = small[0];

        let penetrance_count = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let lc_count = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let penetrance_offset = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let qmodel_count = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let qmodel_offset = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let diseq_count = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let diseq_offset = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let gene_freq_count = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let gene_freq_offset = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let marker_label_size = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let marker_label_offset = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let pedigree_label_size = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let pedigree_label_offset = rdr.read_i64::<NativeEndian>().map_err(io)?;

        let mut chars = [0u8; 4];
        std::io::Read::read_exact(&mut rdr, &mut chars).map_err(io)?;

        let chunks_per_file = rdr.read_i64::<NativeEndian>().map_err(io)?;
        let number_of_files = rdr.read_i32::<NativeEndian>().map_err(io)?;

        let mut tail = [0u8; 1 + 32 + 17 + 64];
        std::io::Read::read_exact(&mut rdr, &mut tail).map_err(io)?;
        let ordering_char = tail[0];
        let date_raw = &tail[33..50];
        let descr_raw = &tail[50..114];

        Ok(RawHeader {
            version,
            subversion,
            start_of_data,
            marker_count,
            marker_offset,
            pedigree_count,
            pedigree_offset,
            theta_count,
            theta_offset,
            theta_matrix_char,
            penetrance_count,
            lc_count,
            penetrance_offset,
            qmodel_count,
            qmodel_offset,
            diseq_count,
            diseq_offset,
            gene_freq_count,
            gene_freq_offset,
            marker_label_size,
            marker_label_offset,
            pedigree_label_size,
            pedigree_label_offset,
            element_type_char: chars[0],
            model_char: chars[1],
            marker_mode_char: chars[2],
            use_diseq_char: chars[3],
            chunks_per_file,
            number_of_files,
            ordering_char,
            date_string: trimmed_string(date_raw),
            description: trimmed_string(descr_raw),
        })
    }
}

fn trimmed_string(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Field-for-field image of the on-disk header, before validation.
#[derive(Debug)]
pub(crate) struct RawHeader {
    pub version: i32,
    pub subversion: i32,
    pub start_of_data: i64,
    pub marker_count: i64,
    pub marker_offset: i64,
    pub pedigree_count: i64,
    pub pedigree_offset: i64,
    pub theta_count: i64,
    pub theta_offset: i64,
    pub theta_matrix_char: u8,
    pub penetrance_count: i64,
    pub lc_count: i64,
    pub penetrance_offset: i64,
    pub qmodel_count: i64,
    pub qmodel_offset: i64,
    pub diseq_count: i64,
    pub diseq_offset: i64,
    pub gene_freq_count: i64,
    pub gene_freq_offset: i64,
    pub marker_label_size: i64,
    pub marker_label_offset: i64,
    pub pedigree_label_size: i64,
    pub pedigree_label_offset: i64,
    pub element_type_char: u8,
    pub model_char: u8,
    pub marker_mode_char: u8,
    pub use_diseq_char: u8,
    pub chunks_per_file: i64,
    pub number_of_files: i32,
    pub ordering_char: u8,
    pub date_string: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TableOffsets {
    pub marker: u64,
    pub pedigree: u64,
    pub theta: u64,
    pub penetrance: u64,
    pub qmodel: u64,
    pub diseq: u64,
    pub gene_freq: u64,
    pub marker_label: u64,
    pub pedigree_label: u64,
    pub start_of_data: u64,
}
