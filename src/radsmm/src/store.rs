use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info, warn};
use nix::fcntl::{flock, FlockArg};

use crate::error::StoreError;
use crate::header::{
    ElementType, Header, MarkerMode, ModelKind, Ordering, Penetrance, QuantModel, RawHeader,
    ThetaMatrix, HEADER_LEN, MAX_DISEQ_PARAMS, MAX_GENE_FREQS, MAX_LIABILITY_CLASSES,
    MAX_MARKERS, MAX_MARKER_LABEL_LEN, MAX_PEDIGREES, MAX_PEDIGREE_LABEL_LEN, MAX_PENETRANCES,
    MAX_QMODELS, MAX_THETAS, VERSION,
};
use crate::label::LabelTable;
use crate::seek::CellIndex;
use crate::sentinel;

/// Upper bound on shard fan-out, primary included.
pub const MAX_DATA_FILES: usize = 20;

/// How the store is opened: read-only shares the file, read-write takes the
/// exclusive advisory lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    ReadWrite,
}

/// An open RADSMM store: the parsed header plus one handle per shard.
/// Shard 0 is the primary file; the lock is released on close or drop.
#[derive(Debug)]
pub struct Store {
    header: Header,
    files: Vec<File>,
    path: PathBuf,
    writable: bool,
    write_check: bool,
}

fn shard_path(base: &Path, number: usize) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!("_{number:02}"));
    PathBuf::from(name)
}

fn lock_exclusive(file: &File) -> Result<(), StoreError> {
    flock(file.as_raw_fd(), FlockArg::LockExclusive).map_err(StoreError::Locking)
}

fn unlock(file: &File) {
    // unlock errors are deliberately ignored, as on close in general
    let _ = flock(file.as_raw_fd(), FlockArg::Unlock);
}

fn check_position(file: &mut File, expected: u64, what: &'static str) -> Result<(), StoreError> {
    let at = file.stream_position().map_err(|_| StoreError::Lseek)?;
    if at != expected {
        warn!("{what} table lands at byte {at}, header says {expected}");
        return Err(StoreError::Lseek);
    }
    Ok(())
}

fn write_f32_table(file: &mut File, values: &[f32]) -> Result<(), StoreError> {
    let mut buf = Vec::with_capacity(values.len() * 4);
    for &v in values {
        buf.write_f32::<NativeEndian>(v).map_err(StoreError::Writing)?;
    }
    file.write_all(&buf).map_err(StoreError::Writing)
}

fn read_f32_table(file: &mut File, count: usize) -> Result<Vec<f32>, StoreError> {
    let mut buf = vec![0u8; count * 4];
    file.read_exact(&mut buf).map_err(StoreError::Reading)?;
    let mut rdr = std::io::Cursor::new(buf);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(rdr.read_f32::<NativeEndian>().map_err(StoreError::Reading)?);
    }
    Ok(out)
}

impl Store {
    // ---- Creation --------------------------------------------------------

    /// Create a new store at `path`, refusing to clobber an existing file.
    /// Writes the header and every enabled index table, creates the extra
    /// shards when the model grid exceeds the per-file maximum, and fills
    /// every data cell with the EMPTY sentinel.
    pub fn create(mut header: Header, path: &Path) -> Result<Store, StoreError> {
        let (total_bytes, total_files) = header.file_size()?;
        info!(
            "creating result store '{}': {} cells, {} byte(s), {} file(s)",
            path.display(),
            header.logical_cells(),
            total_bytes,
            total_files,
        );

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(StoreError::FileOpen)?;
        lock_exclusive(&file)?;

        let offsets = header.table_offsets();
        header.start_of_data = offsets.start_of_data;

        file.write_all(&header.encode()).map_err(StoreError::Writing)?;

        check_position(&mut file, offsets.marker, "marker")?;
        write_f32_table(&mut file, &header.markers)?;

        check_position(&mut file, offsets.pedigree, "pedigree")?;
        let mut buf = Vec::with_capacity(header.pedigrees.len() * 4);
        for &id in &header.pedigrees {
            buf.write_i32::<NativeEndian>(id).map_err(StoreError::Writing)?;
        }
        file.write_all(&buf).map_err(StoreError::Writing)?;

        if header.marker_mode == MarkerMode::TwoPoint {
            check_position(&mut file, offsets.theta, "theta")?;
            write_f32_table(&mut file, &header.thetas)?;
        }

        if header.model == ModelKind::Dichotomous {
            check_position(&mut file, offsets.penetrance, "penetrance")?;
            for table in &header.penetrances {
                let mut buf = Vec::with_capacity(table.len() * 12);
                for pen in table {
                    for &v in &pen.0 {
                        buf.write_f32::<NativeEndian>(v).map_err(StoreError::Writing)?;
                    }
                }
                file.write_all(&buf).map_err(StoreError::Writing)?;
            }
        }

        if header.model == ModelKind::Quantitative {
            check_position(&mut file, offsets.qmodel, "qmodel")?;
            let mut buf = Vec::with_capacity(header.qmodels.len() * 24);
            for qm in &header.qmodels {
                for &v in qm.means.iter().chain(qm.variances.iter()) {
                    buf.write_f32::<NativeEndian>(v).map_err(StoreError::Writing)?;
                }
            }
            file.write_all(&buf).map_err(StoreError::Writing)?;
        }

        if header.use_diseq {
            check_position(&mut file, offsets.diseq, "diseq")?;
            write_f32_table(&mut file, &header.diseqs)?;
        }

        if header.model == ModelKind::Dichotomous {
            check_position(&mut file, offsets.gene_freq, "gene frequency")?;
            write_f32_table(&mut file, &header.gene_freqs)?;
        }

        if !header.marker_labels.is_empty() {
            check_position(&mut file, offsets.marker_label, "marker label")?;
            file.write_all(header.marker_labels.raw()).map_err(StoreError::Writing)?;
        }
        if !header.pedigree_labels.is_empty() {
            check_position(&mut file, offsets.pedigree_label, "pedigree label")?;
            file.write_all(header.pedigree_labels.raw()).map_err(StoreError::Writing)?;
        }

        check_position(&mut file, offsets.start_of_data, "data region")?;

        let mut files = vec![file];
        for number in 1..=header.number_of_files {
            let extra = OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(shard_path(path, number))
                .map_err(StoreError::FileOpen)?;
            lock_exclusive(&extra)?;
            files.push(extra);
        }

        let mut store = Store {
            header,
            files,
            path: path.to_path_buf(),
            writable: true,
            write_check: false,
        };
        store.fill_empty()?;
        debug!("store '{}' created and blank-filled", store.path.display());
        Ok(store)
    }

    /// Blank the whole data region with the EMPTY sentinel, 1000 cells at a
    /// time.
    fn fill_empty(&mut self) -> Result<(), StoreError> {
        let element = self.header.element_type;
        let block: Vec<u8> = match element {
            ElementType::Double => {
                let mut buf = Vec::with_capacity(1000 * 8);
                for _ in 0..1000 {
                    buf.write_f64::<NativeEndian>(sentinel::EMPTY).map_err(StoreError::Writing)?;
                }
                buf
            }
            ElementType::Float => {
                let mut buf = Vec::with_capacity(1000 * 4);
                for _ in 0..1000 {
                    buf.write_f32::<NativeEndian>(sentinel::EMPTY as f32)
                        .map_err(StoreError::Writing)?;
                }
                buf
            }
        };
        let chunk_size = element.size() as usize;

        if self.header.number_of_files == 0 {
            let cells = self.header.logical_cells();
            let file = &mut self.files[0];
            file.seek(SeekFrom::Start(self.header.start_of_data)).map_err(|_| StoreError::Lseek)?;
            let mut remaining = cells;
            while remaining > 0 {
                let n = remaining.min(1000) as usize;
                file.write_all(&block[..n * chunk_size]).map_err(StoreError::Writing)?;
                remaining -= n as u64;
            }
        } else {
            for file in self.files.iter_mut().skip(1) {
                file.seek(SeekFrom::Start(0)).map_err(|_| StoreError::Lseek)?;
                let mut remaining = self.header.chunks_per_file;
                while remaining > 0 {
                    let n = remaining.min(1000) as usize;
                    file.write_all(&block[..n * chunk_size]).map_err(StoreError::Writing)?;
                    remaining -= n as u64;
                }
            }
        }
        Ok(())
    }

    // ---- Opening ---------------------------------------------------------

    /// Open an existing store, reading and validating the header and every
    /// index table, and opening every sibling shard.
    pub fn open(path: &Path, mode: OpenMode) -> Result<Store, StoreError> {
        let writable = mode == OpenMode::ReadWrite;
        let mut file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)
            .map_err(StoreError::FileOpen)?;
        if writable {
            lock_exclusive(&file)?;
        }

        let mut buf = vec![0u8; HEADER_LEN as usize];
        file.read_exact(&mut buf).map_err(StoreError::Reading)?;
        let raw = Header::decode(&buf)?;

        if raw.version != VERSION {
            return Err(StoreError::FileHeader("unsupported version"));
        }
        if raw.number_of_files < 0 || raw.number_of_files as usize >= MAX_DATA_FILES {
            return Err(StoreError::FileHeader("implausible shard count"));
        }
        if raw.chunks_per_file <= 0 {
            return Err(StoreError::FileHeader("bad chunks per file"));
        }

        let header = Self::read_tables(&mut file, &raw)?;

        let mut files = vec![file];
        for number in 1..=header.number_of_files {
            let extra = OpenOptions::new()
                .read(true)
                .write(writable)
                .open(shard_path(path, number))
                .map_err(StoreError::FileOpen)?;
            if writable {
                lock_exclusive(&extra)?;
            }
            files.push(extra);
        }

        debug!(
            "opened store '{}' ({} cells across {} file(s))",
            path.display(),
            header.logical_cells(),
            files.len()
        );
        Ok(Store { header, files, path: path.to_path_buf(), writable, write_check: false })
    }

    fn read_tables(file: &mut File, raw: &RawHeader) -> Result<Header, StoreError> {
        let element_type = ElementType::from_char(raw.element_type_char)?;
        let model = ModelKind::from_char(raw.model_char)?;
        let marker_mode = MarkerMode::from_char(raw.marker_mode_char)?;
        let use_diseq = raw.use_diseq_char != b'N';
        let ordering = Ordering::from_char(raw.ordering_char)?;

        let mut header = Header::new();
        header.version = raw.version;
        header.subversion = raw.subversion;
        header.element_type = element_type;
        header.model = model;
        header.marker_mode = marker_mode;
        header.use_diseq = use_diseq;
        header.ordering = ordering;
        header.date_string = raw.date_string.clone();
        header.description = raw.description.clone();

        if raw.marker_count <= 0 || raw.marker_count as usize > MAX_MARKERS {
            return Err(StoreError::FileHeader("bad marker count"));
        }
        let marker_count = raw.marker_count as usize;
        file.seek(SeekFrom::Start(raw.marker_offset as u64)).map_err(|_| StoreError::Lseek)?;
        header.markers = read_f32_table(file, marker_count)?;

        if raw.pedigree_count <= 0 || raw.pedigree_count as usize >= MAX_PEDIGREES {
            return Err(StoreError::FileHeader("bad pedigree count"));
        }
        let pedigree_count = raw.pedigree_count as usize;
        file.seek(SeekFrom::Start(raw.pedigree_offset as u64)).map_err(|_| StoreError::Lseek)?;
        let mut buf = vec![0u8; pedigree_count * 4];
        file.read_exact(&mut buf).map_err(StoreError::Reading)?;
        let mut rdr = std::io::Cursor::new(buf);
        header.pedigrees = (0..pedigree_count)
            .map(|_| rdr.read_i32::<NativeEndian>().map_err(StoreError::Reading))
            .collect::<Result<_, _>>()?;

        if marker_mode == MarkerMode::TwoPoint {
            if raw.theta_count <= 0 || raw.theta_count as usize >= MAX_THETAS {
                return Err(StoreError::FileHeader("bad theta count"));
            }
            header.theta_matrix = ThetaMatrix::from_char(raw.theta_matrix_char)?;
            file.seek(SeekFrom::Start(raw.theta_offset as u64)).map_err(|_| StoreError::Lseek)?;
            header.thetas = read_f32_table(file, raw.theta_count as usize)?;
        }

        if model == ModelKind::Dichotomous {
            if raw.penetrance_count <= 0 || raw.penetrance_count as usize >= MAX_PENETRANCES {
                return Err(StoreError::FileHeader("bad penetrance count"));
            }
            if raw.lc_count <= 0 || raw.lc_count as usize >= MAX_LIABILITY_CLASSES {
                return Err(StoreError::FileHeader("bad liability class count"));
            }
            header.lc_count = raw.lc_count as usize;
            let per_class = raw.penetrance_count as usize;
            file.seek(SeekFrom::Start(raw.penetrance_offset as u64)).map_err(|_| StoreError::Lseek)?;
            header.penetrances = (0..header.lc_count)
                .map(|_| -> Result<Vec<Penetrance>, StoreError> {
                    let flat = read_f32_table(file, per_class * 3)?;
                    Ok(flat.chunks_exact(3).map(|c| Penetrance([c[0], c[1], c[2]])).collect())
                })
                .collect::<Result<_, _>>()?;

            if raw.gene_freq_count <= 0 || raw.gene_freq_count as usize >= MAX_GENE_FREQS {
                return Err(StoreError::FileHeader("bad gene frequency count"));
            }
            file.seek(SeekFrom::Start(raw.gene_freq_offset as u64)).map_err(|_| StoreError::Lseek)?;
            header.gene_freqs = read_f32_table(file, raw.gene_freq_count as usize)?;
        }

        if model == ModelKind::Quantitative {
            if raw.qmodel_count <= 0 || raw.qmodel_count as usize >= MAX_QMODELS {
                return Err(StoreError::FileHeader("bad qmodel count"));
            }
            file.seek(SeekFrom::Start(raw.qmodel_offset as u64)).map_err(|_| StoreError::Lseek)?;
            let flat = read_f32_table(file, raw.qmodel_count as usize * 6)?;
            header.qmodels = flat
                .chunks_exact(6)
                .map(|c| QuantModel { means: [c[0], c[1], c[2]], variances: [c[3], c[4], c[5]] })
                .collect();
        }

        if use_diseq {
            if raw.diseq_count <= 0 || raw.diseq_count as usize >= MAX_DISEQ_PARAMS {
                return Err(StoreError::FileHeader("bad disequilibrium count"));
            }
            file.seek(SeekFrom::Start(raw.diseq_offset as u64)).map_err(|_| StoreError::Lseek)?;
            header.diseqs = read_f32_table(file, raw.diseq_count as usize)?;
        }

        if raw.marker_label_size < 0 || raw.marker_label_size as usize > MAX_MARKER_LABEL_LEN {
            return Err(StoreError::FileHeader("bad marker label size"));
        }
        if raw.marker_label_size > 0 {
            let width = raw.marker_label_size as usize;
            file.seek(SeekFrom::Start(raw.marker_label_offset as u64)).map_err(|_| StoreError::Lseek)?;
            let mut buf = vec![0u8; width * marker_count];
            file.read_exact(&mut buf).map_err(StoreError::Reading)?;
            header.marker_labels = LabelTable::from_raw(width, buf);
        }

        if raw.pedigree_label_size < 0 || raw.pedigree_label_size as usize > MAX_PEDIGREE_LABEL_LEN {
            return Err(StoreError::FileHeader("bad pedigree label size"));
        }
        if raw.pedigree_label_size > 0 {
            let width = raw.pedigree_label_size as usize;
            file.seek(SeekFrom::Start(raw.pedigree_label_offset as u64)).map_err(|_| StoreError::Lseek)?;
            let mut buf = vec![0u8; width * pedigree_count];
            file.read_exact(&mut buf).map_err(StoreError::Reading)?;
            header.pedigree_labels = LabelTable::from_raw(width, buf);
        }

        header.start_of_data = raw.start_of_data as u64;
        header.chunks_per_file = raw.chunks_per_file as u64;
        header.number_of_files = raw.number_of_files as usize;
        Ok(header)
    }

    // ---- Accessors -------------------------------------------------------

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opt into the read-before-write guard: writing a different value over
    /// a valid (non-EMPTY, non-IGNORED) cell becomes an error.
    pub fn set_write_check(&mut self, on: bool) {
        self.write_check = on;
    }

    // ---- Cell I/O --------------------------------------------------------

    fn seek_cell(&mut self, index: CellIndex) -> Result<usize, StoreError> {
        let cell = self.header.cell_offset(index)?;
        let (shard, offset) = self.header.locate(cell);
        if shard >= self.files.len() {
            return Err(StoreError::Lseek);
        }
        self.files[shard]
            .seek(SeekFrom::Start(offset))
            .map_err(|_| StoreError::Lseek)?;
        Ok(shard)
    }

    fn read_cell_at(&mut self, shard: usize) -> Result<f64, StoreError> {
        match self.header.element_type {
            ElementType::Double => {
                self.files[shard].read_f64::<NativeEndian>().map_err(StoreError::Reading)
            }
            ElementType::Float => self.files[shard]
                .read_f32::<NativeEndian>()
                .map(f64::from)
                .map_err(StoreError::Reading),
        }
    }

    fn guard_overwrite(&mut self, index: CellIndex, value: f64) -> Result<(), StoreError> {
        let shard = self.seek_cell(index)?;
        let existing = self.read_cell_at(shard)?;
        if !sentinel::is_empty(existing)
            && !sentinel::is_ignored(existing)
            && (existing - value).abs() > (value / 5.0e5).abs()
        {
            warn!("cell already holds {existing:e}, refusing to overwrite with {value:e}");
            return Err(StoreError::WriteoverValidData);
        }
        Ok(())
    }

    /// Read one cell as a double, converting from the on-disk element type.
    pub fn read(&mut self, index: CellIndex) -> Result<f64, StoreError> {
        let shard = self.seek_cell(index)?;
        self.read_cell_at(shard)
    }

    /// Read one cell as a float. A double cell out of float range is an
    /// `OutOfRange` error rather than a silent truncation.
    pub fn read_f32(&mut self, index: CellIndex) -> Result<f32, StoreError> {
        let value = self.read(index)?;
        if value.abs() > f64::from(f32::MAX) {
            return Err(StoreError::OutOfRange);
        }
        Ok(value as f32)
    }

    /// Write one cell from a double.
    pub fn write(&mut self, index: CellIndex, value: f64) -> Result<(), StoreError> {
        if !self.writable {
            return Err(StoreError::NotOpen);
        }
        if self.write_check {
            self.guard_overwrite(index, value)?;
        }
        let shard = self.seek_cell(index)?;
        match self.header.element_type {
            ElementType::Double => self.files[shard]
                .write_f64::<NativeEndian>(value)
                .map_err(StoreError::Writing),
            ElementType::Float => {
                if value.abs() > f64::from(f32::MAX) {
                    return Err(StoreError::OutOfRange);
                }
                self.files[shard]
                    .write_f32::<NativeEndian>(value as f32)
                    .map_err(StoreError::Writing)
            }
        }
    }

    /// Write one cell from a float.
    pub fn write_f32(&mut self, index: CellIndex, value: f32) -> Result<(), StoreError> {
        self.write(index, f64::from(value))
    }

    /// Read `out.len()` consecutive cells along the innermost axis.
    pub fn read_list(&mut self, index: CellIndex, out: &mut [f64]) -> Result<(), StoreError> {
        self.header.list_range_check(index, out.len())?;
        let shard = self.seek_cell(index)?;
        match self.header.element_type {
            ElementType::Double => {
                for slot in out.iter_mut() {
                    *slot = self.files[shard].read_f64::<NativeEndian>().map_err(StoreError::Reading)?;
                }
            }
            ElementType::Float => {
                for slot in out.iter_mut() {
                    *slot = f64::from(
                        self.files[shard].read_f32::<NativeEndian>().map_err(StoreError::Reading)?,
                    );
                }
            }
        }
        Ok(())
    }

    /// Read `out.len()` consecutive cells along the innermost axis as floats.
    pub fn read_list_f32(&mut self, index: CellIndex, out: &mut [f32]) -> Result<(), StoreError> {
        self.header.list_range_check(index, out.len())?;
        let shard = self.seek_cell(index)?;
        match self.header.element_type {
            ElementType::Float => {
                for slot in out.iter_mut() {
                    *slot = self.files[shard].read_f32::<NativeEndian>().map_err(StoreError::Reading)?;
                }
            }
            ElementType::Double => {
                for slot in out.iter_mut() {
                    let value = self.files[shard].read_f64::<NativeEndian>().map_err(StoreError::Reading)?;
                    if value.abs() > f64::from(f32::MAX) {
                        return Err(StoreError::OutOfRange);
                    }
                    *slot = value as f32;
                }
            }
        }
        Ok(())
    }

    /// Write consecutive cells along the innermost axis from doubles.
    pub fn write_list(&mut self, index: CellIndex, values: &[f64]) -> Result<(), StoreError> {
        if !self.writable {
            return Err(StoreError::NotOpen);
        }
        self.header.list_range_check(index, values.len())?;
        let shard = self.seek_cell(index)?;
        match self.header.element_type {
            ElementType::Double => {
                let mut buf = Vec::with_capacity(values.len() * 8);
                for &v in values {
                    buf.write_f64::<NativeEndian>(v).map_err(StoreError::Writing)?;
                }
                self.files[shard].write_all(&buf).map_err(StoreError::Writing)
            }
            ElementType::Float => {
                let mut buf = Vec::with_capacity(values.len() * 4);
                for &v in values {
                    if v.abs() > f64::from(f32::MAX) {
                        return Err(StoreError::OutOfRange);
                    }
                    buf.write_f32::<NativeEndian>(v as f32).map_err(StoreError::Writing)?;
                }
                self.files[shard].write_all(&buf).map_err(StoreError::Writing)
            }
        }
    }

    /// Write consecutive cells along the innermost axis from floats.
    pub fn write_list_f32(&mut self, index: CellIndex, values: &[f32]) -> Result<(), StoreError> {
        if !self.writable {
            return Err(StoreError::NotOpen);
        }
        self.header.list_range_check(index, values.len())?;
        let shard = self.seek_cell(index)?;
        match self.header.element_type {
            ElementType::Float => {
                let mut buf = Vec::with_capacity(values.len() * 4);
                for &v in values {
                    buf.write_f32::<NativeEndian>(v).map_err(StoreError::Writing)?;
                }
                self.files[shard].write_all(&buf).map_err(StoreError::Writing)
            }
            ElementType::Double => {
                let mut buf = Vec::with_capacity(values.len() * 8);
                for &v in values {
                    buf.write_f64::<NativeEndian>(f64::from(v)).map_err(StoreError::Writing)?;
                }
                self.files[shard].write_all(&buf).map_err(StoreError::Writing)
            }
        }
    }

    // ---- Lifecycle -------------------------------------------------------

    /// Flush every shard to stable storage.
    pub fn sync(&mut self) -> Result<(), StoreError> {
        for file in &self.files {
            file.sync_all().map_err(StoreError::Writing)?;
        }
        Ok(())
    }

    /// Release the lock and close every shard.
    pub fn close(mut self) -> Result<(), StoreError> {
        for file in self.files.drain(..) {
            unlock(&file);
        }
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        for file in &self.files {
            unlock(file);
        }
    }
}
