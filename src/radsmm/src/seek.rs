use crate::error::StoreError;
use crate::header::{Header, MarkerMode, ModelKind, Ordering};

/// Logical position of one cell in the seven-dimensional model grid.
///
/// Under the grid theta-matrix mode the `theta` index is the flattened
/// `male_index * theta_count + female_index` pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellIndex {
    pub pedigree: usize,
    pub marker: usize,
    pub theta: usize,
    pub gene_freq: usize,
    pub penetrance: usize,
    pub qmodel: usize,
    pub diseq: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    Pedigree,
    Marker,
    Theta,
    GeneFreq,
    Penetrance,
    QModel,
    Diseq,
}

/// Nesting order of the seven axes, outermost first, for each ordering
/// letter. 'A' nests pedigree outermost and disequilibrium innermost.
pub(crate) fn nesting(ordering: Ordering) -> [Axis; 7] {
    use Axis::*;
    match ordering {
        Ordering::A => [Pedigree, Marker, Theta, GeneFreq, Penetrance, QModel, Diseq],
        Ordering::B => [Pedigree, GeneFreq, Penetrance, QModel, Theta, Diseq, Marker],
        Ordering::C => [Marker, Pedigree, QModel, Theta, GeneFreq, Penetrance, Diseq],
        Ordering::D => [Pedigree, Theta, Marker, GeneFreq, Penetrance, QModel, Diseq],
        Ordering::E => [Pedigree, QModel, GeneFreq, Penetrance, Diseq, Marker, Theta],
        Ordering::F => [Marker, GeneFreq, Penetrance, QModel, Theta, Diseq, Pedigree],
    }
}

impl Header {
    fn axis_extent(&self, axis: Axis) -> u64 {
        match axis {
            Axis::Pedigree   => self.pedigree_count().max(1) as u64,
            Axis::Marker     => self.marker_count().max(1) as u64,
            Axis::Theta      => self.theta_dim(),
            Axis::GeneFreq   => self.gene_freq_dim(),
            Axis::Penetrance => self.penetrance_dim(),
            Axis::QModel     => self.qmodel_dim(),
            Axis::Diseq      => self.diseq_dim(),
        }
    }

    fn axis_index(&self, index: &CellIndex, axis: Axis) -> u64 {
        match axis {
            Axis::Pedigree   => index.pedigree as u64,
            Axis::Marker     => index.marker as u64,
            Axis::Theta      => index.theta as u64,
            Axis::GeneFreq   => index.gene_freq as u64,
            Axis::Penetrance => index.penetrance as u64,
            Axis::QModel     => index.qmodel as u64,
            Axis::Diseq      => index.diseq as u64,
        }
    }

    /// Zero the indices of axes the model disables. A dichotomous store has
    /// no q-model axis, a quantitative one no penetrance or gene-frequency
    /// axis, multipoint no theta axis, and no-disequilibrium no diseq axis.
    pub(crate) fn canonicalize(&self, mut index: CellIndex) -> CellIndex {
        match self.model() {
            ModelKind::Dichotomous => index.qmodel = 0,
            ModelKind::Quantitative => {
                index.penetrance = 0;
                index.gene_freq = 0;
            }
        }
        if self.marker_mode() == MarkerMode::Multipoint {
            index.theta = 0;
        }
        if !self.uses_diseq() {
            index.diseq = 0;
        }
        index
    }

    /// Flatten a cell index into its logical offset in the data region,
    /// following the nesting order of the store's ordering letter.
    pub(crate) fn cell_offset(&self, index: CellIndex) -> Result<u64, StoreError> {
        let index = self.canonicalize(index);
        let mut offset: u64 = 0;
        for axis in nesting(self.ordering()) {
            let extent = self.axis_extent(axis);
            let at = self.axis_index(&index, axis);
            if at >= extent {
                return Err(StoreError::BadIndex);
            }
            offset = offset * extent + at;
        }
        Ok(offset)
    }

    /// For list reads and writes: confirm that `count` consecutive cells
    /// starting at `index` stay within the innermost axis of the ordering.
    pub(crate) fn list_range_check(&self, index: CellIndex, count: usize) -> Result<(), StoreError> {
        if count == 0 {
            return Err(StoreError::BadParam("empty list"));
        }
        let index = self.canonicalize(index);
        let innermost = nesting(self.ordering())[6];
        let at = self.axis_index(&index, innermost);
        if at + count as u64 > self.axis_extent(innermost) {
            return Err(StoreError::OutOfRange);
        }
        Ok(())
    }

    /// Map a logical cell offset to `(shard_index, byte_offset)`. Shard 0 is
    /// the primary file (header and index tables before the data region);
    /// shards 1.. hold raw cells only.
    pub(crate) fn locate(&self, cell: u64) -> (usize, u64) {
        if self.number_of_files() >= 1 {
            let shard = 1 + (cell / self.chunks_per_file()) as usize;
            let within = cell - (shard as u64 - 1) * self.chunks_per_file();
            (shard, within * self.chunk_size())
        } else {
            (0, self.start_of_data + cell * self.chunk_size())
        }
    }
}

/// Flattened male/female theta pair for grid-mode stores.
pub fn grid_theta_index(theta_count: usize, male: usize, female: usize) -> usize {
    male * theta_count + female
}
