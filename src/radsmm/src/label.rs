use crate::error::StoreError;

/// Fixed-width label table for one axis of the store (markers or pedigrees).
///
/// Labels are stored back to back in `width`-byte slots, each slot
/// null-terminated when the label is shorter than the slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    width: usize,
    data: Vec<u8>,
}

/// Which default fill pattern to use for unset labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Marker,
    Pedigree,
}

impl LabelKind {
    fn short_prefix(self) -> &'static str {
        match self {
            LabelKind::Marker   => "M",
            LabelKind::Pedigree => "P",
        }
    }

    fn long_prefix(self) -> &'static str {
        match self {
            LabelKind::Marker   => "Marker",
            LabelKind::Pedigree => "Pedigree",
        }
    }

    fn short_cutoff(self) -> usize {
        match self {
            LabelKind::Marker   => 8,
            LabelKind::Pedigree => 10,
        }
    }
}

impl LabelTable {
    /// An empty table: no label storage allocated, nothing written to disk.
    pub fn empty() -> LabelTable {
        LabelTable { width: 0, data: Vec::new() }
    }

    /// Allocate `count` slots of `width` bytes, pre-filled with generated
    /// labels whose shape depends on the slot width.
    pub fn with_defaults(width: usize, count: usize, kind: LabelKind) -> LabelTable {
        if width == 0 {
            return LabelTable::empty();
        }
        let mut table = LabelTable { width, data: vec![0u8; width * count] };
        for i in 1..=count {
            let label = match width {
                1       => format!("{}", i % 10),
                2       => format!("{:2}", i % 100),
                3       => format!("{:3}", i),
                w if w <= kind.short_cutoff() => format!("{}{}", kind.short_prefix(), i),
                _       => format!("{}{}", kind.long_prefix(), i),
            };
            // ignore the error: generated labels always fit their slot width
            let _ = table.set(i - 1, &label);
        }
        table
    }

    pub fn from_raw(width: usize, data: Vec<u8>) -> LabelTable {
        LabelTable { width, data }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0
    }

    pub fn raw(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Write `label` into slot `index`, truncating to the slot width.
    /// Copy stops at the label's end; the remainder of the slot is zeroed.
    pub fn set(&mut self, index: usize, label: &str) -> Result<(), StoreError> {
        let count = if self.width == 0 { 0 } else { self.data.len() / self.width };
        if index >= count {
            return Err(StoreError::BadParam("label index out of range"));
        }
        let slot = &mut self.data[index * self.width..(index + 1) * self.width];
        slot.fill(0);
        let bytes = label.as_bytes();
        let n = bytes.len().min(self.width);
        slot[..n].copy_from_slice(&bytes[..n]);
        Ok(())
    }

    /// Fetch the label in slot `index`. A slot with no null terminator is
    /// returned whole (its length is exactly the slot width).
    pub fn get(&self, index: usize) -> Option<String> {
        let count = if self.width == 0 { 0 } else { self.data.len() / self.width };
        if index >= count {
            return None;
        }
        let slot = &self.data[index * self.width..(index + 1) * self.width];
        let end = slot.iter().position(|&b| b == 0).unwrap_or(self.width);
        Some(String::from_utf8_lossy(&slot[..end]).into_owned())
    }

    /// Linear scan for a label, returning its slot index.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        let count = if self.width == 0 { 0 } else { self.data.len() / self.width };
        (0..count).find(|&i| self.get(i).as_deref() == Some(label))
    }
}
