/// Splitting file payloads into linked sector chains

use crate::error::{AtrError, Result};
use crate::image::SectorRecord;

/// Ordered list of sector records making up one file
#[derive(Debug, Clone, Default)]
pub struct SectorList {
    sectors: Vec<SectorRecord>,
}

impl SectorList {
    /// Wrap already numbered records
    pub fn from_records(sectors: Vec<SectorRecord>) -> Self {
        Self { sectors }
    }

    /// Number of sectors in the chain
    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    /// Check if the chain has no sectors
    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    /// Get the records in chain order
    pub fn sectors(&self) -> &[SectorRecord] {
        &self.sectors
    }

    /// Iterate over the records in chain order
    pub fn iter(&self) -> std::slice::Iter<'_, SectorRecord> {
        self.sectors.iter()
    }

    /// Sector numbers in chain order
    pub fn sector_numbers(&self) -> Vec<usize> {
        self.sectors.iter().map(|s| s.sector_num).collect()
    }

    /// Total payload bytes across the chain
    pub fn file_length(&self) -> usize {
        self.sectors.iter().map(|s| s.used()).sum()
    }

    /// First sector of the chain, 0 when empty
    pub fn first_sector(&self) -> usize {
        self.sectors.first().map(|s| s.sector_num).unwrap_or(0)
    }

    /// Assign sector numbers in order and link each record to the next
    ///
    /// The last record points at 0, the end-of-chain marker.
    pub fn link(&mut self, numbers: &[usize], file_num: usize) -> Result<()> {
        if numbers.len() != self.sectors.len() {
            return Err(AtrError::NotEnoughSpace {
                needed: self.sectors.len(),
                available: numbers.len(),
            });
        }

        for (i, sector) in self.sectors.iter_mut().enumerate() {
            sector.sector_num = numbers[i];
            sector.file_num = file_num;
            sector.next_sector_num = numbers.get(i + 1).copied().unwrap_or(0);
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a SectorList {
    type Item = &'a SectorRecord;
    type IntoIter = std::slice::Iter<'a, SectorRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.sectors.iter()
    }
}

/// Splits a payload into sector sized pieces
#[derive(Debug, Clone, Copy)]
pub struct SectorChainBuilder {
    payload_capacity: usize,
}

impl SectorChainBuilder {
    /// Create a builder for sectors holding `payload_capacity` bytes each
    pub fn new(payload_capacity: usize) -> Self {
        Self {
            payload_capacity: payload_capacity.max(1),
        }
    }

    /// Payload bytes per sector
    pub fn payload_capacity(&self) -> usize {
        self.payload_capacity
    }

    /// Number of sectors needed for `len` bytes
    pub fn sectors_needed(&self, len: usize) -> usize {
        len.div_ceil(self.payload_capacity)
    }

    /// Split `data` into unnumbered records; only the last may be short
    pub fn build(&self, data: &[u8]) -> SectorList {
        let sectors = data
            .chunks(self.payload_capacity)
            .map(|chunk| SectorRecord::new(chunk.to_vec()))
            .collect();
        SectorList { sectors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lengths() {
        let builder = SectorChainBuilder::new(128);
        let list = builder.build(&[0x55; 300]);

        let lengths: Vec<usize> = list.iter().map(|s| s.used()).collect();
        assert_eq!(lengths, vec![128, 128, 44]);
        assert_eq!(list.file_length(), 300);
        assert_eq!(builder.sectors_needed(300), 3);
        assert!(list.iter().all(|s| s.sector_num == 0));
    }

    #[test]
    fn test_link_chain() {
        let mut list = SectorChainBuilder::new(128).build(&[0x55; 300]);
        list.link(&[1, 2, 3], 7).unwrap();

        let links: Vec<(usize, usize)> = list
            .iter()
            .map(|s| (s.sector_num, s.next_sector_num))
            .collect();
        assert_eq!(links, vec![(1, 2), (2, 3), (3, 0)]);
        assert!(list.iter().all(|s| s.file_num == 7));
        assert_eq!(list.first_sector(), 1);
    }

    #[test]
    fn test_exact_multiple() {
        let list = SectorChainBuilder::new(125).build(&[1; 250]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.sectors()[1].used(), 125);
    }

    #[test]
    fn test_empty_payload() {
        let mut list = SectorChainBuilder::new(125).build(&[]);
        assert!(list.is_empty());
        list.link(&[], 0).unwrap();
        assert_eq!(list.first_sector(), 0);
    }

    #[test]
    fn test_link_count_mismatch() {
        let mut list = SectorChainBuilder::new(125).build(&[1; 300]);
        assert!(list.link(&[10, 11], 0).is_err());
    }
}
