use crate::common::{OleError, OleResult, SectorType};

/// Walks a sector chain through an allocation table (FAT or mini FAT).
///
/// Yields the index of every sector in the chain, starting with `start`. The
/// walk ends at ENDOFCHAIN, at any other sentinel, or at an index the table
/// does not describe. A chain visits each sector at most once, so reaching a
/// sector a second time means a cycle and yields `CorruptContainer`.
#[derive(Debug, Clone)]
pub struct Chain<'a> {
    table: &'a [SectorType],
    next: SectorType,
    visited: Vec<bool>,
}

impl<'a> Chain<'a> {
    pub fn new(table: &'a [SectorType], start: SectorType) -> Self {
        Self { table, next: start, visited: vec![false; table.len()] }
    }
}

impl Iterator for Chain<'_> {
    type Item = OleResult<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        let SectorType::RegularSect(idx) = self.next else {
            return None;
        };

        let Some(seen) = self.visited.get_mut(idx as usize) else {
            self.next = SectorType::EndOfChain;
            return Some(Ok(idx));
        };
        if *seen {
            self.next = SectorType::EndOfChain;
            return Some(Err(OleError::CorruptContainer(format!("sector chain revisits sector {}", idx))));
        }

        *seen = true;
        self.next = self.table[idx as usize];
        Some(Ok(idx))
    }
}

/// Collects a whole chain, failing on a cycle.
pub fn collect_chain(table: &[SectorType], start: SectorType) -> OleResult<Vec<u32>> {
    Chain::new(table, start).collect()
}
