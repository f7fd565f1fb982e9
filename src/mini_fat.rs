use crate::chain::Chain;
use crate::common::{OleResult, SectorType};
use crate::fat::read_table_sector;
use crate::header::Header;
use std::io::{Read, Seek};

// mini fat sector
// https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/c5d235f7-b73c-4ec5-bf8d-5c08306cd023

/// Reads the mini FAT, whose own sectors form a chain in the main FAT.
pub fn build_mini_fat<S: Read + Seek>(source: &mut S, header: &Header, fat: &[SectorType]) -> OleResult<Vec<SectorType>> {
    let mut mini_fat = Vec::new();
    let mut sectors = 0u32;
    for idx in Chain::new(fat, header.first_mini_fat_sector_location) {
        mini_fat.extend(read_table_sector(source, header, idx?)?);
        sectors += 1;
    }

    if sectors != header.number_of_mini_fat_sectors {
        log::warn!("header declares {} mini FAT sectors, chain holds {}", header.number_of_mini_fat_sectors, sectors);
    }
    log::debug!("mini FAT describes {} mini sectors", mini_fat.len());
    Ok(mini_fat)
}
