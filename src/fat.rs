use crate::common::{OleResult, SectorType};
use crate::header::Header;
use crate::sector::read_full_sector;
use binrw::BinRead;
use std::io::{Cursor, Read, Seek};

/// fat sector
/// https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/30e1013a-a0ff-4404-9ccf-d75d835ff404
#[derive(Debug, Clone, BinRead)]
#[br(import(entry_count: usize))]
pub struct Fat {
    #[br(count = entry_count)]
    pub entries: Vec<SectorType>,
}

/// Decodes one allocation table sector (FAT or mini FAT) in the file's byte order.
pub(crate) fn read_table_sector<S: Read + Seek>(source: &mut S, header: &Header, index: u32) -> OleResult<Vec<SectorType>> {
    let buf = read_full_sector(source, header, index)?;
    let count = header.sector_size() / 4;
    let Fat { entries } = Fat::read_options(&mut Cursor::new(&buf), header.byte_order().endian(), (count,))?;
    Ok(entries)
}

/// Concatenates every FAT sector named by the DIFAT; position `i` of the result describes sector `i`.
pub fn build_fat<S: Read + Seek>(source: &mut S, header: &Header, difat: &[u32]) -> OleResult<Vec<SectorType>> {
    if header.number_of_fat_sectors as usize != difat.len() {
        log::warn!("header declares {} FAT sectors, DIFAT names {}", header.number_of_fat_sectors, difat.len());
    }

    let mut fat = Vec::with_capacity(difat.len() * header.sector_size() / 4);
    for &idx in difat {
        fat.extend(read_table_sector(source, header, idx)?);
    }

    log::debug!("FAT describes {} sectors", fat.len());
    Ok(fat)
}
