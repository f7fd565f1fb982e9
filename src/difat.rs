use crate::common::{get_valid_entries, OleResult, SectorType};
use crate::header::Header;
use crate::sector::read_full_sector;
use binrw::BinRead;
use std::io::{Cursor, Read, Seek, SeekFrom};

/// difat sector
/// https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/0afa4e43-b18f-432a-9917-4f276eca7a73
#[derive(Debug, Clone, BinRead)]
#[br(import(entry_count: usize))]
pub struct Difat {
    #[br(count = entry_count)]
    pub entries: Vec<SectorType>,
    pub next: SectorType,
}

/// Ordered FAT sector indices: the header's inline entries, then those of every chained DIFAT sector.
///
/// The chain is followed until ENDOFCHAIN or until the header's DIFAT sector
/// count is used up, whichever comes first. The count is capped at the number
/// of sectors the source actually holds.
pub fn build_difat<S: Read + Seek>(source: &mut S, header: &Header) -> OleResult<Vec<u32>> {
    let mut difat = get_valid_entries(&header.difat_entries);
    let count = header.sector_size() / 4 - 1;
    let endian = header.byte_order().endian();

    let mut remaining = u64::from(header.number_of_difat_sectors);
    if remaining > 0 {
        let file_sectors = source.seek(SeekFrom::End(0))?.saturating_sub(header.header_span()) / header.sector_size() as u64;
        if remaining > file_sectors {
            log::warn!("header declares {} DIFAT sectors, file holds {} sectors", remaining, file_sectors);
            remaining = file_sectors;
        }
    }

    let mut current = header.first_difat_sector_location;
    while remaining > 0 {
        let SectorType::RegularSect(idx) = current else {
            break;
        };
        let buf = read_full_sector(source, header, idx)?;
        let Difat { entries, next } = Difat::read_options(&mut Cursor::new(&buf), endian, (count,))?;
        difat.extend(get_valid_entries(&entries));
        current = next;
        remaining -= 1;
    }

    if current.is_regular() {
        log::warn!("DIFAT chain continues past the declared {} sectors", header.number_of_difat_sectors);
    }
    log::debug!("DIFAT holds {} FAT sector locations", difat.len());
    Ok(difat)
}
