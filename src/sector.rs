use crate::common::{OleError, OleResult};
use crate::header::Header;
use std::io::{Read, Seek, SeekFrom};

/// Reads up to `len` bytes at `offset`. The result is shorter than `len` only at end of file.
pub fn read_at<S: Read + Seek>(source: &mut S, offset: u64, len: usize) -> OleResult<Vec<u8>> {
    source.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity(len);
    source.by_ref().take(len as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// One regular sector, possibly short if the file ends inside it.
pub fn read_sector<S: Read + Seek>(source: &mut S, header: &Header, index: u32) -> OleResult<Vec<u8>> {
    read_at(source, header.sector_offset(index), header.sector_size())
}

/// One complete regular sector; allocation tables and directory sectors must never be truncated.
pub fn read_full_sector<S: Read + Seek>(source: &mut S, header: &Header, index: u32) -> OleResult<Vec<u8>> {
    let buf = read_sector(source, header, index)?;
    if buf.len() < header.sector_size() {
        return Err(OleError::CorruptContainer(format!(
            "sector {} truncated to {} of {} bytes",
            index,
            buf.len(),
            header.sector_size()
        )));
    }
    Ok(buf)
}
