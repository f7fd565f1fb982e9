use crate::common::{ByteOrder, MajorVersion, OleError, OleResult, SectorType, HEADER_SIZE};
use binrw::BinRead;
use std::fmt::{Display, Formatter};
use std::io::{Cursor, Read};

pub const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
pub const HEADER_DIFAT_ENTRIES: usize = 109;
const BYTE_ORDER_OFFSET: usize = 28;

/// compound file header
/// https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/05060311-bfce-4b12-874d-71fd4ce63aea
#[derive(Debug, Clone, BinRead)]
pub struct Header {
    // Header Signature (8 bytes): Identification signature for the compound file structure, and MUST be set to the value 0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1.
    pub signature: [u8; 8],

    // Header CLSID (16 bytes): Reserved and unused class ID that MUST be set to all zeroes (CLSID_NULL).
    pub clsid: [u8; 16],

    // Minor Version (2 bytes): Version number for nonbreaking changes. This field SHOULD be set to 0x003E if the major version field is either 0x0003 or 0x0004.
    pub minor_version: u16,

    // Major Version (2 bytes): Version number for breaking changes. This field MUST be set to either 0x0003 (version 3) or 0x0004 (version 4).
    pub major_version: u16,

    // Byte Order (2 bytes): 0xFFFE written in the byte order used by every other integer field of the file.
    pub byte_order_mark: [u8; 2],

    // Sector Shift (2 bytes): This field MUST be set to 0x0009, or 0x000c, depending on the Major Version field. This field specifies the sector size of the compound file as a power of 2.
    pub sector_shift: u16,

    // Mini Sector Shift (2 bytes): This field MUST be set to 0x0006. This field specifies the sector size of the Mini Stream as a power of 2. The sector size of the Mini Stream MUST be 64 bytes.
    pub mini_sector_shift: u16,

    // Reserved (6 bytes): This field MUST be set to all zeroes.
    // Number of Directory Sectors (4 bytes): If Major Version is 3, the Number of Directory Sectors MUST be zero.
    #[br(pad_before = 6)]
    pub number_of_directory_sectors: u32,

    // Number of FAT Sectors (4 bytes): This integer field contains the count of the number of FAT sectors in the compound file.
    pub number_of_fat_sectors: u32,

    // First Directory Sector Location (4 bytes): This integer field contains the starting sector number for the directory stream.
    pub first_directory_sector_location: SectorType,

    // Transaction Signature Number (4 bytes): MUST be set to all zeroes if file transactions are not implemented.
    pub transaction_signature_number: u32,

    // Mini Stream Cutoff Size (4 bytes): Any user-defined data stream that is greater than or equal to this cutoff size must be allocated as normal sectors from the FAT.
    pub mini_stream_cutoff_size: u32,

    // First Mini FAT Sector Location (4 bytes): This integer field contains the starting sector number for the mini FAT.
    pub first_mini_fat_sector_location: SectorType,

    // Number of Mini FAT Sectors (4 bytes): This integer field contains the count of the number of mini FAT sectors in the compound file.
    pub number_of_mini_fat_sectors: u32,

    // First DIFAT Sector Location (4 bytes): This integer field contains the starting sector number for the DIFAT.
    pub first_difat_sector_location: SectorType,

    // Number of DIFAT Sectors (4 bytes): This integer field contains the count of the number of DIFAT sectors in the compound file.
    pub number_of_difat_sectors: u32,

    // DIFAT (436 bytes): This array of 32-bit integer fields contains the first 109 FAT sector locations of the compound file.
    pub difat_entries: [SectorType; HEADER_DIFAT_ENTRIES],

    #[br(ignore)]
    byte_order: Option<ByteOrder>,
}

impl Header {
    /// Parses the fixed 512-byte header from the start of `reader`.
    ///
    /// A bad signature or byte order mark is not an error: the returned header
    /// reports `is_valid() == false` and its fields are decoded little-endian.
    pub fn read<R: Read>(reader: &mut R) -> OleResult<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut buf)?;
        Self::parse(&buf)
    }

    pub fn parse(buf: &[u8; HEADER_SIZE]) -> OleResult<Self> {
        let mark = [buf[BYTE_ORDER_OFFSET], buf[BYTE_ORDER_OFFSET + 1]];
        let byte_order = ByteOrder::from_mark(mark);
        let endian = byte_order.unwrap_or(ByteOrder::Little).endian();

        let mut header = Header::read_options(&mut Cursor::new(&buf[..]), endian, ())?;
        header.byte_order = byte_order;
        Ok(header)
    }

    /// Signature matches and the byte order mark is recognized.
    pub fn is_valid(&self) -> bool {
        self.signature == SIGNATURE && self.byte_order.is_some()
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order.unwrap_or(ByteOrder::Little)
    }

    pub fn version(&self) -> MajorVersion {
        MajorVersion::from(self.major_version)
    }

    pub fn sector_size(&self) -> usize {
        1usize << self.sector_shift.min(31)
    }

    pub fn mini_sector_size(&self) -> usize {
        1usize << self.mini_sector_shift.min(31)
    }

    /// Bytes before sector 0. The header fills the whole first sector of a 4096-byte sector file.
    pub fn header_span(&self) -> u64 {
        self.sector_size().max(HEADER_SIZE) as u64
    }

    /// Absolute file offset of regular sector `index`. Sector 0 follows the header span,
    /// which is 4096 bytes rather than 512 in a version 4 file.
    pub fn sector_offset(&self, index: u32) -> u64 {
        self.header_span() + index as u64 * self.sector_size() as u64
    }

    /// Rejects sector geometries this reader cannot address correctly.
    pub fn check_layout(&self) -> OleResult<()> {
        self.check_shifts()?;
        let expected = match self.version() {
            MajorVersion::Version3 => Some(9),
            MajorVersion::Version4 => Some(12),
            MajorVersion::Other(_) => None,
        };
        if expected != Some(self.sector_shift) {
            log::warn!("major version {} declares sector shift {}", self.major_version, self.sector_shift);
        }
        Ok(())
    }
}

impl Header {
    fn check_shifts(&self) -> OleResult<()> {
        if self.sector_shift != 9 && self.sector_shift != 12 {
            return Err(OleError::UnsupportedVersion(format!("sector shift {}", self.sector_shift)));
        }
        if self.mini_sector_shift != 6 {
            return Err(OleError::UnsupportedVersion(format!("mini sector shift {}", self.mini_sector_shift)));
        }
        Ok(())
    }

    /// Fails unless sectors of this container can be addressed: the header must be
    /// valid and declare a supported geometry.
    pub fn check_addressable(&self) -> OleResult<()> {
        if !self.is_valid() {
            return Err(OleError::CorruptContainer("not a compound file: bad signature or byte order mark".to_string()));
        }
        self.check_shifts()
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "version: {}.{},\tvalid: {},\tbyte order: {},\t", self.major_version, self.minor_version, self.is_valid(), self.byte_order())?;
        write!(f, "sector size: {},\tmini sector size: {},\tmini stream cutoff: {}", self.sector_size(), self.mini_sector_size(), self.mini_stream_cutoff_size)
    }
}
