use binrw::{BinRead, BinResult, Endian};
use std::fmt::{Display, Formatter};
use std::io::{Read, Seek};
use thiserror::Error;

pub const HEADER_SIZE: usize = 512;

pub const MAX_REG_SECT: u32 = 0xFFFFFFFA;
pub const NOT_APPLICABLE: u32 = 0xFFFFFFFB;
pub const DIF_SECT: u32 = 0xFFFFFFFC;
pub const FAT_SECT: u32 = 0xFFFFFFFD;
pub const END_OF_CHAIN: u32 = 0xFFFFFFFE;
pub const FREE_SECT: u32 = 0xFFFFFFFF;

/// A sector id word as stored in the header, the DIFAT, the FAT and the mini FAT.
///
/// The word is interpreted as a signed 32-bit value: every non-negative value
/// is a regular sector index, negative values are reserved.
///
/// FREESECT -1 Specifies an unallocated sector in the FAT, Mini FAT, or DIFAT.
///
/// ENDOFCHAIN -2 End of a linked chain of sectors.
///
/// FATSECT -3 Specifies a FAT sector in the FAT.
///
/// DIFSECT -4 Specifies a DIFAT sector in the FAT.
///
/// Not applicable -5 Reserved for future use.
///
/// MAXREGSECT -6 Maximum regular sector number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SectorType {
    MaxRegSect,
    NotApplicable,
    DifSect,
    FatSect,
    #[default]
    EndOfChain,
    FreeSect,
    RegularSect(u32),
    Invalid(u32),
}

impl From<u32> for SectorType {
    fn from(raw: u32) -> Self {
        match raw {
            MAX_REG_SECT => SectorType::MaxRegSect,
            NOT_APPLICABLE => SectorType::NotApplicable,
            DIF_SECT => SectorType::DifSect,
            FAT_SECT => SectorType::FatSect,
            END_OF_CHAIN => SectorType::EndOfChain,
            FREE_SECT => SectorType::FreeSect,
            v if (v as i32) >= 0 => SectorType::RegularSect(v),
            v => SectorType::Invalid(v),
        }
    }
}

impl From<SectorType> for u32 {
    fn from(sector: SectorType) -> Self {
        match sector {
            SectorType::MaxRegSect => MAX_REG_SECT,
            SectorType::NotApplicable => NOT_APPLICABLE,
            SectorType::DifSect => DIF_SECT,
            SectorType::FatSect => FAT_SECT,
            SectorType::EndOfChain => END_OF_CHAIN,
            SectorType::FreeSect => FREE_SECT,
            SectorType::RegularSect(v) | SectorType::Invalid(v) => v,
        }
    }
}

impl BinRead for SectorType {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, endian: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        u32::read_options(reader, endian, ()).map(SectorType::from)
    }
}

impl SectorType {
    /// The sector index, if this word names a regular sector.
    pub fn index(&self) -> Option<u32> {
        match self {
            SectorType::RegularSect(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_regular(&self) -> bool {
        matches!(self, SectorType::RegularSect(_))
    }
}

impl Display for SectorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SectorType::MaxRegSect => write!(f, "MaxRegSect"),
            SectorType::NotApplicable => write!(f, "NotApplicable"),
            SectorType::DifSect => write!(f, "DifatSect"),
            SectorType::FatSect => write!(f, "FatSect"),
            SectorType::EndOfChain => write!(f, "EndOfChain"),
            SectorType::FreeSect => write!(f, "FreeSect"),
            SectorType::RegularSect(v) => write!(f, "{}", v),
            SectorType::Invalid(v) => write!(f, "Invalid({:#010x})", v),
        }
    }
}

/// Byte order of every multi-byte field in a container, selected by the header's byte order mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Recognizes the on-disk bytes of the byte order mark (0xFFFE written in file order).
    pub fn from_mark(mark: [u8; 2]) -> Option<Self> {
        match mark {
            [0xFE, 0xFF] => Some(ByteOrder::Little),
            [0xFF, 0xFE] => Some(ByteOrder::Big),
            _ => None,
        }
    }

    pub fn endian(self) -> Endian {
        match self {
            ByteOrder::Little => Endian::Little,
            ByteOrder::Big => Endian::Big,
        }
    }

    pub fn u16_from(self, bytes: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        }
    }

    /// Joins two consecutive on-disk 32-bit words into one 64-bit value.
    /// Little-endian files store the low word first, big-endian files the high word.
    pub fn join_words(self, first: u32, second: u32) -> u64 {
        let (high, low) = match self {
            ByteOrder::Little => (second, first),
            ByteOrder::Big => (first, second),
        };
        ((high as u64) << 32) | low as u64
    }
}

impl Display for ByteOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ByteOrder::Little => write!(f, "little-endian"),
            ByteOrder::Big => write!(f, "big-endian"),
        }
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
pub enum MajorVersion {
    #[default]
    Version3,
    Version4,
    Other(u16),
}

impl From<u16> for MajorVersion {
    fn from(raw: u16) -> Self {
        match raw {
            3 => MajorVersion::Version3,
            4 => MajorVersion::Version4,
            v => MajorVersion::Other(v),
        }
    }
}

#[derive(Debug, Error)]
pub enum OleError {
    #[error("Unsupported Version: {0}")]
    UnsupportedVersion(String),
    #[error("Corrupt Container: {0}")]
    CorruptContainer(String),
    #[error("Entry Not Found: {0}")]
    EntryNotFound(String),
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Parse Error: {0}")]
    ParseError(#[from] binrw::Error),
}

pub type OleResult<T> = Result<T, OleError>;

/// Leading regular sector indices of an id list, stopping at the first sentinel.
pub fn get_valid_entries(entries: &[SectorType]) -> Vec<u32> {
    entries.iter().map_while(SectorType::index).collect()
}
