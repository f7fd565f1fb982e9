use crate::chain::Chain;
use crate::common::{ByteOrder, MajorVersion, OleResult, SectorType};
use crate::header::Header;
use crate::sector::read_full_sector;
use binrw::BinRead;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::io::{Cursor, Read, Seek};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// directory sector
// https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/a94d7445-c4be-49cd-b6b9-2f4abc663817

pub const DIRECTORY_ENTRY_SIZE: usize = 128;
pub const MAX_REG_SID: u32 = 0xFFFFFFFA;
pub const NO_STREAM: u32 = 0xFFFFFFFF;

const NAME_FIELD_SIZE: usize = 64;
/// 100ns intervals between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_OFFSET: u64 = 116_444_736_000_000_000;

#[derive(Debug, Clone, BinRead)]
#[br(import(entry_count: usize))]
pub struct Directory {
    #[br(count = entry_count)]
    pub entries: Vec<RawEntry>,
}

/// One 128-byte directory record as stored on disk.
#[derive(Debug, Clone, BinRead)]
pub struct RawEntry {
    // Directory Entry Name (64 bytes): UTF-16 name terminated with a null character, so limited to 32 code points including the terminator.
    pub name: [u8; 64],
    // Directory Entry Name Length (2 bytes): length of the name in bytes including the terminating null. MUST NOT exceed 64.
    pub name_length: u16,
    // Object Type (1 byte): 0x00 unknown or unallocated, 0x01 storage, 0x02 stream, 0x05 root storage.
    pub object_type: u8,
    // Color Flag (1 byte): 0x00 (red) or 0x01 (black).
    pub color: u8,
    // Left Sibling ID (4 bytes): stream ID of the left sibling, or NOSTREAM.
    pub left_sibling_id: u32,
    // Right Sibling ID (4 bytes): stream ID of the right sibling, or NOSTREAM.
    pub right_sibling_id: u32,
    // Child ID (4 bytes): stream ID of a child object, or NOSTREAM.
    pub child_id: u32,
    // CLSID (16 bytes): object class GUID for storage and root storage objects.
    pub clsid: [u8; 16],
    // State Bits (4 bytes): user-defined flags for storage and root storage objects.
    pub state_bits: u32,
    // Creation Time (8 bytes): FILETIME, two 32-bit words.
    pub creation_time: [u32; 2],
    // Modified Time (8 bytes): FILETIME, two 32-bit words.
    pub modified_time: [u32; 2],
    // Starting Sector Location (4 bytes): first sector of a stream, or of the mini stream for the root storage object.
    pub starting_sector_location: SectorType,
    // Stream Size (8 bytes): version 3 parsers ignore the most significant 32 bits, which older writers left uninitialized.
    pub stream_size: [u32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Invalid,
    Storage,
    Stream,
    LockBytes,
    Property,
    RootStorage,
}

impl From<u8> for ObjectType {
    fn from(raw: u8) -> Self {
        match raw {
            0x01 => ObjectType::Storage,
            0x02 => ObjectType::Stream,
            0x03 => ObjectType::LockBytes,
            0x04 => ObjectType::Property,
            0x05 => ObjectType::RootStorage,
            _ => ObjectType::Invalid,
        }
    }
}

impl Display for ObjectType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectType::Invalid => write!(f, "invalid"),
            ObjectType::Storage => write!(f, "storage"),
            ObjectType::Stream => write!(f, "stream"),
            ObjectType::LockBytes => write!(f, "lock bytes"),
            ObjectType::Property => write!(f, "property"),
            ObjectType::RootStorage => write!(f, "root storage"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

impl From<u8> for Color {
    fn from(raw: u8) -> Self {
        if raw == 0x01 { Color::Black } else { Color::Red }
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Color::Red => write!(f, "red"),
            Color::Black => write!(f, "black")
        }
    }
}

/// A decoded directory entry.
///
/// The sibling and child ids describe the red-black tree of the format. They
/// are kept for inspection only; entries are always located by a linear scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Stream ID: position of the record in the directory chain.
    pub id: u32,
    pub name: String,
    pub name_length: u16,
    pub object_type: ObjectType,
    pub color: Color,
    pub left_sibling_id: u32,
    pub right_sibling_id: u32,
    pub child_id: u32,
    pub clsid: [u8; 16],
    pub state_bits: u32,
    pub creation_time: u64,
    pub modified_time: u64,
    pub starting_sector_location: SectorType,
    pub stream_size: u64,
    is_minor: bool,
}

impl Display for Entry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "id: {},\tname: {},\ttype: {},\tcolor: {},\tsize: {},\t", self.id, self.printable_name(), self.object_type, self.color, self.stream_size)?;
        write!(f, "start: {},\tminor: {}", self.starting_sector_location, self.is_minor)
    }
}

impl Entry {
    /// Decodes a raw record. `cutoff` is the header's mini stream cutoff size.
    pub fn from_raw(id: u32, raw: &RawEntry, order: ByteOrder, version: MajorVersion, cutoff: u32) -> Self {
        let object_type = ObjectType::from(raw.object_type);
        let [first, second] = raw.stream_size;
        let stream_size = match version {
            MajorVersion::Version4 => order.join_words(first, second),
            _ => order.join_words(first, second) & 0xFFFF_FFFF,
        };

        Self {
            id,
            name: decode_name(&raw.name, raw.name_length, order),
            name_length: raw.name_length,
            object_type,
            color: Color::from(raw.color),
            left_sibling_id: raw.left_sibling_id,
            right_sibling_id: raw.right_sibling_id,
            child_id: raw.child_id,
            clsid: raw.clsid,
            state_bits: raw.state_bits,
            creation_time: order.join_words(raw.creation_time[0], raw.creation_time[1]),
            modified_time: order.join_words(raw.modified_time[0], raw.modified_time[1]),
            starting_sector_location: raw.starting_sector_location,
            stream_size,
            is_minor: stream_size < cutoff as u64 && object_type != ObjectType::RootStorage,
        }
    }

    /// The entry's data lives in the mini stream rather than in regular sectors.
    pub fn is_minor(&self) -> bool {
        self.is_minor
    }

    pub fn is_stream(&self) -> bool {
        self.object_type == ObjectType::Stream
    }

    /// Name without the leading/trailing control characters 0x00-0x06 used by property set streams.
    pub fn printable_name(&self) -> &str {
        self.name.trim_matches(|c: char| c <= '\u{6}')
    }

    pub fn left_sibling(&self) -> Option<u32> {
        stream_id(self.left_sibling_id)
    }

    pub fn right_sibling(&self) -> Option<u32> {
        stream_id(self.right_sibling_id)
    }

    pub fn child(&self) -> Option<u32> {
        stream_id(self.child_id)
    }

    pub fn created(&self) -> Option<SystemTime> {
        filetime(self.creation_time)
    }

    pub fn modified(&self) -> Option<SystemTime> {
        filetime(self.modified_time)
    }
}

fn stream_id(raw: u32) -> Option<u32> {
    if raw <= MAX_REG_SID { Some(raw) } else { None }
}

fn filetime(ticks: u64) -> Option<SystemTime> {
    if ticks == 0 {
        return None;
    }
    let nanos = |t: u64| Duration::from_nanos(t.saturating_mul(100));
    if ticks >= FILETIME_UNIX_OFFSET {
        UNIX_EPOCH.checked_add(nanos(ticks - FILETIME_UNIX_OFFSET))
    } else {
        UNIX_EPOCH.checked_sub(nanos(FILETIME_UNIX_OFFSET - ticks))
    }
}

/// UTF-16 name in the file's byte order; the length field is clamped to the 64-byte name field
/// and a zero length reads the whole field. Trailing NULs are dropped, unpaired surrogates
/// become U+FFFD.
fn decode_name(bytes: &[u8; 64], name_length: u16, order: ByteOrder) -> String {
    let len = match name_length as usize {
        0 => NAME_FIELD_SIZE,
        n => n.min(NAME_FIELD_SIZE),
    };
    let units = bytes[..len].chunks_exact(2).map(|pair| order.u16_from([pair[0], pair[1]]));
    let name: String = char::decode_utf16(units).map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER)).collect();
    name.trim_end_matches('\0').to_string()
}

/// Every decoded directory record in physical order, plus the name index used for lookup.
#[derive(Debug, Clone, Default)]
pub struct DirectoryEntries {
    pub entries: Vec<Entry>,
    names: HashMap<String, usize>,
    root: Option<usize>,
}

impl DirectoryEntries {
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let mut names = HashMap::with_capacity(entries.len());
        let mut root = None;
        for (pos, entry) in entries.iter().enumerate() {
            if entry.object_type == ObjectType::Invalid {
                continue;
            }
            if entry.object_type == ObjectType::RootStorage {
                match root {
                    None => root = Some(pos),
                    Some(_) => log::warn!("ignoring extra root entry {}", entry.id),
                }
            }
            if names.contains_key(&entry.name) {
                log::warn!("duplicate directory name {:?} at entry {}", entry.name, entry.id);
            } else {
                names.insert(entry.name.clone(), pos);
            }
        }
        Self { entries, names, root }
    }

    /// Exact, case-sensitive match; the first entry with the name wins.
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.names.get(name).map(|&pos| &self.entries[pos])
    }

    pub fn root(&self) -> Option<&Entry> {
        self.root.map(|pos| &self.entries[pos])
    }

    pub fn by_id(&self, id: u32) -> Option<&Entry> {
        self.entries.get(id as usize)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }
}

/// Linear scan of the directory chain: every record of every directory sector, in physical order.
pub fn read_directory<S: Read + Seek>(source: &mut S, header: &Header, fat: &[SectorType]) -> OleResult<DirectoryEntries> {
    let count = header.sector_size() / DIRECTORY_ENTRY_SIZE;
    let order = header.byte_order();
    let version = header.version();

    let mut entries = Vec::new();
    for idx in Chain::new(fat, header.first_directory_sector_location) {
        let buf = read_full_sector(source, header, idx?)?;
        let directory = Directory::read_options(&mut Cursor::new(&buf), order.endian(), (count,))?;
        for raw in &directory.entries {
            let id = entries.len() as u32;
            entries.push(Entry::from_raw(id, raw, order, version, header.mini_stream_cutoff_size));
        }
    }

    log::debug!("directory holds {} records", entries.len());
    Ok(DirectoryEntries::from_entries(entries))
}
