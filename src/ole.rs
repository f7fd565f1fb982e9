use crate::chain::{collect_chain, Chain};
use crate::common::{OleError, OleResult, SectorType};
use crate::difat::build_difat;
use crate::directory::{read_directory, DirectoryEntries, Entry};
use crate::fat::build_fat;
use crate::header::Header;
use crate::mini_fat::build_mini_fat;
use crate::sector::{read_at, read_sector};
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Behaviour switches for [`Ole::open_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OleOptions {
    /// Return the bytes gathered so far when a stream's chain ends before its declared size,
    /// instead of failing with `CorruptContainer`.
    pub allow_short_streams: bool,
}

/// An opened compound file.
///
/// All tables are built once by [`Ole::open`] and never change afterwards. The
/// `*_from` methods take a caller-owned handle on the same bytes, so any number
/// of readers can share one `Ole` as long as each brings its own handle.
#[derive(Debug)]
pub struct Ole<R> {
    pub header: Header,
    pub difat: Vec<u32>,
    pub fat: Vec<SectorType>,
    pub mini_fat: Vec<SectorType>,
    directory: DirectoryEntries,
    /// Main FAT chain of the root entry, which holds every mini sector.
    mini_stream_chain: Vec<u32>,
    options: OleOptions,
    source: R,
}

impl<R> Display for Ole<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.header)?;
        for entry in &self.directory.entries {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}

impl Ole<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> OleResult<Self> {
        let file = File::open(path)?;
        Ole::open(BufReader::new(file))
    }
}

impl<R: Read + Seek> Ole<R> {
    pub fn open(source: R) -> OleResult<Self> {
        Self::open_with(source, OleOptions::default())
    }

    /// Parses the header and, if it is valid, every allocation table and the directory.
    ///
    /// An invalid header is not an error: the result reports `is_valid() == false`
    /// and holds no tables or entries.
    pub fn open_with(mut source: R, options: OleOptions) -> OleResult<Self> {
        source.seek(SeekFrom::Start(0))?;
        let header = Header::read(&mut source)?;

        let mut ole = Self {
            header,
            difat: vec![],
            fat: vec![],
            mini_fat: vec![],
            directory: DirectoryEntries::default(),
            mini_stream_chain: vec![],
            options,
            source,
        };

        if !ole.header.is_valid() {
            log::warn!("not a compound file: bad signature or byte order mark");
            return Ok(ole);
        }
        ole.header.check_layout()?;
        log::debug!("{}", ole.header);

        ole.parse()?;
        Ok(ole)
    }

    fn parse(&mut self) -> OleResult<()> {
        let header = &self.header;
        let source = &mut self.source;
        self.difat = build_difat(source, header)?;
        self.fat = build_fat(source, header, &self.difat)?;
        self.mini_fat = build_mini_fat(source, header, &self.fat)?;
        self.directory = read_directory(source, header, &self.fat)?;

        self.mini_stream_chain = match self.directory.root() {
            Some(root) => collect_chain(&self.fat, root.starting_sector_location)?,
            None => {
                log::warn!("directory has no root entry");
                vec![]
            }
        };
        Ok(())
    }

    /// Reads an entry's stream through the container's own handle.
    pub fn read(&mut self, entry: &Entry) -> OleResult<Vec<u8>> {
        resolve(&self.header, &self.fat, &self.mini_fat, &self.mini_stream_chain, self.options, &mut self.source, entry)
    }

    pub fn read_by_name(&mut self, name: &str) -> OleResult<Vec<u8>> {
        let entry = self.entry(name).cloned().ok_or_else(|| OleError::EntryNotFound(name.to_string()))?;
        self.read(&entry)
    }

    /// One sector (`minor == false`) or mini sector (`minor == true`) through the container's own handle.
    pub fn sector(&mut self, index: u32, minor: bool) -> OleResult<Vec<u8>> {
        let offset = self.sector_location(index, minor)?;
        let len = self.sector_len(minor);
        read_at(&mut self.source, offset, len)
    }

    pub fn into_inner(self) -> R {
        self.source
    }
}

impl<R> Ole<R> {
    pub fn is_valid(&self) -> bool {
        self.header.is_valid()
    }

    pub fn options(&self) -> OleOptions {
        self.options
    }

    /// Every directory record in physical order, unallocated ones included.
    pub fn entries(&self) -> &[Entry] {
        &self.directory.entries
    }

    pub fn streams(&self) -> impl Iterator<Item = &Entry> {
        self.directory.entries.iter().filter(|entry| entry.is_stream())
    }

    pub fn root(&self) -> Option<&Entry> {
        self.directory.root()
    }

    /// Lookup by exact decoded name; the first entry with that name wins.
    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.directory.get(name)
    }

    /// Entry at a stream ID, as referenced by sibling and child links.
    pub fn entry_by_id(&self, id: u32) -> Option<&Entry> {
        self.directory.by_id(id)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.directory.names()
    }

    /// The sector or mini sector indices a full read of `entry` visits, in order.
    pub fn stream_chain(&self, entry: &Entry) -> OleResult<Vec<u32>> {
        let Some((start, size)) = stream_extent(entry) else {
            return Ok(vec![]);
        };
        let table = if entry.is_minor() { &self.mini_fat } else { &self.fat };
        Chain::new(table, start).take(size.div_ceil(self.sector_len(entry.is_minor()))).collect()
    }

    /// Reads an entry's stream through a caller-owned handle on the same container bytes.
    pub fn read_stream_from<S: Read + Seek>(&self, source: &mut S, entry: &Entry) -> OleResult<Vec<u8>> {
        resolve(&self.header, &self.fat, &self.mini_fat, &self.mini_stream_chain, self.options, source, entry)
    }

    pub fn read_sector_from<S: Read + Seek>(&self, source: &mut S, index: u32, minor: bool) -> OleResult<Vec<u8>> {
        read_at(source, self.sector_location(index, minor)?, self.sector_len(minor))
    }

    fn sector_len(&self, minor: bool) -> usize {
        if minor { self.header.mini_sector_size() } else { self.header.sector_size() }
    }

    fn sector_location(&self, index: u32, minor: bool) -> OleResult<u64> {
        self.header.check_addressable()?;
        if minor {
            mini_sector_offset(&self.header, &self.mini_stream_chain, index)
        } else {
            Ok(self.header.sector_offset(index))
        }
    }
}

/// Follows the entry's chain in the FAT or mini FAT, concatenating sectors until
/// ENDOFCHAIN or the declared size is reached, then trims to the declared size.
fn resolve<S: Read + Seek>(
    header: &Header,
    fat: &[SectorType],
    mini_fat: &[SectorType],
    mini_stream_chain: &[u32],
    options: OleOptions,
    source: &mut S,
    entry: &Entry,
) -> OleResult<Vec<u8>> {
    let Some((start, size)) = stream_extent(entry) else {
        return Ok(vec![]);
    };
    header.check_addressable()?;

    let minor = entry.is_minor();
    let (table, sector_size) = if minor {
        (mini_fat, header.mini_sector_size())
    } else {
        (fat, header.sector_size())
    };
    let sectors = size.div_ceil(sector_size);
    log::debug!("reading {:?}: {} bytes over {} {}sectors", entry.name, size, sectors, if minor { "mini " } else { "" });

    let mut data = Vec::with_capacity(size.min(table.len().saturating_mul(sector_size)));
    for idx in Chain::new(table, start).take(sectors) {
        let idx = idx?;
        let buf = if minor {
            read_at(source, mini_sector_offset(header, mini_stream_chain, idx)?, sector_size)?
        } else {
            read_sector(source, header, idx)?
        };
        data.extend_from_slice(&buf);
    }

    if data.len() < size {
        if !options.allow_short_streams {
            return Err(OleError::CorruptContainer(format!(
                "stream {:?} holds {} of {} declared bytes",
                entry.name,
                data.len(),
                size
            )));
        }
        log::warn!("stream {:?} is short: {} of {} declared bytes", entry.name, data.len(), size);
    }
    data.truncate(size);
    Ok(data)
}

/// Start sector and declared size of a readable stream; `None` for storages,
/// empty streams and streams without a start sector.
fn stream_extent(entry: &Entry) -> Option<(SectorType, usize)> {
    if !entry.is_stream() || entry.stream_size == 0 || !entry.starting_sector_location.is_regular() {
        return None;
    }
    Some((entry.starting_sector_location, usize::try_from(entry.stream_size).unwrap_or(usize::MAX)))
}

/// Mini sectors are packed into the root entry's stream: mini sector `index` sits in
/// root stream sector `index / per_sector` at byte `(index % per_sector) * mini_sector_size`.
fn mini_sector_offset(header: &Header, mini_stream_chain: &[u32], index: u32) -> OleResult<u64> {
    let mini_size = header.mini_sector_size();
    let per_sector = header.sector_size() / mini_size;
    let hop = index as usize / per_sector;
    let sector = mini_stream_chain.get(hop).ok_or_else(|| {
        OleError::CorruptContainer(format!(
            "mini sector {} lies past the {} sectors of the mini stream",
            index,
            mini_stream_chain.len()
        ))
    })?;
    Ok(header.sector_offset(*sector) + ((index as usize % per_sector) * mini_size) as u64)
}
