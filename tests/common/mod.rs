//! In-memory compound file writer for integration tests.

#![allow(dead_code)]

use cfb_reader::ByteOrder;
use std::collections::HashMap;
use std::io::Cursor;

pub const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
pub const FREE_SECT: u32 = 0xFFFF_FFFF;
pub const FAT_SECT: u32 = 0xFFFF_FFFD;
pub const NO_STREAM: u32 = 0xFFFF_FFFF;
pub const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

const MINI_SECTOR_SIZE: usize = 64;
const ENTRY_SIZE: usize = 128;

pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

fn word16(order: ByteOrder, v: u16) -> [u8; 2] {
    match order {
        ByteOrder::Little => v.to_le_bytes(),
        ByteOrder::Big => v.to_be_bytes(),
    }
}

fn word32(order: ByteOrder, v: u32) -> [u8; 4] {
    match order {
        ByteOrder::Little => v.to_le_bytes(),
        ByteOrder::Big => v.to_be_bytes(),
    }
}

fn word64(order: ByteOrder, v: u64) -> [u8; 8] {
    match order {
        ByteOrder::Little => v.to_le_bytes(),
        ByteOrder::Big => v.to_be_bytes(),
    }
}

struct Node {
    name: String,
    object_type: u8,
    data: Vec<u8>,
    created: u64,
}

pub struct Builder {
    order: ByteOrder,
    version: u16,
    cutoff: u32,
    nodes: Vec<Node>,
}

/// A written container plus the layout facts tests need to corrupt it.
pub struct Container {
    pub bytes: Vec<u8>,
    pub order: ByteOrder,
    pub sector_size: usize,
    pub fat_sectors: Vec<u32>,
    pub directory_start: u32,
    pub mini_fat_start: u32,
    pub root_start: u32,
    pub starts: HashMap<String, u32>,
}

struct Sectors {
    size: usize,
    data: Vec<Vec<u8>>,
    fat: Vec<u32>,
}

impl Sectors {
    fn alloc(&mut self, bytes: &[u8]) -> u32 {
        if bytes.is_empty() {
            return END_OF_CHAIN;
        }
        let start = self.data.len() as u32;
        let count = bytes.len().div_ceil(self.size);
        for (i, chunk) in bytes.chunks(self.size).enumerate() {
            let mut sector = chunk.to_vec();
            sector.resize(self.size, 0);
            self.data.push(sector);
            self.fat.push(if i + 1 == count { END_OF_CHAIN } else { start + i as u32 + 1 });
        }
        start
    }
}

impl Builder {
    pub fn new(order: ByteOrder, version: u16) -> Self {
        Self { order, version, cutoff: 4096, nodes: vec![] }
    }

    pub fn stream(mut self, name: &str, data: Vec<u8>) -> Self {
        self.nodes.push(Node { name: name.to_string(), object_type: 2, data, created: 0 });
        self
    }

    pub fn storage(mut self, name: &str, created: u64) -> Self {
        self.nodes.push(Node { name: name.to_string(), object_type: 1, data: vec![], created });
        self
    }

    fn sector_size(&self) -> usize {
        if self.version == 4 { 4096 } else { 512 }
    }

    pub fn build(&self) -> Container {
        let order = self.order;
        let size = self.sector_size();
        let mut sectors = Sectors { size, data: vec![], fat: vec![] };
        let mut starts = HashMap::new();

        let mut mini_stream = Vec::new();
        let mut mini_fat: Vec<u32> = Vec::new();
        let mut node_starts = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let start = if node.object_type != 2 {
                0
            } else if node.data.is_empty() {
                END_OF_CHAIN
            } else if node.data.len() < self.cutoff as usize {
                let start = mini_fat.len() as u32;
                let count = node.data.len().div_ceil(MINI_SECTOR_SIZE);
                for i in 0..count {
                    mini_fat.push(if i + 1 == count { END_OF_CHAIN } else { start + i as u32 + 1 });
                }
                mini_stream.extend_from_slice(&node.data);
                mini_stream.resize(mini_fat.len() * MINI_SECTOR_SIZE, 0);
                start
            } else {
                sectors.alloc(&node.data)
            };
            starts.entry(node.name.clone()).or_insert(start);
            node_starts.push(start);
        }

        let root_start = sectors.alloc(&mini_stream);

        let mini_fat_sectors = mini_fat.len().div_ceil(size / 4);
        let mut mini_fat_bytes = Vec::new();
        for i in 0..mini_fat_sectors * size / 4 {
            mini_fat_bytes.extend_from_slice(&word32(order, mini_fat.get(i).copied().unwrap_or(FREE_SECT)));
        }
        let mini_fat_start = sectors.alloc(&mini_fat_bytes);

        let per_sector = size / ENTRY_SIZE;
        let records = (self.nodes.len() + 1).div_ceil(per_sector) * per_sector;
        let mut directory = Vec::with_capacity(records * ENTRY_SIZE);
        let child = if self.nodes.is_empty() { NO_STREAM } else { 1 };
        directory.extend(self.record("Root Entry", 5, NO_STREAM, child, root_start, mini_stream.len() as u64, 0));
        for (i, node) in self.nodes.iter().enumerate() {
            let right = if i + 1 < self.nodes.len() { i as u32 + 2 } else { NO_STREAM };
            directory.extend(self.record(&node.name, node.object_type, right, NO_STREAM, node_starts[i], node.data.len() as u64, node.created));
        }
        while directory.len() < records * ENTRY_SIZE {
            directory.extend(self.record("", 0, NO_STREAM, NO_STREAM, 0, 0, 0));
        }
        let directory_start = sectors.alloc(&directory);
        let directory_sectors = (directory.len() / size) as u32;

        let used = sectors.data.len();
        let mut fat_count = 1;
        while used + fat_count > fat_count * size / 4 {
            fat_count += 1;
        }
        assert!(fat_count <= 109, "test containers keep every FAT sector in the header");
        let fat_sectors: Vec<u32> = (used..used + fat_count).map(|i| i as u32).collect();
        let mut fat = sectors.fat.clone();
        fat.extend(std::iter::repeat(FAT_SECT).take(fat_count));
        fat.resize(fat_count * size / 4, FREE_SECT);
        for chunk in fat.chunks(size / 4) {
            let sector: Vec<u8> = chunk.iter().flat_map(|v| word32(order, *v)).collect();
            sectors.data.push(sector);
        }

        let mut bytes = vec![0u8; size.max(512)];
        bytes[..8].copy_from_slice(&SIGNATURE);
        let put16 = |bytes: &mut Vec<u8>, at: usize, v: u16| bytes[at..at + 2].copy_from_slice(&word16(order, v));
        put16(&mut bytes, 24, 0x003E);
        put16(&mut bytes, 26, self.version);
        put16(&mut bytes, 28, 0xFFFE);
        put16(&mut bytes, 30, if self.version == 4 { 12 } else { 9 });
        put16(&mut bytes, 32, 6);
        let put32 = |bytes: &mut Vec<u8>, at: usize, v: u32| bytes[at..at + 4].copy_from_slice(&word32(order, v));
        put32(&mut bytes, 40, if self.version == 4 { directory_sectors } else { 0 });
        put32(&mut bytes, 44, fat_count as u32);
        put32(&mut bytes, 48, directory_start);
        put32(&mut bytes, 56, self.cutoff);
        put32(&mut bytes, 60, mini_fat_start);
        put32(&mut bytes, 64, mini_fat_sectors as u32);
        put32(&mut bytes, 68, END_OF_CHAIN);
        put32(&mut bytes, 72, 0);
        for i in 0..109 {
            put32(&mut bytes, 76 + i * 4, fat_sectors.get(i).copied().unwrap_or(FREE_SECT));
        }
        for sector in &sectors.data {
            bytes.extend_from_slice(sector);
        }

        Container { bytes, order, sector_size: size, fat_sectors, directory_start, mini_fat_start, root_start, starts }
    }

    #[allow(clippy::too_many_arguments)]
    fn record(&self, name: &str, object_type: u8, right: u32, child: u32, start: u32, size: u64, created: u64) -> Vec<u8> {
        let order = self.order;
        let mut buf = vec![0u8; ENTRY_SIZE];
        if !name.is_empty() {
            let units: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
            for (i, unit) in units.iter().enumerate() {
                buf[i * 2..i * 2 + 2].copy_from_slice(&word16(order, *unit));
            }
            buf[64..66].copy_from_slice(&word16(order, (units.len() * 2) as u16));
        }
        buf[66] = object_type;
        buf[67] = 1;
        buf[68..72].copy_from_slice(&word32(order, NO_STREAM));
        buf[72..76].copy_from_slice(&word32(order, right));
        buf[76..80].copy_from_slice(&word32(order, child));
        buf[100..108].copy_from_slice(&word64(order, created));
        buf[116..120].copy_from_slice(&word32(order, start));
        buf[120..128].copy_from_slice(&word64(order, size));
        buf
    }
}

impl Container {
    pub fn cursor(&self) -> Cursor<Vec<u8>> {
        Cursor::new(self.bytes.clone())
    }

    pub fn sector_offset(&self, index: u32) -> usize {
        self.sector_size.max(512) + index as usize * self.sector_size
    }

    pub fn put32(&mut self, at: usize, v: u32) {
        let bytes = word32(self.order, v);
        self.bytes[at..at + 4].copy_from_slice(&bytes);
    }

    /// Rewrites the start sector of the directory record with stream ID `id`.
    pub fn set_entry_start(&mut self, id: u32, value: u32) {
        let at = self.sector_offset(self.directory_start) + id as usize * ENTRY_SIZE + 116;
        self.put32(at, value);
    }

    /// Rewrites the FAT entry describing `sector`.
    pub fn set_fat_entry(&mut self, sector: u32, value: u32) {
        let per_sector = (self.sector_size / 4) as u32;
        let fat_sector = self.fat_sectors[(sector / per_sector) as usize];
        let at = self.sector_offset(fat_sector) + (sector % per_sector) as usize * 4;
        self.put32(at, value);
    }
}
