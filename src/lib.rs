//! Read-only decoder for Compound File Binary (OLE2) containers.
//!
//! [`Ole::open`] parses the header, the DIFAT, the FAT, the mini FAT and the
//! directory of a container once; streams are then located by name and
//! reassembled from their sector chains.

pub mod chain;
pub mod common;
pub mod difat;
pub mod directory;
pub mod fat;
pub mod header;
pub mod mini_fat;
pub mod ole;
pub mod sector;

pub use common::{ByteOrder, MajorVersion, OleError, OleResult, SectorType};
pub use directory::{Color, Entry, ObjectType};
pub use header::Header;
pub use ole::{Ole, OleOptions};
