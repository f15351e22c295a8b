//! OLE Compound File Binary (CFB) reader.
//! Legacy Office documents (.xls, .doc, encrypted OOXML) are all CFB containers;
//! the stream names tell them apart.

use crate::error::RustyRecordError;
use crate::helpers::bytes::to_u16;
use crate::helpers::bytes::to_u64;
use crate::helpers::bytes::to_usize;
use crate::helpers::bytes::to_usize_iter;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use thiserror::Error;

/// Sector ids at or above this value are markers (free, end of chain, FAT, DIFAT).
const MAX_REG_SECT: usize = 0xFFFF_FFFB;

/// Compound file signature, stored little-endian in the first 8 bytes.
const SIGNATURE: u64 = 0xE11A_B1A1_E011_CFD0;

/// Streams smaller than this live in the mini stream.
const MINI_STREAM_CUTOFF: usize = 4096;

const HEADER_SIZE: usize = 512;
const DIRECTORY_ENTRY_SIZE: usize = 128;
const MINI_SECTOR_SIZE: usize = 64;

/// Errors specific to Compound File Binary format parsing
#[derive(Error, Debug)]
pub enum CfbError {
    #[error("The file is corrupted or has an invalid CFB structure")]
    FileFormatError,

    #[error("Invalid OLE signature (not an office document?)")]
    OleSignatureError,

    #[error("Invalid sector size '2 ^ {1}' for major version '{0}'")]
    SectorSizeError(u16, u16),

    #[error("Sector '{0}' is out of bounds")]
    SectorOutOfBoundsError(usize),

    #[error("The number of file allocation table sectors mismatch: expect '{0}', actual '{1}'")]
    FileAllocationTableError(usize, usize),

    #[error("Empty root directory")]
    RootDirectoryError,
}

/// Returns true when the bytes start with the compound file signature.
pub(crate) fn is_compound_file(data: &[u8]) -> bool {
    data.len() >= 8 && to_u64(&data[..8]) == SIGNATURE
}

/// A parsed compound file: directory index plus both allocation tables.
pub(crate) struct Cfb {
    /// Stream name to directory entry
    directories: HashMap<String, Directory>,
    /// File allocation table for regular sectors
    file_allocation_table: Vec<usize>,
    sectors: Sectors,
    /// Mini file allocation table for streams below the cutoff
    mini_file_allocation_table: Vec<usize>,
    mini_sectors: Sectors,
}

impl Cfb {
    /// Parses a compound file held entirely in memory.
    pub(crate) fn new(data: &[u8]) -> Result<Cfb, RustyRecordError> {
        if data.len() < HEADER_SIZE {
            Err(CfbError::FileFormatError)?;
        }
        let header = Header::new(&data[..HEADER_SIZE])?;
        let sectors = Sectors {
            data: data.to_vec(),
            size: header.sector_size()?,
        };
        let file_allocation_table = Self::load_file_allocation_table(&sectors, &header)?;
        let directories = Self::load_directories(&file_allocation_table, &sectors, header.directory_start)?;
        let mini_file_allocation_table = if header.mini_file_allocation_table_count > 0 {
            let bytes = Self::read_chain(&file_allocation_table, &sectors, header.mini_file_allocation_table_start)?;
            to_usize_iter(&bytes).collect()
        } else {
            Vec::new()
        };
        let mini_sectors = match directories.get("Root Entry") {
            Some(root) => {
                let mut data = Self::read_chain(&file_allocation_table, &sectors, root.start)?;
                data.truncate(root.size);
                Sectors { data, size: MINI_SECTOR_SIZE }
            }
            None => Sectors { data: Vec::new(), size: MINI_SECTOR_SIZE },
        };

        Ok(Cfb {
            directories,
            file_allocation_table,
            sectors,
            mini_file_allocation_table,
            mini_sectors,
        })
    }

    /// Checks if a stream exists
    pub(crate) fn exists(&self, name: &str) -> bool {
        self.directories.contains_key(name)
    }

    /// Reads the full content of a stream, or None when it does not exist.
    pub(crate) fn read(&self, name: &str) -> Result<Option<Vec<u8>>, RustyRecordError> {
        let Some(directory) = self.directories.get(name) else {
            return Ok(None);
        };
        let mut bytes = if directory.size < MINI_STREAM_CUTOFF {
            Self::read_mini_chain(&self.mini_file_allocation_table, &self.mini_sectors, directory.start)?
        } else {
            Self::read_chain(&self.file_allocation_table, &self.sectors, directory.start)?
        };
        bytes.truncate(directory.size);
        Ok(Some(bytes))
    }

    /// Collects the FAT from the sector ids listed in the header and the DIFAT chain.
    fn load_file_allocation_table(sectors: &Sectors, header: &Header) -> Result<Vec<usize>, RustyRecordError> {
        let mut fat_sectors: Vec<usize> = to_usize_iter(&sectors.data[76..HEADER_SIZE]).collect();
        let mut index = header.double_indirect_start;
        let mut visited = 0usize;
        while index < MAX_REG_SECT && visited < header.double_indirect_count {
            let mut entries: Vec<usize> = to_usize_iter(sectors.get(index)?).collect();
            index = entries.pop().ok_or(CfbError::FileFormatError)?;
            fat_sectors.extend(entries);
            visited += 1;
        }

        let mut file_allocation_table = Vec::new();
        let mut count = 0usize;
        for index in fat_sectors.into_iter().filter(|index| *index < MAX_REG_SECT) {
            file_allocation_table.extend(to_usize_iter(sectors.get(index)?));
            count += 1;
        }
        if count != header.file_allocation_table_count {
            Err(CfbError::FileAllocationTableError(header.file_allocation_table_count, count))?
        }
        Ok(file_allocation_table)
    }

    fn load_directories(file_allocation_table: &[usize], sectors: &Sectors, start: usize) -> Result<HashMap<String, Directory>, RustyRecordError> {
        let bytes = Self::read_chain(file_allocation_table, sectors, start)?;
        let directories: HashMap<String, Directory> = bytes
            .chunks_exact(DIRECTORY_ENTRY_SIZE)
            .filter_map(Directory::new)
            .collect();
        if directories.is_empty() {
            Err(CfbError::RootDirectoryError)?
        }
        Ok(directories)
    }

    /// Follows a sector chain through the FAT.
    fn read_chain(file_allocation_table: &[usize], sectors: &Sectors, start: usize) -> Result<Vec<u8>, RustyRecordError> {
        let mut content = Vec::new();
        let mut index = start;
        let mut remaining = file_allocation_table.len() + 1;
        while index < MAX_REG_SECT {
            if remaining == 0 {
                Err(CfbError::FileFormatError)? // cyclic chain
            }
            remaining -= 1;
            content.extend_from_slice(sectors.get(index)?);
            index = *file_allocation_table.get(index).ok_or(CfbError::SectorOutOfBoundsError(index))?;
        }
        Ok(content)
    }

    /// Follows a mini sector chain; mini sectors have no header offset.
    fn read_mini_chain(mini_file_allocation_table: &[usize], mini_sectors: &Sectors, start: usize) -> Result<Vec<u8>, RustyRecordError> {
        let mut content = Vec::new();
        let mut index = start;
        let mut remaining = mini_file_allocation_table.len() + 1;
        while index < MAX_REG_SECT {
            if remaining == 0 {
                Err(CfbError::FileFormatError)?
            }
            remaining -= 1;
            let lower = index * mini_sectors.size;
            let upper = mini_sectors.data.len().min(lower + mini_sectors.size);
            if lower >= upper {
                Err(CfbError::SectorOutOfBoundsError(index))?
            }
            content.extend_from_slice(&mini_sectors.data[lower..upper]);
            index = *mini_file_allocation_table.get(index).ok_or(CfbError::SectorOutOfBoundsError(index))?;
        }
        Ok(content)
    }
}

struct Sectors {
    data: Vec<u8>,
    size: usize,
}

impl Sectors {
    /// Regular sector `index`; sector 0 starts right after the 512-byte header.
    fn get(&self, index: usize) -> Result<&[u8], CfbError> {
        let lower = (index + 1) * self.size;
        let upper = self.data.len().min(lower + self.size);
        if lower < upper {
            Ok(&self.data[lower..upper])
        } else {
            Err(CfbError::SectorOutOfBoundsError(index))
        }
    }
}

struct Header {
    major_version: u16,
    sector_shift: u16,
    file_allocation_table_count: usize,
    directory_start: usize,
    mini_file_allocation_table_start: usize,
    mini_file_allocation_table_count: usize,
    double_indirect_start: usize,
    double_indirect_count: usize,
}

impl Header {
    fn new(data: &[u8]) -> Result<Self, RustyRecordError> {
        if !is_compound_file(data) {
            Err(CfbError::OleSignatureError)?;
        }
        Ok(Header {
            major_version: to_u16(&data[26..28]),
            sector_shift: to_u16(&data[30..32]),
            file_allocation_table_count: to_usize(&data[44..48]),
            directory_start: to_usize(&data[48..52]),
            mini_file_allocation_table_start: to_usize(&data[60..64]),
            mini_file_allocation_table_count: to_usize(&data[64..68]),
            double_indirect_start: to_usize(&data[68..72]),
            double_indirect_count: to_usize(&data[72..76]),
        })
    }

    fn sector_size(&self) -> Result<usize, CfbError> {
        match (self.major_version, self.sector_shift) {
            (3, 0x0009) => Ok(512),
            // Version 4 pads the header up to a full 4096-byte sector.
            (4, 0x000C) => Ok(4096),
            (version, shift) => Err(CfbError::SectorSizeError(version, shift)),
        }
    }
}

struct Directory {
    start: usize,
    size: usize,
}

impl Directory {
    /// Decodes one 128-byte directory entry; unused entries yield None.
    fn new(bytes: &[u8]) -> Option<(String, Directory)> {
        let length = (to_u16(&bytes[64..66]) as usize).min(64);
        let (name, _, _) = UTF_16LE.decode(&bytes[..length]);
        let name = name.trim_end_matches('\0').to_owned();
        if name.is_empty() {
            return None;
        }
        let start = to_usize(&bytes[116..120]);
        let size = to_u64(&bytes[120..128]) as usize;
        Some((name, Directory { start, size }))
    }
}
