use std::io::{Cursor, Read, Seek, Write};

use anyhow::Context;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::ImportError;

/// Largest decompressed size accepted for a single part.
pub const MAX_PART_BYTES: u64 = 32 * 1024 * 1024;
/// Largest decompressed size accepted for all parts together.
pub const MAX_PACKAGE_BYTES: u64 = 128 * 1024 * 1024;

/// Decompression caps. Sizes declared inside the archive are never trusted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackageLimits {
    pub max_part_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for PackageLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: MAX_PART_BYTES,
            max_total_bytes: MAX_PACKAGE_BYTES,
        }
    }
}

/// The parts of an `.xlsx` archive, fully read into memory.
pub struct WorkbookPackage {
    pub entries: Vec<WorkbookEntry>,
}

pub struct WorkbookEntry {
    pub name: String,
    pub data: Vec<u8>,
}

impl WorkbookPackage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImportError> {
        Self::from_bytes_with_limits(bytes, PackageLimits::default())
    }

    pub fn from_bytes_with_limits(bytes: &[u8], limits: PackageLimits) -> Result<Self, ImportError> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::new();
        let mut total = 0u64;
        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let budget = limits
                .max_part_bytes
                .min(limits.max_total_bytes.saturating_sub(total));
            let mut data = Vec::new();
            (&mut file)
                .take(budget.saturating_add(1))
                .read_to_end(&mut data)
                .map_err(|source| ImportError::Io {
                    path: name.clone().into(),
                    source,
                })?;
            if data.len() as u64 > budget {
                return Err(ImportError::TooLarge {
                    part: name,
                    limit: budget,
                });
            }
            total += data.len() as u64;
            entries.push(WorkbookEntry { name, data });
        }
        Ok(Self { entries })
    }

    /// Looks a part up by name. Leading slashes and ASCII case are ignored, matching how
    /// package relationships are resolved.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        let wanted = name.trim_start_matches('/');
        self.entries
            .iter()
            .find(|e| e.name.trim_start_matches('/').eq_ignore_ascii_case(wanted))
            .map(|e| e.data.as_slice())
    }

    pub fn require(&self, name: &str) -> Result<&[u8], ImportError> {
        self.part(name)
            .ok_or_else(|| ImportError::MissingPart(name.to_string()))
    }
}

/// Writes `parts` as a deflated zip archive, in order.
pub fn write_package<W: Write + Seek>(out: W, parts: &[(String, Vec<u8>)]) -> anyhow::Result<W> {
    let mut zout = ZipWriter::new(out);
    let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in parts {
        zout.start_file(name.as_str(), opts)
            .with_context(|| format!("start zip file: {name}"))?;
        zout.write_all(data)
            .with_context(|| format!("write zip file: {name}"))?;
    }
    zout.finish().context("finish zip")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_parts_read_back_by_relationship_style_names() {
        let parts = vec![
            ("[Content_Types].xml".to_string(), b"<Types/>".to_vec()),
            ("xl/workbook.xml".to_string(), b"<workbook/>".to_vec()),
        ];
        let bytes = write_package(Cursor::new(Vec::new()), &parts)
            .expect("write")
            .into_inner();

        let pkg = WorkbookPackage::from_bytes(&bytes).expect("read");
        assert_eq!(pkg.entries.len(), 2);
        assert_eq!(pkg.part("/xl/workbook.xml"), Some(&b"<workbook/>"[..]));
        assert_eq!(pkg.part("XL/Workbook.xml"), Some(&b"<workbook/>"[..]));
        assert!(matches!(
            pkg.require("xl/sharedStrings.xml"),
            Err(ImportError::MissingPart(_))
        ));
    }

    fn limits(part: u64, total: u64) -> PackageLimits {
        PackageLimits {
            max_part_bytes: part,
            max_total_bytes: total,
        }
    }

    #[test]
    fn oversized_parts_and_packages_are_rejected() {
        let parts = vec![
            ("a.xml".to_string(), vec![b'a'; 600]),
            ("b.xml".to_string(), vec![b'b'; 600]),
        ];
        let bytes = write_package(Cursor::new(Vec::new()), &parts)
            .expect("write")
            .into_inner();

        assert!(WorkbookPackage::from_bytes_with_limits(&bytes, limits(600, 1200)).is_ok());
        assert!(matches!(
            WorkbookPackage::from_bytes_with_limits(&bytes, limits(599, 10_000)),
            Err(ImportError::TooLarge { part, limit: 599 }) if part == "a.xml"
        ));
        assert!(matches!(
            WorkbookPackage::from_bytes_with_limits(&bytes, limits(1000, 1000)),
            Err(ImportError::TooLarge { part, limit: 400 }) if part == "b.xml"
        ));
    }

    /// One empty stored entry whose central directory claims a 2^62 byte zip64 size.
    fn forged_size_archive() -> Vec<u8> {
        let name = b"xl/workbook.xml";
        let name_len = (name.len() as u16).to_le_bytes();
        let mut out = Vec::new();

        out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        out.extend_from_slice(&45u16.to_le_bytes());
        out.extend_from_slice(&[0; 4]); // flags, method (stored)
        out.extend_from_slice(&[0; 4]); // time, date
        out.extend_from_slice(&[0; 12]); // crc, sizes
        out.extend_from_slice(&name_len);
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name);
        let central_offset = out.len() as u32;

        out.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
        out.extend_from_slice(&45u16.to_le_bytes());
        out.extend_from_slice(&45u16.to_le_bytes());
        out.extend_from_slice(&[0; 8]); // flags, method, time, date
        out.extend_from_slice(&[0; 4]); // crc
        out.extend_from_slice(&0u32.to_le_bytes()); // compressed size
        out.extend_from_slice(&u32::MAX.to_le_bytes()); // uncompressed size: see zip64 extra
        out.extend_from_slice(&name_len);
        out.extend_from_slice(&12u16.to_le_bytes());
        out.extend_from_slice(&[0; 8]); // comment len, disk, internal attrs
        out.extend_from_slice(&[0; 4]); // external attrs
        out.extend_from_slice(&0u32.to_le_bytes()); // local header offset
        out.extend_from_slice(name);
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&8u16.to_le_bytes());
        out.extend_from_slice(&(1u64 << 62).to_le_bytes());
        let central_len = out.len() as u32 - central_offset;

        out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
        out.extend_from_slice(&[0; 4]); // disk numbers
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&central_len.to_le_bytes());
        out.extend_from_slice(&central_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    #[test]
    fn declared_sizes_do_not_drive_allocation() {
        // Either the entry reads as empty or the archive is refused; both are plain errors here.
        let result = crate::import::import_workbook_bytes(&forged_size_archive());
        assert!(result.is_err());
    }

    #[test]
    fn non_zip_bytes_are_an_archive_error() {
        let err = WorkbookPackage::from_bytes(b"Content Group,Topic\n")
            .err()
            .expect("not a zip");
        assert!(matches!(err, ImportError::Archive(_)));
    }
}
