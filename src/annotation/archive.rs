use std::io::{Cursor, Read};

use log::debug;
use zip::ZipArchive;

use crate::error::IngestError;

/// Conventional name of the primary document inside a KMZ.
pub const PRIMARY_DOCUMENT: &str = "doc.kml";
pub const MARKUP_EXTENSION: &str = ".kml";
/// Most we reserve up front for an entry; the header's size is not trusted.
const MAX_PREALLOCATION: usize = 1 << 20;

pub struct AnnotationArchive {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl AnnotationArchive {
    pub fn open(bytes: Vec<u8>) -> Result<Self, IngestError> {
        let archive = ZipArchive::new(Cursor::new(bytes))?;
        debug!("Opened annotation archive with {} entries", archive.len());
        Ok(Self { archive })
    }

    pub fn entry_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_owned).collect()
    }

    /// `doc.kml` wins if present, otherwise the first `.kml` entry in
    /// archive order.
    pub fn locate_markup_document(&self) -> Result<String, IngestError> {
        let names: Vec<&str> = (0..self.archive.len())
            .filter_map(|index| self.archive.name_for_index(index))
            .collect();

        let is_primary = |name: &str| {
            name.rsplit('/')
                .next()
                .is_some_and(|file| file.eq_ignore_ascii_case(PRIMARY_DOCUMENT))
        };
        let is_markup = |name: &str| name.to_ascii_lowercase().ends_with(MARKUP_EXTENSION);

        names
            .iter()
            .find(|name| is_primary(name))
            .or_else(|| names.iter().find(|name| is_markup(name)))
            .map(|name| name.to_string())
            .ok_or(IngestError::NoMarkupDocument)
    }

    pub fn read_text(&mut self, name: &str) -> Result<String, IngestError> {
        let entry = self.archive.by_name(name)?;
        let declared = entry.size();
        let bytes = read_entry(entry, declared).map_err(|e| IngestError::Archive(zip::result::ZipError::Io(e)))?;
        String::from_utf8(bytes).map_err(|e| IngestError::Parse(format!("{name} is not UTF-8: {e}")))
    }
}

fn read_entry(mut reader: impl Read, declared: u64) -> std::io::Result<Vec<u8>> {
    let reserve = usize::try_from(declared).unwrap_or(usize::MAX).min(MAX_PREALLOCATION);
    let mut bytes = Vec::with_capacity(reserve);
    reader.read_to_end(&mut bytes)?;
    Ok(bytes)
}


#[cfg(test)]
mod tests {
    use super::fixtures::zip_bytes;
    use super::*;

    #[test]
    fn prefers_primary_document() {
        let archive = AnnotationArchive::open(zip_bytes(&[
            ("files/overlay.kml", "<kml/>"),
            ("doc.kml", "<kml/>"),
        ]))
        .unwrap();
        assert_eq!(archive.locate_markup_document().unwrap(), "doc.kml");
    }

    #[test]
    fn falls_back_to_first_kml_entry() {
        let archive = AnnotationArchive::open(zip_bytes(&[
            ("images/icon.png", "png"),
            ("sketch.KML", "<kml/>"),
            ("other.kml", "<kml/>"),
        ]))
        .unwrap();
        assert_eq!(archive.locate_markup_document().unwrap(), "sketch.KML");
    }

    #[test]
    fn no_kml_entry_is_reported() {
        let archive = AnnotationArchive::open(zip_bytes(&[("readme.txt", "hello")])).unwrap();
        assert!(matches!(
            archive.locate_markup_document(),
            Err(IngestError::NoMarkupDocument)
        ));
    }

    #[test]
    fn garbage_bytes_are_an_archive_error() {
        assert!(matches!(
            AnnotationArchive::open(b"definitely not a zip".to_vec()),
            Err(IngestError::Archive(_))
        ));
    }

    #[test]
    fn reads_entry_text() {
        let mut archive = AnnotationArchive::open(zip_bytes(&[("doc.kml", "<kml>ok</kml>")])).unwrap();
        assert_eq!(archive.read_text("doc.kml").unwrap(), "<kml>ok</kml>");
    }

    #[test]
    fn oversized_declared_length_is_not_reserved() {
        let bytes = read_entry(&b"<kml/>"[..], u64::MAX).unwrap();
        assert_eq!(bytes, b"<kml/>");
        assert!(bytes.capacity() <= MAX_PREALLOCATION);
    }
}
