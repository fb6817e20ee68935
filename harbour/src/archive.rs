//! In-memory zip archive of per-library BibTeX files

use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Builds a zip archive entry by entry, entirely in memory
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    names: HashSet<String>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            names: HashSet::new(),
        }
    }

    /// Add `<library>.bib`; returns the entry name actually used
    pub fn add_library(&mut self, library_name: &str, contents: &str) -> zip::result::ZipResult<String> {
        let name = self.unique_name(&sanitize(library_name));

        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        self.writer.start_file(name.as_str(), options)?;
        self.writer.write_all(contents.as_bytes())?;

        Ok(name)
    }

    pub fn finish(mut self) -> zip::result::ZipResult<Vec<u8>> {
        Ok(self.writer.finish()?.into_inner())
    }

    fn unique_name(&mut self, base: &str) -> String {
        let mut candidate = format!("{}.bib", base);
        let mut n = 1;
        while self.names.contains(&candidate) {
            n += 1;
            candidate = format!("{} ({}).bib", base, n);
        }
        self.names.insert(candidate.clone());
        candidate
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Library names become flat entry names
fn sanitize(name: &str) -> String {
    let flat: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();

    if flat.trim().is_empty() {
        "library".to_string()
    } else {
        flat
    }
}

/// Download name for an export archive
pub fn archive_filename(email: &str, export_kind: &str) -> String {
    let local_part = email.split('@').next().unwrap_or_default();
    format!("{}_{}.zip", local_part, export_kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn test_entries_in_order_with_unique_names() {
        let mut builder = ArchiveBuilder::new();
        assert_eq!(builder.add_library("Stars", "a").unwrap(), "Stars.bib");
        assert_eq!(builder.add_library("a/b", "b").unwrap(), "a_b.bib");
        assert_eq!(builder.add_library("Stars", "c").unwrap(), "Stars (2).bib");
        let bytes = builder.finish().unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["Stars.bib", "a_b.bib", "Stars (2).bib"]);

        let mut contents = String::new();
        archive.by_name("Stars (2).bib").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "c");
    }

    #[test]
    fn test_archive_filename() {
        assert_eq!(archive_filename("user@ads.com", "zotero"), "user_zotero.zip");
        assert_eq!(archive_filename("plain", "zotero"), "plain_zotero.zip");
    }
}
