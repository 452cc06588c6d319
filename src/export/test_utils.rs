use std::{fs::File, io::Read, path::Path};

use crate::kmz::archive::DOCUMENT_ENTRY;

pub fn entry_names(kmz_path: &Path) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(File::open(kmz_path).unwrap()).unwrap();
    (0..archive.len())
        .map(|index| archive.by_index(index).unwrap().name().to_string())
        .filter(|name| !name.ends_with('/'))
        .collect()
}

pub fn read_entry(kmz_path: &Path, entry_name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(File::open(kmz_path).unwrap()).unwrap();
    let mut content = Vec::new();
    archive
        .by_name(entry_name)
        .unwrap()
        .read_to_end(&mut content)
        .unwrap();
    content
}

pub fn read_kml(kmz_path: &Path) -> String {
    String::from_utf8(read_entry(kmz_path, DOCUMENT_ENTRY)).unwrap()
}
