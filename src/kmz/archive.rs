use anyhow::{anyhow, Context};
use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use zip::{write::SimpleFileOptions, ZipWriter};

use crate::export::error::ExportError;

pub const DOCUMENT_ENTRY: &str = "doc.kml";

/// A KMZ file being written. Entries go to a temporary file next to the destination, which only
/// replaces the destination in `finish`. Dropping the archive without finishing removes the
/// temporary file and leaves any existing destination file untouched.
pub struct KmzArchive {
    zip: ZipWriter<NamedTempFile>,
    output_path: PathBuf,
    options: SimpleFileOptions,
    directories: Vec<String>,
    entry_count: usize,
}

pub fn validate_output_path(output_path: &Path) -> Result<(), ExportError> {
    match output_path.extension().and_then(|extension| extension.to_str()) {
        Some(extension) if extension.eq_ignore_ascii_case("kmz") => Ok(()),
        _ => Err(ExportError::InvalidOutputPath(output_path.to_path_buf())),
    }
}

impl KmzArchive {
    pub fn create(output_path: &Path) -> anyhow::Result<Self> {
        validate_output_path(output_path)?;
        let output_dir = match output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let existing_permissions = fs::metadata(output_path)
            .ok()
            .map(|metadata| metadata.permissions());
        let temp_file = new_temp_file(output_dir).with_context(|| {
            format!("Output directory {:?} is not writable", output_dir)
        })?;
        // A re-run keeps the mode of the file it replaces.
        if let Some(permissions) = existing_permissions {
            temp_file
                .as_file()
                .set_permissions(permissions)
                .with_context(|| format!("Setting permissions of {:?}", temp_file.path()))?;
        }
        log::debug!(
            "Writing KMZ for {:?} to temporary file {:?}",
            output_path,
            temp_file.path()
        );
        Ok(Self {
            zip: ZipWriter::new(temp_file),
            output_path: output_path.to_path_buf(),
            options: SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated),
            directories: Vec::new(),
            entry_count: 0,
        })
    }

    pub fn add_document(&mut self, kml: &str) -> anyhow::Result<()> {
        self.add_bytes(DOCUMENT_ENTRY, kml.as_bytes())
    }

    pub fn add_bytes(&mut self, entry_name: &str, content: &[u8]) -> anyhow::Result<()> {
        self.start_entry(entry_name)?;
        self.zip
            .write_all(content)
            .with_context(|| format!("Writing {} to KMZ", entry_name))?;
        Ok(())
    }

    /// Copy a file from disk into the archive.
    ///
    /// # Returns
    /// `false` if the source could not be read, in which case no entry is added. Errors are left for
    /// failures of the archive itself.
    pub fn add_file(&mut self, entry_name: &str, source: &Path) -> anyhow::Result<bool> {
        let mut file = match File::open(source) {
            Ok(file) => file,
            Err(err) => {
                log::warn!("Could not open {:?}, leaving out {}: {}", source, entry_name, err);
                return Ok(false);
            }
        };
        self.start_entry(entry_name)?;
        if let Err(err) = io::copy(&mut file, &mut self.zip) {
            log::warn!("Could not copy {:?}, leaving out {}: {}", source, entry_name, err);
            self.zip
                .abort_file()
                .with_context(|| format!("Removing partial entry {} from KMZ", entry_name))?;
            self.entry_count -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn start_entry(&mut self, entry_name: &str) -> anyhow::Result<()> {
        // Entry names come from user data (photo filenames), reject anything that could escape the
        // archive root when extracted.
        if entry_name.is_empty()
            || entry_name.starts_with('/')
            || entry_name.contains('\\')
            || entry_name.split('/').any(|part| part == ".." || part.is_empty())
        {
            return Err(anyhow!("Invalid KMZ entry name: {}", entry_name));
        }
        if let Some((directory, _)) = entry_name.rsplit_once('/') {
            let directory = format!("{}/", directory);
            if !self.directories.contains(&directory) {
                self.zip
                    .add_directory(directory.as_str(), self.options)
                    .with_context(|| format!("Adding directory {} to KMZ", directory))?;
                self.directories.push(directory);
            }
        }
        self.zip
            .start_file(entry_name, self.options)
            .with_context(|| format!("Adding {} to KMZ", entry_name))?;
        self.entry_count += 1;
        log::debug!("Added KMZ entry {}", entry_name);
        Ok(())
    }

    /// Number of file entries written so far, not counting directories.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Finish the zip and move it to the destination, replacing any previous file there.
    pub fn finish(self) -> anyhow::Result<PathBuf> {
        let temp_file = self.zip.finish().context("Finalizing KMZ archive")?;
        temp_file
            .persist(&self.output_path)
            .map_err(|err| err.error)
            .with_context(|| format!("Moving KMZ into place at {:?}", self.output_path))?;
        Ok(self.output_path)
    }
}

/// New temporary files are 0600, request 0666 so the umask applies as for any other new file.
fn new_temp_file(output_dir: &Path) -> io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".kmz").suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(output_dir)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use std::{fs, io::Read};
    use testdir::testdir;

    use super::{validate_output_path, KmzArchive};

    fn read_entry(path: &std::path::Path, entry_name: &str) -> String {
        let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
        let mut content = String::new();
        archive
            .by_name(entry_name)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        content
    }

    #[rstest]
    #[case("out.kmz", true)]
    #[case("dir/OUT.KMZ", true)]
    #[case("out.kml", false)]
    #[case("out", false)]
    fn test_validate_output_path(#[case] path: &str, #[case] valid: bool) {
        assert_eq!(validate_output_path(std::path::Path::new(path)).is_ok(), valid);
    }

    #[rstest]
    fn test_write_document_and_file() {
        let test_dir = testdir!();
        let photo_path = test_dir.join("a.jpg");
        fs::write(&photo_path, b"jpeg bytes").unwrap();
        let output_path = test_dir.join("out.kmz");

        let mut archive = KmzArchive::create(&output_path).unwrap();
        archive.add_document("<kml/>").unwrap();
        assert!(archive.add_file("Photos/a.jpg", &photo_path).unwrap());
        assert_eq!(archive.entry_count(), 2);
        archive.finish().unwrap();

        let zip_archive = zip::ZipArchive::new(fs::File::open(&output_path).unwrap()).unwrap();
        let names: Vec<&str> = zip_archive.file_names().collect();
        assert!(names.contains(&"doc.kml"));
        assert!(names.contains(&"Photos/"));
        assert!(names.contains(&"Photos/a.jpg"));
        assert_eq!(read_entry(&output_path, "doc.kml"), "<kml/>");
        assert_eq!(read_entry(&output_path, "Photos/a.jpg"), "jpeg bytes");
    }

    #[cfg(unix)]
    fn file_mode(path: &std::path::Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[cfg(unix)]
    #[rstest]
    fn test_new_kmz_gets_default_file_mode() {
        let test_dir = testdir!();
        let plain_path = test_dir.join("plain.txt");
        fs::write(&plain_path, b"x").unwrap();
        let output_path = test_dir.join("out.kmz");

        let mut archive = KmzArchive::create(&output_path).unwrap();
        archive.add_document("<kml/>").unwrap();
        archive.finish().unwrap();
        assert_eq!(file_mode(&output_path), file_mode(&plain_path));
    }

    #[cfg(unix)]
    #[rstest]
    fn test_rewritten_kmz_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;
        let test_dir = testdir!();
        let output_path = test_dir.join("out.kmz");
        fs::write(&output_path, b"previous").unwrap();
        fs::set_permissions(&output_path, fs::Permissions::from_mode(0o640)).unwrap();

        let mut archive = KmzArchive::create(&output_path).unwrap();
        archive.add_document("<kml/>").unwrap();
        archive.finish().unwrap();
        assert_eq!(file_mode(&output_path), 0o640);
        assert_eq!(read_entry(&output_path, "doc.kml"), "<kml/>");
    }

    #[rstest]
    fn test_unreadable_source_is_left_out() {
        let test_dir = testdir!();
        let output_path = test_dir.join("out.kmz");

        let mut archive = KmzArchive::create(&output_path).unwrap();
        archive.add_document("<kml/>").unwrap();
        assert!(!archive
            .add_file("Photos/gone.jpg", &test_dir.join("gone.jpg"))
            .unwrap());
        // Opens fine but every read fails.
        #[cfg(target_os = "linux")]
        assert!(!archive
            .add_file("Photos/mem.jpg", std::path::Path::new("/proc/self/mem"))
            .unwrap());
        assert_eq!(archive.entry_count(), 1);
        archive.finish().unwrap();

        let zip_archive = zip::ZipArchive::new(fs::File::open(&output_path).unwrap()).unwrap();
        let names: Vec<&str> = zip_archive.file_names().collect();
        assert!(names.contains(&"doc.kml"));
        assert!(!names.contains(&"Photos/gone.jpg"));
        assert!(!names.contains(&"Photos/mem.jpg"));
    }

    #[rstest]
    fn test_dropped_archive_leaves_existing_file() {
        let test_dir = testdir!();
        let output_path = test_dir.join("out.kmz");
        fs::write(&output_path, b"previous").unwrap();
        {
            let mut archive = KmzArchive::create(&output_path).unwrap();
            archive.add_document("<kml/>").unwrap();
        }
        assert_eq!(fs::read(&output_path).unwrap(), b"previous");
        // Only the previous file remains, the temporary file is gone.
        assert_eq!(fs::read_dir(&test_dir).unwrap().count(), 1);
    }

    #[rstest]
    #[case("../escape.jpg")]
    #[case("/abs.jpg")]
    #[case("Photos//a.jpg")]
    #[case("Photos\\a.jpg")]
    fn test_rejects_unsafe_entry_names(#[case] entry_name: &str) {
        let test_dir = testdir!();
        let mut archive = KmzArchive::create(&test_dir.join("out.kmz")).unwrap();
        assert!(archive.add_bytes(entry_name, b"x").is_err());
    }

    #[rstest]
    fn test_unwritable_directory_fails() {
        let test_dir = testdir!();
        assert!(KmzArchive::create(&test_dir.join("missing").join("out.kmz")).is_err());
    }
}
