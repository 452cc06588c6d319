use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

pub const PHOTOS_DIR: &str = "Photos";

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogedPhoto {
    pub source: PathBuf,
    /// Path of the photo inside the KMZ, e.g. "Photos/IMG_0001.jpg".
    pub archive_path: String,
}

/// Last path component of a photo reference. Both forward and back slashes separate components, so
/// Windows paths stored in attribute tables work on any platform.
pub fn filename_from_path(raw_path: &str) -> Option<String> {
    raw_path
        .trim()
        .replace('\\', "/")
        .rsplit('/')
        .next()
        .map(str::trim)
        .filter(|filename| !filename.is_empty() && *filename != "." && *filename != "..")
        .map(str::to_string)
}

/// Collects the photos referenced by features and assigns each distinct source file a unique name
/// under `Photos/`.
///
/// Photos sharing a file name but coming from different files are renamed by appending a counter
/// to the file stem: `a.jpg`, `a_1.jpg`, `a_2.jpg`. Names are compared case-insensitively because
/// KMZ files get extracted on case-insensitive filesystems as well.
#[derive(Debug, Default)]
pub struct PhotoCatalog {
    base_dir: Option<PathBuf>,
    archive_path_by_source: HashMap<PathBuf, String>,
    used_names: HashSet<String>,
    photos: Vec<CatalogedPhoto>,
}

impl PhotoCatalog {
    /// # Arguments
    /// * base_dir - directory that relative photo paths are resolved against. The current working
    ///     directory if `None`.
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self {
            base_dir,
            ..Default::default()
        }
    }

    /// Add the photo referenced by an attribute value.
    ///
    /// # Returns
    /// The path inside the archive for referencing the photo, or `None` if the value is blank or does
    /// not point to a readable file.
    pub fn register(&mut self, raw_path: &str) -> Option<String> {
        let raw_path = raw_path.trim();
        if raw_path.is_empty() {
            return None;
        }
        let filename = filename_from_path(raw_path)?;
        let source = match self.resolve(raw_path) {
            Some(source) => source,
            None => {
                log::warn!("Photo not found or not readable: {}", raw_path);
                return None;
            }
        };

        let key = fs::canonicalize(&source).unwrap_or_else(|_| source.clone());
        if let Some(archive_path) = self.archive_path_by_source.get(&key) {
            return Some(archive_path.clone());
        }

        let unique_name = self.unique_name(&filename);
        if unique_name != filename {
            log::info!(
                "Photo name {} is already taken, storing {:?} as {}",
                filename,
                source,
                unique_name
            );
        }
        let archive_path = format!("{}/{}", PHOTOS_DIR, unique_name);
        self.archive_path_by_source.insert(key, archive_path.clone());
        self.photos.push(CatalogedPhoto {
            source,
            archive_path: archive_path.clone(),
        });
        Some(archive_path)
    }

    pub fn photos(&self) -> &[CatalogedPhoto] {
        &self.photos
    }

    fn resolve(&self, raw_path: &str) -> Option<PathBuf> {
        let mut candidates = vec![PathBuf::from(raw_path)];
        if raw_path.contains('\\') {
            candidates.push(PathBuf::from(raw_path.replace('\\', "/")));
        }
        candidates
            .into_iter()
            .map(|candidate| match &self.base_dir {
                Some(base_dir) if candidate.is_relative() => base_dir.join(candidate),
                _ => candidate,
            })
            .find(|candidate| is_readable_file(candidate))
    }

    fn unique_name(&mut self, filename: &str) -> String {
        let (stem, extension) = match filename.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
            _ => (filename, None),
        };
        let mut candidate = filename.to_string();
        let mut counter = 0;
        while self.used_names.contains(&candidate.to_lowercase()) {
            counter += 1;
            candidate = match extension {
                Some(extension) => format!("{}_{}.{}", stem, counter, extension),
                None => format!("{}_{}", stem, counter),
            };
        }
        self.used_names.insert(candidate.to_lowercase());
        candidate
    }
}

fn is_readable_file(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => fs::File::open(path).is_ok(),
        _ => false,
    }
}
