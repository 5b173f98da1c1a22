//! Media library: the file, album and directory records queue items are built from.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::audio::{CodecFactory, MetadataExtractor};
use crate::error::LibraryError;
use crate::models::{Album, Directory, LibraryFile};
use crate::queue::QueueItem;

/// Read-only source of library records
pub trait Library: Send + Sync {
    fn file(&self, id: i32) -> Result<Arc<LibraryFile>, LibraryError>;

    fn album(&self, id: i32) -> Result<Arc<Album>, LibraryError>;

    fn directory(&self, id: i32) -> Result<Arc<Directory>, LibraryError>;

    /// Files of an album in track order
    fn album_files(&self, id: i32) -> Result<Vec<Arc<LibraryFile>>, LibraryError>;

    /// Media files directly inside a directory, sorted by name
    fn directory_files(&self, id: i32) -> Result<Vec<Arc<LibraryFile>>, LibraryError>;

    fn file_item(&self, id: i32) -> Result<QueueItem, LibraryError> {
        Ok(QueueItem::track(self.file(id)?))
    }

    fn album_item(&self, id: i32) -> Result<QueueItem, LibraryError> {
        Ok(QueueItem::album(self.album(id)?, self.album_files(id)?))
    }

    fn directory_item(&self, id: i32) -> Result<QueueItem, LibraryError> {
        Ok(QueueItem::directory(self.directory(id)?, self.directory_files(id)?))
    }
}

/// In-memory library built by walking root directories
#[derive(Debug, Default)]
pub struct ScannedLibrary {
    files: BTreeMap<i32, Arc<LibraryFile>>,
    albums: BTreeMap<i32, Arc<Album>>,
    directories: BTreeMap<i32, Arc<Directory>>,
    album_files: HashMap<i32, Vec<i32>>,
    directory_files: HashMap<i32, Vec<i32>>,
    file_paths: HashMap<PathBuf, i32>,
    directory_paths: HashMap<PathBuf, i32>,
}

/// Records collected while walking, before albums are assigned
#[derive(Default)]
struct Scan {
    files: Vec<LibraryFile>,
    directories: Vec<Directory>,
}

impl ScannedLibrary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Walk every root recursively, recording the files `codecs` can play.
    ///
    /// An unreadable root is an error, unreadable subdirectories are skipped.
    /// Symbolic links to directories are not followed.
    pub fn scan(roots: &[PathBuf], codecs: &dyn CodecFactory) -> Result<Self, LibraryError> {
        let mut scan = Scan::default();

        for root in roots {
            let root = fs::canonicalize(root)?;
            info!("Scanning library root {}", root.display());
            scan.walk(&root, codecs, true)?;
        }

        let library = Self::build(scan.files, scan.directories);
        info!(
            "Library ready: {} files, {} albums, {} directories",
            library.files.len(),
            library.albums.len(),
            library.directories.len()
        );
        Ok(library)
    }

    /// Index collected records and group files into albums by their album tag
    fn build(files: Vec<LibraryFile>, directories: Vec<Directory>) -> Self {
        let mut library = Self::default();

        for directory in directories {
            library.directory_paths.insert(directory.path.clone(), directory.id);
            library.directory_files.entry(directory.id).or_default();
            library.directories.insert(directory.id, Arc::new(directory));
        }

        let mut album_ids: HashMap<String, i32> = HashMap::new();
        let mut albums: BTreeMap<i32, Album> = BTreeMap::new();

        for mut file in files {
            if let Some(name) = file.metadata.album.clone() {
                let next_id = album_ids.len() as i32 + 1;
                let id = *album_ids.entry(name.clone()).or_insert(next_id);
                let album = albums.entry(id).or_insert_with(|| Album::new(id, name));
                album.songs += 1;
                album.length += file.metadata.length;
                file.album_id = id;
                library.album_files.entry(id).or_default().push(file.id);
            }

            library
                .directory_files
                .entry(file.directory_id)
                .or_default()
                .push(file.id);
            library.file_paths.insert(file.full_path(), file.id);
            library.files.insert(file.id, Arc::new(file));
        }

        for (id, album) in albums {
            library.albums.insert(id, Arc::new(album));
        }

        let files = &library.files;
        for ids in library.album_files.values_mut() {
            ids.sort_by_key(|id| {
                files
                    .get(id)
                    .map(|f| (f.metadata.track_number.unwrap_or(u32::MAX), f.name.clone()))
            });
        }

        library
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn album_count(&self) -> usize {
        self.albums.len()
    }

    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    pub fn albums(&self) -> impl Iterator<Item = &Arc<Album>> {
        self.albums.values()
    }

    pub fn directories(&self) -> impl Iterator<Item = &Arc<Directory>> {
        self.directories.values()
    }

    /// Queue item for a scanned file or directory on disk
    pub fn item_for_path(&self, path: &Path) -> Result<QueueItem, LibraryError> {
        let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        if let Some(&id) = self.directory_paths.get(&resolved) {
            return self.directory_item(id);
        }
        if let Some(&id) = self.file_paths.get(&resolved) {
            return self.file_item(id);
        }

        let in_scanned_directory = resolved
            .parent()
            .map_or(false, |parent| self.directory_paths.contains_key(parent));
        if resolved.is_file() && in_scanned_directory {
            return Err(LibraryError::NotMediaFile {
                path: path.display().to_string(),
            });
        }

        Err(LibraryError::PathNotFound {
            path: path.display().to_string(),
        })
    }

    fn collect(&self, ids: &[i32]) -> Vec<Arc<LibraryFile>> {
        ids.iter().filter_map(|id| self.files.get(id)).cloned().collect()
    }
}

impl Library for ScannedLibrary {
    fn file(&self, id: i32) -> Result<Arc<LibraryFile>, LibraryError> {
        self.files
            .get(&id)
            .cloned()
            .ok_or(LibraryError::FileNotFound { id })
    }

    fn album(&self, id: i32) -> Result<Arc<Album>, LibraryError> {
        self.albums
            .get(&id)
            .cloned()
            .ok_or(LibraryError::AlbumNotFound { id })
    }

    fn directory(&self, id: i32) -> Result<Arc<Directory>, LibraryError> {
        self.directories
            .get(&id)
            .cloned()
            .ok_or(LibraryError::DirectoryNotFound { id })
    }

    fn album_files(&self, id: i32) -> Result<Vec<Arc<LibraryFile>>, LibraryError> {
        self.album_files
            .get(&id)
            .map(|ids| self.collect(ids))
            .ok_or(LibraryError::AlbumNotFound { id })
    }

    fn directory_files(&self, id: i32) -> Result<Vec<Arc<LibraryFile>>, LibraryError> {
        self.directory_files
            .get(&id)
            .map(|ids| self.collect(ids))
            .ok_or(LibraryError::DirectoryNotFound { id })
    }
}

impl Scan {
    fn walk(&mut self, dir: &Path, codecs: &dyn CodecFactory, is_root: bool) -> Result<(), LibraryError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if !is_root => {
                warn!("Skipping unreadable directory {}: {}", dir.display(), e);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut subdirectories = Vec::new();
        let mut media = Vec::new();

        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();

            if file_type.is_dir() {
                subdirectories.push(path);
            } else if file_type.is_file() && codecs.is_media_file(&path) {
                media.push(path);
            }
        }

        // Sort for consistent ordering
        subdirectories.sort();
        media.sort();

        if !media.is_empty() {
            let directory = Directory::new(self.directories.len() as i32 + 1, dir.to_path_buf());
            for path in media {
                self.add_file(&directory, &path);
            }
            self.directories.push(directory);
        }

        for subdirectory in subdirectories {
            self.walk(&subdirectory, codecs, false)?;
        }
        Ok(())
    }

    fn add_file(&mut self, directory: &Directory, path: &Path) {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            warn!("Skipping file with a non UTF-8 name: {}", path.display());
            return;
        };

        let mut file = LibraryFile::new(self.files.len() as i32 + 1, directory.path.clone(), name);
        file.directory_id = directory.id;
        file.size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        match MetadataExtractor::extract_from_file(path) {
            Ok(metadata) => file.metadata = metadata,
            Err(e) => debug!("No metadata for {}: {}", path.display(), e),
        }

        self.files.push(file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec::tests::write_test_wav;
    use crate::audio::CodecManager;
    use crate::models::AudioMetadata;
    use tempfile::TempDir;

    fn music_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("artist/first")).unwrap();
        fs::create_dir_all(root.join("artist/second")).unwrap();
        write_test_wav(&root.join("artist/first/02.wav"), 8000, 2, 800);
        write_test_wav(&root.join("artist/first/01.wav"), 8000, 2, 16000);
        fs::write(root.join("artist/first/cover.jpg"), b"not audio").unwrap();
        write_test_wav(&root.join("artist/second/03.wav"), 8000, 1, 800);
        fs::write(root.join("notes.txt"), b"hello").unwrap();

        dir
    }

    fn tagged(id: i32, directory_id: i32, name: &str, album: Option<&str>, track: Option<u32>) -> LibraryFile {
        let mut file = LibraryFile::new(id, PathBuf::from("/music"), name);
        file.directory_id = directory_id;
        file.metadata = AudioMetadata {
            album: album.map(str::to_string),
            track_number: track,
            length: 60,
            ..Default::default()
        };
        file
    }

    #[test]
    fn test_scan_records_media_files() {
        let dir = music_tree();
        let library = ScannedLibrary::scan(&[dir.path().to_path_buf()], &CodecManager::default()).unwrap();

        assert_eq!(library.file_count(), 3);
        assert_eq!(library.directory_count(), 2);

        let first = library.directory(1).unwrap();
        assert_eq!(first.name, "first");

        let names: Vec<_> = library
            .directory_files(1)
            .unwrap()
            .iter()
            .map(|f| f.name.clone())
            .collect();
        assert_eq!(names, vec!["01.wav", "02.wav"]);

        let file = library.file(1).unwrap();
        assert_eq!(file.directory_id, 1);
        assert_eq!(file.metadata.length, 2);
        assert!(file.size > 44);
        assert!(file.full_path().exists());
    }

    #[test]
    fn test_scan_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let result = ScannedLibrary::scan(&[dir.path().join("missing")], &CodecManager::default());
        assert!(matches!(result, Err(LibraryError::Scan(_))));
    }

    #[test]
    fn test_unknown_ids() {
        let library = ScannedLibrary::empty();
        assert!(matches!(library.file(7), Err(LibraryError::FileNotFound { id: 7 })));
        assert!(matches!(library.album(7), Err(LibraryError::AlbumNotFound { id: 7 })));
        assert!(matches!(
            library.directory_item(7),
            Err(LibraryError::DirectoryNotFound { id: 7 })
        ));
    }

    #[test]
    fn test_albums_grouped_by_tag_in_track_order() {
        let files = vec![
            tagged(1, 1, "b.flac", Some("Blue"), Some(2)),
            tagged(2, 1, "a.flac", Some("Blue"), Some(1)),
            tagged(3, 2, "c.flac", Some("Red"), None),
            tagged(4, 2, "d.flac", None, None),
        ];
        let directories = vec![
            Directory::new(1, PathBuf::from("/music/blue")),
            Directory::new(2, PathBuf::from("/music/misc")),
        ];
        let library = ScannedLibrary::build(files, directories);

        assert_eq!(library.album_count(), 2);
        let blue = library.album(1).unwrap();
        assert_eq!(blue.name, "Blue");
        assert_eq!(blue.songs, 2);
        assert_eq!(blue.length, 120);

        let ids: Vec<_> = library.album_files(1).unwrap().iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(library.file(3).unwrap().album_id, 2);
        assert_eq!(library.file(4).unwrap().album_id, -1);
    }

    #[test]
    fn test_album_item_for_queue() {
        let files = vec![
            tagged(1, 1, "one.flac", Some("Blue"), Some(1)),
            tagged(2, 1, "two.flac", Some("Blue"), Some(2)),
        ];
        let library = ScannedLibrary::build(files, vec![Directory::new(1, PathBuf::from("/music"))]);

        let item = library.album_item(1).unwrap();
        assert_eq!(item.label(), "Blue");
        assert_eq!(item.items().len(), 2);
        // a fresh item has no current file
        assert!(!item.is_valid());
    }

    #[test]
    fn test_item_for_path() {
        let dir = music_tree();
        let library = ScannedLibrary::scan(&[dir.path().to_path_buf()], &CodecManager::default()).unwrap();
        let root = dir.path();

        let item = library.item_for_path(&root.join("artist/first")).unwrap();
        assert_eq!(item.label(), "first");
        assert_eq!(item.items().len(), 2);

        let item = library.item_for_path(&root.join("artist/second/03.wav")).unwrap();
        assert_eq!(item.file().map(|f| f.name.as_str()), Some("03.wav"));

        assert!(matches!(
            library.item_for_path(&root.join("artist/first/cover.jpg")),
            Err(LibraryError::NotMediaFile { .. })
        ));
        assert!(matches!(
            library.item_for_path(&root.join("elsewhere.wav")),
            Err(LibraryError::PathNotFound { .. })
        ));
    }
}
