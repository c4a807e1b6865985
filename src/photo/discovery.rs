use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every file under `directory` whose extension is in `extensions`
/// (case-insensitive), sorted by path and capped at `limit`.
pub fn discover_photos(directory: &Path, extensions: &[String], limit: usize) -> Vec<PathBuf> {
    let mut photos = Vec::new();

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if path.is_file() {
            if let Some(ext) = path.extension() {
                let ext_lower = ext.to_string_lossy().to_lowercase();
                if extensions.iter().any(|e| e.to_lowercase() == ext_lower) {
                    photos.push(path.to_path_buf());
                }
            }
        }
    }

    // Sort by path for consistent ordering
    photos.sort();
    photos.truncate(limit);

    photos
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn extensions() -> Vec<String> {
        vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
    }

    #[test]
    fn test_discover_photos() {
        let dir = tempdir().unwrap();

        File::create(dir.path().join("photo1.jpg")).unwrap();
        File::create(dir.path().join("photo2.PNG")).unwrap();
        File::create(dir.path().join("document.txt")).unwrap();

        fs::create_dir(dir.path().join("subdir")).unwrap();
        File::create(dir.path().join("subdir/photo3.jpeg")).unwrap();

        let photos = discover_photos(dir.path(), &extensions(), usize::MAX);

        assert_eq!(photos.len(), 3);
        assert!(photos.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_discover_respects_limit() {
        let dir = tempdir().unwrap();
        for i in 0..5 {
            File::create(dir.path().join(format!("{}.jpg", i))).unwrap();
        }

        let photos = discover_photos(dir.path(), &extensions(), 2);
        assert_eq!(photos, vec![dir.path().join("0.jpg"), dir.path().join("1.jpg")]);
    }
}
