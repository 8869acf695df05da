// files.rs
//
// Zipped shapefiles available for upload.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Lists `.zip` archives directly inside `dir`, sorted by name.
pub fn scan_upload_dir(dir: &Path) -> io::Result<Vec<String>> {
    let mut archives = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry_path = entry?.path();
        if !entry_path.is_file() {
            continue;
        }
        let is_zip = entry_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if let (true, Some(name)) = (is_zip, entry_path.file_name().and_then(|n| n.to_str())) {
            archives.push(name.to_string());
        }
    }
    archives.sort();
    Ok(archives)
}

// Basic fuzzy matching: every pattern char appears in order.
pub fn fuzzy_match(pattern: &str, text: &str) -> bool {
    if pattern.is_empty() {
        return true;
    }

    let text_lower = text.to_lowercase();
    let mut text_chars = text_lower.chars();
    pattern
        .to_lowercase()
        .chars()
        .all(|p_char| text_chars.any(|t_char| t_char == p_char))
}

/// Size and modification time of an archive, shown under the file list.
#[derive(Debug, Default, Clone)]
pub struct UploadInfo {
    pub path: PathBuf,
    pub file_size_kb: u64,
    pub modified_time: String,
    pub error: Option<String>,
}

impl UploadInfo {
    pub fn load(path: &Path) -> UploadInfo {
        let mut info = UploadInfo {
            path: path.to_path_buf(),
            ..UploadInfo::default()
        };
        match fs::metadata(path) {
            Ok(metadata) => {
                info.file_size_kb = metadata.len() / 1024;
                info.modified_time = match metadata.modified() {
                    Ok(time) => {
                        let datetime: chrono::DateTime<chrono::Local> = time.into();
                        format!("{}", datetime.format("%Y-%m-%d %H:%M"))
                    }
                    Err(_) => String::from("N/A"),
                };
            }
            Err(e) => info.error = Some(format!("File info: {e}")),
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("geonet-files-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    #[test]
    fn fuzzy_matching_is_ordered_and_case_insensitive() {
        assert!(fuzzy_match("", "anything.zip"));
        assert!(fuzzy_match("rds", "Roads_Colombo.zip"));
        assert!(fuzzy_match("RC", "roads_colombo.zip"));
        assert!(!fuzzy_match("sdr", "roads.zip"));
        assert!(!fuzzy_match("x", "roads.zip"));
    }

    #[test]
    fn only_zip_archives_are_listed() {
        let dir = scratch_dir("scan");
        for name in ["b_roads.zip", "a_rail.ZIP", "notes.txt", "roads.shp"] {
            fs::write(dir.join(name), b"x").expect("write fixture");
        }
        fs::create_dir_all(dir.join("nested.zip")).expect("create dir fixture");

        let files = scan_upload_dir(&dir).expect("scan");
        assert_eq!(files, vec!["a_rail.ZIP".to_string(), "b_roads.zip".to_string()]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn upload_info_reports_size_or_error() {
        let dir = scratch_dir("info");
        let path = dir.join("big.zip");
        fs::write(&path, vec![0u8; 4096]).expect("write fixture");

        let info = UploadInfo::load(&path);
        assert_eq!(info.file_size_kb, 4);
        assert!(info.error.is_none());
        assert_ne!(info.modified_time, "");

        let missing = UploadInfo::load(&dir.join("missing.zip"));
        assert!(missing.error.is_some());
        let _ = fs::remove_dir_all(&dir);
    }
}
