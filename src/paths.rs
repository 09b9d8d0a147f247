use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Resolves a configured path: absolute paths are kept, relative ones are
/// taken from the executable directory.
pub fn resolve(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        get_exe_dir().join(path)
    }
}

/// Deletes every regular file in `dir` except the one named `keep`.
///
/// Returns how many files were removed. A missing directory counts as empty.
pub fn clear_directory(dir: &Path, keep: &str) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() || entry.file_name() == keep {
            continue;
        }
        std::fs::remove_file(entry.path())?;
        removed += 1;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_keeps_absolute() {
        let dir = tempdir().unwrap();
        assert_eq!(resolve(dir.path()), dir.path());
        assert_eq!(resolve(Path::new("logs")), get_exe_dir().join("logs"));
    }

    #[test]
    fn test_clear_directory_keeps_marker() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".gitkeep"), "").unwrap();
        std::fs::write(dir.path().join("a.png"), "x").unwrap();
        std::fs::write(dir.path().join("b.log"), "x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        assert_eq!(clear_directory(dir.path(), ".gitkeep").unwrap(), 2);
        assert!(dir.path().join(".gitkeep").exists());
        assert!(dir.path().join("nested").exists());
        assert!(!dir.path().join("a.png").exists());

        assert_eq!(clear_directory(&dir.path().join("missing"), ".gitkeep").unwrap(), 0);
    }
}
