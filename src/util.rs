/// Shared filesystem helpers.
pub mod fs {
    use std::fs;
    use std::io;

    use camino::Utf8Path;

    /// Ensure a directory exists, creating it recursively if needed.
    pub fn ensure_dir(path: &Utf8Path) -> io::Result<()> {
        if !path.is_dir() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// True when something (file, directory, or dangling symlink) occupies `path`.
    pub fn occupied(path: &Utf8Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    /// Remove whatever lives at `path`: directories recursively, anything else as a single entry.
    pub fn remove_entry(path: &Utf8Path) -> io::Result<()> {
        let meta = fs::symlink_metadata(path)?;
        if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    }

}
