use crate::CoreError;
use std::io::Write;
use std::path::Path;

/// Write `content` to `path` through a temporary file in the same directory,
/// so readers never observe a partially written file.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), CoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CoreError::Io(e.error))?;
    Ok(())
}
