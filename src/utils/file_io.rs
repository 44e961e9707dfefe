use std::fs;
use std::fs::create_dir_all;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::error;
use tracing::warn;

pub fn create_parent_dir_if_not_exist(path: &Path) -> std::io::Result<()> {
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            if let Err(e) = create_dir_all(parent_dir) {
                error!("Failed to create directory {:?}: {:?}", parent_dir, e);
                return Err(e);
            }
        }
    }
    Ok(())
}

/// Writes `buf` next to `path` then renames it into place, so readers
/// never observe a half written file.
pub fn write_atomically(
    path: &Path,
    buf: &[u8],
) -> std::io::Result<()> {
    create_parent_dir_if_not_exist(path)?;

    let tmp_path = temp_sibling(path);
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(buf)?;
        file.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        fs::remove_file(&tmp_path).ok();
        return Err(e);
    }
    debug!("wrote {} bytes to {:?}", buf.len(), path);
    Ok(())
}

/// Reads and deletes the file at `path`.
///
/// Returns `Ok(None)` when the file does not exist. A failed delete is only
/// logged: the content has already been read.
pub fn take_file(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    let buf = match fs::read(path) {
        Ok(buf) => buf,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    if let Err(e) = fs::remove_file(path) {
        warn!("failed to delete consumed file {:?}: {}", path, e);
    }
    Ok(Some(buf))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
