use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Read a file that must be UTF-8.
///
/// # Errors
/// Returns an error if the file cannot be read, or `InvalidData` naming the
/// byte offset of the first invalid sequence.
pub fn read_utf8(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    String::from_utf8(bytes).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid UTF-8 at byte {}", e.utf8_error().valid_up_to()),
        )
    })
}

/// Atomically replace `path` with `bytes`.
///
/// The data goes to a uniquely named temp file in the destination directory,
/// is flushed to disk, and is then renamed over the target. Readers observe
/// either the previous contents or the new contents. Missing parent
/// directories are created first.
///
/// # Errors
/// Returns an error if the directory cannot be created, or the write, sync
/// or rename fails. On error the temp file is removed and `path` is untouched.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let prefix = format!(
        ".{}.",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file")
    );
    let mut temp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;

    // Dropping the NamedTempFile on error deletes it.
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
