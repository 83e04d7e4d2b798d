//! Read-only filesystem tools: directory listing and text file reads

use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::sandbox::{confine_existing, SandboxError, WorkingDirectory};

/// Maximum characters returned by `read_text_file`
pub const MAX_READ_CHARS: usize = 10_000;

/// List the immediate entries of a confined directory
///
/// One line per entry, in the order the OS returns them:
/// `- name: file_size=123 bytes, is_dir=false`
pub async fn list_directory(root: &WorkingDirectory, directory: &str) -> Result<String, SandboxError> {
    let path = confine_existing(root, directory)?;
    if !path.is_dir() {
        return Err(SandboxError::NotADirectory(directory.to_string()));
    }

    let read_error = |source| SandboxError::ReadError {
        path: directory.to_string(),
        source,
    };

    let mut entries = fs::read_dir(&path).await.map_err(read_error)?;
    let mut listing = String::new();

    while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
        // Follow symlinks like a plain stat would; fall back to the link itself
        // when the target is dangling.
        let metadata = match fs::metadata(entry.path()).await {
            Ok(metadata) => metadata,
            Err(_) => entry.metadata().await.map_err(read_error)?,
        };

        listing.push_str(&format!(
            "- {}: file_size={} bytes, is_dir={}\n",
            entry.file_name().to_string_lossy(),
            metadata.len(),
            metadata.is_dir()
        ));
    }

    Ok(listing)
}

/// Read a confined text file, truncated to [`MAX_READ_CHARS`] characters
///
/// Only a bounded prefix of the file is read. Truncated content ends with a
/// marker naming the file, and bytes past the returned span are never decoded.
pub async fn read_text_file(root: &WorkingDirectory, file_path: &str) -> Result<String, SandboxError> {
    let path = confine_existing(root, file_path)?;
    if !path.is_file() {
        return Err(SandboxError::NotAFile(file_path.to_string()));
    }

    let read_error = |source| SandboxError::ReadError {
        path: file_path.to_string(),
        source,
    };

    // A char is at most 4 bytes; one extra byte tells us whether more follows.
    let limit = (MAX_READ_CHARS * 4 + 1) as u64;
    let file = fs::File::open(&path).await.map_err(read_error)?;
    let mut bytes = Vec::new();
    file.take(limit)
        .read_to_end(&mut bytes)
        .await
        .map_err(read_error)?;

    let valid_len = match std::str::from_utf8(&bytes) {
        Ok(_) => bytes.len(),
        Err(e) => e.valid_up_to(),
    };
    let text = String::from_utf8_lossy(&bytes[..valid_len]);

    if let Some((cut, _)) = text.char_indices().nth(MAX_READ_CHARS) {
        return Ok(format!("{}{}", &text[..cut], truncation_marker(file_path)));
    }

    if valid_len < bytes.len() {
        // Exactly the cap decoded cleanly; whatever follows is not returned.
        if text.chars().count() == MAX_READ_CHARS {
            return Ok(format!("{}{}", text, truncation_marker(file_path)));
        }
        return Err(read_error(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "stream did not contain valid UTF-8",
        )));
    }

    Ok(text.into_owned())
}

fn truncation_marker(file_path: &str) -> String {
    format!(
        "[...File \"{}\" truncated at {} characters]",
        file_path, MAX_READ_CHARS
    )
}
