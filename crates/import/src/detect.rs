use std::path::Path;

use ledgerlift_core::FileFormat;

use crate::error::ImportError;

fn unreadable(path: &Path) -> impl FnOnce(std::io::Error) -> ImportError + '_ {
    move |source| ImportError::Unreadable {
        path: path.to_path_buf(),
        source,
    }
}

/// Read a whole export file. Bytes that are not valid UTF-8 are replaced
/// rather than rejected.
pub async fn read_content(path: &Path) -> Result<String, ImportError> {
    let bytes = tokio::fs::read(path).await.map_err(unreadable(path))?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Classify an export file. `Ok(None)` means the format is unknown, which is
/// not an error; only an unreadable path fails.
pub async fn detect_format(path: &Path) -> Result<Option<FileFormat>, ImportError> {
    tokio::fs::File::open(path)
        .await
        .map_err(unreadable(path))?;

    if let Some(format) = format_from_extension(path) {
        tracing::debug!(path = %path.display(), %format, "format from extension");
        return Ok(Some(format));
    }

    let content = read_content(path).await?;
    Ok(detect_loaded(path, &content))
}

/// Classify a file whose content has already been read: extension first,
/// then content.
pub fn detect_loaded(path: &Path, content: &str) -> Option<FileFormat> {
    if let Some(format) = format_from_extension(path) {
        return Some(format);
    }
    let detected = detect_from_content(content);
    match detected {
        Some(format) => tracing::debug!(path = %path.display(), %format, "format from content"),
        None => tracing::warn!(path = %path.display(), "could not detect file format"),
    }
    detected
}

/// `.ofx`, `.qfx` and `.csv`, case-insensitively.
pub fn format_from_extension(path: &Path) -> Option<FileFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "ofx" => Some(FileFormat::Ofx),
        "qfx" => Some(FileFormat::Qfx),
        "csv" => Some(FileFormat::Csv),
        _ => None,
    }
}

pub fn detect_from_content(content: &str) -> Option<FileFormat> {
    let trimmed = content.trim_start();

    if trimmed.starts_with("OFXHEADER") || trimmed.starts_with("<?OFX") {
        return Some(FileFormat::Ofx);
    }

    if trimmed.contains("<OFX>") || trimmed.contains("<OFX ") {
        return Some(if trimmed.to_lowercase().contains("qfx") {
            FileFormat::Qfx
        } else {
            FileFormat::Ofx
        });
    }

    let mut lines = trimmed.split('\n').filter(|l| !l.trim().is_empty());
    let first = lines.next()?;
    if lines.next().is_some() && first.matches(',').count() >= 2 {
        return Some(FileFormat::Csv);
    }

    None
}
