use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::path::Path;

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB

/// Text file contents, memory-mapped when large. Always valid UTF-8.
pub enum FileContent {
    Mapped(Mmap),
    Buffered(String),
}

impl AsRef<str> for FileContent {
    fn as_ref(&self) -> &str {
        match self {
            // Validated in read_file_smart
            FileContent::Mapped(mmap) => std::str::from_utf8(mmap).unwrap_or(""),
            FileContent::Buffered(s) => s.as_str(),
        }
    }
}

impl FileContent {
    pub fn into_string(self) -> String {
        match self {
            FileContent::Mapped(mmap) => String::from_utf8_lossy(&mmap).into_owned(),
            FileContent::Buffered(s) => s,
        }
    }
}

/// Read a text file. Binary files (NUL bytes) and invalid UTF-8 are
/// reported as `InvalidData` so callers can skip them.
pub fn read_file_smart<P: AsRef<Path>>(path: P) -> io::Result<FileContent> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)?;

    if metadata.len() > MMAP_THRESHOLD {
        let file = File::open(path)?;

        // Safety: read-only mapping, the engine never writes sources
        let mmap = unsafe { Mmap::map(&file) }?;

        check_text(path, &mmap)?;
        std::str::from_utf8(&mmap).map_err(|_| not_text(path))?;

        Ok(FileContent::Mapped(mmap))
    } else {
        let bytes = std::fs::read(path)?;
        check_text(path, &bytes)?;
        let content = String::from_utf8(bytes).map_err(|_| not_text(path))?;

        Ok(FileContent::Buffered(content))
    }
}

/// Reject content that looks binary
pub fn check_text(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if bytes.contains(&0) {
        return Err(not_text(path));
    }
    Ok(())
}

fn not_text(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("{} is not a UTF-8 text file", path.display()),
    )
}

/// Lines around a 0-based index: up to `before` lines above and `after`
/// lines below, clamped to the file.
pub fn surrounding_lines(
    lines: &[&str],
    idx: usize,
    before: usize,
    after: usize,
) -> (Vec<String>, Vec<String>) {
    let start = idx.saturating_sub(before);
    let end = (idx + 1 + after).min(lines.len());

    let above = lines[start..idx].iter().map(|l| l.to_string()).collect();
    let below = if idx + 1 < end {
        lines[idx + 1..end].iter().map(|l| l.to_string()).collect()
    } else {
        Vec::new()
    };

    (above, below)
}
