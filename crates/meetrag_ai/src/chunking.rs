use meetrag_core::error::{AppError, ErrorKind};

/// A character window over a corpus document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub ordinal: u32,
    /// Offset of the first character, in characters.
    pub start: usize,
    pub text: String,
}

/// Split `text` into windows of `size` characters, each starting `size - overlap`
/// characters after the previous one. The last window may be shorter.
///
/// A text no longer than `size` yields exactly one chunk, even when empty.
pub fn split(text: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>, AppError> {
    if size == 0 || overlap >= size {
        return Err(AppError::new(
            ErrorKind::InvalidConfig,
            "CHUNKING_INVALID_CONFIG",
            "Chunk overlap must be smaller than a non-zero chunk size",
        )
        .with_details(format!("size={size}; overlap={overlap}")));
    }
    let step = size - overlap;

    // Byte offset of every char boundary, plus the end of the text.
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());
    let char_len = bounds.len() - 1;

    let mut out = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + size).min(char_len);
        out.push(Chunk {
            ordinal: out.len() as u32,
            start,
            text: text[bounds[start]..bounds[end]].to_string(),
        });
        if end >= char_len {
            break;
        }
        start += step;
    }
    Ok(out)
}

/// Expected chunk count for a text of `char_len` characters: `ceil((L - O) / (S - O))`, at least one.
pub fn expected_chunk_count(char_len: usize, size: usize, overlap: usize) -> usize {
    if char_len <= size {
        return 1;
    }
    let step = size - overlap;
    (char_len - overlap).div_ceil(step)
}
