//! Splitting of oversized string fields across multiple records
//!
//! Log aggregation backends reject entries above a per-line size limit, so a
//! record carrying a huge string field is re-emitted as several records, each
//! holding one slice of the value plus chunk bookkeeping fields.

use super::field::{Field, FieldValue};

/// Maximum size in bytes of a single string field before it is chunked
pub const MAX_STRING_FIELD_SIZE: usize = 204_800;

/// Marker appended to secondary oversized fields after truncation
pub const TRUNCATION_SUFFIX: &str = "...[truncated]";

/// Suffix of the 1-based chunk index field
pub const CHUNK_SUFFIX: &str = "_chunk";

/// Suffix of the chunk count field
pub const TOTAL_CHUNKS_SUFFIX: &str = "_total_chunks";

fn oversized_str(field: &Field, threshold: usize) -> Option<&str> {
    match field.value() {
        FieldValue::String(s) if s.len() > threshold => Some(s),
        _ => None,
    }
}

/// Largest char boundary at or below `index`
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Smallest char boundary strictly above zero, for characters wider than the chunk size
fn next_char_boundary(s: &str) -> usize {
    s.char_indices().nth(1).map(|(i, _)| i).unwrap_or(s.len())
}

/// Split `s` into pieces of at most `size` bytes.
///
/// Split points that would fall inside a multi-byte character move back to the
/// previous character boundary. A single character wider than `size` forms its
/// own piece. Concatenating the pieces always reproduces `s`.
///
/// # Example
///
/// ```
/// use rust_correlated_logger::core::chunking::chunk_string;
///
/// assert_eq!(chunk_string("abcdefg", 3), vec!["abc", "def", "g"]);
/// assert_eq!(chunk_string("", 3), vec![""]);
/// ```
pub fn chunk_string(s: &str, size: usize) -> Vec<&str> {
    if size == 0 || s.len() <= size {
        return vec![s];
    }

    let mut chunks = Vec::with_capacity(s.len().div_ceil(size));
    let mut rest = s;
    while rest.len() > size {
        let mut split = floor_char_boundary(rest, size);
        if split == 0 {
            split = next_char_boundary(rest);
        }
        let (head, tail) = rest.split_at(split);
        chunks.push(head);
        rest = tail;
    }
    if !rest.is_empty() {
        chunks.push(rest);
    }
    chunks
}

/// Cut `s` to at most `size` bytes and append [`TRUNCATION_SUFFIX`]
pub fn truncate_field_value(s: &str, size: usize) -> String {
    let end = floor_char_boundary(s, size);
    let mut out = String::with_capacity(end + TRUNCATION_SUFFIX.len());
    out.push_str(&s[..end]);
    out.push_str(TRUNCATION_SUFFIX);
    out
}

/// Split the first oversized string field of `fields` into one field set per chunk.
///
/// Returns `None` when no string field exceeds `threshold`, or when `threshold`
/// is zero. Otherwise every returned field set holds the remaining fields in
/// their original order (any further oversized strings truncated), followed by
/// the chunk under the original key, `<key>_chunk` (1-based) and
/// `<key>_total_chunks`.
pub fn chunk_oversized_fields(fields: &[Field], threshold: usize) -> Option<Vec<Vec<Field>>> {
    if threshold == 0 {
        return None;
    }

    let (idx, value) = fields
        .iter()
        .enumerate()
        .find_map(|(i, f)| oversized_str(f, threshold).map(|s| (i, s)))?;
    let key = fields[idx].key();

    let base: Vec<Field> = fields
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != idx)
        .map(|(_, f)| match oversized_str(f, threshold) {
            Some(s) => f.with_value(FieldValue::String(truncate_field_value(s, threshold))),
            None => f.clone(),
        })
        .collect();

    let chunks = chunk_string(value, threshold);
    let total = chunks.len() as i64;

    let sets = chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut set = Vec::with_capacity(base.len() + 3);
            set.extend(base.iter().cloned());
            set.push(Field::string(key, chunk));
            set.push(Field::int64(format!("{}{}", key, CHUNK_SUFFIX), i as i64 + 1));
            set.push(Field::int64(format!("{}{}", key, TOTAL_CHUNKS_SUFFIX), total));
            set
        })
        .collect();

    Some(sets)
}
