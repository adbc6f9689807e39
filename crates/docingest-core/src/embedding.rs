//! Embedding slot encoding.
//!
//! Chunks carry an optional embedding vector that the ingestion pipeline
//! leaves empty; a downstream indexer fills it. Stores persist it as a
//! BLOB of little-endian `f32` values.

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use docingest_core::embedding::{blob_to_vec, vec_to_blob};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`vec_to_blob`]. Trailing partial values are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_vector() {
        assert!(vec_to_blob(&[]).is_empty());
        assert!(blob_to_vec(&[]).is_empty());
    }

    #[test]
    fn test_partial_trailing_bytes_ignored() {
        let mut blob = vec_to_blob(&[0.5]);
        blob.push(0xff);
        assert_eq!(blob_to_vec(&blob), vec![0.5]);
    }
}
