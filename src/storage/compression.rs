//! Optional LZ4 packing of the snapshot payload.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::{Deserialize, Serialize};

/// Upper bound on how far one LZ4 block byte can expand. Declared sizes above
/// `body * MAX_EXPANSION` cannot come from a real block.
const MAX_EXPANSION: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionAlgorithm {
    None,
    Lz4,
}

impl CompressionAlgorithm {
    pub fn compress(self, data: &[u8]) -> Vec<u8> {
        match self {
            CompressionAlgorithm::None => data.to_vec(),
            CompressionAlgorithm::Lz4 => compress_prepend_size(data),
        }
    }

    /// Unpacks `data`, refusing LZ4 headers that claim more output than the
    /// block could hold.
    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>, String> {
        match self {
            CompressionAlgorithm::None => Ok(data.to_vec()),
            CompressionAlgorithm::Lz4 => {
                let header: [u8; 4] = data
                    .get(..4)
                    .and_then(|h| h.try_into().ok())
                    .ok_or_else(|| "LZ4 payload is missing its size header".to_string())?;
                let declared = u32::from_le_bytes(header) as usize;
                let limit = (data.len() - 4).saturating_mul(MAX_EXPANSION);
                if declared > limit {
                    return Err(format!(
                        "LZ4 size header claims {declared} bytes from a {} byte block",
                        data.len() - 4
                    ));
                }
                decompress_size_prepended(data).map_err(|e| format!("LZ4 decompression error: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lz4_shrinks_repetitive_text() {
        let data = "the cat sat on the mat ".repeat(200).into_bytes();

        let packed = CompressionAlgorithm::Lz4.compress(&data);
        assert!(packed.len() * 2 < data.len());
        assert_eq!(CompressionAlgorithm::Lz4.decompress(&packed).unwrap(), data);
    }

    #[test]
    fn test_lz4_handles_empty_input() {
        let packed = CompressionAlgorithm::Lz4.compress(&[]);
        assert_eq!(CompressionAlgorithm::Lz4.decompress(&packed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_garbage_fails_to_decompress() {
        assert!(CompressionAlgorithm::Lz4.decompress(&[10, 0, 0, 0, 0xf0]).is_err());
        assert!(CompressionAlgorithm::Lz4.decompress(&[1, 0]).is_err());
    }

    #[test]
    fn test_oversized_header_is_refused_before_allocating() {
        let err = CompressionAlgorithm::Lz4
            .decompress(&[0xff, 0xff, 0xff, 0xff, 0x10, 0x41])
            .unwrap_err();
        assert!(err.contains("size header"), "{err}");
    }
}
