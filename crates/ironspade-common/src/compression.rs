// compression.rs — zlib compression for map transfer and saved maps
//
// The 0.75 client expects the map stream zlib-wrapped (header + adler32),
// not raw deflate.

use flate2::read::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;
use std::io::Read;

/// Upper bound on a decompressed map; a 512x512x64 map with every colour
/// stored is far below this.
pub const MAX_MAP_SIZE: usize = 96 * 1024 * 1024;

/// Compress a serialised map for transfer.
pub fn compress_map(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut encoder = ZlibEncoder::new(data, Compression::default());
    let mut compressed = Vec::with_capacity(data.len() / 4);
    encoder
        .read_to_end(&mut compressed)
        .map_err(|e| format!("map compression failed: {}", e))?;
    Ok(compressed)
}

/// Decompress a received map stream, bounded against decompression bombs.
pub fn decompress_map(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 4);
    let mut buffer = [0u8; 8192];
    loop {
        match decoder.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                if out.len() + n > MAX_MAP_SIZE {
                    return Err("decompressed map exceeds size limit".to_string());
                }
                out.extend_from_slice(&buffer[..n]);
            }
            Err(e) => return Err(format!("map decompression failed: {}", e)),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let original: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let compressed = compress_map(&original).unwrap();
        assert!(compressed.len() < original.len());
        let decompressed = decompress_map(&compressed).unwrap();
        assert_eq!(original, decompressed);
    }

    #[test]
    fn zlib_header_present() {
        // 0x78 is the zlib CMF byte for 32 KiB windows.
        let compressed = compress_map(&[0u8; 4096]).unwrap();
        assert_eq!(compressed[0], 0x78);
    }

    #[test]
    fn garbage_input_rejected() {
        assert!(decompress_map(&[0xDE, 0xAD, 0xBE, 0xEF]).is_err());
    }
}
