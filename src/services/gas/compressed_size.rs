use std::io::Write;

use flate2::{write::DeflateEncoder, Compression};

/// Size in bytes of an encoded transaction once deflate-compressed. Never less than 1.
pub fn estimate_compressed_size(encoded: &[u8]) -> std::io::Result<u64> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(encoded.len()), Compression::best());
    encoder.write_all(encoded)?;
    let compressed = encoder.finish()?;
    Ok((compressed.len() as u64).max(1))
}
