//! Ingestion-time compression of asset bodies.
//!
//! Every compressible asset is encoded once with gzip (default level) and
//! brotli (maximum quality). Request handling never compresses.

use std::io::Write;

use bytes::Bytes;
use flate2::{Compression, write::GzEncoder};
use tracing::{debug, warn};

use super::error::CodecError;

/// Substrings marking formats that are already compressed or binary.
pub const NO_COMPRESSION_EXTENSIONS: [&str; 6] =
    [".jpeg", ".jpg", ".png", ".bmp", ".tiff", ".pdf"];

const BROTLI_QUALITY: u32 = 11;
const BROTLI_WINDOW: u32 = 22;
const BROTLI_BUFFER: usize = 4096;

/// The encoded representations produced for one asset.
#[derive(Debug)]
pub struct Variants {
    pub raw: Bytes,
    pub gzip: Option<Bytes>,
    pub brotli: Option<Bytes>,
}

/// Returns false when the filename contains one of [`NO_COMPRESSION_EXTENSIONS`].
///
/// Matching is by substring, so `scan.png.html` is treated as an image.
pub fn is_compressible(filename: &str) -> bool {
    !NO_COMPRESSION_EXTENSIONS
        .iter()
        .any(|ext| filename.contains(ext))
}

/// Produce all variants for `raw`.
///
/// The raw buffer is always returned. A failing codec only drops its own
/// variant; the failure is logged.
pub fn compress(filename: &str, raw: Bytes) -> Variants {
    if !is_compressible(filename) {
        debug!(
            target = "vitrine::cache::compression",
            filename,
            compressible = false,
            "Skipping compression"
        );
        return Variants {
            raw,
            gzip: None,
            brotli: None,
        };
    }

    let gzip = match encode_gzip(&raw) {
        Ok(encoded) => Some(Bytes::from(encoded)),
        Err(err) => {
            warn!(
                target = "vitrine::cache::compression",
                filename,
                error = %err,
                "gzip encoding failed; serving without gzip variant"
            );
            None
        }
    };

    let brotli = match encode_brotli(&raw) {
        Ok(encoded) => Some(Bytes::from(encoded)),
        Err(err) => {
            warn!(
                target = "vitrine::cache::compression",
                filename,
                error = %err,
                "brotli encoding failed; serving without brotli variant"
            );
            None
        }
    };

    debug!(
        target = "vitrine::cache::compression",
        filename,
        raw_len = raw.len(),
        gzip_len = ?gzip.as_ref().map(Bytes::len),
        brotli_len = ?brotli.as_ref().map(Bytes::len),
        "Compressed asset"
    );

    Variants {
        raw,
        gzip,
        brotli,
    }
}

/// Gzip-encode `data` at the default compression level.
pub fn encode_gzip(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(CodecError::Gzip)?;
    encoder.finish().map_err(CodecError::Gzip)
}

/// Brotli-encode `data` at quality 11.
pub fn encode_brotli(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder =
        brotli::CompressorWriter::new(Vec::new(), BROTLI_BUFFER, BROTLI_QUALITY, BROTLI_WINDOW);
    encoder.write_all(data).map_err(CodecError::Brotli)?;
    // into_inner finishes the stream
    Ok(encoder.into_inner())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;

    const SAMPLE: &[u8] =
        b"<!doctype html><html><body><p>hello hello hello hello</p></body></html>";

    #[test]
    fn images_and_documents_are_not_compressible() {
        for name in ["a.jpeg", "a.jpg", "logo.png", "b.bmp", "scan.tiff", "doc.pdf"] {
            assert!(!is_compressible(name), "{name} should not be compressible");
        }
        assert!(is_compressible("index.html"));
        assert!(is_compressible("app.js"));
    }

    #[test]
    fn extension_match_is_by_substring() {
        assert!(!is_compressible("photo.jpg.html"));
        assert!(!is_compressible("my.pngs.css"));
    }

    #[test]
    fn compressible_file_gets_both_variants() {
        let variants = compress("index.html", Bytes::from_static(SAMPLE));
        assert!(variants.gzip.is_some());
        assert!(variants.brotli.is_some());
        assert_eq!(variants.raw, Bytes::from_static(SAMPLE));
    }

    #[test]
    fn non_compressible_file_keeps_raw_only() {
        let variants = compress("logo.png", Bytes::from_static(b"\x89PNG\r\n"));
        assert!(variants.gzip.is_none());
        assert!(variants.brotli.is_none());
        assert_eq!(variants.raw.len(), 6);
    }

    #[test]
    fn gzip_decodes_back_to_input() {
        let encoded = encode_gzip(SAMPLE).expect("gzip");
        let mut decoded = Vec::new();
        GzDecoder::new(encoded.as_slice())
            .read_to_end(&mut decoded)
            .expect("gunzip");
        assert_eq!(decoded, SAMPLE);
    }

    #[test]
    fn brotli_decodes_back_to_input() {
        let encoded = encode_brotli(SAMPLE).expect("brotli");
        let mut decoded = Vec::new();
        brotli::Decompressor::new(encoded.as_slice(), BROTLI_BUFFER)
            .read_to_end(&mut decoded)
            .expect("unbrotli");
        assert_eq!(decoded, SAMPLE);
    }

    #[test]
    fn empty_input_still_produces_valid_streams() {
        let variants = compress("empty.css", Bytes::new());
        let gz = variants.gzip.expect("gzip variant");
        let mut decoded = Vec::new();
        GzDecoder::new(gz.as_ref())
            .read_to_end(&mut decoded)
            .expect("gunzip");
        assert!(decoded.is_empty());
    }
}
