//! Codec bridge: wraps an input path or byte stream, detecting
//! compression by filename suffix, and producing a single `BufRead`
//! character stream for the XML event stream to consume.
//!
//! Inspects the trailing `.gz` / `.xz` / `.bz2` of a filename and opens
//! the matching decompressor, falling back to the raw file otherwise.
use crate::error::{Error, Result};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use xz2::read::XzDecoder;

/// Open `path`, transparently decompressing based on its extension.
///
/// `.gz`, `.bz2` and `.xz` are recognized; any other extension (including
/// none) is opened as raw bytes.
pub fn open<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    wrap(path, file)
}

/// Wrap an already-open reader the same way [`open`] would, using `path`
/// only to decide which decompressor (if any) applies.
pub fn wrap<P: AsRef<Path>, R: Read + 'static>(path: P, reader: R) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("gz") => Ok(Box::new(BufReader::new(GzDecoder::new(reader)))),
        Some("bz2") => Ok(Box::new(BufReader::new(BzDecoder::new(reader)))),
        Some("xz") => Ok(Box::new(BufReader::new(XzDecoder::new(reader)))),
        _ => Ok(Box::new(BufReader::new(reader))),
    }
}

/// Whether `path`'s extension names a compression codec this module
/// recognizes.
pub fn is_compressed<P: AsRef<Path>>(path: P) -> bool {
    matches!(
        path.as_ref().extension().and_then(|ext| ext.to_str()),
        Some("gz") | Some("bz2") | Some("xz")
    )
}

/// Like [`open`], but errors instead of silently treating an unrecognized
/// but present extension as raw bytes. Useful for callers that want to
/// catch typos such as `.gzip` early.
pub fn open_strict<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        if !matches!(ext, "gz" | "bz2" | "xz" | "osm" | "xml") {
            return Err(Error::UnknownCompression(path.to_path_buf()));
        }
    }
    open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn raw_passthrough() {
        let mut r = wrap("map.osm", Cursor::new(b"hello".to_vec())).unwrap();
        let mut buf = String::new();
        r.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");
    }

    #[test]
    fn detects_compressed_suffix() {
        assert!(is_compressed("map.osm.gz"));
        assert!(is_compressed("map.osm.bz2"));
        assert!(is_compressed("map.osm.xz"));
        assert!(!is_compressed("map.osm"));
    }
}
