//! JPEG stream fix-ups applied to slide tiles before decoding.
//!
//! Slide tiles are often "abbreviated" streams: the quantization and Huffman
//! tables live once in the level's `JPEGTables` tag and each tile carries
//! only its frame header and scan. Such tiles are spliced with the tables:
//!
//! ```text
//! tables: SOI DQT DHT EOI      tile: SOI SOF SOS ... EOI
//! merged: SOI DQT DHT SOF SOS ... EOI
//! ```
//!
//! Aperio also writes tiles whose samples are RGB rather than YCbCr. Without
//! an Adobe segment decoders assume YCbCr for 3-component streams, so those
//! tiles get an APP14 marker with transform 0 inserted after SOI.

use bytes::{BufMut, Bytes, BytesMut};

// =============================================================================
// Markers
// =============================================================================

pub const SOI: [u8; 2] = [0xFF, 0xD8];
pub const EOI: [u8; 2] = [0xFF, 0xD9];
pub const DHT: [u8; 2] = [0xFF, 0xC4];
pub const DQT: [u8; 2] = [0xFF, 0xDB];
pub const SOS: [u8; 2] = [0xFF, 0xDA];
pub const APP14: [u8; 2] = [0xFF, 0xEE];

/// APP14 "Adobe" segment declaring untransformed (RGB) components.
const ADOBE_RGB_SEGMENT: [u8; 16] = [
    0xFF, 0xEE, // APP14
    0x00, 0x0E, // length
    b'A', b'd', b'o', b'b', b'e', //
    0x00, 0x64, // version 100
    0x00, 0x00, // flags0
    0x00, 0x00, // flags1
    0x00, // transform: none
];

// =============================================================================
// Stream inspection
// =============================================================================

/// Marker segments between SOI and the first SOS, as `(marker, position)`.
///
/// Stops at SOS (included) or at the first malformed length.
fn header_markers(data: &[u8]) -> Vec<([u8; 2], usize)> {
    let mut markers = Vec::new();
    if data.len() < 4 || data[0..2] != SOI {
        return markers;
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = [data[pos], data[pos + 1]];
        // Fill bytes
        if marker[1] == 0xFF {
            pos += 1;
            continue;
        }
        markers.push((marker, pos));
        if marker == SOS || marker == EOI {
            break;
        }
        if pos + 3 >= data.len() {
            break;
        }
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if length < 2 {
            break;
        }
        pos += 2 + length;
    }
    markers
}

/// A stream that reaches SOS without defining any tables.
pub fn is_abbreviated_stream(data: &[u8]) -> bool {
    let markers = header_markers(data);
    let has_tables = markers.iter().any(|(m, _)| *m == DQT || *m == DHT);
    !has_tables && markers.last().is_some_and(|(m, _)| *m == SOS)
}

/// A stream that defines its own quantization tables.
pub fn is_complete_stream(data: &[u8]) -> bool {
    header_markers(data).iter().any(|(m, _)| *m == DQT)
}

/// Whether the header already carries an APP14 segment.
pub fn has_adobe_marker(data: &[u8]) -> bool {
    header_markers(data).iter().any(|(m, _)| *m == APP14)
}

// =============================================================================
// Stream rewriting
// =============================================================================

/// Splice shared tables into an abbreviated tile.
///
/// The tables' trailing EOI and the tile's leading SOI are dropped.
pub fn merge_jpeg_tables(tables: &[u8], tile_data: &[u8]) -> Bytes {
    if tables.is_empty() {
        return Bytes::copy_from_slice(tile_data);
    }
    if tile_data.is_empty() {
        return Bytes::new();
    }

    let tables = tables.strip_suffix(&EOI[..]).unwrap_or(tables);
    let tile = tile_data.strip_prefix(&SOI[..]).unwrap_or(tile_data);

    let mut merged = BytesMut::with_capacity(tables.len() + tile.len());
    merged.extend_from_slice(tables);
    merged.extend_from_slice(tile);
    merged.freeze()
}

/// Insert an Adobe APP14 segment (transform 0) right after SOI.
///
/// Streams without SOI or with an APP14 segment already are returned
/// unchanged.
pub fn insert_adobe_rgb_marker(data: &[u8]) -> Bytes {
    if data.len() < 2 || data[0..2] != SOI || has_adobe_marker(data) {
        return Bytes::copy_from_slice(data);
    }

    let mut out = BytesMut::with_capacity(data.len() + ADOBE_RGB_SEGMENT.len());
    out.put_slice(&SOI);
    out.put_slice(&ADOBE_RGB_SEGMENT);
    out.put_slice(&data[2..]);
    out.freeze()
}

/// Turn raw tile bytes into a decodable JPEG stream.
///
/// Tables are merged into abbreviated tiles; `rgb` marks tiles whose
/// components are stored without a colour transform.
pub fn prepare_tile_jpeg(tables: Option<&[u8]>, tile_data: &[u8], rgb: bool) -> Bytes {
    let stream = match tables {
        Some(tables) if !is_complete_stream(tile_data) && is_abbreviated_stream(tile_data) => {
            merge_jpeg_tables(tables, tile_data)
        }
        _ => Bytes::copy_from_slice(tile_data),
    };

    if rgb {
        insert_adobe_rgb_marker(&stream)
    } else {
        stream
    }
}

// =============================================================================
// Tests
// =============================================================================
