use std::fs;

use ndarray::Array2;

use caldera_core::error::CalderaError;
use caldera_core::frame::FrameDescriptor;
use caldera_core::io::fits::{decode, read_fits, read_fits_header, write_fits, FitsHeader, FitsValue};
use caldera_core::io::loader::load_frame;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn card(text: &str) -> String {
    format!("{text:<80}")
}

/// Hand-built 16-bit unsigned FITS as written by most capture software.
fn u16_fits(width: usize, height: usize, values: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for text in [
        "SIMPLE  =                    T".to_string(),
        "BITPIX  =                   16".to_string(),
        "NAXIS   =                    2".to_string(),
        format!("NAXIS1  = {width:>20}"),
        format!("NAXIS2  = {height:>20}"),
        "BZERO   =              32768.0".to_string(),
        "BSCALE  =                  1.0".to_string(),
        "IMAGETYP= 'Dark Frame'".to_string(),
        "EXPOSURE=                 30.0 / seconds".to_string(),
        "COMMENT written by a test".to_string(),
        "END".to_string(),
    ] {
        bytes.extend_from_slice(card(&text).as_bytes());
    }
    bytes.resize(2880, b' ');
    for &v in values {
        let stored = (v as i32 - 32768) as i16;
        bytes.extend_from_slice(&stored.to_be_bytes());
    }
    let padded = bytes.len().div_ceil(2880) * 2880;
    bytes.resize(padded, 0);
    bytes
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

#[test]
fn test_decode_unsigned_16_bit() {
    let bytes = u16_fits(3, 2, &[0, 100, 1000, 32768, 50000, 65535]);
    let image = decode(&bytes).unwrap();

    assert_eq!(image.bitpix, 16);
    assert_eq!(image.bit_depth(), 16);
    assert_eq!(image.data.dim(), (2, 3));
    assert_eq!(image.data[[0, 0]], 0.0);
    assert_eq!(image.data[[0, 2]], 1000.0);
    assert_eq!(image.data[[1, 1]], 50000.0);
    assert_eq!(image.data[[1, 2]], 65535.0);
    assert_eq!(image.header.get_str("IMAGETYP"), Some("Dark Frame"));
    assert_eq!(image.header.first_f64(&["EXPTIME", "EXPOSURE"]), Some(30.0));
}

#[test]
fn test_truncated_file_rejected() {
    let mut bytes = u16_fits(4, 4, &[1; 16]);
    bytes.truncate(2880 + 10);
    assert!(matches!(decode(&bytes), Err(CalderaError::InvalidFits(_))));
}

#[test]
fn test_not_fits_rejected() {
    let bytes = vec![0u8; 4000];
    assert!(matches!(decode(&bytes), Err(CalderaError::InvalidFits(_))));
}

#[test]
fn test_cube_rejected() {
    let mut bytes = Vec::new();
    for text in [
        "SIMPLE  =                    T",
        "BITPIX  =                    8",
        "NAXIS   =                    3",
        "NAXIS1  =                    2",
        "NAXIS2  =                    2",
        "NAXIS3  =                    3",
        "END",
    ] {
        bytes.extend_from_slice(card(text).as_bytes());
    }
    bytes.resize(2880 * 2, 0);
    assert!(matches!(decode(&bytes), Err(CalderaError::InvalidFits(_))));
}

/// Header claiming a 2^31 x 2^31 double-precision image with no data.
fn oversized_fits() -> Vec<u8> {
    let mut bytes = Vec::new();
    for text in [
        "SIMPLE  =                    T",
        "BITPIX  =                  -64",
        "NAXIS   =                    2",
        "NAXIS1  =           2147483648",
        "NAXIS2  =           2147483648",
        "END",
    ] {
        bytes.extend_from_slice(card(text).as_bytes());
    }
    bytes.resize(2880, b' ');
    bytes
}

#[test]
fn test_oversized_dimensions_rejected() {
    assert!(matches!(decode(&oversized_fits()), Err(CalderaError::InvalidFits(_))));
}

#[test]
fn test_oversized_dimensions_fail_frame_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.fits");
    fs::write(&path, oversized_fits()).unwrap();

    let err = load_frame(&FrameDescriptor::bias(&path)).unwrap_err();
    match err {
        CalderaError::FrameLoad { path: p, .. } => assert_eq!(p, path),
        other => panic!("expected FrameLoad, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

#[test]
fn test_write_then_read_preserves_pixels_and_keywords() {
    let data = Array2::from_shape_fn((5, 7), |(r, c)| (r * 7 + c) as f32 * 1.5 - 3.0);
    let mut header = FitsHeader::new();
    header.set("IMAGETYP", FitsValue::Text("Master Flat".into()), None);
    header.set("EXPTIME", FitsValue::Float(2.5), Some("exposure time [s]"));
    header.set("GAIN", FitsValue::Integer(100), None);
    header.set("FILTER", FitsValue::Text("O'III".into()), None);
    header.set("NAXIS1", FitsValue::Integer(999), None);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("master.fits");
    write_fits(&path, &data, &header).unwrap();

    assert_eq!(fs::metadata(&path).unwrap().len() % 2880, 0);

    let image = read_fits(&path).unwrap();
    assert_eq!(image.bitpix, -32);
    assert_eq!(image.data, data);
    assert_eq!(image.header.get_str("IMAGETYP"), Some("Master Flat"));
    assert_eq!(image.header.get_f64("EXPTIME"), Some(2.5));
    assert_eq!(image.header.get_i64("GAIN"), Some(100));
    assert_eq!(image.header.get_str("FILTER"), Some("O'III"));
    // Structural keywords always describe the actual data
    assert_eq!(image.header.get_i64("NAXIS1"), Some(7));

    let header_only = read_fits_header(&path).unwrap();
    assert_eq!(header_only.get_i64("GAIN"), Some(100));
}

#[test]
fn test_write_replaces_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("m.fits");
    write_fits(&path, &Array2::from_elem((2, 2), 1.0), &FitsHeader::new()).unwrap();
    write_fits(&path, &Array2::from_elem((3, 3), 2.0), &FitsHeader::new()).unwrap();

    let image = read_fits(&path).unwrap();
    assert_eq!(image.data.dim(), (3, 3));
    assert!(image.data.iter().all(|&v| v == 2.0));
    // No temporary files left next to the output
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}
