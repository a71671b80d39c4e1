mod common;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use ndarray::{Array2, Array3};

use spikepursuit_core::error::{ErrorKind, SpikePursuitError};
use spikepursuit_core::io::{load_mask, save_mask, InMemoryVideo, PixelType, RawVideoReader, VideoSource};
use spikepursuit_core::pipeline::{run_cells, CellSpec, SequentialExecutor, SpikePursuitConfig};

use common::{synthetic_movie, MovieSpec};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_u16_movie(path: &Path, video: &Array3<f64>) {
    let mut out = BufWriter::new(File::create(path).unwrap());
    for &v in video.iter() {
        out.write_u16::<LittleEndian>(v as u16).unwrap();
    }
    out.flush().unwrap();
}

fn write_f32_movie(path: &Path, video: &Array3<f64>) {
    let mut out = BufWriter::new(File::create(path).unwrap());
    for &v in video.iter() {
        out.write_f32::<LittleEndian>(v as f32).unwrap();
    }
    out.flush().unwrap();
}

// ---------------------------------------------------------------------------
// Raw video reader
// ---------------------------------------------------------------------------

#[test]
fn test_raw_f32_roundtrip_region() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("movie.f32");
    let video = Array3::from_shape_fn((5, 4, 6), |(t, r, c)| t as f64 * 0.5 - r as f64 + c as f64 * 0.25);
    write_f32_movie(&path, &video);

    let reader = RawVideoReader::open(&path, 4, 6, PixelType::F32).unwrap();
    assert_eq!(reader.dims(), (5, 4, 6));
    assert_eq!(reader.frame_count(), 5);
    assert_eq!(reader.frame_shape(), (4, 6));
    assert_eq!(reader.pixel_type(), PixelType::F32);

    let region = reader.read_region(1..4, 2..4, 3..6).unwrap();
    assert_eq!(region.dim(), (3, 2, 3));
    for ((t, r, c), &v) in region.indexed_iter() {
        assert_eq!(v, video[[t + 1, r + 2, c + 3]]);
    }
}

#[test]
fn test_raw_region_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("movie.u16");
    write_u16_movie(&path, &Array3::zeros((3, 2, 2)));
    let reader = RawVideoReader::open(&path, 2, 2, PixelType::U16).unwrap();
    let err = reader.read_region(0..4, 0..2, 0..2).unwrap_err();
    assert!(matches!(err, SpikePursuitError::RegionOutOfRange(_)));
    assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
}

#[test]
fn test_raw_open_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = RawVideoReader::open(&dir.path().join("nope.raw"), 2, 2, PixelType::U8);
    assert_eq!(missing.err().unwrap().kind(), ErrorKind::Io);

    let path = dir.path().join("empty.raw");
    File::create(&path).unwrap();
    let empty = RawVideoReader::open(&path, 2, 2, PixelType::U8);
    assert!(matches!(empty.err().unwrap(), SpikePursuitError::InvalidVideo(_)));

    let zero = RawVideoReader::open(&path, 0, 2, PixelType::U8);
    assert!(matches!(zero.err().unwrap(), SpikePursuitError::InvalidVideo(_)));
}

#[test]
fn test_pixel_type_display_and_parse() {
    for ty in [PixelType::U8, PixelType::U16, PixelType::F32] {
        assert_eq!(ty.to_string().parse::<PixelType>().unwrap(), ty);
    }
    assert_eq!(PixelType::default(), PixelType::U16);
    assert_eq!(serde_json::to_string(&PixelType::F32).unwrap(), "\"f32\"");
}

#[test]
fn test_in_memory_region_matches_raw_reader() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("movie.u16");
    let video = Array3::from_shape_fn((6, 5, 7), |(t, r, c)| (t * 35 + r * 7 + c) as f64);
    write_u16_movie(&path, &video);

    let raw = RawVideoReader::open(&path, 5, 7, PixelType::U16).unwrap();
    let memory = InMemoryVideo::new(video);
    assert_eq!(raw.dims(), memory.dims());
    assert_eq!(
        raw.read_region(2..5, 1..4, 0..7).unwrap(),
        memory.read_region(2..5, 1..4, 0..7).unwrap()
    );
}

// ---------------------------------------------------------------------------
// Masks
// ---------------------------------------------------------------------------

#[test]
fn test_mask_png_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cell.png");
    let mask = Array2::from_shape_fn((9, 13), |(r, c)| (r + 2 * c) % 5 == 0);
    save_mask(&mask, &path).unwrap();
    assert_eq!(load_mask(&path).unwrap(), mask);
}

#[test]
fn test_load_mask_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_mask(&dir.path().join("absent.png")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

// ---------------------------------------------------------------------------
// End-to-end from files
// ---------------------------------------------------------------------------

#[test]
fn test_pipeline_from_raw_file_matches_in_memory() {
    let movie = synthetic_movie(&MovieSpec {
        frames: 3000,
        spike_spacing: 56,
        ..Default::default()
    });
    // Scale before quantizing to 16 bits so the noise survives rounding.
    let quantized = movie.video.mapv(|v| (v * 10.0).round());

    let dir = tempfile::tempdir().unwrap();
    let video_path = dir.path().join("movie.u16");
    let mask_path = dir.path().join("cell.png");
    write_u16_movie(&video_path, &quantized);
    save_mask(&movie.mask, &mask_path).unwrap();

    let raw = RawVideoReader::open(&video_path, 16, 16, PixelType::U16).unwrap();
    let cells = vec![CellSpec {
        cell_id: 0,
        mask: load_mask(&mask_path).unwrap(),
    }];
    let config = SpikePursuitConfig {
        context_size: 50,
        censor_size: 3,
        n_pc_bg: 4,
        n_iter: 1,
        ..Default::default()
    };

    let from_file = run_cells(&raw, &cells, &config, &SequentialExecutor).unwrap();
    let from_memory = run_cells(&InMemoryVideo::new(quantized), &cells, &config, &SequentialExecutor).unwrap();

    let a = from_file[&0].as_ref().unwrap();
    let b = from_memory[&0].as_ref().unwrap();
    assert_eq!(a.spike_times, b.spike_times);
    assert_eq!(a.trace, b.trace);
    assert!(common::recall(&movie.spikes, a.spike_times.indices(), 1) >= 0.9);
}
