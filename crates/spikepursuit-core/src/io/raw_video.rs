use std::fs::File;
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;
use ndarray::Array3;
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpikePursuitError};

use super::video::{check_region, VideoSource};

/// Sample type of a headerless raw recording.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    U8,
    #[default]
    U16,
    F32,
}

impl PixelType {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::F32 => 4,
        }
    }
}

impl FromStr for PixelType {
    type Err = SpikePursuitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "u8" | "uint8" => Ok(Self::U8),
            "u16" | "uint16" => Ok(Self::U16),
            "f32" | "float32" => Ok(Self::F32),
            other => Err(SpikePursuitError::InvalidVideo(format!(
                "unknown pixel type '{other}' (expected u8, u16 or f32)"
            ))),
        }
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::U8 => write!(f, "u8"),
            Self::U16 => write!(f, "u16"),
            Self::F32 => write!(f, "f32"),
        }
    }
}

/// Memory-mapped headerless recording: little-endian samples, frame-major,
/// each frame stored row-major.
pub struct RawVideoReader {
    mmap: Mmap,
    pixel_type: PixelType,
    frames: usize,
    height: usize,
    width: usize,
}

impl RawVideoReader {
    /// Map a raw file of `height x width` frames. The frame count is
    /// derived from the file size, which must be a whole number of frames.
    pub fn open(path: &Path, height: usize, width: usize, pixel_type: PixelType) -> Result<Self> {
        if height == 0 || width == 0 {
            return Err(SpikePursuitError::InvalidVideo(format!(
                "frame size {height}x{width} must be non-zero"
            )));
        }
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(SpikePursuitError::InvalidVideo("file holds no frames".into()));
        }
        let mmap = unsafe { Mmap::map(&file)? };

        let frame_bytes = height
            .checked_mul(width)
            .and_then(|p| p.checked_mul(pixel_type.bytes_per_sample()))
            .ok_or_else(|| SpikePursuitError::InvalidVideo("frame size overflows".into()))?;
        if mmap.len() % frame_bytes != 0 {
            return Err(SpikePursuitError::InvalidVideo(format!(
                "file size {} is not a multiple of the {frame_bytes}-byte frame",
                mmap.len()
            )));
        }
        let frames = mmap.len() / frame_bytes;

        Ok(Self {
            mmap,
            pixel_type,
            frames,
            height,
            width,
        })
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    fn sample(&self, offset: usize) -> f64 {
        let bytes = &self.mmap[offset..offset + self.pixel_type.bytes_per_sample()];
        match self.pixel_type {
            PixelType::U8 => widen(bytes[0]),
            PixelType::U16 => widen(LittleEndian::read_u16(bytes)),
            PixelType::F32 => widen(LittleEndian::read_f32(bytes)),
        }
    }
}

fn widen<T: AsPrimitive<f64>>(v: T) -> f64 {
    v.as_()
}

impl VideoSource for RawVideoReader {
    fn dims(&self) -> (usize, usize, usize) {
        (self.frames, self.height, self.width)
    }

    fn read_region(
        &self,
        frames: Range<usize>,
        rows: Range<usize>,
        cols: Range<usize>,
    ) -> Result<Array3<f64>> {
        check_region(self.dims(), &frames, &rows, &cols)?;
        let bps = self.pixel_type.bytes_per_sample();
        let frame_len = self.height * self.width;
        let (t0, r0, c0) = (frames.start, rows.start, cols.start);
        Ok(Array3::from_shape_fn(
            (frames.len(), rows.len(), cols.len()),
            |(t, r, c)| {
                let index = (t0 + t) * frame_len + (r0 + r) * self.width + (c0 + c);
                self.sample(index * bps)
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn pixel_type_parses() {
        assert_eq!("U16".parse::<PixelType>().unwrap(), PixelType::U16);
        assert_eq!("float32".parse::<PixelType>().unwrap(), PixelType::F32);
        assert!("i64".parse::<PixelType>().is_err());
    }

    #[test]
    fn reads_u16_region() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        // 2 frames of 2x3.
        for v in 0u16..12 {
            file.write_all(&(v * 10).to_le_bytes()).unwrap();
        }
        file.flush().unwrap();
        let reader = RawVideoReader::open(file.path(), 2, 3, PixelType::U16).unwrap();
        assert_eq!(reader.dims(), (2, 2, 3));
        let region = reader.read_region(1..2, 1..2, 1..3).unwrap();
        assert_eq!(region.iter().copied().collect::<Vec<_>>(), vec![100.0, 110.0]);
    }

    #[test]
    fn partial_frame_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 7]).unwrap();
        file.flush().unwrap();
        let err = RawVideoReader::open(file.path(), 2, 2, PixelType::U8).err().unwrap();
        assert!(matches!(err, SpikePursuitError::InvalidVideo(_)));
    }
}
