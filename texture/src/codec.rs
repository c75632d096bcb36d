//! PNG loading and saving for RGBA8 images.

use core::fmt;
use std::{
    fs::File,
    io::{self, BufReader, BufWriter},
    path::Path,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbaImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug)]
pub enum LoadError {
    Io(io::Error),
    Decoding(png::DecodingError),
    UnsupportedLayout(png::ColorType, png::BitDepth),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(err) => write!(f, "I/O error: {err}"),
            LoadError::Decoding(err) => write!(f, "PNG decoding error: {err}"),
            LoadError::UnsupportedLayout(color_type, bit_depth) => {
                write!(f, "unsupported PNG layout: {color_type:?} at {bit_depth:?}")
            }
        }
    }
}

impl std::error::Error for LoadError {}

impl From<io::Error> for LoadError {
    fn from(err: io::Error) -> Self {
        LoadError::Io(err)
    }
}

impl From<png::DecodingError> for LoadError {
    fn from(err: png::DecodingError) -> Self {
        LoadError::Decoding(err)
    }
}

impl LoadError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::Io(err) if err.kind() == io::ErrorKind::NotFound)
    }
}

#[derive(Debug)]
pub enum SaveError {
    Io(io::Error),
    Encoding(png::EncodingError),
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveError::Io(err) => write!(f, "I/O error: {err}"),
            SaveError::Encoding(err) => write!(f, "PNG encoding error: {err}"),
        }
    }
}

impl std::error::Error for SaveError {}

impl From<io::Error> for SaveError {
    fn from(err: io::Error) -> Self {
        SaveError::Io(err)
    }
}

impl From<png::EncodingError> for SaveError {
    fn from(err: png::EncodingError) -> Self {
        SaveError::Encoding(err)
    }
}

/// Loads a PNG file as RGBA8, expanding palettes and synthesizing opaque alpha where the image
/// has none.
pub fn load_png(path: &Path) -> Result<RgbaImage, LoadError> {
    let mut decoder = png::Decoder::new(BufReader::new(File::open(path)?));
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder.read_info()?;
    let mut buffer = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buffer)?;
    buffer.truncate(info.buffer_size());

    if info.bit_depth != png::BitDepth::Eight {
        return Err(LoadError::UnsupportedLayout(info.color_type, info.bit_depth));
    }

    let pixels = match info.color_type {
        png::ColorType::Rgba => buffer,
        png::ColorType::Rgb => buffer
            .chunks_exact(3)
            .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 0xFF])
            .collect(),
        png::ColorType::GrayscaleAlpha => buffer
            .chunks_exact(2)
            .flat_map(|la| [la[0], la[0], la[0], la[1]])
            .collect(),
        png::ColorType::Grayscale => buffer.iter().flat_map(|&l| [l, l, l, 0xFF]).collect(),
        png::ColorType::Indexed => {
            return Err(LoadError::UnsupportedLayout(info.color_type, info.bit_depth))
        }
    };

    Ok(RgbaImage {
        width: info.width,
        height: info.height,
        pixels,
    })
}

pub fn save_png(path: &Path, width: u32, height: u32, rgba: &[u8]) -> Result<(), SaveError> {
    let mut encoder = png::Encoder::new(BufWriter::new(File::create(path)?), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(rgba)?;
    writer.finish()?;
    Ok(())
}
