//! Assembles per-texel solver results back into a dense grid, dilates the
//! UV-seam fringe, and writes PNG/TGA (via `image`) or EXR (via `exr`).

use std::fmt;

use exr::prelude::{f16, Image, SpecificChannels, Vec2 as ExrVec2, WritableImage};
use image::{ImageBuffer, Rgb};

use crate::prelude::Vec3;
use crate::uvmap::CompressedUvMap;

#[derive(Debug)]
pub enum WriteError {
    UnsupportedExtension(String),
    Io(std::io::Error),
    Image(image::ImageError),
    Exr(String),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::UnsupportedExtension(ext) => {
                write!(f, "unsupported image extension: {ext}")
            }
            WriteError::Io(e) => write!(f, "image I/O error: {e}"),
            WriteError::Image(e) => write!(f, "image encode error: {e}"),
            WriteError::Exr(msg) => write!(f, "EXR write error: {msg}"),
        }
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriteError::Io(e) => Some(e),
            WriteError::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WriteError {
    fn from(e: std::io::Error) -> Self {
        WriteError::Io(e)
    }
}

impl From<image::ImageError> for WriteError {
    fn from(e: image::ImageError) -> Self {
        WriteError::Image(e)
    }
}

enum Extension {
    Png,
    Tga,
    Exr,
}

fn classify(path: &str) -> Result<Extension, WriteError> {
    if path.ends_with(".png") {
        Ok(Extension::Png)
    } else if path.ends_with(".tga") {
        Ok(Extension::Tga)
    } else if path.ends_with(".exr") {
        Ok(Extension::Exr)
    } else {
        Err(WriteError::UnsupportedExtension(path.to_string()))
    }
}

/// Scatters a compressed-texel scalar array back into a dense `width x
/// height` grid, `None` wherever the texel was never populated.
fn assemble_scalar(map: &CompressedUvMap, values: &[f32]) -> Vec<Option<f32>> {
    let mut grid = vec![None; map.width * map.height];
    for (&cell, &v) in map.indices.iter().zip(values) {
        grid[cell as usize] = Some(v);
    }
    grid
}

fn assemble_vector(map: &CompressedUvMap, values: &[Vec3]) -> Vec<Option<Vec3>> {
    let mut grid = vec![None; map.width * map.height];
    for (&cell, &v) in map.indices.iter().zip(values) {
        grid[cell as usize] = Some(v);
    }
    grid
}

const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Ring search outward for a dilation source: for each invalid pixel, walk
/// increasing integer radii and accept the first candidate whose own eight
/// neighbors are *all* valid (so a dilated fringe is never itself used as a
/// further dilation source).
fn dilate<T: Copy>(grid: &mut [Option<T>], width: usize, height: usize, dilation: usize) {
    if dilation == 0 {
        return;
    }
    let is_valid = |grid: &[Option<T>], x: i32, y: i32| -> bool {
        if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
            return false;
        }
        grid[y as usize * width + x as usize].is_some()
    };

    let snapshot = grid.to_vec();
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            if snapshot[y as usize * width + x as usize].is_some() {
                continue;
            }
            'search: for d in 1..=dilation as i32 {
                for &(ox, oy) in &NEIGHBOR_OFFSETS {
                    let cx = x + ox * d;
                    let cy = y + oy * d;
                    let all_valid = NEIGHBOR_OFFSETS
                        .iter()
                        .all(|&(nx, ny)| is_valid(&snapshot, cx + nx, cy + ny));
                    if all_valid {
                        grid[y as usize * width + x as usize] =
                            snapshot[cy as usize * width + cx as usize];
                        break 'search;
                    }
                }
            }
        }
    }
}

fn flip_y<T: Copy>(grid: &[Option<T>], width: usize, height: usize) -> Vec<Option<T>> {
    let mut out = vec![grid[0]; width * height];
    for y in 0..height {
        let src_row = y * width;
        let dst_row = (height - y - 1) * width;
        out[dst_row..dst_row + width].copy_from_slice(&grid[src_row..src_row + width]);
    }
    out
}

/// Writes a scalar solver result (height, AO, thickness), normalizing to
/// `[0, 1]` first for PNG/TGA; EXR keeps the raw float and is never
/// normalized.
pub fn write_scalar(
    path: &str,
    map: &CompressedUvMap,
    values: &[f32],
    dilation: usize,
    normalize: bool,
) -> Result<(), WriteError> {
    let mut grid = assemble_scalar(map, values);
    dilate(&mut grid, map.width, map.height, dilation);
    let grid = flip_y(&grid, map.width, map.height);

    match classify(path)? {
        Extension::Png | Extension::Tga => {
            let (min, max) = if normalize {
                min_max(&grid)
            } else {
                (0.0, 1.0)
            };
            let scale = if max > min { 1.0 / (max - min) } else { 0.0 };
            let mut buffer = ImageBuffer::<Rgb<u8>, _>::new(map.width as u32, map.height as u32);
            for (x, y, pixel) in buffer.enumerate_pixels_mut() {
                let v = grid[y as usize * map.width + x as usize].unwrap_or(0.0);
                let scaled = ((v - min) * scale).clamp(0.0, 1.0);
                let byte = (scaled * 255.0) as u8;
                *pixel = Rgb([byte, byte, byte]);
            }
            save_raster(path, &buffer)
        }
        Extension::Exr => {
            let width = map.width;
            let channels = SpecificChannels::build()
                .with_channel("B")
                .with_pixel_fn(move |pos: ExrVec2<usize>| {
                    let v = grid[pos.y() * width + pos.x()].unwrap_or(0.0);
                    (f16::from_f32(v),)
                });
            let image = Image::from_channels((map.width, map.height), channels);
            image
                .write()
                .to_file(path)
                .map_err(|e| WriteError::Exr(e.to_string()))
        }
    }
}

fn min_max(grid: &[Option<f32>]) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for v in grid.iter().flatten() {
        min = min.min(*v);
        max = max.max(*v);
    }
    if !min.is_finite() || !max.is_finite() {
        (0.0, 0.0)
    } else {
        (min, max)
    }
}

/// Writes a vector solver result. `pack_as_normal` selects PNG/TGA's
/// `v*0.5+0.5` byte-packing convention (normals, bent normals); EXR always
/// stores the raw vector as three half-float channels regardless of this
/// flag (positions have no PNG/TGA representation in this format).
pub fn write_vector(
    path: &str,
    map: &CompressedUvMap,
    values: &[Vec3],
    dilation: usize,
    pack_as_normal: bool,
) -> Result<(), WriteError> {
    let mut grid = assemble_vector(map, values);
    dilate(&mut grid, map.width, map.height, dilation);
    let grid = flip_y(&grid, map.width, map.height);

    match classify(path)? {
        Extension::Png | Extension::Tga => {
            if !pack_as_normal {
                return Err(WriteError::UnsupportedExtension(path.to_string()));
            }
            let mut buffer = ImageBuffer::<Rgb<u8>, _>::new(map.width as u32, map.height as u32);
            for (x, y, pixel) in buffer.enumerate_pixels_mut() {
                let v = grid[y as usize * map.width + x as usize].unwrap_or(Vec3::ZERO);
                let pack = |c: f32| ((c * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0) as u8;
                *pixel = Rgb([pack(v.x), pack(v.y), pack(v.z)]);
            }
            save_raster(path, &buffer)
        }
        Extension::Exr => {
            let width = map.width;
            let channels = SpecificChannels::build()
                .with_channel("R")
                .with_channel("G")
                .with_channel("B")
                .with_pixel_fn(move |pos: ExrVec2<usize>| {
                    let v = grid[pos.y() * width + pos.x()].unwrap_or(Vec3::ZERO);
                    (f16::from_f32(v.x), f16::from_f32(v.y), f16::from_f32(v.z))
                });
            let image = Image::from_channels((map.width, map.height), channels);
            image
                .write()
                .to_file(path)
                .map_err(|e| WriteError::Exr(e.to_string()))
        }
    }
}

fn save_raster(path: &str, buffer: &ImageBuffer<Rgb<u8>, Vec<u8>>) -> Result<(), WriteError> {
    buffer.save(path)?;
    Ok(())
}
