//! GeoTIFF reading and writing.
//!
//! Only the georeferencing this workflow needs is handled: a north-up
//! ModelPixelScale + ModelTiepoint pair, the EPSG code from the
//! GeoKeyDirectory and the GDAL no-data tag. Written files are LZW
//! compressed.

use crate::crs::Crs;
use crate::raster::{GeoTransform, Pixel, Raster};
use crate::{GeoError, Result};
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype;
use tiff::encoder::compression::Lzw;
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;

/// TIFF magic for little- and big-endian files.
pub fn is_tiff(bytes: &[u8]) -> bool {
    bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*")
}

/// Pixel types that can be written to a GeoTIFF.
pub trait GeoTiffPixel: Pixel {
    /// Write `raster` as the first image of `encoder`.
    fn write_image<W: Write + Seek>(encoder: &mut TiffEncoder<W>, raster: &Raster<Self>) -> Result<()>;

    /// Text form of a no-data value for the GDAL_NODATA tag.
    fn nodata_text(value: Self) -> String;

    /// Parse the GDAL_NODATA tag.
    fn parse_nodata(text: &str) -> Option<Self>;
}

macro_rules! impl_geotiff_pixel {
    ($t:ty, $color:ty) => {
        impl GeoTiffPixel for $t {
            fn write_image<W: Write + Seek>(
                encoder: &mut TiffEncoder<W>,
                raster: &Raster<Self>,
            ) -> Result<()> {
                let (rows, cols) = raster.shape();
                let mut image = encoder.new_image_with_compression::<$color, _>(
                    cols as u32,
                    rows as u32,
                    Lzw::default(),
                )?;
                write_geo_tags(image.encoder(), raster)?;
                let data: Vec<$t> = raster.data().iter().copied().collect();
                image.write_data(&data)?;
                Ok(())
            }

            fn nodata_text(value: Self) -> String {
                value.to_string()
            }

            fn parse_nodata(text: &str) -> Option<Self> {
                let text = text.trim().trim_end_matches('\0');
                if text.eq_ignore_ascii_case("nan") {
                    return Some(<$t as Pixel>::from_f64(f64::NAN));
                }
                text.parse::<$t>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().map(<$t as Pixel>::from_f64))
            }
        }
    };
}

impl_geotiff_pixel!(u8, colortype::Gray8);
impl_geotiff_pixel!(u16, colortype::Gray16);
impl_geotiff_pixel!(i16, colortype::GrayI16);
impl_geotiff_pixel!(f32, colortype::Gray32Float);

fn write_geo_tags<W: Write + Seek, K: TiffKind, T: GeoTiffPixel>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    raster: &Raster<T>,
) -> Result<()> {
    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    dir.write_tag(Tag::from_u16_exhaustive(TAG_MODEL_PIXEL_SCALE), &scale[..])?;
    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    dir.write_tag(Tag::from_u16_exhaustive(TAG_MODEL_TIEPOINT), &tiepoint[..])?;

    let mut keys: Vec<u16> = vec![1, 1, 0, 0];
    let mut push_key = |key: u16, value: u16| {
        keys.extend_from_slice(&[key, 0, 1, value]);
        keys[3] += 1;
    };
    match raster.crs() {
        Some(crs) if crs.is_geographic() => {
            push_key(KEY_MODEL_TYPE, 2);
            push_key(KEY_RASTER_TYPE, 1);
            push_key(KEY_GEOGRAPHIC_TYPE, crs.epsg() as u16);
        }
        Some(crs) => {
            push_key(KEY_MODEL_TYPE, 1);
            push_key(KEY_RASTER_TYPE, 1);
            push_key(KEY_PROJECTED_CS_TYPE, crs.epsg() as u16);
        }
        None => push_key(KEY_RASTER_TYPE, 1),
    }
    dir.write_tag(Tag::from_u16_exhaustive(TAG_GEO_KEY_DIRECTORY), &keys[..])?;

    if let Some(nodata) = raster.nodata() {
        let text = T::nodata_text(nodata);
        dir.write_tag(Tag::from_u16_exhaustive(TAG_GDAL_NODATA), text.as_str())?;
    }
    Ok(())
}

/// Write a raster to a GeoTIFF file, replacing any existing file.
pub fn write_geotiff<T: GeoTiffPixel, P: AsRef<Path>>(raster: &Raster<T>, path: P) -> Result<()> {
    let file = std::io::BufWriter::new(std::fs::File::create(path.as_ref())?);
    let mut encoder = TiffEncoder::new(file)?;
    T::write_image(&mut encoder, raster)
}

/// Encode a raster as GeoTIFF bytes.
pub fn write_geotiff_to_vec<T: GeoTiffPixel>(raster: &Raster<T>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buf))?;
        T::write_image(&mut encoder, raster)?;
    }
    Ok(buf)
}

/// Read a GeoTIFF file.
pub fn read_geotiff<T: GeoTiffPixel, P: AsRef<Path>>(path: P) -> Result<Raster<T>> {
    let file = std::io::BufReader::new(std::fs::File::open(path.as_ref())?);
    decode(file)
}

/// Read a GeoTIFF held in memory.
pub fn read_geotiff_from_bytes<T: GeoTiffPixel>(bytes: &[u8]) -> Result<Raster<T>> {
    if !is_tiff(bytes) {
        return Err(GeoError::InvalidGeoTiff("missing TIFF header".to_string()));
    }
    decode(Cursor::new(bytes))
}

fn decode<T: GeoTiffPixel, R: Read + Seek>(reader: R) -> Result<Raster<T>> {
    let mut decoder = Decoder::new(reader)?;

    // Allow large mosaics
    let mut limits = Limits::default();
    limits.decoding_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.intermediate_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.ifd_value_size = 1024 * 1024 * 1024;
    decoder = decoder.with_limits(limits);

    let (width, height) = decoder.dimensions()?;
    let transform = read_transform(&mut decoder)?;
    let crs = read_crs(&mut decoder);
    let nodata = decoder
        .get_tag_ascii_string(Tag::from_u16_exhaustive(TAG_GDAL_NODATA))
        .ok()
        .and_then(|s| T::parse_nodata(&s));

    let values = decode_values::<T, R>(&mut decoder)?;
    Ok(Raster::from_vec(values, height as usize, width as usize, transform, crs)?.with_nodata(nodata))
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_TIEPOINT));
    let scale = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_PIXEL_SCALE));

    match (tiepoint, scale) {
        (Ok(tiepoint), Ok(scale)) if tiepoint.len() >= 6 && scale.len() >= 2 => {
            // Tiepoint format: [i, j, k, x, y, z] ties raster (i, j) to model (x, y)
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
        }
        _ => Err(GeoError::InvalidGeoTiff(
            "missing ModelTiepoint/ModelPixelScale tags".to_string(),
        )),
    }
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<Crs> {
    let keys = decoder
        .get_tag_u16_vec(Tag::from_u16_exhaustive(TAG_GEO_KEY_DIRECTORY))
        .ok()?;
    let count = *keys.get(3)? as usize;
    let mut geographic = None;
    let mut projected = None;
    for entry in keys.chunks_exact(4).skip(1).take(count) {
        // Inline SHORT values only (TIFFTagLocation == 0)
        if entry[1] != 0 {
            continue;
        }
        match entry[0] {
            KEY_PROJECTED_CS_TYPE => projected = Some(entry[3] as u32),
            KEY_GEOGRAPHIC_TYPE => geographic = Some(entry[3] as u32),
            _ => {}
        }
    }
    projected
        .or(geographic)
        .and_then(|code| Crs::from_epsg(code).ok())
}

fn decode_values<T: Pixel, R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Vec<T>> {
    let result = decoder.read_image()?;

    let values = match result {
        DecodingResult::U8(data) => data.into_iter().map(|v| T::from_f64(v as f64)).collect(),
        DecodingResult::U16(data) => data.into_iter().map(|v| T::from_f64(v as f64)).collect(),
        DecodingResult::U32(data) => data.into_iter().map(|v| T::from_f64(v as f64)).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| T::from_f64(v as f64)).collect(),
        DecodingResult::I8(data) => data.into_iter().map(|v| T::from_f64(v as f64)).collect(),
        DecodingResult::I16(data) => data.into_iter().map(|v| T::from_f64(v as f64)).collect(),
        DecodingResult::I32(data) => data.into_iter().map(|v| T::from_f64(v as f64)).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| T::from_f64(v as f64)).collect(),
        DecodingResult::F32(data) => data.into_iter().map(|v| T::from_f64(v as f64)).collect(),
        DecodingResult::F64(data) => data.into_iter().map(T::from_f64).collect(),
    };
    Ok(values)
}
