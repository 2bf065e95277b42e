//! Page image extraction for scanned PDFs.
//!
//! A scanned page is an image XObject painted over the page box. The largest
//! image on the page is taken to be the scan. Encoded formats the OCR engine
//! can read (JPEG, JPEG2000) are passed through untouched; raw pixel data and
//! CCITT fax streams are re-encoded as PNG.

use std::io::Cursor;

use lopdf::{Dictionary, Stream};
use pdfner_core::PageImage;

use crate::document::{PageId, PdfDocument};
use crate::PdfError;

/// Colour model of a raw image stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorModel {
    Gray,
    Rgb,
    Cmyk,
}

impl ColorModel {
    fn channels(self) -> usize {
        match self {
            ColorModel::Gray => 1,
            ColorModel::Rgb => 3,
            ColorModel::Cmyk => 4,
        }
    }

    fn from_component_count(n: i64) -> Option<Self> {
        match n {
            1 => Some(ColorModel::Gray),
            3 => Some(ColorModel::Rgb),
            4 => Some(ColorModel::Cmyk),
            _ => None,
        }
    }
}

/// Geometry and sample layout of a raw image stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RasterLayout {
    width: u32,
    height: u32,
    bits_per_component: u8,
    color: ColorModel,
}

impl RasterLayout {
    fn row_bytes(&self) -> usize {
        (self.width as usize * self.color.channels() * self.bits_per_component as usize)
            .div_ceil(8)
    }

    fn byte_len(&self) -> usize {
        self.row_bytes() * self.height as usize
    }
}

impl PdfDocument {
    /// Extract the scan image of a page.
    ///
    /// Returns [`PdfError::NoPageImage`] when the page has no image XObject
    /// and [`PdfError::UnsupportedImage`] when the largest one cannot be
    /// decoded.
    pub fn page_image(&self, page: PageId) -> Result<PageImage, PdfError> {
        let (name, stream) = self
            .largest_page_image(page)?
            .ok_or(PdfError::NoPageImage(page.0))?;

        let width = dict_u32(&stream.dict, b"Width")
            .ok_or_else(|| PdfError::UnsupportedImage(format!("{name}: missing Width")))?;
        let height = dict_u32(&stream.dict, b"Height")
            .ok_or_else(|| PdfError::UnsupportedImage(format!("{name}: missing Height")))?;
        if width == 0 || height == 0 {
            return Err(PdfError::UnsupportedImage(format!(
                "{name}: empty image ({width}x{height})"
            )));
        }

        let (bytes, extension) = match first_filter(&stream.dict).as_deref() {
            Some("DCTDecode") => (stream.content.clone(), "jpg"),
            Some("JPXDecode") => (stream.content.clone(), "jp2"),
            Some("CCITTFaxDecode") => {
                let png = decode_ccitt(&stream.dict, &stream.content, width).ok_or_else(|| {
                    PdfError::UnsupportedImage(format!("{name}: undecodable CCITT stream"))
                })?;
                (png, "png")
            }
            _ => {
                let layout = self.raster_layout(&stream.dict, width, height).ok_or_else(|| {
                    PdfError::UnsupportedImage(format!("{name}: unsupported colour space"))
                })?;
                let samples = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                let png = encode_png(&layout, &samples).ok_or_else(|| {
                    PdfError::UnsupportedImage(format!(
                        "{name}: expected {} bytes of samples, got {}",
                        layout.byte_len(),
                        samples.len()
                    ))
                })?;
                (png, "png")
            }
        };

        Ok(PageImage {
            bytes,
            extension,
            width,
            height,
        })
    }

    /// The image XObject with the most pixels on a page, with its resource name.
    fn largest_page_image(&self, page: PageId) -> Result<Option<(String, &Stream)>, PdfError> {
        let page_dict = self.page_dict(page)?;

        let Some(xobjects) = page_dict
            .get(b"Resources")
            .ok()
            .and_then(|r| self.resolve_dict(r))
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| self.resolve_dict(x))
        else {
            return Ok(None);
        };

        let best = xobjects
            .iter()
            .filter_map(|(name, obj)| {
                let stream = self.resolve(obj).as_stream().ok()?;
                let is_image = stream
                    .dict
                    .get(b"Subtype")
                    .ok()
                    .and_then(|o| o.as_name().ok())
                    .is_some_and(|n| n == b"Image");
                if !is_image {
                    return None;
                }
                let area = u64::from(dict_u32(&stream.dict, b"Width")?)
                    * u64::from(dict_u32(&stream.dict, b"Height")?);
                Some((area, String::from_utf8_lossy(name).into_owned(), stream))
            })
            .max_by_key(|(area, _, _)| *area)
            .map(|(_, name, stream)| (name, stream));

        Ok(best)
    }

    fn raster_layout(&self, dict: &Dictionary, width: u32, height: u32) -> Option<RasterLayout> {
        let bits_per_component = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(8);
        if !matches!(bits_per_component, 1 | 2 | 4 | 8) {
            return None;
        }

        let color = match dict.get(b"ColorSpace").map(|o| self.resolve(o)) {
            Ok(lopdf::Object::Name(name)) => match name.as_slice() {
                b"DeviceGray" | b"CalGray" => ColorModel::Gray,
                b"DeviceRGB" | b"CalRGB" => ColorModel::Rgb,
                b"DeviceCMYK" => ColorModel::Cmyk,
                _ => return None,
            },
            // [/ICCBased <stream>]: the stream's /N gives the component count.
            Ok(lopdf::Object::Array(arr)) => {
                let family = arr.first()?.as_name().ok()?;
                if family != b"ICCBased" {
                    return None;
                }
                let profile = self.resolve(arr.get(1)?).as_stream().ok()?;
                let n = profile.dict.get(b"N").ok()?.as_i64().ok()?;
                ColorModel::from_component_count(n)?
            }
            // Image masks and streams without a colour space are 1-component.
            Err(_) => ColorModel::Gray,
            Ok(_) => return None,
        };

        Some(RasterLayout {
            width,
            height,
            bits_per_component: bits_per_component as u8,
            color,
        })
    }
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    dict.get(key)
        .ok()?
        .as_i64()
        .ok()
        .and_then(|v| u32::try_from(v).ok())
}

/// First entry of the stream's `Filter`, which may be a name or an array.
fn first_filter(dict: &Dictionary) -> Option<String> {
    let filter = dict.get(b"Filter").ok()?;
    let name = match filter {
        lopdf::Object::Name(name) => name.as_slice(),
        lopdf::Object::Array(arr) => arr.first()?.as_name().ok()?,
        _ => return None,
    };
    Some(String::from_utf8_lossy(name).into_owned())
}

/// Scale packed samples of any supported depth to one byte per component.
fn unpack_samples(samples: &[u8], layout: &RasterLayout) -> Vec<u8> {
    if layout.bits_per_component == 8 {
        return samples.to_vec();
    }

    let bpc = layout.bits_per_component as usize;
    let per_row = layout.width as usize * layout.color.channels();
    let max = (1u16 << bpc) - 1;
    let mut out = Vec::with_capacity(per_row * layout.height as usize);

    for row in samples.chunks(layout.row_bytes()) {
        for i in 0..per_row {
            let bit = i * bpc;
            let shift = 8 - bpc - (bit % 8);
            let value = (row[bit / 8] >> shift) as u16 & max;
            out.push((value * 255 / max) as u8);
        }
    }

    out
}

fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    cmyk.chunks_exact(4)
        .flat_map(|px| {
            let k = px[3] as u16;
            [px[0], px[1], px[2]].map(|c| 255u16.saturating_sub((c as u16 + k).min(255)) as u8)
        })
        .collect()
}

fn encode_png(layout: &RasterLayout, samples: &[u8]) -> Option<Vec<u8>> {
    if samples.len() < layout.byte_len() {
        return None;
    }
    let samples = unpack_samples(&samples[..layout.byte_len()], layout);

    let image = match layout.color {
        ColorModel::Gray => image::DynamicImage::ImageLuma8(image::GrayImage::from_raw(
            layout.width,
            layout.height,
            samples,
        )?),
        ColorModel::Rgb => image::DynamicImage::ImageRgb8(image::RgbImage::from_raw(
            layout.width,
            layout.height,
            samples,
        )?),
        ColorModel::Cmyk => image::DynamicImage::ImageRgb8(image::RgbImage::from_raw(
            layout.width,
            layout.height,
            cmyk_to_rgb(&samples),
        )?),
    };

    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .ok()?;
    Some(buf)
}

/// Decode a CCITT Group 4 stream into a grayscale PNG (black = 0).
fn decode_ccitt(dict: &Dictionary, data: &[u8], width: u32) -> Option<Vec<u8>> {
    let parms = match dict.get(b"DecodeParms").ok()? {
        lopdf::Object::Dictionary(d) => d,
        lopdf::Object::Array(arr) => arr.first()?.as_dict().ok()?,
        _ => return None,
    };

    // Only pure two-dimensional (G4) encoding is supported.
    let k = parms.get(b"K").ok().and_then(|o| o.as_i64().ok()).unwrap_or(0);
    if k >= 0 {
        return None;
    }

    let columns = dict_u32(parms, b"Columns").unwrap_or(1728).min(width.max(1));
    let columns = u16::try_from(columns).ok()?;
    let rows = dict_u32(parms, b"Rows").and_then(|r| u16::try_from(r).ok());
    let black_is_1 = parms
        .get(b"BlackIs1")
        .ok()
        .and_then(|o| o.as_bool().ok())
        .unwrap_or(false);

    let mut pixels: Vec<u8> = Vec::new();
    let mut decoded_rows: u32 = 0;
    fax::decoder::decode_g4(data.iter().copied(), columns, rows, |transitions| {
        pixels.extend(transitions_to_row(transitions, columns));
        decoded_rows += 1;
    })?;

    if decoded_rows == 0 {
        return None;
    }
    if black_is_1 {
        pixels.iter_mut().for_each(|p| *p = 255 - *p);
    }

    let image = image::GrayImage::from_raw(columns as u32, decoded_rows, pixels)?;
    let mut buf = Vec::new();
    image::DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .ok()?;
    Some(buf)
}

/// Expand fax colour transitions into one row of 8-bit pixels.
///
/// Rows start white; each transition position flips the colour.
fn transitions_to_row(transitions: &[u16], width: u16) -> Vec<u8> {
    let mut row = vec![255u8; width as usize];
    let mut black = false;
    let mut from = 0usize;
    for &pos in transitions.iter().chain(std::iter::once(&width)) {
        let to = (pos as usize).min(width as usize);
        if black && from < to {
            row[from..to].fill(0);
        }
        from = to;
        black = !black;
    }
    row
}
