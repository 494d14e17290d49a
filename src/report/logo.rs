//! Header logo. JPEGs are embedded as-is (DCTDecode). PNGs are decoded to 8-bit samples
//! and re-deflated (FlateDecode), with any transparency split out as a soft mask.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::path::Path;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

#[derive(Debug, thiserror::Error)]
pub enum LogoError {
    #[error("not a JPEG or PNG image")]
    UnknownFormat,
    #[error("malformed image: {0}")]
    Malformed(&'static str),
    #[error("unsupported PNG: {0}")]
    Unsupported(String),
    #[error("image data: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    Dct,
    Flate,
}

impl Filter {
    pub fn name(&self) -> &'static str {
        match self {
            Filter::Dct => "DCTDecode",
            Filter::Flate => "FlateDecode",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Logo {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub components: u8,
    pub filter: Filter,
    /// Deflated 8-bit gray soft mask.
    pub alpha: Option<Vec<u8>>,
}

impl Logo {
    pub fn color_space(&self) -> &'static str {
        match self.components {
            1 => "DeviceGray",
            4 => "DeviceCMYK",
            _ => "DeviceRGB",
        }
    }

    pub fn decode(data: Vec<u8>) -> Result<Logo, LogoError> {
        if data.starts_with(&[0xFF, 0xD8]) {
            Self::from_jpeg(data).ok_or(LogoError::Malformed("no JPEG frame header"))
        } else if data.starts_with(PNG_SIGNATURE) {
            Self::from_png(&data)
        } else {
            Err(LogoError::UnknownFormat)
        }
    }

    /// Reads the frame header out of JPEG bytes. `None` for anything that is not a JPEG.
    pub fn from_jpeg(data: Vec<u8>) -> Option<Logo> {
        if !data.starts_with(&[0xFF, 0xD8]) {
            return None;
        }
        let mut i = 2;
        while i + 4 <= data.len() {
            if data[i] != 0xFF {
                return None;
            }
            let marker = data[i + 1];
            if marker == 0xFF {
                i += 1;
                continue;
            }
            let len = usize::from(u16::from_be_bytes([data[i + 2], data[i + 3]]));
            // SOF0..SOF15 except DHT (C4), JPG (C8) and DAC (CC)
            if (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
                let sof = data.get(i + 4..i + 10)?;
                let height = u32::from(u16::from_be_bytes([sof[1], sof[2]]));
                let width = u32::from(u16::from_be_bytes([sof[3], sof[4]]));
                let components = sof[5];
                if width == 0 || height == 0 {
                    return None;
                }
                return Some(Logo {
                    data,
                    width,
                    height,
                    components,
                    filter: Filter::Dct,
                    alpha: None,
                });
            }
            i += 2 + len;
        }
        None
    }

    /// Non-interlaced PNG, 8 or 16 bits per sample (palette images: 8). CRCs are not checked.
    pub fn from_png(data: &[u8]) -> Result<Logo, LogoError> {
        let png = PngChunks::read(data)?;
        let (width, height) = (png.width as usize, png.height as usize);
        let channels = match png.color_type {
            0 => 1,
            2 => 3,
            3 => 1,
            4 => 2,
            6 => 4,
            _ => return Err(LogoError::Malformed("color type")),
        };
        match (png.color_type, png.bit_depth) {
            (3, 8) | (0 | 2 | 4 | 6, 8 | 16) => {}
            (_, depth) => return Err(LogoError::Unsupported(format!("bit depth {}", depth))),
        }
        if png.interlace != 0 {
            return Err(LogoError::Unsupported("interlaced".into()));
        }

        let sample = usize::from(png.bit_depth / 8);
        let bpp = channels * sample;
        let stride = width * bpp;
        let mut raw = Vec::new();
        ZlibDecoder::new(png.idat.as_slice()).read_to_end(&mut raw)?;
        if raw.len() < height * (stride + 1) {
            return Err(LogoError::Malformed("short image data"));
        }
        let pixels = unfilter(&raw, height, stride, bpp)?;

        let components: u8 = if matches!(png.color_type, 0 | 4) { 1 } else { 3 };
        let mut color = Vec::with_capacity(width * height * usize::from(components));
        let mut alpha = Vec::with_capacity(width * height);
        for px in pixels.chunks_exact(bpp) {
            // high byte of 16-bit samples
            let s = |k: usize| px[k * sample];
            match png.color_type {
                0 => color.push(s(0)),
                2 => color.extend_from_slice(&[s(0), s(1), s(2)]),
                3 => {
                    let index = usize::from(s(0));
                    let rgb = png
                        .palette
                        .get(index * 3..index * 3 + 3)
                        .ok_or(LogoError::Malformed("palette index"))?;
                    color.extend_from_slice(rgb);
                    alpha.push(png.transparency.get(index).copied().unwrap_or(255));
                }
                4 => {
                    color.push(s(0));
                    alpha.push(s(1));
                }
                _ => {
                    color.extend_from_slice(&[s(0), s(1), s(2)]);
                    alpha.push(s(3));
                }
            }
        }

        let alpha = if alpha.iter().any(|a| *a < 255) {
            Some(deflate(&alpha)?)
        } else {
            None
        };
        Ok(Logo {
            data: deflate(&color)?,
            width: png.width,
            height: png.height,
            components,
            filter: Filter::Flate,
            alpha,
        })
    }

    /// Load the configured logo. Problems are logged and the header falls back to text.
    pub fn load(path: &Path) -> Option<Logo> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "logo not readable");
                return None;
            }
        };
        match Self::decode(bytes) {
            Ok(logo) => Some(logo),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "logo not usable");
                None
            }
        }
    }
}

struct PngChunks<'a> {
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: u8,
    interlace: u8,
    palette: &'a [u8],
    transparency: &'a [u8],
    idat: Vec<u8>,
}

fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

impl<'a> PngChunks<'a> {
    fn read(data: &'a [u8]) -> Result<Self, LogoError> {
        let mut header = None;
        let mut palette: &[u8] = &[];
        let mut transparency: &[u8] = &[];
        let mut idat = Vec::new();
        let mut pos = PNG_SIGNATURE.len();
        while pos + 8 <= data.len() {
            let len = be_u32(&data[pos..pos + 4]) as usize;
            let kind = &data[pos + 4..pos + 8];
            let body = data
                .get(pos + 8..pos + 8 + len)
                .ok_or(LogoError::Malformed("truncated chunk"))?;
            match kind {
                b"IHDR" if body.len() >= 13 => header = Some(body),
                b"PLTE" => palette = body,
                b"tRNS" => transparency = body,
                b"IDAT" => idat.extend_from_slice(body),
                b"IEND" => break,
                _ => {}
            }
            pos += 12 + len;
        }
        let h = header.ok_or(LogoError::Malformed("missing IHDR"))?;
        let (width, height) = (be_u32(&h[0..4]), be_u32(&h[4..8]));
        if width == 0 || height == 0 {
            return Err(LogoError::Malformed("empty image"));
        }
        Ok(PngChunks {
            width,
            height,
            bit_depth: h[8],
            color_type: h[9],
            interlace: h[12],
            palette,
            transparency,
            idat,
        })
    }
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let (pa, pb, pc) = ((p - i16::from(a)).abs(), (p - i16::from(b)).abs(), (p - i16::from(c)).abs());
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Undo the per-row PNG filters. `raw` holds `height` rows of one filter byte plus `stride` bytes.
fn unfilter(raw: &[u8], height: usize, stride: usize, bpp: usize) -> Result<Vec<u8>, LogoError> {
    let mut out = vec![0u8; height * stride];
    for y in 0..height {
        let start = y * (stride + 1);
        let filter = raw[start];
        let line = &raw[start + 1..start + 1 + stride];
        let (done, rest) = out.split_at_mut(y * stride);
        let prev = if y > 0 { &done[(y - 1) * stride..] } else { &[][..] };
        let cur = &mut rest[..stride];
        for i in 0..stride {
            let a = if i >= bpp { cur[i - bpp] } else { 0 };
            let b = prev.get(i).copied().unwrap_or(0);
            let c = if i >= bpp { prev.get(i - bpp).copied().unwrap_or(0) } else { 0 };
            cur[i] = match filter {
                0 => line[i],
                1 => line[i].wrapping_add(a),
                2 => line[i].wrapping_add(b),
                3 => line[i].wrapping_add(((u16::from(a) + u16::from(b)) / 2) as u8),
                4 => line[i].wrapping_add(paeth(a, b, c)),
                _ => return Err(LogoError::Malformed("row filter")),
            };
        }
    }
    Ok(out)
}

fn deflate(bytes: &[u8]) -> Result<Vec<u8>, LogoError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
pub(crate) fn tiny_jpeg() -> Vec<u8> {
    // SOI, APP0 (JFIF), SOF0 8-bit 3x2 with 3 components, EOI
    let mut v = vec![0xFF, 0xD8];
    v.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0, 1, 1, 0, 0, 1, 0, 1, 0, 0]);
    v.extend_from_slice(&[
        0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x02, 0x00, 0x03, 0x03, 0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11,
        0x01,
    ]);
    v.extend_from_slice(&[0xFF, 0xD9]);
    v
}

/// PNG with the given header fields and already-filtered rows; CRCs left as zero.
#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32, color_type: u8, extra: &[(&[u8; 4], Vec<u8>)], rows: &[u8]) -> Vec<u8> {
    fn chunk(out: &mut Vec<u8>, kind: &[u8; 4], body: &[u8]) {
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out.extend_from_slice(&[0, 0, 0, 0]);
    }
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[8, color_type, 0, 0, 0]);

    let mut out = PNG_SIGNATURE.to_vec();
    chunk(&mut out, b"IHDR", &ihdr);
    for (kind, body) in extra {
        chunk(&mut out, kind, body);
    }
    chunk(&mut out, b"IDAT", &deflate(rows).unwrap());
    chunk(&mut out, b"IEND", &[]);
    out
}
