//! Image record codec.
//!
//! A record is a fixed 50 byte little-endian header followed by a zlib stream
//! holding the raw pixels:
//!
//! ```text
//!  0  u16  width            12  u16  width (mirror 2)
//!  2  u16  height           14  u16  height (mirror 2)
//!  4  u16  width (mirror)   16  f32  hotspot x
//!  6  u16  height (mirror)  20  [26] opaque region (hotspot y @20, flags @24)
//!  8  u32  unknown          46  u16  decompressed size
//!                           48  [2]  trailer
//! ```
//!
//! Nothing in the opaque region besides hotspot y and flags is understood. It is
//! carried through untouched unless the dimensions change, in which case it is
//! zeroed by default.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{FormatError, Result};

pub const HEADER_LEN: usize = 50;
pub const OPAQUE_OFFSET: usize = 20;
pub const OPAQUE_LEN: usize = 26;
/// The decompressed size field is a u16.
pub const MAX_PIXEL_BYTES: usize = u16::MAX as usize;

const DEFAULT_FLAGS: u16 = 2;
const COMPRESSION_LEVELS: [u32; 2] = [6, 9];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dims {
    pub width: u16,
    pub height: u16,
}

impl Dims {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl std::fmt::Display for Dims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelLayout {
    #[default]
    Rgba8,
    Rgb8,
}

impl PixelLayout {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgba8 => 4,
            PixelLayout::Rgb8 => 3,
        }
    }

    /// Guess the layout from the pixel byte count.
    pub fn infer(dims: Dims, byte_len: usize) -> Option<Self> {
        let pixels = dims.pixel_count();
        if pixels == 0 {
            return None;
        }
        [PixelLayout::Rgba8, PixelLayout::Rgb8]
            .into_iter()
            .find(|l| pixels * l.bytes_per_pixel() == byte_len)
    }
}

/// The undecoded header bytes 20..46.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpaqueRegion(pub [u8; OPAQUE_LEN]);

impl OpaqueRegion {
    pub fn zeroed() -> Self {
        Self([0; OPAQUE_LEN])
    }

    pub fn is_zeroed(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

/// What to do with the opaque region when an image is re-encoded at new dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpaquePolicy {
    /// Zero bytes 20..46. Resized records kept rendering garbage otherwise; this
    /// is a mitigation, not a verified fix.
    #[default]
    ZeroOnResize,
    Preserve,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions {
    pub layout: PixelLayout,
    pub opaque_policy: OpaquePolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub width: u16,
    pub height: u16,
    pub width_copy: u16,
    pub height_copy: u16,
    pub unknown32: u32,
    pub width_copy2: u16,
    pub height_copy2: u16,
    pub hotspot_x: f32,
    pub opaque: OpaqueRegion,
    pub decompressed_size: u16,
    pub trailer: [u8; 2],
    pub payload: Vec<u8>,
}

/// A record together with its inflated pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub record: ImageRecord,
    pub pixels: Vec<u8>,
}

impl ImageRecord {
    /// Header for an image that has no original record to inherit from.
    pub fn fresh(dims: Dims) -> Self {
        let mut record = Self {
            width: dims.width,
            height: dims.height,
            width_copy: dims.width,
            height_copy: dims.height,
            unknown32: 0,
            width_copy2: dims.width,
            height_copy2: dims.height,
            hotspot_x: dims.width as f32 / 2.0,
            opaque: OpaqueRegion::zeroed(),
            decompressed_size: 0,
            trailer: [0; 2],
            payload: Vec::new(),
        };
        record.set_hotspot_y(dims.height as f32 / 2.0);
        record.set_flags(DEFAULT_FLAGS);
        record
    }

    /// Parse the header only; the payload is kept compressed.
    pub fn parse_header(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(FormatError::HeaderTooShort(bytes.len()));
        }

        let mut rdr = Cursor::new(&bytes[..HEADER_LEN]);
        let width = rdr.read_u16::<LittleEndian>()?;
        let height = rdr.read_u16::<LittleEndian>()?;
        let width_copy = rdr.read_u16::<LittleEndian>()?;
        let height_copy = rdr.read_u16::<LittleEndian>()?;
        let unknown32 = rdr.read_u32::<LittleEndian>()?;
        let width_copy2 = rdr.read_u16::<LittleEndian>()?;
        let height_copy2 = rdr.read_u16::<LittleEndian>()?;
        let hotspot_x = rdr.read_f32::<LittleEndian>()?;
        let mut opaque = [0u8; OPAQUE_LEN];
        rdr.read_exact(&mut opaque)?;
        let decompressed_size = rdr.read_u16::<LittleEndian>()?;
        let mut trailer = [0u8; 2];
        rdr.read_exact(&mut trailer)?;

        Ok(Self {
            width,
            height,
            width_copy,
            height_copy,
            unknown32,
            width_copy2,
            height_copy2,
            hotspot_x,
            opaque: OpaqueRegion(opaque),
            decompressed_size,
            trailer,
            payload: bytes[HEADER_LEN..].to_vec(),
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<DecodedImage> {
        let record = Self::parse_header(bytes)?;
        let pixels = record.inflate()?;
        Ok(DecodedImage { record, pixels })
    }

    /// Inflate the payload and check it against the declared size.
    pub fn inflate(&self) -> Result<Vec<u8>> {
        let mut pixels = Vec::with_capacity(self.decompressed_size as usize);
        // one byte past the ceiling is enough to detect an oversized stream
        ZlibDecoder::new(&self.payload[..])
            .take(MAX_PIXEL_BYTES as u64 + 1)
            .read_to_end(&mut pixels)
            .map_err(FormatError::DecompressionFailed)?;

        if pixels.len() != self.decompressed_size as usize {
            return Err(FormatError::SizeMismatch {
                declared: self.decompressed_size,
                actual: pixels.len(),
            });
        }
        Ok(pixels)
    }

    pub fn dims(&self) -> Dims {
        Dims::new(self.width, self.height)
    }

    /// All four width/height copies agree with the primary pair.
    pub fn mirrors_consistent(&self) -> bool {
        self.width_copy == self.width
            && self.width_copy2 == self.width
            && self.height_copy == self.height
            && self.height_copy2 == self.height
    }

    pub fn pixel_layout(&self) -> Option<PixelLayout> {
        PixelLayout::infer(self.dims(), self.decompressed_size as usize)
    }

    pub fn hotspot_y(&self) -> f32 {
        let b = &self.opaque.0;
        f32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    pub fn set_hotspot_y(&mut self, y: f32) {
        self.opaque.0[0..4].copy_from_slice(&y.to_le_bytes());
    }

    pub fn flags(&self) -> u16 {
        u16::from_le_bytes([self.opaque.0[4], self.opaque.0[5]])
    }

    pub fn set_flags(&mut self, flags: u16) {
        self.opaque.0[4..6].copy_from_slice(&flags.to_le_bytes());
    }

    pub fn write_header(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writer.write_u16::<LittleEndian>(self.width)?;
        writer.write_u16::<LittleEndian>(self.height)?;
        writer.write_u16::<LittleEndian>(self.width_copy)?;
        writer.write_u16::<LittleEndian>(self.height_copy)?;
        writer.write_u32::<LittleEndian>(self.unknown32)?;
        writer.write_u16::<LittleEndian>(self.width_copy2)?;
        writer.write_u16::<LittleEndian>(self.height_copy2)?;
        writer.write_f32::<LittleEndian>(self.hotspot_x)?;
        writer.write_all(&self.opaque.0)?;
        writer.write_u16::<LittleEndian>(self.decompressed_size)?;
        writer.write_all(&self.trailer)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        // writing into a Vec cannot fail
        let _ = self.write_header(&mut out);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Encode `pixels` at `dims` using this record's header as the template.
    ///
    /// When `dims` differ from the record's, all four dimension mirrors are
    /// rewritten, hotspot x is rescaled, and the opaque region handled per
    /// `options.opaque_policy`.
    pub fn encode(&self, pixels: &[u8], dims: Dims, options: &EncodeOptions) -> Result<Vec<u8>> {
        let bpp = options.layout.bytes_per_pixel();
        let needed = dims.pixel_count() * bpp;
        if needed > MAX_PIXEL_BYTES {
            return Err(FormatError::SizeLimitExceeded {
                width: dims.width,
                height: dims.height,
                bytes_per_pixel: bpp,
                needed,
            });
        }
        if pixels.len() != needed {
            return Err(FormatError::PixelCountMismatch {
                width: dims.width,
                height: dims.height,
                expected: needed,
                actual: pixels.len(),
            });
        }

        let mut header = self.clone();
        header.payload.clear();

        // all three dimension pairs are rewritten, even for a same-size template
        header.width = dims.width;
        header.height = dims.height;
        header.width_copy = dims.width;
        header.height_copy = dims.height;
        header.width_copy2 = dims.width;
        header.height_copy2 = dims.height;

        let old = self.dims();
        if dims != old {
            if old.width > 0 {
                header.hotspot_x = self.hotspot_x / old.width as f32 * dims.width as f32;
            }
            match options.opaque_policy {
                OpaquePolicy::ZeroOnResize => header.opaque = OpaqueRegion::zeroed(),
                OpaquePolicy::Preserve => {
                    if old.height > 0 {
                        header.set_hotspot_y(self.hotspot_y() / old.height as f32 * dims.height as f32);
                    }
                }
            }
            log::debug!("re-encoding {} -> {} ({:?})", old, dims, options.opaque_policy);
        }

        header.decompressed_size = needed as u16;
        header.payload = compress(pixels)?;
        Ok(header.to_bytes())
    }
}

impl DecodedImage {
    pub fn dims(&self) -> Dims {
        self.record.dims()
    }

    pub fn layout(&self) -> Option<PixelLayout> {
        PixelLayout::infer(self.dims(), self.pixels.len())
    }

    /// Pixels expanded to RGBA8, or `None` when the layout is not recognised.
    pub fn to_rgba8(&self) -> Option<Vec<u8>> {
        match self.layout()? {
            PixelLayout::Rgba8 => Some(self.pixels.clone()),
            PixelLayout::Rgb8 => Some(
                self.pixels
                    .chunks_exact(3)
                    .flat_map(|p| [p[0], p[1], p[2], 0xFF])
                    .collect(),
            ),
        }
    }
}

/// zlib-compress at a couple of levels and keep the smallest stream.
fn compress(pixels: &[u8]) -> Result<Vec<u8>> {
    let mut best: Option<Vec<u8>> = None;
    for level in COMPRESSION_LEVELS {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
        encoder.write_all(pixels)?;
        let stream = encoder.finish()?;
        if best.as_ref().map_or(true, |b| stream.len() < b.len()) {
            best = Some(stream);
        }
    }
    Ok(best.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_pixels(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        // mostly flat runs so the stream actually compresses
        (0..len).map(|i| if i % 7 == 0 { rng.gen() } else { 0x40 }).collect()
    }

    fn sample_record(dims: Dims) -> ImageRecord {
        let mut record = ImageRecord::fresh(dims);
        record.unknown32 = 0xDEAD_BEEF;
        record.hotspot_x = 10.0;
        record.set_hotspot_y(6.0);
        record.set_flags(3);
        record.opaque.0[10..20].copy_from_slice(&[0xAB; 10]);
        record.trailer = [0x12, 0x34];
        record
    }

    #[test]
    fn header_layout_offsets() {
        let dims = Dims::new(20, 12);
        let pixels = random_pixels(dims.pixel_count() * 4, 1);
        let bytes = sample_record(dims)
            .encode(&pixels, dims, &EncodeOptions::default())
            .unwrap();

        assert_eq!(&bytes[0..2], &20u16.to_le_bytes());
        assert_eq!(&bytes[2..4], &12u16.to_le_bytes());
        assert_eq!(&bytes[4..6], &20u16.to_le_bytes());
        assert_eq!(&bytes[6..8], &12u16.to_le_bytes());
        assert_eq!(&bytes[8..12], &0xDEAD_BEEFu32.to_le_bytes());
        assert_eq!(&bytes[12..14], &20u16.to_le_bytes());
        assert_eq!(&bytes[14..16], &12u16.to_le_bytes());
        assert_eq!(&bytes[16..20], &10.0f32.to_le_bytes());
        assert_eq!(&bytes[20..24], &6.0f32.to_le_bytes());
        assert_eq!(&bytes[24..26], &3u16.to_le_bytes());
        assert_eq!(&bytes[46..48], &(960u16).to_le_bytes());
        assert_eq!(&bytes[48..50], &[0x12, 0x34]);
        // zlib header
        assert_eq!(bytes[50], 0x78);
    }

    #[test]
    fn decode_encode_decode_is_pixel_identical() {
        let dims = Dims::new(24, 16);
        let pixels = random_pixels(dims.pixel_count() * 4, 7);
        let original = sample_record(dims)
            .encode(&pixels, dims, &EncodeOptions::default())
            .unwrap();

        let first = ImageRecord::decode(&original).unwrap();
        let reencoded = first
            .record
            .encode(&first.pixels, first.dims(), &EncodeOptions::default())
            .unwrap();
        let second = ImageRecord::decode(&reencoded).unwrap();

        assert_eq!(second.pixels, pixels);
        assert_eq!(second.record.opaque, first.record.opaque);
        assert_eq!(second.record.hotspot_x, first.record.hotspot_x);
        assert_eq!(second.record.trailer, first.record.trailer);
    }

    #[test]
    fn too_short_header() {
        assert!(matches!(
            ImageRecord::decode(&[0u8; 49]),
            Err(FormatError::HeaderTooShort(49))
        ));
    }

    #[test]
    fn garbage_payload_fails_to_inflate() {
        let mut bytes = ImageRecord::fresh(Dims::new(2, 2)).to_bytes();
        bytes.extend_from_slice(b"definitely not zlib");
        assert!(matches!(
            ImageRecord::decode(&bytes),
            Err(FormatError::DecompressionFailed(_))
        ));
    }

    #[test]
    fn declared_size_must_match() {
        let dims = Dims::new(4, 4);
        let pixels = vec![9u8; 64];
        let mut bytes = ImageRecord::fresh(dims)
            .encode(&pixels, dims, &EncodeOptions::default())
            .unwrap();
        bytes[46..48].copy_from_slice(&63u16.to_le_bytes());
        assert!(matches!(
            ImageRecord::decode(&bytes),
            Err(FormatError::SizeMismatch {
                declared: 63,
                actual: 64
            })
        ));
    }

    #[test]
    fn size_ceiling() {
        let dims = Dims::new(256, 256);
        let pixels = vec![0u8; 262144];
        let err = ImageRecord::fresh(Dims::new(16, 16))
            .encode(&pixels, dims, &EncodeOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            FormatError::SizeLimitExceeded { needed: 262144, .. }
        ));

        // 127x127 RGBA is the largest square that fits
        let dims = Dims::new(127, 127);
        let pixels = vec![0u8; 127 * 127 * 4];
        assert!(ImageRecord::fresh(dims)
            .encode(&pixels, dims, &EncodeOptions::default())
            .is_ok());
    }

    #[test]
    fn pixel_count_must_match_dims() {
        let dims = Dims::new(8, 8);
        assert!(matches!(
            ImageRecord::fresh(dims).encode(&[0u8; 10], dims, &EncodeOptions::default()),
            Err(FormatError::PixelCountMismatch {
                expected: 256,
                actual: 10,
                ..
            })
        ));
    }

    #[test]
    fn resize_zeroes_opaque_and_updates_mirrors() {
        let old = Dims::new(40, 20);
        let new = Dims::new(20, 10);
        let record = sample_record(old);
        let pixels = random_pixels(new.pixel_count() * 4, 3);
        let bytes = record.encode(&pixels, new, &EncodeOptions::default()).unwrap();
        let decoded = ImageRecord::decode(&bytes).unwrap();

        assert_eq!(decoded.dims(), new);
        assert!(decoded.record.mirrors_consistent());
        assert!(decoded.record.opaque.is_zeroed());
        assert_eq!(decoded.record.decompressed_size as usize, pixels.len());
        assert_eq!(decoded.record.hotspot_x, 5.0);
        assert_eq!(decoded.record.unknown32, 0xDEAD_BEEF);
        assert_eq!(decoded.pixels, pixels);
    }

    #[test]
    fn resize_can_preserve_opaque() {
        let old = Dims::new(40, 20);
        let new = Dims::new(20, 10);
        let record = sample_record(old);
        let pixels = vec![1u8; new.pixel_count() * 4];
        let options = EncodeOptions {
            opaque_policy: OpaquePolicy::Preserve,
            ..Default::default()
        };
        let decoded = ImageRecord::decode(&record.encode(&pixels, new, &options).unwrap()).unwrap();
        assert_eq!(decoded.record.hotspot_y(), 3.0);
        assert_eq!(decoded.record.flags(), 3);
        assert_eq!(decoded.record.opaque.0[10..20], [0xAB; 10]);
    }

    #[test]
    fn same_dims_keep_opaque() {
        let dims = Dims::new(8, 8);
        let record = sample_record(dims);
        let pixels = vec![5u8; 256];
        let decoded =
            ImageRecord::decode(&record.encode(&pixels, dims, &EncodeOptions::default()).unwrap())
                .unwrap();
        assert_eq!(decoded.record.opaque, record.opaque);
    }

    #[test]
    fn inconsistent_template_mirrors_are_repaired() {
        let dims = Dims::new(8, 8);
        let mut record = sample_record(dims);
        record.width_copy2 = 99;
        record.height_copy = 3;
        assert!(!record.mirrors_consistent());

        let pixels = vec![5u8; 256];
        let decoded =
            ImageRecord::decode(&record.encode(&pixels, dims, &EncodeOptions::default()).unwrap())
                .unwrap();
        assert!(decoded.record.mirrors_consistent());
        assert_eq!(decoded.dims(), dims);
        assert_eq!((decoded.record.width_copy2, decoded.record.height_copy), (8, 8));
        // same size: nothing else in the header moves
        assert_eq!(decoded.record.opaque, record.opaque);
        assert_eq!(decoded.record.hotspot_x, record.hotspot_x);
    }

    #[test]
    fn rgb_layout_is_inferred_and_expanded() {
        let dims = Dims::new(2, 1);
        let options = EncodeOptions {
            layout: PixelLayout::Rgb8,
            ..Default::default()
        };
        let bytes = ImageRecord::fresh(dims)
            .encode(&[1, 2, 3, 4, 5, 6], dims, &options)
            .unwrap();
        let decoded = ImageRecord::decode(&bytes).unwrap();
        assert_eq!(decoded.layout(), Some(PixelLayout::Rgb8));
        assert_eq!(decoded.to_rgba8().unwrap(), vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }
}
