//! RGBA8 downscaling shared by the `optimize` command and the texture shim.
//!
//! Only shrinking is supported. A request that would keep or grow either
//! dimension returns the source unchanged.

use std::borrow::Cow;

const BPP: usize = 4;
/// Neither dimension is scaled below this.
pub const MIN_SCALED_DIM: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleFilter {
    /// Average of the 2x2 block at the mapped source position.
    Box,
    /// Four-tap interpolation, rounded half up.
    #[default]
    Bilinear,
}

impl std::str::FromStr for ResampleFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "box" => Ok(ResampleFilter::Box),
            "bilinear" | "linear" => Ok(ResampleFilter::Bilinear),
            other => Err(format!("unknown filter {:?}", other)),
        }
    }
}

/// `(max(8, floor(w * factor)), max(8, floor(h * factor)))`
pub fn scaled_dims(width: u32, height: u32, factor: f32) -> (u32, u32) {
    let scale = |v: u32| ((v as f32 * factor).floor() as u32).max(MIN_SCALED_DIM);
    (scale(width), scale(height))
}

/// Whether `dst` is a real reduction of `src`.
pub fn is_downscale(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> bool {
    dst_w > 0 && dst_h > 0 && dst_w < src_w && dst_h < src_h
}

fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BPP
}

pub fn resample(
    src: &[u8],
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
    filter: ResampleFilter,
) -> Cow<'_, [u8]> {
    if !is_downscale(src_w, src_h, dst_w, dst_h) || src.len() < byte_len(src_w, src_h) {
        return Cow::Borrowed(src);
    }
    let mut dst = vec![0u8; byte_len(dst_w, dst_h)];
    resample_into(src, src_w, src_h, &mut dst, dst_w, dst_h, filter);
    Cow::Owned(dst)
}

/// Resample into a caller-provided buffer of at least `dst_w * dst_h * 4` bytes.
///
/// Returns `false` and leaves `dst` untouched when the request is not a
/// downscale or either buffer is too small.
pub fn resample_into(
    src: &[u8],
    src_w: u32,
    src_h: u32,
    dst: &mut [u8],
    dst_w: u32,
    dst_h: u32,
    filter: ResampleFilter,
) -> bool {
    if !is_downscale(src_w, src_h, dst_w, dst_h)
        || src.len() < byte_len(src_w, src_h)
        || dst.len() < byte_len(dst_w, dst_h)
    {
        return false;
    }

    let src = Plane {
        data: src,
        width: src_w as usize,
        height: src_h as usize,
    };
    let dst = &mut dst[..byte_len(dst_w, dst_h)];
    match filter {
        ResampleFilter::Box => box_filter(&src, dst, dst_w as usize, dst_h as usize),
        ResampleFilter::Bilinear => bilinear(&src, dst, dst_w as usize, dst_h as usize),
    }
    true
}

struct Plane<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
}

impl Plane<'_> {
    #[inline]
    fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let i = (y * self.width + x) * BPP;
        &self.data[i..i + BPP]
    }
}

fn box_filter(src: &Plane<'_>, dst: &mut [u8], dst_w: usize, dst_h: usize) {
    let scale_x = src.width as f32 / dst_w as f32;
    let scale_y = src.height as f32 / dst_h as f32;

    for (y, row) in dst.chunks_exact_mut(dst_w * BPP).enumerate() {
        let sy = ((y as f32 * scale_y) as usize).min(src.height - 1);
        for (x, out) in row.chunks_exact_mut(BPP).enumerate() {
            let sx = ((x as f32 * scale_x) as usize).min(src.width - 1);

            let mut acc = [0u32; BPP];
            let mut samples = 0;
            for yy in sy..(sy + 2).min(src.height) {
                for xx in sx..(sx + 2).min(src.width) {
                    for (a, v) in acc.iter_mut().zip(src.pixel(xx, yy)) {
                        *a += *v as u32;
                    }
                    samples += 1;
                }
            }
            for (o, a) in out.iter_mut().zip(acc) {
                *o = (a / samples) as u8;
            }
        }
    }
}

fn bilinear(src: &Plane<'_>, dst: &mut [u8], dst_w: usize, dst_h: usize) {
    let x_ratio = (src.width - 1) as f32 / dst_w as f32;
    let y_ratio = (src.height - 1) as f32 / dst_h as f32;

    for (y, row) in dst.chunks_exact_mut(dst_w * BPP).enumerate() {
        let gy = y as f32 * y_ratio;
        let y0 = gy as usize;
        let fy = gy - y0 as f32;
        let y1 = (y0 + 1).min(src.height - 1);

        for (x, out) in row.chunks_exact_mut(BPP).enumerate() {
            let gx = x as f32 * x_ratio;
            let x0 = gx as usize;
            let fx = gx - x0 as f32;
            let x1 = (x0 + 1).min(src.width - 1);

            let p00 = src.pixel(x0, y0);
            let p10 = src.pixel(x1, y0);
            let p01 = src.pixel(x0, y1);
            let p11 = src.pixel(x1, y1);

            for c in 0..BPP {
                let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
                    + p10[c] as f32 * fx * (1.0 - fy)
                    + p01[c] as f32 * (1.0 - fx) * fy
                    + p11[c] as f32 * fx * fy;
                out[c] = (v + 0.5) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
        px.repeat((w * h) as usize)
    }

    #[test]
    fn scaled_dims_floor_and_clamp() {
        assert_eq!(scaled_dims(256, 128, 0.5), (128, 64));
        assert_eq!(scaled_dims(101, 33, 0.5), (50, 16));
        assert_eq!(scaled_dims(12, 64, 0.5), (8, 32));
        assert_eq!(scaled_dims(64, 64, 1.0), (64, 64));
    }

    #[test]
    fn non_shrinking_request_is_identity() {
        let src = solid(16, 16, [1, 2, 3, 4]);
        for (w, h) in [(16, 8), (8, 16), (32, 32), (16, 16)] {
            let out = resample(&src, 16, 16, w, h, ResampleFilter::Bilinear);
            assert!(matches!(out, Cow::Borrowed(_)));
            assert_eq!(&*out, &src[..]);
        }
        let mut dst = vec![0xAA; 16];
        assert!(!resample_into(&src, 16, 16, &mut dst, 16, 1, ResampleFilter::Box));
        assert_eq!(dst, vec![0xAA; 16]);
    }

    #[test]
    fn solid_colour_survives_both_filters() {
        let src = solid(64, 32, [200, 100, 50, 255]);
        for filter in [ResampleFilter::Box, ResampleFilter::Bilinear] {
            let out = resample(&src, 64, 32, 32, 16, filter);
            assert_eq!(out.len(), 32 * 16 * 4);
            assert!(out.chunks_exact(4).all(|p| p == [200, 100, 50, 255]));
        }
    }

    #[test]
    fn box_averages_two_by_two_blocks() {
        // 4x2 source: left block dark, right block light
        #[rustfmt::skip]
        let src = [
            0, 0, 0, 0,   10, 10, 10, 10,   100, 100, 100, 100,   101, 101, 101, 101,
            20, 20, 20, 20,   30, 30, 30, 30,   102, 102, 102, 102,   103, 103, 103, 103,
        ];
        let out = resample(&src, 4, 2, 2, 1, ResampleFilter::Box);
        assert_eq!(&*out, &[15, 15, 15, 15, 101, 101, 101, 101]);
    }

    #[test]
    fn bilinear_rounds_half_up() {
        // 3x3 source, only the top-left pixel differs; ratio (3-1)/2 = 1.0 hits
        // source pixels exactly
        let mut src = solid(3, 3, [0, 0, 0, 0]);
        src[..4].copy_from_slice(&[255, 128, 1, 9]);
        let out = resample(&src, 3, 3, 2, 2, ResampleFilter::Bilinear);
        assert_eq!(&out[..4], &[255, 128, 1, 9]);
        assert_eq!(&out[4..], &[0; 12]);
    }

    #[test]
    fn deterministic() {
        let src: Vec<u8> = (0..32 * 32 * 4).map(|i| (i * 31 % 251) as u8).collect();
        let a = resample(&src, 32, 32, 13, 9, ResampleFilter::Bilinear).into_owned();
        let b = resample(&src, 32, 32, 13, 9, ResampleFilter::Bilinear).into_owned();
        assert_eq!(a, b);
    }

    #[test]
    fn parse_filter_names() {
        assert_eq!("box".parse::<ResampleFilter>().unwrap(), ResampleFilter::Box);
        assert_eq!(" Bilinear".parse::<ResampleFilter>().unwrap(), ResampleFilter::Bilinear);
        assert!("lanczos".parse::<ResampleFilter>().is_err());
    }
}
