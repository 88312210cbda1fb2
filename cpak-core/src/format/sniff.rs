//! File extension guesses from payload magic bytes.

use super::table::AssetClass;

pub fn extension(class: AssetClass, bytes: &[u8]) -> &'static str {
    let magic = |m: &[u8]| bytes.starts_with(m);
    match class {
        AssetClass::Image if magic(b"\x89PNG") => "png",
        AssetClass::Image if magic(b"\xff\xd8") => "jpg",
        AssetClass::Image if magic(b"BM") => "bmp",
        AssetClass::Image if magic(b"DDS ") => "dds",
        AssetClass::Sound if magic(b"OggS") => "ogg",
        AssetClass::Sound if magic(b"RIFF") => "wav",
        AssetClass::Font if magic(b"\x00\x01\x00\x00") || magic(b"OTTO") || magic(b"true") => "ttf",
        AssetClass::Shader => "glsl",
        _ => "bin",
    }
}
