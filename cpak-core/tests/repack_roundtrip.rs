use cpak_core::format::{
    repack, AssetClass, Container, Dims, EncodeOptions, ImageRecord, Replacements, TableCounts,
    TableEntry,
};
use pretty_assertions::assert_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn image_record(rng: &mut StdRng, dims: Dims) -> Vec<u8> {
    let pixels: Vec<u8> = (0..dims.pixel_count() * 4)
        .map(|i| if i % 5 == 0 { rng.gen() } else { 0 })
        .collect();
    ImageRecord::fresh(dims)
        .encode(&pixels, dims, &EncodeOptions::default())
        .unwrap()
}

fn build(classes: &[Vec<Vec<u8>>; 4]) -> (Vec<u8>, TableCounts) {
    let counts = TableCounts::new(
        classes[0].len(),
        classes[1].len(),
        classes[2].len(),
        classes[3].len(),
    );
    let mut index = Vec::new();
    let mut payload = Vec::new();
    for asset in classes.iter().flatten() {
        TableEntry::new((counts.index_len() + payload.len()) as u32, asset.len() as u32)
            .write(&mut index)
            .unwrap();
        payload.extend_from_slice(asset);
    }
    index.extend(payload);
    (index, counts)
}

fn sample_container() -> Container {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let images = (0..6)
        .map(|i| image_record(&mut rng, Dims::new(8 + i * 4, 8 + i)))
        .collect();
    let sounds = vec![b"OggS\x00\x02 first".to_vec(), b"RIFF....WAVE".to_vec()];
    let fonts = vec![b"\x00\x01\x00\x00font".to_vec()];
    let shaders = vec![b"void main() {}".to_vec(), Vec::new()];
    let (bytes, counts) = build(&[images, sounds, fonts, shaders]);
    Container::load(bytes, counts).unwrap()
}

#[test]
fn repack_without_replacements_preserves_every_asset() {
    let original = sample_container();
    let rebuilt = Container::load(repack(&original, &Replacements::new()).unwrap(), original.counts())
        .unwrap();
    rebuilt.validate().unwrap();

    for class in [AssetClass::Sound, AssetClass::Font, AssetClass::Shader] {
        for index in 0..original.table(class).len() {
            assert_eq!(
                rebuilt.asset(class, index).unwrap(),
                original.asset(class, index).unwrap()
            );
        }
    }
    for index in 0..original.table(AssetClass::Image).len() {
        let a = ImageRecord::decode(original.asset(AssetClass::Image, index).unwrap()).unwrap();
        let b = ImageRecord::decode(rebuilt.asset(AssetClass::Image, index).unwrap()).unwrap();
        assert_eq!(a.pixels, b.pixels);
        assert_eq!(a.dims(), b.dims());
    }
    assert_eq!(original.serialize().unwrap(), rebuilt.as_bytes());
}

#[test]
fn downscaled_image_replacement_round_trips() {
    let original = sample_container();
    let source = ImageRecord::decode(original.asset(AssetClass::Image, 5).unwrap()).unwrap();
    let old = source.dims();
    let new = Dims::new(old.width / 2, old.height / 2);
    let pixels = cpak_core::resample::resample(
        &source.pixels,
        old.width as u32,
        old.height as u32,
        new.width as u32,
        new.height as u32,
        cpak_core::resample::ResampleFilter::Box,
    )
    .into_owned();
    let record = source
        .record
        .encode(&pixels, new, &EncodeOptions::default())
        .unwrap();

    let mut replacements = Replacements::new();
    replacements.insert(AssetClass::Image, 5, record);
    let rebuilt = Container::load(repack(&original, &replacements).unwrap(), original.counts())
        .unwrap();

    let decoded = ImageRecord::decode(rebuilt.asset(AssetClass::Image, 5).unwrap()).unwrap();
    assert_eq!(decoded.dims(), new);
    assert!(decoded.record.mirrors_consistent());
    assert!(decoded.record.opaque.is_zeroed());
    assert_eq!(decoded.pixels, pixels);
    assert_eq!(
        rebuilt.asset(AssetClass::Sound, 0).unwrap(),
        original.asset(AssetClass::Sound, 0).unwrap()
    );
    assert!(cpak_core::format::probe::check_counts(rebuilt.as_bytes(), &rebuilt.counts()));
}
