use super::table::{TableEntry, ENTRY_SIZE};

/// Lay out a container by hand: four tables, then payloads in table order.
pub fn build_container(classes: &[Vec<Vec<u8>>]) -> Vec<u8> {
    assert_eq!(classes.len(), 4);
    let index_len = classes.iter().map(Vec::len).sum::<usize>() * ENTRY_SIZE;

    let mut index = Vec::with_capacity(index_len);
    let mut payload = Vec::new();
    for assets in classes {
        for asset in assets {
            let entry = TableEntry::new((index_len + payload.len()) as u32, asset.len() as u32);
            entry.write(&mut index).unwrap();
            payload.extend_from_slice(asset);
        }
    }

    index.extend(payload);
    index
}
