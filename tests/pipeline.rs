use flate2::write::GzEncoder;
use flate2::Compression;
use rrmap::{build_payload, payload_to_json, DecoderOptions, LayerType, MapError, SolverOptions};
use std::io::Write;

fn block(type_code: u16, header: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&type_code.to_le_bytes());
    out.extend_from_slice(&((8 + header.len()) as u16).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(header);
    out.extend_from_slice(data);
    out
}

fn le32(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn dump(blocks: &[Vec<u8>]) -> Vec<u8> {
    let body = blocks.concat();
    let mut out = b"rr".to_vec();
    out.extend_from_slice(&0x14u16.to_le_bytes());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&[1, 0, 0, 0]);
    out.extend_from_slice(&3u32.to_le_bytes());
    out.extend_from_slice(&9u32.to_le_bytes());
    out.extend(body);
    out
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

// Segment pixel byte: id in the upper five bits, floor type below
fn seg(id: u8) -> u8 {
    (id << 3) | 0b010
}

/// Three rooms in a row: 1 | 2 | 3, two pixels wide and two high, plus a wall
/// pixel in the corner.
fn three_rooms() -> Vec<u8> {
    let row = [seg(1), seg(1), seg(2), seg(2), seg(3), seg(3)];
    let mut pixels = row.to_vec();
    pixels.extend_from_slice(&row);
    pixels[0] = 0b001;

    let image = block(2, &le32(&[0, 100, 200, 2, 6]), &pixels);
    let active = block(11, &le32(&[1]), &[2]);
    dump(&[image, active])
}

#[test]
fn gzipped_dump_to_colored_payload() {
    let payload = build_payload(
        &gzip(&three_rooms()),
        DecoderOptions::default(),
        &SolverOptions::default(),
    )
    .unwrap()
    .unwrap();

    let kinds: Vec<_> = payload.map.layers().iter().map(|l| l.layer_type()).collect();
    assert_eq!(
        kinds,
        vec![LayerType::Wall, LayerType::Segment, LayerType::Segment, LayerType::Segment]
    );

    assert_eq!(payload.segment_colors.get(&2), Some(&0));
    assert_eq!(payload.segment_colors.get(&1), Some(&1));
    assert_eq!(payload.segment_colors.get(&3), Some(&1));
    assert_eq!(payload.palette_size, 2);

    let json: serde_json::Value =
        serde_json::from_str(&payload_to_json(&payload, false).unwrap()).unwrap();
    assert_eq!(json["paletteSize"], 2);
    assert_eq!(json["segmentColors"]["2"], 0);
    assert_eq!(json["map"]["size"]["x"], 5120);
    assert_eq!(json["map"]["metaData"]["vendorMapId"], 3);
    assert_eq!(json["map"]["layers"][2]["metaData"]["segmentId"], 2);
    assert_eq!(json["map"]["layers"][2]["metaData"]["active"], true);
    assert_eq!(json["map"]["layers"][1]["metaData"]["active"], false);
    // room 1 lost one pixel to the wall
    assert_eq!(json["map"]["layers"][1]["metaData"]["area"], 3 * 25);
}

#[test]
fn plain_dump_is_accepted_too() {
    let payload = build_payload(&three_rooms(), DecoderOptions::default(), &SolverOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(payload.segment_colors.len(), 3);
}

#[test]
fn broken_dumps() {
    let mut truncated = three_rooms();
    truncated.truncate(truncated.len() - 1);
    assert!(matches!(
        build_payload(&truncated, DecoderOptions::default(), &SolverOptions::default()),
        Err(MapError::MalformedInput(_))
    ));

    let garbage = gzip(b"not a map at all");
    assert!(build_payload(&garbage, DecoderOptions::default(), &SolverOptions::default())
        .unwrap()
        .is_none());

    let floor_only = dump(&[block(2, &le32(&[0, 0, 1, 1]), &[0b011])]);
    let payload = build_payload(&floor_only, DecoderOptions::default(), &SolverOptions::default())
        .unwrap()
        .unwrap();
    assert!(payload.segment_colors.is_empty());
    assert_eq!(payload.palette_size, 0);
}
