// Map dump reader: header, block table and conversion into a Map

use crate::core::blocks::{decoder_for, BlockScanner, ByteView, ImageBlock, ParsedBlock};
use crate::core::constants::*;
use crate::core::error::{MapError, Result};
use crate::core::format::*;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// What to do when a dump carries more than one block of the same type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateBlockPolicy {
    #[default]
    KeepLast,
    KeepFirst,
    Reject,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecoderOptions {
    pub duplicate_blocks: DuplicateBlockPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub header_length: u16,
    pub data_length: u32,
    pub version: VendorVersion,
    pub map_index: u32,
    pub map_sequence: u32,
}

/// Decoded blocks of one dump, at most one per type.
#[derive(Debug, Clone, Default)]
pub struct BlockTable {
    blocks: BTreeMap<BlockType, ParsedBlock>,
}

impl BlockTable {
    pub fn get(&self, block_type: BlockType) -> Option<&ParsedBlock> {
        self.blocks.get(&block_type)
    }

    fn image(&self) -> Option<&ImageBlock> {
        match self.get(BlockType::Image) {
            Some(ParsedBlock::Image(image)) => Some(image),
            _ => None,
        }
    }

    fn position(&self, block_type: BlockType) -> Option<([u16; 2], Option<i32>)> {
        match self.get(block_type) {
            Some(ParsedBlock::Position { position, angle }) => Some((*position, *angle)),
            _ => None,
        }
    }

    fn path_points(&self, block_type: BlockType) -> Vec<i32> {
        match self.get(block_type) {
            Some(ParsedBlock::Path(path)) => path
                .points
                .iter()
                .flat_map(|[x, y]| rescale_point(*x, *y))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn rectangles(&self, block_type: BlockType) -> &[[u16; 4]] {
        match self.get(block_type) {
            Some(ParsedBlock::Rectangles(r)) => r,
            _ => &[],
        }
    }

    fn polygons(&self, block_type: BlockType) -> &[[u16; 8]] {
        match self.get(block_type) {
            Some(ParsedBlock::Polygons(p)) => p,
            _ => &[],
        }
    }

    fn active_segments(&self) -> BTreeSet<u8> {
        match self.get(BlockType::CurrentlyCleanedSegments) {
            Some(ParsedBlock::Segments(ids)) => ids.iter().copied().collect(),
            _ => BTreeSet::new(),
        }
    }
}

/// Converts a raw map unit coordinate pair into map space, flipping the y axis
/// to line up with the already flipped image.
pub fn rescale_point(x: u16, y: u16) -> [i32; 2] {
    [
        round_half_up(f64::from(x) / 10.0),
        round_half_up(f64::from(DIMENSION_MM - i32::from(y)) / 10.0),
    ]
}

/// Maps a vendor heading (-180..180, 0 = east) onto the UI one (0..360, 0 = north).
pub fn remap_angle(angle: i32) -> i32 {
    (i64::from(angle) + 450).rem_euclid(360) as i32
}

fn rescale_flat(values: &[u16]) -> Vec<i32> {
    values
        .chunks_exact(2)
        .flat_map(|pair| rescale_point(pair[0], pair[1]))
        .collect()
}

/// Heading of the last path segment in degrees, if there is one.
fn path_heading(points: &[i32]) -> Option<i32> {
    let n = points.len();
    if n < 4 {
        return None;
    }
    let dx = f64::from(points[n - 2] - points[n - 4]);
    let dy = f64::from(points[n - 1] - points[n - 3]);
    Some(round_half_up(dy.atan2(dx).to_degrees()))
}

pub struct MapReader {
    options: DecoderOptions,
}

impl Default for MapReader {
    fn default() -> Self {
        Self::new(DecoderOptions::default())
    }
}

impl MapReader {
    pub fn new(options: DecoderOptions) -> Self {
        Self { options }
    }

    /// True when `buf` starts with the "rr" marker.
    pub fn probe(buf: &[u8]) -> bool {
        buf.starts_with(MAGIC)
    }

    /// Decodes an uncompressed map dump.
    ///
    /// Returns `Ok(None)` when the buffer is not in this format or holds no
    /// image content to build layers from.
    pub fn decode(&self, buf: &[u8]) -> Result<Option<Map>> {
        if !Self::probe(buf) {
            debug!("buffer does not start with map magic, skipping");
            return Ok(None);
        }

        let header = Self::read_header(buf)?;
        let table = self.read_blocks(&buf[header.header_length as usize..])?;
        let map = Self::build_map(&header, &table)?;

        if let Some(map) = &map {
            info!(
                "decoded map {} (seq {}): {} layers, {} entities",
                header.map_index,
                header.map_sequence,
                map.layers().len(),
                map.entities().len()
            );
        }
        Ok(map)
    }

    pub fn read_header(buf: &[u8]) -> Result<FileHeader> {
        let b = ByteView::new(buf, "file header");
        b.slice(0, FILE_HEADER_SIZE)?;

        let header = FileHeader {
            header_length: b.u16_at(0x02)?,
            data_length: b.u32_at(0x04)?,
            version: VendorVersion {
                major: b.u16_at(0x08)?,
                minor: b.u16_at(0x0a)?,
            },
            map_index: b.u32_at(0x0c)?,
            map_sequence: b.u32_at(0x10)?,
        };

        let header_length = header.header_length as usize;
        if header_length < FILE_HEADER_SIZE || header_length > buf.len() {
            return Err(MapError::MalformedInput(format!(
                "file header length {} outside 0x{:x}..={}",
                header_length,
                FILE_HEADER_SIZE,
                buf.len()
            )));
        }
        if header_length + header.data_length as usize != buf.len() {
            debug!(
                "declared data length {} differs from buffer ({} bytes after header)",
                header.data_length,
                buf.len() - header_length
            );
        }

        Ok(header)
    }

    pub fn read_blocks(&self, data: &[u8]) -> Result<BlockTable> {
        let mut table = BlockTable::default();
        let mut seen = BTreeSet::new();

        for raw in BlockScanner::new(data) {
            let raw = raw?;
            let Some(block_type) = raw.block_type() else {
                warn!("unknown block type {}, skipping {} bytes", raw.type_code, raw.view.len());
                continue;
            };

            if !seen.insert(block_type) {
                match self.options.duplicate_blocks {
                    DuplicateBlockPolicy::KeepLast => {
                        warn!("duplicate {:?} block, keeping the later one", block_type);
                    }
                    DuplicateBlockPolicy::KeepFirst => {
                        warn!("duplicate {:?} block, keeping the earlier one", block_type);
                        continue;
                    }
                    DuplicateBlockPolicy::Reject => {
                        return Err(MapError::MalformedInput(format!(
                            "duplicate {:?} block",
                            block_type
                        )));
                    }
                }
            }

            debug!(
                "block {:?}: header {} bytes, data {} bytes",
                block_type, raw.header_length, raw.data_length
            );
            match decoder_for(block_type)(&raw)? {
                Some(parsed) => {
                    table.blocks.insert(block_type, parsed);
                }
                None => {
                    table.blocks.remove(&block_type);
                }
            }
        }

        Ok(table)
    }

    fn build_map(header: &FileHeader, table: &BlockTable) -> Result<Option<Map>> {
        let Some(image) = table.image() else {
            info!("map {} has no image block", header.map_index);
            return Ok(None);
        };
        if image.pixels.is_empty() {
            info!("map {} image block holds no pixels", header.map_index);
            return Ok(None);
        }

        let layers = Self::build_layers(image, &table.active_segments())?;
        let entities = Self::build_entities(table)?;

        let vendor = VendorInfo {
            map_id: header.map_index,
            map_sequence: header.map_sequence,
            version: header.version,
        };
        Ok(Some(Map::new(
            MapSize {
                x: MAP_SIZE,
                y: MAP_SIZE,
            },
            PIXEL_SIZE,
            layers,
            entities,
            vendor,
        )))
    }

    fn build_layers(image: &ImageBlock, active: &BTreeSet<u8>) -> Result<Vec<MapLayer>> {
        let pixels = &image.pixels;
        let mut layers = Vec::with_capacity(2 + pixels.segments.len());

        if !pixels.floor.is_empty() {
            layers.push(MapLayer::new(LayerType::Floor, pixels.floor.clone(), PIXEL_SIZE)?);
        }
        if !pixels.obstacle_strong.is_empty() {
            layers.push(MapLayer::new(
                LayerType::Wall,
                pixels.obstacle_strong.clone(),
                PIXEL_SIZE,
            )?);
        }
        for (id, segment_pixels) in &pixels.segments {
            if segment_pixels.is_empty() {
                continue;
            }
            layers.push(MapLayer::segment(
                u32::from(*id),
                active.contains(id),
                segment_pixels.clone(),
                PIXEL_SIZE,
            )?);
        }

        Ok(layers)
    }

    fn build_entities(table: &BlockTable) -> Result<Vec<MapEntity>> {
        let mut entities = Vec::new();

        let path = table.path_points(BlockType::Path);
        let predicted = table.path_points(BlockType::GotoPredictedPath);

        if let Some((position, _)) = table.position(BlockType::ChargerLocation) {
            entities.push(MapEntity::point(
                PointType::ChargerLocation,
                rescale_point(position[0], position[1]).to_vec(),
            )?);
        }

        if let Some((position, angle)) = table.position(BlockType::RobotPosition) {
            let raw_angle = angle.or_else(|| path_heading(&path)).unwrap_or(0);
            entities.push(MapEntity::point_with_angle(
                PointType::RobotPosition,
                rescale_point(position[0], position[1]).to_vec(),
                remap_angle(raw_angle),
            )?);
        }

        if let Some(ParsedBlock::Target([x, y])) = table.get(BlockType::GotoTarget) {
            entities.push(MapEntity::point(
                PointType::GoToTarget,
                rescale_point(*x, *y).to_vec(),
            )?);
        }

        if !path.is_empty() {
            entities.push(MapEntity::path(PathType::Path, path)?);
        }
        if !predicted.is_empty() {
            entities.push(MapEntity::path(PathType::PredictedPath, predicted)?);
        }

        for zone in table.rectangles(BlockType::CurrentlyCleanedZones) {
            // Zones only carry two opposite corners
            let p = rescale_flat(zone);
            entities.push(MapEntity::polygon(
                PolygonType::ActiveZone,
                vec![p[0], p[1], p[0], p[3], p[2], p[3], p[2], p[1]],
            )?);
        }
        for area in table.polygons(BlockType::NoGoAreas) {
            entities.push(MapEntity::polygon(PolygonType::NoGoArea, rescale_flat(area))?);
        }
        for area in table.polygons(BlockType::NoMopAreas) {
            entities.push(MapEntity::polygon(PolygonType::NoMopArea, rescale_flat(area))?);
        }
        for wall in table.rectangles(BlockType::VirtualWalls) {
            entities.push(MapEntity::line(LineType::VirtualWall, rescale_flat(wall))?);
        }

        Ok(entities)
    }
}
