// Data structures for decoded maps

use crate::core::constants::MAP_FORMAT_VERSION;
use crate::core::error::{MapError, Result};
use serde::Serialize;
use uuid::Uuid;

/// Rounds like the map consumers do: halves go towards positive infinity.
pub fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    Floor,
    Wall,
    Segment,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AxisDimensions {
    pub min: i32,
    pub max: i32,
    pub mid: i32,
    pub avg: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDimensions {
    pub x: AxisDimensions,
    pub y: AxisDimensions,
    pub pixel_count: usize,
}

impl LayerDimensions {
    fn measure(pixels: &[i32]) -> Self {
        let count = pixels.len() / 2;
        if count == 0 {
            return Self::default();
        }

        let axis = |offset: usize| {
            let mut min = i32::MAX;
            let mut max = i32::MIN;
            let mut sum = 0i64;
            for v in pixels.iter().skip(offset).step_by(2) {
                min = min.min(*v);
                max = max.max(*v);
                sum += i64::from(*v);
            }
            AxisDimensions {
                min,
                max,
                mid: round_half_up((f64::from(min) + f64::from(max)) / 2.0),
                avg: round_half_up(sum as f64 / count as f64),
            }
        };

        Self {
            x: axis(0),
            y: axis(1),
            pixel_count: count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerMetaData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    pub area: u64,
    pub dimensions: LayerDimensions,
}

/// A full-coverage pixel set sharing one meaning.
///
/// `pixels` is a flat `[x0, y0, x1, y1, ...]` list and always has even length.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLayer {
    #[serde(rename = "type")]
    layer_type: LayerType,
    pixels: Vec<i32>,
    meta_data: LayerMetaData,
}

impl MapLayer {
    pub fn new(layer_type: LayerType, pixels: Vec<i32>, pixel_size: u32) -> Result<Self> {
        Self::build(layer_type, pixels, pixel_size, None, None)
    }

    pub fn segment(segment_id: u32, active: bool, pixels: Vec<i32>, pixel_size: u32) -> Result<Self> {
        Self::build(
            LayerType::Segment,
            pixels,
            pixel_size,
            Some(segment_id),
            Some(active),
        )
    }

    fn build(
        layer_type: LayerType,
        pixels: Vec<i32>,
        pixel_size: u32,
        segment_id: Option<u32>,
        active: Option<bool>,
    ) -> Result<Self> {
        if pixels.len() % 2 != 0 {
            return Err(MapError::InvalidLayer(format!(
                "{:?} layer has odd coordinate count {}",
                layer_type,
                pixels.len()
            )));
        }

        let pixel_size = u64::from(pixel_size);
        let area = (pixels.len() / 2) as u64 * pixel_size * pixel_size;
        let dimensions = LayerDimensions::measure(&pixels);

        Ok(Self {
            layer_type,
            pixels,
            meta_data: LayerMetaData {
                segment_id,
                active,
                area,
                dimensions,
            },
        })
    }

    pub fn layer_type(&self) -> LayerType {
        self.layer_type
    }

    pub fn pixels(&self) -> &[i32] {
        &self.pixels
    }

    pub fn meta_data(&self) -> &LayerMetaData {
        &self.meta_data
    }

    pub fn segment_id(&self) -> Option<u32> {
        self.meta_data.segment_id
    }

    pub fn area(&self) -> u64 {
        self.meta_data.area
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineType {
    VirtualWall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathType {
    Path,
    PredictedPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointType {
    ChargerLocation,
    RobotPosition,
    GoToTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolygonType {
    NoGoArea,
    ActiveZone,
    NoMopArea,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityMetaData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityData<T> {
    #[serde(rename = "type")]
    kind: T,
    points: Vec<i32>,
    meta_data: EntityMetaData,
}

impl<T: Copy + std::fmt::Debug> EntityData<T> {
    fn checked(kind: T, points: Vec<i32>) -> Result<Self> {
        if points.len() % 2 != 0 {
            return Err(MapError::InvalidEntity(format!(
                "{:?} has odd coordinate count {}",
                kind,
                points.len()
            )));
        }
        Ok(Self {
            kind,
            points,
            meta_data: EntityMetaData::default(),
        })
    }

    pub fn kind(&self) -> T {
        self.kind
    }

    pub fn points(&self) -> &[i32] {
        &self.points
    }

    pub fn meta_data(&self) -> &EntityMetaData {
        &self.meta_data
    }
}

pub type LineMapEntity = EntityData<LineType>;
pub type PathMapEntity = EntityData<PathType>;
pub type PointMapEntity = EntityData<PointType>;
pub type PolygonMapEntity = EntityData<PolygonType>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "__class")]
pub enum MapEntity {
    LineMapEntity(LineMapEntity),
    PathMapEntity(PathMapEntity),
    PointMapEntity(PointMapEntity),
    PolygonMapEntity(PolygonMapEntity),
}

impl MapEntity {
    pub fn line(kind: LineType, points: Vec<i32>) -> Result<Self> {
        Ok(MapEntity::LineMapEntity(EntityData::checked(kind, points)?))
    }

    pub fn path(kind: PathType, points: Vec<i32>) -> Result<Self> {
        Ok(MapEntity::PathMapEntity(EntityData::checked(kind, points)?))
    }

    pub fn point(kind: PointType, points: Vec<i32>) -> Result<Self> {
        if points.len() != 2 {
            return Err(MapError::InvalidEntity(format!(
                "{:?} needs exactly 2 coordinates, got {}",
                kind,
                points.len()
            )));
        }
        Ok(MapEntity::PointMapEntity(EntityData::checked(kind, points)?))
    }

    pub fn point_with_angle(kind: PointType, points: Vec<i32>, angle: i32) -> Result<Self> {
        let mut entity = Self::point(kind, points)?;
        if let MapEntity::PointMapEntity(point) = &mut entity {
            point.meta_data.angle = Some(angle);
        }
        Ok(entity)
    }

    pub fn polygon(kind: PolygonType, points: Vec<i32>) -> Result<Self> {
        Ok(MapEntity::PolygonMapEntity(EntityData::checked(kind, points)?))
    }

    pub fn points(&self) -> &[i32] {
        match self {
            MapEntity::LineMapEntity(e) => e.points(),
            MapEntity::PathMapEntity(e) => e.points(),
            MapEntity::PointMapEntity(e) => e.points(),
            MapEntity::PolygonMapEntity(e) => e.points(),
        }
    }

    pub fn meta_data(&self) -> &EntityMetaData {
        match self {
            MapEntity::LineMapEntity(e) => e.meta_data(),
            MapEntity::PathMapEntity(e) => e.meta_data(),
            MapEntity::PointMapEntity(e) => e.meta_data(),
            MapEntity::PolygonMapEntity(e) => e.meta_data(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MapSize {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VendorVersion {
    pub major: u16,
    pub minor: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMetaData {
    pub version: u32,
    pub nonce: Uuid,
    pub vendor_map_id: u32,
    pub vendor_map_sequence: u32,
    pub vendor_version: VendorVersion,
    pub total_layer_area: u64,
}

/// Vendor details carried over from the file header into `Map::meta_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorInfo {
    pub map_id: u32,
    pub map_sequence: u32,
    pub version: VendorVersion,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Map {
    size: MapSize,
    pixel_size: u32,
    layers: Vec<MapLayer>,
    entities: Vec<MapEntity>,
    meta_data: MapMetaData,
}

impl Map {
    pub fn new(
        size: MapSize,
        pixel_size: u32,
        layers: Vec<MapLayer>,
        entities: Vec<MapEntity>,
        vendor: VendorInfo,
    ) -> Self {
        let total_layer_area = layers.iter().map(MapLayer::area).sum();
        Self {
            size,
            pixel_size,
            layers,
            entities,
            meta_data: MapMetaData {
                version: MAP_FORMAT_VERSION,
                nonce: Uuid::new_v4(),
                vendor_map_id: vendor.map_id,
                vendor_map_sequence: vendor.map_sequence,
                vendor_version: vendor.version,
                total_layer_area,
            },
        }
    }

    pub fn size(&self) -> MapSize {
        self.size
    }

    pub fn pixel_size(&self) -> u32 {
        self.pixel_size
    }

    pub fn layers(&self) -> &[MapLayer] {
        &self.layers
    }

    pub fn entities(&self) -> &[MapEntity] {
        &self.entities
    }

    pub fn meta_data(&self) -> &MapMetaData {
        &self.meta_data
    }

    pub fn segment_layers(&self) -> impl Iterator<Item = &MapLayer> {
        self.layers
            .iter()
            .filter(|l| l.layer_type() == LayerType::Segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_area_and_dimensions() {
        let layer = MapLayer::new(LayerType::Floor, vec![10, 20, 12, 20, 14, 23], 5).unwrap();
        assert_eq!(layer.area(), 3 * 25);
        let dims = layer.meta_data().dimensions;
        assert_eq!(dims.pixel_count, 3);
        assert_eq!(dims.x, AxisDimensions { min: 10, max: 14, mid: 12, avg: 12 });
        assert_eq!(dims.y, AxisDimensions { min: 20, max: 23, mid: 22, avg: 21 });
    }

    #[test]
    fn test_layer_rejects_odd_pixels() {
        let err = MapLayer::new(LayerType::Wall, vec![1, 2, 3], 5).unwrap_err();
        assert!(matches!(err, MapError::InvalidLayer(_)));
    }

    #[test]
    fn test_entity_invariants() {
        assert!(matches!(
            MapEntity::path(PathType::Path, vec![1, 2, 3]),
            Err(MapError::InvalidEntity(_))
        ));
        assert!(matches!(
            MapEntity::point(PointType::ChargerLocation, vec![1, 2, 3, 4]),
            Err(MapError::InvalidEntity(_))
        ));
        let point = MapEntity::point_with_angle(PointType::RobotPosition, vec![5, 6], 90).unwrap();
        assert_eq!(point.points(), &[5, 6]);
        assert_eq!(point.meta_data().angle, Some(90));
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(0.5), 1);
        assert_eq!(round_half_up(-0.5), 0);
        assert_eq!(round_half_up(-0.6), -1);
        assert_eq!(round_half_up(5119.4), 5119);
    }

    #[test]
    fn test_json_shape() {
        let layer = MapLayer::segment(3, true, vec![1, 1], 5).unwrap();
        let wall = MapEntity::line(LineType::VirtualWall, vec![0, 0, 10, 10]).unwrap();
        let vendor = VendorInfo {
            map_id: 7,
            map_sequence: 1,
            version: VendorVersion { major: 1, minor: 0 },
        };
        let map = Map::new(MapSize { x: 5120, y: 5120 }, 5, vec![layer], vec![wall], vendor);
        let json = serde_json::to_value(&map).unwrap();

        assert_eq!(json["pixelSize"], 5);
        assert_eq!(json["layers"][0]["type"], "segment");
        assert_eq!(json["layers"][0]["metaData"]["segmentId"], 3);
        assert_eq!(json["layers"][0]["metaData"]["active"], true);
        assert_eq!(json["entities"][0]["__class"], "LineMapEntity");
        assert_eq!(json["entities"][0]["type"], "virtual_wall");
        assert_eq!(json["metaData"]["vendorMapId"], 7);
        assert_eq!(json["metaData"]["totalLayerArea"], 25);
        assert_eq!(json["metaData"]["version"], 2);
    }
}
