// Segment adjacency graph and greedy coloring

use crate::core::format::{LayerType, MapLayer};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

pub type SegmentId = u32;
pub type Color = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapAreaVertex {
    id: SegmentId,
    adjacent_vertex_ids: BTreeSet<SegmentId>,
    color: Option<Color>,
}

impl MapAreaVertex {
    pub fn new(id: SegmentId) -> Self {
        Self {
            id,
            adjacent_vertex_ids: BTreeSet::new(),
            color: None,
        }
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn adjacent_vertex_ids(&self) -> &BTreeSet<SegmentId> {
        &self.adjacent_vertex_ids
    }

    pub fn degree(&self) -> usize {
        self.adjacent_vertex_ids.len()
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }
}

/// Undirected graph of segments, one vertex per distinct id.
#[derive(Debug, Clone, Default)]
pub struct MapAreaGraph {
    vertices: Vec<MapAreaVertex>,
    index: HashMap<SegmentId, usize>,
}

impl MapAreaGraph {
    pub fn new(ids: impl IntoIterator<Item = SegmentId>) -> Self {
        let mut graph = Self::default();
        for id in ids {
            graph.add_vertex(id);
        }
        graph
    }

    /// Returns false if the id already had a vertex.
    pub fn add_vertex(&mut self, id: SegmentId) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id, self.vertices.len());
        self.vertices.push(MapAreaVertex::new(id));
        true
    }

    /// Adds an undirected edge. Self loops and unknown ids are ignored.
    pub fn connect(&mut self, a: SegmentId, b: SegmentId) -> bool {
        if a == b {
            return false;
        }
        let (Some(&ia), Some(&ib)) = (self.index.get(&a), self.index.get(&b)) else {
            return false;
        };
        let added = self.vertices[ia].adjacent_vertex_ids.insert(b);
        self.vertices[ib].adjacent_vertex_ids.insert(a);
        added
    }

    pub fn vertex(&self, id: SegmentId) -> Option<&MapAreaVertex> {
        self.index.get(&id).map(|&i| &self.vertices[i])
    }

    pub fn vertices(&self) -> &[MapAreaVertex] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Greedy coloring, most connected vertices first. Each vertex gets the
    /// lowest color none of its neighbours hold. Vertices that already have a
    /// color keep it.
    pub fn color_all_vertices(&mut self) {
        let mut order: Vec<usize> = (0..self.vertices.len()).collect();
        order.sort_by(|&a, &b| self.vertices[b].degree().cmp(&self.vertices[a].degree()));

        for i in order {
            if self.vertices[i].color.is_some() {
                continue;
            }

            let taken: BTreeSet<Color> = self.vertices[i]
                .adjacent_vertex_ids
                .iter()
                .filter_map(|id| self.vertex(*id).and_then(MapAreaVertex::color))
                .collect();
            let color = (0..).find(|c| !taken.contains(c)).unwrap_or(0);
            self.vertices[i].color = Some(color);
        }
    }
}

/// Upper bound on lookup grid cells; vendor images are 1024x1024.
const MAX_GRID_CELLS: u64 = 1 << 24;

/// Lookup grid of segment ids over the bounding box of all segment pixels.
struct SegmentGrid {
    min_x: i32,
    min_y: i32,
    max_x: i32,
    max_y: i32,
    width: usize,
    cells: Vec<Option<SegmentId>>,
}

impl SegmentGrid {
    /// `Ok(None)` when there are no pixels at all, `Err(cells)` when the
    /// bounding box would need more than `MAX_GRID_CELLS` cells.
    fn build(segments: &[(SegmentId, &[i32])]) -> Result<Option<Self>, u64> {
        let mut coords = segments.iter().flat_map(|&(_, px)| px.chunks_exact(2));
        let Some(first) = coords.next() else {
            return Ok(None);
        };
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first[0], first[0], first[1], first[1]);
        for p in coords {
            min_x = min_x.min(p[0]);
            max_x = max_x.max(p[0]);
            min_y = min_y.min(p[1]);
            max_y = max_y.max(p[1]);
        }

        let width = (i64::from(max_x) - i64::from(min_x) + 1) as u64;
        let height = (i64::from(max_y) - i64::from(min_y) + 1) as u64;
        let cells = match width.checked_mul(height) {
            Some(cells) if cells <= MAX_GRID_CELLS => cells as usize,
            Some(cells) => return Err(cells),
            None => return Err(u64::MAX),
        };
        let mut grid = Self {
            min_x,
            min_y,
            max_x,
            max_y,
            width: width as usize,
            cells: vec![None; cells],
        };

        for (id, pixels) in segments {
            for p in pixels.chunks_exact(2) {
                let cell = grid.offset(p[0], p[1]);
                grid.cells[cell] = Some(*id);
            }
        }
        Ok(Some(grid))
    }

    fn offset(&self, x: i32, y: i32) -> usize {
        let col = (i64::from(x) - i64::from(self.min_x)) as usize;
        let row = (i64::from(y) - i64::from(self.min_y)) as usize;
        row * self.width + col
    }

    fn get(&self, x: i32, y: i32) -> Option<SegmentId> {
        self.cells[self.offset(x, y)]
    }

    /// Walks every `stride`-th line, linking each segment to the previous one
    /// seen on the same line.
    fn sweep(&self, graph: &mut MapAreaGraph, stride: usize, rows_first: bool) {
        let (outer, inner) = if rows_first {
            ((self.min_y, self.max_y), (self.min_x, self.max_x))
        } else {
            ((self.min_x, self.max_x), (self.min_y, self.max_y))
        };

        for a in (outer.0..=outer.1).step_by(stride) {
            let mut current: Option<SegmentId> = None;
            for b in (inner.0..=inner.1).step_by(stride) {
                let cell = if rows_first { self.get(b, a) } else { self.get(a, b) };
                let Some(id) = cell else {
                    continue;
                };
                if let Some(previous) = current {
                    if previous != id {
                        graph.connect(previous, id);
                    }
                }
                current = Some(id);
            }
        }
    }
}

/// Assigns a small color index to every segment so that touching segments
/// differ.
///
/// Built from the segment layers of a map. Without any segment layer the
/// solver stays uninitialized and every lookup yields color 0.
#[derive(Debug, Clone)]
pub struct SegmentColorSolver {
    graph: Option<MapAreaGraph>,
}

impl SegmentColorSolver {
    /// `resolution` is the sampling stride in pixels; it is truncated and
    /// clamped to at least 1.
    pub fn new<'a>(layers: impl IntoIterator<Item = &'a MapLayer>, resolution: f64) -> Self {
        let segments: Vec<(SegmentId, &[i32])> = layers
            .into_iter()
            .filter(|l| l.layer_type() == LayerType::Segment)
            .filter_map(|l| l.segment_id().map(|id| (id, l.pixels())))
            .collect();

        if segments.is_empty() {
            info!("no segment layers, coloring disabled");
            return Self { graph: None };
        }

        let stride = Self::stride(resolution);
        let mut graph = MapAreaGraph::new(segments.iter().map(|(id, _)| *id));

        match SegmentGrid::build(&segments) {
            Ok(Some(grid)) => {
                grid.sweep(&mut graph, stride, true);
                grid.sweep(&mut graph, stride, false);
            }
            Ok(None) => {}
            Err(cells) => {
                warn!(
                    "segment bounding box needs {} grid cells (limit {}), coloring disabled",
                    cells, MAX_GRID_CELLS
                );
                return Self { graph: None };
            }
        }
        graph.color_all_vertices();

        let solver = Self { graph: Some(graph) };
        debug!(
            "colored {} segments with {} colors (stride {})",
            segments.len(),
            solver.palette_size(),
            stride
        );
        solver
    }

    fn stride(resolution: f64) -> usize {
        if resolution.is_finite() && resolution >= 1.0 {
            resolution.trunc() as usize
        } else {
            1
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.graph.is_some()
    }

    pub fn graph(&self) -> Option<&MapAreaGraph> {
        self.graph.as_ref()
    }

    pub fn color_of(&self, segment_id: SegmentId) -> Color {
        self.graph
            .as_ref()
            .and_then(|g| g.vertex(segment_id))
            .and_then(MapAreaVertex::color)
            .unwrap_or(0)
    }

    /// Number of distinct colors a consumer needs in its palette.
    pub fn palette_size(&self) -> usize {
        self.graph
            .as_ref()
            .and_then(|g| g.vertices().iter().filter_map(MapAreaVertex::color).max())
            .map_or(0, |max| max as usize + 1)
    }

    pub fn colors(&self) -> BTreeMap<SegmentId, Color> {
        self.graph
            .iter()
            .flat_map(|g| g.vertices())
            .map(|v| (v.id(), v.color().unwrap_or(0)))
            .collect()
    }
}
