//! Raster rendering of a distance field.
//!
//! Nodes are projected with a Mercator y axis so the image keeps the map's
//! aspect ratio. Reachable nodes are shaded green by normalised distance,
//! unreachable nodes are drawn in the red sentinel colour.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{FloodError, Result};
use crate::geo::Position;
use crate::graph::Graph;

pub type Rgb = [u8; 3];

pub const BACKGROUND: Rgb = [255, 255, 255];
pub const UNREACHABLE: Rgb = [255, 0, 0];

/// Largest accepted image side, requested or derived from the extent.
pub const MAX_SIDE: u32 = 16_384;

/// Requested output size. The other side follows from the map extent.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImageSize {
    Width(u32),
    Height(u32),
}

impl ImageSize {
    /// Exactly one of `width` and `height` must be given.
    pub fn from_options(width: Option<u32>, height: Option<u32>) -> Result<Self> {
        match (width, height) {
            (Some(w), None) if w > 0 => Ok(ImageSize::Width(w)),
            (None, Some(h)) if h > 0 => Ok(ImageSize::Height(h)),
            _ => Err(FloodError::InvalidImageSize),
        }
    }
}

/// Bounding box of all node positions.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub min: Position,
    pub max: Position,
}

impl Bounds {
    pub fn of(graph: &Graph) -> Option<Self> {
        let mut nodes = graph.nodes();
        let first = nodes.next()?.pos;
        let mut b = Bounds { min: first, max: first };
        for node in nodes {
            b.min.lat = b.min.lat.min(node.pos.lat);
            b.min.lon = b.min.lon.min(node.pos.lon);
            b.max.lat = b.max.lat.max(node.pos.lat);
            b.max.lon = b.max.lon.max(node.pos.lon);
        }
        Some(b)
    }
}

/// Latitudes beyond this have no usable Mercator ordinate.
pub const MERCATOR_LAT_LIMIT: f64 = 85.051_128_78;

/// Mercator ordinate of `lat`, scaled to degrees.
fn mercator(lat: f64) -> f64 {
    let l = lat.to_radians();
    (l.tan() + 1.0 / l.cos()).ln().to_degrees()
}

/// Maps positions inside `bounds` to pixel coordinates.
#[derive(Copy, Clone, Debug)]
pub struct Projection {
    min_lon: f64,
    max_y: f64,
    scale: f64,
    pub width: u32,
    pub height: u32,
}

impl Projection {
    pub fn new(bounds: Bounds, size: ImageSize) -> Result<Self> {
        for pos in [bounds.min, bounds.max] {
            if pos.lat.abs() > MERCATOR_LAT_LIMIT {
                return Err(FloodError::InvalidCoordinate {
                    lat: pos.lat,
                    lon: pos.lon,
                });
            }
        }
        let span_x = bounds.max.lon - bounds.min.lon;
        let (min_y, max_y) = (mercator(bounds.min.lat), mercator(bounds.max.lat));
        let span_y = max_y - min_y;
        if !(span_x.is_finite() && span_y.is_finite()) {
            return Err(FloodError::EmptyExtent);
        }
        let (scale, width, height) = match size {
            ImageSize::Width(w) => {
                if span_x <= 0.0 {
                    return Err(FloodError::EmptyExtent);
                }
                let scale = w as f64 / span_x;
                (scale, w as f64, (span_y * scale).ceil().max(1.0))
            }
            ImageSize::Height(h) => {
                if span_y <= 0.0 {
                    return Err(FloodError::EmptyExtent);
                }
                let scale = h as f64 / span_y;
                (scale, (span_x * scale).ceil().max(1.0), h as f64)
            }
        };
        if width > MAX_SIDE as f64 || height > MAX_SIDE as f64 {
            return Err(FloodError::InvalidImageSize);
        }
        let (width, height) = (width as u32, height as u32);
        Ok(Self {
            min_lon: bounds.min.lon,
            max_y,
            scale,
            width,
            height,
        })
    }

    pub fn project(&self, pos: Position) -> (u32, u32) {
        let x = (pos.lon - self.min_lon) * self.scale;
        let y = (self.max_y - mercator(pos.lat)) * self.scale;
        let clamp = |v: f64, len: u32| (v.max(0.0) as u32).min(len - 1);
        (clamp(x, self.width), clamp(y, self.height))
    }
}

/// An RGB image, row-major.
#[derive(Clone, Debug)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pixels: Vec<Rgb>,
}

impl Raster {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![BACKGROUND; width as usize * height as usize],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Rgb {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    pub fn put(&mut self, x: u32, y: u32, color: Rgb) {
        self.pixels[y as usize * self.width as usize + x as usize] = color;
    }

    /// Writes a binary PPM (P6).
    pub fn write_ppm<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = BufWriter::new(writer);
        write!(writer, "P6\n{} {}\n255\n", self.width, self.height)?;
        for px in &self.pixels {
            writer.write_all(px)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn save_ppm<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_ppm(File::create(path)?)
    }
}

/// Colour for a node distance given the largest finite distance.
pub fn shade(dist: f64, max_dist: f64) -> Rgb {
    if !dist.is_finite() {
        return UNREACHABLE;
    }
    let level = if max_dist > 0.0 {
        (dist / max_dist * 255.0).round().clamp(0.0, 255.0) as u8
    } else {
        0
    };
    [0, level, 0]
}

/// Draws one pixel per node.
pub fn render(graph: &Graph, size: ImageSize) -> Result<Raster> {
    let bounds = Bounds::of(graph).ok_or(FloodError::EmptyExtent)?;
    let projection = Projection::new(bounds, size)?;
    let max_dist = graph.max_finite_dist().unwrap_or(0.0);

    let mut raster = Raster::new(projection.width, projection.height);
    for node in graph.nodes() {
        let (x, y) = projection.project(node.pos);
        raster.put(x, y, shade(node.dist, max_dist));
    }
    Ok(raster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    fn graph(points: &[(i64, f64, f64, f64)]) -> Graph {
        let mut g = Graph::new();
        for &(id, lat, lon, dist) in points {
            let mut n = Node::new(id, Position::new(lat, lon), Vec::new());
            n.dist = dist;
            g.insert(n);
        }
        g
    }

    #[test]
    fn size_needs_exactly_one_side() {
        assert_eq!(ImageSize::from_options(Some(100), None).unwrap(), ImageSize::Width(100));
        assert_eq!(ImageSize::from_options(None, Some(50)).unwrap(), ImageSize::Height(50));
        for (w, h) in [(Some(1), Some(1)), (None, None), (Some(0), None)] {
            assert!(matches!(
                ImageSize::from_options(w, h),
                Err(FloodError::InvalidImageSize)
            ));
        }
    }

    #[test]
    fn shading() {
        assert_eq!(shade(0.0, 100.0), [0, 0, 0]);
        assert_eq!(shade(100.0, 100.0), [0, 255, 0]);
        assert_eq!(shade(f64::INFINITY, 100.0), UNREACHABLE);
        assert_eq!(shade(0.0, 0.0), [0, 0, 0]);
    }

    #[test]
    fn corners_land_on_image_edges() {
        let g = graph(&[
            (1, 10.0, 20.0, 0.0),
            (2, 10.5, 21.0, 50.0),
            (3, 10.2, 20.4, f64::INFINITY),
        ]);
        let raster = render(&g, ImageSize::Width(200)).unwrap();
        assert_eq!(raster.width, 200);
        assert!(raster.height > 90 && raster.height < 110, "{}", raster.height);
        // south-west corner is bottom-left, north-east is top-right
        assert_eq!(raster.get(0, raster.height - 1), [0, 0, 0]);
        assert_eq!(raster.get(199, 0), [0, 255, 0]);
        assert!(raster.pixels.iter().any(|px| *px == UNREACHABLE));
    }

    #[test]
    fn height_drives_width() {
        let g = graph(&[(1, 0.0, 0.0, 0.0), (2, 1.0, 2.0, 1.0)]);
        let raster = render(&g, ImageSize::Height(100)).unwrap();
        assert_eq!(raster.height, 100);
        assert!(raster.width >= 199 && raster.width <= 201, "{}", raster.width);
    }

    #[test]
    fn degenerate_extent_is_an_error() {
        let g = graph(&[(1, 5.0, 5.0, 0.0)]);
        assert!(matches!(render(&g, ImageSize::Width(10)), Err(FloodError::EmptyExtent)));
        assert!(matches!(
            render(&Graph::new(), ImageSize::Width(10)),
            Err(FloodError::EmptyExtent)
        ));
    }

    #[test]
    fn near_vertical_extent_is_rejected() {
        let g = graph(&[(1, 50.0, 4.0, 0.0), (2, 50.01, 4.0000001, 1.0)]);
        assert!(matches!(
            render(&g, ImageSize::Width(1000)),
            Err(FloodError::InvalidImageSize)
        ));
        // the same extent is fine when the height is given
        let raster = render(&g, ImageSize::Height(100)).unwrap();
        assert_eq!((raster.width, raster.height), (1, 100));
    }

    #[test]
    fn pole_latitude_is_rejected() {
        let g = graph(&[(1, 89.0, 0.0, 0.0), (2, 90.0, 1.0, 1.0)]);
        for size in [ImageSize::Width(100), ImageSize::Height(100)] {
            assert!(
                matches!(render(&g, size), Err(FloodError::InvalidCoordinate { .. })),
                "{size:?}"
            );
        }
    }

    #[test]
    fn oversized_request_is_rejected() {
        let g = graph(&[(1, 0.0, 0.0, 0.0), (2, 1.0, 1.0, 1.0)]);
        assert!(matches!(
            render(&g, ImageSize::Width(MAX_SIDE + 1)),
            Err(FloodError::InvalidImageSize)
        ));
    }

    #[test]
    fn ppm_header_and_size() {
        let raster = Raster::new(3, 2);
        let mut buf = Vec::new();
        raster.write_ppm(&mut buf).unwrap();
        assert!(buf.starts_with(b"P6\n3 2\n255\n"));
        assert_eq!(buf.len(), b"P6\n3 2\n255\n".len() + 3 * 2 * 3);
    }
}
