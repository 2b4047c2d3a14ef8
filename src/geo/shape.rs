//! GeoJSON-like shapes and the primitive geometry they need.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{QuarryError, Result};
use crate::geo::point::{GeoBoundingBox, GeoPoint};

const EPSILON: f64 = 1e-12;

/// A stored or queried shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates", rename_all = "snake_case")]
pub enum GeoShape {
    Point(GeoPoint),
    MultiPoint(Vec<GeoPoint>),
    LineString(Vec<GeoPoint>),
    /// Outer ring plus holes; rings are closed implicitly.
    Polygon {
        exterior: Vec<GeoPoint>,
        holes: Vec<Vec<GeoPoint>>,
    },
    Envelope(GeoBoundingBox),
}

impl GeoShape {
    /// Parse `{"type": "...", "coordinates": ...}`; type names are case-insensitive.
    pub fn from_json(value: &Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid_shape(value, "missing [type]"))?
            .to_ascii_lowercase();
        let coordinates = value
            .get("coordinates")
            .ok_or_else(|| invalid_shape(value, "missing [coordinates]"))?;

        match kind.as_str() {
            "point" => Ok(GeoShape::Point(GeoPoint::from_lon_lat(coordinates)?)),
            "multipoint" => {
                let points = positions(coordinates)?;
                if points.is_empty() {
                    return Err(invalid_shape(value, "multipoint needs at least 1 point"));
                }
                Ok(GeoShape::MultiPoint(points))
            }
            "linestring" => {
                let points = positions(coordinates)?;
                if points.len() < 2 {
                    return Err(invalid_shape(value, "linestring needs at least 2 points"));
                }
                Ok(GeoShape::LineString(points))
            }
            "polygon" => {
                let rings = coordinates
                    .as_array()
                    .filter(|rings| !rings.is_empty())
                    .ok_or_else(|| invalid_shape(value, "polygon needs at least one ring"))?;
                let mut rings = rings
                    .iter()
                    .map(|ring| {
                        let ring = open_ring(positions(ring)?);
                        if ring.len() < 3 {
                            return Err(invalid_shape(value, "ring needs at least 3 points"));
                        }
                        Ok(ring)
                    })
                    .collect::<Result<Vec<_>>>()?;
                let exterior = rings.remove(0);
                Ok(GeoShape::Polygon {
                    exterior,
                    holes: rings,
                })
            }
            "envelope" => {
                let corners = positions(coordinates)?;
                if corners.len() != 2 {
                    return Err(invalid_shape(value, "envelope needs exactly 2 corners"));
                }
                Ok(GeoShape::Envelope(GeoBoundingBox::from_corners(
                    corners[0], corners[1],
                )))
            }
            other => Err(invalid_shape(value, &format!("unsupported shape type [{other}]"))),
        }
    }

    /// Whether the shape covers an area (polygon or envelope).
    pub fn is_area(&self) -> bool {
        matches!(self, GeoShape::Polygon { .. } | GeoShape::Envelope(_))
    }

    /// The points that stand for this shape in containment tests.
    pub fn representative_points(&self) -> Vec<GeoPoint> {
        match self {
            GeoShape::Point(point) => vec![*point],
            GeoShape::MultiPoint(points) | GeoShape::LineString(points) => points.clone(),
            GeoShape::Polygon { exterior, .. } => exterior.clone(),
            GeoShape::Envelope(bbox) => bbox.corners().to_vec(),
        }
    }

    /// Line segments making up the outline (empty for points).
    pub fn edges(&self) -> Vec<(GeoPoint, GeoPoint)> {
        match self {
            GeoShape::Point(_) | GeoShape::MultiPoint(_) => Vec::new(),
            GeoShape::LineString(points) => points.windows(2).map(|w| (w[0], w[1])).collect(),
            GeoShape::Polygon { exterior, holes } => {
                let mut edges = ring_edges(exterior);
                for hole in holes {
                    edges.extend(ring_edges(hole));
                }
                edges
            }
            GeoShape::Envelope(bbox) => ring_edges(&bbox.corners()),
        }
    }

    pub fn bounding_box(&self) -> GeoBoundingBox {
        match self {
            GeoShape::Envelope(bbox) => *bbox,
            other => {
                let points = other.representative_points();
                GeoBoundingBox::enclosing(&points).unwrap_or(GeoBoundingBox {
                    top_left: GeoPoint { lat: 0.0, lon: 0.0 },
                    bottom_right: GeoPoint { lat: 0.0, lon: 0.0 },
                })
            }
        }
    }

    /// Whether a point lies on or inside this shape. Boundaries count as inside.
    pub fn covers_point(&self, point: &GeoPoint) -> bool {
        match self {
            GeoShape::Point(p) => same_point(p, point),
            GeoShape::MultiPoint(points) => points.iter().any(|p| same_point(p, point)),
            GeoShape::LineString(points) => points
                .windows(2)
                .any(|w| on_segment(point, &w[0], &w[1])),
            GeoShape::Envelope(bbox) => bbox.contains(point),
            GeoShape::Polygon { exterior, holes } => {
                if !ring_covers(exterior, point) {
                    return false;
                }
                holes
                    .iter()
                    .all(|hole| !ring_covers(hole, point) || on_ring(hole, point))
            }
        }
    }
}

fn positions(value: &Value) -> Result<Vec<GeoPoint>> {
    value
        .as_array()
        .ok_or_else(|| invalid_shape(value, "expected an array of positions"))?
        .iter()
        .map(GeoPoint::from_lon_lat)
        .collect()
}

/// Drop the closing point of a ring when it repeats the first one.
fn open_ring(mut ring: Vec<GeoPoint>) -> Vec<GeoPoint> {
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

fn ring_edges(ring: &[GeoPoint]) -> Vec<(GeoPoint, GeoPoint)> {
    (0..ring.len())
        .map(|i| (ring[i], ring[(i + 1) % ring.len()]))
        .collect()
}

fn same_point(a: &GeoPoint, b: &GeoPoint) -> bool {
    (a.lat - b.lat).abs() <= EPSILON && (a.lon - b.lon).abs() <= EPSILON
}

fn on_ring(ring: &[GeoPoint], point: &GeoPoint) -> bool {
    ring_edges(ring)
        .iter()
        .any(|(a, b)| on_segment(point, a, b))
}

/// Ray casting, with points on an edge counted as covered.
fn ring_covers(ring: &[GeoPoint], point: &GeoPoint) -> bool {
    if on_ring(ring, point) {
        return true;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (pi, pj) = (ring[i], ring[j]);
        if (pi.lat > point.lat) != (pj.lat > point.lat) {
            let crossing = (pj.lon - pi.lon) * (point.lat - pi.lat) / (pj.lat - pi.lat) + pi.lon;
            if point.lon < crossing {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Cross product sign of (b - a) x (c - a), in lon/lat space.
fn orientation(a: &GeoPoint, b: &GeoPoint, c: &GeoPoint) -> f64 {
    (b.lon - a.lon) * (c.lat - a.lat) - (b.lat - a.lat) * (c.lon - a.lon)
}

fn on_segment(p: &GeoPoint, a: &GeoPoint, b: &GeoPoint) -> bool {
    orientation(a, b, p).abs() <= EPSILON
        && p.lon >= a.lon.min(b.lon) - EPSILON
        && p.lon <= a.lon.max(b.lon) + EPSILON
        && p.lat >= a.lat.min(b.lat) - EPSILON
        && p.lat <= a.lat.max(b.lat) + EPSILON
}

/// Whether two closed segments share at least one point.
pub(crate) fn segments_intersect(
    (p1, p2): (GeoPoint, GeoPoint),
    (q1, q2): (GeoPoint, GeoPoint),
) -> bool {
    let d1 = orientation(&q1, &q2, &p1);
    let d2 = orientation(&q1, &q2, &p2);
    let d3 = orientation(&p1, &p2, &q1);
    let d4 = orientation(&p1, &p2, &q2);

    if ((d1 > EPSILON && d2 < -EPSILON) || (d1 < -EPSILON && d2 > EPSILON))
        && ((d3 > EPSILON && d4 < -EPSILON) || (d3 < -EPSILON && d4 > EPSILON))
    {
        return true;
    }
    on_segment(&p1, &q1, &q2)
        || on_segment(&p2, &q1, &q2)
        || on_segment(&q1, &p1, &p2)
        || on_segment(&q2, &p1, &p2)
}

fn invalid_shape(value: &Value, reason: &str) -> QuarryError {
    QuarryError::invalid_request(format!("failed to parse shape {value}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(lon: f64, lat: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn test_parse_envelope_normalizes_corners() {
        let a = GeoShape::from_json(&json!({
            "type": "envelope", "coordinates": [[13.0, 53.0], [14.0, 52.0]]
        }))
        .unwrap();
        let b = GeoShape::from_json(&json!({
            "type": "Envelope", "coordinates": [[14.0, 52.0], [13.0, 53.0]]
        }))
        .unwrap();
        assert_eq!(a, b);
        let GeoShape::Envelope(bbox) = a else {
            panic!("expected envelope");
        };
        assert_eq!(bbox.top_left, point(13.0, 53.0));
        assert_eq!(bbox.bottom_right, point(14.0, 52.0));
    }

    #[test]
    fn test_parse_polygon_with_hole() {
        let shape = GeoShape::from_json(&json!({
            "type": "polygon",
            "coordinates": [
                [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]],
                [[4.0, 4.0], [6.0, 4.0], [6.0, 6.0], [4.0, 6.0], [4.0, 4.0]]
            ]
        }))
        .unwrap();

        assert!(shape.is_area());
        assert!(shape.covers_point(&point(1.0, 1.0)));
        assert!(shape.covers_point(&point(10.0, 5.0)));
        assert!(!shape.covers_point(&point(5.0, 5.0)));
        assert!(shape.covers_point(&point(4.0, 5.0)));
        assert!(!shape.covers_point(&point(11.0, 5.0)));
        assert_eq!(shape.representative_points().len(), 4);
    }

    #[test]
    fn test_parse_errors() {
        assert!(GeoShape::from_json(&json!({"type": "point"})).is_err());
        assert!(GeoShape::from_json(&json!({"type": "circle", "coordinates": [0, 0]})).is_err());
        assert!(
            GeoShape::from_json(&json!({"type": "linestring", "coordinates": [[0, 0]]})).is_err()
        );
        assert!(GeoShape::from_json(&json!({"type": "multipoint", "coordinates": []})).is_err());
        assert!(GeoShape::from_json(&json!({"type": "MultiPoint", "coordinates": [[1, 2]]})).is_ok());
    }

    #[test]
    fn test_linestring_covers_point() {
        let line = GeoShape::LineString(vec![point(0.0, 0.0), point(2.0, 2.0)]);
        assert!(line.covers_point(&point(1.0, 1.0)));
        assert!(!line.covers_point(&point(1.0, 1.5)));
    }

    #[test]
    fn test_segments_intersect() {
        let a = (point(0.0, 0.0), point(2.0, 2.0));
        let b = (point(0.0, 2.0), point(2.0, 0.0));
        let c = (point(3.0, 3.0), point(4.0, 4.0));
        assert!(segments_intersect(a, b));
        assert!(!segments_intersect(a, c));
    }
}
