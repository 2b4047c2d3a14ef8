//! Points, bounding boxes and distances.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{QuarryError, Result};

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A geographical point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Create a point, validating coordinate ranges.
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(QuarryError::invalid_request(format!(
                "illegal latitude value [{lat}]"
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(QuarryError::invalid_request(format!(
                "illegal longitude value [{lon}]"
            )));
        }
        Ok(GeoPoint { lat, lon })
    }

    /// Create from a GeoJSON `[lon, lat]` position.
    pub fn from_lon_lat(position: &Value) -> Result<Self> {
        let coords = position
            .as_array()
            .filter(|c| c.len() >= 2)
            .ok_or_else(|| {
                QuarryError::invalid_request(format!("expected [lon, lat], got {position}"))
            })?;
        let lon = coords[0].as_f64();
        let lat = coords[1].as_f64();
        match (lat, lon) {
            (Some(lat), Some(lon)) => GeoPoint::new(lat, lon),
            _ => Err(QuarryError::invalid_request(format!(
                "expected numeric [lon, lat], got {position}"
            ))),
        }
    }

    /// Parse any of the accepted `geo_point` encodings:
    /// `{"lat": .., "lon": ..}`, `"lat,lon"`, `[lon, lat]` or a GeoJSON point.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Object(map) => {
                if let (Some(lat), Some(lon)) = (map.get("lat"), map.get("lon")) {
                    let lat = number(lat).ok_or_else(|| invalid_point(value))?;
                    let lon = number(lon).ok_or_else(|| invalid_point(value))?;
                    return GeoPoint::new(lat, lon);
                }
                match (map.get("type").and_then(Value::as_str), map.get("coordinates")) {
                    (Some(kind), Some(coords)) if kind.eq_ignore_ascii_case("point") => {
                        GeoPoint::from_lon_lat(coords)
                    }
                    _ => Err(invalid_point(value)),
                }
            }
            Value::String(text) => {
                let (lat, lon) = text.split_once(',').ok_or_else(|| invalid_point(value))?;
                let lat = lat.trim().parse::<f64>().map_err(|_| invalid_point(value))?;
                let lon = lon.trim().parse::<f64>().map_err(|_| invalid_point(value))?;
                GeoPoint::new(lat, lon)
            }
            Value::Array(_) => GeoPoint::from_lon_lat(value),
            _ => Err(invalid_point(value)),
        }
    }

    /// Great-circle distance in meters (haversine).
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let lat1_rad = self.lat.to_radians();
        let lat2_rad = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lon = (other.lon - self.lon).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_M * c
    }

    pub fn within_bounds(&self, min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> bool {
        self.lat >= min_lat && self.lat <= max_lat && self.lon >= min_lon && self.lon <= max_lon
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn invalid_point(value: &Value) -> QuarryError {
    QuarryError::invalid_request(format!("failed to parse geo point from {value}"))
}

/// An axis-aligned box, always stored as top-left / bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBoundingBox {
    pub top_left: GeoPoint,
    pub bottom_right: GeoPoint,
}

impl GeoBoundingBox {
    /// Build from any two opposite corners, in any order.
    pub fn from_corners(a: GeoPoint, b: GeoPoint) -> Self {
        GeoBoundingBox {
            top_left: GeoPoint {
                lat: a.lat.max(b.lat),
                lon: a.lon.min(b.lon),
            },
            bottom_right: GeoPoint {
                lat: a.lat.min(b.lat),
                lon: a.lon.max(b.lon),
            },
        }
    }

    /// The smallest box covering all points, or `None` for no points.
    pub fn enclosing(points: &[GeoPoint]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = GeoBoundingBox::from_corners(*first, *first);
        for point in &points[1..] {
            bbox.top_left.lat = bbox.top_left.lat.max(point.lat);
            bbox.top_left.lon = bbox.top_left.lon.min(point.lon);
            bbox.bottom_right.lat = bbox.bottom_right.lat.min(point.lat);
            bbox.bottom_right.lon = bbox.bottom_right.lon.max(point.lon);
        }
        Some(bbox)
    }

    pub fn min_lat(&self) -> f64 {
        self.bottom_right.lat
    }

    pub fn max_lat(&self) -> f64 {
        self.top_left.lat
    }

    pub fn min_lon(&self) -> f64 {
        self.top_left.lon
    }

    pub fn max_lon(&self) -> f64 {
        self.bottom_right.lon
    }

    /// Boundary-inclusive containment.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.within_bounds(self.min_lat(), self.max_lat(), self.min_lon(), self.max_lon())
    }

    pub fn intersects(&self, other: &GeoBoundingBox) -> bool {
        self.min_lat() <= other.max_lat()
            && other.min_lat() <= self.max_lat()
            && self.min_lon() <= other.max_lon()
            && other.min_lon() <= self.max_lon()
    }

    /// The four corners, clockwise from top-left.
    pub fn corners(&self) -> [GeoPoint; 4] {
        [
            self.top_left,
            GeoPoint {
                lat: self.top_left.lat,
                lon: self.bottom_right.lon,
            },
            self.bottom_right,
            GeoPoint {
                lat: self.bottom_right.lat,
                lon: self.top_left.lon,
            },
        ]
    }

    /// Parse `{"top_left": .., "bottom_right": ..}` (or the
    /// `top_right`/`bottom_left` pair) using any point encoding.
    pub fn from_json(value: &Value) -> Result<Self> {
        let corner = |name: &str| value.get(name).map(GeoPoint::from_json).transpose();
        if let (Some(a), Some(b)) = (corner("top_left")?, corner("bottom_right")?) {
            return Ok(GeoBoundingBox::from_corners(a, b));
        }
        if let (Some(a), Some(b)) = (corner("top_right")?, corner("bottom_left")?) {
            return Ok(GeoBoundingBox::from_corners(a, b));
        }
        Err(QuarryError::invalid_query(format!(
            "failed to parse bounding box from {value}"
        )))
    }
}

/// Parse a distance such as `"12km"`, `"500m"` or `"3mi"` into meters.
/// A bare number is taken as meters.
pub fn parse_distance(value: &Value) -> Result<f64> {
    let text = match value {
        Value::Number(n) => return n.as_f64().ok_or_else(|| invalid_distance(value)),
        Value::String(s) => s.trim(),
        _ => return Err(invalid_distance(value)),
    };
    let split = text
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let number: f64 = number.parse().map_err(|_| invalid_distance(value))?;
    let factor = match unit.trim() {
        "" | "m" | "meters" => 1.0,
        "km" | "kilometers" => 1_000.0,
        "cm" => 0.01,
        "mm" => 0.001,
        "mi" | "miles" => 1_609.344,
        "yd" | "yards" => 0.9144,
        "ft" | "feet" => 0.3048,
        "in" | "inch" => 0.0254,
        "nmi" | "NM" => 1_852.0,
        _ => return Err(invalid_distance(value)),
    };
    Ok(number * factor)
}

fn invalid_distance(value: &Value) -> QuarryError {
    QuarryError::invalid_query(format!("failed to parse distance {value}"))
}
