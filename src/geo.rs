//! General geographic data structures: coordinates, boundaries, and the
//! bijective mapping between decimal-degree floats and the fixed-point
//! integer representation used by the relational store.
use std::ops::{Add, Sub};

/// Scale factor between decimal degrees and the integer representation:
/// microdegrees times ten, i.e. 1 / 10^7 of a degree.
const COORD_PRECISION: f64 = 10_000_000.0;

/// Encode a decimal-degree value as a signed 32-bit fixed-point integer
/// scaled by 10^7.
///
/// Rounding is asymmetric around zero so that the mapping is symmetric:
/// non-negative inputs round half up, negative inputs round half down.
pub fn encode(value: f64) -> i32 {
    let scaled = value * COORD_PRECISION;
    let rounded = if value >= 0.0 {
        (scaled + 0.5).floor()
    } else {
        (scaled - 0.5).ceil()
    };
    rounded as i32
}

/// Decode a fixed-point coordinate back to decimal degrees.
pub fn decode(value: i32) -> f64 {
    value as f64 / COORD_PRECISION
}

/// Represents a coordinate containing latitude and longitude.
///
/// Coordinates are usually represented by floating point numbers, for
/// coordinates in the osm system we do not need more precision than 7
/// decimals. The coordinates are represented as two i32 internally, via
/// [`encode`]/[`decode`].
///
/// # Examples
/// ```
/// # use osm_digest::geo::Coordinate;
/// let coordinate = Coordinate::new(70.95, -8.67);
///
/// assert_eq!(coordinate.lat(), 70.95);
/// assert_eq!(coordinate.lon(), -8.67);
///
/// // You can also use the `Into` trait to construct coordinates.
/// let coordinate: Coordinate = (70.95, -8.67).into();
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub struct Coordinate {
    pub lat: i32,
    pub lon: i32,
}

/// Represents coordinate boundary, i.e. min and max latitude and longitude.
///
/// # Examples
/// ```
/// # use osm_digest::geo::Boundary;
/// // Default creates boundaries covering the whole world.
/// let bounds = Boundary::default();
///
/// assert_eq!(bounds.min.lat(), -90.0);
/// assert_eq!(bounds.min.lon(), -180.0);
/// assert_eq!(bounds.max.lat(), 90.0);
/// assert_eq!(bounds.max.lon(), 180.0);
///
/// // Inverted boundary is useful when it is intended to be dynamically
/// // expanded.
/// let mut bounds = Boundary::inverted();
/// bounds.expand((10.0, 20.0).into());
/// bounds.expand((30.0, 40.0).into());
///
/// assert_eq!(bounds.min.lat(), 10.0);
/// assert_eq!(bounds.min.lon(), 20.0);
/// assert_eq!(bounds.max.lat(), 30.0);
/// assert_eq!(bounds.max.lon(), 40.0);
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Boundary {
    pub min: Coordinate,
    pub max: Coordinate,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Coordinate {
        Coordinate {
            lat: encode(lat),
            lon: encode(lon),
        }
    }

    pub fn lat(self) -> f64 {
        decode(self.lat)
    }

    pub fn lon(self) -> f64 {
        decode(self.lon)
    }

    /// Whether this coordinate lies within `boundary`, inclusive of the
    /// edges.
    pub fn within(self, boundary: &Boundary) -> bool {
        self.lat >= boundary.min.lat
            && self.lat <= boundary.max.lat
            && self.lon >= boundary.min.lon
            && self.lon <= boundary.max.lon
    }
}

impl Sub for Coordinate {
    type Output = Coordinate;

    fn sub(self, rhs: Self) -> Self::Output {
        Coordinate {
            lon: self.lon - rhs.lon,
            lat: self.lat - rhs.lat,
        }
    }
}

impl Add for Coordinate {
    type Output = Coordinate;

    fn add(self, rhs: Self) -> Self::Output {
        Coordinate {
            lon: self.lon + rhs.lon,
            lat: self.lat + rhs.lat,
        }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lon): (f64, f64)) -> Self {
        Coordinate::new(lat, lon)
    }
}

impl Boundary {
    pub fn new<C: Into<Coordinate>>(min: C, max: C) -> Boundary {
        Boundary {
            min: min.into(),
            max: max.into(),
        }
    }

    /// Same as `default()` but inverted so min contains max and max
    /// contains min. Used when a boundary is intended to be expanded by
    /// coordinates as they are encountered.
    pub fn inverted() -> Self {
        Boundary {
            min: (90.0, 180.0).into(),
            max: (-90.0, -180.0).into(),
        }
    }

    /// Expand boundary if necessary to include a coordinate.
    pub fn expand(&mut self, c: Coordinate) {
        if c.lat > self.max.lat {
            self.max.lat = c.lat;
        }
        if c.lat < self.min.lat {
            self.min.lat = c.lat;
        }
        if c.lon > self.max.lon {
            self.max.lon = c.lon;
        }
        if c.lon < self.min.lon {
            self.min.lon = c.lon;
        }
    }
}

impl Default for Boundary {
    fn default() -> Self {
        Boundary {
            min: (-90.0, -180.0).into(),
            max: (90.0, 180.0).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn encode_rounds_away_from_zero_on_the_half() {
        assert_eq!(encode(-0.0000001), -1);
        assert_eq!(encode(0.0000001), 1);
    }

    #[test]
    fn round_trip_within_tolerance() {
        for v in &[12.2482632_f64, -122.4194, 0.0, 89.9999999, -179.9999999] {
            assert_approx_eq!(decode(encode(*v)), *v, 5e-8);
        }
    }

    #[test]
    fn boundary_expand() {
        let mut bounds = Boundary::inverted();
        bounds.expand((10.0, 20.0).into());
        bounds.expand((30.0, 40.0).into());

        assert_eq!(bounds.min, (10.0, 20.0).into());
        assert_eq!(bounds.max, (30.0, 40.0).into());
    }

    #[test]
    fn coordinate_within_boundary() {
        let boundary = Boundary::new((0.0, 0.0), (10.0, 10.0));
        assert!(Coordinate::new(5.0, 5.0).within(&boundary));
        assert!(!Coordinate::new(-1.0, 5.0).within(&boundary));
    }
}
