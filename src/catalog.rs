//! Catalog records and their projected screen positions.

use serde::{Deserialize, Serialize};

use crate::geom::{Frame, Projector};

/// Kind-specific payload of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PointKind {
    Galaxy {
        /// Distance in Mpc.
        dist: f64,
        /// log10 stellar mass.
        mass: f64,
    },
    Pulsar {
        /// Spin period in milliseconds.
        p0: f64,
    },
}

/// A catalog entry in equatorial coordinates (degrees).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkyPoint {
    pub id: String,
    pub ra: f64,
    pub dec: f64,
    #[serde(flatten)]
    pub kind: PointKind,
}

impl SkyPoint {
    pub fn galaxy(id: impl Into<String>, ra: f64, dec: f64, dist: f64, mass: f64) -> Self {
        Self {
            id: id.into(),
            ra,
            dec,
            kind: PointKind::Galaxy { dist, mass },
        }
    }

    pub fn pulsar(id: impl Into<String>, ra: f64, dec: f64, p0: f64) -> Self {
        Self {
            id: id.into(),
            ra,
            dec,
            kind: PointKind::Pulsar { p0 },
        }
    }

    pub fn is_pulsar(&self) -> bool {
        matches!(self.kind, PointKind::Pulsar { .. })
    }

    /// Type label used in exports.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            PointKind::Galaxy { .. } => "Galaxy",
            PointKind::Pulsar { .. } => "Pulsar",
        }
    }

    /// Distance, or 0 for pulsars.
    pub fn dist(&self) -> f64 {
        match self.kind {
            PointKind::Galaxy { dist, .. } => dist,
            PointKind::Pulsar { .. } => 0.0,
        }
    }

    /// log10 mass, or 0 for pulsars.
    pub fn mass(&self) -> f64 {
        match self.kind {
            PointKind::Galaxy { mass, .. } => mass,
            PointKind::Pulsar { .. } => 0.0,
        }
    }
}

/// A posterior sample position, degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub ra: f64,
    pub dec: f64,
}

/// Screen placement of one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    /// Index into the catalog the projection was built from.
    pub index: usize,
    pub x: f64,
    pub y: f64,
    /// Longitude in the display frame, degrees.
    pub lon: f64,
    /// Latitude in the display frame, degrees.
    pub lat: f64,
}

/// Project every catalog entry. Output order matches `points`.
pub fn project_all(
    points: &[SkyPoint],
    projector: &Projector,
    frame: Frame,
    center_lon: f64,
) -> Vec<ProjectedPoint> {
    points
        .iter()
        .enumerate()
        .map(|(index, p)| {
            let (lon, lat) = frame.display_coords(p.ra, p.dec);
            let (x, y) = projector.project(lon, lat, center_lon);
            ProjectedPoint {
                index,
                x,
                y,
                lon,
                lat,
            }
        })
        .collect()
}

/// Numeric range filters applied to galaxies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    pub dist_min: f64,
    pub dist_max: f64,
    pub mass_min: f64,
    pub mass_max: f64,
    pub show_pulsars: bool,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            dist_min: 0.0,
            dist_max: 500.0,
            mass_min: 6.0,
            mass_max: 10.5,
            show_pulsars: true,
        }
    }
}

impl Filters {
    /// Pulsars pass when shown; galaxies must sit inside both ranges.
    pub fn accepts(&self, point: &SkyPoint) -> bool {
        match point.kind {
            PointKind::Pulsar { .. } => self.show_pulsars,
            PointKind::Galaxy { dist, mass } => {
                dist >= self.dist_min
                    && dist <= self.dist_max
                    && mass >= self.mass_min
                    && mass <= self.mass_max
            }
        }
    }

    /// Move the distance minimum, dragging the maximum up if crossed.
    pub fn set_dist_min(&mut self, v: f64) {
        self.dist_min = v;
        if self.dist_max < v {
            self.dist_max = v;
        }
    }

    /// Move the distance maximum, dragging the minimum down if crossed.
    pub fn set_dist_max(&mut self, v: f64) {
        self.dist_max = v;
        if self.dist_min > v {
            self.dist_min = v;
        }
    }

    pub fn set_mass_min(&mut self, v: f64) {
        self.mass_min = v;
        if self.mass_max < v {
            self.mass_max = v;
        }
    }

    pub fn set_mass_max(&mut self, v: f64) {
        self.mass_max = v;
        if self.mass_min > v {
            self.mass_min = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Canvas;

    #[test]
    fn kind_accessors() {
        let g = SkyPoint::galaxy("g1", 10.0, 20.0, 120.0, 9.5);
        let p = SkyPoint::pulsar("J0437-4715", 69.3, -47.2, 5.76);
        assert_eq!(g.type_name(), "Galaxy");
        assert_eq!(p.type_name(), "Pulsar");
        assert!(p.is_pulsar());
        assert_eq!(g.dist(), 120.0);
        assert_eq!(p.mass(), 0.0);
    }

    #[test]
    fn pulsar_json_shape() {
        let json = r#"{"id":"B1919+21","ra":290.4,"dec":21.9,"type":"Pulsar","p0":1337.3}"#;
        let p: SkyPoint = serde_json::from_str(json).unwrap();
        assert_eq!(p, SkyPoint::pulsar("B1919+21", 290.4, 21.9, 1337.3));
    }

    #[test]
    fn projection_keeps_order_and_frame_coords() {
        let points = vec![
            SkyPoint::galaxy("a", 180.0, 0.0, 10.0, 8.0),
            SkyPoint::galaxy("b", 10.0, 45.0, 10.0, 8.0),
        ];
        let projector = Projector::new(Canvas::new(800.0, 400.0, 20.0));
        let eq = project_all(&points, &projector, Frame::Equatorial, 180.0);
        assert_eq!(eq.len(), 2);
        assert_eq!(eq[0].index, 0);
        assert_eq!((eq[0].x, eq[0].y), (400.0, 200.0));
        assert_eq!((eq[1].lon, eq[1].lat), (10.0, 45.0));

        let gal = project_all(&points, &projector, Frame::Galactic, 0.0);
        let (l, b) = crate::geom::equatorial_to_galactic(10.0, 45.0);
        assert_eq!((gal[1].lon, gal[1].lat), (l, b));
    }

    #[test]
    fn filters_accept() {
        let f = Filters::default();
        assert!(f.accepts(&SkyPoint::galaxy("in", 0.0, 0.0, 100.0, 8.0)));
        assert!(!f.accepts(&SkyPoint::galaxy("far", 0.0, 0.0, 600.0, 8.0)));
        assert!(!f.accepts(&SkyPoint::galaxy("light", 0.0, 0.0, 100.0, 5.0)));
        assert!(f.accepts(&SkyPoint::pulsar("p", 0.0, 0.0, 1.0)));

        let hidden = Filters {
            show_pulsars: false,
            ..Filters::default()
        };
        assert!(!hidden.accepts(&SkyPoint::pulsar("p", 0.0, 0.0, 1.0)));
    }

    #[test]
    fn filter_ranges_stay_ordered() {
        let mut f = Filters::default();
        f.set_dist_min(600.0);
        assert_eq!((f.dist_min, f.dist_max), (600.0, 600.0));
        f.set_mass_max(5.0);
        assert_eq!((f.mass_min, f.mass_max), (5.0, 5.0));
    }
}
