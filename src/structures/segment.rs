use crate::structures::LatLng;

/// Track geometry between two consecutive stations on a route, as an
/// ordered polyline sampled at roughly 500 m. Cumulative point-to-point
/// lengths are precomputed so progress projection stays cheap.
#[derive(Debug, Clone)]
pub struct RouteSegment {
    pub from_station: String,
    pub to_station: String,
    pub points: Vec<LatLng>,
    pub cumulative_km: Vec<f64>,
    pub length_km: f64,
}

impl RouteSegment {
    pub fn new(from_station: String, to_station: String, points: Vec<LatLng>) -> RouteSegment {
        let mut cumulative_km = Vec::with_capacity(points.len());
        let mut total = 0.0;

        for (i, point) in points.iter().enumerate() {
            if i > 0 {
                total += points[i - 1].dist_km(*point);
            }
            cumulative_km.push(total);
        }

        RouteSegment {
            from_station,
            to_station,
            points,
            cumulative_km,
            length_km: total,
        }
    }

    /// Polyline point reached after covering `fraction` of the segment
    /// length. Fractions outside [0, 1] clamp to the endpoints.
    pub fn point_at_fraction(&self, fraction: f64) -> Option<LatLng> {
        if self.points.is_empty() {
            return None;
        }
        if self.points.len() == 1 || fraction <= 0.0 {
            return Some(self.points[0]);
        }
        if fraction >= 1.0 {
            return self.points.last().copied();
        }

        let target = self.length_km * fraction;
        let idx = self.cumulative_km.partition_point(|&d| d < target);
        if idx == 0 {
            return Some(self.points[0]);
        }

        let prev = self.cumulative_km[idx - 1];
        let span = self.cumulative_km[idx] - prev;
        let t = if span > 0.0 { (target - prev) / span } else { 0.0 };

        let a = self.points[idx - 1];
        let b = self.points[idx];
        Some(LatLng::new(
            a.latitude + (b.latitude - a.latitude) * t,
            a.longitude + (b.longitude - a.longitude) * t,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn segment() -> RouteSegment {
        RouteSegment::new(
            "Dhaka".to_string(),
            "Tangail".to_string(),
            vec![
                LatLng::new(23.80, 90.40),
                LatLng::new(23.95, 90.25),
                LatLng::new(24.10, 90.05),
                LatLng::new(24.25, 89.92),
            ],
        )
    }

    #[test]
    fn cumulative_lengths_are_monotonic() {
        let seg = segment();
        assert_eq!(seg.cumulative_km.len(), seg.points.len());
        assert_relative_eq!(seg.cumulative_km[0], 0.0);
        for pair in seg.cumulative_km.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        assert_relative_eq!(*seg.cumulative_km.last().unwrap(), seg.length_km);
    }

    #[test]
    fn fraction_endpoints_map_to_stations() {
        let seg = segment();
        assert_eq!(seg.point_at_fraction(0.0), Some(seg.points[0]));
        assert_eq!(seg.point_at_fraction(1.0), Some(seg.points[3]));
        assert_eq!(seg.point_at_fraction(-0.5), Some(seg.points[0]));
        assert_eq!(seg.point_at_fraction(2.0), Some(seg.points[3]));
    }

    #[test]
    fn midpoint_lies_between_endpoints() {
        let seg = segment();
        let mid = seg.point_at_fraction(0.5).unwrap();
        assert!(mid.latitude > seg.points[0].latitude);
        assert!(mid.latitude < seg.points[3].latitude);
    }

    #[test]
    fn empty_polyline_has_no_point() {
        let seg = RouteSegment::new("A".to_string(), "B".to_string(), vec![]);
        assert_relative_eq!(seg.length_km, 0.0);
        assert_eq!(seg.point_at_fraction(0.5), None);
    }
}
