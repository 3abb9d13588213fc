//! Southern Thailand region checks
//!
//! Two independent tests: a province-name allow-list and a point-in-polygon
//! check against a coarse outline of the southern peninsula.

/// Southern provinces, English and Thai names, lower-cased
const SOUTHERN_PROVINCES: &[&str] = &[
    "phuket",
    "krabi",
    "phang nga",
    "ranong",
    "chumphon",
    "surat thani",
    "nakhon si thammarat",
    "phatthalung",
    "trang",
    "satun",
    "songkhla",
    "pattani",
    "yala",
    "narathiwat",
    "ภูเก็ต",
    "กระบี่",
    "พังงา",
    "ระนอง",
    "ชุมพร",
    "สุราษฎร์ธานี",
    "นครศรีธรรมราช",
    "พัทลุง",
    "ตรัง",
    "สตูล",
    "สงขลา",
    "ปัตตานี",
    "ยะลา",
    "นราธิวาส",
];

const MIN_LAT: f64 = 5.6;
const MAX_LAT: f64 = 11.1;
const MIN_LON: f64 = 98.3;
const MAX_LON: f64 = 102.1;

/// Outline of the region as `(longitude, latitude)` vertices, Andaman coast
/// first then round the gulf; the ring closes implicitly
pub const SOUTHERN_POLYGON: [(f64, f64); 17] = [
    (98.20, 8.30),
    (98.30, 7.70),
    (98.45, 7.20),
    (98.80, 6.80),
    (99.10, 6.50),
    (100.00, 5.60),
    (101.30, 5.75),
    (102.10, 6.50),
    (102.10, 7.80),
    (101.90, 8.80),
    (101.50, 9.60),
    (101.00, 10.50),
    (100.50, 11.10),
    (99.50, 11.10),
    (98.80, 10.50),
    (98.30, 9.50),
    (98.20, 8.80),
];

/// Outcome of a coordinate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoVerdict {
    /// Rejected by the bounding box without walking the polygon
    OutsideBounds,
    OutsidePolygon,
    Inside,
}

impl GeoVerdict {
    pub fn is_inside(&self) -> bool {
        matches!(self, GeoVerdict::Inside)
    }
}

/// Whether `name` is one of the southern provinces
///
/// Case-insensitive after trimming; no partial matches.
pub fn is_southern_province(name: &str) -> bool {
    let name = name.trim().to_lowercase();
    !name.is_empty() && SOUTHERN_PROVINCES.contains(&name.as_str())
}

/// Classifies a coordinate against the southern region
pub fn classify(lat: f64, lon: f64) -> GeoVerdict {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) || !(MIN_LON..=MAX_LON).contains(&lon) {
        return GeoVerdict::OutsideBounds;
    }
    if point_in_polygon(lat, lon, &SOUTHERN_POLYGON) {
        GeoVerdict::Inside
    } else {
        GeoVerdict::OutsidePolygon
    }
}

/// Whether the coordinate falls inside the southern region
pub fn in_southern_thailand(lat: f64, lon: f64) -> bool {
    classify(lat, lon).is_inside()
}

/// Even-odd ray casting against a ring of `(lon, lat)` vertices
///
/// Points exactly on an edge fall wherever the crossing parity puts them.
pub fn point_in_polygon(lat: f64, lon: f64, ring: &[(f64, f64)]) -> bool {
    let Some(&last) = ring.last() else {
        return false;
    };

    let mut inside = false;
    let mut prev = last;
    for &(xi, yi) in ring {
        let (xj, yj) = prev;
        if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        prev = (xi, yi);
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_province_allow_list_english() {
        assert!(is_southern_province("Songkhla"));
        assert!(is_southern_province("  surat thani "));
        assert!(is_southern_province("NAKHON SI THAMMARAT"));
    }

    #[test]
    fn test_province_allow_list_thai() {
        assert!(is_southern_province("สงขลา"));
        assert!(is_southern_province(" ภูเก็ต"));
    }

    #[test]
    fn test_province_allow_list_rejects_others() {
        assert!(!is_southern_province("Bangkok"));
        assert!(!is_southern_province("กรุงเทพมหานคร"));
        assert!(!is_southern_province("Songkhla Province"));
        assert!(!is_southern_province(""));
    }

    #[test]
    fn test_known_inside_points() {
        // Hat Yai
        assert_eq!(classify(7.0, 100.47), GeoVerdict::Inside);
        // Surat Thani
        assert_eq!(classify(9.14, 99.33), GeoVerdict::Inside);
    }

    #[test]
    fn test_bounding_box_rejects_fast() {
        // Bangkok
        assert_eq!(classify(13.75, 100.5), GeoVerdict::OutsideBounds);
        // Antipode of Hat Yai
        assert_eq!(classify(-7.0, -79.53), GeoVerdict::OutsideBounds);
        assert!(!in_southern_thailand(-7.0, -79.53));
        // Between the outline's western edge and the box's western limit
        assert!(point_in_polygon(8.5, 98.25, &SOUTHERN_POLYGON));
        assert_eq!(classify(8.5, 98.25), GeoVerdict::OutsideBounds);
    }

    #[test]
    fn test_inside_box_outside_polygon() {
        // North-west corner of the box, in the Andaman Sea off Ranong
        assert_eq!(classify(10.9, 98.4), GeoVerdict::OutsidePolygon);
        assert!(!in_southern_thailand(10.9, 98.4));
    }

    #[test]
    fn test_point_in_polygon_unit_square() {
        let square = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        assert!(point_in_polygon(0.5, 0.5, &square));
        assert!(!point_in_polygon(1.5, 0.5, &square));
        assert!(!point_in_polygon(0.5, 0.5, &[]));
    }
}
