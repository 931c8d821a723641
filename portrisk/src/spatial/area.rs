// SPDX-License-Identifier: AGPL-3.0-or-later
//! Area of latitude/longitude bins on the WGS84 sphere.
//!
//! A cell between latitudes `φ₁, φ₂` spanning `Δλ` radians of longitude
//! covers `R²·Δλ·|sin φ₂ − sin φ₁|`, so equal-degree bins shrink toward
//! the poles.

/// WGS84 equatorial radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Area in km² of the cell `[lat_south, lat_north] × Δlon` (degrees).
#[must_use]
pub fn cell_area_km2(lat_south: f64, lat_north: f64, lon_span: f64) -> f64 {
    let south = lat_south.clamp(-90.0, 90.0).to_radians();
    let north = lat_north.clamp(-90.0, 90.0).to_radians();
    EARTH_RADIUS_M * EARTH_RADIUS_M * lon_span.abs().to_radians() * (north.sin() - south.sin()).abs() * 1e-6
}

/// Area in km² of the square bin of side `bin_size` degrees whose
/// southern edge is the bin label `lat_bin`, i.e. `[lat_bin, lat_bin + bin_size]`.
#[must_use]
pub fn bin_area_km2(lat_bin: f64, bin_size: f64) -> f64 {
    cell_area_km2(lat_bin, lat_bin + bin_size, bin_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equatorial_degree_cell() {
        let a = bin_area_km2(0.0, 1.0);
        assert!((a - 12_391.4).abs() < 0.1, "area {a}");
    }

    #[test]
    fn band_starts_at_label() {
        for lat in [-60.0, 0.0, 30.0, 80.0] {
            assert_eq!(bin_area_km2(lat, 1.0).to_bits(), cell_area_km2(lat, lat + 1.0, 1.0).to_bits());
        }
        // 80° band [80, 81], not [79.5, 80.5]
        let a = bin_area_km2(80.0, 1.0);
        assert!((a - 2045.2).abs() < 0.5, "area {a}");
        assert!((bin_area_km2(0.5, 1.0) - bin_area_km2(0.0, 1.0)).abs() > 1.0);
    }

    #[test]
    fn shrinks_toward_poles() {
        let mut prev = f64::INFINITY;
        for lat in [0.0, 20.0, 40.0, 60.0, 80.0, 89.0] {
            let a = bin_area_km2(lat, 1.0);
            assert!(a < prev, "lat {lat}: {a} >= {prev}");
            prev = a;
        }
        assert!((bin_area_km2(60.0, 1.0) / bin_area_km2(0.0, 1.0) - 0.5).abs() < 0.01);
    }

    #[test]
    fn symmetric_and_clamped() {
        // [45, 46] mirrors [-46, -45]
        assert!((bin_area_km2(45.0, 1.0) - bin_area_km2(-46.0, 1.0)).abs() < 1e-6);
        // nothing lies north of the pole
        assert!(bin_area_km2(89.0, 1.0) > 0.0);
        assert!(bin_area_km2(90.0, 1.0).abs() < 1e-9);
    }

    #[test]
    fn whole_sphere() {
        let total = cell_area_km2(-90.0, 90.0, 360.0);
        let expected = 4.0 * std::f64::consts::PI * EARTH_RADIUS_M * EARTH_RADIUS_M * 1e-6;
        assert!((total - expected).abs() / expected < 1e-12);
    }
}
