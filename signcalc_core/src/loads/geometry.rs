//! Sign geometry
//!
//! A sign is one or more rectangular cabinets stacked on a single pole,
//! starting at a clearance height above grade. [`Geometry`] can only be
//! created through [`Geometry::new`], which validates the cabinets and
//! derives the quantities the load solver needs.

use serde::{Deserialize, Serialize};

use crate::errors::{ensure_finite, ensure_positive, CalcError, CalcResult};

/// One rectangular sign cabinet.
///
/// ## JSON Example
///
/// ```json
/// { "width_ft": 8.0, "height_ft": 4.0, "weight_psf": 10.0 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cabinet {
    /// Face width (ft)
    pub width_ft: f64,
    /// Face height (ft)
    pub height_ft: f64,
    /// Dead weight per face area (psf)
    #[serde(default)]
    pub weight_psf: f64,
}

impl Cabinet {
    pub fn area_ft2(&self) -> f64 {
        self.width_ft * self.height_ft
    }

    pub fn weight_lb(&self) -> f64 {
        self.area_ft2() * self.weight_psf
    }
}

/// Validated sign geometry with derived properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Grade to bottom of the lowest cabinet (ft)
    pub clearance_ft: f64,
    /// Cabinets from bottom to top
    pub cabinets: Vec<Cabinet>,
    /// Grade to top of the highest cabinet (ft)
    pub overall_height_ft: f64,
    /// Total projected face area (ft²)
    pub area_ft2: f64,
    /// Height of the area centroid above grade (ft)
    pub centroid_ft: f64,
    /// Height of the weight center of gravity above grade (ft)
    pub center_of_gravity_ft: f64,
    /// Total cabinet weight (lb)
    pub weight_lb: f64,
}

impl Geometry {
    /// Validate cabinets and derive the geometry.
    pub fn new(clearance_ft: f64, cabinets: Vec<Cabinet>) -> CalcResult<Self> {
        ensure_finite("clearance_ft", clearance_ft)?;
        if clearance_ft < 0.0 {
            return Err(CalcError::invalid_input(
                "clearance_ft",
                clearance_ft.to_string(),
                "Clearance cannot be negative",
            ));
        }
        if cabinets.is_empty() {
            return Err(CalcError::missing_field("cabinets"));
        }

        let mut bottom = clearance_ft;
        let mut area = 0.0;
        let mut area_moment = 0.0;
        let mut weight = 0.0;
        let mut weight_moment = 0.0;

        for (i, cabinet) in cabinets.iter().enumerate() {
            ensure_positive(&format!("cabinets[{}].width_ft", i), cabinet.width_ft)?;
            ensure_positive(&format!("cabinets[{}].height_ft", i), cabinet.height_ft)?;
            ensure_finite(&format!("cabinets[{}].weight_psf", i), cabinet.weight_psf)?;
            if cabinet.weight_psf < 0.0 {
                return Err(CalcError::invalid_input(
                    format!("cabinets[{}].weight_psf", i),
                    cabinet.weight_psf.to_string(),
                    "Weight cannot be negative",
                ));
            }

            let mid = bottom + cabinet.height_ft / 2.0;
            let a = cabinet.area_ft2();
            let w = cabinet.weight_lb();
            area += a;
            area_moment += a * mid;
            weight += w;
            weight_moment += w * mid;
            bottom += cabinet.height_ft;
        }

        let overall_height_ft = bottom;
        let centroid_ft = area_moment / area;
        // Weightless cabinets put the CG at the area centroid
        let center_of_gravity_ft = if weight > 0.0 {
            weight_moment / weight
        } else {
            centroid_ft
        };

        if !(clearance_ft..=overall_height_ft).contains(&center_of_gravity_ft) {
            return Err(CalcError::invalid_input(
                "center_of_gravity_ft",
                center_of_gravity_ft.to_string(),
                "Center of gravity falls outside the cabinet envelope",
            ));
        }

        Ok(Geometry {
            clearance_ft,
            cabinets,
            overall_height_ft,
            area_ft2: area,
            centroid_ft,
            center_of_gravity_ft,
            weight_lb: weight,
        })
    }

    /// Single-cabinet sign whose top sits at `overall_height_ft`.
    pub fn single(overall_height_ft: f64, width_ft: f64, height_ft: f64, weight_psf: f64) -> CalcResult<Self> {
        Self::new(
            overall_height_ft - height_ft,
            vec![Cabinet {
                width_ft,
                height_ft,
                weight_psf,
            }],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cab(w: f64, h: f64, psf: f64) -> Cabinet {
        Cabinet {
            width_ft: w,
            height_ft: h,
            weight_psf: psf,
        }
    }

    #[test]
    fn test_single_cabinet() {
        let g = Geometry::new(12.0, vec![cab(10.0, 8.0, 10.0)]).unwrap();
        assert_eq!(g.overall_height_ft, 20.0);
        assert_eq!(g.area_ft2, 80.0);
        assert_eq!(g.centroid_ft, 16.0);
        assert_eq!(g.center_of_gravity_ft, 16.0);
        assert_eq!(g.weight_lb, 800.0);
    }

    #[test]
    fn test_stacked_cabinets() {
        // 10x4 at 10..14, 6x2 at 14..16
        let g = Geometry::new(10.0, vec![cab(10.0, 4.0, 5.0), cab(6.0, 2.0, 20.0)]).unwrap();
        assert_eq!(g.overall_height_ft, 16.0);
        assert_eq!(g.area_ft2, 52.0);
        let expected_centroid = (40.0 * 12.0 + 12.0 * 15.0) / 52.0;
        assert!((g.centroid_ft - expected_centroid).abs() < 1e-12);
        let expected_cg = (200.0 * 12.0 + 240.0 * 15.0) / 440.0;
        assert!((g.center_of_gravity_ft - expected_cg).abs() < 1e-12);
        assert!(g.center_of_gravity_ft >= g.clearance_ft && g.center_of_gravity_ft <= g.overall_height_ft);
    }

    #[test]
    fn test_rejects_bad_cabinets() {
        assert!(Geometry::new(10.0, vec![]).is_err());
        assert!(Geometry::new(-1.0, vec![cab(1.0, 1.0, 0.0)]).is_err());
        assert!(Geometry::new(10.0, vec![cab(0.0, 1.0, 0.0)]).is_err());
        assert!(Geometry::new(10.0, vec![cab(1.0, 1.0, -3.0)]).is_err());
        assert!(Geometry::new(f64::NAN, vec![cab(1.0, 1.0, 0.0)]).is_err());
    }

    #[test]
    fn test_single_helper() {
        let g = Geometry::single(20.0, 10.0, 5.0, 0.0).unwrap();
        assert_eq!(g.clearance_ft, 15.0);
        assert_eq!(g.overall_height_ft, 20.0);
    }
}
