//! Axis-aligned query bounds

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::{DVec2, DVec3, Result};

/// Axis-aligned region used to scope a fetch query.
///
/// Greyhound accepts either a rectangle (`[xmin,ymin,xmax,ymax]`) or a box
/// (`[xmin,ymin,zmin,xmax,ymax,zmax]`). Values are normalized on
/// construction so that `min <= max` on every axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub enum Bounds {
    Planar { min: DVec2, max: DVec2 },
    Volume { min: DVec3, max: DVec3 },
}

fn check_finite(values: &[f64]) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(Error::InvalidBounds(format!("non-finite coordinate in {:?}", values)))
    }
}

impl Bounds {
    /// Create a rectangle, swapping inverted axes.
    pub fn new_2d(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<Self> {
        check_finite(&[xmin, ymin, xmax, ymax])?;
        let a = DVec2::new(xmin, ymin);
        let b = DVec2::new(xmax, ymax);
        Ok(Bounds::Planar { min: a.min(b), max: a.max(b) })
    }

    /// Create a box, swapping inverted axes.
    pub fn new_3d(min: DVec3, max: DVec3) -> Result<Self> {
        check_finite(&min.to_array())?;
        check_finite(&max.to_array())?;
        Ok(Bounds::Volume { min: min.min(max), max: min.max(max) })
    }

    /// Build from the Greyhound array layout (4 or 6 values).
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        match *values {
            [xmin, ymin, xmax, ymax] => Self::new_2d(xmin, ymin, xmax, ymax),
            [xmin, ymin, zmin, xmax, ymax, zmax] => Self::new_3d(
                DVec3::new(xmin, ymin, zmin),
                DVec3::new(xmax, ymax, zmax),
            ),
            _ => Err(Error::InvalidBounds(format!(
                "expected 4 or 6 values, got {}",
                values.len()
            ))),
        }
    }

    /// Drop the Z range.
    pub fn to_planar(&self) -> Bounds {
        match *self {
            Bounds::Planar { .. } => *self,
            Bounds::Volume { min, max } => Bounds::Planar { min: min.truncate(), max: max.truncate() },
        }
    }

    pub fn is_planar(&self) -> bool {
        matches!(self, Bounds::Planar { .. })
    }

    /// Minimum corner. Planar bounds report `-inf` for Z.
    pub fn min(&self) -> DVec3 {
        match *self {
            Bounds::Planar { min, .. } => min.extend(f64::NEG_INFINITY),
            Bounds::Volume { min, .. } => min,
        }
    }

    /// Maximum corner. Planar bounds report `+inf` for Z.
    pub fn max(&self) -> DVec3 {
        match *self {
            Bounds::Planar { max, .. } => max.extend(f64::INFINITY),
            Bounds::Volume { max, .. } => max,
        }
    }

    /// Get center point (planar bounds center at Z = 0)
    pub fn center(&self) -> DVec3 {
        match *self {
            Bounds::Planar { min, max } => ((min + max) * 0.5).extend(0.0),
            Bounds::Volume { min, max } => (min + max) * 0.5,
        }
    }

    /// Check if a point lies inside, edges included
    pub fn contains_point(&self, p: DVec3) -> bool {
        let (min, max) = (self.min(), self.max());
        p.x >= min.x && p.x <= max.x &&
        p.y >= min.y && p.y <= max.y &&
        p.z >= min.z && p.z <= max.z
    }

    /// Child quadrant for quadtree subdivision.
    /// index: 0-3 (bit 0 = upper x half, bit 1 = upper y half).
    /// The Z range of a box is kept whole.
    pub fn child_quadrant(&self, index: u8) -> Bounds {
        let (min, max) = match *self {
            Bounds::Planar { min, max } => (min.extend(0.0), max.extend(0.0)),
            Bounds::Volume { min, max } => (min, max),
        };
        let mid = (min + max) * 0.5;
        let (lo_x, hi_x) = if index & 1 != 0 { (mid.x, max.x) } else { (min.x, mid.x) };
        let (lo_y, hi_y) = if index & 2 != 0 { (mid.y, max.y) } else { (min.y, mid.y) };

        match self {
            Bounds::Planar { .. } => Bounds::Planar {
                min: DVec2::new(lo_x, lo_y),
                max: DVec2::new(hi_x, hi_y),
            },
            Bounds::Volume { .. } => Bounds::Volume {
                min: DVec3::new(lo_x, lo_y, min.z),
                max: DVec3::new(hi_x, hi_y, max.z),
            },
        }
    }

    /// Child octant for octree subdivision.
    /// index: 0-7 representing xyz octant (bit 0=x, bit 1=y, bit 2=z)
    pub fn child_octant(&self, index: u8) -> Result<Bounds> {
        let Bounds::Volume { min, max } = *self else {
            return Err(Error::InvalidBounds(
                "octree subdivision needs a 3D box".to_string(),
            ));
        };
        let mid = (min + max) * 0.5;
        let pick = |bit: u8, lo: f64, m: f64, hi: f64| {
            if index & bit != 0 { (m, hi) } else { (lo, m) }
        };
        let (x0, x1) = pick(1, min.x, mid.x, max.x);
        let (y0, y1) = pick(2, min.y, mid.y, max.y);
        let (z0, z1) = pick(4, min.z, mid.z, max.z);
        Ok(Bounds::Volume {
            min: DVec3::new(x0, y0, z0),
            max: DVec3::new(x1, y1, z1),
        })
    }

    /// Split into the four quadrants, in child index order.
    pub fn split_quad(&self) -> [Bounds; 4] {
        [0, 1, 2, 3].map(|i| self.child_quadrant(i))
    }

    /// Split into the eight octants, in child index order.
    pub fn split_oct(&self) -> Result<[Bounds; 8]> {
        let mut children = [*self; 8];
        for (i, child) in children.iter_mut().enumerate() {
            *child = self.child_octant(i as u8)?;
        }
        Ok(children)
    }

    /// Greyhound array layout.
    pub fn to_vec(&self) -> Vec<f64> {
        match *self {
            Bounds::Planar { min, max } => vec![min.x, min.y, max.x, max.y],
            Bounds::Volume { min, max } => vec![min.x, min.y, min.z, max.x, max.y, max.z],
        }
    }

    /// Serialized form used in query strings, e.g. `[0,0,10,10]`.
    pub fn to_query(&self) -> String {
        let parts: Vec<String> = self.to_vec().iter().map(|v| v.to_string()).collect();
        format!("[{}]", parts.join(","))
    }
}

impl TryFrom<Vec<f64>> for Bounds {
    type Error = Error;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Bounds::from_slice(&values)
    }
}

impl From<Bounds> for Vec<f64> {
    fn from(bounds: Bounds) -> Self {
        bounds.to_vec()
    }
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_query())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_inverted_axes() {
        let b = Bounds::new_2d(10.0, 5.0, 0.0, 20.0).unwrap();
        assert_eq!(b, Bounds::Planar { min: DVec2::new(0.0, 5.0), max: DVec2::new(10.0, 20.0) });
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(matches!(
            Bounds::new_2d(f64::NAN, 0.0, 1.0, 1.0),
            Err(Error::InvalidBounds(_))
        ));
        assert!(Bounds::from_slice(&[0.0, 1.0, 2.0]).is_err());
    }

    #[test]
    fn test_split_quad_covers_parent() {
        let parent = Bounds::new_2d(0.0, 0.0, 4.0, 2.0).unwrap();
        let children = parent.split_quad();
        assert_eq!(children[0], Bounds::new_2d(0.0, 0.0, 2.0, 1.0).unwrap());
        assert_eq!(children[1], Bounds::new_2d(2.0, 0.0, 4.0, 1.0).unwrap());
        assert_eq!(children[2], Bounds::new_2d(0.0, 1.0, 2.0, 2.0).unwrap());
        assert_eq!(children[3], Bounds::new_2d(2.0, 1.0, 4.0, 2.0).unwrap());
    }

    #[test]
    fn test_split_quad_keeps_z_range() {
        let parent = Bounds::new_3d(DVec3::ZERO, DVec3::new(2.0, 2.0, 8.0)).unwrap();
        for child in parent.split_quad() {
            assert_eq!(child.min().z, 0.0);
            assert_eq!(child.max().z, 8.0);
        }
    }

    #[test]
    fn test_split_oct() {
        let parent = Bounds::new_3d(DVec3::ZERO, DVec3::splat(2.0)).unwrap();
        let children = parent.split_oct().unwrap();
        assert_eq!(children[0].min(), DVec3::ZERO);
        assert_eq!(children[0].max(), DVec3::ONE);
        assert_eq!(children[7].min(), DVec3::ONE);
        assert_eq!(children[7].max(), DVec3::splat(2.0));
        assert_eq!(children[5].min(), DVec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn test_split_oct_rejects_planar() {
        let planar = Bounds::new_2d(0.0, 0.0, 1.0, 1.0).unwrap();
        assert!(matches!(planar.split_oct(), Err(Error::InvalidBounds(_))));
    }

    #[test]
    fn test_query_and_serde() {
        let b = Bounds::new_2d(0.0, 0.0, 10.5, 10.0).unwrap();
        assert_eq!(b.to_query(), "[0,0,10.5,10]");

        let json = serde_json::to_string(&b).unwrap();
        let back: Bounds = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
        assert!(serde_json::from_str::<Bounds>("[1,2,3]").is_err());
    }

    #[test]
    fn test_contains_point() {
        let b = Bounds::new_2d(0.0, 0.0, 1.0, 1.0).unwrap();
        assert!(b.contains_point(DVec3::new(0.5, 0.5, 1000.0)));
        assert!(!b.contains_point(DVec3::new(1.5, 0.5, 0.0)));
    }
}
