//! Tagged-enum geometry, replacing the polymorphic `GeomObject` hierarchy
//! (circle / rectangle / drum / hexagon / … subclasses with a virtual
//! `isInside`/`isNear`/`boundingBox` interface) with one enum and a set of
//! pattern-matching queries. Composite geometry (`Annulus`, `Complex`)
//! recurses instead of delegating to virtual calls. See DESIGN.md.

use serde::{Deserialize, Serialize};
use vek::Vec3;

/// Inclusion/exclusion sign used by `Geometry::Complex` to union or
/// subtract constituent shapes (mirrors the upstream composite geometry's
/// plus/minus region semantics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sign {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Geometry {
    Circle { center: [f64; 3], radius: f64 },
    Sphere { center: [f64; 3], radius: f64 },
    Rectangle { center: [f64; 3], extents: [f64; 3] },
    Cuboid { center: [f64; 3], extents: [f64; 3] },
    Cube { center: [f64; 3], side: f64 },
    Cylinder { center: [f64; 3], radius: f64, height: f64 },
    Drum { center: [f64; 3], outer_radius: f64, inner_radius: f64, height: f64 },
    Hexagon { center: [f64; 3], radius: f64 },
    Triangle { vertices: [[f64; 3]; 3] },
    Annulus { inner: Box<Geometry>, outer: Box<Geometry> },
    Complex { parts: Vec<(Geometry, Sign)> },
}

impl Geometry {
    /// Geometric center, used as the reference-particle pivot `p0`.
    pub fn center(&self) -> Vec3<f64> {
        match self {
            Geometry::Circle { center, .. }
            | Geometry::Sphere { center, .. }
            | Geometry::Rectangle { center, .. }
            | Geometry::Cuboid { center, .. }
            | Geometry::Cube { center, .. }
            | Geometry::Cylinder { center, .. }
            | Geometry::Drum { center, .. } => Vec3::from(*center),
            Geometry::Hexagon { center, .. } => Vec3::from(*center),
            Geometry::Triangle { vertices } => {
                let sum: Vec3<f64> = vertices.iter().map(|v| Vec3::from(*v)).sum();
                sum / 3.0
            }
            Geometry::Annulus { outer, .. } => outer.center(),
            Geometry::Complex { parts } => {
                let sum: Vec3<f64> = parts.iter().map(|(g, _)| g.center()).sum();
                sum / parts.len().max(1) as f64
            }
        }
    }

    /// Radius of the smallest sphere centered on `center()` containing the
    /// whole geometry — the particle's bounding sphere (spec §3 invariant).
    pub fn bounding_radius(&self) -> f64 {
        match self {
            Geometry::Circle { radius, .. } | Geometry::Sphere { radius, .. } => *radius,
            Geometry::Rectangle { extents, .. } | Geometry::Cuboid { extents, .. } => {
                Vec3::from(*extents).magnitude() / 2.0
            }
            Geometry::Cube { side, .. } => (side * side * 3.0).sqrt() / 2.0,
            Geometry::Cylinder { radius, height, .. } | Geometry::Drum { outer_radius: radius, height, .. } => {
                ((radius * radius) + (height * height / 4.0)).sqrt()
            }
            Geometry::Hexagon { radius, .. } => *radius,
            Geometry::Triangle { vertices } => {
                let c = self.center();
                vertices
                    .iter()
                    .map(|v| (Vec3::from(*v) - c).magnitude())
                    .fold(0.0, f64::max)
            }
            Geometry::Annulus { outer, .. } => outer.bounding_radius(),
            Geometry::Complex { parts } => {
                let c = self.center();
                parts
                    .iter()
                    .map(|(g, _)| (g.center() - c).magnitude() + g.bounding_radius())
                    .fold(0.0, f64::max)
            }
        }
    }

    /// Whether point `p` (in the same reference frame as the geometry) lies
    /// inside the shape.
    pub fn is_inside(&self, p: Vec3<f64>) -> bool {
        match self {
            Geometry::Circle { center, radius } | Geometry::Sphere { center, radius } => {
                (p - Vec3::from(*center)).magnitude() <= *radius
            }
            Geometry::Rectangle { center, extents } | Geometry::Cuboid { center, extents } => {
                let d = p - Vec3::from(*center);
                let e = Vec3::from(*extents) / 2.0;
                d.x.abs() <= e.x && d.y.abs() <= e.y && d.z.abs() <= e.z
            }
            Geometry::Cube { center, side } => {
                let d = p - Vec3::from(*center);
                let h = side / 2.0;
                d.x.abs() <= h && d.y.abs() <= h && d.z.abs() <= h
            }
            Geometry::Cylinder { center, radius, height } => {
                let d = p - Vec3::from(*center);
                let r = (d.x * d.x + d.y * d.y).sqrt();
                r <= *radius && d.z.abs() <= height / 2.0
            }
            Geometry::Drum { center, outer_radius, inner_radius, height } => {
                let d = p - Vec3::from(*center);
                let r = (d.x * d.x + d.y * d.y).sqrt();
                r <= *outer_radius && r >= *inner_radius && d.z.abs() <= height / 2.0
            }
            Geometry::Hexagon { center, radius } => {
                // Regular hexagon in the xy-plane, flat-top.
                let d = p - Vec3::from(*center);
                let x = d.x.abs();
                let y = d.y.abs();
                let r = *radius;
                x <= r * 0.8660254037844387 && y <= r - x * 0.5773502691896258
            }
            Geometry::Triangle { vertices } => point_in_triangle(p, vertices),
            Geometry::Annulus { inner, outer } => outer.is_inside(p) && !inner.is_inside(p),
            Geometry::Complex { parts } => {
                let mut inside = false;
                for (g, sign) in parts {
                    match sign {
                        Sign::Plus => inside |= g.is_inside(p),
                        Sign::Minus => {
                            if g.is_inside(p) {
                                inside = false;
                            }
                        }
                    }
                }
                inside
            }
        }
    }

    /// Whether point `p` lies within `tol` of the geometric boundary —
    /// used once, at reference-particle construction, to precompute the
    /// near-boundary node set the contact engine's fine index queries
    /// (spec §4.4).
    pub fn is_near_boundary(&self, p: Vec3<f64>, tol: f64) -> bool {
        match self {
            Geometry::Circle { center, radius } | Geometry::Sphere { center, radius } => {
                ((p - Vec3::from(*center)).magnitude() - radius).abs() <= tol
            }
            Geometry::Rectangle { center, extents } | Geometry::Cuboid { center, extents } => {
                let d = p - Vec3::from(*center);
                let e = Vec3::from(*extents) / 2.0;
                (e.x - d.x.abs()).abs() <= tol
                    || (e.y - d.y.abs()).abs() <= tol
                    || (e.z - d.z.abs()).abs() <= tol
            }
            Geometry::Cube { center, side } => {
                let d = p - Vec3::from(*center);
                let h = side / 2.0;
                (h - d.x.abs()).abs() <= tol || (h - d.y.abs()).abs() <= tol || (h - d.z.abs()).abs() <= tol
            }
            Geometry::Cylinder { center, radius, height } => {
                let d = p - Vec3::from(*center);
                let r = (d.x * d.x + d.y * d.y).sqrt();
                (r - radius).abs() <= tol || (height / 2.0 - d.z.abs()).abs() <= tol
            }
            Geometry::Drum { center, outer_radius, inner_radius, height } => {
                let d = p - Vec3::from(*center);
                let r = (d.x * d.x + d.y * d.y).sqrt();
                (r - outer_radius).abs() <= tol
                    || (r - inner_radius).abs() <= tol
                    || (height / 2.0 - d.z.abs()).abs() <= tol
            }
            Geometry::Hexagon { .. } | Geometry::Triangle { .. } => {
                // Conservative fallback: treat points within `tol` of the
                // shape's edge by sampling inside/outside at p and a point
                // pushed outward are not both the same.
                self.is_inside(p) && !self.is_inside(p + Vec3::new(tol, tol, tol))
                    || !self.is_inside(p) && self.is_inside(p - Vec3::new(tol, tol, tol))
            }
            Geometry::Annulus { inner, outer } => {
                outer.is_near_boundary(p, tol) || inner.is_near_boundary(p, tol)
            }
            Geometry::Complex { parts } => parts.iter().any(|(g, _)| g.is_near_boundary(p, tol)),
        }
    }
}

fn point_in_triangle(p: Vec3<f64>, v: &[[f64; 3]; 3]) -> bool {
    let a = Vec3::from(v[0]);
    let b = Vec3::from(v[1]);
    let c = Vec3::from(v[2]);

    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;

    let dot00 = v0.dot(v0);
    let dot01 = v0.dot(v1);
    let dot02 = v0.dot(v2);
    let dot11 = v1.dot(v1);
    let dot12 = v1.dot(v2);

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() < 1e-15 {
        return false;
    }
    let inv = 1.0 / denom;
    let u = (dot11 * dot02 - dot01 * dot12) * inv;
    let v = (dot00 * dot12 - dot01 * dot02) * inv;

    u >= 0.0 && v >= 0.0 && u + v <= 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_bounding_radius_matches_radius() {
        let g = Geometry::Sphere {
            center: [0.0, 0.0, 0.0],
            radius: 2.5,
        };
        assert_eq!(g.bounding_radius(), 2.5);
    }

    #[test]
    fn annulus_excludes_inner_disk() {
        let g = Geometry::Annulus {
            outer: Box::new(Geometry::Circle { center: [0.0; 3], radius: 2.0 }),
            inner: Box::new(Geometry::Circle { center: [0.0; 3], radius: 1.0 }),
        };
        assert!(!g.is_inside(Vec3::new(0.5, 0.0, 0.0)));
        assert!(g.is_inside(Vec3::new(1.5, 0.0, 0.0)));
        assert!(!g.is_inside(Vec3::new(3.0, 0.0, 0.0)));
    }

    #[test]
    fn rectangle_near_boundary_detects_edge() {
        let g = Geometry::Rectangle {
            center: [0.0; 3],
            extents: [2.0, 2.0, 2.0],
        };
        assert!(g.is_near_boundary(Vec3::new(0.99, 0.0, 0.0), 0.05));
        assert!(!g.is_near_boundary(Vec3::new(0.0, 0.0, 0.0), 0.05));
    }
}
