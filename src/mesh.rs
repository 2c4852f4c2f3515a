//! Reference-particle mesh data: nodes, element connectivity, nodal
//! volumes. Parsed from `.msh`/`.vtu` files by `mesh_io`; everything here
//! is geometry-and-connectivity only, independent of file format.

use vek::Vec3;

/// VTK element type codes the reader understands (spec §6: "line / triangle
/// / quad / tetra / hexahedron, identified by VTK type code").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Line,
    Triangle,
    Quad,
    Tetra,
    Hexahedron,
}

impl ElementType {
    pub fn from_vtk_code(code: u32) -> Option<Self> {
        match code {
            3 => Some(Self::Line),
            5 => Some(Self::Triangle),
            9 => Some(Self::Quad),
            10 => Some(Self::Tetra),
            12 => Some(Self::Hexahedron),
            _ => None,
        }
    }

    pub fn node_count(&self) -> usize {
        match self {
            ElementType::Line => 2,
            ElementType::Triangle => 3,
            ElementType::Quad => 4,
            ElementType::Tetra => 4,
            ElementType::Hexahedron => 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    pub kind: ElementType,
    pub nodes: Vec<usize>,
}

/// A reference mesh in its own local (undeformed) coordinate frame.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub nodes: Vec<Vec3<f64>>,
    pub elements: Vec<Element>,
    /// Per-node integration weight; read from the file if present, else
    /// computed from element volumes by `compute_nodal_volumes`.
    pub nodal_volumes: Vec<f64>,
}

impl Mesh {
    /// Lump each element's volume equally onto its nodes — the fallback
    /// used when the mesh file doesn't carry nodal volumes directly (spec
    /// §6: "computed from element shape functions when absent").
    pub fn compute_nodal_volumes(&mut self) {
        let mut volumes = vec![0.0f64; self.nodes.len()];

        for element in &self.elements {
            let vol = element_volume(element, &self.nodes);
            let share = vol / element.nodes.len() as f64;
            for &n in &element.nodes {
                volumes[n] += share;
            }
        }

        self.nodal_volumes = volumes;
    }

    /// Mesh size `h`: the average edge length over all elements, used when
    /// a contact radius or near-boundary tolerance is expressed relative to
    /// mesh size.
    pub fn characteristic_size(&self) -> f64 {
        let mut total = 0.0;
        let mut count = 0usize;

        for element in &self.elements {
            let n = element.nodes.len();
            for i in 0..n {
                let a = self.nodes[element.nodes[i]];
                let b = self.nodes[element.nodes[(i + 1) % n]];
                total += (a - b).magnitude();
                count += 1;
            }
        }

        if count == 0 {
            0.0
        } else {
            total / count as f64
        }
    }

    pub fn centroid(&self) -> Vec3<f64> {
        if self.nodes.is_empty() {
            return Vec3::zero();
        }
        let sum: Vec3<f64> = self.nodes.iter().copied().sum();
        sum / self.nodes.len() as f64
    }
}

fn element_volume(element: &Element, nodes: &[Vec3<f64>]) -> f64 {
    match element.kind {
        ElementType::Line => (nodes[element.nodes[0]] - nodes[element.nodes[1]]).magnitude(),
        ElementType::Triangle => {
            let a = nodes[element.nodes[0]];
            let b = nodes[element.nodes[1]];
            let c = nodes[element.nodes[2]];
            0.5 * (b - a).cross(c - a).magnitude()
        }
        ElementType::Quad => {
            // Split into two triangles sharing the diagonal 0-2.
            let a = nodes[element.nodes[0]];
            let b = nodes[element.nodes[1]];
            let c = nodes[element.nodes[2]];
            let d = nodes[element.nodes[3]];
            0.5 * (b - a).cross(c - a).magnitude() + 0.5 * (c - a).cross(d - a).magnitude()
        }
        ElementType::Tetra => {
            let a = nodes[element.nodes[0]];
            let b = nodes[element.nodes[1]];
            let c = nodes[element.nodes[2]];
            let d = nodes[element.nodes[3]];
            ((b - a).cross(c - a)).dot(d - a).abs() / 6.0
        }
        ElementType::Hexahedron => {
            // Approximate via the bounding box of the 8 corners — adequate
            // for nodal-volume lumping on the (near-)regular hexes the
            // particle generator emits.
            let mut min = nodes[element.nodes[0]];
            let mut max = min;
            for &n in &element.nodes[1..] {
                let p = nodes[n];
                min = Vec3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
                max = Vec3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
            }
            let d = max - min;
            d.x * d.y * d.z
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_volume_lumps_onto_three_nodes() {
        let mut mesh = Mesh {
            nodes: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            elements: vec![Element {
                kind: ElementType::Triangle,
                nodes: vec![0, 1, 2],
            }],
            nodal_volumes: Vec::new(),
        };

        mesh.compute_nodal_volumes();
        let total: f64 = mesh.nodal_volumes.iter().sum();
        assert!((total - 0.5).abs() < 1e-12);
        assert_eq!(mesh.nodal_volumes.len(), 3);
    }
}
