//! From-scratch gmsh `.msh` (format 2.2 ASCII) and VTU (`UnstructuredGrid`,
//! ASCII `DataArray`s) readers. No existing crate in the dependency stack
//! does either, and pulling one in for a narrow subset of each format would
//! be a heavier dependency than the ~150 lines below.

use std::path::Path;

use vek::Vec3;

use crate::error::ModelError;
use crate::mesh::{Element, ElementType, Mesh};

pub fn load(path: &Path) -> Result<Mesh, ModelError> {
    let text = std::fs::read_to_string(path).map_err(|source| ModelError::MeshIo {
        path: path.display().to_string(),
        source,
    })?;

    let is_vtu = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("vtu"))
        .unwrap_or(false);

    let mut mesh = if is_vtu {
        parse_vtu(&text, path)?
    } else {
        parse_msh(&text, path)?
    };

    if mesh.nodal_volumes.len() != mesh.nodes.len() {
        mesh.compute_nodal_volumes();
    }

    Ok(mesh)
}

/// gmsh format 2.2 ASCII: `$Nodes` / `$EndNodes` and `$Elements` /
/// `$EndElements` blocks. Element type codes follow gmsh's own numbering
/// (distinct from VTK's), so they are mapped to `ElementType` explicitly.
fn parse_msh(text: &str, path: &Path) -> Result<Mesh, ModelError> {
    let parse_err = |reason: &str| ModelError::MeshParse {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };

    let mut lines = text.lines();
    let mut nodes = Vec::new();
    let mut elements = Vec::new();

    while let Some(line) = lines.next() {
        match line.trim() {
            "$Nodes" => {
                let count: usize = lines
                    .next()
                    .ok_or_else(|| parse_err("missing node count"))?
                    .trim()
                    .parse()
                    .map_err(|_| parse_err("invalid node count"))?;

                nodes.reserve(count);
                for _ in 0..count {
                    let line = lines.next().ok_or_else(|| parse_err("truncated $Nodes"))?;
                    let mut fields = line.split_whitespace();
                    fields.next(); // node id, 1-indexed — positional order is used instead.
                    let x: f64 = fields
                        .next()
                        .ok_or_else(|| parse_err("missing x coordinate"))?
                        .parse()
                        .map_err(|_| parse_err("invalid x coordinate"))?;
                    let y: f64 = fields
                        .next()
                        .ok_or_else(|| parse_err("missing y coordinate"))?
                        .parse()
                        .map_err(|_| parse_err("invalid y coordinate"))?;
                    let z: f64 = fields
                        .next()
                        .ok_or_else(|| parse_err("missing z coordinate"))?
                        .parse()
                        .map_err(|_| parse_err("invalid z coordinate"))?;
                    nodes.push(Vec3::new(x, y, z));
                }
            }
            "$Elements" => {
                let count: usize = lines
                    .next()
                    .ok_or_else(|| parse_err("missing element count"))?
                    .trim()
                    .parse()
                    .map_err(|_| parse_err("invalid element count"))?;

                for _ in 0..count {
                    let line = lines
                        .next()
                        .ok_or_else(|| parse_err("truncated $Elements"))?;
                    let fields: Vec<&str> = line.split_whitespace().collect();
                    if fields.len() < 4 {
                        return Err(parse_err("malformed element line"));
                    }
                    let gmsh_type: u32 = fields[1]
                        .parse()
                        .map_err(|_| parse_err("invalid element type"))?;
                    let kind = gmsh_element_type(gmsh_type);
                    let Some(kind) = kind else { continue };

                    let ntags: usize = fields[2]
                        .parse()
                        .map_err(|_| parse_err("invalid tag count"))?;
                    let node_start = 3 + ntags;
                    let node_ids: Result<Vec<usize>, _> = fields[node_start..]
                        .iter()
                        .map(|s| s.parse::<usize>().map(|i| i - 1))
                        .collect();
                    let node_ids = node_ids.map_err(|_| parse_err("invalid element node id"))?;

                    if node_ids.len() != kind.node_count() {
                        continue;
                    }
                    elements.push(Element {
                        kind,
                        nodes: node_ids,
                    });
                }
            }
            _ => {}
        }
    }

    if nodes.is_empty() {
        return Err(parse_err("no $Nodes block found"));
    }

    Ok(Mesh {
        nodes,
        elements,
        nodal_volumes: Vec::new(),
    })
}

fn gmsh_element_type(code: u32) -> Option<ElementType> {
    match code {
        1 => Some(ElementType::Line),
        2 => Some(ElementType::Triangle),
        3 => Some(ElementType::Quad),
        4 => Some(ElementType::Tetra),
        5 => Some(ElementType::Hexahedron),
        _ => None,
    }
}

/// Minimal VTU reader: extracts the `Points` and `Cells` `DataArray`s from
/// a legacy-compatible `UnstructuredGrid` piece. Assumes ASCII-encoded
/// arrays (the format the output writer in `output.rs` produces), not
/// binary/appended/compressed VTU.
fn parse_vtu(text: &str, path: &Path) -> Result<Mesh, ModelError> {
    let parse_err = |reason: &str| ModelError::MeshParse {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };

    let points_text =
        extract_data_array(text, "Points").ok_or_else(|| parse_err("missing Points DataArray"))?;
    let connectivity_text = extract_named_data_array(text, "connectivity")
        .ok_or_else(|| parse_err("missing connectivity DataArray"))?;
    let offsets_text = extract_named_data_array(text, "offsets")
        .ok_or_else(|| parse_err("missing offsets DataArray"))?;
    let types_text = extract_named_data_array(text, "types")
        .ok_or_else(|| parse_err("missing types DataArray"))?;

    let coords: Result<Vec<f64>, _> = points_text.split_whitespace().map(str::parse).collect();
    let coords = coords.map_err(|_| parse_err("invalid Points value"))?;
    if coords.len() % 3 != 0 {
        return Err(parse_err("Points array length not divisible by 3"));
    }
    let nodes: Vec<Vec3<f64>> = coords
        .chunks(3)
        .map(|c| Vec3::new(c[0], c[1], c[2]))
        .collect();

    let connectivity: Result<Vec<usize>, _> =
        connectivity_text.split_whitespace().map(str::parse).collect();
    let connectivity = connectivity.map_err(|_| parse_err("invalid connectivity value"))?;

    let offsets: Result<Vec<usize>, _> = offsets_text.split_whitespace().map(str::parse).collect();
    let offsets = offsets.map_err(|_| parse_err("invalid offsets value"))?;

    let types: Result<Vec<u32>, _> = types_text.split_whitespace().map(str::parse).collect();
    let types = types.map_err(|_| parse_err("invalid types value"))?;

    if offsets.len() != types.len() {
        return Err(parse_err("offsets/types length mismatch"));
    }

    let mut elements = Vec::with_capacity(types.len());
    let mut start = 0usize;
    for (i, &end) in offsets.iter().enumerate() {
        let cell_nodes = connectivity
            .get(start..end)
            .ok_or_else(|| parse_err("connectivity/offsets out of range"))?
            .to_vec();
        start = end;

        if let Some(kind) = ElementType::from_vtk_code(types[i]) {
            if cell_nodes.len() == kind.node_count() {
                elements.push(Element {
                    kind,
                    nodes: cell_nodes,
                });
            }
        }
    }

    Ok(Mesh {
        nodes,
        elements,
        nodal_volumes: Vec::new(),
    })
}

/// Extract the text content of the first `<DataArray Name="...">` tag whose
/// name (or, for `Points`, the enclosing `<Points>` element) matches.
fn extract_named_data_array(text: &str, name: &str) -> Option<String> {
    let needle = format!("Name=\"{name}\"");
    let tag_start = text.find(&needle)?;
    let open_end = text[tag_start..].find('>')? + tag_start + 1;
    let close = text[open_end..].find("</DataArray>")? + open_end;
    Some(text[open_end..close].trim().to_string())
}

fn extract_data_array(text: &str, section: &str) -> Option<String> {
    let open_tag = format!("<{section}");
    let section_start = text.find(&open_tag)?;
    let data_tag = text[section_start..].find("<DataArray")? + section_start;
    let open_end = text[data_tag..].find('>')? + data_tag + 1;
    let close = text[open_end..].find("</DataArray>")? + open_end;
    Some(text[open_end..close].trim().to_string())
}
