//! Per-step VTU output and restart blob read/write (spec §6).
//!
//! Grounded on the teacher's plain-text asset pattern (no existing crate in
//! the kept dependency stack speaks VTK/XML, so this is written the way
//! `mesh_io` hand-rolls `.msh`/`.vtu` parsing: direct string/byte
//! construction, no XML or binary-serialization crate introduced).

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vek::Vec3;

use crate::error::ResourceError;
use crate::state::ModelState;

/// Output-file path for step `step` under `Output.Path`, named
/// `{tag}_{step}.vtu` (`Output.Tag`).
pub fn vtu_path(dir: &Path, tag: &str, step: u64) -> PathBuf {
    dir.join(format!("{tag}_{step}.vtu"))
}

/// Write one legacy-VTK-compatible `.vtu` snapshot: every node as its own
/// `VTK_VERTEX` cell, carrying position/displacement/velocity/force/
/// damage/dilatation/owner-particle-id point data (spec §6).
pub fn write_vtu(path: &Path, state: &ModelState) -> Result<(), ResourceError> {
    let file = File::create(path).map_err(|source| ResourceError::OutputIo {
        path: path.display().to_string(),
        source,
    })?;
    let mut w = BufWriter::new(file);

    let n = state.len();
    write_vtu_body(&mut w, state, n).map_err(|source| ResourceError::OutputIo {
        path: path.display().to_string(),
        source,
    })
}

fn write_vtu_body(w: &mut impl Write, state: &ModelState, n: usize) -> io::Result<()> {
    writeln!(w, "<?xml version=\"1.0\"?>")?;
    writeln!(w, "<VTKFile type=\"UnstructuredGrid\" version=\"0.1\" byte_order=\"LittleEndian\">")?;
    writeln!(w, "<UnstructuredGrid>")?;
    writeln!(w, "<Piece NumberOfPoints=\"{n}\" NumberOfCells=\"{n}\">")?;

    writeln!(w, "<Points>")?;
    writeln!(w, "<DataArray type=\"Float64\" NumberOfComponents=\"3\" format=\"ascii\">")?;
    write_vec3_array(w, &state.x)?;
    writeln!(w, "</DataArray>")?;
    writeln!(w, "</Points>")?;

    writeln!(w, "<PointData>")?;
    write_named_vec3(w, "displacement", &state.u)?;
    write_named_vec3(w, "velocity", &state.v)?;
    write_named_vec3(w, "force", &state.f)?;
    write_named_scalar(w, "damage", &state.damage)?;
    write_named_scalar(w, "dilatation", &state.theta)?;
    write_named_int(w, "owner_pid", &state.owner_pid)?;
    writeln!(w, "</PointData>")?;

    writeln!(w, "<Cells>")?;
    writeln!(w, "<DataArray type=\"Int64\" Name=\"connectivity\" format=\"ascii\">")?;
    for i in 0..n {
        write!(w, "{i} ")?;
    }
    writeln!(w, "\n</DataArray>")?;
    writeln!(w, "<DataArray type=\"Int64\" Name=\"offsets\" format=\"ascii\">")?;
    for i in 1..=n {
        write!(w, "{i} ")?;
    }
    writeln!(w, "\n</DataArray>")?;
    writeln!(w, "<DataArray type=\"UInt8\" Name=\"types\" format=\"ascii\">")?;
    for _ in 0..n {
        write!(w, "1 ")?; // VTK_VERTEX
    }
    writeln!(w, "\n</DataArray>")?;
    writeln!(w, "</Cells>")?;

    writeln!(w, "</Piece>")?;
    writeln!(w, "</UnstructuredGrid>")?;
    writeln!(w, "</VTKFile>")?;
    Ok(())
}

fn write_vec3_array(w: &mut impl Write, data: &[Vec3<f64>]) -> io::Result<()> {
    for p in data {
        writeln!(w, "{} {} {}", p.x, p.y, p.z)?;
    }
    Ok(())
}

fn write_named_vec3(w: &mut impl Write, name: &str, data: &[Vec3<f64>]) -> io::Result<()> {
    writeln!(w, "<DataArray type=\"Float64\" Name=\"{name}\" NumberOfComponents=\"3\" format=\"ascii\">")?;
    write_vec3_array(w, data)?;
    writeln!(w, "</DataArray>")
}

fn write_named_scalar(w: &mut impl Write, name: &str, data: &[f64]) -> io::Result<()> {
    writeln!(w, "<DataArray type=\"Float64\" Name=\"{name}\" format=\"ascii\">")?;
    for v in data {
        writeln!(w, "{v}")?;
    }
    writeln!(w, "</DataArray>")
}

fn write_named_int(w: &mut impl Write, name: &str, data: &[u32]) -> io::Result<()> {
    writeln!(w, "<DataArray type=\"UInt32\" Name=\"{name}\" format=\"ascii\">")?;
    for v in data {
        writeln!(w, "{v}")?;
    }
    writeln!(w, "</DataArray>")
}

/// Restart-blob header: just enough `serde_json` metadata to size and
/// validate the raw arrays that follow it, per spec §6's "self-describing
/// enough to round-trip bit-for-bit".
#[derive(Debug, Serialize, Deserialize)]
struct RestartHeader {
    n_nodes: usize,
    step: u64,
    time: f64,
}

/// Write a restart blob: an 8-byte little-endian header length, the JSON
/// header, then every state-store array as raw little-endian bytes in a
/// fixed order — no `bincode` dependency (spec §6).
pub fn write_restart(path: &Path, state: &ModelState, step: u64, time: f64) -> Result<(), ResourceError> {
    let file = File::create(path).map_err(|source| ResourceError::RestartIo {
        path: path.display().to_string(),
        source,
    })?;
    let mut w = BufWriter::new(file);

    let header = RestartHeader { n_nodes: state.len(), step, time };
    let header_json = serde_json::to_vec(&header).expect("restart header always serializes");

    write_restart_body(&mut w, state, &header_json).map_err(|source| ResourceError::RestartIo {
        path: path.display().to_string(),
        source,
    })
}

fn write_restart_body(w: &mut impl Write, state: &ModelState, header_json: &[u8]) -> io::Result<()> {
    w.write_all(&(header_json.len() as u64).to_le_bytes())?;
    w.write_all(header_json)?;

    write_vec3_raw(w, &state.x_ref)?;
    write_vec3_raw(w, &state.x)?;
    write_vec3_raw(w, &state.u)?;
    write_vec3_raw(w, &state.v)?;
    write_vec3_raw(w, &state.f)?;
    write_f64_raw(w, &state.vol)?;
    write_u8_raw(w, &state.fix)?;
    write_u8_raw(w, &state.force_fix)?;
    write_f64_raw(w, &state.theta)?;
    write_f64_raw(w, &state.m)?;
    write_u32_raw(w, &state.owner_pid)?;
    write_f64_raw(w, &state.damage)?;
    Ok(())
}

fn write_vec3_raw(w: &mut impl Write, data: &[Vec3<f64>]) -> io::Result<()> {
    for p in data {
        w.write_all(&p.x.to_le_bytes())?;
        w.write_all(&p.y.to_le_bytes())?;
        w.write_all(&p.z.to_le_bytes())?;
    }
    Ok(())
}

fn write_f64_raw(w: &mut impl Write, data: &[f64]) -> io::Result<()> {
    for v in data {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn write_u32_raw(w: &mut impl Write, data: &[u32]) -> io::Result<()> {
    for v in data {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn write_u8_raw(w: &mut impl Write, data: &[u8]) -> io::Result<()> {
    w.write_all(data)
}

/// Result of reading a restart blob: the full state store plus the step
/// and time it was written at, so the driver can resume the loop exactly.
pub struct RestartState {
    pub state: ModelState,
    pub step: u64,
    pub time: f64,
}

pub fn read_restart(path: &Path) -> Result<RestartState, ResourceError> {
    let mut file = File::open(path).map_err(|source| ResourceError::RestartParse {
        path: path.display().to_string(),
        reason: source.to_string(),
    })?;

    read_restart_body(&mut file).map_err(|source| ResourceError::RestartParse {
        path: path.display().to_string(),
        reason: source.to_string(),
    })
}

fn read_restart_body(r: &mut impl Read) -> io::Result<RestartState> {
    let mut len_bytes = [0u8; 8];
    r.read_exact(&mut len_bytes)?;
    let header_len = u64::from_le_bytes(len_bytes) as usize;

    let mut header_buf = vec![0u8; header_len];
    r.read_exact(&mut header_buf)?;
    let header: RestartHeader = serde_json::from_slice(&header_buf)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let n = header.n_nodes;
    let x_ref = read_vec3_raw(r, n)?;
    let x = read_vec3_raw(r, n)?;
    let u = read_vec3_raw(r, n)?;
    let v = read_vec3_raw(r, n)?;
    let f = read_vec3_raw(r, n)?;
    let vol = read_f64_raw(r, n)?;
    let fix = read_u8_raw(r, n)?;
    let force_fix = read_u8_raw(r, n)?;
    let theta = read_f64_raw(r, n)?;
    let m = read_f64_raw(r, n)?;
    let owner_pid = read_u32_raw(r, n)?;
    let damage = read_f64_raw(r, n)?;

    Ok(RestartState {
        state: ModelState { x_ref, x, u, v, f, vol, fix, force_fix, theta, m, owner_pid, damage },
        step: header.step,
        time: header.time,
    })
}

fn read_vec3_raw(r: &mut impl Read, n: usize) -> io::Result<Vec<Vec3<f64>>> {
    let mut out = Vec::with_capacity(n);
    let mut buf = [0u8; 8];
    for _ in 0..n {
        r.read_exact(&mut buf)?;
        let x = f64::from_le_bytes(buf);
        r.read_exact(&mut buf)?;
        let y = f64::from_le_bytes(buf);
        r.read_exact(&mut buf)?;
        let z = f64::from_le_bytes(buf);
        out.push(Vec3::new(x, y, z));
    }
    Ok(out)
}

fn read_f64_raw(r: &mut impl Read, n: usize) -> io::Result<Vec<f64>> {
    let mut out = Vec::with_capacity(n);
    let mut buf = [0u8; 8];
    for _ in 0..n {
        r.read_exact(&mut buf)?;
        out.push(f64::from_le_bytes(buf));
    }
    Ok(out)
}

fn read_u32_raw(r: &mut impl Read, n: usize) -> io::Result<Vec<u32>> {
    let mut out = Vec::with_capacity(n);
    let mut buf = [0u8; 4];
    for _ in 0..n {
        r.read_exact(&mut buf)?;
        out.push(u32::from_le_bytes(buf));
    }
    Ok(out)
}

fn read_u8_raw(r: &mut impl Read, n: usize) -> io::Result<Vec<u8>> {
    let mut out = vec![0u8; n];
    r.read_exact(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> ModelState {
        let mut state = ModelState::default();
        state.push_node(Vec3::new(1.0, 2.0, 3.0), 1e-9, 7);
        state.push_node(Vec3::new(-1.0, 0.5, 0.0), 2e-9, 8);
        state.v[0] = Vec3::new(0.1, 0.2, 0.3);
        state.fix[1] = 0b011;
        state.damage[0] = 0.5;
        state
    }

    #[test]
    fn vtu_body_contains_every_field_name() {
        let state = sample_state();
        let mut buf = Vec::new();
        write_vtu_body(&mut buf, &state, state.len()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        for name in ["displacement", "velocity", "force", "damage", "dilatation", "owner_pid"] {
            assert!(text.contains(name), "missing field {name}");
        }
        assert!(text.contains("NumberOfPoints=\"2\""));
    }

    #[test]
    fn restart_blob_round_trips_bit_for_bit() {
        let state = sample_state();
        let header_json = serde_json::to_vec(&RestartHeader { n_nodes: state.len(), step: 42, time: 1.5 }).unwrap();
        let mut buf = Vec::new();
        write_restart_body(&mut buf, &state, &header_json).unwrap();

        let mut cursor = io::Cursor::new(buf);
        let restored = read_restart_body(&mut cursor).unwrap();

        assert_eq!(restored.step, 42);
        assert_eq!(restored.time, 1.5);
        assert_eq!(restored.state.x_ref, state.x_ref);
        assert_eq!(restored.state.v, state.v);
        assert_eq!(restored.state.fix, state.fix);
        assert_eq!(restored.state.owner_pid, state.owner_pid);
        assert_eq!(restored.state.damage, state.damage);
    }
}
