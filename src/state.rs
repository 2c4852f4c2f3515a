//! Flat, particle-agnostic struct-of-arrays over every node in the model.
//! Every downstream component indexes into this store via a global node id
//! (`particle slice start + local node id`); no component stores a pointer
//! back into it — each operation takes `&ModelState`/`&mut ModelState`
//! explicitly instead (spec §9's note on removing back-pointers).

use vek::Vec3;

/// Bit flags for `Node::fix`/`Node::force_fix`: bit d set means dof d is
/// clamped (velocity-clamped for `fix`, force-clamped for `force_fix`).
pub const DOF_X: u8 = 0b001;
pub const DOF_Y: u8 = 0b010;
pub const DOF_Z: u8 = 0b100;

/// The state store. Index-checked accessors panic in debug builds on an
/// out-of-range id (spec §4.1); release builds trust the caller, since
/// every id here is generated internally by the particle registry, never
/// taken from user input.
#[derive(Debug, Clone, Default)]
pub struct ModelState {
    pub x_ref: Vec<Vec3<f64>>,
    pub x: Vec<Vec3<f64>>,
    pub u: Vec<Vec3<f64>>,
    pub v: Vec<Vec3<f64>>,
    pub f: Vec<Vec3<f64>>,
    pub vol: Vec<f64>,
    pub fix: Vec<u8>,
    pub force_fix: Vec<u8>,
    pub theta: Vec<f64>,
    pub m: Vec<f64>,
    pub owner_pid: Vec<u32>,
    /// Per-node damage fraction `Z`, recomputed after every bond pass for
    /// output (spec §4.3 "node-level damage output").
    pub damage: Vec<f64>,
}

impl ModelState {
    pub fn len(&self) -> usize {
        self.x_ref.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a new node, returning its global id.
    pub fn push_node(&mut self, x_ref: Vec3<f64>, vol: f64, owner_pid: u32) -> usize {
        let id = self.len();
        self.x_ref.push(x_ref);
        self.x.push(x_ref);
        self.u.push(Vec3::zero());
        self.v.push(Vec3::zero());
        self.f.push(Vec3::zero());
        self.vol.push(vol);
        self.fix.push(0);
        self.force_fix.push(0);
        self.theta.push(0.0);
        self.m.push(0.0);
        self.owner_pid.push(owner_pid);
        self.damage.push(0.0);
        id
    }

    /// Zero every node's force; run once at the start of every step before
    /// the bond pass (spec §5 "the force array ... is cleared at the start
    /// of each step").
    pub fn clear_forces(&mut self) {
        for f in &mut self.f {
            *f = Vec3::zero();
        }
    }

    /// Assert `x == x_ref + u` for every node (spec §8 invariant). Intended
    /// for tests and debug assertions, not the hot path.
    pub fn check_position_invariant(&self, tol: f64) -> bool {
        (0..self.len()).all(|i| (self.x[i] - (self.x_ref[i] + self.u[i])).magnitude() <= tol)
    }

    /// Assert that every fixed dof has zero velocity (spec §8 invariant).
    pub fn check_fixity_invariant(&self) -> bool {
        (0..self.len()).all(|i| {
            let fix = self.fix[i];
            (fix & DOF_X == 0 || self.v[i].x == 0.0)
                && (fix & DOF_Y == 0 || self.v[i].y == 0.0)
                && (fix & DOF_Z == 0 || self.v[i].z == 0.0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_node_initializes_position_invariant() {
        let mut state = ModelState::default();
        state.push_node(Vec3::new(1.0, 2.0, 3.0), 1e-9, 0);
        assert!(state.check_position_invariant(1e-12));
    }

    #[test]
    fn clear_forces_zeroes_every_entry() {
        let mut state = ModelState::default();
        state.push_node(Vec3::zero(), 1.0, 0);
        state.f[0] = Vec3::new(1.0, 1.0, 1.0);
        state.clear_forces();
        assert_eq!(state.f[0], Vec3::zero());
    }
}
