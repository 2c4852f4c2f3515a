use serde::{Deserialize, Serialize};

/// `Contact` deck entry for one ordered zone pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContactPairDeck {
    pub zone_a: u32,
    pub zone_b: u32,

    /// Normal stiffness, supplied directly.
    #[serde(default)]
    pub kn: Option<f64>,
    /// Alternative to `kn`: `Kn = V_max^2` (DESIGN.md Open Question 2).
    #[serde(default)]
    pub v_max: Option<f64>,
    /// Stored for config round-tripping; not consumed by the force law —
    /// see DESIGN.md.
    #[serde(default)]
    pub delta_max: Option<f64>,

    #[serde(default = "default_true")]
    pub damping_on: bool,
    #[serde(default = "default_eps")]
    pub eps: f64,
    #[serde(default = "default_one")]
    pub beta_n_factor: f64,

    #[serde(default = "default_true")]
    pub friction_on: bool,
    #[serde(default)]
    pub mu: f64,
    /// Tangential (Coulomb cap) stiffness `K` used in
    /// `F_f = -min(mu*|F_n|, K*|v_t|) * t_hat` (spec §4.4). The upstream
    /// deck calls this field `K` and requires it nonzero whenever friction
    /// is enabled, same as `mu` (`contactPairDeck.h::readFromJson`).
    #[serde(default)]
    pub k: f64,

    #[serde(default)]
    pub contact_radius: Option<f64>,
    #[serde(default)]
    pub contact_radius_factor: Option<f64>,
}

fn default_true() -> bool {
    true
}

fn default_eps() -> f64 {
    1.0
}

fn default_one() -> f64 {
    1.0
}

impl ContactPairDeck {
    /// Resolve the configured normal stiffness to a concrete `Kn`, per
    /// `Kn = V_max^2` when `Kn` isn't given directly (DESIGN.md Open
    /// Question 2).
    pub fn resolve_kn(&self) -> Option<f64> {
        self.kn.or_else(|| self.v_max.map(|v| v * v))
    }

    /// Resolve the contact radius given the owning zones' mesh size `h`
    /// (the larger of the two, matching "relative to mesh size").
    pub fn resolve_contact_radius(&self, mesh_size_a: f64, mesh_size_b: f64) -> f64 {
        if let Some(rc) = self.contact_radius {
            return rc;
        }
        let factor = self.contact_radius_factor.unwrap_or(0.9);
        factor * mesh_size_a.max(mesh_size_b)
    }

    /// Normal damping coefficient `beta_n`, derived from `eps` and the
    /// factor the deck supplies, matching the contact-pair deck's
    /// `betanFactor`-scaled damping convention.
    pub fn beta_n(&self, kn: f64, reduced_density: f64) -> f64 {
        if !self.damping_on {
            return 0.0;
        }
        self.beta_n_factor * self.eps * (kn * reduced_density).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(kn: Option<f64>, v_max: Option<f64>) -> ContactPairDeck {
        ContactPairDeck {
            zone_a: 0,
            zone_b: 1,
            kn,
            v_max,
            delta_max: None,
            damping_on: true,
            eps: 1.0,
            beta_n_factor: 1.0,
            friction_on: false,
            mu: 0.0,
            k: 0.0,
            contact_radius: None,
            contact_radius_factor: None,
        }
    }

    #[test]
    fn explicit_kn_is_used_directly() {
        let deck = pair(Some(42.0), None);
        assert_eq!(deck.resolve_kn(), Some(42.0));
    }

    #[test]
    fn kn_is_derived_from_v_max_as_its_square() {
        // DESIGN.md Open Question 2: the upstream deck stores
        // `d_vMax = sqrt(d_Kn)`, so reading it the other way gives
        // `Kn = V_max^2`.
        let deck = pair(None, Some(3.0));
        assert_eq!(deck.resolve_kn(), Some(9.0));
    }

    #[test]
    fn explicit_kn_takes_precedence_over_v_max() {
        let deck = pair(Some(5.0), Some(100.0));
        assert_eq!(deck.resolve_kn(), Some(5.0));
    }

    #[test]
    fn missing_both_kn_and_v_max_resolves_to_none() {
        let deck = pair(None, None);
        assert_eq!(deck.resolve_kn(), None);
    }
}
