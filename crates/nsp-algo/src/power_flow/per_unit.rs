//! Per-unit bases.
//!
//! One apparent-power base for the whole network and one voltage base per bus:
//!
//! ```text
//! I_base[i] = S_base / (V_base[i] · √3)        kVA / kV  →  A
//! Z_base[i] = V_base[i] · 1000 / I_base[i]     V / A     →  Ω
//! ```
//!
//! Physical units are restored only when results are assembled.

use nsp_core::{Amperes, KilovoltAmperes, Kilovolts, Kilowatts, Network, Ohms, PerUnit};

#[derive(Debug, Clone, PartialEq)]
pub struct PerUnitBase {
    s_base: KilovoltAmperes,
    v_base: Vec<Kilovolts>,
    i_base: Vec<Amperes>,
    z_base: Vec<Ohms>,
}

impl PerUnitBase {
    pub fn new(network: &Network, s_base: KilovoltAmperes) -> Self {
        let v_base: Vec<Kilovolts> = network.buses().map(|bus| bus.base_kv).collect();
        let i_base: Vec<Amperes> = v_base
            .iter()
            .map(|v| Amperes(s_base.value() / (v.value() * 3f64.sqrt())))
            .collect();
        let z_base = v_base
            .iter()
            .zip(&i_base)
            .map(|(v, i)| Ohms(v.value() * 1000.0 / i.value()))
            .collect();

        Self {
            s_base,
            v_base,
            i_base,
            z_base,
        }
    }

    pub fn s_base(&self) -> KilovoltAmperes {
        self.s_base
    }

    pub fn v_base(&self, bus: usize) -> Kilovolts {
        self.v_base[bus]
    }

    pub fn i_base(&self, bus: usize) -> Amperes {
        self.i_base[bus]
    }

    pub fn z_base(&self, bus: usize) -> Ohms {
        self.z_base[bus]
    }

    pub fn power_to_pu(&self, power: Kilowatts) -> PerUnit {
        power.to_per_unit(self.s_base)
    }

    pub fn voltage_to_kv(&self, bus: usize, v: PerUnit) -> Kilovolts {
        v.to_kilovolts(self.v_base[bus])
    }

    pub fn current_to_amperes(&self, bus: usize, i: PerUnit) -> Amperes {
        i.to_amperes(self.i_base[bus])
    }
}
