//! Replicated stack state store.
//!
//! The store is the single authority for admission configuration. Writes are
//! validated before they are accepted, and every accepted write reports how
//! much derived port state it invalidates so the caller can re-apply
//! admission decisions on exactly the affected scope.

use super::types::{GlobalConfig, PortConfig, ReapplyScope, UnitConfig};
use crate::error::NasError;
use nas_types::{PortKey, UnitId};
use tracing::info;

/// Fixed number of ports modelled per stack unit.
pub const PORTS_PER_UNIT: usize = 64;

const REAUTH_PERIOD_RANGE: std::ops::RangeInclusive<u16> = 1..=3600;
const EAPOL_TIMEOUT_RANGE: std::ops::RangeInclusive<u16> = 1..=255;
const MAX_ROUNDS_RANGE: std::ops::RangeInclusive<u8> = 1..=255;
const AGING_PERIOD_RANGE: std::ops::RangeInclusive<u32> = 10..=1_000_000;
const HOLD_TIME_RANGE: std::ops::RangeInclusive<u32> = 10..=1_000_000;

/// Configuration state for the whole stack.
#[derive(Debug, Clone)]
pub struct StackStateStore {
    global: GlobalConfig,
    units: Vec<UnitConfig>,
    present: Vec<bool>,
}

impl Default for StackStateStore {
    fn default() -> Self {
        StackStateStore {
            global: GlobalConfig::default(),
            units: vec![UnitConfig::default(); UnitId::MAX as usize],
            present: vec![false; UnitId::MAX as usize],
        }
    }
}

impl StackStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    pub fn unit(&self, unit: UnitId) -> &UnitConfig {
        &self.units[unit.index()]
    }

    pub fn port(&self, key: PortKey) -> Result<&PortConfig, NasError> {
        self.units[key.unit.index()]
            .ports
            .get(key.port.index())
            .ok_or(NasError::UnknownPort(key))
    }

    /// Marks a unit as having joined or left the stack.
    pub fn set_present(&mut self, unit: UnitId, present: bool) {
        self.present[unit.index()] = present;
    }

    pub fn is_present(&self, unit: UnitId) -> bool {
        self.present[unit.index()]
    }

    /// Units currently part of the stack.
    pub fn present_units(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.present.iter().enumerate().filter_map(|(i, p)| {
            if *p {
                Some(UnitId::new(i as u8 + 1).expect("index within stack bounds"))
            } else {
                None
            }
        })
    }

    /// Validates and installs a new global configuration.
    ///
    /// Returns the scope of derived state the change invalidates.
    pub fn set_global(&mut self, cfg: GlobalConfig) -> Result<ReapplyScope, NasError> {
        validate_global(&cfg)?;
        if cfg == self.global {
            return Ok(ReapplyScope::None);
        }
        info!(enabled = cfg.enabled, "global admission configuration changed");
        self.global = cfg;
        Ok(ReapplyScope::Global)
    }

    /// Validates and installs a new per-unit port configuration.
    pub fn set_unit(&mut self, unit: UnitId, cfg: UnitConfig) -> Result<ReapplyScope, NasError> {
        if cfg.ports.len() != PORTS_PER_UNIT {
            return Err(NasError::InvalidParameter(format!(
                "unit {unit} config must cover {PORTS_PER_UNIT} ports"
            )));
        }
        if cfg == self.units[unit.index()] {
            return Ok(ReapplyScope::None);
        }
        info!(%unit, "port admission configuration changed");
        self.units[unit.index()] = cfg;
        Ok(ReapplyScope::Unit)
    }

    /// Resets one unit's port configuration to defaults.
    pub fn default_unit(&mut self, unit: UnitId) -> ReapplyScope {
        if self.units[unit.index()] == UnitConfig::default() {
            return ReapplyScope::None;
        }
        self.units[unit.index()] = UnitConfig::default();
        ReapplyScope::Unit
    }

    /// Resets the whole store to defaults. Unit presence is kept.
    pub fn default_all(&mut self) -> ReapplyScope {
        self.global = GlobalConfig::default();
        for unit in self.units.iter_mut() {
            *unit = UnitConfig::default();
        }
        ReapplyScope::Global
    }
}

fn validate_global(cfg: &GlobalConfig) -> Result<(), NasError> {
    if !REAUTH_PERIOD_RANGE.contains(&cfg.reauth_period_secs) {
        return Err(NasError::InvalidParameter(format!(
            "reauth period {} outside {:?}",
            cfg.reauth_period_secs, REAUTH_PERIOD_RANGE
        )));
    }
    if !EAPOL_TIMEOUT_RANGE.contains(&cfg.eapol_timeout_secs) {
        return Err(NasError::InvalidParameter(format!(
            "supplicant timeout {} outside {:?}",
            cfg.eapol_timeout_secs, EAPOL_TIMEOUT_RANGE
        )));
    }
    if !MAX_ROUNDS_RANGE.contains(&cfg.max_reauth_rounds) {
        return Err(NasError::InvalidParameter(format!(
            "max rounds {} outside {:?}",
            cfg.max_reauth_rounds, MAX_ROUNDS_RANGE
        )));
    }
    if !AGING_PERIOD_RANGE.contains(&cfg.aging_period_secs) {
        return Err(NasError::InvalidParameter(format!(
            "aging period {} outside {:?}",
            cfg.aging_period_secs, AGING_PERIOD_RANGE
        )));
    }
    if !HOLD_TIME_RANGE.contains(&cfg.hold_time_secs) {
        return Err(NasError::InvalidParameter(format!(
            "hold time {} outside {:?}",
            cfg.hold_time_secs, HOLD_TIME_RANGE
        )));
    }
    Ok(())
}
