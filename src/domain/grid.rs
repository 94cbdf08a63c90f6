//! Parameter grid enumeration and candidate spawning.

use super::error::GridtraderError;
use super::strategy::DcaConfig;
use crate::ports::config_port::ConfigPort;

/// Candidate values per DCA parameter. Iterating the grid yields the
/// Cartesian product as fully-resolved configurations.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGrid {
    pub take_profit_pct: Vec<f64>,
    pub base_order_size: Vec<f64>,
    pub safety_order_count: Vec<usize>,
    pub first_safety_order_size: Vec<f64>,
    pub safety_order_volume_scale: Vec<f64>,
    pub safety_order_step_pct: Vec<f64>,
    pub safety_order_step_scale: Vec<f64>,
    pub long: Vec<bool>,
    pub extra_cost_pct: Vec<f64>,
}

/// Config keys recognized in the `[grid]` section (lower-cased, the way the
/// INI parser normalizes them).
const GRID_KEYS: [&str; 9] = [
    "tp",
    "bo_size",
    "so_qty",
    "size_1st_so",
    "so_vol_scale",
    "so_step",
    "so_step_scale",
    "long",
    "ec",
];

impl ParameterGrid {
    /// Number of configurations the grid expands to.
    pub fn len(&self) -> usize {
        self.take_profit_pct.len()
            * self.base_order_size.len()
            * self.safety_order_count.len()
            * self.first_safety_order_size.len()
            * self.safety_order_volume_scale.len()
            * self.safety_order_step_pct.len()
            * self.safety_order_step_scale.len()
            * self.long.len()
            * self.extra_cost_pct.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand the Cartesian product in sorted parameter-name order
    /// (`EC, TP, bo_size, long, size_1st_so, so_qty, so_step, so_step_scale,
    /// so_vol_scale`), the last name varying fastest. Deterministic for a
    /// given grid.
    pub fn configs(&self) -> Vec<DcaConfig> {
        let mut out = Vec::with_capacity(self.len());
        for &ec in &self.extra_cost_pct {
            for &tp in &self.take_profit_pct {
                for &bo in &self.base_order_size {
                    for &long in &self.long {
                        for &first_so in &self.first_safety_order_size {
                            for &qty in &self.safety_order_count {
                                for &step in &self.safety_order_step_pct {
                                    for &step_scale in &self.safety_order_step_scale {
                                        for &vol_scale in &self.safety_order_volume_scale {
                                            out.push(DcaConfig {
                                                take_profit_pct: tp,
                                                base_order_size: bo,
                                                safety_order_count: qty,
                                                first_safety_order_size: first_so,
                                                safety_order_volume_scale: vol_scale,
                                                safety_order_step_pct: step,
                                                safety_order_step_scale: step_scale,
                                                long,
                                                extra_cost_pct: ec,
                                            });
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        out
    }

    /// Read the `[grid]` section of a configuration source.
    ///
    /// Every one of the nine keys is required, unknown keys are rejected, and
    /// any candidate that fails to parse aborts before a single backtest
    /// runs.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, GridtraderError> {
        for key in config.section_keys("grid") {
            if !GRID_KEYS.contains(&key.as_str()) {
                return Err(GridtraderError::ConfigInvalid {
                    section: "grid".into(),
                    key,
                    reason: "unknown parameter".into(),
                });
            }
        }
        Ok(ParameterGrid {
            take_profit_pct: parse_list(config, "tp", parse_f64)?,
            base_order_size: parse_list(config, "bo_size", parse_f64)?,
            safety_order_count: parse_list(config, "so_qty", parse_usize)?,
            first_safety_order_size: parse_list(config, "size_1st_so", parse_f64)?,
            safety_order_volume_scale: parse_list(config, "so_vol_scale", parse_f64)?,
            safety_order_step_pct: parse_list(config, "so_step", parse_f64)?,
            safety_order_step_scale: parse_list(config, "so_step_scale", parse_f64)?,
            long: parse_list(config, "long", parse_bool)?,
            extra_cost_pct: parse_list(config, "ec", parse_f64)?,
        })
    }
}

fn parse_list<T>(
    config: &dyn ConfigPort,
    key: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<Vec<T>, GridtraderError> {
    let items = config
        .get_list("grid", key)
        .ok_or_else(|| GridtraderError::ConfigMissing {
            section: "grid".into(),
            key: key.into(),
        })?;
    items
        .iter()
        .map(|item| {
            parse(item).ok_or_else(|| GridtraderError::ConfigInvalid {
                section: "grid".into(),
                key: key.into(),
                reason: format!("not a valid candidate value: {item}"),
            })
        })
        .collect()
}

fn parse_f64(s: &str) -> Option<f64> {
    s.parse().ok()
}

fn parse_usize(s: &str) -> Option<usize> {
    s.parse().ok()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// One grid combination with its synthetic evaluation id.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub config: DcaConfig,
}

/// Instantiate one candidate per grid combination, keyed `A0, A1, …` in
/// expansion order. Every configuration is validated before any run starts.
pub fn spawn_candidates(grid: &ParameterGrid) -> Result<Vec<Candidate>, GridtraderError> {
    grid.configs()
        .into_iter()
        .enumerate()
        .map(|(i, config)| {
            config.validate()?;
            Ok(Candidate {
                id: format!("A{i}"),
                config,
            })
        })
        .collect()
}
