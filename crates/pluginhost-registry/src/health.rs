//! Health reporting: a read-only summary over the current registry records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pluginhost_core::config::RegistryConfig;

use crate::metadata::{PluginMetadata, ResourceUsage};
use crate::state::PluginState;

/// An errored plugin as listed in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErroredPlugin {
    /// Plugin name.
    pub name: String,
    /// Cumulative failed hook invocations.
    pub error_count: u64,
    /// Cumulative successful custom reloads.
    pub restart_count: u64,
    /// Most recent failure message.
    pub last_error: Option<String>,
}

/// A plugin whose last reported usage is over an advisory threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBreach {
    /// Plugin name.
    pub name: String,
    /// The reported usage.
    pub usage: ResourceUsage,
}

/// Point-in-time aggregate of plugin counts and error rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Registered plugins.
    pub total: usize,
    /// Plugins in `STARTED`.
    pub started: usize,
    /// Plugins in `ERROR`.
    pub errored: usize,
    /// Share of non-errored plugins, in percent, one decimal. `0` when empty.
    pub success_rate: f64,
    /// Details for every errored plugin, in admission order.
    pub errored_plugins: Vec<ErroredPlugin>,
    /// Plugins over an advisory resource threshold.
    pub threshold_breaches: Vec<ThresholdBreach>,
    /// Stop hooks still running after their timeout elapsed.
    pub orphaned_stops: usize,
}

impl HealthReport {
    /// Builds a report from registry records.
    ///
    /// Threshold breaches are only computed when resource monitoring is
    /// enabled in `config`.
    pub fn build(records: &[PluginMetadata], config: &RegistryConfig, orphaned_stops: usize) -> Self {
        let total = records.len();
        let started = records
            .iter()
            .filter(|meta| meta.state == PluginState::Started)
            .count();

        let errored_plugins: Vec<ErroredPlugin> = records
            .iter()
            .filter(|meta| meta.state.is_error())
            .map(|meta| ErroredPlugin {
                name: meta.name.clone(),
                error_count: meta.error_count,
                restart_count: meta.restart_count,
                last_error: meta.last_error.clone(),
            })
            .collect();
        let errored = errored_plugins.len();

        let threshold_breaches = if config.enable_resource_monitoring {
            records
                .iter()
                .filter_map(|meta| {
                    let usage = meta.resource_usage?;
                    exceeds_threshold(&usage, config).then(|| ThresholdBreach {
                        name: meta.name.clone(),
                        usage,
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            generated_at: Utc::now(),
            total,
            started,
            errored,
            success_rate: success_rate(total, errored),
            errored_plugins,
            threshold_breaches,
            orphaned_stops,
        }
    }
}

/// `(total - errored) / total * 100`, rounded to one decimal; `0` when
/// `total` is `0`.
pub fn success_rate(total: usize, errored: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let healthy = total.saturating_sub(errored) as f64;
    (healthy / total as f64 * 1000.0).round() / 10.0
}

/// Whether `usage` is over either configured advisory threshold.
pub fn exceeds_threshold(usage: &ResourceUsage, config: &RegistryConfig) -> bool {
    let memory = config
        .max_memory_usage_mb
        .is_some_and(|max| usage.memory_mb > max);
    let cpu = config
        .max_cpu_usage_percent
        .is_some_and(|max| usage.cpu_percent > max);
    memory || cpu
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Plugin Health Report")?;
        writeln!(f, "====================")?;
        writeln!(f, "Total plugins: {}", self.total)?;
        writeln!(f, "Started: {}", self.started)?;
        writeln!(f, "Errored: {}", self.errored)?;
        if self.total == 0 {
            writeln!(f, "Success rate: 0%")?;
        } else {
            writeln!(f, "Success rate: {:.1}%", self.success_rate)?;
        }

        if !self.errored_plugins.is_empty() {
            writeln!(f)?;
            writeln!(f, "Errored plugins:")?;
            for plugin in &self.errored_plugins {
                write!(
                    f,
                    "  - {} (errors: {}, restarts: {})",
                    plugin.name, plugin.error_count, plugin.restart_count
                )?;
                match &plugin.last_error {
                    Some(err) => writeln!(f, ": {err}")?,
                    None => writeln!(f)?,
                }
            }
        }

        if !self.threshold_breaches.is_empty() {
            writeln!(f)?;
            writeln!(f, "Over advisory thresholds:")?;
            for breach in &self.threshold_breaches {
                writeln!(
                    f,
                    "  - {} (memory: {} MB, cpu: {:.1}%)",
                    breach.name, breach.usage.memory_mb, breach.usage.cpu_percent
                )?;
            }
        }

        if self.orphaned_stops > 0 {
            writeln!(f)?;
            writeln!(f, "Orphaned stop hooks: {}", self.orphaned_stops)?;
        }
        Ok(())
    }
}
