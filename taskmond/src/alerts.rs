use serde::{Deserialize, Serialize};

use crate::error::ThresholdError;
use crate::types::{Alert, NormalizedSnapshot, Resource, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub warning: f64,
    pub critical: f64,
}

impl Threshold {
    pub const fn new(warning: f64, critical: f64) -> Self {
        Self { warning, critical }
    }

    /// Highest threshold crossed by `value`, if any.
    pub fn classify(&self, value: f64) -> Option<(Severity, f64)> {
        if value >= self.critical {
            Some((Severity::Critical, self.critical))
        } else if value >= self.warning {
            Some((Severity::Warning, self.warning))
        } else {
            None
        }
    }

    pub fn validate(&self, resource: Resource) -> Result<(), ThresholdError> {
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(self.warning) || !in_range(self.critical) {
            return Err(ThresholdError::OutOfRange {
                resource,
                warning: self.warning,
                critical: self.critical,
            });
        }
        if self.warning > self.critical {
            return Err(ThresholdError::Inverted {
                resource,
                warning: self.warning,
                critical: self.critical,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub cpu: Threshold,
    pub memory: Threshold,
    pub disk: Threshold,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            cpu: Threshold::new(80.0, 95.0),
            memory: Threshold::new(85.0, 95.0),
            disk: Threshold::new(90.0, 95.0),
        }
    }
}

impl AlertThresholds {
    pub fn validate(&self) -> Result<(), ThresholdError> {
        for (resource, threshold) in self.iter() {
            threshold.validate(resource)?;
        }
        Ok(())
    }

    pub fn with_overrides(mut self, overrides: &ThresholdOverrides) -> Self {
        let apply = |t: &mut Threshold, warning: Option<f64>, critical: Option<f64>| {
            if let Some(w) = warning {
                t.warning = w;
            }
            if let Some(c) = critical {
                t.critical = c;
            }
        };
        apply(&mut self.cpu, overrides.cpu_warning, overrides.cpu_critical);
        apply(&mut self.memory, overrides.memory_warning, overrides.memory_critical);
        apply(&mut self.disk, overrides.disk_warning, overrides.disk_critical);
        self
    }

    fn iter(&self) -> [(Resource, Threshold); 3] {
        [
            (Resource::Cpu, self.cpu),
            (Resource::Memory, self.memory),
            (Resource::Disk, self.disk),
        ]
    }
}

/// Per-request adjustments on top of the configured thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct ThresholdOverrides {
    pub cpu_warning: Option<f64>,
    pub cpu_critical: Option<f64>,
    pub memory_warning: Option<f64>,
    pub memory_critical: Option<f64>,
    pub disk_warning: Option<f64>,
    pub disk_critical: Option<f64>,
}

impl ThresholdOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// At most one alert per resource, in cpu, memory, disk order.
pub fn evaluate(snapshot: &NormalizedSnapshot, thresholds: &AlertThresholds) -> Vec<Alert> {
    thresholds
        .iter()
        .into_iter()
        .filter_map(|(resource, threshold)| {
            let value = match resource {
                Resource::Cpu => snapshot.system_cpu_percent,
                Resource::Memory => snapshot.memory_percent,
                Resource::Disk => snapshot.disk_percent,
            };
            threshold
                .classify(value)
                .map(|(severity, crossed)| Alert {
                    resource,
                    severity,
                    current_value: value,
                    threshold: crossed,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(cpu: f64, memory: f64, disk: f64) -> NormalizedSnapshot {
        let mut s = NormalizedSnapshot::empty();
        s.system_cpu_percent = cpu;
        s.memory_percent = memory;
        s.disk_percent = disk;
        s
    }

    #[test]
    fn test_cpu_warning() {
        let alerts = evaluate(&snapshot(82.0, 0.0, 0.0), &AlertThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].resource, Resource::Cpu);
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert_eq!(alerts[0].current_value, 82.0);
        assert_eq!(alerts[0].threshold, 80.0);
    }

    #[test]
    fn test_cpu_critical_only() {
        let alerts = evaluate(&snapshot(97.0, 0.0, 0.0), &AlertThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(alerts[0].threshold, 95.0);
    }

    #[test]
    fn test_below_warning_is_quiet() {
        assert!(evaluate(&snapshot(50.0, 10.0, 10.0), &AlertThresholds::default()).is_empty());
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let alerts = evaluate(&snapshot(80.0, 95.0, 89.99), &AlertThresholds::default());
        let summary: Vec<(Resource, Severity)> =
            alerts.iter().map(|a| (a.resource, a.severity)).collect();
        assert_eq!(
            summary,
            vec![
                (Resource::Cpu, Severity::Warning),
                (Resource::Memory, Severity::Critical),
            ]
        );
    }

    #[test]
    fn test_all_resources_in_order() {
        let alerts = evaluate(&snapshot(99.0, 90.0, 91.0), &AlertThresholds::default());
        let resources: Vec<Resource> = alerts.iter().map(|a| a.resource).collect();
        assert_eq!(resources, vec![Resource::Cpu, Resource::Memory, Resource::Disk]);
    }

    #[test]
    fn test_overrides_apply_per_field() {
        let overrides = ThresholdOverrides {
            cpu_warning: Some(40.0),
            disk_critical: Some(99.0),
            ..ThresholdOverrides::default()
        };
        let t = AlertThresholds::default().with_overrides(&overrides);
        assert_eq!(t.cpu, Threshold::new(40.0, 95.0));
        assert_eq!(t.memory, Threshold::new(85.0, 95.0));
        assert_eq!(t.disk, Threshold::new(90.0, 99.0));

        let alerts = evaluate(&snapshot(50.0, 0.0, 0.0), &t);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
    }

    #[test]
    fn test_validate() {
        assert!(AlertThresholds::default().validate().is_ok());

        let inverted = AlertThresholds {
            memory: Threshold::new(96.0, 90.0),
            ..AlertThresholds::default()
        };
        let err = inverted.validate().unwrap_err();
        assert!(matches!(
            err,
            ThresholdError::Inverted {
                resource: Resource::Memory,
                ..
            }
        ));
        assert!(err.to_string().starts_with("memory:"), "{err}");

        let out_of_range = AlertThresholds {
            cpu: Threshold::new(80.0, 120.0),
            ..AlertThresholds::default()
        };
        assert_eq!(
            out_of_range.validate(),
            Err(ThresholdError::OutOfRange {
                resource: Resource::Cpu,
                warning: 80.0,
                critical: 120.0,
            })
        );
    }
}
