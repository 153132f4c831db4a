use crate::core::ConfigError;

pub const DEFAULT_RETENTION_DAYS: u32 = 15;
pub const DEFAULT_SPACE_LIMIT_PERCENT: f64 = 60.0;
pub const DEFAULT_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];
pub const GB_SCALE: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct StoragePolicyConfig {
    pub retention_days: u32,
    pub space_limit_percent: f64,
    /// Replaces only the "total" term of the usage percentage.
    pub simulated_total_capacity: Option<u64>,
    pub extensions: Vec<String>,
}

impl Default for StoragePolicyConfig {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            space_limit_percent: DEFAULT_SPACE_LIMIT_PERCENT,
            simulated_total_capacity: None,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl StoragePolicyConfig {
    pub fn with_simulated_total_gb(mut self, gb: f64) -> Result<Self, ConfigError> {
        self.simulated_total_capacity = Some(gb_to_bytes(gb)?);
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_days == 0 {
            return Err(ConfigError::invalid(
                "retention_days",
                "must be greater than zero",
            ));
        }
        if !(self.space_limit_percent > 0.0 && self.space_limit_percent <= 100.0) {
            return Err(ConfigError::invalid(
                "space_limit_percent",
                format!("{} is outside (0, 100]", self.space_limit_percent),
            ));
        }
        if self.simulated_total_capacity == Some(0) {
            return Err(ConfigError::invalid(
                "simulated_total_capacity",
                "must be greater than zero",
            ));
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::invalid("extensions", "must not be empty"));
        }
        Ok(())
    }
}

pub fn gb_to_bytes(gb: f64) -> Result<u64, ConfigError> {
    if !gb.is_finite() || gb <= 0.0 {
        return Err(ConfigError::invalid(
            "simulated_total_capacity_gb",
            format!("{} is not a positive size", gb),
        ));
    }
    Ok((gb * GB_SCALE as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = StoragePolicyConfig::default();
        assert_eq!(c.retention_days, 15);
        assert_eq!(c.space_limit_percent, 60.0);
        assert!(c.simulated_total_capacity.is_none());
        assert_eq!(c.extensions, vec!["mp4", "avi", "mov"]);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut c = StoragePolicyConfig::default();
        c.space_limit_percent = 0.0;
        assert!(c.validate().is_err());
        c.space_limit_percent = 120.0;
        assert!(c.validate().is_err());
        c.space_limit_percent = f64::NAN;
        assert!(c.validate().is_err());

        let c = StoragePolicyConfig {
            retention_days: 0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn simulated_gb_uses_binary_scale() {
        let c = StoragePolicyConfig::default()
            .with_simulated_total_gb(1.0)
            .unwrap();
        assert_eq!(c.simulated_total_capacity, Some(1_073_741_824));
        assert!(gb_to_bytes(-1.0).is_err());
        assert!(gb_to_bytes(0.0).is_err());
    }
}
