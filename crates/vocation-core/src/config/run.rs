use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VocationError};

/// Named size of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Basic,
    Tiny,
    Small,
    Medium,
    Full,
}

impl Scale {
    /// All scales, smallest first.
    pub const ALL: [Scale; 5] = [
        Scale::Basic,
        Scale::Tiny,
        Scale::Small,
        Scale::Medium,
        Scale::Full,
    ];

    /// Lowercase preset name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Tiny => "tiny",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scale {
    type Err = VocationError;

    fn from_str(s: &str) -> Result<Self> {
        Scale::ALL
            .into_iter()
            .find(|scale| scale.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| VocationError::InvalidScale { name: s.to_string() })
    }
}

/// The four parameters that drive the training control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub scale: Scale,
    /// Number of training steps; one step consumes one batch.
    pub num_steps: usize,
    pub batch_size: usize,
    /// Validate every this many steps (step 0 included).
    pub log_validation_every: usize,
    /// Consecutive non-improving validations before stopping early.
    pub fail_to_improve_tolerance: usize,
}

impl RunConfig {
    /// Looks up the preset row for `scale`.
    #[must_use]
    pub fn preset(scale: Scale) -> Self {
        let (num_steps, batch_size, log_validation_every, fail_to_improve_tolerance) = match scale
        {
            Scale::Basic => (5, 2, 3, 1),
            Scale::Tiny => (10, 20, 3, 1),
            Scale::Small => (100, 50, 5, 2),
            Scale::Medium => (200, 100, 10, 3),
            Scale::Full => (1000, 200, 12, 4),
        };

        Self {
            scale,
            num_steps,
            batch_size,
            log_validation_every,
            fail_to_improve_tolerance,
        }
    }

    /// Parses a scale name and looks up its preset.
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(Self::preset(name.parse()?))
    }

    /// Override the batch size, e.g. for datasets smaller than the preset.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Override the number of steps.
    pub fn with_num_steps(mut self, num_steps: usize) -> Self {
        self.num_steps = num_steps;
        self
    }

    /// Checks the settings that do not depend on the data. The batch size is
    /// checked against the training partition when the run starts.
    pub fn validate(&self) -> Result<()> {
        if self.log_validation_every == 0 {
            return Err(VocationError::InvalidRun(
                "log_validation_every must be at least 1".into(),
            ));
        }
        if self.fail_to_improve_tolerance == 0 {
            return Err(VocationError::InvalidRun(
                "fail_to_improve_tolerance must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Writes the configuration to the `config.run` log target.
    pub fn log(&self) {
        tracing::info!(
            target: "config.run",
            "scale {}: {} steps, batch size {}, validate every {}, validation worse run tolerance {}",
            self.scale,
            self.num_steps,
            self.batch_size,
            self.log_validation_every,
            self.fail_to_improve_tolerance
        );
    }
}
