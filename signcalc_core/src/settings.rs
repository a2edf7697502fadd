//! Engine settings
//!
//! Every tunable knob of the pipeline in one serde document. Missing keys
//! fall back to their defaults, so a settings file only needs the values it
//! changes:
//!
//! ```json
//! {
//!   "abstain_floor": 0.6,
//!   "genetic": { "population_size": 80 },
//!   "batch": { "workers": 4 }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::batch::BatchSettings;
use crate::envelope::DEFAULT_ABSTAIN_FLOOR;
use crate::errors::{CalcError, CalcResult};
use crate::file_io::load_json;
use crate::foundation::DepthSettings;
use crate::optimize::{GeneticSettings, ParetoSettings};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Feasible results below this confidence become abstentions
    pub abstain_floor: f64,
    /// Alternative pole sections reported next to the chosen one
    pub alternatives: usize,
    pub depth: DepthSettings,
    pub genetic: GeneticSettings,
    pub pareto: ParetoSettings,
    pub batch: BatchSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            abstain_floor: DEFAULT_ABSTAIN_FLOOR,
            alternatives: 3,
            depth: DepthSettings::default(),
            genetic: GeneticSettings::default(),
            pareto: ParetoSettings::default(),
            batch: BatchSettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn from_json(json: &str) -> CalcResult<Self> {
        let settings: EngineSettings = serde_json::from_str(json).map_err(CalcError::serialization)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> CalcResult<Self> {
        let settings: EngineSettings = load_json(path)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> CalcResult<()> {
        if !(0.0..=1.0).contains(&self.abstain_floor) {
            return Err(CalcError::invalid_input(
                "abstain_floor",
                self.abstain_floor.to_string(),
                "Confidence floor must be in [0, 1]",
            ));
        }
        self.depth.validate()?;
        self.genetic.validate()?;
        self.pareto.validate()?;
        self.batch.validate()?;
        Ok(())
    }
}
