use crate::types::Tool;

use anyhow::{Result, bail};
use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename = "calculate_bmi")]
#[schemars(description = "Calculate the body mass index from a weight and a height.")]
pub struct CalculateBmi {
    #[schemars(description = "body weight in kilograms")]
    pub weight_kg: f64,

    #[schemars(description = "body height in meters")]
    pub height_m: f64,
}

impl Tool for CalculateBmi {
    fn apply(&self) -> Result<String> {
        if self.height_m <= 0.0 {
            bail!("height must be positive, got {}", self.height_m);
        }
        Ok((self.weight_kg / (self.height_m * self.height_m)).to_string())
    }
}
