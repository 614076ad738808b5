use crate::types::Tool;

use anyhow::Result;
use chrono::Local;
use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema, Default)]
#[serde(rename = "get_today")]
#[schemars(description = "Get today's date as YYYY.MM.DD")]
pub struct GetToday {}

impl Tool for GetToday {
    fn apply(&self) -> Result<String> {
        Ok(Local::now().format("%Y.%m.%d").to_string())
    }
}
