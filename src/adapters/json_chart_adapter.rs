//! Chart adapter writing chart descriptions as pretty-printed JSON.
//!
//! The output is meant for a front-end plotting library; `-` writes to stdout.

use crate::domain::chart::ChartSpec;
use crate::domain::error::AnalyticsError;
use crate::ports::chart_port::ChartPort;
use std::fs;
use std::io::Write;
use tracing::info;

pub struct JsonChartAdapter;

impl JsonChartAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn render(chart: &ChartSpec) -> Result<String, AnalyticsError> {
        Ok(serde_json::to_string_pretty(chart)?)
    }
}

impl Default for JsonChartAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartPort for JsonChartAdapter {
    fn write(&self, chart: &ChartSpec, output_path: &str) -> Result<(), AnalyticsError> {
        let json = Self::render(chart)?;
        if output_path == "-" {
            let mut out = std::io::stdout().lock();
            writeln!(out, "{json}")?;
            return Ok(());
        }
        fs::write(output_path, json)?;
        info!(path = output_path, "chart written");
        Ok(())
    }
}
