//! Chart output port.

use crate::domain::chart::ChartSpec;
use crate::domain::error::AnalyticsError;

/// Port for handing chart descriptions to a renderer.
pub trait ChartPort {
    fn write(&self, chart: &ChartSpec, output_path: &str) -> Result<(), AnalyticsError>;
}
