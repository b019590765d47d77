//! Report output port trait.

use std::path::Path;

use crate::domain::error::ImatradeError;
use crate::domain::metrics::Metrics;
use crate::domain::processor::SimulationResult;

/// Port for persisting the outcome of one simulation run.
pub trait ReportSink {
    fn write(
        &self,
        result: &SimulationResult,
        metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<(), ImatradeError>;
}
