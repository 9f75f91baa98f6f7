//! Report output port.

use std::path::Path;

use crate::domain::error::TraderError;
use crate::domain::orchestrator::MultiSymbolResult;

/// Port for persisting a finished multi-symbol run.
pub trait ReportPort {
    fn write(&self, result: &MultiSymbolResult, output_dir: &Path) -> Result<(), TraderError>;
}
