//! Clean Command

use anyhow::Result;
use playrun_common::ConfigRegistry;
use playrun_e2e::ArtifactLayout;

use crate::output::print_success;

/// Clear results, videos, screenshots and execution logs of earlier runs
pub fn execute(registry: &ConfigRegistry) -> Result<()> {
    let layout = ArtifactLayout::new(&registry.config().paths.reports_dir);
    layout.reset_results()?;
    layout.prepare_session()?;
    print_success(&format!("Cleaned {}", layout.root().display()));
    Ok(())
}
