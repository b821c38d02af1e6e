use crate::app::error::HarnessError;
use crate::app::executor::environment_command;
use crate::app::models::HarnessConfig;
use crate::app::transform::Transformer;

/// Runs each setup script once, in declared order, before any test file.
/// Stops at the first failure; scripts that already ran keep their effects.
pub fn run_setup_files(
    config: &HarnessConfig,
    transformer: &Transformer<'_>,
) -> Result<usize, HarnessError> {
    for script in &config.setup_files {
        log::info!("setup: {}", script.display());

        let setup_error = |reason: String| HarnessError::Setup {
            script: script.clone(),
            reason,
        };

        let executable = transformer.prepare(script).map_err(|e| setup_error(e.to_string()))?;
        let output = environment_command(config, &executable)
            .env("HARNESS_SETUP_FILE", script)
            .output()
            .map_err(|e| setup_error(format!("could not start: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let status = match output.status.code() {
                Some(code) => format!("exited with status {}", code),
                None => "terminated by signal".to_string(),
            };
            return Err(setup_error(format!("{}: {}", status, stderr.trim())));
        }
    }

    Ok(config.setup_files.len())
}
