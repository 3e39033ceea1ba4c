//! flatpak_installer - create Flatpak bundles from packaged Electron applications.

use flatpak_installer::cli;
use flatpak_installer::cli::OutputManager;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            // Never quiet for fatal errors
            let output = OutputManager::new(false, false);
            output.error(&e.to_string());

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                output.error_detail("");
                output.error_detail("Recovery suggestions:");
                for suggestion in suggestions {
                    output.error_detail(&format!("- {suggestion}"));
                }
            }

            process::exit(1);
        }
    }
}
