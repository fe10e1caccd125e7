//! Ape Escape remake display server
//!
//! Loads `resources/config/ape_escape.toml` (defaults when missing), opens a
//! window and draws the configured scene until closed.

mod app;

use ape_engine::config::Config;
use ape_engine::core::config::ApplicationConfig;
use ape_engine::foundation::logging;

use app::{ApeEscapeApp, AppError};

const CONFIG_PATH: &str = "resources/config/ape_escape.toml";

fn run() -> Result<(), AppError> {
    let config = ApplicationConfig::load_or_default(CONFIG_PATH)?;
    logging::init_with_level(&config.engine.log_level);
    config.validate()?;
    log::info!("Starting Ape Escape ({})", config.renderer.application_name);

    let validation_errors = {
        let mut app = ApeEscapeApp::new(&config)?;
        app.run()?;
        app.validation_error_count()
    };

    if let Some(count) = validation_errors {
        if count > 0 {
            log::warn!("Validation layer reported {} errors", count);
        } else {
            log::info!("Validation layer reported no errors");
        }
    }
    log::info!("Shutdown complete");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC occurred: {}", panic_info);
        if let Some(location) = panic_info.location() {
            eprintln!("Panic location: {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    run().map_err(|e| {
        log::error!("Fatal: {}", e);
        e.into()
    })
}
