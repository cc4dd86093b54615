use oxid_calibration::{config::CalibrationConfig, console::{Console, Outcome}, Calibrator};
use rustyline::{error::ReadlineError, DefaultEditor};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), ReadlineError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("OxidSQL - assumption console");

    let config = CalibrationConfig::new();
    info!(enabled = config.enabled, mode = %config.mode, trust_factor = config.trust_factor(), "starting");
    let mut console = Console::new(Calibrator::new(config));

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("assumptions> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                editor.add_history_entry(line.as_str())?;
                match console.execute(&line) {
                    Ok(Outcome::Output(output)) => println!("{}", output),
                    Ok(Outcome::Quit) => break,
                    Err(e) => error!("{}", e),
                }
            },
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
