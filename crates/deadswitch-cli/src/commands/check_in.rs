use deadswitch_core::{resolve, Config, LivenessController, SettingsStore};
use serde_json::json;

use super::{open_store, StatusReport};

pub fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_store(config)?;
    let mut controller = LivenessController::with_system_clock(&db);
    controller.activate()?;

    let status = controller.check_in()?;
    let events = controller.take_events();
    controller.deactivate();

    let settings = db.get_settings()?;
    let last_check_in_ms = settings.last_check_in_ms.unwrap_or_default();
    let effective = resolve(&settings, None, last_check_in_ms);
    let report = StatusReport::new(status, &effective, last_check_in_ms, false);

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "status": report, "events": events }))?
    );
    Ok(())
}
