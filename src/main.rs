use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use dotenv::dotenv;
use k8055_communicator::common::error::ConfigError;
use k8055_communicator::common::logger::init_logger;
use k8055_communicator::common::setting::Settings;
use k8055_communicator::communicator::{Communicator, EventKind, QueuedDispatcher};
use k8055_communicator::driver::dummy_card::DummyPortFactory;
use k8055_communicator::{error, info};

const LOG_TAG: &str = "main";
const PUMP_TICK: Duration = Duration::from_millis(100);

fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let settings = Settings::get();
    init_logger();
    info!(LOG_TAG, "settings loaded, env: {}", settings.env.env);
    log::debug!("settings: {:?}", settings);

    if settings.communicator.mode != "dummy" {
        return Err(Box::new(ConfigError(format!(
            "communicator mode '{}' has no hardware port in this build, use 'dummy'",
            settings.communicator.mode
        ))));
    }

    let factory = Arc::new(DummyPortFactory::new(settings.communicator.present_cards));
    let (dispatcher, pump) = QueuedDispatcher::new(settings.communicator.event_buffer);
    let communicator = Communicator::new(factory, Box::new(dispatcher));

    communicator.subscribe(EventKind::All, |event| match serde_json::to_string(event) {
        Ok(json) => info!(LOG_TAG, "event {}", json),
        Err(e) => error!(LOG_TAG, "cannot serialize event {:?}: {}", event, e),
    });

    for device in &settings.communicator.devices {
        match communicator.start_communication(*device) {
            Ok(true) => info!(LOG_TAG, "device {} started", device),
            Ok(false) => info!(LOG_TAG, "device {} already running", device),
            Err(e) => error!(LOG_TAG, "device {} not started: {}", device, e),
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))?;
    }

    pump.run_until(PUMP_TICK, || !running.load(Ordering::SeqCst));
    info!(LOG_TAG, "interrupted, shutting down");
    communicator.shutdown();
    pump.run_pending();
    Ok(())
}
