use std::sync::Arc;

use wellnudge::{
    appsettings::AppSettings,
    clock::{Clock, SystemClock},
    console::{self, Console},
    delivery::{
        Haptics, InAppEventSink, NotificationDispatcher, OsNotificationSink, SoundSink,
        TerminalBell, VibrationSink,
    },
    scheduling::{CountdownEngine, EngineContext, HydrationEngine},
    storage::{FileStorage, InMemoryStorage, KeyValueStorage},
    sync::SyncHub,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let settings = AppSettings::load()?;
    let timezone = settings.timezone()?;
    log::info!(
        "Starting wellnudge [timezone = {}, storage = {}]",
        timezone,
        settings.storage.directory.display()
    );

    let storage = open_storage(&settings).await;
    let in_app = Arc::new(InAppEventSink::new());
    let banner = tokio::spawn(console::run_banner(in_app.subscribe()));
    let dispatcher = build_dispatcher(&settings, in_app.clone());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let hub = open_sync(&settings).await;

    let context = |poll_interval| EngineContext {
        storage: storage.clone(),
        clock: clock.clone(),
        timezone,
        sync: hub.clone(),
        dispatcher: dispatcher.clone(),
        poll_interval,
    };

    let hydration = HydrationEngine::start(context(settings.hydration_poll_interval())).await;
    let countdown = CountdownEngine::start(context(settings.countdown_tick_interval())).await;

    let result = Console::new(&hydration, &countdown).run().await;

    hydration.shutdown().await;
    countdown.shutdown().await;
    banner.abort();
    log::info!("Stopped wellnudge");

    result
}

async fn open_storage(settings: &AppSettings) -> Arc<dyn KeyValueStorage> {
    match FileStorage::open(&settings.storage.directory).await {
        Ok(storage) => Arc::new(storage),
        Err(error) => {
            log::error!(
                "Storage unavailable, settings will not survive a restart [directory = {}, error = {}]",
                settings.storage.directory.display(),
                error
            );
            Arc::new(InMemoryStorage::new())
        }
    }
}

#[cfg(unix)]
async fn open_sync(settings: &AppSettings) -> Arc<SyncHub> {
    let directory = settings.storage.directory.join(wellnudge::sync::SYNC_SUBDIRECTORY);
    match SyncHub::bind(&directory).await {
        Ok(hub) => hub,
        Err(error) => {
            log::error!(
                "Cannot reach other instances, syncing within this process only [directory = {}, error = {:#}]",
                directory.display(),
                error
            );
            SyncHub::new()
        }
    }
}

#[cfg(not(unix))]
async fn open_sync(_settings: &AppSettings) -> Arc<SyncHub> {
    log::warn!("Cross-process sync needs unix sockets, syncing within this process only");
    SyncHub::new()
}

fn build_dispatcher(settings: &AppSettings, in_app: Arc<InAppEventSink>) -> NotificationDispatcher {
    let notifications = &settings.notifications;
    let haptics: Option<Arc<dyn Haptics>> = notifications
        .haptics
        .then(|| Arc::new(TerminalBell) as Arc<dyn Haptics>);

    NotificationDispatcher::new()
        .with_sink(in_app)
        .with_sink(Arc::new(VibrationSink::new(haptics)))
        .with_sink(Arc::new(SoundSink::new(
            notifications.sound_player.clone(),
            notifications.sound_file.clone(),
        )))
        .with_sink(Arc::new(OsNotificationSink::new(
            notifications.app_name.clone(),
            notifications.permission,
        )))
}
