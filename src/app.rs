use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use tauri::{Emitter, Manager, State};
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons};

use crate::core::{
    audio,
    clock::SystemClock,
    config::{self, ConfigManager, Settings},
    feed::AlertFeed,
    model::{AlertDraft, AlertRecord, GeoPoint},
    presence::PresenceRoster,
    session::SessionId,
    watcher::StoreWatcher,
};

struct AppState {
    feed: Mutex<AlertFeed>,
    selected: Mutex<Option<GeoPoint>>,
    settings: Mutex<Settings>,
    config_manager: ConfigManager,
    session: SessionId,
    data_dir: PathBuf,
}

/// The roster is just a path, a clock and a TTL, so it is rebuilt from the
/// current settings wherever it is needed instead of being cached.
fn presence_roster(data_dir: &Path, settings: &Settings) -> PresenceRoster {
    PresenceRoster::with_ttl(
        data_dir,
        Box::new(SystemClock),
        settings.presence_ttl_seconds as i64 * 1000,
    )
}

fn format_timestamp(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("{} ms", ms))
}

/// Initial snapshot the webview asks for on load.
#[derive(serde::Serialize)]
struct Bootstrap {
    session: SessionId,
    programs: Vec<String>,
    active: Option<String>,
    settings: Settings,
}

/// Payload for the `new-alert` banner event.
#[derive(Clone, serde::Serialize)]
struct NewAlertNotice {
    message: String,
    record: AlertRecord,
}

#[tauri::command]
fn get_bootstrap(state: State<'_, AppState>) -> Bootstrap {
    let feed = state.feed.lock().unwrap();
    Bootstrap {
        session: state.session,
        programs: feed.programs().names.clone(),
        active: feed.active_program().map(str::to_string),
        settings: state.settings.lock().unwrap().clone(),
    }
}

#[tauri::command]
fn create_or_select_program(
    name: String,
    state: State<'_, AppState>,
    app: tauri::AppHandle,
) -> Result<Option<String>, String> {
    let selected = {
        let mut feed = state.feed.lock().unwrap();
        feed.create_or_select_program(&name).map_err(|e| e.to_string())?
    };

    if let Some(program) = &selected {
        log::info!("active program: {}", program);

        // Presence and feed both key off the active program; refresh both.
        let settings = state.settings.lock().unwrap().clone();
        let roster = presence_roster(&state.data_dir, &settings);
        let count = roster
            .heartbeat(program, state.session)
            .map_err(|e| e.to_string())?;
        let _ = app.emit("presence-update", count);

        let view = state.feed.lock().unwrap().alerts_for_active();
        let _ = app.emit("feed-update", view);
    }

    Ok(selected)
}

#[tauri::command]
fn select_location(lat: f64, lng: f64, state: State<'_, AppState>) {
    let mut selected = state.selected.lock().unwrap();
    *selected = Some(GeoPoint { lat, lng });
}

#[tauri::command]
fn locate_failed() {
    // Geolocation runs in the webview; we only record that it fell through.
    log::warn!("geolocation unavailable; manual map pinning remains available");
}

#[tauri::command]
async fn submit_alert(
    mut draft: AlertDraft,
    state: State<'_, AppState>,
    app: tauri::AppHandle,
) -> Result<AlertRecord, String> {
    draft.location = *state.selected.lock().unwrap();

    let record = {
        let mut feed = state.feed.lock().unwrap();
        feed.submit_alert(draft, state.session).map_err(|e| e.to_string())?
    };

    let view = state.feed.lock().unwrap().alerts_for_active();
    let _ = app.emit("feed-update", view);
    let _ = app.emit(
        "alert-posted",
        format!(
            "New {} posted in {}",
            record.kind.label(),
            record.program
        ),
    );

    if record.escalate {
        let number = state.settings.lock().unwrap().emergency_number.clone();
        let handle = app.clone();

        // Blocking confirm dialog off the async runtime, like other modal
        // prompts in the shell.
        let confirmed = tauri::async_runtime::spawn_blocking(move || {
            handle
                .dialog()
                .message(format!(
                    "Critical alert posted. Do you want to call {} now?",
                    number
                ))
                .title("Escalate to emergency services")
                .buttons(MessageDialogButtons::OkCancelCustom(
                    "Call now".to_string(),
                    "Not now".to_string(),
                ))
                .blocking_show()
        })
        .await
        .map_err(|e| e.to_string())?;

        if confirmed {
            let number = state.settings.lock().unwrap().emergency_number.clone();
            log::info!("escalation confirmed, dialing {}", number);
            let _ = app.emit("dial-emergency", format!("tel:{}", number));
        }
    }

    Ok(record)
}

#[tauri::command]
fn get_feed(state: State<'_, AppState>) -> Vec<AlertRecord> {
    state.feed.lock().unwrap().alerts_for_active()
}

#[tauri::command]
fn get_presence_count(state: State<'_, AppState>) -> usize {
    let active = state
        .feed
        .lock()
        .unwrap()
        .active_program()
        .map(str::to_string);
    match active {
        Some(program) => {
            let settings = state.settings.lock().unwrap().clone();
            presence_roster(&state.data_dir, &settings).active_count(&program)
        }
        None => 0,
    }
}

#[tauri::command]
fn get_settings(state: State<'_, AppState>) -> Settings {
    state.settings.lock().unwrap().clone()
}

#[tauri::command]
fn save_settings(settings: Settings, state: State<'_, AppState>) -> Result<(), String> {
    if !config::is_valid_dial_code(&settings.emergency_number) {
        return Err(format!(
            "\"{}\" is not a dial code (2-6 digits).",
            settings.emergency_number
        ));
    }

    let mut current = state.settings.lock().unwrap();
    *current = settings.clone();
    state.config_manager.save(&settings).map_err(|e| e.to_string())
}

pub fn run() {
    tauri::Builder::default()
        .setup(|app| {
            let handle = app.handle().clone();

            // Initialize Config
            let config_dir = app.path().app_config_dir().unwrap_or(PathBuf::from("."));
            let config_manager = ConfigManager::new(config_dir);
            let settings = config_manager.load();

            let data_dir = app.path().app_data_dir().unwrap_or(PathBuf::from("."));
            let session = crate::core::session::load_or_create(&data_dir)?;
            log::info!("session {}", session);

            let mut feed = AlertFeed::open(data_dir.clone(), Box::new(SystemClock));
            feed.select_first_program_if_unset()?;

            app.manage(AppState {
                feed: Mutex::new(feed),
                selected: Mutex::new(None),
                settings: Mutex::new(settings),
                config_manager,
                session,
                data_dir: data_dir.clone(),
            });

            if cfg!(debug_assertions) {
                app.handle().plugin(
                    tauri_plugin_log::Builder::default()
                        .level(log::LevelFilter::Info)
                        .build(),
                )?;
            }
            app.handle().plugin(tauri_plugin_dialog::init())?;
            app.handle().plugin(tauri_plugin_process::init())?;
            app.handle()
                .plugin(tauri_plugin_window_state::Builder::default().build())?;
            app.handle()
                .plugin(tauri_plugin_updater::Builder::new().build())?;

            // Background loop: watch the shared store files for writes from
            // other instances, and keep this session's presence stamped.
            tauri::async_runtime::spawn(async move {
                let mut watcher = StoreWatcher::new(&data_dir);
                let mut last_heartbeat: Option<Instant> = None;
                log::info!("store watcher started on {:?}", data_dir);

                loop {
                    let current_settings = {
                        let app_state = handle.state::<AppState>();
                        let settings = app_state.settings.lock().unwrap();
                        settings.clone()
                    };

                    let changes = watcher.poll();

                    if changes.alerts {
                        let app_state = handle.state::<AppState>();
                        let (view, banner) = {
                            let mut feed = app_state.feed.lock().unwrap();
                            feed.reload_alerts();
                            let view = feed.alerts_for_active();
                            let banner = feed.latest_unseen(app_state.session).unwrap_or_else(|e| {
                                log::warn!("could not advance last-seen mark: {}", e);
                                None
                            });
                            (view, banner)
                        };

                        let _ = handle.emit("feed-update", view);

                        if let Some(record) = banner {
                            let message = format!(
                                "New {} update posted in {}",
                                record.kind.label(),
                                record.program
                            );
                            log::info!("{} at {}", message, format_timestamp(record.created_at));
                            let _ = handle.emit("new-alert", NewAlertNotice { message, record });
                            audio::play_alert_chime();
                        }
                    }

                    if changes.presence {
                        let app_state = handle.state::<AppState>();
                        let active = app_state
                            .feed
                            .lock()
                            .unwrap()
                            .active_program()
                            .map(str::to_string);
                        if let Some(program) = active {
                            let count = presence_roster(&data_dir, &current_settings)
                                .active_count(&program);
                            let _ = handle.emit("presence-update", count);
                        }
                    }

                    // Hot-reload friendly: the interval is re-read from
                    // settings on every pass.
                    let interval = Duration::from_secs(current_settings.heartbeat_seconds.max(1));
                    if last_heartbeat.map_or(true, |t| t.elapsed() >= interval) {
                        let app_state = handle.state::<AppState>();
                        let active = app_state
                            .feed
                            .lock()
                            .unwrap()
                            .active_program()
                            .map(str::to_string);
                        if let Some(program) = active {
                            let roster = presence_roster(&data_dir, &current_settings);
                            match roster.heartbeat(&program, app_state.session) {
                                Ok(count) => {
                                    let _ = handle.emit("presence-update", count);
                                }
                                Err(e) => log::warn!("presence heartbeat failed: {}", e),
                            }
                        }
                        last_heartbeat = Some(Instant::now());
                    }

                    tokio::time::sleep(Duration::from_millis(1000)).await;
                }
            });

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            get_bootstrap,
            create_or_select_program,
            select_location,
            locate_failed,
            submit_alert,
            get_feed,
            get_presence_count,
            get_settings,
            save_settings
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
