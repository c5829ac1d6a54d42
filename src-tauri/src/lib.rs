//! Single-area variant of the alert board.
//!
//! Same feed store as the full app, but alerts are partitioned by one
//! free-text "area" name instead of a managed program list, and there is no
//! presence tracking.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tauri::{Emitter, Manager, State};
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons};
use blockwatch::core::{
    clock::SystemClock,
    config::{self, ConfigManager, Settings},
    feed::AlertFeed,
    model::{AlertDraft, AlertRecord, GeoPoint},
    session::SessionId,
    watcher::StoreWatcher,
};

struct AppState {
    feed: Mutex<AlertFeed>,
    selected: Mutex<Option<GeoPoint>>,
    settings: Mutex<Settings>,
    config_manager: ConfigManager,
    session: SessionId,
}

#[derive(serde::Serialize)]
struct Bootstrap {
    session: SessionId,
    area: Option<String>,
    settings: Settings,
}

#[tauri::command]
fn get_bootstrap(state: State<'_, AppState>) -> Bootstrap {
    let feed = state.feed.lock().unwrap();
    Bootstrap {
        session: state.session,
        area: feed.active_program().map(str::to_string),
        settings: state.settings.lock().unwrap().clone(),
    }
}

#[tauri::command]
fn set_area(
    name: String,
    state: State<'_, AppState>,
    app: tauri::AppHandle,
) -> Result<Option<String>, String> {
    let selected = {
        let mut feed = state.feed.lock().unwrap();
        feed.create_or_select_program(&name).map_err(|e| e.to_string())?
    };

    if let Some(area) = &selected {
        log::info!("active area: {}", area);
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
        format!("New {} posted in {}", record.kind.label(), record.program),
    );

    if record.escalate {
        let number = state.settings.lock().unwrap().emergency_number.clone();
        let handle = app.clone();

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

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .setup(|app| {
            let handle = app.handle().clone();

            // Initialize Config
            let config_dir = app.path().app_config_dir().unwrap_or(PathBuf::from("."));
            let config_manager = ConfigManager::new(config_dir);
            let settings = config_manager.load();

            let data_dir = app.path().app_data_dir().unwrap_or(PathBuf::from("."));
            let session = blockwatch::core::session::load_or_create(&data_dir)?;

            let mut feed = AlertFeed::open(data_dir.clone(), Box::new(SystemClock));
            feed.select_first_program_if_unset()?;

            app.manage(AppState {
                feed: Mutex::new(feed),
                selected: Mutex::new(None),
                settings: Mutex::new(settings),
                config_manager,
                session,
            });

            if cfg!(debug_assertions) {
                app.handle().plugin(
                    tauri_plugin_log::Builder::default()
                        .level(log::LevelFilter::Info)
                        .build(),
                )?;
            }
            app.handle().plugin(tauri_plugin_dialog::init())?;

            // Background loop: pick up writes from other open instances.
            tauri::async_runtime::spawn(async move {
                let mut watcher = StoreWatcher::new(&data_dir);
                log::info!("store watcher started on {:?}", data_dir);

                loop {
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
                            let _ = handle.emit("new-alert", message);
                        }
                    }

                    tokio::time::sleep(Duration::from_millis(1000)).await;
                }
            });

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            get_bootstrap,
            set_area,
            select_location,
            locate_failed,
            submit_alert,
            get_feed,
            get_settings,
            save_settings
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
