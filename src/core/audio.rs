//! Alert chime.
//!
//! A short synthesized two-tone, played when another session's alert lands
//! in the active program. Audio is best-effort: a machine with no output
//! device logs a warning and stays silent.

use std::time::Duration;

use rodio::source::{SineWave, Source};

/// Fire-and-forget chime on a throwaway thread; the caller (the background
/// loop) must not block on the audio device.
pub fn play_alert_chime() {
    std::thread::spawn(|| {
        if let Err(e) = chime_blocking() {
            log::warn!("alert chime unavailable: {}", e);
        }
    });
}

fn chime_blocking() -> Result<(), rodio::StreamError> {
    let stream = rodio::OutputStreamBuilder::open_default_stream()?;
    let sink = rodio::Sink::connect_new(stream.mixer());

    sink.append(
        SineWave::new(880.0)
            .take_duration(Duration::from_millis(160))
            .amplify(0.25),
    );
    sink.append(
        SineWave::new(660.0)
            .take_duration(Duration::from_millis(240))
            .amplify(0.25),
    );
    sink.sleep_until_end();

    Ok(())
}
