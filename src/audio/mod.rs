pub mod chime;
mod output;

use output::{Clip, Output};

use std::{
    fmt,
    path::PathBuf,
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::{self, Sender},
        Arc, Mutex,
    },
    thread,
};

use anyhow::anyhow;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::store::{read_parsed, write_logged, SharedStore, KEY_NOTIFICATION_SOUND};

/// The fixed set of notification sounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum SoundId {
    #[default]
    Alarm1,
    Alarm2,
    Bell,
    Digital,
}

impl SoundId {
    pub const ALL: [SoundId; 4] = [
        SoundId::Alarm1,
        SoundId::Alarm2,
        SoundId::Bell,
        SoundId::Digital,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SoundId::Alarm1 => "alarm1",
            SoundId::Alarm2 => "alarm2",
            SoundId::Bell => "bell",
            SoundId::Digital => "digital",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            SoundId::Alarm1 => "Alarm1.wav",
            SoundId::Alarm2 => "Alarm2.wav",
            SoundId::Bell => "Bell.wav",
            SoundId::Digital => "Digital.wav",
        }
    }

    /// Stored form under `notificationSound`.
    pub fn path(&self) -> String {
        format!("/sounds/{}", self.file_name())
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SoundId {
    type Err = anyhow::Error;

    /// Accepts the short name (`bell`), the file name (`Bell.wav`) or the
    /// stored path (`/sounds/Bell.wav`), case-insensitively.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
        SoundId::ALL
            .into_iter()
            .find(|sound| {
                last.eq_ignore_ascii_case(sound.name()) || last.eq_ignore_ascii_case(sound.file_name())
            })
            .ok_or_else(|| anyhow!("unknown notification sound '{value}'"))
    }
}

/// Plays the completion cue. Fire-and-forget: implementations log their
/// own failures and never report them to the caller.
pub trait SoundNotifier: Send + Sync {
    fn play(&self);
    fn set_sound(&self, sound: SoundId);
}

enum AudioCommand {
    Load(Option<Clip>),
    Play,
    Stop,
}

/// Handle to the dedicated audio thread. The thread owns the output device,
/// which cannot leave the thread it was opened on.
pub struct AudioEngineHandle {
    tx: Mutex<Option<Sender<AudioCommand>>>,
}

impl AudioEngineHandle {
    pub fn new() -> Self {
        Self {
            tx: Mutex::new(None),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
        let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();

        thread::Builder::new()
            .name("audio-engine".to_string())
            .spawn(move || {
                let mut output: Option<Output> = None;
                let mut loaded: Option<Clip> = None;

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Load(clip) => {
                            loaded = clip;
                        }
                        AudioCommand::Play => {
                            let Some(clip) = loaded.as_ref() else {
                                warn!("No notification sound loaded; skipping playback");
                                continue;
                            };
                            if output.is_none() {
                                match Output::open() {
                                    Ok(opened) => output = Some(opened),
                                    Err(e) => {
                                        error!("{e}");
                                        continue;
                                    }
                                }
                            }
                            if let Some(out) = output.as_mut() {
                                if let Err(e) = out.play(clip) {
                                    error!("Failed to play notification sound: {e}");
                                }
                            }
                        }
                        AudioCommand::Stop => {
                            if let Some(out) = output.as_mut() {
                                out.stop();
                            }
                        }
                    }
                }

                debug!("Audio engine thread shutting down");
            })
            .map_err(|e| e.to_string())?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    fn send(&self, cmd: AudioCommand) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(cmd).map_err(|e| e.to_string())
    }

    pub(crate) fn load(&self, clip: Option<Clip>) -> Result<(), String> {
        self.send(AudioCommand::Load(clip))
    }

    pub fn play(&self) -> Result<(), String> {
        self.send(AudioCommand::Play)
    }

    pub fn stop(&self) -> Result<(), String> {
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(AudioCommand::Stop);
        }
        Ok(())
    }
}

impl Default for AudioEngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Notification player backed by the audio engine.
///
/// Built-in sounds are synthesized. When a sounds directory is configured and
/// contains the sound's file (e.g. `Bell.wav`), that file is decoded instead.
pub struct ChimeNotifier {
    engine: AudioEngineHandle,
    store: SharedStore,
    sounds_dir: Option<PathBuf>,
    current: Mutex<SoundId>,
    loads: AtomicU64,
}

impl ChimeNotifier {
    /// Restores the saved selection (default `Alarm1`) and loads it.
    pub fn new(store: SharedStore, sounds_dir: Option<PathBuf>) -> Self {
        let initial = read_parsed::<SoundId>(store.as_ref(), KEY_NOTIFICATION_SOUND).unwrap_or_default();

        let notifier = Self {
            engine: AudioEngineHandle::new(),
            store,
            sounds_dir,
            current: Mutex::new(initial),
            loads: AtomicU64::new(0),
        };
        notifier.load(initial);
        notifier
    }

    pub fn current_sound(&self) -> SoundId {
        *self.current.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// How many times a sound resource has been (re)loaded.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }

    fn load(&self, sound: SoundId) {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let clip = self.resolve_clip(sound);
        if let Err(e) = self.engine.load(clip) {
            error!("Failed to hand {sound} to the audio engine: {e}");
        }
    }

    fn resolve_clip(&self, sound: SoundId) -> Option<Clip> {
        let Some(dir) = self.sounds_dir.as_ref() else {
            return Some(Clip::Chime(sound));
        };

        let path = dir.join(sound.file_name());
        if !path.exists() {
            debug!("{} not found; using built-in {sound} chime", path.display());
            return Some(Clip::Chime(sound));
        }

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to load sound {}: {e}", path.display());
                return None;
            }
        };

        if let Err(e) = output::probe(&bytes) {
            error!("Failed to load sound {}: {e}", path.display());
            return None;
        }

        info!("Loaded notification sound from {}", path.display());
        Some(Clip::Encoded {
            path,
            bytes: Arc::new(bytes),
        })
    }
}

impl SoundNotifier for ChimeNotifier {
    fn play(&self) {
        if let Err(e) = self.engine.play() {
            error!("Failed to play notification sound: {e}");
        }
    }

    fn set_sound(&self, sound: SoundId) {
        write_logged(self.store.as_ref(), KEY_NOTIFICATION_SOUND, &sound.path());

        let changed = {
            let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
            let changed = *current != sound;
            *current = sound;
            changed
        };

        if changed {
            self.load(sound);
        }
    }
}

impl Drop for ChimeNotifier {
    fn drop(&mut self) {
        let _ = self.engine.stop();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};
    use tempfile::TempDir;

    #[test]
    fn test_sound_id_parsing() {
        assert_eq!("/sounds/Alarm1.wav".parse::<SoundId>().unwrap(), SoundId::Alarm1);
        assert_eq!("bell".parse::<SoundId>().unwrap(), SoundId::Bell);
        assert_eq!("DIGITAL.WAV".parse::<SoundId>().unwrap(), SoundId::Digital);
        assert!("/sounds/Kazoo.wav".parse::<SoundId>().is_err());

        for sound in SoundId::ALL {
            assert_eq!(sound.path().parse::<SoundId>().unwrap(), sound);
        }
    }

    #[test]
    fn test_notifier_restores_saved_sound() {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY_NOTIFICATION_SOUND, "/sounds/Bell.wav").unwrap();

        let notifier = ChimeNotifier::new(store.clone(), None);
        assert_eq!(notifier.current_sound(), SoundId::Bell);
    }

    #[test]
    fn test_notifier_falls_back_on_unknown_sound() {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY_NOTIFICATION_SOUND, "https://example.com/horn.mp3").unwrap();

        let notifier = ChimeNotifier::new(store.clone(), None);
        assert_eq!(notifier.current_sound(), SoundId::Alarm1);
    }

    #[test]
    fn test_set_sound_persists_and_reloads_only_on_change() {
        let store = Arc::new(MemoryStore::new());
        let notifier = ChimeNotifier::new(store.clone(), None);
        assert_eq!(notifier.load_count(), 1);

        notifier.set_sound(SoundId::Alarm1);
        assert_eq!(notifier.load_count(), 1);
        assert_eq!(
            store.get(KEY_NOTIFICATION_SOUND).unwrap().as_deref(),
            Some("/sounds/Alarm1.wav")
        );

        notifier.set_sound(SoundId::Digital);
        assert_eq!(notifier.load_count(), 2);
        assert_eq!(notifier.current_sound(), SoundId::Digital);
        assert_eq!(
            store.get(KEY_NOTIFICATION_SOUND).unwrap().as_deref(),
            Some("/sounds/Digital.wav")
        );

        // Playback failures are logged, never raised.
        notifier.play();
    }

    #[test]
    fn test_resolve_clip_prefers_sound_files() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("Bell.wav"), b"RIFF").unwrap();

        let store = Arc::new(MemoryStore::new());
        let notifier = ChimeNotifier::new(store, Some(dir.path().to_path_buf()));

        assert!(matches!(
            notifier.resolve_clip(SoundId::Alarm2),
            Some(Clip::Chime(SoundId::Alarm2))
        ));

        let bell = notifier.resolve_clip(SoundId::Bell);
        if cfg!(feature = "audio") {
            // Four bytes are not a decodable WAV file.
            assert!(bell.is_none());
        } else {
            assert!(matches!(bell, Some(Clip::Encoded { .. })));
        }
    }
}
