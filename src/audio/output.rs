//! Speaker output through rodio. Headless builds without the `audio` feature
//! report that output is unavailable and the engine logs it.

use std::{path::PathBuf, sync::Arc};

use super::SoundId;

/// A loaded notification sound, ready to hand to the output.
#[derive(Debug, Clone)]
#[cfg_attr(not(feature = "audio"), allow(dead_code))]
pub enum Clip {
    Chime(SoundId),
    Encoded { path: PathBuf, bytes: Arc<Vec<u8>> },
}

#[cfg(feature = "audio")]
mod imp {
    use std::io::Cursor;

    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

    use super::Clip;
    use crate::audio::chime::Chime;

    pub struct Output {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        sink: Option<Sink>,
    }

    impl Output {
        pub fn open() -> Result<Self, String> {
            let (stream, handle) = OutputStream::try_default()
                .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
            Ok(Self {
                _stream: stream,
                handle,
                sink: None,
            })
        }

        pub fn play(&mut self, clip: &Clip) -> Result<(), String> {
            if let Some(old) = self.sink.take() {
                old.stop();
            }

            let sink = Sink::try_new(&self.handle)
                .map_err(|e| format!("Failed to create audio sink: {}", e))?;

            match clip {
                Clip::Chime(sound) => sink.append(Chime::new(*sound)),
                Clip::Encoded { path, bytes } => {
                    let decoder = Decoder::new(Cursor::new(bytes.as_ref().clone()))
                        .map_err(|e| format!("Failed to decode {}: {}", path.display(), e))?;
                    sink.append(decoder);
                }
            }

            sink.play();
            self.sink = Some(sink);
            Ok(())
        }

        pub fn stop(&mut self) {
            if let Some(old) = self.sink.take() {
                old.stop();
            }
        }
    }

    /// Checks that `bytes` is a format the decoder understands.
    pub fn probe(bytes: &[u8]) -> Result<(), String> {
        Decoder::new(Cursor::new(bytes.to_vec()))
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

#[cfg(not(feature = "audio"))]
mod imp {
    use super::Clip;

    const DISABLED: &str = "audio output unavailable (built with --no-default-features)";

    pub struct Output;

    impl Output {
        pub fn open() -> Result<Self, String> {
            Err(DISABLED.to_string())
        }

        pub fn play(&mut self, _clip: &Clip) -> Result<(), String> {
            Err(DISABLED.to_string())
        }

        pub fn stop(&mut self) {}
    }

    pub fn probe(_bytes: &[u8]) -> Result<(), String> {
        Ok(())
    }
}

pub use imp::{probe, Output};
