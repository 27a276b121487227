// THEORY:
// The engine never talks to a sound device directly. It holds an `AudioService`, a
// cheap clonable handle over a single `AudioBackend`, created once at process start
// and shut down at exit.
//
// Key architectural principles:
// 1.  **Busy Tracking**: The service remembers which looping channels are playing, so
//     `start_alarm` on a ringing alarm, or `stop_music` on silence, is a no-op.
// 2.  **Swallowed Failures**: A backend error is logged and forgotten. Sound is never
//     allowed to disturb the session.

use crate::error::FocusError;
use log::{debug, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Independent mixer channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioChannel {
    Music,
    Alarm,
    /// One-shot effects; never tracked as busy.
    Sfx,
}

/// Sounds the engine knows how to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    Music,
    Alarm,
    Cheer,
}

/// A sound device, or anything pretending to be one.
pub trait AudioBackend: Send {
    fn play(&mut self, channel: AudioChannel, cue: Cue, looped: bool) -> Result<(), FocusError>;
    fn stop(&mut self, channel: AudioChannel) -> Result<(), FocusError>;
}

/// Backend that plays nothing.
pub struct SilentBackend;

impl AudioBackend for SilentBackend {
    fn play(&mut self, _channel: AudioChannel, _cue: Cue, _looped: bool) -> Result<(), FocusError> {
        Ok(())
    }

    fn stop(&mut self, _channel: AudioChannel) -> Result<(), FocusError> {
        Ok(())
    }
}

struct Mixer {
    backend: Box<dyn AudioBackend>,
    busy: HashSet<AudioChannel>,
    closed: bool,
}

impl Mixer {
    fn start_looped(&mut self, channel: AudioChannel, cue: Cue) {
        if self.closed || self.busy.contains(&channel) {
            return;
        }
        match self.backend.play(channel, cue, true) {
            Ok(()) => {
                self.busy.insert(channel);
            }
            Err(e) => warn!("could not start {cue:?} on {channel:?}: {e}"),
        }
    }

    fn stop(&mut self, channel: AudioChannel) {
        if !self.busy.remove(&channel) {
            return;
        }
        if let Err(e) = self.backend.stop(channel) {
            warn!("could not stop {channel:?}: {e}");
        }
    }
}

/// Shared handle to the process-wide mixer.
#[derive(Clone)]
pub struct AudioService {
    mixer: Arc<Mutex<Mixer>>,
}

impl AudioService {
    pub fn new(backend: impl AudioBackend + 'static) -> Self {
        Self {
            mixer: Arc::new(Mutex::new(Mixer {
                backend: Box::new(backend),
                busy: HashSet::new(),
                closed: false,
            })),
        }
    }

    pub fn silent() -> Self {
        Self::new(SilentBackend)
    }

    pub fn play_music(&self) {
        self.with_mixer(|mixer| mixer.start_looped(AudioChannel::Music, Cue::Music));
    }

    pub fn stop_music(&self) {
        self.with_mixer(|mixer| mixer.stop(AudioChannel::Music));
    }

    pub fn start_alarm(&self) {
        self.with_mixer(|mixer| mixer.start_looped(AudioChannel::Alarm, Cue::Alarm));
    }

    pub fn stop_alarm(&self) {
        self.with_mixer(|mixer| mixer.stop(AudioChannel::Alarm));
    }

    /// Plays `cue` once on the effects channel.
    pub fn play_sfx(&self, cue: Cue) {
        self.with_mixer(|mixer| {
            if mixer.closed {
                return;
            }
            if let Err(e) = mixer.backend.play(AudioChannel::Sfx, cue, false) {
                warn!("could not play {cue:?}: {e}");
            }
        });
    }

    pub fn is_playing(&self, channel: AudioChannel) -> bool {
        self.with_mixer(|mixer| mixer.busy.contains(&channel))
    }

    /// Silences every channel and turns later calls into no-ops.
    pub fn shutdown(&self) {
        self.with_mixer(|mixer| {
            let busy: Vec<_> = mixer.busy.iter().copied().collect();
            for channel in busy {
                mixer.stop(channel);
            }
            mixer.closed = true;
            debug!("audio service shut down");
        });
    }

    fn with_mixer<R>(&self, f: impl FnOnce(&mut Mixer) -> R) -> R {
        let mut mixer = self.mixer.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut mixer)
    }
}
