//! Looping background track.
//!
//! The track starts paused and is toggled with a single play/pause switch.
//! A track that fails to open leaves the card silent; nothing else depends
//! on audio.

use crate::error::{Result, TreeError};
use log::{info, warn};
use std::path::Path;

pub const MUSIC_VOLUME: f32 = 0.5;

/// A loaded, looping track that can be paused and resumed
pub trait Track {
    fn play(&mut self);
    fn pause(&mut self);
}

/// Background music state
#[derive(Default)]
pub struct Music {
    track: Option<Box<dyn Track>>,
    playing: bool,
}

impl Music {
    /// No track at all; toggling does nothing
    pub fn silent() -> Self {
        Music::default()
    }

    /// Wraps an already opened track, paused
    pub fn with_track(mut track: Box<dyn Track>) -> Self {
        track.pause();
        Music {
            track: Some(track),
            playing: false,
        }
    }

    /// Opens `path` if given. Failures are logged and leave the music off.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Music::silent();
        };
        match open_track(path) {
            Ok(track) => {
                info!("background music: {}", path.display());
                Music::with_track(track)
            }
            Err(e) => {
                warn!("background music {} unavailable: {e}", path.display());
                Music::silent()
            }
        }
    }

    pub fn has_track(&self) -> bool {
        self.track.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Flips between playing and paused. Returns whether music is now playing.
    pub fn toggle(&mut self) -> bool {
        let Some(track) = self.track.as_mut() else {
            return false;
        };
        self.playing = !self.playing;
        if self.playing {
            track.play();
        } else {
            track.pause();
        }
        self.playing
    }

    /// Pauses playback, if any
    pub fn stop(&mut self) {
        if let Some(track) = self.track.as_mut() {
            track.pause();
        }
        self.playing = false;
    }
}

impl std::fmt::Debug for Music {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Music")
            .field("has_track", &self.has_track())
            .field("playing", &self.playing)
            .finish()
    }
}

#[cfg(feature = "audio")]
fn open_track(path: &Path) -> Result<Box<dyn Track>> {
    Ok(Box::new(rodio_track::RodioTrack::open(path)?))
}

#[cfg(not(feature = "audio"))]
fn open_track(_path: &Path) -> Result<Box<dyn Track>> {
    Err(TreeError::Audio(
        "built without the `audio` feature".to_string(),
    ))
}

#[cfg(feature = "audio")]
mod rodio_track {
    use super::{Track, MUSIC_VOLUME};
    use crate::error::{Result, TreeError};
    use rodio::{Decoder, OutputStream, Sink};
    use std::fs::File;
    use std::io::BufReader;
    use std::path::Path;

    /// Decoded file playing through the default output device
    pub struct RodioTrack {
        sink: Sink,
        // Dropping the stream silences the sink
        _stream: OutputStream,
    }

    impl RodioTrack {
        pub fn open(path: &Path) -> Result<Self> {
            let file = BufReader::new(File::open(path)?);
            let source =
                Decoder::new_looped(file).map_err(|e| TreeError::Audio(e.to_string()))?;
            let (stream, handle) =
                OutputStream::try_default().map_err(|e| TreeError::Audio(e.to_string()))?;
            let sink = Sink::try_new(&handle).map_err(|e| TreeError::Audio(e.to_string()))?;
            sink.pause();
            sink.set_volume(MUSIC_VOLUME);
            sink.append(source);
            Ok(RodioTrack {
                sink,
                _stream: stream,
            })
        }
    }

    impl Track for RodioTrack {
        fn play(&mut self) {
            self.sink.play();
        }

        fn pause(&mut self) {
            self.sink.pause();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every play/pause call
    struct Recorder(Rc<RefCell<Vec<&'static str>>>);

    impl Track for Recorder {
        fn play(&mut self) {
            self.0.borrow_mut().push("play");
        }

        fn pause(&mut self) {
            self.0.borrow_mut().push("pause");
        }
    }

    #[test]
    fn toggle_plays_and_pauses() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut music = Music::with_track(Box::new(Recorder(calls.clone())));
        assert!(!music.is_playing());

        assert!(music.toggle());
        assert!(!music.toggle());
        assert!(music.toggle());
        music.stop();
        assert!(!music.is_playing());
        assert_eq!(*calls.borrow(), vec!["pause", "play", "pause", "play", "pause"]);
    }

    #[test]
    fn silent_music_never_plays() {
        let mut music = Music::silent();
        assert!(!music.toggle());
        assert!(!music.is_playing());
    }

    #[test]
    fn missing_file_leaves_music_off() {
        let mut music = Music::load(Some(Path::new("/definitely/not/here.mp3")));
        assert!(!music.has_track());
        assert!(!music.toggle());
        assert!(!Music::load(None).has_track());
    }
}
