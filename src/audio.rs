use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use thiserror::Error;

use crate::config::{AudioProvider, Settings};
use crate::LETTERS;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("no speech command available (tried {0})")]
    NoSpeech(String),
    #[error("no recorded sounds found in {0}")]
    NoRecordings(PathBuf),
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Plays the letter cue for each step.
///
/// Preload may block and may fail; callers treat failure as a degraded but
/// playable session. Playback is fire-and-forget.
pub trait AudioOutput {
    fn preload(&mut self, settings: &Settings) -> Result<(), AudioError>;
    fn play(&mut self, token: char, settings: &Settings);
}

/// No sound at all
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudio;

impl AudioOutput for SilentAudio {
    fn preload(&mut self, _settings: &Settings) -> Result<(), AudioError> {
        Ok(())
    }

    fn play(&mut self, _token: char, _settings: &Settings) {}
}

/// Test double that remembers what it was asked to do
#[derive(Debug, Default, Clone)]
pub struct RecordingAudio {
    pub preloads: usize,
    pub played: Vec<char>,
    pub fail_preload: bool,
}

impl AudioOutput for RecordingAudio {
    fn preload(&mut self, _settings: &Settings) -> Result<(), AudioError> {
        self.preloads += 1;
        if self.fail_preload {
            return Err(AudioError::NoSpeech("test".into()));
        }
        Ok(())
    }

    fn play(&mut self, token: char, _settings: &Settings) {
        self.played.push(token);
    }
}

#[cfg(target_os = "macos")]
const SPEECH_PROGRAMS: &[&str] = &["say"];
#[cfg(not(target_os = "macos"))]
const SPEECH_PROGRAMS: &[&str] = &["espeak-ng", "espeak", "spd-say"];

#[cfg(target_os = "macos")]
const PLAYER_PROGRAM: &str = "afplay";
#[cfg(not(target_os = "macos"))]
const PLAYER_PROGRAM: &str = "aplay";

/// Path of the recording for `letter` inside `dir`, e.g. `dir/c.wav`
pub fn recording_path(dir: &Path, letter: char) -> PathBuf {
    dir.join(format!("{}.wav", letter.to_ascii_lowercase()))
}

/// Audio through external programs: a wav player for recorded letters and
/// a speech synthesizer otherwise.
///
/// Recorded mode falls back to speech for any letter whose file is missing.
/// A new cue cuts off the previous one.
#[derive(Debug, Default)]
pub struct CommandAudio {
    sounds_dir: Option<PathBuf>,
    recordings: HashMap<char, PathBuf>,
    speech: Option<&'static str>,
    speech_probed: bool,
    current: Option<Child>,
}

impl CommandAudio {
    pub fn new(sounds_dir: Option<PathBuf>) -> Self {
        Self {
            sounds_dir,
            recordings: HashMap::new(),
            speech: None,
            speech_probed: false,
            current: None,
        }
    }

    pub fn recordings(&self) -> &HashMap<char, PathBuf> {
        &self.recordings
    }

    fn preload_recordings(&mut self) -> Result<(), AudioError> {
        let Some(dir) = self.sounds_dir.clone() else {
            return Err(AudioError::NoRecordings(PathBuf::from("<unset>")));
        };

        for &letter in LETTERS.iter() {
            if self.recordings.contains_key(&letter) {
                continue;
            }
            let path = recording_path(&dir, letter);
            if path.is_file() {
                self.recordings.insert(letter, path);
            } else {
                tracing::warn!(%letter, path = %path.display(), "missing recording, letter will be spoken");
            }
        }

        if self.recordings.is_empty() {
            return Err(AudioError::NoRecordings(dir));
        }
        Ok(())
    }

    fn probe_speech(&mut self) -> Result<&'static str, AudioError> {
        if !self.speech_probed {
            self.speech_probed = true;
            self.speech = SPEECH_PROGRAMS.iter().copied().find(|program| {
                Command::new(program)
                    .arg("--version")
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .is_ok()
            });
        }
        self.speech
            .ok_or_else(|| AudioError::NoSpeech(SPEECH_PROGRAMS.join(", ")))
    }

    fn stop_current(&mut self) {
        if let Some(mut child) = self.current.take() {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }

    fn launch(&mut self, mut cmd: Command) -> Result<(), AudioError> {
        let program = cmd.get_program().to_string_lossy().into_owned();
        let child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| AudioError::Spawn { program, source })?;
        self.current = Some(child);
        Ok(())
    }

    fn speak(&mut self, token: char, settings: &Settings) -> Result<(), AudioError> {
        let program = self.probe_speech()?;
        let mut cmd = Command::new(program);
        if let Some(voice) = settings.tts_voice.as_deref() {
            match program {
                "spd-say" => cmd.args(["-y", voice]),
                _ => cmd.args(["-v", voice]),
            };
        }
        cmd.arg(token.to_string());
        self.launch(cmd)
    }
}

impl AudioOutput for CommandAudio {
    fn preload(&mut self, settings: &Settings) -> Result<(), AudioError> {
        match settings.audio_provider {
            AudioProvider::Recorded => match self.preload_recordings() {
                Ok(()) => Ok(()),
                // recorded mode can still speak
                Err(e) => self.probe_speech().map(|_| ()).map_err(|_| e),
            },
            AudioProvider::Tts => self.probe_speech().map(|_| ()),
        }
    }

    fn play(&mut self, token: char, settings: &Settings) {
        self.stop_current();

        if settings.audio_provider == AudioProvider::Recorded {
            if let Some(path) = self.recordings.get(&token).cloned() {
                let mut cmd = Command::new(PLAYER_PROGRAM);
                #[cfg(not(target_os = "macos"))]
                cmd.arg("-q");
                cmd.arg(path);
                match self.launch(cmd) {
                    Ok(()) => return,
                    Err(e) => tracing::warn!("recorded playback failed, speaking instead: {e}"),
                }
            }
        }

        if let Err(e) = self.speak(token, settings) {
            tracing::debug!(%token, "no audio cue: {e}");
        }
    }
}

impl Drop for CommandAudio {
    fn drop(&mut self) {
        self.stop_current();
    }
}
