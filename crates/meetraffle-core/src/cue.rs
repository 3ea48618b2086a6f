// Audio cue played when a draw starts.
//
// Playback is fire-and-forget: the draw never waits on the player and a
// failing player only produces a warning.

use std::io::Read;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Audio bytes in whatever format the player understands.
#[derive(Debug, Clone)]
pub struct AudioCue {
    bytes: Arc<[u8]>,
}

impl AudioCue {
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        AudioCue {
            bytes: bytes.into(),
        }
    }

    pub fn from_reader<R: Read>(mut rdr: R) -> std::io::Result<Self> {
        let mut buf = Vec::new();
        rdr.read_to_end(&mut buf)?;
        Ok(Self::from_bytes(buf))
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        std::fs::File::open(path).and_then(Self::from_reader)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Collaborator that plays the cue. Implementations must return without
/// waiting for playback and must not panic on playback failure.
pub trait CuePlayer: Send + Sync {
    fn play(&self, cue: AudioCue);
}

/// Plays nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentCuePlayer;

impl CuePlayer for SilentCuePlayer {
    fn play(&self, cue: AudioCue) {
        debug!("audio cue of {} bytes skipped (silent player)", cue.len());
    }
}

/// Pipes the cue into an external player process (`aplay -`, `ffplay -`, ...).
///
/// Must be called from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct CommandCuePlayer {
    program: String,
    args: Vec<String>,
}

impl CommandCuePlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        CommandCuePlayer {
            program: program.into(),
            args,
        }
    }

    /// Build from a `[program, args...]` list. Returns `None` when empty.
    pub fn from_command_line(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

impl CuePlayer for CommandCuePlayer {
    fn play(&self, cue: AudioCue) {
        let mut child = match tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!("failed to start cue player `{}`: {}", self.program, e);
                return;
            }
        };

        let program = self.program.clone();
        tokio::spawn(async move {
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(e) = stdin.write_all(cue.as_bytes()).await {
                    warn!("failed to send audio cue to `{}`: {}", program, e);
                }
                // Close stdin so the player sees end of input.
                drop(stdin);
            }
            match child.wait().await {
                Ok(status) if status.success() => debug!("cue player `{}` finished", program),
                Ok(status) => warn!("cue player `{}` exited with {}", program, status),
                Err(e) => warn!("failed to wait for cue player `{}`: {}", program, e),
            }
        });
    }
}
