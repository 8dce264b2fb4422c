//! Spawned external capture process emitting F32LE stereo PCM on stdout

use super::decode::{consumed_bytes, decode_f32le_stereo};
use super::source::{CaptureSource, CaptureState};
use super::types::{AudioBuffer, CaptureSourceId};
use bytes::{Buf, BytesMut};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// Bytes per interleaved stereo f32 pair
const PAIR_BYTES: usize = 8;

/// Ring capacity in mono samples (~250ms at 192kHz)
const BUFFER_SIZE: usize = 192000 / 4;

/// Delay before respawning an exited or failed capture child
const RESPAWN_DELAY: Duration = Duration::from_secs(5);

/// Capture source backed by an external demodulator/capture binary.
///
/// The child is spawned with the sample rate as its only argument and
/// writes interleaved stereo f32le PCM to stdout. Stderr lines are
/// logged; an exited child is respawned after a fixed delay.
pub struct ProcessCapture {
    id: CaptureSourceId,
    state: Arc<CaptureState>,
    command: String,
    sample_rate: u32,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ProcessCapture {
    pub fn new(command: &str, sample_rate: u32) -> Self {
        let state = Arc::new(CaptureState::new(BUFFER_SIZE, sample_rate, 1));
        Self {
            id: CaptureSourceId::Process(command.to_string()),
            state,
            command: command.to_string(),
            sample_rate,
            task: Mutex::new(None),
        }
    }

    async fn run_loop(state: Arc<CaptureState>, command: String, sample_rate: u32) {
        while state.is_running() {
            let mut child = match Command::new(&command)
                .arg(sample_rate.to_string())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
            {
                Ok(child) => child,
                Err(e) => {
                    tracing::error!("Failed to spawn capture process '{}': {}", command, e);
                    tokio::time::sleep(RESPAWN_DELAY).await;
                    continue;
                }
            };

            tracing::info!("Capture process '{}' started at {}Hz", command, sample_rate);

            if let Some(stderr) = child.stderr.take() {
                let cmd = command.clone();
                tokio::spawn(async move {
                    let mut lines = BufReader::new(stderr).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        tracing::warn!("[{}] {}", cmd, line);
                    }
                });
            }

            let Some(mut stdout) = child.stdout.take() else {
                tracing::error!("Capture process has no stdout pipe");
                tokio::time::sleep(RESPAWN_DELAY).await;
                continue;
            };

            // Carry-over buffer: partial trailing pairs wait for the next read
            let mut pending = BytesMut::with_capacity(16 * 1024);
            let mut chunk = [0u8; 8192];

            loop {
                if !state.is_running() {
                    let _ = child.kill().await;
                    return;
                }

                match stdout.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => {
                        pending.extend_from_slice(&chunk[..n]);
                        let complete = consumed_bytes(pending.len(), PAIR_BYTES);
                        if complete > 0 {
                            let mono = decode_f32le_stereo(&pending[..complete]);
                            pending.advance(complete);
                            if let Ok(mut buffer) = state.buffer.lock() {
                                buffer.write(&mono);
                            }
                            state.set_active(true);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Capture stdout read error: {}", e);
                        break;
                    }
                }
            }

            state.set_active(false);
            let status = child.wait().await;
            if state.is_running() {
                tracing::warn!(
                    "Capture process exited ({:?}), respawning in {}s",
                    status,
                    RESPAWN_DELAY.as_secs()
                );
                tokio::time::sleep(RESPAWN_DELAY).await;
            }
        }
    }
}

impl CaptureSource for ProcessCapture {
    fn id(&self) -> &CaptureSourceId {
        &self.id
    }

    fn display_name(&self) -> String {
        format!("Capture: {}", self.command)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u32 {
        1
    }

    fn is_active(&self) -> bool {
        self.state.is_active()
    }

    fn take_samples(&self) -> Option<AudioBuffer> {
        self.state.drain()
    }

    fn start(&self) -> Result<(), String> {
        self.state.set_running(true);

        let state = Arc::clone(&self.state);
        let command = self.command.clone();
        let sample_rate = self.sample_rate;
        let handle = tokio::spawn(Self::run_loop(state, command, sample_rate));

        if let Ok(mut guard) = self.task.lock() {
            *guard = Some(handle);
        }
        Ok(())
    }

    fn stop(&self) {
        self.state.set_running(false);
        self.state.set_active(false);

        if let Ok(mut guard) = self.task.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}
