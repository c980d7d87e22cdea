//! PTY spawning and I/O management.

use std::io::{Read, Write};
use std::sync::{Arc, RwLock};

use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, PtySize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::pane::PaneSize;
use crate::session::SessionEvent;

/// Events emitted by pane processes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaneEvent {
    /// New output was fed into the pane's screen.
    Output { index: usize },

    /// The program rang the bell.
    Bell { index: usize },

    /// Process exited with the given code.
    Exited {
        index: usize,
        generation: u64,
        code: i32,
    },

    /// Waiting for the process failed.
    Crashed {
        index: usize,
        generation: u64,
        error: String,
    },
}

/// Everything a spawner needs to start one pane process.
pub struct SpawnRequest {
    /// 1-based pane index.
    pub index: usize,
    /// Identifies this incarnation of the pane's process.
    pub generation: u64,
    /// Shell command line.
    pub command: String,
    /// Initial PTY size.
    pub size: PaneSize,
    /// Screen the output is fed into.
    pub screen: Arc<RwLock<vt100::Parser>>,
    /// Queue for output and exit events.
    pub events: mpsc::Sender<SessionEvent>,
}

/// Starts pane processes.
pub trait Spawner: Send {
    /// Spawn the command described by `request`.
    ///
    /// # Errors
    /// Returns an error if the process cannot be started.
    fn spawn(&self, request: SpawnRequest) -> Result<Box<dyn PaneProcess>>;
}

/// A live process attached to a pane.
pub trait PaneProcess: Send {
    /// Resize the terminal the process sees.
    ///
    /// # Errors
    /// Returns an error if the resize fails.
    fn resize(&self, size: PaneSize) -> Result<()>;

    /// Write bytes to the process's terminal input.
    ///
    /// # Errors
    /// Returns an error if the input channel is closed or full.
    fn send_input(&self, data: &[u8]) -> Result<()>;

    /// Kill the process, best effort.
    fn kill(&mut self);

    /// OS process id, if known.
    fn pid(&self) -> Option<u32>;
}

/// Spawns commands through the platform shell inside a native PTY.
#[derive(Clone, Copy, Debug, Default)]
pub struct PtySpawner;

impl Spawner for PtySpawner {
    fn spawn(&self, request: SpawnRequest) -> Result<Box<dyn PaneProcess>> {
        Ok(Box::new(spawn_pty(request)?))
    }
}

/// A process running in a native PTY.
pub(crate) struct PtyProcess {
    /// PTY master for resize operations.
    pty_master: Box<dyn portable_pty::MasterPty + Send>,
    /// Kills the child.
    killer: Box<dyn ChildKiller + Send + Sync>,
    /// Channel to the writer task.
    input_tx: mpsc::Sender<Vec<u8>>,
    /// Child process id.
    pid: Option<u32>,
    /// Handle to the reader task.
    reader_handle: JoinHandle<()>,
    /// Handle to the writer task.
    writer_handle: JoinHandle<()>,
    /// Handle to the process monitor task.
    monitor_handle: JoinHandle<()>,
}

impl PaneProcess for PtyProcess {
    fn resize(&self, size: PaneSize) -> Result<()> {
        resize_pty(self.pty_master.as_ref(), size)
    }

    fn send_input(&self, data: &[u8]) -> Result<()> {
        self.input_tx
            .try_send(data.to_vec())
            .map_err(|_| Error::InputSend)
    }

    fn kill(&mut self) {
        if let Err(e) = self.killer.kill() {
            tracing::debug!("kill failed for pid {:?}: {}", self.pid, e);
        }
        self.reader_handle.abort();
        self.writer_handle.abort();
        self.monitor_handle.abort();
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}

/// Build the shell invocation for a command line.
pub(crate) fn shell_command(command: &str) -> CommandBuilder {
    let mut cmd = if cfg!(windows) {
        let mut builder = CommandBuilder::new("cmd.exe");
        builder.args(["/d", "/s", "/c", command]);
        builder
    } else {
        let mut builder = CommandBuilder::new("sh");
        builder.args(["-c", command]);
        builder
    };
    if let Ok(cwd) = std::env::current_dir() {
        cmd.cwd(cwd);
    }
    cmd
}

/// Spawns a new PTY process.
///
/// # Errors
/// Returns an error if PTY creation or process spawning fails.
pub(crate) fn spawn_pty(request: SpawnRequest) -> Result<PtyProcess> {
    let SpawnRequest {
        index,
        generation,
        command,
        size,
        screen,
        events,
    } = request;

    let pty_system = native_pty_system();

    // Create PTY pair
    let pty_pair = pty_system
        .openpty(PtySize {
            rows: size.rows,
            cols: size.cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| Error::PtyCreate(e.to_string()))?;

    // Spawn the child process
    let child = pty_pair.slave.spawn_command(shell_command(&command))?;
    let pid = child.process_id();
    let killer = child.clone_killer();
    tracing::info!("pane {} spawned {:?} (pid {:?})", index, command, pid);

    let (input_tx, input_rx) = mpsc::channel::<Vec<u8>>(256);

    let reader_handle = spawn_reader_task(
        index,
        pty_pair.master.try_clone_reader()?,
        screen,
        events.clone(),
    );
    let writer_handle = spawn_writer_task(pty_pair.master.take_writer()?, input_rx);
    let monitor_handle = spawn_monitor_task(index, generation, child, events);

    Ok(PtyProcess {
        pty_master: pty_pair.master,
        killer,
        input_tx,
        pid,
        reader_handle,
        writer_handle,
        monitor_handle,
    })
}

/// Resize a PTY.
///
/// # Errors
/// Returns an error if the resize operation fails.
pub(crate) fn resize_pty(pty_master: &dyn portable_pty::MasterPty, size: PaneSize) -> Result<()> {
    pty_master
        .resize(PtySize {
            rows: size.rows,
            cols: size.cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| Error::Resize(e.to_string()))
}

/// Spawns the task that reads PTY output.
fn spawn_reader_task(
    index: usize,
    mut reader: Box<dyn Read + Send>,
    screen: Arc<RwLock<vt100::Parser>>,
    event_tx: mpsc::Sender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 4096];

        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let rang = {
                        let mut screen = screen.write().expect("screen lock poisoned");
                        let bells = screen.screen().audible_bell_count();
                        screen.process(&buf[..n]);
                        screen.screen().audible_bell_count() != bells
                    };

                    if event_tx
                        .blocking_send(SessionEvent::Pane(PaneEvent::Output { index }))
                        .is_err()
                    {
                        break;
                    }
                    if rang {
                        let _ = event_tx.blocking_send(SessionEvent::Pane(PaneEvent::Bell { index }));
                    }
                }
                Err(e) => {
                    tracing::debug!("PTY read error for pane {}: {}", index, e);
                    break;
                }
            }
        }

        tracing::debug!("Reader task for pane {} finished", index);
    })
}

/// Spawns the task that writes to PTY.
fn spawn_writer_task(
    mut writer: Box<dyn Write + Send>,
    mut input_rx: mpsc::Receiver<Vec<u8>>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while let Some(data) = input_rx.blocking_recv() {
            if let Err(e) = writer.write_all(&data) {
                tracing::debug!("PTY write error: {}", e);
                break;
            }
            if let Err(e) = writer.flush() {
                tracing::debug!("PTY flush error: {}", e);
                break;
            }
        }

        tracing::debug!("Writer task finished");
    })
}

/// Spawns the task that waits for the process to exit.
fn spawn_monitor_task(
    index: usize,
    generation: u64,
    mut child: Box<dyn portable_pty::Child + Send + Sync>,
    event_tx: mpsc::Sender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let event = match child.wait() {
            #[allow(clippy::cast_possible_wrap)]
            Ok(status) => PaneEvent::Exited {
                index,
                generation,
                code: status.exit_code() as i32,
            },
            Err(e) => PaneEvent::Crashed {
                index,
                generation,
                error: e.to_string(),
            },
        };
        let _ = event_tx.blocking_send(SessionEvent::Pane(event));

        tracing::debug!("Monitor task for pane {} finished", index);
    })
}
