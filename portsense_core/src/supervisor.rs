//! Background tick loop.
//!
//! Spawns a thread that owns the `PortManager`, ticks it at the configured
//! period and publishes events over a bounded channel. Status queries and
//! mode changes travel over a command channel and are served between ticks,
//! so the machine is never touched from two threads.
//!
//! The thread is stopped and joined when the `Supervisor` is dropped; on the
//! way out it shuts the manager down (detach everything, float every port).
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel as xch;
use portsense_traits::clock::Clock;

use crate::error::PortError;
use crate::events::PortEvent;
use crate::family::PortIo;
use crate::manager::PortManager;
use crate::status::PortStatus;

const EVENT_BACKLOG: usize = 256;

enum Command {
    Status(xch::Sender<Vec<PortStatus>>),
    SetMode {
        port: String,
        mode: String,
        reply: xch::Sender<Result<(), PortError>>,
    },
}

pub struct Supervisor {
    commands: xch::Sender<Command>,
    events: xch::Receiver<PortEvent>,
    ticks: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl Supervisor {
    pub fn spawn<B, C>(mut manager: PortManager<B>, clock: C) -> Self
    where
        B: PortIo + Send + 'static,
        C: Clock + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = xch::unbounded::<Command>();
        let (ev_tx, ev_rx) = xch::bounded(EVENT_BACKLOG);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let ticks = Arc::new(AtomicU64::new(0));
        let ticks_clone = ticks.clone();
        let dropped = Arc::new(AtomicU64::new(0));
        let dropped_clone = dropped.clone();
        let period = manager.timing().poll;

        let join_handle = std::thread::spawn(move || {
            let publish = |ev: PortEvent| {
                if ev_tx.try_send(ev).is_err() {
                    dropped_clone.fetch_add(1, Ordering::Relaxed);
                }
            };
            let mut next = clock.now();
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("supervisor received shutdown signal");
                    break;
                }
                for cmd in cmd_rx.try_iter() {
                    match cmd {
                        Command::Status(reply) => {
                            let _ = reply.send(manager.statuses());
                        }
                        Command::SetMode { port, mode, reply } => {
                            let res = manager.set_mode(&port, &mode).map(|evs| {
                                evs.into_iter().for_each(&publish);
                            });
                            let _ = reply.send(res);
                        }
                    }
                }
                manager.tick().into_iter().for_each(&publish);
                ticks_clone.fetch_add(1, Ordering::Relaxed);

                next += period;
                let now = clock.now();
                if now > next + period {
                    let behind_ms = u64::try_from((now - next).as_millis()).unwrap_or(u64::MAX);
                    tracing::debug!(behind_ms, "tick overrun");
                    next = now;
                }
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep_until(next);
            }
            manager.shutdown().into_iter().for_each(&publish);
            tracing::trace!("supervisor thread exiting cleanly");
        });

        Self {
            commands: cmd_tx,
            events: ev_rx,
            ticks,
            dropped,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    pub fn events(&self) -> &xch::Receiver<PortEvent> {
        &self.events
    }

    /// Ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Events lost because nobody drained the channel.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Snapshot of every port; `None` once the loop has exited.
    pub fn status(&self) -> Option<Vec<PortStatus>> {
        let (tx, rx) = xch::bounded(1);
        self.commands.send(Command::Status(tx)).ok()?;
        rx.recv().ok()
    }

    pub fn set_mode(&self, port: &str, mode: &str) -> Result<(), PortError> {
        let (tx, rx) = xch::bounded(1);
        self.commands
            .send(Command::SetMode {
                port: port.to_string(),
                mode: mode.to_string(),
                reply: tx,
            })
            .map_err(|_| PortError::DispatcherStopped)?;
        rx.recv().map_err(|_| PortError::DispatcherStopped)?
    }

    /// Stop the loop and wait for teardown to finish.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("supervisor thread joined successfully"),
                Err(e) => tracing::warn!(?e, "supervisor thread panicked during shutdown"),
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.halt();
    }
}
