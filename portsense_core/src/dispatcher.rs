//! Deferred attach/detach worker.
//!
//! Registry calls can block (an NXT I2C sensor needs a boot delay before its
//! driver may probe it), so the tick loop never performs them inline. Each
//! port may own at most one outstanding `Ticket`; completions flow back over
//! a channel and are applied by the port on the tick thread.
//!
//! The worker thread is joined when the `Dispatcher` is dropped.
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel as xch;
use portsense_traits::clock::Clock;
use portsense_traits::{DeviceHandle, DeviceRegistry, DeviceSpec};

use crate::config::DispatcherCfg;
use crate::error::PortError;
use crate::hw_error::map_hw_error;
use crate::port::Port;
use crate::types::{DeviceType, PortId};

// Granularity of cancellation checks during a boot wait.
const BOOT_SLICE: Duration = Duration::from_millis(20);

/// A registered logical device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub handle: DeviceHandle,
    pub device_type: DeviceType,
    pub port: PortId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Attach,
    Detach,
}

/// Claim on the single in-flight job of one port.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub id: u64,
    pub kind: JobKind,
    cancel: Arc<AtomicBool>,
}

impl Ticket {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Attached(Device),
    AttachFailed(PortError),
    Detached(Device),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Index of the owning port in its manager.
    pub slot: usize,
    pub ticket: u64,
    pub outcome: Outcome,
}

enum Job {
    Attach {
        id: u64,
        slot: usize,
        cancel: Arc<AtomicBool>,
        port: PortId,
        device_type: DeviceType,
        spec: DeviceSpec,
        boot_delay: Duration,
    },
    Detach {
        id: u64,
        slot: usize,
        device: Device,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Submit {
    Try,
    Block,
}

pub struct Dispatcher {
    jobs: Option<xch::Sender<Job>>,
    done: xch::Receiver<Completion>,
    backlog: VecDeque<Completion>,
    next_id: AtomicU64,
    nxt_i2c_boot: Duration,
    join_handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn spawn<R, C>(registry: R, clock: C, cfg: &DispatcherCfg) -> Self
    where
        R: DeviceRegistry + 'static,
        C: Clock + Send + 'static,
    {
        let (jobs_tx, jobs_rx) = xch::bounded(cfg.queue_depth.max(1));
        let (done_tx, done_rx) = xch::unbounded();
        let join_handle = std::thread::Builder::new()
            .name("portsense-dispatch".into())
            .spawn(move || run(registry, &clock, &jobs_rx, &done_tx));
        let join_handle = match join_handle {
            Ok(h) => Some(h),
            Err(e) => {
                // Every submit will report DispatcherStopped.
                tracing::error!(?e, "failed to spawn dispatcher thread");
                None
            }
        };
        Self {
            jobs: join_handle.as_ref().map(|_| jobs_tx),
            done: done_rx,
            backlog: VecDeque::new(),
            next_id: AtomicU64::new(1),
            nxt_i2c_boot: cfg.nxt_i2c_boot,
            join_handle,
        }
    }

    fn ticket(&self, kind: JobKind) -> Ticket {
        Ticket {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Queue registration of the port's classified device.
    ///
    /// Returns `Ok(false)` without side effects when the port already has a
    /// job in flight or the queue is full; the caller retries next tick.
    pub fn schedule_attach(&mut self, port: &mut Port) -> Result<bool, PortError> {
        self.attach(port, Submit::Try)
    }

    /// Like `schedule_attach`, but waits for queue space instead of giving up.
    pub fn schedule_attach_blocking(&mut self, port: &mut Port) -> Result<bool, PortError> {
        self.attach(port, Submit::Block)
    }

    fn attach(&mut self, port: &mut Port, how: Submit) -> Result<bool, PortError> {
        if port.pending.is_some() {
            return Ok(false);
        }
        let t = port.device_type;
        let name = &port.id.name;
        let failed = |reason: String| PortError::AttachFailed {
            port: name.clone(),
            reason,
        };
        if !t.is_concrete() {
            return Err(failed(format!("{t} is not an attachable device")));
        }
        if port.mode.is_passthrough() {
            return Err(failed("port is in passthrough mode".into()));
        }
        let Some(driver) = t.driver() else {
            return Err(failed(format!("no driver for {t}")));
        };
        let spec = DeviceSpec {
            driver: driver.to_string(),
            device: t.to_string(),
            port: name.clone(),
            variant: t.variant().map(str::to_string),
            probe: port.refs.probe_data(),
        };
        let boot_delay = if t == DeviceType::NxtI2c {
            self.nxt_i2c_boot
        } else {
            Duration::ZERO
        };
        let ticket = self.ticket(JobKind::Attach);
        let job = Job::Attach {
            id: ticket.id,
            slot: port.slot,
            cancel: ticket.cancel.clone(),
            port: port.id.clone(),
            device_type: t,
            spec,
            boot_delay,
        };
        if self.submit(job, how).map_err(|(e, _)| e)?.is_some() {
            tracing::warn!(port = %port.id, "dispatcher queue full, attach deferred");
            return Ok(false);
        }
        tracing::debug!(port = %port.id, device = %t, ticket = ticket.id, "attach scheduled");
        port.pending = Some(ticket);
        Ok(true)
    }

    /// Queue unregistration of the port's device.
    ///
    /// Returns `Ok(false)` when nothing is attached, a job is already in
    /// flight or the queue is full.
    pub fn schedule_detach(&mut self, port: &mut Port) -> Result<bool, PortError> {
        self.detach(port, Submit::Try)
    }

    pub fn schedule_detach_blocking(&mut self, port: &mut Port) -> Result<bool, PortError> {
        self.detach(port, Submit::Block)
    }

    fn detach(&mut self, port: &mut Port, how: Submit) -> Result<bool, PortError> {
        if port.pending.is_some() {
            return Ok(false);
        }
        let Some(device) = port.device.take() else {
            return Ok(false);
        };
        let ticket = self.ticket(JobKind::Detach);
        let job = Job::Detach {
            id: ticket.id,
            slot: port.slot,
            device,
        };
        match self.submit(job, how) {
            Ok(None) => {}
            Ok(Some(Job::Detach { device, .. })) => {
                port.device = Some(device);
                tracing::warn!(port = %port.id, "dispatcher queue full, detach deferred");
                return Ok(false);
            }
            Ok(Some(Job::Attach { .. })) => return Ok(false),
            Err((e, Some(Job::Detach { device, .. }))) => {
                port.device = Some(device);
                return Err(e);
            }
            Err((e, _)) => return Err(e),
        }
        tracing::debug!(port = %port.id, ticket = ticket.id, "detach scheduled");
        port.pending = Some(ticket);
        Ok(true)
    }

    /// Hand `job` to the worker. A full queue gives the job back.
    fn submit(&self, job: Job, how: Submit) -> Result<Option<Job>, (PortError, Option<Job>)> {
        let Some(tx) = self.jobs.as_ref() else {
            return Err((PortError::DispatcherStopped, Some(job)));
        };
        match how {
            Submit::Try => match tx.try_send(job) {
                Ok(()) => Ok(None),
                Err(xch::TrySendError::Full(job)) => Ok(Some(job)),
                Err(xch::TrySendError::Disconnected(job)) => {
                    Err((PortError::DispatcherStopped, Some(job)))
                }
            },
            Submit::Block => tx
                .send(job)
                .map(|()| None)
                .map_err(|e| (PortError::DispatcherStopped, Some(e.into_inner()))),
        }
    }

    /// Completions that arrived since the last call, oldest first.
    pub fn drain(&mut self) -> Vec<Completion> {
        let mut out: Vec<Completion> = self.backlog.drain(..).collect();
        out.extend(self.done.try_iter());
        out
    }

    /// Block until the completion for `ticket` arrives. Other completions
    /// are kept for the next `drain`.
    pub fn await_ticket(&mut self, ticket: u64) -> Option<Completion> {
        if let Some(pos) = self.backlog.iter().position(|c| c.ticket == ticket) {
            return self.backlog.remove(pos);
        }
        loop {
            match self.done.recv() {
                Ok(c) if c.ticket == ticket => return Some(c),
                Ok(c) => self.backlog.push_back(c),
                Err(_) => return None,
            }
        }
    }

    /// Flag `ticket` as cancelled and wait for the worker to acknowledge.
    ///
    /// An attach that already registered is rolled back by the worker; a
    /// detach always runs to completion.
    pub fn cancel(&mut self, ticket: &Ticket) -> Option<Completion> {
        ticket.cancel.store(true, Ordering::Release);
        self.await_ticket(ticket.id)
    }

    /// Wait up to `timeout` for any completion.
    pub fn wait_any(&mut self, timeout: Duration) -> Option<Completion> {
        if let Some(c) = self.backlog.pop_front() {
            return Some(c);
        }
        self.done.recv_timeout(timeout).ok()
    }

    pub fn is_running(&self) -> bool {
        self.jobs.is_some()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Closing the queue lets the worker finish what it holds and exit.
        self.jobs.take();
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("dispatcher thread joined"),
                Err(e) => tracing::warn!(?e, "dispatcher thread panicked during shutdown"),
            }
        }
    }
}

fn run<R: DeviceRegistry, C: Clock>(
    mut registry: R,
    clock: &C,
    jobs: &xch::Receiver<Job>,
    done: &xch::Sender<Completion>,
) {
    for job in jobs {
        let completion = match job {
            Job::Attach {
                id,
                slot,
                cancel,
                port,
                device_type,
                spec,
                boot_delay,
            } => Completion {
                slot,
                ticket: id,
                outcome: attach(
                    &mut registry,
                    clock,
                    &cancel,
                    port,
                    device_type,
                    &spec,
                    boot_delay,
                ),
            },
            Job::Detach { id, slot, device } => Completion {
                slot,
                ticket: id,
                outcome: detach(&mut registry, device),
            },
        };
        if done.send(completion).is_err() {
            tracing::debug!("dispatcher consumer gone, exiting thread");
            break;
        }
    }
    tracing::trace!("dispatcher thread exiting cleanly");
}

/// Wait out `delay` in slices; false if cancelled meanwhile.
fn boot_wait<C: Clock>(clock: &C, delay: Duration, cancel: &AtomicBool) -> bool {
    let deadline = clock.now() + delay;
    loop {
        if cancel.load(Ordering::Acquire) {
            return false;
        }
        let now = clock.now();
        if now >= deadline {
            return true;
        }
        clock.sleep((deadline - now).min(BOOT_SLICE));
    }
}

fn attach<R: DeviceRegistry, C: Clock>(
    registry: &mut R,
    clock: &C,
    cancel: &AtomicBool,
    port: PortId,
    device_type: DeviceType,
    spec: &DeviceSpec,
    boot_delay: Duration,
) -> Outcome {
    if !boot_wait(clock, boot_delay, cancel) {
        tracing::debug!(port = %port, "attach cancelled before registration");
        return Outcome::Cancelled;
    }
    let handle = match registry.register(spec) {
        Ok(h) => h,
        Err(e) => {
            let err = match map_hw_error(&port.name, e.as_ref()) {
                e @ PortError::AttachFailed { .. } => e,
                other => PortError::AttachFailed {
                    port: port.name.clone(),
                    reason: other.to_string(),
                },
            };
            tracing::warn!(port = %port, device = %device_type, error = %err, "registration failed");
            return Outcome::AttachFailed(err);
        }
    };
    if cancel.load(Ordering::Acquire) {
        // Lost the race with a cancel: roll back.
        if let Err(e) = registry.unregister(handle) {
            tracing::warn!(port = %port, error = %e, "rollback of cancelled attach failed");
        }
        return Outcome::Cancelled;
    }
    tracing::info!(port = %port, device = %device_type, handle = handle.0, "device attached");
    Outcome::Attached(Device {
        handle,
        device_type,
        port,
    })
}

fn detach<R: DeviceRegistry>(registry: &mut R, device: Device) -> Outcome {
    match registry.unregister(device.handle) {
        Ok(()) => {
            tracing::info!(port = %device.port, device = %device.device_type, "device detached");
        }
        // The device is gone from our side either way.
        Err(e) => tracing::warn!(port = %device.port, error = %e, "unregister failed"),
    }
    Outcome::Detached(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use portsense_traits::BoxError;
    use portsense_traits::clock::test_clock::TestClock;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Ledger(Arc<Mutex<Vec<String>>>);

    impl DeviceRegistry for Ledger {
        fn register(&mut self, spec: &DeviceSpec) -> Result<DeviceHandle, BoxError> {
            let mut v = self.0.lock().unwrap();
            v.push(format!("+{}", spec.device));
            Ok(DeviceHandle(v.len() as u64))
        }

        fn unregister(&mut self, handle: DeviceHandle) -> Result<(), BoxError> {
            self.0.lock().unwrap().push(format!("-{}", handle.0));
            Ok(())
        }
    }

    #[test]
    fn boot_wait_honours_cancel() {
        let clock = TestClock::new();
        let cancel = AtomicBool::new(true);
        assert!(!boot_wait(&clock, Duration::from_secs(1), &cancel));
        let cancel = AtomicBool::new(false);
        assert!(boot_wait(&clock, Duration::from_millis(100), &cancel));
        assert!(clock.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn cancelled_attach_never_registers() {
        let ledger = Ledger::default();
        let mut reg = ledger.clone();
        let cancel = AtomicBool::new(true);
        let port = PortId {
            index: 0,
            name: "in1".into(),
        };
        let spec = DeviceSpec {
            driver: "nxt-i2c-sensor".into(),
            device: "nxt-i2c".into(),
            port: "in1".into(),
            variant: None,
            probe: Default::default(),
        };
        let out = attach(
            &mut reg,
            &TestClock::new(),
            &cancel,
            port,
            DeviceType::NxtI2c,
            &spec,
            Duration::from_secs(1),
        );
        assert_eq!(out, Outcome::Cancelled);
        assert!(ledger.0.lock().unwrap().is_empty());
    }
}
