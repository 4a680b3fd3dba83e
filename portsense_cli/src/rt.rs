//! Real-time setup for the tick loop (Linux SCHED_FIFO / affinity / mlockall; macOS mlockall).

use crate::cli::RtLock;
use std::sync::OnceLock;

/// What `watch --rt` asked for.
#[derive(Debug, Clone, Copy)]
pub struct RtRequest {
    pub prio: Option<i32>,
    pub lock: RtLock,
    pub cpu: Option<usize>,
}

static RT_ONCE: OnceLock<()> = OnceLock::new();

#[inline]
fn is_retryable_memlock_error(err: &std::io::Error) -> bool {
    matches!(err.raw_os_error(), Some(code) if code == libc::EPERM || code == libc::ENOMEM)
}

fn mlockall(flags: libc::c_int) -> std::io::Result<()> {
    // SAFETY: mlockall takes no pointers; failure is reported through errno.
    let rc = unsafe { libc::mlockall(flags) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

fn memlock_limit_hint() -> Option<String> {
    let mut rlim = std::mem::MaybeUninit::<libc::rlimit>::uninit();
    // SAFETY: getrlimit writes a full rlimit on success; read only then.
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, rlim.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: rc == 0 above.
    let cur = unsafe { rlim.assume_init() }.rlim_cur;
    if cur == libc::RLIM_INFINITY {
        Some("memlock limit: unlimited".to_string())
    } else {
        Some(format!("memlock limit: {} KiB", cur / 1024))
    }
}

/// Lock memory per `lock`. `All` falls back to `Current` on EPERM/ENOMEM.
fn apply_mem_lock(lock: RtLock) -> eyre::Result<()> {
    let err = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => match mlockall(libc::MCL_CURRENT) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        },
        RtLock::All => match mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        },
    };

    let mut fallback_err = None;
    if lock == RtLock::All && is_retryable_memlock_error(&err) {
        match mlockall(libc::MCL_CURRENT) {
            Ok(()) => {
                tracing::warn!(error = %err, "mlockall(current|future) failed; locked current pages only");
                return Ok(());
            }
            Err(e2) => fallback_err = Some(e2),
        }
    }

    let mut msg = format!(
        "mlockall({}) failed: {err}",
        if lock == RtLock::All {
            "current|future"
        } else {
            "current"
        }
    );
    if is_retryable_memlock_error(&err) {
        if let Some(h) = memlock_limit_hint() {
            msg.push_str("; ");
            msg.push_str(&h);
        }
        msg.push_str("; hint: needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'");
        if let Some(e2) = fallback_err {
            msg.push_str(&format!("; fallback mlockall(current) also failed: {e2}"));
        }
    }
    Err(eyre::eyre!(msg))
}

#[cfg(target_os = "linux")]
mod linux {
    use libc::{
        CPU_ISSET, CPU_SET, CPU_ZERO, SCHED_FIFO, cpu_set_t, sched_get_priority_max,
        sched_get_priority_min, sched_param, sched_setscheduler,
    };

    /// Capacity of cpu_set_t in CPU indices (bits).
    const MAX_CPUSET_BITS: usize = std::mem::size_of::<cpu_set_t>() * 8;
    const CAP_SYS_NICE: u64 = 1 << 23;

    fn has_sys_nice() -> bool {
        let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
            // Can't tell; let sched_setscheduler decide.
            return true;
        };
        status
            .lines()
            .filter(|l| l.starts_with("CapEff:"))
            .filter_map(|l| l.split_whitespace().nth(1))
            .filter_map(|hex| u64::from_str_radix(hex, 16).ok())
            .any(|caps| caps & CAP_SYS_NICE != 0)
    }

    pub fn apply_fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
        // SAFETY: geteuid has no preconditions.
        let euid = unsafe { libc::geteuid() };
        if euid != 0 && !has_sys_nice() {
            eyre::bail!(
                "insufficient privileges for SCHED_FIFO: needs CAP_SYS_NICE or root (euid {euid}). \
                 Hint: 'sudo setcap cap_sys_nice=ep /path/to/portsense'"
            );
        }
        // SAFETY: plain queries.
        let (min, max) = unsafe {
            (
                sched_get_priority_min(SCHED_FIFO),
                sched_get_priority_max(SCHED_FIFO),
            )
        };
        let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
        let prio_val = prio.unwrap_or(max).clamp(min, max);
        let param = sched_param {
            sched_priority: prio_val,
        };
        // SAFETY: param outlives the call.
        let rc = unsafe { sched_setscheduler(0, SCHED_FIFO, &param) };
        if rc != 0 {
            return Err(eyre::eyre!(std::io::Error::last_os_error()));
        }
        Ok(prio_val)
    }

    pub fn apply_affinity(cpu: Option<usize>) -> eyre::Result<usize> {
        let target = cpu.unwrap_or(0);
        if target >= MAX_CPUSET_BITS {
            eyre::bail!("requested CPU {target} exceeds cpu_set_t capacity {MAX_CPUSET_BITS}");
        }
        // SAFETY: sysconf has no preconditions.
        let online = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
        let online = usize::try_from(online).unwrap_or(0);
        if online < 1 {
            eyre::bail!("_SC_NPROCESSORS_ONLN < 1");
        }
        if target >= online {
            eyre::bail!("requested CPU {target} >= online {online}");
        }

        // SAFETY: cpu_set_t is plain data; zeroed is a valid empty set.
        let mut allowed: cpu_set_t = unsafe { std::mem::zeroed() };
        // SAFETY: allowed is a valid, writable cpu_set_t of the given size.
        let rc = unsafe {
            CPU_ZERO(&mut allowed);
            libc::sched_getaffinity(0, std::mem::size_of::<cpu_set_t>(), &mut allowed)
        };
        // SAFETY: target < MAX_CPUSET_BITS.
        if rc == 0 && !unsafe { CPU_ISSET(target, &allowed) } {
            eyre::bail!("CPU {target} not permitted by current affinity mask");
        }

        // SAFETY: as above.
        let mut desired: cpu_set_t = unsafe { std::mem::zeroed() };
        // SAFETY: desired is valid for writes; target is in range.
        let rc = unsafe {
            CPU_ZERO(&mut desired);
            CPU_SET(target, &mut desired);
            libc::sched_setaffinity(0, std::mem::size_of::<cpu_set_t>(), &desired)
        };
        if rc != 0 {
            return Err(eyre::eyre!(std::io::Error::last_os_error()));
        }
        Ok(target)
    }
}

/// Apply `req` to the whole process, at most once. Every step is best
/// effort: failures are logged and the loop runs without that guarantee.
pub fn setup_rt_once(req: RtRequest) {
    RT_ONCE.get_or_init(|| {
        match apply_mem_lock(req.lock) {
            Ok(()) => tracing::info!(lock = ?req.lock, "rt memory lock applied"),
            Err(err) => tracing::warn!(error = %err, "rt memory lock not applied"),
        }

        #[cfg(target_os = "linux")]
        {
            match linux::apply_fifo_priority(req.prio) {
                Ok(prio) => tracing::info!(prio, "rt SCHED_FIFO applied"),
                Err(err) => tracing::warn!(
                    error = %err,
                    prio = ?req.prio,
                    "sched_setscheduler(SCHED_FIFO) failed"
                ),
            }
            match linux::apply_affinity(req.cpu) {
                Ok(cpu) => tracing::info!(cpu, "rt affinity applied"),
                Err(err) => tracing::warn!(error = %err, "rt affinity not applied"),
            }
        }

        #[cfg(not(target_os = "linux"))]
        {
            let _ = (req.prio, req.cpu);
            tracing::warn!("SCHED_FIFO and CPU affinity are Linux only; only mlockall applied");
        }
    });
}
