//! Real-time setup for the acquisition process (Linux SCHED_FIFO, CPU
//! affinity, mlockall; macOS mlockall only).
//!
//! Every step is best effort: a failure is logged and the run continues
//! with normal scheduling.

use std::sync::OnceLock;

use crate::cli::{RtArgs, RtLock};

static RT_ONCE: OnceLock<()> = OnceLock::new();

/// Apply the requested real-time settings once per process.
pub fn setup_rt_once(args: &RtArgs) {
    if !args.rt {
        return;
    }
    let lock = args.rt_lock.unwrap_or_else(RtLock::os_default);
    RT_ONCE.get_or_init(|| {
        match lock_memory(lock) {
            Ok(()) => tracing::info!(mode = ?lock, "rt: memory lock applied"),
            Err(e) => tracing::warn!(mode = ?lock, error = %e, "rt: mlockall failed"),
        }
        apply_scheduling(args);
    });
}

#[cfg(unix)]
fn lock_memory(lock: RtLock) -> eyre::Result<()> {
    use libc::{MCL_CURRENT, MCL_FUTURE, mlockall};

    fn call(flags: libc::c_int) -> std::io::Result<()> {
        // SAFETY: mlockall takes only flags and touches no caller memory.
        let rc = unsafe { mlockall(flags) };
        if rc == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }

    let result = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => call(MCL_CURRENT),
        RtLock::All => call(MCL_CURRENT | MCL_FUTURE).or_else(|e| {
            // Future pages need more headroom; fall back to what is resident.
            if is_memlock_limit(&e) {
                call(MCL_CURRENT)
            } else {
                Err(e)
            }
        }),
    };
    result.map_err(|e| {
        let mut msg = format!("{e}");
        if is_memlock_limit(&e) {
            if let Some(limit) = memlock_limit() {
                msg.push_str(&format!("; {limit}"));
            }
            msg.push_str("; hint: needs CAP_IPC_LOCK (or root) and a sufficient 'ulimit -l'");
        }
        eyre::eyre!(msg)
    })
}

#[cfg(not(unix))]
fn lock_memory(lock: RtLock) -> eyre::Result<()> {
    match lock {
        RtLock::None => Ok(()),
        _ => eyre::bail!("memory locking is not supported on this OS"),
    }
}

#[cfg(unix)]
fn is_memlock_limit(err: &std::io::Error) -> bool {
    matches!(err.raw_os_error(), Some(code) if code == libc::EPERM || code == libc::ENOMEM)
}

#[cfg(unix)]
fn memlock_limit() -> Option<String> {
    let mut rlim = std::mem::MaybeUninit::<libc::rlimit>::uninit();
    // SAFETY: getrlimit writes a full rlimit into the pointer on success.
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, rlim.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: rc == 0 means the struct was initialized.
    let cur = unsafe { rlim.assume_init() }.rlim_cur;
    Some(if cur == libc::RLIM_INFINITY {
        "memlock limit: unlimited".to_string()
    } else {
        format!("memlock limit: {} KiB", cur / 1024)
    })
}

#[cfg(target_os = "linux")]
fn apply_scheduling(args: &RtArgs) {
    if let Err(e) = fifo_priority(args.rt_prio) {
        let prio = args
            .rt_prio
            .map_or_else(|| "(max)".to_string(), |p| p.to_string());
        tracing::warn!(prio = %prio, error = %e, "rt: SCHED_FIFO not applied");
    }
    let cpu = args.rt_cpu.unwrap_or(0);
    match pin_to_cpu(cpu) {
        Ok(()) => tracing::info!(cpu, "rt: pinned to CPU"),
        Err(e) => tracing::warn!(cpu, error = %e, "rt: affinity not applied"),
    }
}

#[cfg(not(target_os = "linux"))]
fn apply_scheduling(_args: &RtArgs) {
    tracing::warn!("rt: SCHED_FIFO and CPU affinity are only available on Linux");
}

#[cfg(target_os = "linux")]
fn fifo_priority(prio: Option<i32>) -> eyre::Result<()> {
    use libc::{SCHED_FIFO, sched_get_priority_max, sched_get_priority_min, sched_param};

    // SAFETY: plain syscalls without pointer arguments.
    let (min, max) = unsafe { (sched_get_priority_min(SCHED_FIFO), sched_get_priority_max(SCHED_FIFO)) };
    let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
    let param = sched_param {
        sched_priority: prio.unwrap_or(max).clamp(min, max),
    };
    // SAFETY: param outlives the call; pid 0 is the calling process.
    let rc = unsafe { libc::sched_setscheduler(0, SCHED_FIFO, &param) };
    if rc == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EPERM) {
        eyre::bail!(
            "{err}; needs CAP_SYS_NICE or root (e.g. 'sudo setcap cap_sys_nice=ep $(which pendulum)')"
        );
    }
    Err(err.into())
}

#[cfg(target_os = "linux")]
fn pin_to_cpu(cpu: usize) -> eyre::Result<()> {
    use libc::{CPU_ISSET, CPU_SET, CPU_ZERO, cpu_set_t};

    let capacity = std::mem::size_of::<cpu_set_t>() * 8;
    if cpu >= capacity {
        eyre::bail!("requested CPU {cpu} exceeds cpu_set_t capacity {capacity}");
    }
    // SAFETY: cpu_set_t is plain data; zeroed is a valid empty set.
    let mut allowed: cpu_set_t = unsafe { std::mem::zeroed() };
    // SAFETY: allowed is a valid, writable cpu_set_t of the size passed.
    let rc = unsafe { libc::sched_getaffinity(0, std::mem::size_of::<cpu_set_t>(), &mut allowed) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    // SAFETY: cpu < capacity was checked above.
    if !unsafe { CPU_ISSET(cpu, &allowed) } {
        eyre::bail!("CPU {cpu} not permitted by current affinity mask");
    }
    // SAFETY: as above.
    let mut desired: cpu_set_t = unsafe { std::mem::zeroed() };
    unsafe {
        CPU_ZERO(&mut desired);
        CPU_SET(cpu, &mut desired);
    }
    // SAFETY: desired is a valid cpu_set_t of the size passed.
    let rc = unsafe { libc::sched_setaffinity(0, std::mem::size_of::<cpu_set_t>(), &desired) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error().into())
    }
}
