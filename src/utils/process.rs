// Process liveness checks

/// Whether `pid` names a live process.
///
/// Sends signal 0: `ESRCH` means no such process, `EPERM` means the process
/// exists but belongs to someone else. Any other errno is returned.
/// Zero and negative pids address process groups, never one process, and
/// report `false`.
#[cfg(unix)]
pub fn check_pid(pid: i32) -> nix::Result<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    if pid <= 0 {
        return Ok(false);
    }
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(Errno::EPERM) => Ok(true),
        Err(err) => Err(err),
    }
}

/// Whether `pid` names a live process we can open.
#[cfg(windows)]
pub fn check_pid(pid: i32) -> std::io::Result<bool> {
    use winapi::um::handleapi::CloseHandle;
    use winapi::um::processthreadsapi::OpenProcess;
    use winapi::um::winnt::PROCESS_TERMINATE;

    if pid <= 0 {
        return Ok(false);
    }
    unsafe {
        let handle = OpenProcess(PROCESS_TERMINATE, 0, pid as u32);
        if handle.is_null() {
            return Ok(false);
        }
        CloseHandle(handle);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_pid_is_alive() {
        assert!(check_pid(std::process::id() as i32).unwrap());
    }

    #[test]
    fn test_non_positive_pid_is_dead() {
        assert!(!check_pid(0).unwrap());
        assert!(!check_pid(-1).unwrap());
        assert!(!check_pid(i32::MIN).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_init_is_alive() {
        // pid 1 exists everywhere; EPERM when unprivileged still counts
        assert!(check_pid(1).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_reaped_child_is_dead() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id() as i32;
        child.wait().unwrap();
        assert!(!check_pid(pid).unwrap());
    }
}
