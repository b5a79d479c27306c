//! Grimoire installer.
//!
//! Separate entry point launched by the updater's execute step. Process:
//!
//! 1. Wait for the parent (main application) process to exit
//! 2. Apply every archive named in the pending-install manifest onto the
//!    install root (trust was established before staging — this process
//!    only unpacks)
//! 3. Delete the manifest and the staged archives
//! 4. Relaunch the application and exit
//!
//! Failures are written to `error.log`, never reported via exit status.

mod apply;

use std::env;
use std::path::PathBuf;
use std::process::{Command, ExitCode};

use grimoire_common::{InstallDirs, errlog};

#[cfg(windows)]
const MAIN_BINARY: &str = "grimoire.exe";

#[cfg(not(windows))]
const MAIN_BINARY: &str = "grimoire";

fn main() -> ExitCode {
    let dirs = InstallDirs::new(install_root());
    eprintln!("[installer] install root: {}", dirs.root().display());

    if let Some(pid) = env::args().nth(1).and_then(|arg| arg.parse::<u32>().ok()) {
        wait_for_parent(pid);
    }

    apply::apply_pending(&dirs);
    relaunch(&dirs);
    // Partial failures were logged; the exit code stays zero either way.
    ExitCode::SUCCESS
}

/// The installer lives at `<root>/update/grimoire-installer`; the
/// install root is two levels up from the executable.
fn install_root() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| Some(exe.parent()?.parent()?.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Waits for the parent process to exit, bounded at 30 seconds.
#[cfg(unix)]
fn wait_for_parent(pid: u32) {
    use std::thread;
    use std::time::Duration;

    eprintln!("[installer] waiting for parent process {pid}");
    for _ in 0..300 {
        let alive = Command::new("kill")
            .args(["-0", &pid.to_string()])
            .output()
            .is_ok_and(|output| output.status.success());
        if !alive {
            eprintln!("[installer] parent process exited");
            return;
        }
        thread::sleep(Duration::from_millis(100));
    }
    eprintln!("[installer] parent process may still be running");
}

/// No cheap liveness probe here; give the parent a moment to exit.
#[cfg(not(unix))]
fn wait_for_parent(_pid: u32) {
    std::thread::sleep(std::time::Duration::from_secs(2));
}

fn relaunch(dirs: &InstallDirs) {
    let app = dirs.root().join(MAIN_BINARY);
    eprintln!("[installer] relaunching {}", app.display());
    if let Err(err) = Command::new(&app).spawn() {
        errlog::log_error(dirs, &err);
    }
}
