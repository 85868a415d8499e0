//! Is the user actually at this computer?
//!
//! A computer that is switched on but locked should not count toward the
//! person being online. The agent asks a [`PresenceGate`] before connecting
//! and before every heartbeat.

/// Decides whether this computer should currently report its user present
pub trait PresenceGate: Send + Sync {
    fn is_present(&self) -> bool;
}

/// Gate that never objects
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysPresent;

impl PresenceGate for AlwaysPresent {
    fn is_present(&self) -> bool {
        true
    }
}

/// Reports the user away while the Windows lock screen is up.
///
/// The lock screen runs as `LogonUI.exe`. On other platforms this gate
/// always reports present.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScreenLockGate;

impl ScreenLockGate {
    pub fn new() -> Self {
        Self
    }
}

impl PresenceGate for ScreenLockGate {
    #[cfg(windows)]
    fn is_present(&self) -> bool {
        use sysinfo::{ProcessRefreshKind, RefreshKind, System};

        let system = System::new_with_specifics(
            RefreshKind::new().with_processes(ProcessRefreshKind::new()),
        );
        let locked = system
            .processes()
            .values()
            .any(|p| p.name().eq_ignore_ascii_case("logonui.exe"));
        if locked {
            tracing::debug!("Lock screen is up");
        }
        !locked
    }

    #[cfg(not(windows))]
    fn is_present(&self) -> bool {
        true
    }
}
