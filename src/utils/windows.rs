// src/utils/windows.rs

use anyhow::{Context, Result};
use widestring::U16CString;
use windows::{
    core::PCWSTR,
    Win32::{
        Foundation::{CloseHandle, ERROR_CANCELLED, HANDLE, WAIT_OBJECT_0},
        Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY},
        System::Threading::{
            GetCurrentProcess, GetExitCodeProcess, OpenProcessToken, WaitForSingleObject,
            INFINITE,
        },
        UI::{
            Shell::{ShellExecuteExW, SEE_MASK_NOASYNC, SEE_MASK_NOCLOSEPROCESS, SHELLEXECUTEINFOW},
            WindowsAndMessaging::SW_SHOWNORMAL,
        },
    },
};

use super::process::{join_command_line, PrivilegeBroker};
use crate::errors::SwitchError;

/// Closes the wrapped handle on drop.
pub struct HandleGuard {
    pub handle: HANDLE,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        if !self.handle.is_invalid() {
            if let Err(e) = unsafe { CloseHandle(self.handle) } {
                tracing::warn!("CloseHandle failed: {}", e);
            }
        }
    }
}

/// Checks if the current process is running with elevated (administrator) privileges.
///
/// # Returns
///
/// - `true` if the process is elevated.
/// - `false` otherwise, including when the token cannot be queried.
pub fn is_elevated() -> bool {
    let mut handle = HANDLE::default();
    if unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut handle) }.is_err() {
        return false;
    }
    let token = HandleGuard { handle };

    let mut elevation = TOKEN_ELEVATION::default();
    let size = std::mem::size_of::<TOKEN_ELEVATION>() as u32;
    let mut ret_size = 0u32;
    let queried = unsafe {
        GetTokenInformation(
            token.handle,
            TokenElevation,
            Some(&mut elevation as *mut _ as *mut _),
            size,
            &mut ret_size,
        )
    };

    queried.is_ok() && elevation.TokenIsElevated != 0
}

/// Re-launches the current executable with the `runas` verb, which shows the
/// UAC consent prompt.
///
/// Declining the prompt is reported as `SwitchError::ElevationDenied`.
pub fn run_self_elevated(args: &[String]) -> Result<i32> {
    let exe = std::env::current_exe().context("Failed to locate the current executable")?;
    if !exe.exists() {
        return Err(SwitchError::MissingExecutable(exe).into());
    }

    let file = U16CString::from_os_str(exe.as_os_str())
        .context("Executable path contains a NUL character")?;
    let params = U16CString::from_str(join_command_line(args))
        .context("Command line contains a NUL character")?;
    let verb = U16CString::from_str("runas").context("Invalid verb")?;

    let mut info = SHELLEXECUTEINFOW {
        cbSize: std::mem::size_of::<SHELLEXECUTEINFOW>() as u32,
        fMask: SEE_MASK_NOCLOSEPROCESS | SEE_MASK_NOASYNC,
        lpVerb: PCWSTR::from_raw(verb.as_ptr()),
        lpFile: PCWSTR::from_raw(file.as_ptr()),
        lpParameters: PCWSTR::from_raw(params.as_ptr()),
        nShow: SW_SHOWNORMAL.0,
        ..Default::default()
    };

    tracing::info!(
        "Requesting elevation for: {} {}",
        exe.display(),
        join_command_line(args)
    );
    if let Err(e) = unsafe { ShellExecuteExW(&mut info) } {
        if e.code() == ERROR_CANCELLED.to_hresult() {
            return Err(SwitchError::ElevationDenied("the consent prompt was declined".into()).into());
        }
        return Err(SwitchError::ElevationDenied(e.to_string()).into());
    }

    if info.hProcess.is_invalid() {
        return Err(SwitchError::ElevationDenied("no process handle was returned".into()).into());
    }
    let process = HandleGuard {
        handle: info.hProcess,
    };

    let wait_result = unsafe { WaitForSingleObject(process.handle, INFINITE) };
    if wait_result != WAIT_OBJECT_0 {
        anyhow::bail!(
            "Failed to wait for the elevated process: {:?}",
            wait_result
        );
    }

    let mut exit_code = 0u32;
    unsafe { GetExitCodeProcess(process.handle, &mut exit_code) }
        .context("Failed to read the elevated process exit code")?;

    Ok(exit_code as i32)
}

/// `PrivilegeBroker` backed by the process token and UAC.
#[derive(Debug, Default, Clone, Copy)]
pub struct UacBroker;

impl PrivilegeBroker for UacBroker {
    fn is_elevated(&self) -> bool {
        is_elevated()
    }

    fn run_elevated(&self, args: &[String]) -> Result<i32> {
        run_self_elevated(args)
    }
}
