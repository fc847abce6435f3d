//! Low level network plumbing: WiFi driver private commands and the
//! hostname syscall fallback.

use std::io;

use crate::types::MiracastMode;

const SIOCDEVPRIVATE: libc::c_ulong = 0x89F0;

#[repr(C)]
struct PrivateCommand {
    buf: *mut libc::c_char,
    used_len: libc::c_int,
    total_len: libc::c_int,
}

// The ifreq layout with ifr_data selected from the union; libc's ifreq
// makes the union awkward to fill portably.
#[repr(C)]
struct InterfaceRequest {
    ifr_name: [libc::c_char; libc::IFNAMSIZ],
    ifr_data: *mut libc::c_void,
}

/// Command string for the driver's miracast switch.
pub(crate) fn miracast_mode_command(mode: MiracastMode) -> String {
    format!("MIRACAST {}", mode as i32)
}

/// Sends a plain ASCII command to the WiFi driver through the private
/// ioctl. Android drivers expose vendor commands this way; a driver
/// without the handler fails the ioctl, which callers treat as non fatal.
pub(crate) fn send_driver_private_command(ifname: &str, command: &str) -> io::Result<()> {
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    let mut buffer = command.as_bytes().to_vec();
    buffer.push(0);

    let mut private = PrivateCommand {
        buf: buffer.as_mut_ptr().cast::<libc::c_char>(),
        used_len: buffer.len() as libc::c_int,
        total_len: buffer.len() as libc::c_int,
    };

    let mut request: InterfaceRequest = unsafe { std::mem::zeroed() };
    for (index, byte) in ifname
        .as_bytes()
        .iter()
        .take(libc::IFNAMSIZ - 1)
        .enumerate()
    {
        request.ifr_name[index] = *byte as libc::c_char;
    }
    request.ifr_data = (&raw mut private).cast::<libc::c_void>();

    let rc = unsafe { libc::ioctl(fd, SIOCDEVPRIVATE, &raw mut request) };
    let result = if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    };

    unsafe { libc::close(fd) };

    result
}

/// Hostname via gethostname(2), for hosts where hostname1 has nothing.
pub(crate) fn system_hostname() -> Option<String> {
    let mut buffer = [0u8; 256];
    let rc = unsafe {
        libc::gethostname(buffer.as_mut_ptr().cast::<libc::c_char>(), buffer.len())
    };
    if rc != 0 {
        return None;
    }

    let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
    String::from_utf8(buffer[..end].to_vec())
        .ok()
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miracast_commands() {
        assert_eq!(miracast_mode_command(MiracastMode::Off), "MIRACAST 0");
        assert_eq!(miracast_mode_command(MiracastMode::Source), "MIRACAST 1");
        assert_eq!(miracast_mode_command(MiracastMode::Sink), "MIRACAST 2");
    }
}
