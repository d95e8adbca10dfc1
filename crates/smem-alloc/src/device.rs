//! Device control surface used by the hardware backend.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::config::DeviceConfig;
use crate::error::AllocError;

/// Request/response access to a shared-memory device driver.
///
/// Every call blocks until the driver answers. Failures are reported as
/// [`AllocError::Io`] and never retried.
pub trait SmemDevice {
    /// Full contents of the region geometry channel.
    fn region_info(&mut self) -> Result<String, AllocError>;

    /// Write an allocation command and return the driver's reply line.
    fn request_alloc(&mut self, command: &str) -> Result<String, AllocError>;

    /// Release the allocation identified by `token`.
    fn request_free(&mut self, token: &str) -> Result<(), AllocError>;
}

impl<D: SmemDevice + ?Sized> SmemDevice for Box<D> {
    fn region_info(&mut self) -> Result<String, AllocError> {
        (**self).region_info()
    }

    fn request_alloc(&mut self, command: &str) -> Result<String, AllocError> {
        (**self).request_alloc(command)
    }

    fn request_free(&mut self, token: &str) -> Result<(), AllocError> {
        (**self).request_free(token)
    }
}

/// [`SmemDevice`] over the test driver's debugfs files.
///
/// Each request opens its file read-write, writes the command, and for
/// allocations reads one reply line back from the same descriptor.
#[derive(Clone, Debug, Default)]
pub struct DebugfsDevice {
    config: DeviceConfig,
}

impl DebugfsDevice {
    /// Use control files under `config.root`.
    pub fn new(config: DeviceConfig) -> Self {
        Self { config }
    }

    /// The configured paths.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }
}

fn channel_name(path: &Path) -> String {
    path.display().to_string()
}

impl SmemDevice for DebugfsDevice {
    fn region_info(&mut self) -> Result<String, AllocError> {
        let path = self.config.regioninfo_path();
        fs::read_to_string(&path).map_err(|e| AllocError::io(channel_name(&path), &e))
    }

    fn request_alloc(&mut self, command: &str) -> Result<String, AllocError> {
        let path = self.config.alloc_path();
        let channel = channel_name(&path);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| AllocError::io(&channel, &e))?;
        file.write_all(command.as_bytes())
            .map_err(|e| AllocError::io(&channel, &e))?;
        let mut reply = String::new();
        BufReader::new(file)
            .read_line(&mut reply)
            .map_err(|e| AllocError::io(&channel, &e))?;
        Ok(reply)
    }

    fn request_free(&mut self, token: &str) -> Result<(), AllocError> {
        let path = self.config.free_path();
        let mut file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| AllocError::io(channel_name(&path), &e))?;
        file.write_all(token.as_bytes())
            .map_err(|e| AllocError::io(channel_name(&path), &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn missing_root_reports_io_channel() {
        let mut dev = DebugfsDevice::new(DeviceConfig::new("/nonexistent/smem-test-root"));
        let err = dev.region_info().unwrap_err();
        match err {
            AllocError::Io { channel, kind, .. } => {
                assert!(channel.ends_with("regioninfo"));
                assert_eq!(kind, io::ErrorKind::NotFound);
            }
            other => panic!("expected Io, got {other:?}"),
        }
        assert!(matches!(
            dev.request_free("h1"),
            Err(AllocError::Io { .. })
        ));
    }

    #[test]
    fn reads_regioninfo_from_root() {
        let dir = std::env::temp_dir().join(format!("smem-debugfs-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("regioninfo"), "0 0x1000 0x1fff 0x1000\n").unwrap();
        let mut dev = DebugfsDevice::new(DeviceConfig::new(&dir));
        assert_eq!(dev.region_info().unwrap(), "0 0x1000 0x1fff 0x1000\n");
        fs::remove_dir_all(&dir).unwrap();
    }
}
