//! Whole-file transfers between a virtual file and the local filesystem

use crate::driver::Driver;
use crate::error::{Result, VfsError};
use crate::handle::{OpenMode, VirtualFile};
use crate::store::WritePrecondition;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Download the virtual file at `source` into a newly created local file
///
/// Multi-part sources are written as their logical content, so a shared
/// header appears once. Returns the number of bytes copied. A partially
/// written `dest` is removed on failure.
pub fn copy_to_local(driver: &Driver, source: &str, dest: &Path) -> Result<u64> {
    let mut buf = copy_buffer(driver)?;
    let mut reader = driver.open(source, OpenMode::Read)?;
    let mut out = File::create(dest).map_err(|e| {
        error!("Error creating {:?}: {}", dest, e);
        e
    })?;

    let copied = match download(&mut reader, &mut out, &mut buf) {
        Ok(copied) => copied,
        Err(e) => {
            error!("Error copying {} to {:?}: {}", source, dest, e);
            drop(out);
            if let Err(rm) = std::fs::remove_file(dest) {
                warn!("Cannot remove partial download {:?}: {}", dest, rm);
            }
            return Err(e);
        }
    };

    info!("Copied {} to {:?} ({} bytes)", source, dest, copied);
    Ok(copied)
}

fn download(reader: &mut VirtualFile, out: &mut File, buf: &mut [u8]) -> Result<u64> {
    let mut copied = 0u64;
    loop {
        let n = reader.read(buf)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        copied += n as u64;
        debug!("download: {} bytes", copied);
    }
    out.flush()?;
    reader.close()?;
    Ok(copied)
}

/// Upload a local file to a new object at `dest`
///
/// Fails if `dest` already exists. Nothing is published unless the whole
/// file was streamed. Returns the number of bytes copied.
pub fn copy_from_local(driver: &Driver, source: &Path, dest: &str) -> Result<u64> {
    let mut buf = copy_buffer(driver)?;
    let mut input = File::open(source).map_err(|e| {
        error!("Error opening {:?}: {}", source, e);
        e
    })?;
    let mut writer = driver.open_write(dest, WritePrecondition::DoesNotExist)?;

    let mut copied = 0u64;
    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write(&buf[..n])?;
        copied += n as u64;
        debug!("copy_from_local {}: {} bytes", dest, copied);
    }
    writer.close()?;

    info!("Copied {:?} to {} ({} bytes)", source, dest, copied);
    Ok(copied)
}

/// Transfer buffer; an empty one would read as end of file straight away
fn copy_buffer(driver: &Driver) -> Result<Vec<u8>> {
    match driver.preferred_buffer_size() {
        0 => {
            error!("Cannot copy with a zero-length buffer");
            Err(VfsError::Config(
                "preferred_buffer_size must be positive".to_string(),
            ))
        }
        size => Ok(vec![0u8; size]),
    }
}
