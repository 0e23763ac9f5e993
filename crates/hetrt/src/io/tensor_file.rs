//! Headerless tensor dumps: the file is exactly the tensor's buffer bytes.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{RtError, RtResult};
use crate::tensor::Tensor;

pub fn save(tensor: &Tensor, path: impl AsRef<Path>) -> RtResult<()> {
    let path = path.as_ref();
    let bytes = tensor.to_host_bytes()?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    debug!(guid = tensor.guid(), bytes = bytes.len(), path = %path.display(), "tensor saved");
    Ok(())
}

/// Fills `tensor`'s existing buffer; the file length must equal [`Tensor::bytes`].
pub fn load(tensor: &Tensor, path: impl AsRef<Path>) -> RtResult<()> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    if bytes.len() != tensor.bytes() {
        return Err(RtError::SizeMismatch {
            expected: tensor.bytes(),
            found: bytes.len(),
        });
    }
    tensor.copyin_bytes(&bytes)
}
