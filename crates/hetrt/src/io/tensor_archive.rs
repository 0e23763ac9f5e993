//! Named multi-tensor archive used to persist weights together with their shape and dtype.
//!
//! Layout: 8-byte magic, `u32` version, `u32` index length, a JSON index, then the raw buffer
//! bytes of every entry back to back. Offsets in the index are absolute.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RtError, RtResult};
use crate::runtime::RuntimeHandle;
use crate::tensor::{DType, Shape, Tensor};

const MAGIC: &[u8; 8] = b"HETRTTEN";
const VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq)]
pub struct TensorArchiveEntry {
    pub name: String,
    pub shape: Shape,
    pub dtype: DType,
    pub offset: u64,
    pub len: u64,
}

#[derive(Clone, Serialize, Deserialize)]
struct IndexEntry {
    name: String,
    dims: Vec<u64>,
    dtype_tag: u32,
    offset: u64,
    len: u64,
}

pub struct TensorArchiveReader {
    file: File,
    entries: Vec<TensorArchiveEntry>,
    by_name: HashMap<String, usize>,
}

impl TensorArchiveReader {
    pub fn open(path: impl AsRef<Path>) -> RtResult<Self> {
        let mut file = File::open(path)?;

        let mut magic = [0u8; 8];
        file.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(RtError::invalid("invalid tensor archive magic header"));
        }
        let version = read_u32(&mut file)?;
        if version != VERSION {
            return Err(RtError::invalid(format!(
                "unsupported tensor archive version {}",
                version
            )));
        }

        let index_len = read_u32(&mut file)? as usize;
        let mut index_bytes = vec![0u8; index_len];
        file.read_exact(&mut index_bytes)?;
        let index: Vec<IndexEntry> = serde_json::from_slice(&index_bytes)
            .map_err(|err| RtError::invalid(format!("corrupt tensor archive index: {}", err)))?;

        let mut entries = Vec::with_capacity(index.len());
        let mut by_name = HashMap::with_capacity(index.len());
        for (i, e) in index.into_iter().enumerate() {
            let dtype = DType::from_tag(e.dtype_tag).ok_or_else(|| {
                RtError::invalid(format!("unknown dtype tag {} in tensor archive", e.dtype_tag))
            })?;
            let dims = e
                .dims
                .iter()
                .map(|&d| {
                    usize::try_from(d)
                        .map_err(|_| RtError::invalid(format!("tensor {} dim overflow", e.name)))
                })
                .collect::<RtResult<Vec<_>>>()?;
            by_name.insert(e.name.clone(), i);
            entries.push(TensorArchiveEntry {
                name: e.name,
                shape: Shape::new(dims),
                dtype,
                offset: e.offset,
                len: e.len,
            });
        }

        Ok(Self {
            file,
            entries,
            by_name,
        })
    }

    pub fn entries(&self) -> &[TensorArchiveEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> RtResult<&TensorArchiveEntry> {
        self.by_name
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| RtError::invalid(format!("tensor '{}' not found in archive", name)))
    }

    /// Materialises entry `name` as a freshly allocated tensor on `runtime`.
    pub fn read(&mut self, name: &str, runtime: &RuntimeHandle) -> RtResult<Tensor> {
        let entry = self.entry(name)?.clone();
        let mut tensor = Tensor::new(entry.shape.clone(), entry.dtype, runtime.clone());
        tensor.set_weight();
        tensor.data_malloc()?;
        self.read_into(&entry, &tensor)?;
        Ok(tensor)
    }

    /// Copies entry `name` into an existing tensor of matching shape and dtype.
    pub fn load_into(&mut self, name: &str, tensor: &Tensor) -> RtResult<()> {
        let entry = self.entry(name)?.clone();
        if entry.dtype != tensor.dtype() {
            return Err(RtError::DTypeMismatch {
                expected: tensor.dtype(),
                found: entry.dtype,
            });
        }
        tensor.shape().ensure_same(&entry.shape)?;
        self.read_into(&entry, tensor)
    }

    fn read_into(&mut self, entry: &TensorArchiveEntry, tensor: &Tensor) -> RtResult<()> {
        // the index is untrusted; size the buffer from the tensor, not the file
        if entry.len != tensor.bytes() as u64 {
            return Err(RtError::SizeMismatch {
                expected: tensor.bytes(),
                found: usize::try_from(entry.len).unwrap_or(usize::MAX),
            });
        }
        self.file.seek(SeekFrom::Start(entry.offset))?;
        let mut raw = vec![0u8; tensor.bytes()];
        self.file.read_exact(&mut raw)?;
        tensor.copyin_bytes(&raw)
    }
}

/// Writes `tensors` sorted by name. Every tensor must hold data.
pub fn save_archive(path: impl AsRef<Path>, tensors: &[(&str, &Tensor)]) -> RtResult<()> {
    let mut sorted: Vec<&(&str, &Tensor)> = tensors.iter().collect();
    sorted.sort_by(|(a, _), (b, _)| a.cmp(b));
    if let Some(pair) = sorted.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(RtError::invalid(format!(
            "duplicate archive entry '{}'",
            pair[0].0
        )));
    }

    let mut index = Vec::with_capacity(sorted.len());
    let mut running_offset: u64 = 0;
    for (name, tensor) in &sorted {
        let len = tensor.bytes() as u64;
        index.push(IndexEntry {
            name: name.to_string(),
            dims: tensor.dims().iter().map(|&d| d as u64).collect(),
            dtype_tag: tensor.dtype().tag(),
            offset: running_offset,
            len,
        });
        running_offset += len;
    }

    // Offsets become absolute once the index length is known; absolute offsets can lengthen
    // the index, so iterate until it stops growing.
    let mut index_len = encode_index(&index)?.len();
    let encoded = loop {
        let data_start = (MAGIC.len() + 4 + 4 + index_len) as u64;
        let shifted: Vec<IndexEntry> = index
            .iter()
            .map(|e| IndexEntry {
                offset: e.offset + data_start,
                ..e.clone()
            })
            .collect();
        let encoded = encode_index(&shifted)?;
        if encoded.len() == index_len {
            break encoded;
        }
        index_len = encoded.len();
    };

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;
    writer.write_all(&(encoded.len() as u32).to_le_bytes())?;
    writer.write_all(&encoded)?;
    for (_, tensor) in &sorted {
        writer.write_all(&tensor.to_host_bytes()?)?;
    }
    writer.flush()?;
    Ok(())
}

fn encode_index(index: &[IndexEntry]) -> RtResult<Vec<u8>> {
    serde_json::to_vec(index)
        .map_err(|err| RtError::invalid(format!("failed to encode archive index: {}", err)))
}

fn read_u32(reader: &mut impl Read) -> RtResult<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}
