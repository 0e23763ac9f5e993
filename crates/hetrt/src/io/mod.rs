pub mod tensor_archive;
pub mod tensor_file;

pub use tensor_archive::{save_archive, TensorArchiveEntry, TensorArchiveReader};
