//! The streaming substrate: readable streams, writable inputs and
//! transform stages.

pub mod readable;
pub mod transform;
pub mod writable;

pub use readable::{ReadableStream, Reader};
pub use transform::TransformStream;
pub use writable::{WritableStream, Writer};
