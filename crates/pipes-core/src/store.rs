use crate::error::Result;

/// How a dataset is being opened - mirrors `MRI_MODIFY`/`MRI_READ` style
/// open modes from the original dataset API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

/// The collaborator a `FileInputTool`/`FileOutputTool` talks to instead
/// of touching a concrete file format directly. One typed method pair per
/// element type, rather than a single method taking an opaque buffer and
/// a type tag, keeps each implementation's per-type conversion logic in
/// ordinary Rust function signatures instead of behind a cast.
pub trait DatasetStore {
    fn close(&mut self) -> Result<()>;

    /// Declares a new chunk (a named, independently-offset byte range)
    /// within the dataset.
    fn create_chunk(&mut self, name: &str) -> Result<()>;

    /// Lists every top-level key currently defined in the dataset,
    /// in iteration order. `FileInputTool` walks this once at open time.
    fn iterate_keys(&self) -> Vec<String>;

    fn get_string(&self, key: &str) -> Option<String>;
    fn set_string(&mut self, key: &str, value: &str);

    fn read_chunk_uint8(&self, chunk: &str, n: i64, offset: i64, buf: &mut [u8]) -> i64;
    fn read_chunk_int16(&self, chunk: &str, n: i64, offset: i64, buf: &mut [i16]) -> i64;
    fn read_chunk_int32(&self, chunk: &str, n: i64, offset: i64, buf: &mut [i32]) -> i64;
    fn read_chunk_int64(&self, chunk: &str, n: i64, offset: i64, buf: &mut [i64]) -> i64;
    fn read_chunk_float32(&self, chunk: &str, n: i64, offset: i64, buf: &mut [f32]) -> i64;
    fn read_chunk_float64(&self, chunk: &str, n: i64, offset: i64, buf: &mut [f64]) -> i64;

    fn write_chunk_uint8(&mut self, chunk: &str, offset: i64, buf: &[u8]);
    fn write_chunk_int16(&mut self, chunk: &str, offset: i64, buf: &[i16]);
    fn write_chunk_int32(&mut self, chunk: &str, offset: i64, buf: &[i32]);
    fn write_chunk_int64(&mut self, chunk: &str, offset: i64, buf: &[i64]);
    fn write_chunk_float32(&mut self, chunk: &str, offset: i64, buf: &[f32]);
    fn write_chunk_float64(&mut self, chunk: &str, offset: i64, buf: &[f64]);
}
