//! Binary encoding of the parameters of a model.
//!
//! Every parameter is written in traversal order as its row count and column count, both
//! `u32` little endian, followed by its values as raw `f32`s in row-major order.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, ErrorKind, Read, Write},
    path::Path,
};

use log::debug;

use super::Model;
use crate::{MlErr, Result};

const HEADER_SIZE: usize = 2 * size_of::<u32>();

/// Writes every parameter value of `model` into `sink`.
///
/// # Returns
/// The amount of bytes written.
pub fn serialize<M: Model + ?Sized>(model: &M, sink: &mut dyn Write) -> Result<usize> {
    let mut written = 0;

    for param in model.params() {
        let (rows, cols) = param.shape();
        let mut header = [0; HEADER_SIZE];
        header[..4].copy_from_slice(&dim_to_u32(rows)?.to_le_bytes());
        header[4..].copy_from_slice(&dim_to_u32(cols)?.to_le_bytes());
        sink.write_all(&header)?;

        let data: Vec<f32> = param.value().iter().copied().collect();
        let bytes: &[u8] = bytemuck::cast_slice(&data);
        sink.write_all(bytes)?;

        written += HEADER_SIZE + bytes.len();
    }

    sink.flush()?;
    Ok(written)
}

/// Restores every parameter value of `model` from `source`.
///
/// The whole stream is read and checked against the live parameters before writing any
/// of them, a rejected stream leaves `model` untouched.
///
/// # Returns
/// The amount of bytes read or a `StructuralMismatch` error if the amount of parameters,
/// any of their shapes or the length of the stream disagree with `model`.
pub fn deserialize<M: Model + ?Sized>(model: &mut M, source: &mut dyn Read) -> Result<usize> {
    let shapes: Vec<_> = model.params().iter().map(|param| param.shape()).collect();
    let mut values = Vec::with_capacity(shapes.len());
    let mut read = 0;

    for (i, &(rows, cols)) in shapes.iter().enumerate() {
        let mut header = [0; HEADER_SIZE];
        read_exact(source, &mut header, || {
            format!("expected {} parameters but the stream has {i}", shapes.len())
        })?;

        let mut dim = [0; 4];
        dim.copy_from_slice(&header[..4]);
        let got_rows = u32::from_le_bytes(dim) as usize;
        dim.copy_from_slice(&header[4..]);
        let got_cols = u32::from_le_bytes(dim) as usize;

        if (got_rows, got_cols) != (rows, cols) {
            return Err(MlErr::StructuralMismatch(format!(
                "parameter {i} is {got_rows}x{got_cols} in the stream and {rows}x{cols} in the model"
            )));
        }

        let mut data = vec![0f32; rows * cols];
        read_exact(source, bytemuck::cast_slice_mut(&mut data), || {
            format!("the stream ends in the middle of parameter {i}")
        })?;

        read += HEADER_SIZE + data.len() * size_of::<f32>();
        values.push(data);
    }

    if source.read(&mut [0u8])? != 0 {
        return Err(MlErr::StructuralMismatch(format!(
            "trailing bytes after {} parameters",
            shapes.len()
        )));
    }

    let mut values = values.into_iter();
    model.for_each_param_mut(&mut |param| {
        if let Some(data) = values.next() {
            param
                .value_mut()
                .iter_mut()
                .zip(data)
                .for_each(|(v, d)| *v = d);
        }
    });

    Ok(read)
}

/// Writes `model` into the file at `path`.
///
/// The parameters are first written to a sibling temporary file which is then renamed over
/// `path`, so readers either see the previous file or the complete new one.
pub fn save<M: Model + ?Sized>(model: &M, path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    let tmp = path.with_extension("tmp");

    let mut sink = BufWriter::new(File::create(&tmp)?);
    let written = serialize(model, &mut sink)?;
    sink.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    fs::rename(&tmp, path)?;

    debug!(bytes = written, path:? = path; "saved model");
    Ok(written)
}

/// Restores `model` from the file at `path`.
pub fn load<M: Model + ?Sized>(model: &mut M, path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    let mut source = BufReader::new(File::open(path)?);
    let read = deserialize(model, &mut source)?;

    debug!(bytes = read, path:? = path; "loaded model");
    Ok(read)
}

fn dim_to_u32(dim: usize) -> Result<u32> {
    u32::try_from(dim).map_err(|_| {
        MlErr::StructuralMismatch(format!("dimension {dim} doesn't fit in the encoding"))
    })
}

fn read_exact<F>(source: &mut dyn Read, buf: &mut [u8], on_eof: F) -> Result<()>
where
    F: FnOnce() -> String,
{
    source.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => MlErr::StructuralMismatch(on_eof()),
        _ => MlErr::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use ndarray::array;

    use super::*;
    use crate::arch::{Layer, LinearRegression, Stack, activations::ActFn};

    fn model() -> Stack {
        let mut stack = Stack::new([
            Layer::perceptron(2, 3, ActFn::ReLU),
            Layer::linear_regression(3, 1),
        ]);

        let mut next = 0.0;
        stack.for_each_param_mut(&mut |param| {
            param.value_mut().iter_mut().for_each(|v| {
                next += 0.5;
                *v = next;
            })
        });
        stack
    }

    fn values(model: &dyn Model) -> Vec<Vec<f32>> {
        model
            .params()
            .iter()
            .map(|p| p.value().iter().copied().collect())
            .collect()
    }

    #[test]
    fn restores_the_same_values() {
        let source = model();
        let mut buf = Vec::new();
        let written = source.serialize(&mut buf).unwrap();
        assert_eq!(written, buf.len());
        assert_eq!(written, 3 * HEADER_SIZE + (6 + 3 + 3) * 4);

        let mut target = Stack::new([
            Layer::perceptron(2, 3, ActFn::ReLU),
            Layer::linear_regression(3, 1),
        ]);
        let read = target.deserialize(&mut Cursor::new(&buf)).unwrap();

        assert_eq!(read, written);
        assert_eq!(values(&target), values(&source));
    }

    #[test]
    fn header_is_little_endian() {
        let mut model = LinearRegression::new(3, 2);
        model.for_each_param_mut(&mut |w| w.value_mut().assign(&array![[1., 2., 3.], [4., 5., 6.]]));

        let mut buf = Vec::new();
        model.serialize(&mut buf).unwrap();

        assert_eq!(&buf[..8], &[2, 0, 0, 0, 3, 0, 0, 0]);
        let data: Vec<f32> = buf[8..]
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(data, [1., 2., 3., 4., 5., 6.]);
    }

    #[test]
    fn shape_mismatch_leaves_the_model_untouched() {
        let mut buf = Vec::new();
        model().serialize(&mut buf).unwrap();

        let mut target = Stack::new([
            Layer::perceptron(2, 3, ActFn::ReLU),
            Layer::linear_regression(3, 2),
        ]);
        let res = target.deserialize(&mut Cursor::new(&buf));

        assert!(matches!(res, Err(MlErr::StructuralMismatch(_))));
        assert!(values(&target).iter().flatten().all(|&v| v == 0.));
    }

    #[test]
    fn missing_and_trailing_params_are_rejected() {
        let mut buf = Vec::new();
        model().serialize(&mut buf).unwrap();

        let mut bigger = Stack::new([
            Layer::perceptron(2, 3, ActFn::ReLU),
            Layer::perceptron(3, 1, ActFn::Identity),
        ]);
        let res = bigger.deserialize(&mut Cursor::new(&buf));
        assert!(matches!(res, Err(MlErr::StructuralMismatch(_))));

        let mut smaller = Stack::new([Layer::perceptron(2, 3, ActFn::ReLU)]);
        let res = smaller.deserialize(&mut Cursor::new(&buf));
        assert!(matches!(res, Err(MlErr::StructuralMismatch(_))));

        let truncated = &buf[..buf.len() - 1];
        let mut same = model();
        let res = same.deserialize(&mut Cursor::new(truncated));
        assert!(matches!(res, Err(MlErr::StructuralMismatch(_))));
    }

    #[test]
    fn save_then_load_through_a_file() {
        let dir = std::env::temp_dir().join(format!("codec-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("model.bin");

        let source = model();
        save(&source, &path).unwrap();
        assert!(!path.with_extension("tmp").exists());

        let mut target = Stack::new([
            Layer::perceptron(2, 3, ActFn::ReLU),
            Layer::linear_regression(3, 1),
        ]);
        load(&mut target, &path).unwrap();
        assert_eq!(values(&target), values(&source));

        fs::remove_dir_all(dir).unwrap();
    }
}
