//! Typed n-dimensional arrays and their raw byte layout.
//!
//! Numeric arrays travel as raw element bytes (native endianness, row-major)
//! next to their `shape` and `dtype`. Arrays of arbitrary values ("object"
//! dtype) cannot be laid out that way and are pickled instead, see
//! [`crate::opaque`].

use ndarray::{ArrayD, IxDyn};

use crate::error::{EncoderError, Result};
use crate::value::Value;

// ------------- DType -------------
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    Object,
}

impl DType {
    /// numpy-compatible type code
    pub fn code(&self) -> &'static str {
        match self {
            DType::Bool => "|b1",
            DType::Int32 => "<i4",
            DType::Int64 => "<i8",
            DType::Float32 => "<f4",
            DType::Float64 => "<f8",
            DType::Object => "|O",
        }
    }
    pub fn from_code(code: &str) -> Option<DType> {
        let bare = code.trim_start_matches(['<', '>', '|', '=']);
        match bare {
            "b1" | "?" | "bool" => Some(DType::Bool),
            "i4" | "int32" => Some(DType::Int32),
            "i8" | "int64" => Some(DType::Int64),
            "f4" | "float32" => Some(DType::Float32),
            "f8" | "float64" => Some(DType::Float64),
            "O" | "object" => Some(DType::Object),
            _ => None,
        }
    }
    pub fn item_size(&self) -> usize {
        match self {
            DType::Bool => 1,
            DType::Int32 | DType::Float32 => 4,
            DType::Int64 | DType::Float64 => 8,
            DType::Object => 0,
        }
    }
}

// ------------- NdArray -------------
#[derive(Clone, Debug, PartialEq)]
pub enum NdArray {
    Bool(ArrayD<bool>),
    Int32(ArrayD<i32>),
    Int64(ArrayD<i64>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
    Object(ArrayD<Value>),
}

fn pod_bytes<T: bytemuck::Pod>(array: &ArrayD<T>) -> Vec<u8> {
    let flat: Vec<T> = array.iter().copied().collect();
    bytemuck::cast_slice(&flat).to_vec()
}

fn pod_array<T: bytemuck::Pod>(data: &[u8], shape: &[usize]) -> Result<ArrayD<T>> {
    let size = std::mem::size_of::<T>();
    if data.len() % size != 0 {
        return Err(EncoderError::Shape(format!(
            "buffer of {} bytes is not a multiple of the element size {}",
            data.len(),
            size
        )));
    }
    let flat: Vec<T> = data
        .chunks_exact(size)
        .map(bytemuck::pod_read_unaligned)
        .collect();
    Ok(ArrayD::from_shape_vec(IxDyn(shape), flat)?)
}

fn nest(items: &mut impl Iterator<Item = Value>, shape: &[usize]) -> Value {
    match shape.split_first() {
        None => items.next().unwrap_or(Value::Null),
        Some((&n, rest)) => Value::List((0..n).map(|_| nest(items, rest)).collect()),
    }
}

fn flatten<'v>(value: &'v Value, shape: &[usize], depth: usize, leaves: &mut Vec<&'v Value>) -> Result<()> {
    if depth == shape.len() {
        leaves.push(value);
        return Ok(());
    }
    match value {
        Value::List(items) | Value::Tuple(items) if items.len() == shape[depth] => {
            for item in items {
                flatten(item, shape, depth + 1, leaves)?;
            }
            Ok(())
        }
        _ => Err(EncoderError::Shape(format!(
            "ragged nested sequence at depth {}, expected {} items",
            depth, shape[depth]
        ))),
    }
}

fn infer_dtype(leaves: &[&Value]) -> DType {
    if leaves.is_empty() {
        return DType::Float64;
    }
    if leaves.iter().all(|v| matches!(v, Value::Bool(_))) {
        DType::Bool
    } else if leaves.iter().all(|v| matches!(v, Value::Int(_))) {
        DType::Int64
    } else if leaves.iter().all(|v| matches!(v, Value::Int(_) | Value::Float(_))) {
        DType::Float64
    } else {
        DType::Object
    }
}

fn leaf_error(dtype: DType, leaf: &Value) -> EncoderError {
    EncoderError::invalid("array_from_nested", format!("{:?} is not a valid {} element", leaf, dtype.code()))
}

impl NdArray {
    pub fn dtype(&self) -> DType {
        match self {
            NdArray::Bool(_) => DType::Bool,
            NdArray::Int32(_) => DType::Int32,
            NdArray::Int64(_) => DType::Int64,
            NdArray::Float32(_) => DType::Float32,
            NdArray::Float64(_) => DType::Float64,
            NdArray::Object(_) => DType::Object,
        }
    }
    pub fn shape(&self) -> &[usize] {
        match self {
            NdArray::Bool(a) => a.shape(),
            NdArray::Int32(a) => a.shape(),
            NdArray::Int64(a) => a.shape(),
            NdArray::Float32(a) => a.shape(),
            NdArray::Float64(a) => a.shape(),
            NdArray::Object(a) => a.shape(),
        }
    }
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }
    /// The elements in row-major order, as values.
    pub fn elements(&self) -> Vec<Value> {
        match self {
            NdArray::Bool(a) => a.iter().map(|&b| Value::Bool(b)).collect(),
            NdArray::Int32(a) => a.iter().map(|&i| Value::Int(i64::from(i))).collect(),
            NdArray::Int64(a) => a.iter().map(|&i| Value::Int(i)).collect(),
            NdArray::Float32(a) => a.iter().map(|&x| Value::Float(f64::from(x))).collect(),
            NdArray::Float64(a) => a.iter().map(|&x| Value::Float(x)).collect(),
            NdArray::Object(a) => a.iter().cloned().collect(),
        }
    }
    /// Raw element bytes; `None` for object arrays.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match self {
            NdArray::Bool(a) => Some(a.iter().map(|&b| u8::from(b)).collect()),
            NdArray::Int32(a) => Some(pod_bytes(a)),
            NdArray::Int64(a) => Some(pod_bytes(a)),
            NdArray::Float32(a) => Some(pod_bytes(a)),
            NdArray::Float64(a) => Some(pod_bytes(a)),
            NdArray::Object(_) => None,
        }
    }
    pub fn from_bytes(data: &[u8], dtype: DType, shape: &[usize]) -> Result<NdArray> {
        match dtype {
            DType::Bool => {
                let flat = data.iter().map(|&b| b != 0).collect();
                Ok(NdArray::Bool(ArrayD::from_shape_vec(IxDyn(shape), flat)?))
            }
            DType::Int32 => Ok(NdArray::Int32(pod_array(data, shape)?)),
            DType::Int64 => Ok(NdArray::Int64(pod_array(data, shape)?)),
            DType::Float32 => Ok(NdArray::Float32(pod_array(data, shape)?)),
            DType::Float64 => Ok(NdArray::Float64(pod_array(data, shape)?)),
            DType::Object => Err(EncoderError::invalid(
                "array_from_bytes",
                "object arrays have no raw byte layout",
            )),
        }
    }
    /// Same elements in row-major order, laid out in `shape`.
    pub fn reshape(self, shape: &[usize]) -> Result<NdArray> {
        let dim = IxDyn(shape);
        let array = match self {
            NdArray::Bool(a) => NdArray::Bool(a.into_shape_with_order(dim)?),
            NdArray::Int32(a) => NdArray::Int32(a.into_shape_with_order(dim)?),
            NdArray::Int64(a) => NdArray::Int64(a.into_shape_with_order(dim)?),
            NdArray::Float32(a) => NdArray::Float32(a.into_shape_with_order(dim)?),
            NdArray::Float64(a) => NdArray::Float64(a.into_shape_with_order(dim)?),
            NdArray::Object(a) => NdArray::Object(a.into_shape_with_order(dim)?),
        };
        Ok(array)
    }
    /// Nested lists of the elements; a rank 0 array is its bare element.
    pub fn to_nested(&self) -> Value {
        let shape = self.shape().to_vec();
        nest(&mut self.elements().into_iter(), &shape)
    }
    /// Rebuilds an array from nested lists. The shape follows the nesting, the
    /// element type is inferred unless given.
    pub fn from_nested(value: &Value, dtype: Option<DType>) -> Result<NdArray> {
        let mut shape = Vec::new();
        let mut inner = value;
        while let Value::List(items) | Value::Tuple(items) = inner {
            shape.push(items.len());
            match items.first() {
                Some(first) => inner = first,
                None => break,
            }
        }
        let mut leaves = Vec::new();
        flatten(value, &shape, 0, &mut leaves)?;
        let dtype = dtype.unwrap_or_else(|| infer_dtype(&leaves));
        let dim = IxDyn(&shape);
        let array = match dtype {
            DType::Bool => NdArray::Bool(ArrayD::from_shape_vec(
                dim,
                leaves
                    .iter()
                    .map(|v| match v {
                        Value::Bool(b) => Ok(*b),
                        other => Err(leaf_error(dtype, other)),
                    })
                    .collect::<Result<_>>()?,
            )?),
            DType::Int32 => NdArray::Int32(ArrayD::from_shape_vec(
                dim,
                leaves
                    .iter()
                    .map(|v| match v {
                        Value::Int(i) => i32::try_from(*i).map_err(|_| leaf_error(dtype, v)),
                        other => Err(leaf_error(dtype, other)),
                    })
                    .collect::<Result<_>>()?,
            )?),
            DType::Int64 => NdArray::Int64(ArrayD::from_shape_vec(
                dim,
                leaves
                    .iter()
                    .map(|v| match v {
                        Value::Int(i) => Ok(*i),
                        other => Err(leaf_error(dtype, other)),
                    })
                    .collect::<Result<_>>()?,
            )?),
            DType::Float32 => NdArray::Float32(ArrayD::from_shape_vec(
                dim,
                leaves
                    .iter()
                    .map(|v| match v {
                        Value::Int(i) => Ok(*i as f32),
                        Value::Float(x) => Ok(*x as f32),
                        Value::Null => Ok(f32::NAN),
                        other => Err(leaf_error(dtype, other)),
                    })
                    .collect::<Result<_>>()?,
            )?),
            DType::Float64 => NdArray::Float64(ArrayD::from_shape_vec(
                dim,
                leaves
                    .iter()
                    .map(|v| match v {
                        Value::Int(i) => Ok(*i as f64),
                        Value::Float(x) => Ok(*x),
                        // JSON has no NaN literal, it comes back as null
                        Value::Null => Ok(f64::NAN),
                        other => Err(leaf_error(dtype, other)),
                    })
                    .collect::<Result<_>>()?,
            )?),
            DType::Object => NdArray::Object(ArrayD::from_shape_vec(
                dim,
                leaves.into_iter().cloned().collect(),
            )?),
        };
        Ok(array)
    }
}
