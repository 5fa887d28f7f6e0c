//! Operand descriptors: the read-only view of an array this crate plans over.

use num_complex::{Complex32, Complex64};

use crate::array::{col_major_strides, row_major_strides};

/// Element type tag, used for code generation and allocation bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Complex64,
    Complex128,
}

impl DType {
    /// The C spelling used by [`crate::render_c`].
    pub fn c_name(self) -> &'static str {
        match self {
            DType::Bool => "npy_bool",
            DType::I8 => "npy_int8",
            DType::I16 => "npy_int16",
            DType::I32 => "npy_int32",
            DType::I64 => "npy_int64",
            DType::U8 => "npy_uint8",
            DType::U16 => "npy_uint16",
            DType::U32 => "npy_uint32",
            DType::U64 => "npy_uint64",
            DType::F32 => "npy_float32",
            DType::F64 => "npy_float64",
            DType::Complex64 => "npy_complex64",
            DType::Complex128 => "npy_complex128",
        }
    }

    /// Size of one element in bytes.
    pub fn size_of(self) -> usize {
        match self {
            DType::Bool | DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 => 2,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::I64 | DType::U64 | DType::F64 | DType::Complex64 => 8,
            DType::Complex128 => 16,
        }
    }
}

/// Rust element types with a known [`DType`].
pub trait Element: Copy + Default + Send + Sync + 'static {
    const DTYPE: DType;
}

macro_rules! impl_element {
    ($($t:ty => $d:ident),* $(,)?) => {
        $(impl Element for $t {
            const DTYPE: DType = DType::$d;
        })*
    };
}

impl_element! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Complex32 => Complex64,
    Complex64 => Complex128,
}

/// Shape and stride metadata of one operand.
///
/// Strides are in element units. The planner never mutates this metadata.
pub trait StridedOperand {
    fn rank(&self) -> usize;

    /// Length of physical dimension `dim`.
    fn dim(&self, dim: usize) -> usize;

    /// Stride of physical dimension `dim`, in elements.
    fn stride(&self, dim: usize) -> isize;

    fn dtype(&self) -> DType;
}

impl<A: StridedOperand + ?Sized> StridedOperand for &A {
    fn rank(&self) -> usize {
        (**self).rank()
    }
    fn dim(&self, dim: usize) -> usize {
        (**self).dim(dim)
    }
    fn stride(&self, dim: usize) -> isize {
        (**self).stride(dim)
    }
    fn dtype(&self) -> DType {
        (**self).dtype()
    }
}

/// Plain owned operand metadata, for planning without a backing array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperandDesc {
    dims: Vec<usize>,
    strides: Vec<isize>,
    dtype: DType,
}

impl OperandDesc {
    /// Create a descriptor with explicit strides.
    ///
    /// # Panics
    /// Panics if `dims` and `strides` have different lengths.
    pub fn new(dims: &[usize], strides: &[isize], dtype: DType) -> Self {
        assert_eq!(dims.len(), strides.len(), "dims and strides length mismatch");
        Self {
            dims: dims.to_vec(),
            strides: strides.to_vec(),
            dtype,
        }
    }

    /// Contiguous row-major `f64` operand.
    pub fn row_major(dims: &[usize]) -> Self {
        Self::new(dims, &row_major_strides(dims), DType::F64)
    }

    /// Contiguous column-major `f64` operand.
    pub fn col_major(dims: &[usize]) -> Self {
        Self::new(dims, &col_major_strides(dims), DType::F64)
    }

    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }
}

impl StridedOperand for OperandDesc {
    fn rank(&self) -> usize {
        self.dims.len()
    }
    fn dim(&self, dim: usize) -> usize {
        self.dims[dim]
    }
    fn stride(&self, dim: usize) -> isize {
        self.strides[dim]
    }
    fn dtype(&self) -> DType {
        self.dtype
    }
}
