use crate::{Npy, ReadNpyError, ReadNpyExt, ReadableElement};
use ndarray::{prelude::*, DataOwned, IntoDimension as _};

impl<A> Npy<A> {
    /// Converts the decoded array into an `ndarray` array with dimension `D`.
    ///
    /// Column-major data produces an array with Fortran memory layout, so
    /// logical indices match the ones used by the writer.
    ///
    /// # Example
    ///
    /// ```
    /// use ndarray::{array, Array2};
    /// use npy_loader::decode_npy;
    ///
    /// let header = b"{'descr': '|u1', 'fortran_order': True, 'shape': (2, 2), }\n";
    /// let mut bytes = b"\x93NUMPY\x01\x00".to_vec();
    /// bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    /// bytes.extend_from_slice(header);
    /// bytes.extend_from_slice(&[1, 2, 3, 4]);
    ///
    /// let arr: Array2<u8> = decode_npy::<u8>(&bytes)?.into_array()?;
    /// assert_eq!(arr, array![[1, 3], [2, 4]]);
    /// # Ok::<_, npy_loader::ReadNpyError>(())
    /// ```
    pub fn into_array<S, D>(self) -> Result<ArrayBase<S, D>, ReadNpyError>
    where
        S: DataOwned<Elem = A>,
        D: Dimension,
    {
        let (shape, fortran_order, data) = self.into_parts();
        let shape = shape.into_dimension();
        let ndim = shape.ndim();
        ArrayBase::<S, IxDyn>::from_shape_vec(shape.set_f(fortran_order), data)?
            .into_dimensionality()
            .map_err(|_| ReadNpyError::WrongNdim(D::NDIM, ndim))
    }
}

impl<A, S, D> ReadNpyExt for ArrayBase<S, D>
where
    A: ReadableElement,
    S: DataOwned<Elem = A>,
    D: Dimension,
{
    fn from_npy_bytes(bytes: &[u8]) -> Result<Self, ReadNpyError> {
        Npy::<A>::from_bytes(bytes)?.into_array()
    }
}
