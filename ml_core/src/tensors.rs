use ndarray::{ArrayViewD, ArrayViewMutD};

use crate::Float;

/// A fixed-schema record of parameter (or gradient) arrays.
///
/// Parameter records and gradient records share a type, so `tensors` of a
/// gradient record lines up one-to-one with `tensors_mut` of the parameters it
/// was computed for. This is the seam an external optimizer drives.
pub trait Tensors {
    /// Views of every array in the record, in a fixed order.
    fn tensors(&self) -> Vec<ArrayViewD<'_, Float>>;

    /// Mutable views of every array in the record, in the same order as `tensors`.
    fn tensors_mut(&mut self) -> Vec<ArrayViewMutD<'_, Float>>;

    /// Total amount of scalar parameters in the record.
    fn size(&self) -> usize {
        self.tensors().iter().map(|t| t.len()).sum()
    }
}
