//! Shape broadcasting for element-wise operations.
//!
//! Shapes are aligned at their trailing axes. Two axis lengths are compatible
//! if they are equal or if one of them is 1, and the broadcast length is the
//! larger of the two. Missing leading axes count as length 1.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("shapes {lhs:?} and {rhs:?} can not be broadcast together")]
pub struct BroadcastError {
    pub lhs: Vec<usize>,
    pub rhs: Vec<usize>,
}

/// Compute the shape two arrays broadcast to.
pub fn broadcast_shapes(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>, BroadcastError> {
    let ndim = lhs.len().max(rhs.len());
    let mut shape = vec![0usize; ndim];

    for (axis, out) in shape.iter_mut().rev().enumerate() {
        let a = axis_len(lhs, axis);
        let b = axis_len(rhs, axis);
        *out = match (a, b) {
            (a, b) if a == b => a,
            (1, b) => b,
            (a, 1) => a,
            _ => {
                return Err(BroadcastError {
                    lhs: lhs.to_vec(),
                    rhs: rhs.to_vec(),
                })
            }
        };
    }

    Ok(shape)
}

/// Broadcast shape of any number of arrays.
pub fn broadcast_all<'a>(
    shapes: impl IntoIterator<Item = &'a [usize]>,
) -> Result<Vec<usize>, BroadcastError> {
    shapes
        .into_iter()
        .try_fold(Vec::new(), |acc, shape| broadcast_shapes(&acc, shape))
}

/// Length of the axis `axis` positions from the end, 1 if the shape is too short.
fn axis_len(shape: &[usize], axis: usize) -> usize {
    if axis < shape.len() {
        shape[shape.len() - 1 - axis]
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scalar_against_vector() {
        assert_eq!(broadcast_shapes(&[], &[3]).unwrap(), vec![3]);
        assert_eq!(broadcast_shapes(&[3], &[]).unwrap(), vec![3]);
        assert_eq!(broadcast_shapes(&[], &[]).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn trailing_alignment() {
        assert_eq!(broadcast_shapes(&[5, 3], &[3]).unwrap(), vec![5, 3]);
        assert_eq!(broadcast_shapes(&[5, 1], &[3]).unwrap(), vec![5, 3]);
        assert_eq!(broadcast_shapes(&[4, 1, 2], &[3, 1]).unwrap(), vec![4, 3, 2]);
    }

    #[test]
    fn zero_length_axis() {
        assert_eq!(broadcast_shapes(&[0], &[1]).unwrap(), vec![0]);
        assert!(broadcast_shapes(&[0], &[2]).is_err());
    }

    #[test]
    fn incompatible() {
        let err = broadcast_shapes(&[5, 3], &[4]).unwrap_err();
        assert_eq!(err.lhs, vec![5, 3]);
        assert_eq!(err.rhs, vec![4]);
        assert_eq!(
            err.to_string(),
            "shapes [5, 3] and [4] can not be broadcast together"
        );
    }

    #[test]
    fn many_shapes() {
        let shapes: [&[usize]; 3] = [&[3], &[2, 1], &[]];
        assert_eq!(broadcast_all(shapes).unwrap(), vec![2, 3]);
        let shapes: [&[usize]; 3] = [&[3], &[2, 1], &[4]];
        assert!(broadcast_all(shapes).is_err());
    }
}
