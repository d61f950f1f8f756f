//! Launch-shape helpers shared by the families.

use crate::error::ResolveError;

/// Default limit on the first two tensor dimensions.
pub const GPU_TENSOR_MAX_WIDTH: usize = 65536;

/// The first `min(rank, 2)` dimensions must be non-zero and below `max_width`.
pub fn check_shape(tensor: &str, shape: &[usize], max_width: usize) -> Result<(), ResolveError> {
    if let Some(&dim) = shape.iter().take(2).find(|&&d| d == 0 || d >= max_width) {
        return Err(ResolveError::InvalidShape {
            tensor: tensor.to_string(),
            shape: shape.to_vec(),
            reason: format!("dimension {} outside 1..{}", dim, max_width),
        });
    }
    Ok(())
}

/// Collapse an element-wise shape to rank 2.
///
/// Empty shapes become `[0, 1]` so [`check_shape`] rejects them. Totals below
/// `max_width` become `[n, 1]`; larger totals are split on the
/// largest divisor below `max_width`. When no split fits, `[n, 1]` is returned
/// and [`check_shape`] rejects it.
pub fn optimize_element_shape(shape: &[usize], max_width: usize) -> Vec<usize> {
    let total: usize = shape.iter().product();
    if total == 0 {
        return vec![0, 1];
    }
    if total == 1 {
        return vec![1, 1];
    }
    if total < max_width {
        return vec![total, 1];
    }

    let divisor = (1..max_width.min(total)).rev().find(|d| total % d == 0);
    match divisor {
        Some(d) if total / d < max_width => vec![d, total / d],
        _ => vec![total, 1],
    }
}

/// A shape launches as 2-D when it has no third dimension or it is 1.
pub fn is_image_2d(shape: &[usize]) -> bool {
    shape.len() < 3 || shape[2] == 1
}

/// Dimension `i`, or 1 when the shape has fewer dimensions.
pub fn dim(shape: &[usize], i: usize) -> usize {
    shape.get(i).copied().unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_shape_limits() {
        assert!(check_shape("input", &[65535, 4, 100000], GPU_TENSOR_MAX_WIDTH).is_ok());
        assert!(check_shape("input", &[65536, 4], GPU_TENSOR_MAX_WIDTH).is_err());
        assert!(check_shape("input", &[4, 0], GPU_TENSOR_MAX_WIDTH).is_err());
        assert!(check_shape("input", &[8], 8).is_err());
    }

    #[test]
    fn test_optimize_small_shapes() {
        assert_eq!(optimize_element_shape(&[1, 1, 1], GPU_TENSOR_MAX_WIDTH), vec![1, 1]);
        assert_eq!(optimize_element_shape(&[4, 5, 6], GPU_TENSOR_MAX_WIDTH), vec![120, 1]);
    }

    #[test]
    fn test_optimize_keeps_empty_shapes_empty() {
        let shape = optimize_element_shape(&[0, 4], GPU_TENSOR_MAX_WIDTH);
        assert_eq!(shape, vec![0, 1]);
        assert!(check_shape("input0", &shape, GPU_TENSOR_MAX_WIDTH).is_err());
    }

    #[test]
    fn test_optimize_splits_large_totals() {
        // 2^17 = 32768 * 4
        assert_eq!(optimize_element_shape(&[512, 256], GPU_TENSOR_MAX_WIDTH), vec![32768, 4]);
        let split = optimize_element_shape(&[1000, 1000], GPU_TENSOR_MAX_WIDTH);
        assert_eq!(split[0] * split[1], 1_000_000);
        assert!(split[0] < GPU_TENSOR_MAX_WIDTH);
    }

    #[test]
    fn test_optimize_gives_up_on_primes() {
        // 65537 is prime
        assert_eq!(optimize_element_shape(&[65537], GPU_TENSOR_MAX_WIDTH), vec![65537, 1]);
    }

    #[test]
    fn test_image_2d() {
        assert!(is_image_2d(&[8, 8]));
        assert!(is_image_2d(&[8, 8, 1, 3]));
        assert!(!is_image_2d(&[8, 8, 2]));
        assert_eq!(dim(&[8, 8], 3), 1);
    }
}
