//! Cross-bundle consistency check.

/// True when `values` has fewer than two elements or every element equals
/// its predecessor.
pub fn all_equal<T: PartialEq>(values: &[T]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_equal() {
        assert!(all_equal::<u32>(&[]));
        assert!(all_equal(&[5]));
        assert!(all_equal(&[5, 5, 5]));
        assert!(!all_equal(&[5, 7]));
        assert!(!all_equal(&[5, 5, 7, 5]));
    }
}
