pub fn is_power_of_two_u64(value: u64) -> bool {
    value != 0 && (value & (value - 1)) == 0
}

/// Rounds `size` up to the next multiple of `required_alignment`. The alignment must be a power of
/// two.
pub fn round_size_up_to_alignment_u64(
    size: u64,
    required_alignment: u64,
) -> u64 {
    assert!(is_power_of_two_u64(required_alignment));
    (size + required_alignment - 1) & !(required_alignment - 1)
}

/// Same as `round_size_up_to_alignment_u64` but returns None instead of overflowing
pub fn checked_round_size_up_to_alignment_u64(
    size: u64,
    required_alignment: u64,
) -> Option<u64> {
    if !is_power_of_two_u64(required_alignment) {
        return None;
    }

    size.checked_add(required_alignment - 1)
        .map(|padded| padded & !(required_alignment - 1))
}

pub fn round_size_up_to_alignment_u32(
    size: u32,
    required_alignment: u32,
) -> u32 {
    round_size_up_to_alignment_u64(size as u64, required_alignment as u64) as u32
}

pub fn slice_size_in_bytes<T>(slice: &[T]) -> usize {
    std::mem::size_of_val(slice)
}

/// View a slice of plain data as bytes, used when staging CPU data into mapped GPU memory
pub fn slice_as_bytes<T: Copy>(slice: &[T]) -> &[u8] {
    let ptr = slice.as_ptr() as *const u8;
    unsafe { std::slice::from_raw_parts(ptr, slice_size_in_bytes(slice)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_up() {
        assert_eq!(round_size_up_to_alignment_u64(0, 256), 0);
        assert_eq!(round_size_up_to_alignment_u64(1, 256), 256);
        assert_eq!(round_size_up_to_alignment_u64(256, 256), 256);
        assert_eq!(round_size_up_to_alignment_u64(257, 256), 512);
        assert_eq!(round_size_up_to_alignment_u32(3, 4), 4);
    }

    #[test]
    fn test_checked_round_up() {
        assert_eq!(checked_round_size_up_to_alignment_u64(5, 4), Some(8));
        assert_eq!(checked_round_size_up_to_alignment_u64(5, 3), None);
        assert_eq!(checked_round_size_up_to_alignment_u64(u64::MAX, 4), None);
    }

    #[test]
    fn test_slice_as_bytes() {
        let data = [1u32, 2u32];
        let bytes = slice_as_bytes(&data);
        assert_eq!(bytes.len(), 8);
        assert_eq!(u32::from_ne_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 2);
    }
}
