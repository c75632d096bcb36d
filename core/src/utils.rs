#[inline]
pub fn read_u16_le(bytes: &[u8], addr: usize) -> u16 {
    u16::from_le_bytes([bytes[addr], bytes[addr + 1]])
}

#[inline]
pub fn zeroed_boxed_slice(len: usize) -> Box<[u8]> {
    vec![0; len].into_boxed_slice()
}
