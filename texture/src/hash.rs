//! Content hashing of decoded textures.

const FNV_OFFSET_BASIS: u64 = 0xCBF2_9CE4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;

pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
    })
}

/// Hashes the top half of an RGBA8 image.
///
/// Only the first `height / 2` rows are considered (every row for images less than 2 pixels
/// tall), so that games streaming data into the bottom of a texture keep matching the same
/// replacement.
pub fn content_hash(rgba: &[u8], width: u16, height: u16) -> u64 {
    let rows = if height < 2 { height } else { height / 2 };
    let len = (rows as usize * width as usize * 4).min(rgba.len());
    fnv1a_64(&rgba[..len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_reference_values() {
        assert_eq!(fnv1a_64(b""), 0xCBF2_9CE4_8422_2325);
        assert_eq!(fnv1a_64(b"a"), 0xAF63_DC4C_8601_EC8C);
        assert_eq!(fnv1a_64(b"foobar"), 0x8594_4171_F739_67E8);
    }

    fn image(width: u16, height: u16, fill: u8) -> Vec<u8> {
        vec![fill; width as usize * height as usize * 4]
    }

    #[test]
    fn only_the_top_half_is_hashed() {
        let base = image(8, 8, 0x40);
        let mut bottom_changed = base.clone();
        bottom_changed[8 * 4 * 6] = 0;
        let mut top_changed = base.clone();
        top_changed[8 * 4 + 1] = 0;

        let hash = content_hash(&base, 8, 8);
        assert_eq!(hash, content_hash(&base, 8, 8));
        assert_eq!(hash, content_hash(&bottom_changed, 8, 8));
        assert_ne!(hash, content_hash(&top_changed, 8, 8));
    }

    #[test]
    fn single_row_images_hash_everything() {
        let a = image(8, 1, 1);
        let mut b = a.clone();
        b[31] = 2;
        assert_ne!(content_hash(&a, 8, 1), content_hash(&b, 8, 1));
    }
}
