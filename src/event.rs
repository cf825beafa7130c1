pub const COLOR_MASK: u32 = 0x00FF_FFFF;
pub const WHITE: u32 = 0x00FF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelEvent {
    pub x: u32,
    pub y: u32,
    pub valid: bool,
    pub color: u32,
}

impl PixelEvent {
    pub fn new(x: u32, y: u32, valid: bool, color: u32) -> Self {
        PixelEvent { x, y, valid, color }
    }

    /// Splits the low 24 bits of the color into (r, g, b).
    pub fn rgb(&self) -> (u8, u8, u8) {
        rgb(self.color)
    }
}

pub fn rgb(color: u32) -> (u8, u8, u8) {
    (
        ((color >> 16) & 0xFF) as u8,
        ((color >> 8) & 0xFF) as u8,
        (color & 0xFF) as u8,
    )
}

/// Parses a hex color, accepting an optional `0x` or `#` prefix. Digits
/// beyond the low 24 bits are dropped.
pub fn parse_hex_color(text: &str) -> Result<u32, String> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_prefix('#'))
        .unwrap_or(text);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("Invalid hex color: {:?}", text));
    }

    let color = digits
        .chars()
        .filter_map(|c| c.to_digit(16))
        .fold(0u32, |acc, nibble| (acc << 4) | nibble);

    Ok(color & COLOR_MASK)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rgb_decoding() {
        let color = parse_hex_color("1A2B3C").unwrap();
        assert_eq!(rgb(color), (0x1A, 0x2B, 0x3C));
    }

    #[test]
    fn test_rgb_ignores_high_byte() {
        let event = PixelEvent::new(0, 0, true, 0xAB12_3456);
        assert_eq!(event.rgb(), (0x12, 0x34, 0x56));
    }

    #[test]
    fn test_hex_prefixes() {
        assert_eq!(parse_hex_color("0xff0000"), Ok(0xFF0000));
        assert_eq!(parse_hex_color("#00FF00"), Ok(0x00FF00));
        assert_eq!(parse_hex_color("ff"), Ok(0xFF));
    }

    #[test]
    fn test_hex_rejects_garbage() {
        assert!(parse_hex_color("").is_err());
        assert!(parse_hex_color("0x").is_err());
        assert!(parse_hex_color("12G4").is_err());
        assert!(parse_hex_color("-1").is_err());
    }

    #[test]
    fn test_hex_wide_values_keep_low_bits() {
        assert_eq!(parse_hex_color("1FF0000FF"), Ok(0x0000FF));
        assert_eq!(parse_hex_color("AB123456"), Ok(0x123456));
        assert_eq!(parse_hex_color("0xDEADBEEFCAFEF00D"), Ok(0xFEF00D));
        assert_eq!(parse_hex_color("00000000000000FF8800"), Ok(0xFF8800));
    }
}
