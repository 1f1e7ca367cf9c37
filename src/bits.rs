//! Bit-pattern matching and substitution over 16-bit code units.
//!
//! A pattern is a string of sixteen characters. The digits '0' and '1'
//! match (or emit) literal bits; letters name captured fields, lowercase
//! for integers and uppercase for registers. A field's bits need not be
//! contiguous; they are assembled high bits first, in pattern order.

/// The fields extracted from a matched pattern, in order of first
/// appearance.
pub type Fields = Vec<(char, u16)>;

/// Try to match `word` against `pattern`, returning the captured fields.
pub fn match_bits(pattern: &str, word: u16) -> Option<Fields> {
    debug_assert_eq!(pattern.len(), 16);

    let mut fields: Fields = Vec::new();
    for (i, pattern_bit) in pattern.chars().enumerate() {
        let real_bit = (word >> (15 - i)) & 1;
        match pattern_bit {
            '0' => {
                if real_bit != 0 {
                    return None;
                }
            }
            '1' => {
                if real_bit != 1 {
                    return None;
                }
            }
            letter => {
                match fields.iter_mut().find(|(name, _)| *name == letter) {
                    Some((_, value)) => *value = (*value << 1) | real_bit,
                    None => fields.push((letter, real_bit)),
                }
            }
        }
    }
    Some(fields)
}

/// Emit a word from `pattern`, filling each field's bits from `fields`.
/// The inverse of [`match_bits`].
pub fn substitute_bits(pattern: &str, fields: &Fields) -> u16 {
    debug_assert_eq!(pattern.len(), 16);

    // How many bits of each field remain to be emitted.
    let mut remaining: Vec<(char, u32)> = Vec::new();
    for c in pattern.chars() {
        if c != '0' && c != '1' {
            match remaining.iter_mut().find(|(name, _)| *name == c) {
                Some((_, count)) => *count += 1,
                None => remaining.push((c, 1)),
            }
        }
    }

    let mut word = 0u16;
    for c in pattern.chars() {
        let bit = match c {
            '0' => 0,
            '1' => 1,
            letter => {
                let (_, count) = remaining
                    .iter_mut()
                    .find(|(name, _)| *name == letter)
                    .expect("field accounted for above");
                *count -= 1;
                let value = fields
                    .iter()
                    .find(|(name, _)| *name == letter)
                    .map(|(_, v)| *v)
                    .unwrap_or(0);
                (value >> *count) & 1
            }
        };
        word = (word << 1) | bit;
    }
    word
}
