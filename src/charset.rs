//! Character set banks and designation.
//!
//! http://invisible-island.net/xterm/ctlseqs/ctlseqs.html

use std::char;

pub const NUM_BANKS: usize = 4;

/// The four designable slots. SO selects G1, SI selects G0.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bank {
    G0 = 0,
    G1 = 1,
    G2 = 2,
    G3 = 3,
}

impl Bank {
    pub fn idx(self) -> usize {
        self as usize
    }
}

/// Everything a slot can be designated to. Only the DEC special
/// graphics set translates; the national replacement sets are
/// placeholders.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Dec,
    Uk,
    Us,
    Nl,
    Fi,
    No,
    Fr,
    Ca,
    De,
    It,
    Sp,
    Sw,
    Ch,
}

impl Default for Charset {
    fn default() -> Charset {
        Charset::Utf8
    }
}

/// Map a code point through a charset. Pure; the DEC special graphics
/// glyphs live right above the control range in the font.
pub fn translate(charset: Charset, c: char) -> char {
    match charset {
        Charset::Dec => {
            let cp = c as u32;
            if cp > 0x5f {
                char::from_u32(cp - 0x5f).unwrap_or(c)
            } else {
                c
            }
        }
        _ => c,
    }
}

/// Which slot an `ESC ( ) - * . + /` designation addresses.
pub fn bank_for(intermediate: u8) -> Option<Bank> {
    match intermediate {
        b'(' => Some(Bank::G0),
        b')' | b'-' => Some(Bank::G1),
        b'*' | b'.' => Some(Bank::G2),
        b'+' | b'/' => Some(Bank::G3),
        _ => None,
    }
}

/// Which charset a designation final byte selects.
pub fn charset_for(function: u8) -> Option<Charset> {
    match function {
        b'0' => Some(Charset::Dec),
        b'A' => Some(Charset::Uk),
        b'B' => Some(Charset::Us),
        b'4' => Some(Charset::Nl),
        b'C' | b'5' => Some(Charset::Fi),
        b'R' => Some(Charset::Fr),
        b'Q' => Some(Charset::Ca),
        b'K' => Some(Charset::De),
        b'Y' => Some(Charset::It),
        b'E' | b'6' => Some(Charset::No),
        b'Z' => Some(Charset::Sp),
        b'H' | b'7' => Some(Charset::Sw),
        b'=' => Some(Charset::Ch),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dec_graphics_shift() {
        // 'q' is the horizontal line glyph slot.
        assert_eq!(translate(Charset::Dec, 'q'), '\u{12}');
        assert_eq!(translate(Charset::Dec, '`'), '\u{01}');
        // At or below 0x5f nothing moves.
        assert_eq!(translate(Charset::Dec, 'A'), 'A');
        assert_eq!(translate(Charset::Dec, '_'), '_');
    }

    #[test]
    fn national_sets_are_identity() {
        for &cs in &[Charset::Utf8, Charset::Uk, Charset::De, Charset::Sw] {
            assert_eq!(translate(cs, '#'), '#');
            assert_eq!(translate(cs, '~'), '~');
        }
    }

    #[test]
    fn designation_tables() {
        assert_eq!(bank_for(b'('), Some(Bank::G0));
        assert_eq!(bank_for(b'-'), Some(Bank::G1));
        assert_eq!(bank_for(b'.'), Some(Bank::G2));
        assert_eq!(bank_for(b'/'), Some(Bank::G3));
        assert_eq!(bank_for(b'%'), None);

        assert_eq!(charset_for(b'0'), Some(Charset::Dec));
        assert_eq!(charset_for(b'B'), Some(Charset::Us));
        assert_eq!(charset_for(b'5'), Some(Charset::Fi));
        assert_eq!(charset_for(b'7'), Some(Charset::Sw));
        assert_eq!(charset_for(b'x'), None);
    }
}
