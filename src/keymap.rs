//! Static keypress translation table.
//!
//! Maps a key symbol plus modifier mask to the byte sequence a VT220
//! sends. The modifier bits use the X11 mask values so a display
//! frontend can pass its state word straight through. Keys that are not
//! in the table are left to the embedder, which should forward the
//! composed text itself.

bitflags! {
    pub struct KeyMod: u32 {
        const SHIFT   = 0x01; /* ShiftMask */
        const LOCK    = 0x02; /* LockMask */
        const CONTROL = 0x04; /* ControlMask */
        const ALT     = 0x08; /* Mod1Mask */
        const NONE    = 0;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keysym {
    Return,
    BackSpace,
    Tab,
    Up,
    Down,
    Right,
    Left,
    Home,
    End,
    Insert,
    Delete,
    PageUp,
    PageDown,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

pub struct KeyBinding {
    pub key: Keysym,
    pub mods: KeyMod,
    pub out: &'static str,
}

/// Capability names alongside each entry match the terminfo description.
pub static KEYMAP: &'static [KeyBinding] = &[
    KeyBinding { key: Keysym::Up,        mods: KeyMod::NONE,  out: "\x1b[A" },    /* kcuu1 */
    KeyBinding { key: Keysym::Down,      mods: KeyMod::NONE,  out: "\x1b[B" },    /* kcud1 */
    KeyBinding { key: Keysym::Right,     mods: KeyMod::NONE,  out: "\x1b[C" },    /* kcuf1 */
    KeyBinding { key: Keysym::Left,      mods: KeyMod::NONE,  out: "\x1b[D" },    /* kcub1 */
    KeyBinding { key: Keysym::Home,      mods: KeyMod::NONE,  out: "\x1b[1~" },   /* khome */
    KeyBinding { key: Keysym::Insert,    mods: KeyMod::NONE,  out: "\x1b[2~" },   /* kich1 */
    KeyBinding { key: Keysym::Delete,    mods: KeyMod::NONE,  out: "\x1b[3~" },   /* kdch1 */
    KeyBinding { key: Keysym::End,       mods: KeyMod::NONE,  out: "\x1b[4~" },   /* kend */
    KeyBinding { key: Keysym::PageUp,    mods: KeyMod::NONE,  out: "\x1b[5~" },   /* kpp */
    KeyBinding { key: Keysym::PageDown,  mods: KeyMod::NONE,  out: "\x1b[6~" },   /* knp */
    KeyBinding { key: Keysym::BackSpace, mods: KeyMod::NONE,  out: "\x7f" },      /* kbs */
    KeyBinding { key: Keysym::Tab,       mods: KeyMod::SHIFT, out: "\x1b[Z" },    /* kcbt */
    KeyBinding { key: Keysym::F1,        mods: KeyMod::NONE,  out: "\x1bOP" },    /* kf1 */
    KeyBinding { key: Keysym::F2,        mods: KeyMod::NONE,  out: "\x1bOQ" },    /* kf2 */
    KeyBinding { key: Keysym::F3,        mods: KeyMod::NONE,  out: "\x1bOR" },    /* kf3 */
    KeyBinding { key: Keysym::F4,        mods: KeyMod::NONE,  out: "\x1bOS" },    /* kf4 */
    KeyBinding { key: Keysym::F5,        mods: KeyMod::NONE,  out: "\x1b[15~" },  /* kf5 */
    KeyBinding { key: Keysym::F6,        mods: KeyMod::NONE,  out: "\x1b[17~" },  /* kf6 */
    KeyBinding { key: Keysym::F7,        mods: KeyMod::NONE,  out: "\x1b[18~" },  /* kf7 */
    KeyBinding { key: Keysym::F8,        mods: KeyMod::NONE,  out: "\x1b[19~" },  /* kf8 */
    KeyBinding { key: Keysym::F9,        mods: KeyMod::NONE,  out: "\x1b[20~" },  /* kf9 */
    KeyBinding { key: Keysym::F10,       mods: KeyMod::NONE,  out: "\x1b[21~" },  /* kf10 */
    KeyBinding { key: Keysym::F11,       mods: KeyMod::NONE,  out: "\x1b[23~" },  /* kf11 */
    KeyBinding { key: Keysym::F12,       mods: KeyMod::NONE,  out: "\x1b[24~" },  /* kf12 */
];

/// Table lookup; `mods` must match the entry exactly.
pub fn lookup(key: Keysym, mods: KeyMod) -> Option<&'static str> {
    for binding in KEYMAP {
        if binding.key == key && binding.mods == mods {
            return Some(binding.out);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascii::AsciiChar;

    #[test]
    fn cursor_keys() {
        assert_eq!(lookup(Keysym::Up, KeyMod::NONE), Some("\x1b[A"));
        assert_eq!(lookup(Keysym::Left, KeyMod::NONE), Some("\x1b[D"));
        assert_eq!(
            lookup(Keysym::Up, KeyMod::NONE).unwrap().as_bytes()[0],
            AsciiChar::ESC.as_byte()
        );
    }

    #[test]
    fn modifiers_must_match() {
        assert_eq!(lookup(Keysym::Tab, KeyMod::SHIFT), Some("\x1b[Z"));
        assert_eq!(lookup(Keysym::Tab, KeyMod::NONE), None);
        assert_eq!(lookup(Keysym::Up, KeyMod::CONTROL), None);
    }

    #[test]
    fn editing_keypad() {
        assert_eq!(lookup(Keysym::Delete, KeyMod::NONE), Some("\x1b[3~"));
        assert_eq!(lookup(Keysym::BackSpace, KeyMod::NONE), Some("\x7f"));
        assert_eq!(lookup(Keysym::F12, KeyMod::NONE), Some("\x1b[24~"));
    }
}
