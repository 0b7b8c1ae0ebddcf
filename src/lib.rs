//! A VT100/VT220 terminal emulator core.
//!
//! Bytes read from a pseudo-terminal child go into [`Term::write`]; the
//! engine decodes them, runs them through the escape parser and mutates
//! a styled character grid. A display frontend supplies the
//! [`TermBackend`] callbacks and calls [`Term::flush`] at its own pace;
//! replies for the child (status reports, device attributes, translated
//! keypresses) come back through `write_host`.
//!
//! The child process, the drawing code and the event loop all live in
//! the embedder; this crate is only the terminal itself.

extern crate ascii;
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate slog;
extern crate sloggers;

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

mod charset;
mod escape;
mod grid;
mod keymap;
mod term;
mod utf8;

use std::time::Duration;

use slog::Logger;
use sloggers::file::FileLoggerBuilder;
use sloggers::null::NullLoggerBuilder;
use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::Build;

pub use ascii::AsciiChar;
pub use grid::{CharAttr, Color};
pub use keymap::{KeyBinding, KeyMod, Keysym, KEYMAP};
pub use sloggers::types::Severity;
pub use term::{Term, TermMode};

/// You can choose the LogType of the terminal.
/// This functionality is mainly for developers.
#[derive(Clone, Debug)]
pub enum LogType {
    File((String, Severity, OpenMode)),
    Stdout(Severity),
    Stderr(Severity),
    None,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpenMode {
    Truncate,
    Append,
}

pub(crate) fn build_logger(debug_log: &LogType) -> Logger {
    match *debug_log {
        LogType::File((ref fname, sev, mode)) => {
            let mut builder = FileLoggerBuilder::new(fname);
            builder.level(sev);
            if mode == OpenMode::Truncate {
                builder.truncate();
            }
            builder.build()
        }
        LogType::Stdout(sev) => {
            let mut builder = TerminalLoggerBuilder::new();
            builder.destination(Destination::Stdout);
            builder.level(sev);
            builder.build()
        }
        LogType::Stderr(sev) => {
            let mut builder = TerminalLoggerBuilder::new();
            builder.destination(Destination::Stderr);
            builder.level(sev);
            builder.build()
        }
        LogType::None => NullLoggerBuilder {}.build(),
    }
    .ok()
    .unwrap()
}

/// Push-style callbacks the engine drives. Painting happens during
/// [`Term::flush`]; host writes happen as soon as a dispatch produces
/// them. None of these may call back into the terminal.
pub trait TermBackend {
    /// Send reply bytes to the child process.
    fn write_host(&mut self, bytes: &[u8]);
    /// Paint a run of characters sharing one style.
    fn write_line(
        &mut self,
        col: usize,
        row: usize,
        text: &[char],
        fg: Color,
        bg: Color,
        bold: bool,
        underline: bool,
    );
    /// Paint `length` empty cells in the given background.
    fn clear_line(&mut self, col: usize, row: usize, length: usize, bg: Color);
    /// A flush completed; the backend may present the result.
    fn write_finished(&mut self);
    /// The grid took a new geometry; resize the pixmap and tell the
    /// child (typically a window-size ioctl).
    fn res_change(&mut self, cols: usize, rows: usize);
}

/// The xterm-ish 256 color palette: 16 base colors, a 6x6x6 cube and a
/// grayscale ramp.
pub fn default_palette() -> [Color; 256] {
    const BASE: [Color; 16] = [
        0x000000, 0xcd0000, 0x00cd00, 0xcdcd00, 0x0000ee, 0xcd00cd, 0x00cdcd, 0xe5e5e5,
        0x7f7f7f, 0xff0000, 0x00ff00, 0xffff00, 0x5c5cff, 0xff00ff, 0x00ffff, 0xffffff,
    ];
    const LEVELS: [Color; 6] = [0x00, 0x5f, 0x87, 0xaf, 0xd7, 0xff];

    let mut palette = [0; 256];
    palette[..16].copy_from_slice(&BASE);
    for r in 0..6 {
        for g in 0..6 {
            for b in 0..6 {
                palette[16 + 36 * r + 6 * g + b] =
                    (LEVELS[r] << 16) | (LEVELS[g] << 8) | LEVELS[b];
            }
        }
    }
    for i in 0..24 {
        let v = 8 + 10 * i as Color;
        palette[232 + i as usize] = (v << 16) | (v << 8) | v;
    }
    palette
}

/// Terminal builder, providing control over the initial geometry and
/// the tunables. A default configuration can be generated with
/// TermSetting::new() and other settings can be added by builder
/// methods:
/// '''
/// let term = TermSetting::new()
///     .columns(80)
///     .lines(24)
///     .tab_interval(8)
///     .debug_type(LogType::File(("debug.txt".to_owned(),
///                                Severity::Trace,
///                                OpenMode::Truncate)))
///     .build(backend);
/// '''
#[derive(Clone, Debug)]
pub struct TermSetting {
    cols: usize,
    rows: usize,
    tabsize: usize,
    bce: bool,
    foreground: Color,
    background: Color,
    palette: [Color; 256],
    blink_delay: Duration,
    active_delay: Duration,
    passive_delay: Duration,
    debug_log: LogType,
}

impl TermSetting {
    pub fn new() -> TermSetting {
        TermSetting {
            cols: 80,
            rows: 24,
            tabsize: 8,
            bce: true,
            foreground: 0xffffff,
            background: 0x000000,
            palette: default_palette(),
            blink_delay: Duration::from_millis(800),
            active_delay: Duration::from_millis(16),
            passive_delay: Duration::from_millis(100),
            debug_log: LogType::None,
        }
    }

    pub fn columns(mut self, u: usize) -> Self {
        self.cols = u;
        self
    }

    pub fn lines(mut self, u: usize) -> Self {
        self.rows = u;
        self
    }

    /// Default tab stop interval; 0 means no tab stops.
    pub fn tab_interval(mut self, u: usize) -> Self {
        self.tabsize = u;
        self
    }

    /// Background color erase: cleared cells keep the current
    /// background instead of the default one.
    pub fn bce(mut self, on: bool) -> Self {
        self.bce = on;
        self
    }

    pub fn foreground(mut self, color: Color) -> Self {
        self.foreground = color;
        self
    }

    pub fn background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }

    pub fn palette(mut self, palette: [Color; 256]) -> Self {
        self.palette = palette;
        self
    }

    pub fn blink_delay(mut self, d: Duration) -> Self {
        self.blink_delay = d;
        self
    }

    /// Preferred flush cadence while the user is interacting.
    pub fn active_delay(mut self, d: Duration) -> Self {
        self.active_delay = d;
        self
    }

    /// Relaxed flush cadence for idle periods; the embedding loop may
    /// also use the gap to call [`Term::gc`].
    pub fn passive_delay(mut self, d: Duration) -> Self {
        self.passive_delay = d;
        self
    }

    pub fn debug_type(mut self, l: LogType) -> Self {
        self.debug_log = l;
        self
    }

    pub fn build<B: TermBackend>(self, backend: B) -> Term<B> {
        Term::from_setting(self, backend)
    }
}

impl Default for TermSetting {
    fn default() -> TermSetting {
        TermSetting::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_shape() {
        let palette = default_palette();
        assert_eq!(palette[1], 0xcd0000);
        assert_eq!(palette[15], 0xffffff);
        // Cube corners.
        assert_eq!(palette[16], 0x000000);
        assert_eq!(palette[231], 0xffffff);
        // Grayscale ramp ends.
        assert_eq!(palette[232], 0x080808);
        assert_eq!(palette[255], 0xeeeeee);
    }

    #[test]
    fn setting_builder_chains() {
        let s = TermSetting::new()
            .columns(132)
            .lines(50)
            .tab_interval(4)
            .bce(false)
            .foreground(0xabcdef)
            .blink_delay(Duration::from_millis(100));
        assert_eq!(s.cols, 132);
        assert_eq!(s.rows, 50);
        assert_eq!(s.tabsize, 4);
        assert!(!s.bce);
        assert_eq!(s.foreground, 0xabcdef);
    }
}
