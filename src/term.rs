//! The terminal engine: control character execution, ESC/CSI/OSC
//! dispatch, and the flush pipeline that drives the display backend.
//!
//! Reference: http://web.mit.edu/dosathena/doc/www/ek-vt520-rm.pdf

use std::cmp::min;
use std::time::{Duration, Instant};

use slog::Logger;

use super::{build_logger, TermBackend, TermSetting};
use charset::{self, Bank, Charset, NUM_BANKS};
use escape::{Event, Handled, Parser, CSI_MAX_PARAMS};
use grid::{CharAttr, Color, Glyph, Grid, Style};
use keymap::{self, KeyMod, Keysym};
use utf8;

bitflags! {
    pub struct TermMode: u16 {
        const SHOW_CURSOR        = 0b0000_0000_0001;
        const BLINK_CURSOR       = 0b0000_0000_0010;
        /// DECAWM, newline automatically at end-of-line.
        const LINE_WRAP          = 0b0000_0000_0100;
        /// LNM, does \n also include \r?
        const LINE_FEED_NEW_LINE = 0b0000_0000_1000;
        /// IRM, insert characters instead of replace.
        const INSERT             = 0b0000_0001_0000;
        /// DECOM, cursor confined to and addressed within the margins.
        const ORIGIN             = 0b0000_0010_0000;
        /// DECSCNM, the whole screen renders with fg/bg swapped.
        const REVERSE_VIDEO      = 0b0000_0100_0000;
        /// Mode 40, is DECCOLM allowed?
        const ALLOW_DECCOLM      = 0b0000_1000_0000;
        /// DECNCSM, suppress the erase on a DECCOLM switch.
        const NO_CLEAR_ON_COLS   = 0b0001_0000_0000;
        const NONE               = 0;
    }
}

impl Default for TermMode {
    fn default() -> TermMode {
        TermMode::SHOW_CURSOR | TermMode::LINE_WRAP
    }
}

/// Geometry forced by DECCOLM; `Any` follows the backend resizes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ColMode {
    Any,
    Col80,
    Col132,
}

/// Mode for clearing the display, relative to the cursor.
#[derive(Debug, Clone, Copy)]
enum ClearMode {
    Below,
    Above,
    All,
}

/// Mode for clearing a line, relative to the cursor.
#[derive(Debug, Clone, Copy)]
enum LineClearMode {
    Right,
    Left,
    All,
}

/// DECSC / DECRC snapshot.
#[derive(Copy, Clone, Debug)]
struct SavedCursor {
    x: usize,
    y: usize,
    autowrap: bool,
    style: Style,
    charset: [Charset; NUM_BANKS],
    bank: Bank,
}

impl Default for SavedCursor {
    fn default() -> SavedCursor {
        SavedCursor {
            x: 0,
            y: 0,
            autowrap: true,
            style: Style {
                fg: 0,
                bg: 0,
                attr: CharAttr::NONE,
            },
            charset: [Charset::Utf8; NUM_BANKS],
            bank: Bank::G0,
        }
    }
}

pub struct Term<B: TermBackend> {
    grid: Grid,
    parser: Parser,

    mode: TermMode,
    col_mode: ColMode,
    charset: [Charset; NUM_BANKS],
    bank: Bank,
    saved_cur: SavedCursor,
    /// Most recently printed character, for REP.
    lastchar: char,

    foreground: Color,
    background: Color,
    palette: [Color; 256],

    /// True while blinking characters are hidden.
    blinked: bool,
    next_blink: Instant,
    blink_delay: Duration,
    active_delay: Duration,
    passive_delay: Duration,
    last_cursor: (usize, usize),

    backend: B,
    pub logger: Logger,
}

impl<B: TermBackend> Term<B> {
    pub fn from_setting(s: TermSetting, backend: B) -> Term<B> {
        let logger = build_logger(&s.debug_log);
        let mut term = Term {
            grid: Grid::new(s.foreground, s.background, s.tabsize, s.bce),
            parser: Parser::new(logger.clone()),
            mode: TermMode::default(),
            col_mode: ColMode::Any,
            charset: [Charset::Utf8; NUM_BANKS],
            bank: Bank::G0,
            saved_cur: SavedCursor::default(),
            lastchar: '\0',
            foreground: s.foreground,
            background: s.background,
            palette: s.palette,
            blinked: false,
            next_blink: Instant::now() + s.blink_delay,
            blink_delay: s.blink_delay,
            active_delay: s.active_delay,
            passive_delay: s.passive_delay,
            last_cursor: (0, 0),
            backend: backend,
            logger: logger,
        };
        term.reset();
        term.resize(s.cols, s.rows);
        term
    }

    pub fn cols(&self) -> usize {
        self.grid.cols
    }

    pub fn rows(&self) -> usize {
        self.grid.rows
    }

    /// Cursor position in screen coordinates.
    pub fn cursor_position(&self) -> (usize, usize) {
        (self.grid.x, self.grid.y)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Preferred delay between flushes while the user is active.
    pub fn active_delay(&self) -> Duration {
        self.active_delay
    }

    /// Preferred delay between flushes when idle.
    pub fn passive_delay(&self) -> Duration {
        self.passive_delay
    }

    /// Push bytes from the child. Returns how many were consumed; an
    /// incomplete UTF-8 tail is left for the caller to carry into the
    /// next call.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let mut consumed = 0;
        while consumed < bytes.len() {
            let c = bytes[consumed];
            if self.do_control_char(c) {
                consumed += 1;
                continue;
            }
            match utf8::decode(&bytes[consumed..]) {
                utf8::Decoded::Char(ch, n) => {
                    self.writechar(ch);
                    consumed += n;
                }
                utf8::Decoded::Incomplete => break,
            }
        }
        consumed
    }

    /// Set the terminal in an optimal state. Not necessary, but may
    /// improve performance later.
    pub fn gc(&mut self) {
        self.grid.realign();
    }

    /// Order a full repaint on the next flush.
    pub fn invalidate(&mut self) {
        self.grid.invalidate();
    }

    /// RIS. Everything back to the state a fresh terminal has, at the
    /// current geometry.
    pub fn reset(&mut self) {
        self.mode = TermMode::default();
        self.col_mode = ColMode::Any;
        self.charset = [Charset::Utf8; NUM_BANKS];
        self.bank = Bank::G0;
        self.lastchar = '\0';
        self.grid.style = Style {
            fg: self.foreground,
            bg: self.background,
            attr: CharAttr::NONE,
        };
        self.grid.reset();
    }

    pub fn resize(&mut self, cols: usize, rows: usize) {
        let (cols, rows) = match self.col_mode {
            ColMode::Any => (cols, rows),
            ColMode::Col80 => {
                debug!(self.logger, "80 cols resolution set, overriding parameters");
                (80, 24)
            }
            ColMode::Col132 => {
                debug!(self.logger, "132 cols resolution set, overriding parameters");
                (132, 24)
            }
        };

        if cols < 1 || rows < 1 {
            return;
        }
        if cols == self.grid.cols && rows == self.grid.rows {
            return;
        }

        debug!(self.logger, "resize to {}x{}", cols, rows);
        self.grid
            .resize(cols, rows, self.mode.contains(TermMode::ORIGIN));
        self.backend.res_change(cols, rows);
    }

    /// Test if `c` opens, continues or executes a control; if so handle
    /// it and return true. Else return false and the caller prints it.
    fn do_control_char(&mut self, c: u8) -> bool {
        match self.parser.handle(c) {
            Handled::Event(ev) => {
                self.dispatch(ev);
                return true;
            }
            Handled::Yes => return true,
            Handled::No => {}
        }

        if c <= 0x1b {
            // C0 control characters.
            // Digital VT100 User Guide, Chapter 3, Table 3-10.
            match c {
                C0::ENQ => {} // answerback not implemented
                C0::BEL => {}
                C0::BS => {
                    let x = self.grid.x.saturating_sub(1);
                    let y = self.grid.page_y();
                    self.grid.cursor(x, y);
                }
                C0::HT => self.tab_move(1),
                C0::LF | C0::VT | C0::FF => {
                    let crlf = self.mode.contains(TermMode::LINE_FEED_NEW_LINE);
                    self.grid.newline(crlf);
                }
                C0::CR => {
                    let y = self.grid.page_y();
                    self.grid.cursor(0, y);
                }
                C0::SO => self.bank = Bank::G1,
                C0::SI => self.bank = Bank::G0,
                C0::XON | C0::XOFF => {}
                C0::CAN | C0::SUB | C0::ESC => {
                    warn!(
                        self.logger,
                        "control character {:#04x} should have been handled by the parser", c
                    );
                }
                _ => {} // other characters are silently consumed
            }
            return true;
        }

        if c >= 0x80 && c <= 0x9f {
            // C1 control characters.
            // http://invisible-island.net/xterm/ctlseqs/ctlseqs.html
            match c {
                C1::IND | C1::NEL | C1::HTS | C1::RI | C1::SS2 | C1::SS3 | C1::DCS
                | C1::SPA | C1::EPA | C1::SOS | C1::DECID | C1::CSI | C1::ST | C1::OSC
                | C1::PM | C1::APC => {
                    debug!(self.logger, "C1 control char: {:#04x}", c);
                    self.do_control_char(C0::ESC);
                    self.do_control_char(c - 0x40);
                    return true;
                }
                _ => {}
            }
        }

        false
    }

    fn writechar(&mut self, c: char) {
        let c = charset::translate(self.charset[self.bank.idx()], c);

        if self.mode.contains(TermMode::INSERT) {
            let y = self.grid.page_y();
            let from = self.grid.page_index(self.grid.x, y);
            let stop = self.grid.page_index(self.grid.cols - 1, y);
            self.grid.insert(from, 1, stop);
        }

        if self.grid.x >= self.grid.cols - 1
            && self.grid.wrap_next
            && self.mode.contains(TermMode::LINE_WRAP)
        {
            self.grid.newline(true);
        }

        let y = self.grid.page_y();
        let index = self.grid.page_index(self.grid.x, y);
        self.grid.text[index] = Glyph {
            c: c,
            fg: self.grid.style.fg,
            bg: self.grid.style.bg,
            attr: self.grid.style.attr,
        };

        let row = self.grid.y;
        let x = self.grid.x;
        self.grid.mark_dirty(row, x, x + 1);

        if self.grid.x < self.grid.cols - 1 {
            let y = self.grid.page_y();
            self.grid.cursor(x + 1, y);
        } else {
            self.grid.wrap_next = true;
        }

        self.lastchar = c;
    }

    /// Go `n` tab stops forward (or backward if negative).
    fn tab_move(&mut self, n: i32) {
        let eol = (self.grid.cols - 1) as i32;
        let direction: i32 = if n > 0 { 1 } else { -1 };
        let mut n = n * direction; /* abs(n) */

        let mut x = self.grid.x as i32;
        while x >= 0 && x <= eol && n != 0 {
            if self.grid.tabstop[x as usize] {
                n -= 1;
                if n == 0 {
                    break;
                }
            }
            x += direction;
        }

        let y = self.grid.page_y();
        self.grid.cursor(x.max(0) as usize, y);
    }

    fn dispatch(&mut self, event: Event) {
        match event {
            Event::Esc {
                function,
                intermediate,
            } => self.esc_dispatch(function, intermediate),
            Event::Csi {
                function,
                params,
                private,
            } => self.csi_dispatch(function, &params, private),
            Event::Osc { payload } => self.osc_dispatch(&payload),
        }
    }

    fn esc_dispatch(&mut self, function: u8, intermediate: Option<u8>) {
        trace!(
            self.logger,
            "(ESC) function={:?} intermediate={:?}",
            function as char,
            intermediate.map(|i| i as char)
        );
        match intermediate {
            None => match function {
                b'D' => {
                    // IND - Index
                    let y = self.grid.page_y();
                    let x = self.grid.x;
                    self.grid.cursor(x, y + 1);
                }
                b'E' => {
                    // NEL - Next Line
                    let y = self.grid.page_y();
                    self.grid.cursor(0, y + 1);
                }
                b'H' => {
                    // HTS - Tab set
                    let x = self.grid.x;
                    self.grid.tabstop[x] = true;
                }
                b'M' => {
                    // RI - Reverse Index
                    let y = self.grid.page_y().saturating_sub(1);
                    let x = self.grid.x;
                    self.grid.cursor(x, y);
                }
                b'N' | b'O' => {
                    // SS2 / SS3 - single shift selects
                    warn!(self.logger, "TODO: implement single shifts");
                }
                b'Z' => {
                    // DECID - Identify Terminal (deprecated)
                    self.backend.write_host(b"\x1b[?1;0c");
                }
                b'c' => self.reset(), // RIS - full reset
                b'7' => {
                    // DECSC - Save Cursor
                    self.saved_cur = SavedCursor {
                        x: self.grid.x,
                        y: self.grid.y,
                        autowrap: self.mode.contains(TermMode::LINE_WRAP),
                        style: self.grid.style,
                        charset: self.charset,
                        bank: self.bank,
                    };
                }
                b'8' => {
                    // DECRC - Restore Cursor
                    self.grid.x = min(self.saved_cur.x, self.grid.cols - 1);
                    self.grid.y = min(self.saved_cur.y, self.grid.rows - 1);
                    self.grid.cursor_dirty = true;
                    self.mode
                        .set(TermMode::LINE_WRAP, self.saved_cur.autowrap);
                    self.grid.style = self.saved_cur.style;
                    self.charset = self.saved_cur.charset;
                    self.bank = self.saved_cur.bank;
                }
                b'=' | b'>' => {
                    // DECPAM / DECPNM - keypad modes
                    debug!(self.logger, "keypad mode ignored: {:?}", function as char);
                }
                _ => warn!(self.logger, "unhandled ESC: {:?}", function as char),
            },
            Some(b'#') => match function {
                b'8' => {
                    // DECALN - Screen Alignment Display
                    let from = self.grid.page_index(0, 0);
                    let to = self.grid.page_index(self.grid.cols - 1, self.grid.rows - 1);
                    self.grid.fill(from, to, 'E');
                }
                _ => warn!(self.logger, "unhandled ESC #: {:?}", function as char),
            },
            Some(i) => match i {
                b'(' | b')' | b'-' | b'*' | b'.' | b'+' | b'/' => {
                    self.designate_charset(i, function)
                }
                _ => warn!(
                    self.logger,
                    "unhandled ESC: {:?} {:?}", function as char, i as char
                ),
            },
        }
    }

    /// Assign a charset from an `ESC ( ) - * . + /` sequence.
    fn designate_charset(&mut self, intermediate: u8, function: u8) {
        let bank = match charset::bank_for(intermediate) {
            Some(bank) => bank,
            None => {
                warn!(self.logger, "unknown charset slot: {:?}", intermediate as char);
                return;
            }
        };
        match charset::charset_for(function) {
            Some(cs) => self.charset[bank.idx()] = cs,
            None => warn!(self.logger, "unknown charset: {:?}", function as char),
        }
    }

    fn csi_dispatch(&mut self, function: u8, params: &[i32; CSI_MAX_PARAMS], private: Option<u8>) {
        macro_rules! unknown {
            () => {{
                warn!(
                    self.logger,
                    "unknown CSI: {:?} private={:?} params={:?}",
                    function as char,
                    private,
                    &params[..4]
                );
                return;
            }};
        }

        // Missing parameters take the command's default.
        let arg = |index: usize, default: i32| -> i32 {
            let value = params[index];
            if value <= 0 {
                default
            } else {
                value
            }
        };

        trace!(
            self.logger,
            "(CSI) function={:?} private={:?} params={:?}",
            function as char,
            private,
            &params[..4]
        );

        match function {
            /* cursor movement */
            b'A' => {
                // CUU - Cursor Up
                let y = self.grid.page_y().saturating_sub(arg(0, 1) as usize);
                let x = self.grid.x;
                self.grid.cursor(x, y);
            }
            b'B' | b'e' => {
                // CUD - Cursor Down / VPR - Line Position Relative
                let y = self.grid.page_y() + arg(0, 1) as usize;
                let x = self.grid.x;
                self.grid.cursor(x, y);
            }
            b'C' | b'a' => {
                // CUF - Cursor Forward / HPR - Position Relative
                let x = self.grid.x + arg(0, 1) as usize;
                let y = self.grid.page_y();
                self.grid.cursor(x, y);
            }
            b'D' => {
                // CUB - Cursor Backward
                let x = self.grid.x.saturating_sub(arg(0, 1) as usize);
                let y = self.grid.page_y();
                self.grid.cursor(x, y);
            }
            b'E' => {
                // CNL - Cursor Next Line
                let y = self.grid.page_y() + arg(0, 1) as usize;
                self.grid.cursor(0, y);
            }
            b'F' => {
                // CPL - Cursor Previous Line
                let y = self.grid.page_y().saturating_sub(arg(0, 1) as usize);
                self.grid.cursor(0, y);
            }
            b'G' | b'`' => {
                // CHA - Character Absolute / HPA
                let y = self.grid.page_y();
                self.grid.cursor(arg(0, 1) as usize - 1, y);
            }
            b'd' => {
                // VPA - Line Position Absolute
                let x = self.grid.x;
                self.grid.cursor(x, arg(0, 1) as usize - 1);
            }
            b'H' | b'f' => {
                // CUP - Cursor Position / HVP
                self.grid
                    .cursor(arg(1, 1) as usize - 1, arg(0, 1) as usize - 1);
            }
            b'I' => {
                // CHT - Cursor Forward Tabulation
                self.tab_move(arg(0, 1));
            }
            /* editing */
            b'L' => {
                // IL - Insert Lines
                if self.margin_contains_cursor() {
                    let y = self.grid.y;
                    let from = self.grid.screen_index(0, y);
                    let stop = self
                        .grid
                        .screen_index(self.grid.cols - 1, self.grid.margin.bottom);
                    let num = arg(0, 1) as usize * self.grid.cols;
                    self.grid.insert(from, num, stop);
                }
            }
            b'M' => {
                // DL - Delete Lines
                if self.margin_contains_cursor() {
                    let y = self.grid.y;
                    let to_row = min(y + arg(0, 1) as usize - 1, self.grid.margin.bottom);
                    let from = self.grid.screen_index(0, y);
                    let to = self.grid.screen_index(self.grid.cols - 1, to_row);
                    let stop = self
                        .grid
                        .screen_index(self.grid.cols - 1, self.grid.margin.bottom);
                    self.grid.delete(from, to, stop);
                }
            }
            b'@' => {
                // ICH - Insert Character
                let y = self.grid.page_y();
                let from = self.grid.page_index(self.grid.x, y);
                let stop = self.grid.page_index(self.grid.cols - 1, y);
                self.grid.insert(from, arg(0, 1) as usize, stop);
            }
            b'P' => {
                // DCH - Delete Character
                let y = self.grid.page_y();
                let from = self.grid.page_index(self.grid.x, y);
                let to = self
                    .grid
                    .page_index(self.grid.x + arg(0, 1) as usize - 1, y);
                let stop = self.grid.page_index(self.grid.cols - 1, y);
                self.grid.delete(from, to, stop);
            }
            b'X' => {
                // ECH - Erase Character
                let y = self.grid.page_y();
                let from = self.grid.page_index(self.grid.x, y);
                let to = self
                    .grid
                    .page_index(self.grid.x + arg(0, 1) as usize - 1, y);
                self.grid.erase(from, to);
            }
            b'b' => {
                // REP - Repeat the preceding character
                match self.lastchar {
                    '\0' => warn!(self.logger, "repeat with no preceding character"),
                    c => {
                        for _ in 0..arg(0, 1) {
                            self.writechar(c);
                        }
                    }
                }
            }
            b'J' => {
                // ED - Erase in Display
                let mode = match arg(0, 0) {
                    0 => ClearMode::Below,
                    1 => ClearMode::Above,
                    2 => ClearMode::All,
                    _ => unknown!(),
                };
                self.clear_screen(mode);
            }
            b'K' => {
                // EL - Erase in Line
                let mode = match arg(0, 0) {
                    0 => LineClearMode::Right,
                    1 => LineClearMode::Left,
                    2 => LineClearMode::All,
                    _ => unknown!(),
                };
                self.clear_line(mode);
            }
            /* settings */
            b'h' | b'l' => {
                let set = function == b'h';
                for &code in params.iter().take_while(|&&p| p != -1) {
                    self.set_mode(set, private, code);
                }
            }
            b'c' => {
                // DA - Device Attributes; report VT100.
                self.backend.write_host(b"\x1b[?1;0c");
            }
            b'g' => {
                // TBC - Tabstop Clear
                match arg(0, 0) {
                    0 => {
                        let x = self.grid.x;
                        self.grid.tabstop[x] = false;
                    }
                    3 => self.grid.tabs_clear(),
                    _ => {}
                }
            }
            b'm' => self.set_char_attributes(params), // SGR
            b'n' => {
                // DSR - Device Status Report
                match params[0] {
                    5 => self.backend.write_host(b"\x1b[0n"), // we're OK
                    6 => self.report_cursor_pos(),
                    15 => self.backend.write_host(b"\x1b[?11n"), // no printer
                    _ => unknown!(),
                }
            }
            b'r' => {
                // DECSTBM - Set Top and Bottom Margins
                match private {
                    None => {
                        let top = arg(0, 1) as usize;
                        let bottom = arg(1, self.grid.rows as i32) as usize;
                        let origin = self.mode.contains(TermMode::ORIGIN);
                        self.grid.set_scroll_region(top, bottom, origin);
                        self.grid.cursor(0, 0);
                    }
                    _ => unknown!(),
                }
            }
            b'W' => match (private, params[0]) {
                (Some(b'?'), 5) => {
                    // DECST8C - reset tab stops every 8
                    self.grid.tabs_clear();
                    self.grid.tabs_every(8);
                }
                _ => unknown!(),
            },
            b'q' => {
                // DECLL - Load LEDs
                warn!(self.logger, "ignored CSI: {:?}", function as char);
            }
            /* ignored functions */
            b'i' /* printing */ | b'y' /* tests */ |
            b'3' | b'4' /* DECDHL */ | b'5' /* DECSWL */ | b'6' /* DECDWL */ |
            b'S' /* SU */ | b'T' /* SD */ => {
                warn!(self.logger, "ignored CSI: {:?}", function as char);
            }
            _ => unknown!(),
        }
    }

    fn margin_contains_cursor(&self) -> bool {
        self.grid.y >= self.grid.margin.top && self.grid.y <= self.grid.margin.bottom
    }

    fn clear_screen(&mut self, mode: ClearMode) {
        let y = self.grid.page_y();
        let bottom = self.grid.rows - 1; /* clamped to the page bound */
        let (from, to) = match mode {
            ClearMode::Below => (
                self.grid.page_index(self.grid.x, y),
                self.grid.page_index(self.grid.cols - 1, bottom),
            ),
            ClearMode::Above => (
                self.grid.page_index(0, 0),
                self.grid.page_index(self.grid.x, y),
            ),
            ClearMode::All => (
                self.grid.page_index(0, 0),
                self.grid.page_index(self.grid.cols - 1, bottom),
            ),
        };
        self.grid.erase(from, to);
    }

    fn clear_line(&mut self, mode: LineClearMode) {
        let y = self.grid.page_y();
        let (from, to) = match mode {
            LineClearMode::Right => (
                self.grid.page_index(self.grid.x, y),
                self.grid.page_index(self.grid.cols - 1, y),
            ),
            LineClearMode::Left => (
                self.grid.page_index(0, y),
                self.grid.page_index(self.grid.x, y),
            ),
            LineClearMode::All => (
                self.grid.page_index(0, y),
                self.grid.page_index(self.grid.cols - 1, y),
            ),
        };
        self.grid.erase(from, to);
    }

    /// SM / RM / DECSET / DECRST, one mode number at a time.
    fn set_mode(&mut self, set: bool, private: Option<u8>, code: i32) {
        match private {
            None => match code {
                4 => self.mode.set(TermMode::INSERT, set), // IRM
                20 => self.mode.set(TermMode::LINE_FEED_NEW_LINE, set), // LNM
                _ => warn!(self.logger, "unknown mode: {}", code),
            },
            Some(b'?') => match code {
                3 => {
                    // DECCOLM - 132/80 columns
                    if self.mode.contains(TermMode::ALLOW_DECCOLM) {
                        self.col_mode = if set { ColMode::Col132 } else { ColMode::Col80 };
                        self.resize(0, 0); /* geometry comes from col_mode */
                        let rows = self.grid.rows;
                        let origin = self.mode.contains(TermMode::ORIGIN);
                        self.grid.set_scroll_region(1, rows, origin);
                        self.grid.cursor(0, 0);
                        if !self.mode.contains(TermMode::NO_CLEAR_ON_COLS) {
                            let from = self.grid.screen_index(0, 0);
                            let to = self
                                .grid
                                .screen_index(self.grid.cols - 1, self.grid.rows - 1);
                            self.grid.erase(from, to);
                        }
                    }
                }
                5 => {
                    // DECSCNM - reverse video
                    self.mode.set(TermMode::REVERSE_VIDEO, set);
                    self.grid.invalidate();
                }
                6 => {
                    // DECOM - address within the scroll region
                    self.mode.set(TermMode::ORIGIN, set);
                    self.grid.apply_origin(set);
                    self.grid.cursor(0, 0);
                }
                7 => self.mode.set(TermMode::LINE_WRAP, set), // DECAWM
                12 => {
                    self.mode.set(TermMode::BLINK_CURSOR, set);
                    self.grid.cursor_dirty = true;
                }
                25 => {
                    self.mode.set(TermMode::SHOW_CURSOR, set);
                    self.grid.cursor_dirty = true;
                }
                40 => self.mode.set(TermMode::ALLOW_DECCOLM, set),
                95 => self.mode.set(TermMode::NO_CLEAR_ON_COLS, set), // DECNCSM
                1 /* DECCKM */ | 9 /* mouse press reporting */ => {
                    warn!(self.logger, "not yet implemented private mode: {}", code);
                }
                2 /* DECANM */ | 4 /* DECSCLM */ | 8 /* DECARM */ |
                10 /* toolbar */ | 18 /* DECPFF */ | 19 /* DECPEX */ |
                30 /* scrollbar */ | 35 /* font shifting */ | 38 /* tektronix */ |
                41 /* more(1) fix */ | 42 /* NRC sets */ | 44 /* margin bell */ |
                45 /* reverse wrap-around */ | 46 /* logging */ => {
                    debug!(self.logger, "ignored private mode: {}", code);
                }
                _ => warn!(self.logger, "unknown private mode: {}", code),
            },
            Some(marker) => warn!(
                self.logger,
                "unknown mode marker: {:?} {}", marker as char, code
            ),
        }
    }

    /// SGR - Select Graphic Rendition.
    fn set_char_attributes(&mut self, params: &[i32; CSI_MAX_PARAMS]) {
        let mut i = 0;
        while i < CSI_MAX_PARAMS {
            let code = params[i];
            if code == -1 {
                break;
            }

            match code {
                0 => {
                    self.grid.style.attr = CharAttr::NONE;
                    self.grid.style.fg = self.foreground;
                    self.grid.style.bg = self.background;
                }
                1 => self.grid.style.attr.insert(CharAttr::BOLD),
                4 => self.grid.style.attr.insert(CharAttr::UNDERLINE),
                5 => self.grid.style.attr.insert(CharAttr::BLINK),
                7 => self.grid.style.attr.insert(CharAttr::INVERSE),
                8 => self.grid.style.attr.insert(CharAttr::INVISIBLE),
                // 21 is double underline by the book, but clearing bold
                // is what everything expects.
                21 | 22 => self.grid.style.attr.remove(CharAttr::BOLD),
                24 => self.grid.style.attr.remove(CharAttr::UNDERLINE),
                25 => self.grid.style.attr.remove(CharAttr::BLINK),
                27 => self.grid.style.attr.remove(CharAttr::INVERSE),
                28 => self.grid.style.attr.remove(CharAttr::INVISIBLE),
                30..=37 => self.grid.style.fg = self.palette[(code - 30) as usize],
                40..=47 => self.grid.style.bg = self.palette[(code - 40) as usize],
                90..=97 => self.grid.style.fg = self.palette[(code - 90 + 8) as usize],
                100..=107 => self.grid.style.bg = self.palette[(code - 100 + 8) as usize],
                39 => self.grid.style.fg = self.foreground,
                49 => self.grid.style.bg = self.background,
                38 | 48 => {
                    if i + 2 < CSI_MAX_PARAMS && params[i + 1] == 5 && params[i + 2] != -1 {
                        let color = params[i + 2].rem_euclid(256) as usize;
                        if code == 38 {
                            self.grid.style.fg = self.palette[color];
                        } else {
                            self.grid.style.bg = self.palette[color];
                        }
                        i += 2;
                    } else if i + 1 < CSI_MAX_PARAMS && params[i + 1] == 5 {
                        warn!(self.logger, "too few parameters left for {}", code);
                        break;
                    } else {
                        warn!(self.logger, "unknown style: {}", code);
                    }
                }
                _ => warn!(self.logger, "unknown style: {}", code),
            }
            i += 1;
        }
    }

    fn report_cursor_pos(&mut self) {
        let report = format!("\x1b[{};{}R", self.grid.y + 1, self.grid.x + 1);
        self.backend.write_host(report.as_bytes());
    }

    fn osc_dispatch(&mut self, payload: &[u8]) {
        // Titles, palette edits and so on; accepted and ignored.
        debug!(
            self.logger,
            "ignored OSC: {}",
            String::from_utf8_lossy(payload)
        );
    }

    /// Translate a key symbol plus modifier mask into host bytes.
    /// Returns true if handled; otherwise the embedder should forward
    /// the composed text itself.
    pub fn handle_keypress(&mut self, key: Keysym, mods: KeyMod) -> bool {
        if mods.contains(KeyMod::ALT) {
            self.backend.write_host(b"\x1b");
        }

        if key == Keysym::Return {
            if self.mode.contains(TermMode::LINE_FEED_NEW_LINE) {
                self.backend.write_host(b"\r\n");
            } else {
                self.backend.write_host(b"\r");
            }
            return true;
        }

        match keymap::lookup(key, mods - KeyMod::ALT) {
            Some(out) => {
                self.backend.write_host(out.as_bytes());
                true
            }
            None => false,
        }
    }

    /* flushing */

    /// Push everything dirty at the display backend: a blink phase flip
    /// if one is due, coalesced runs for each dirty span, then the
    /// cursor cell.
    pub fn flush(&mut self) {
        let now = Instant::now();
        if now >= self.next_blink {
            self.blinked = !self.blinked;
            self.next_blink = now + self.blink_delay;
            self.grid.invalidate_blinkers();
        }

        if self.flush_lines() || self.grid.cursor_dirty {
            self.flush_cursor();
            self.backend.write_finished();
        }
    }

    /// Returns true if anything was painted.
    fn flush_lines(&mut self) -> bool {
        let mut painted = false;
        let mut buffer = vec!['\0'; self.grid.cols];

        for row in 0..self.grid.rows {
            let col_start = self.grid.dirty[row].left;
            let col_stop = self.grid.dirty[row].right;
            self.grid.dirty[row].left = 0;
            self.grid.dirty[row].right = 0;
            if col_start >= col_stop {
                continue;
            }

            let base = self.grid.screen_index(0, row);
            let mut run_start = col_start;
            let mut run = self.grid.text[base + col_start];

            for col in col_start..col_stop {
                let g = self.grid.text[base + col];
                buffer[col] = g.c;

                // A run breaks where emptiness, color or attributes change.
                if (run.c != '\0') != (g.c != '\0')
                    || run.bg != g.bg
                    || run.fg != g.fg
                    || run.attr != g.attr
                {
                    self.flush_section(run_start, row, &buffer[run_start..col], run);
                    run_start = col;
                    run = g;
                    painted = true;
                }
            }
            if col_stop > run_start {
                self.flush_section(run_start, row, &buffer[run_start..col_stop], run);
                painted = true;
            }
        }

        painted
    }

    /// Paint one run of identically-styled cells.
    fn flush_section(&mut self, col: usize, row: usize, text: &[char], g: Glyph) {
        let reverse_vid = self.mode.contains(TermMode::REVERSE_VIDEO);

        if text[0] == '\0' {
            let reverse = reverse_vid ^ g.attr.contains(CharAttr::INVERSE);
            let bg = if self.grid.bce() {
                if reverse {
                    g.fg
                } else {
                    g.bg
                }
            } else if reverse {
                self.foreground
            } else {
                self.background
            };
            self.backend.clear_line(col, row, text.len(), bg);
        } else if g.attr.contains(CharAttr::INVISIBLE)
            || (g.attr.contains(CharAttr::BLINK) && self.blinked)
        {
            let bg = if reverse_vid { g.fg } else { g.bg };
            self.backend.clear_line(col, row, text.len(), bg);
        } else {
            let (mut fg, mut bg) = (g.fg, g.bg);
            if g.attr.contains(CharAttr::INVERSE) {
                let tmp = fg;
                fg = bg;
                bg = tmp;
            }
            if reverse_vid {
                let tmp = fg;
                fg = bg;
                bg = tmp;
            }
            self.backend.write_line(
                col,
                row,
                text,
                fg,
                bg,
                g.attr.contains(CharAttr::BOLD),
                g.attr.contains(CharAttr::UNDERLINE),
            );
        }
    }

    /// Repaint the cell the cursor left, then overpaint the cell it is
    /// on with the colors swapped: a block cursor.
    fn flush_cursor(&mut self) {
        let (last_x, last_y) = self.last_cursor;
        let g = self.grid.text[self.grid.screen_index(last_x, last_y)];
        self.flush_section(last_x, last_y, &[g.c], g);

        self.last_cursor = (self.grid.x, self.grid.y);
        self.grid.cursor_dirty = false;

        if self.mode.contains(TermMode::SHOW_CURSOR)
            && (!self.mode.contains(TermMode::BLINK_CURSOR) || !self.blinked)
        {
            let g = self.grid.text[self.grid.screen_index(self.grid.x, self.grid.y)];
            let cursor = Glyph {
                c: g.c,
                fg: self.foreground,
                bg: self.background,
                attr: g.attr ^ CharAttr::INVERSE,
            };
            self.flush_section(self.grid.x, self.grid.y, &[g.c], cursor);
        }
    }
}

/// C0 set of 7-bit control characters (from ANSI X3.4-1977).
#[allow(non_snake_case, dead_code)]
pub mod C0 {
    /// Null filler, terminal should ignore this character
    pub const NUL: u8 = 0x00;
    /// Enquiry, causes terminal to send ANSWER-BACK ID
    pub const ENQ: u8 = 0x05;
    /// Bell, triggers the bell, buzzer, or beeper on the terminal
    pub const BEL: u8 = 0x07;
    /// Backspace, can be used to define overstruck characters
    pub const BS: u8 = 0x08;
    /// Horizontal Tabulation, move to next predetermined position
    pub const HT: u8 = 0x09;
    /// Linefeed, move to same position on next line (see also NL)
    pub const LF: u8 = 0x0A;
    /// Vertical Tabulation, move to next predetermined line
    pub const VT: u8 = 0x0B;
    /// Form Feed, move to next form or page
    pub const FF: u8 = 0x0C;
    /// Carriage Return, move to first character of current line
    pub const CR: u8 = 0x0D;
    /// Shift Out, switch to G1 (other half of character set)
    pub const SO: u8 = 0x0E;
    /// Shift In, switch to G0 (normal half of character set)
    pub const SI: u8 = 0x0F;
    /// (DC1) Terminal is allowed to resume transmitting
    pub const XON: u8 = 0x11;
    /// (DC3) Terminal must pause and refrain from transmitting
    pub const XOFF: u8 = 0x13;
    /// Cancel (makes VT100 abort current escape sequence if any)
    pub const CAN: u8 = 0x18;
    /// Substitute (VT100 uses this to display parity errors)
    pub const SUB: u8 = 0x1A;
    /// Prefix to an escape sequence
    pub const ESC: u8 = 0x1B;
    /// Delete, should be ignored by terminal
    pub const DEL: u8 = 0x7f;
}

/// C1 set of 8-bit control characters (from ANSI X3.64-1979).
///
/// 0x80 (@), 0x81 (A), 0x82 (B), 0x83 (C) are reserved,
/// 0x98 (X), 0x99 (Y) are reserved,
/// 0x9a (Z) is 'reserved', but causes DEC terminals to respond with DA codes
#[allow(non_snake_case, dead_code)]
pub mod C1 {
    /// Index, moves down one line same column regardless of NL
    pub const IND: u8 = 0x84;
    /// New line, moves done one line and to first column (CR+LF)
    pub const NEL: u8 = 0x85;
    /// Horizontal Tabulation Set at current position
    pub const HTS: u8 = 0x88;
    /// Reverse Index, go up one line, reverse scroll if necessary
    pub const RI: u8 = 0x8D;
    /// Single Shift to G2
    pub const SS2: u8 = 0x8E;
    /// Single Shift to G3 (VT100 uses this for sending PF keys)
    pub const SS3: u8 = 0x8F;
    /// Device Control String, terminated by ST (VT125 enters graphics)
    pub const DCS: u8 = 0x90;
    /// Start of Protected Area
    pub const SPA: u8 = 0x96;
    /// End of Protected Area
    pub const EPA: u8 = 0x97;
    /// Start of String
    pub const SOS: u8 = 0x98;
    /// DECID - Identify Terminal
    pub const DECID: u8 = 0x9a;
    /// Control Sequence Introducer
    pub const CSI: u8 = 0x9B;
    /// String Terminator (VT125 exits graphics)
    pub const ST: u8 = 0x9C;
    /// Operating System Command (reprograms intelligent terminal)
    pub const OSC: u8 = 0x9D;
    /// Privacy Message (password verification), terminated by ST
    pub const PM: u8 = 0x9E;
    /// Application Program Command (to word processor), term by ST
    pub const APC: u8 = 0x9F;
}
