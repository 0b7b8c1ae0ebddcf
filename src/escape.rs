//! DEC/ANSI escape sequence parser.
//!
//! Reference: http://www.vt100.net/emu/dec_ansi_parser
//!
//! A small state machine over the raw byte stream. Bytes belonging to a
//! sequence are collected into a fixed buffer and parsed when the final
//! byte arrives; the result is a tagged [`Event`] the terminal consumes
//! with a single `match`. Printable and execute bytes are handled by the
//! caller: [`Parser::handle`] returns [`Handled::No`] for them, even in
//! the middle of a CSI sequence (a stray C0 control is executed without
//! disturbing the collection).
//!
//! A sequence can be *cancelled* (ESC/CAN/SUB abandon it immediately) or
//! *poisoned* (bad parameter bytes; collection continues to the final
//! byte, which is consumed but never dispatched).

use slog::Logger;

const BEL: u8 = 0x07;
const CAN: u8 = 0x18;
const SUB: u8 = 0x1a;
const ESC: u8 = 0x1b;

/// http://vt100.net/emu/dec_ansi_parser claims that 16 params is max.
pub const CSI_MAX_PARAMS: usize = 16;

/// There seems to be no specified limit of how long an escape sequence
/// may be, but it varies between implementations.
const BUF_SIZE: usize = 1024;

/// A parsed sequence, ready for dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// `ESC <intermediate?> <function>`
    Esc {
        function: u8,
        intermediate: Option<u8>,
    },
    /// `ESC [ <private?> <params> <function>`. Unset parameters are -1.
    Csi {
        function: u8,
        params: [i32; CSI_MAX_PARAMS],
        private: Option<u8>,
    },
    /// `ESC ] <payload>` terminated by BEL or ST.
    Osc { payload: Vec<u8> },
}

#[derive(Debug, PartialEq, Eq)]
pub enum Handled {
    /// Not ours; print or execute the byte. The parser keeps its state.
    No,
    /// Consumed with nothing to dispatch.
    Yes,
    /// Consumed and a complete sequence fell out.
    Event(Event),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    Csi,
    Osc,
    WaitForSt,
}

pub struct Parser {
    state: State,
    buf: [u8; BUF_SIZE],
    nbuf: usize,
    /// OSC dispatches whatever was collected when the state exits, no
    /// matter how it exits.
    osc_hook: bool,
    logger: Logger,
}

impl Parser {
    pub fn new(logger: Logger) -> Parser {
        Parser {
            state: State::Ground,
            buf: [0; BUF_SIZE],
            nbuf: 0,
            osc_hook: false,
            logger: logger,
        }
    }

    /// Offer one byte. Returns whether it was consumed as part of an
    /// escape sequence; "print" and "execute" are performed outside.
    pub fn handle(&mut self, c: u8) -> Handled {
        if c == ESC || c == CAN || c == SUB {
            let pending = self.clear();
            self.state = if c == ESC { State::Escape } else { State::Ground };
            return match pending {
                Some(ev) => Handled::Event(ev),
                None => Handled::Yes,
            };
        }

        match self.state {
            State::Ground => Handled::No,
            State::Escape => self.state_escape(c),
            State::Csi => self.state_csi(c),
            State::Osc => self.state_osc(c),
            State::WaitForSt => Handled::Yes,
        }
    }

    fn state_escape(&mut self, c: u8) -> Handled {
        match c {
            b'[' => {
                // CSI
                self.clear();
                self.state = State::Csi;
                Handled::Yes
            }
            b']' => {
                // OSC
                self.clear();
                self.state = State::Osc;
                self.osc_hook = true;
                Handled::Yes
            }
            b'P' => {
                // DCS
                debug!(self.logger, "ignoring DCS sequence");
                self.state = State::WaitForSt;
                Handled::Yes
            }
            b'\\' => {
                // ST; states it terminates handle their business on exit
                self.clear();
                self.state = State::Ground;
                Handled::Yes
            }
            b'X' | b'^' | b'_' => {
                // SOS / PM / APC
                self.state = State::WaitForSt;
                Handled::Yes
            }
            0x20..=0x2f => {
                self.collect(c);
                Handled::Yes
            }
            0x30..=0x7e => {
                let ev = self.esc_dispatch(c);
                self.clear();
                self.state = State::Ground;
                match ev {
                    Some(ev) => Handled::Event(ev),
                    None => Handled::Yes,
                }
            }
            _ => Handled::No,
        }
    }

    /// States csi_entry, csi_ignore, csi_param, csi_intermediate.
    fn state_csi(&mut self, c: u8) -> Handled {
        match c {
            0x40..=0x7e => {
                let ev = self.csi_dispatch(c);
                self.clear();
                self.state = State::Ground;
                match ev {
                    Some(ev) => Handled::Event(ev),
                    None => Handled::Yes,
                }
            }
            0x7f => Handled::Yes, // DEL, ignore
            0x20..=0xff => {
                self.collect(c);
                Handled::Yes
            }
            _ => Handled::No,
        }
    }

    fn state_osc(&mut self, c: u8) -> Handled {
        if c == BEL {
            let ev = self.clear();
            self.state = State::Ground;
            return match ev {
                Some(ev) => Handled::Event(ev),
                None => Handled::Yes,
            };
        }
        if c <= 0x1f {
            return Handled::Yes; // C0 inside the string, ignore
        }
        self.collect(c);
        Handled::Yes
    }

    fn collect(&mut self, c: u8) {
        if self.nbuf >= BUF_SIZE {
            debug!(self.logger, "buffer full"; "byte" => c);
            return; // silently ignore
        }
        self.buf[self.nbuf] = c;
        self.nbuf += 1;
    }

    /// Drop the collected bytes. Fires the OSC exit hook if one is
    /// armed, which is why cancelling an OSC still dispatches it.
    fn clear(&mut self) -> Option<Event> {
        let ev = if self.osc_hook {
            Some(Event::Osc {
                payload: self.buf[..self.nbuf].to_vec(),
            })
        } else {
            None
        };
        self.osc_hook = false;
        self.nbuf = 0;
        ev
    }

    fn esc_dispatch(&mut self, function: u8) -> Option<Event> {
        let mut intermediate = None;
        let mut error = false;

        for &b in &self.buf[..self.nbuf] {
            if b >= 0x20 && b <= 0x2f {
                if intermediate.is_none() {
                    intermediate = Some(b);
                } else {
                    error = true;
                }
            }
        }

        if error {
            return None;
        }
        Some(Event::Esc {
            function: function,
            intermediate: intermediate,
        })
    }

    fn csi_dispatch(&mut self, function: u8) -> Option<Event> {
        let mut params = [-1i32; CSI_MAX_PARAMS];
        let mut nparams = 0;
        let mut current: i32 = 0;
        let mut private = None;
        let mut intermediate: Option<u8> = None;
        // If set, read the sequence to the function marker, then ignore.
        let mut error = false;

        for &b in &self.buf[..self.nbuf] {
            match b {
                b'0'..=b'9' => {
                    current = current.wrapping_mul(10).wrapping_add(i32::from(b - b'0'));
                }
                b';' => {
                    if nparams < CSI_MAX_PARAMS {
                        params[nparams] = current;
                        nparams += 1;
                    } else {
                        debug!(self.logger, "too many parameters");
                        error = true;
                    }
                    current = 0;
                }
                0x3c..=0x3f => {
                    if private.is_none() {
                        private = Some(b);
                    } else {
                        debug!(self.logger, "private marker already set");
                        error = true;
                    }
                }
                0x20..=0x2f => {
                    if intermediate.is_none() {
                        intermediate = Some(b);
                    } else {
                        debug!(self.logger, "intermediate character already set");
                        error = true;
                    }
                }
                b':' => {
                    // Reserved by ECMA-48 for subparameters.
                    debug!(self.logger, "':' in control sequence");
                    error = true;
                }
                _ => {
                    debug!(self.logger, "error parsing params, ignoring"; "byte" => b);
                }
            }
        }
        if nparams < CSI_MAX_PARAMS {
            params[nparams] = current;
        } else {
            debug!(self.logger, "too many parameters");
            error = true;
        }

        if error {
            return None;
        }
        Some(Event::Csi {
            function: function,
            params: params,
            private: private,
        })
    }
}
