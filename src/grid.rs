//! The styled character matrix.
//!
//! Rows inside the scroll region are addressed through a rotating ring
//! offset so a vertical scroll costs one row erase instead of a whole
//! region copy. All addressing goes through [`Grid::screen_index`] and
//! [`Grid::page_index`]; the ring is invisible to callers. Linear cell
//! ranges handed to the editing primitives may straddle the ring seam,
//! in which case the buffer is realigned first and the indices are
//! translated through the rotation.

use std::cmp::{max, min};

pub type Color = u32;

bitflags! {
    pub struct CharAttr: u8 {
        const BOLD      = 0x01;
        const UNDERLINE = 0x02;
        const BLINK     = 0x04;
        const INVERSE   = 0x08;
        const INVISIBLE = 0x10;
        const NONE      = 0;
    }
}

/// The style applied to newly written cells. Mutated by SGR.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub attr: CharAttr,
}

/// One cell. `c == '\0'` means empty; the colors stay meaningful so
/// background-color-erase can paint them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Glyph {
    pub c: char,
    pub fg: Color,
    pub bg: Color,
    pub attr: CharAttr,
}

impl Default for Glyph {
    fn default() -> Glyph {
        Glyph {
            c: '\0',
            fg: 0,
            bg: 0,
            attr: CharAttr::NONE,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Margin {
    pub top: usize,    /* first row, 0-indexed */
    pub bottom: usize, /* last row, inclusive */
    pub height: usize, /* precalculated */
}

/// For each line, the leftmost dirty column and one past the rightmost.
#[derive(Copy, Clone, Debug, Default)]
pub struct DirtySpan {
    pub left: usize,
    pub right: usize,
}

/// Index translation out of a ring realignment, for arguments that were
/// computed against the rotated buffer.
pub struct RingFix {
    cols: usize,
    top: usize,
    bottom: usize,
    height: usize,
    ring_top: usize,
}

impl RingFix {
    pub fn translate(&self, i: usize) -> usize {
        if self.ring_top == 0 {
            return i;
        }
        let row = i / self.cols;
        let col = i % self.cols;
        if row >= self.top && row <= self.bottom {
            let logical = self.top + (row - self.top + self.height - self.ring_top) % self.height;
            logical * self.cols + col
        } else {
            i
        }
    }
}

pub struct Grid {
    pub cols: usize,
    pub rows: usize,
    pub text: Vec<Glyph>,
    /// Top of the scroll ring within the margin, in rows.
    pub ring_top: usize,

    /// Cursor position, screen address space.
    pub x: usize,
    pub y: usize,
    /// True when a char was written at the right edge and the next one
    /// may go to the next line.
    pub wrap_next: bool,

    /// `margin` is the latest configured top and bottom margins; `page`
    /// is the active addressing frame (depends on origin mode).
    pub margin: Margin,
    pub page: Margin,

    pub dirty: Vec<DirtySpan>,
    pub cursor_dirty: bool,

    pub style: Style,
    pub tabstop: Vec<bool>,
    tabsize: usize,
    bce: bool,
}

impl Grid {
    pub fn new(default_fg: Color, default_bg: Color, tabsize: usize, bce: bool) -> Grid {
        Grid {
            cols: 0,
            rows: 0,
            text: Vec::new(),
            ring_top: 0,
            x: 0,
            y: 0,
            wrap_next: false,
            margin: Margin::default(),
            page: Margin::default(),
            dirty: Vec::new(),
            cursor_dirty: false,
            style: Style {
                fg: default_fg,
                bg: default_bg,
                attr: CharAttr::NONE,
            },
            tabstop: Vec::new(),
            tabsize: tabsize,
            bce: bce,
        }
    }

    pub fn bce(&self) -> bool {
        self.bce
    }

    /// Physical cell index for a screen position, ring applied for rows
    /// inside the margins. On an 80x24 grid the top left is (0, 0) and
    /// the bottom right (79, 23).
    pub fn screen_index(&self, x: usize, y: usize) -> usize {
        let x = min(x, self.cols - 1);
        let mut y = min(y, self.rows - 1);
        if y >= self.margin.top && y <= self.margin.bottom {
            y = self.margin.top + (y - self.margin.top + self.ring_top) % self.margin.height;
        }
        y * self.cols + x
    }

    /// Cell index within the current page. This is the address function
    /// to use when editing and scrolling.
    pub fn page_index(&self, x: usize, y: usize) -> usize {
        let y = min(y, self.page.height - 1);
        self.screen_index(x, self.page.top + y)
    }

    /// Cursor row relative to the page.
    pub fn page_y(&self) -> usize {
        self.y.saturating_sub(self.page.top)
    }

    /// Place the cursor; `y` is page-relative. Clamps to the page,
    /// clears the wrap latch.
    pub fn cursor(&mut self, x: usize, y: usize) {
        self.x = min(x, self.cols - 1);
        self.y = min(y + self.page.top, self.page.bottom);
        self.wrap_next = false;
        self.cursor_dirty = true;
    }

    /// Recompute the page frame after an origin mode change.
    pub fn apply_origin(&mut self, relative: bool) {
        self.page = if relative {
            self.margin
        } else {
            Margin {
                top: 0,
                bottom: self.rows - 1,
                height: self.rows,
            }
        };
    }

    /// Configure the scroll region; arguments are 1-indexed rows. A
    /// degenerate region is ignored.
    pub fn set_scroll_region(&mut self, top: usize, bottom: usize, origin_relative: bool) {
        let bottom = min(bottom, self.rows);
        if bottom <= top || top < 1 {
            return;
        }

        self.realign();

        self.margin.top = top - 1;
        self.margin.bottom = bottom - 1;
        self.margin.height = bottom - top + 1;

        self.apply_origin(origin_relative);
    }

    /// Rotate the ring back to offset zero. Call before anything that
    /// needs the margin rows physically in order; the returned fixup
    /// translates cell indices that were computed before the call.
    pub fn realign(&mut self) -> RingFix {
        let fix = RingFix {
            cols: self.cols,
            top: self.margin.top,
            bottom: self.margin.bottom,
            height: self.margin.height,
            ring_top: self.ring_top,
        };

        if self.ring_top != 0 {
            let cols = self.cols;
            let mt = self.margin.top * cols;
            let seam = (self.margin.top + self.ring_top) * cols;
            let mb = (self.margin.bottom + 1) * cols;

            let mut newtext = Vec::with_capacity(self.text.len());
            newtext.extend_from_slice(&self.text[..mt]); /* above the top margin */
            newtext.extend_from_slice(&self.text[seam..mb]); /* ring_top to bottom margin */
            newtext.extend_from_slice(&self.text[mt..seam]); /* top margin to ring_top */
            newtext.extend_from_slice(&self.text[mb..]); /* below the bottom margin */

            self.text = newtext;
            self.ring_top = 0;
        }

        fix
    }

    /// Erase cells `from..=to` (linear indices) to empty, keeping the
    /// current colors when background-color-erase is on.
    pub fn erase(&mut self, from: usize, to: usize) {
        let (mut from, mut to) = (from, to);
        if from > to {
            let fix = self.realign();
            from = fix.translate(from);
            to = fix.translate(to);
        }

        for g in &mut self.text[from..=to] {
            *g = Glyph::default();
            if self.bce {
                g.fg = self.style.fg;
                g.bg = self.style.bg;
            }
        }

        self.invalidate_range(from, to);
    }

    /// Fill cells `from..=to` with `c` in the current style.
    pub fn fill(&mut self, from: usize, to: usize, c: char) {
        let (mut from, mut to) = (from, to);
        if from > to {
            let fix = self.realign();
            from = fix.translate(from);
            to = fix.translate(to);
        }

        for g in &mut self.text[from..=to] {
            g.c = c;
            g.fg = self.style.fg;
            g.bg = self.style.bg;
            g.attr = self.style.attr;
        }

        self.invalidate_range(from, to);
    }

    /// Delete cells `from..=to`, moving everything up to `stop` back and
    /// erasing the freed tail. A linear move is only meaningful on an
    /// aligned buffer.
    pub fn delete(&mut self, from: usize, to: usize, stop: usize) {
        let (mut from, mut to, mut stop) = (from, to, stop);
        if self.ring_top != 0 {
            let fix = self.realign();
            from = fix.translate(from);
            to = fix.translate(to);
            stop = fix.translate(stop);
        }

        let to_move = stop - to;
        self.text.copy_within(to + 1..stop + 1, from);
        self.erase(from + to_move, stop);

        self.invalidate_range(from, stop);
    }

    /// Insert `num` blank cells at `from`, pushing the following forward
    /// no further than `stop`.
    pub fn insert(&mut self, from: usize, num: usize, stop: usize) {
        let (mut from, mut stop) = (from, stop);
        if self.ring_top != 0 {
            let fix = self.realign();
            from = fix.translate(from);
            stop = fix.translate(stop);
        }

        let num = min(num, stop - from);
        if num == 0 {
            return;
        }
        self.text.copy_within(from..stop + 1 - num, from + num);
        self.erase(from, from + num - 1);

        self.invalidate_range(from, stop);
    }

    /// Line feed. At or past the bottom margin the page scrolls up by
    /// rotating the ring and erasing the new bottom row.
    pub fn newline(&mut self, carriage_return: bool) {
        if self.y >= self.margin.bottom {
            self.ring_top += 1;
            if self.ring_top >= self.margin.height {
                self.ring_top = 0;
            }
            let from = self.screen_index(0, self.margin.bottom);
            let to = self.screen_index(self.cols - 1, self.margin.bottom);
            self.erase(from, to);
            self.invalidate();
        }

        let x = if carriage_return { 0 } else { self.x };
        let y = self.page_y() + 1;
        self.cursor(x, y);
    }

    pub fn invalidate(&mut self) {
        for span in &mut self.dirty {
            span.left = 0;
            span.right = self.cols;
        }
    }

    pub fn invalidate_range(&mut self, start: usize, end: usize) {
        let (mut start, mut end) = (start, end);
        if start > end {
            let fix = self.realign();
            start = fix.translate(start);
            end = fix.translate(end);
        }
        debug_assert!(start <= end);

        let xstart = start % self.cols;
        let xend = end % self.cols;
        let ystart = start / self.cols;
        let yend = end / self.cols;

        for y in ystart..=yend {
            let left = if y == ystart { xstart } else { 0 };
            let right = if y == yend { xend } else { self.cols - 1 };
            self.dirty[y].left = min(left, self.dirty[y].left);
            self.dirty[y].right = max(right + 1, self.dirty[y].right);
        }
    }

    /// Mark every blinking cell dirty so a phase flip repaints them.
    pub fn invalidate_blinkers(&mut self) {
        for row in 0..self.rows {
            let base = self.screen_index(0, row);
            for col in 0..self.cols {
                if self.text[base + col].attr.contains(CharAttr::BLINK) {
                    self.dirty[row].left = min(self.dirty[row].left, col);
                    self.dirty[row].right = max(self.dirty[row].right, col + 1);
                }
            }
        }
    }

    /// Union `[from_x, to_x)` of a screen row into its dirty span.
    pub fn mark_dirty(&mut self, row: usize, from_x: usize, to_x: usize) {
        let row = min(row, self.rows - 1);
        self.dirty[row].left = min(from_x, self.dirty[row].left);
        self.dirty[row].right = max(to_x, self.dirty[row].right);
    }

    pub fn tabs_clear(&mut self) {
        for stop in &mut self.tabstop {
            *stop = false;
        }
    }

    pub fn tabs_every(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let mut i = n;
        while i < self.cols {
            self.tabstop[i] = true;
            i += n;
        }
    }

    /// Reallocate for a new geometry: content copies over from (0, 0),
    /// the remainder clears, scroll region and tab stops reset.
    pub fn resize(&mut self, cols: usize, rows: usize, origin_relative: bool) {
        self.realign();

        let mut newtext = vec![Glyph::default(); cols * rows];
        for row in 0..min(rows, self.rows) {
            let width = min(cols, self.cols);
            newtext[row * cols..row * cols + width]
                .copy_from_slice(&self.text[row * self.cols..row * self.cols + width]);
        }

        self.text = newtext;
        self.cols = cols;
        self.rows = rows;

        self.tabstop = vec![false; cols];
        let tabsize = self.tabsize;
        self.tabs_every(tabsize);

        self.margin = Margin {
            top: 0,
            bottom: rows - 1,
            height: rows,
        };
        self.apply_origin(origin_relative);

        let (x, y) = (self.x, self.page_y());
        self.cursor(x, y);

        self.dirty = vec![DirtySpan::default(); rows];
        self.invalidate();
    }

    /// Clear everything, home the cursor, drop the scroll region.
    pub fn reset(&mut self) {
        if self.cols == 0 || self.rows == 0 {
            return;
        }
        self.ring_top = 0;
        self.margin = Margin {
            top: 0,
            bottom: self.rows - 1,
            height: self.rows,
        };
        self.apply_origin(false);
        self.cursor(0, 0);
        for g in &mut self.text {
            *g = Glyph::default();
        }
        self.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(cols: usize, rows: usize) -> Grid {
        let mut g = Grid::new(0xffffff, 0x000000, 8, true);
        g.resize(cols, rows, false);
        g
    }

    fn put(g: &mut Grid, x: usize, y: usize, c: char) {
        let i = g.screen_index(x, y);
        g.text[i].c = c;
    }

    fn at(g: &Grid, x: usize, y: usize) -> char {
        g.text[g.screen_index(x, y)].c
    }

    #[test]
    fn realign_is_identity_when_unrotated() {
        let mut g = grid(10, 5);
        put(&mut g, 0, 0, 'a');
        put(&mut g, 9, 4, 'z');
        let snapshot = g.text.clone();
        let fix = g.realign();
        assert_eq!(g.text, snapshot);
        assert_eq!(fix.translate(37), 37);
    }

    #[test]
    fn ring_rotation_and_realign() {
        let mut g = grid(4, 4);
        for row in 0..4 {
            for col in 0..4 {
                put(&mut g, col, row, (b'a' + row as u8) as char);
            }
        }

        // One scroll within a full-screen margin.
        g.cursor(0, 3);
        g.newline(true);
        assert_eq!(g.ring_top, 1);
        // Logical view: rows b, c, d, then an erased bottom row.
        assert_eq!(at(&g, 0, 0), 'b');
        assert_eq!(at(&g, 0, 1), 'c');
        assert_eq!(at(&g, 0, 2), 'd');
        assert_eq!(at(&g, 0, 3), '\0');

        // Realigning changes the physical layout but not the view.
        g.realign();
        assert_eq!(g.ring_top, 0);
        assert_eq!(g.text[0].c, 'b');
        assert_eq!(at(&g, 0, 0), 'b');
        assert_eq!(at(&g, 0, 2), 'd');
    }

    #[test]
    fn ring_fix_translates_rotated_indices() {
        let mut g = grid(4, 4);
        for row in 0..4 {
            put(&mut g, 0, row, (b'a' + row as u8) as char);
        }
        g.cursor(0, 3);
        g.newline(true); // ring_top = 1

        // Index of logical row 1 ('c'), computed against the ring.
        let rotated = g.screen_index(0, 1);
        let fix = g.realign();
        let fixed = fix.translate(rotated);
        assert_eq!(g.text[fixed].c, 'c');
    }

    #[test]
    fn margins_confine_the_ring() {
        let mut g = grid(4, 6);
        for row in 0..6 {
            put(&mut g, 0, row, (b'a' + row as u8) as char);
        }
        g.set_scroll_region(2, 4, false); // rows 1..=3

        g.cursor(0, 3);
        g.newline(true);

        // Rows outside the margin never move.
        assert_eq!(at(&g, 0, 0), 'a');
        assert_eq!(at(&g, 0, 4), 'e');
        assert_eq!(at(&g, 0, 5), 'f');
        // Inside, everything shifted up one and the bottom erased.
        assert_eq!(at(&g, 0, 1), 'c');
        assert_eq!(at(&g, 0, 2), 'd');
        assert_eq!(at(&g, 0, 3), '\0');
    }

    #[test]
    fn erase_across_the_seam() {
        let mut g = grid(4, 4);
        for row in 0..4 {
            for col in 0..4 {
                put(&mut g, col, row, 'x');
            }
        }
        g.cursor(0, 3);
        g.newline(true); // rotate

        // Page-range erase from (0,0) to the bottom right crosses the
        // seam; from > to in linear terms.
        let from = g.page_index(0, 0);
        let to = g.page_index(3, 3);
        assert!(from > to);
        g.erase(from, to);
        for row in 0..4 {
            for col in 0..4 {
                assert_eq!(at(&g, col, row), '\0');
            }
        }
    }

    #[test]
    fn bce_keeps_colors_on_erase() {
        let mut g = grid(4, 2);
        g.style.fg = 0x111111;
        g.style.bg = 0x222222;
        let from = g.screen_index(0, 0);
        let to = g.screen_index(3, 0);
        g.erase(from, to);
        let i = g.screen_index(1, 0);
        assert_eq!(g.text[i].c, '\0');
        assert_eq!(g.text[i].fg, 0x111111);
        assert_eq!(g.text[i].bg, 0x222222);

        let mut plain = Grid::new(0xffffff, 0, 8, false);
        plain.resize(4, 2, false);
        plain.style.bg = 0x222222;
        let from = plain.screen_index(0, 0);
        let to = plain.screen_index(3, 0);
        plain.erase(from, to);
        let i = plain.screen_index(1, 0);
        assert_eq!(plain.text[i].bg, 0);
    }

    #[test]
    fn delete_and_insert_within_a_row() {
        let mut g = grid(10, 2);
        for col in 0..10 {
            put(&mut g, col, 0, (b'0' + col as u8) as char);
        }

        // Delete three cells at column 3.
        let from = g.screen_index(3, 0);
        let to = g.screen_index(5, 0);
        let stop = g.screen_index(9, 0);
        g.delete(from, to, stop);
        let expect = "0126789\0\0\0";
        for (col, want) in expect.chars().enumerate() {
            assert_eq!(at(&g, col, 0), want, "col {}", col);
        }

        // Insert two blanks back at column 3.
        let from = g.screen_index(3, 0);
        let stop = g.screen_index(9, 0);
        g.insert(from, 2, stop);
        let expect = "012\0\06789\0";
        for (col, want) in expect.chars().enumerate() {
            assert_eq!(at(&g, col, 0), want, "col {}", col);
        }
    }

    #[test]
    fn insert_at_the_last_cell_is_a_no_op() {
        let mut g = grid(4, 1);
        put(&mut g, 3, 0, 'x');
        let from = g.screen_index(3, 0);
        g.insert(from, 1, from);
        assert_eq!(at(&g, 3, 0), 'x');
    }

    #[test]
    fn resize_copies_overlap_from_origin() {
        let mut g = grid(6, 3);
        put(&mut g, 0, 0, 'a');
        put(&mut g, 5, 0, 'b');
        put(&mut g, 0, 2, 'c');

        g.resize(4, 2, false);
        assert_eq!(g.cols, 4);
        assert_eq!(g.rows, 2);
        assert_eq!(at(&g, 0, 0), 'a');
        assert_eq!(at(&g, 0, 1), '\0');

        g.resize(20, 4, false);
        assert_eq!(at(&g, 0, 0), 'a');
        assert_eq!(at(&g, 19, 3), '\0');
        // Tab stops follow the new width.
        assert!(!g.tabstop[7]);
        assert!(g.tabstop[8]);
        assert!(g.tabstop[16]);
    }

    #[test]
    fn dirty_spans_stay_bounded() {
        let mut g = grid(8, 3);
        g.mark_dirty(1, 2, 5);
        g.mark_dirty(1, 0, 1);
        for span in &g.dirty {
            assert!(span.left <= span.right);
            assert!(span.right <= g.cols);
        }
        let from = g.screen_index(0, 0);
        let to = g.screen_index(7, 2);
        g.erase(from, to);
        for span in &g.dirty {
            assert!(span.left <= span.right && span.right <= g.cols);
        }
    }

    #[test]
    fn cursor_clamps_to_the_page() {
        let mut g = grid(10, 5);
        g.cursor(100, 100);
        assert_eq!(g.x, 9);
        assert_eq!(g.y, 4);
        assert!(!g.wrap_next);

        g.set_scroll_region(2, 4, true);
        g.cursor(0, 0);
        assert_eq!(g.y, 1);
        g.cursor(0, 100);
        assert_eq!(g.y, 3);
    }

    #[test]
    fn degenerate_scroll_region_is_ignored() {
        let mut g = grid(10, 5);
        let before = g.margin;
        g.set_scroll_region(4, 4, false);
        assert_eq!(g.margin, before);
        g.set_scroll_region(3, 2, false);
        assert_eq!(g.margin, before);
        // An oversized bottom clamps to the screen.
        g.set_scroll_region(2, 99, false);
        assert_eq!(g.margin.bottom, 4);
    }
}
