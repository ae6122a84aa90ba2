//! Terminal doubles for the status table.
//!
//! [`RecordingTerm`] stands in for stderr behind an `indicatif` draw target
//! and models what a real terminal of a fixed width would display.
//! [`SharedBuffer`] captures plain output for the non-interactive table.

use indicatif::{ProgressDrawTarget, TermLike};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Screen {
    rows: Vec<Vec<char>>,
    row: usize,
    col: usize,
    frames: Vec<Vec<String>>,
}

impl Screen {
    fn put(&mut self, c: char, width: usize) {
        // Writing past the last column wraps, as terminals with autowrap do
        if self.col >= width {
            self.row += 1;
            self.col = 0;
        }
        while self.rows.len() <= self.row {
            self.rows.push(Vec::new());
        }
        let line = &mut self.rows[self.row];
        while line.len() <= self.col {
            line.push(' ');
        }
        line[self.col] = c;
        self.col += 1;
    }

    fn visible(&self) -> Vec<String> {
        let mut rows: Vec<String> =
            self.rows.iter().map(|row| row.iter().collect::<String>().trim_end().to_string()).collect();
        while rows.last().is_some_and(String::is_empty) {
            rows.pop();
        }
        rows
    }
}

/// A fixed-width screen that interprets what `indicatif` draws.
///
/// Escape sequences are dropped, cursor movement and line clearing are
/// applied, and every flush snapshots the visible rows as a frame. Clones
/// share the screen, so a test can keep one while the draw target owns
/// another.
#[derive(Debug, Clone)]
pub struct RecordingTerm {
    width: u16,
    screen: Arc<Mutex<Screen>>,
}

impl RecordingTerm {
    #[must_use]
    pub fn new(width: u16) -> Self {
        Self {
            width,
            screen: Arc::default(),
        }
    }

    /// An unthrottled draw target backed by this screen.
    #[must_use]
    pub fn draw_target(&self) -> ProgressDrawTarget {
        ProgressDrawTarget::term_like(Box::new(self.clone()))
    }

    /// Rows currently on screen, without trailing blanks.
    pub fn screen(&self) -> Vec<String> {
        self.screen.lock().unwrap().visible()
    }

    /// The screen at every flush.
    pub fn frames(&self) -> Vec<Vec<String>> {
        self.screen.lock().unwrap().frames.clone()
    }

    pub fn flush_count(&self) -> usize {
        self.screen.lock().unwrap().frames.len()
    }
}

impl TermLike for RecordingTerm {
    fn width(&self) -> u16 {
        self.width
    }

    fn height(&self) -> u16 {
        u16::MAX
    }

    fn move_cursor_up(&self, n: usize) -> io::Result<()> {
        let mut screen = self.screen.lock().unwrap();
        screen.row = screen.row.saturating_sub(n);
        screen.col = screen.col.min(usize::from(self.width).saturating_sub(1));
        Ok(())
    }

    fn move_cursor_down(&self, n: usize) -> io::Result<()> {
        let mut screen = self.screen.lock().unwrap();
        screen.row += n;
        screen.col = screen.col.min(usize::from(self.width).saturating_sub(1));
        Ok(())
    }

    fn move_cursor_right(&self, n: usize) -> io::Result<()> {
        let mut screen = self.screen.lock().unwrap();
        screen.col = (screen.col + n).min(usize::from(self.width).saturating_sub(1));
        Ok(())
    }

    fn move_cursor_left(&self, n: usize) -> io::Result<()> {
        let mut screen = self.screen.lock().unwrap();
        screen.col = screen.col.saturating_sub(n);
        Ok(())
    }

    fn write_line(&self, s: &str) -> io::Result<()> {
        self.write_str(s)?;
        let mut screen = self.screen.lock().unwrap();
        screen.row += 1;
        screen.col = 0;
        Ok(())
    }

    fn write_str(&self, s: &str) -> io::Result<()> {
        let width = usize::from(self.width);
        let mut screen = self.screen.lock().unwrap();
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            match c {
                // CSI sequence: skip up to and including the final byte
                '\x1b' => {
                    if chars.next() == Some('[') {
                        for c in chars.by_ref() {
                            if ('@'..='~').contains(&c) {
                                break;
                            }
                        }
                    }
                }
                '\r' => screen.col = 0,
                '\n' => {
                    screen.row += 1;
                    screen.col = 0;
                }
                c => screen.put(c, width),
            }
        }
        Ok(())
    }

    fn clear_line(&self) -> io::Result<()> {
        let mut screen = self.screen.lock().unwrap();
        let row = screen.row;
        if let Some(line) = screen.rows.get_mut(row) {
            line.clear();
        }
        screen.col = 0;
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        let mut screen = self.screen.lock().unwrap();
        let frame = screen.visible();
        screen.frames.push(frame);
        Ok(())
    }
}

/// A `Write` sink whose clones share one buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.bytes.lock().unwrap().extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_width_lines_wrap_only_on_the_next_character() {
        let term = RecordingTerm::new(4);
        term.write_str("abcd").unwrap();
        term.write_str("ef").unwrap();
        assert_eq!(term.screen(), ["abcd", "ef"]);
    }

    #[test]
    fn test_redraw_in_place() {
        let term = RecordingTerm::new(4);
        term.write_str("aaaabbbb").unwrap();
        term.move_cursor_up(1).unwrap();
        term.clear_line().unwrap();
        term.move_cursor_down(1).unwrap();
        term.clear_line().unwrap();
        term.move_cursor_up(1).unwrap();
        term.write_str("\x1b[36mcc\x1b[0m  dd").unwrap();
        term.flush().unwrap();

        assert_eq!(term.frames(), [vec!["cc".to_string(), "dd".to_string()]]);
    }
}
