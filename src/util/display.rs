use color_eyre::Report;
use crossterm::{
    cursor, execute, queue, style,
    terminal::{self, ClearType},
};
use std::io::{self, Write};

use crate::editor::Mode;
use crate::rope::Rope;

// Width of the line-number gutter, digits plus padding.
const GUTTER: u16 = 6;

pub struct Display {
    size: (u16, u16),
    offset: (u16, u16),

    pub(crate) cursor: Cursor,

    out: io::Stdout,
}

pub struct Cursor {
    pub(crate) position: (u16, u16),
    max_column: u16,
}

impl Cursor {
    fn new() -> Self {
        Self { position: (0, 0), max_column: 0 }
    }

    pub(crate) fn move_by(&mut self, delta: (i16, i16), buffer: &[Rope]) {
        let saturate = |pos: u16, delta: i16| {
            if delta.is_negative() {
                pos.saturating_sub(delta.unsigned_abs())
            } else {
                pos.saturating_add(delta as u16)
            }
        };

        let (mut x, mut y) = self.position;
        let (dx, dy) = delta;

        if dx != 0 {
            x = saturate(x, dx);
            self.max_column = x;
        }

        if dy != 0 {
            y = saturate(y, dy);
        }

        self.position = (x, y);
        self.clamp_to(buffer);
    }

    pub(crate) fn move_x(&mut self, new_x: u16, buffer: &[Rope]) {
        self.position.0 = new_x;
        self.max_column = new_x;
        self.clamp_to(buffer);
    }

    pub(crate) fn move_y(&mut self, new_y: u16, buffer: &[Rope]) {
        self.position.1 = new_y;
        self.clamp_to(buffer);
    }

    // Keeps the cursor on a real line, and remembers the column the user was
    // aiming for (`max_column`) so vertical movement across short lines
    // snaps back out on longer ones.
    fn clamp_to(&mut self, buffer: &[Rope]) {
        if self.position.1 as usize >= buffer.len() {
            self.position.1 = buffer.len().saturating_sub(1) as u16;
        }

        let line_len = buffer[self.position.1 as usize].len() as u16;
        self.position.0 = self.max_column.min(line_len);
    }
}

impl Drop for Display {
    fn drop(&mut self) {
        let _ = execute!(
            self.out,
            style::ResetColor,
            cursor::SetCursorStyle::DefaultUserShape,
            terminal::LeaveAlternateScreen
        );
        let _ = terminal::disable_raw_mode();
    }
}

impl Display {
    pub fn new() -> Result<Self, Report> {
        let mut display = Self {
            size: terminal::size()?,
            offset: (0, 0),
            cursor: Cursor::new(),
            out: io::stdout(),
        };

        terminal::enable_raw_mode()?;
        execute!(display.out, terminal::EnterAlternateScreen)?;

        Ok(display)
    }

    pub fn move_cursor(&mut self, delta: (i16, i16), buffer: &[Rope]) {
        self.cursor.move_by(delta, buffer);
    }

    pub fn render(
        &mut self,
        buffer: &[Rope],
        command: &str,
        error: &Option<String>,
        mode: &Mode,
    ) -> Result<(), Report> {
        queue!(self.out, style::ResetColor, terminal::Clear(ClearType::All), cursor::MoveTo(0, 0))?;

        let mut max_lines = self.size.1 as usize;
        if *mode == Mode::COMMAND {
            max_lines -= 1;
        }
        if let Some(error) = error {
            max_lines = max_lines.saturating_sub(error.matches('\n').count() + 1);
        }

        let max_columns = (self.size.0 as usize).saturating_sub(GUTTER as usize);
        let cursor_line = self.cursor.position.1 as usize;

        let mut rendered = 0;
        for (i, line) in buffer[self.offset.1 as usize..].iter().enumerate().take(max_lines) {
            let absolute = i + self.offset.1 as usize;
            let number = if absolute == cursor_line {
                absolute.to_string()
            } else {
                (absolute as isize - cursor_line as isize).unsigned_abs().to_string()
            };

            // Horizontal window into the line; the rope hands back exactly
            // the visible slice.
            let start = self.offset.0 as usize;
            let end = (start + max_columns).min(line.len());
            let window = if start < end { line.substring(start, end)? } else { String::new() };

            queue!(
                self.out,
                style::Print(format!("{number:>4}  {window}")),
                cursor::MoveToNextLine(1)
            )?;
            rendered += 1;
        }

        for _ in rendered..max_lines {
            queue!(self.out, style::Print("   ~ "), cursor::MoveToNextLine(1))?;
        }

        if let Some(error) = error {
            for line in error.split('\n') {
                queue!(
                    self.out,
                    style::SetAttribute(style::Attribute::Italic),
                    style::Print(line),
                    style::SetAttribute(style::Attribute::Reset),
                    cursor::MoveToNextLine(1)
                )?;
            }
        }

        let last_row = self.size.1.saturating_sub(1);
        match mode {
            Mode::COMMAND => queue!(
                self.out,
                cursor::MoveTo(0, last_row),
                style::SetAttribute(style::Attribute::Bold),
                style::Print(format!(":{command}")),
                style::SetAttribute(style::Attribute::Reset),
                cursor::SetCursorStyle::BlinkingBar,
                cursor::MoveTo(command.chars().count() as u16 + 1, last_row)
            )?,
            Mode::INSERT => queue!(
                self.out,
                cursor::SetCursorStyle::BlinkingBar,
                cursor::MoveTo(self.cursor.position.0 + GUTTER, self.cursor.position.1)
            )?,
            _ => queue!(
                self.out,
                cursor::SetCursorStyle::DefaultUserShape,
                cursor::MoveTo(self.cursor.position.0 + GUTTER, self.cursor.position.1)
            )?,
        }

        self.out.flush()?;
        Ok(())
    }
}
