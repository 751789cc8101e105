use color_eyre::Report;
use crossterm::event::{poll, read, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    mem::take,
    sync::mpsc,
    time::{Duration, Instant},
};
use tokio::runtime::Runtime;
use tracing::{error, info};

use crate::macros::default_keybinds;
use crate::rope::Rope;
use crate::util::{Display, Keymap};

#[derive(Debug, Eq, PartialEq, Hash)]
pub enum Mode {
    NORMAL,
    COMMAND,
    INSERT,
}

/// The modal editor: one rope per buffer line.
///
/// Every edit goes through the rope operations, as split-and-rebuild; a
/// line is never mutated in place. The old line rope is discarded once the
/// new one takes its slot.
pub struct Editor {
    pub(crate) buffer: Vec<Rope>,
    pub(crate) filename: Option<String>,
    pub(crate) command: String,
    pub(crate) error: Option<String>,
    pub(crate) dirty: bool,
    pub(crate) stop: bool,

    pub(crate) mode: Mode,

    pub(crate) display: Display,

    pub(crate) keymap: Keymap,
    pub(crate) last_key_time: Instant,
}

impl Editor {
    pub fn new() -> Result<Self, Report> {
        let mut editor = Self {
            buffer: vec![Rope::new_leaf("")],
            filename: None,
            command: String::new(),
            error: None,
            dirty: true,
            stop: false,

            mode: Mode::NORMAL,

            display: Display::new()?,

            keymap: Keymap::new(),
            last_key_time: Instant::now(),
        };

        default_keybinds(&mut editor);

        Ok(editor)
    }

    pub fn load_file(&mut self, filename: &str) -> Result<(), Report> {
        let file = File::open(filename)?;
        let reader = BufReader::new(file);

        let mut buffer = Vec::new();
        for line in reader.lines() {
            buffer.push(Rope::new_leaf(&line?));
        }
        if buffer.is_empty() {
            buffer.push(Rope::new_leaf(""));
        }

        info!(filename, lines = buffer.len(), "loaded file");

        self.buffer = buffer;
        self.filename = Some(filename.to_string());
        self.display.cursor.move_y(0, &self.buffer);
        self.display.cursor.move_x(0, &self.buffer);
        Ok(())
    }

    pub fn save_file(&self, filename: &str) -> Result<(), Report> {
        let mut file = File::create(filename)?;
        for line in &self.buffer {
            writeln!(file, "{line}")?;
        }

        info!(filename, lines = self.buffer.len(), "saved file");
        Ok(())
    }

    pub fn run(&mut self) -> Result<(), Report> {
        let (tx, mut rx) = mpsc::channel::<KeyEvent>();

        let rt = Runtime::new()?;
        rt.block_on(async {
            tokio::spawn(async move {
                Editor::key_event_listener(tx).await;
            });
        });

        info!("editor started");
        while !self.stop {
            if let Err(report) = self.handle_key_event(&mut rx) {
                error!("action failed: {report:#}");
                self.error = Some(report.to_string());
                self.dirty = true;
            }

            if self.dirty {
                self.display.render(&self.buffer, &self.command, &self.error, &self.mode)?;
                self.dirty = false;
            }
        }
        info!("editor stopped");

        Ok(())
    }

    fn handle_key_event(&mut self, rx: &mut mpsc::Receiver<KeyEvent>) -> Result<(), Report> {
        if self.last_key_time.elapsed().as_millis() > 1000 && !self.keymap.is_empty() {
            self.execute_keymap_action()?;
            self.dirty = true;
        }

        let event = match rx.recv_timeout(Duration::from_millis(10)) {
            Ok(event) => Editor::normalize_key(event),
            Err(_) => return Ok(()),
        };

        let mut unresolved = self.keymap.traverse(&self.mode, event);
        if unresolved.is_some() {
            self.execute_keymap_action()?;
            unresolved = self.keymap.traverse(&self.mode, event);
        }

        if self.keymap.is_leaf() {
            self.execute_keymap_action()?;
        }

        if let Some(unresolved) = unresolved {
            if !unresolved.modifiers.intersects(KeyModifiers::ALT | KeyModifiers::CONTROL) {
                self.handle_unresolved_key_event(unresolved)?;
            }
        }

        self.last_key_time = Instant::now();
        self.dirty = true;
        Ok(())
    }

    // Terminals report an uppercase char with SHIFT set; the char already
    // encodes the shift, so strip it or binds like `G` never match.
    fn normalize_key(event: KeyEvent) -> KeyEvent {
        match event.code {
            KeyCode::Char(_) => {
                KeyEvent::new(event.code, event.modifiers.difference(KeyModifiers::SHIFT))
            }
            _ => event,
        }
    }

    fn handle_unresolved_key_event(&mut self, unresolved: KeyEvent) -> Result<(), Report> {
        match self.mode {
            Mode::COMMAND => {
                if let KeyCode::Char(c) = unresolved.code {
                    self.command.push(c);
                } else if unresolved.code == KeyCode::Backspace {
                    self.command.pop();
                }
                Ok(())
            }
            Mode::INSERT => match unresolved.code {
                KeyCode::Char(c) => self.insert_at_cursor(&c.to_string()),
                KeyCode::Enter => self.break_line(),
                KeyCode::Delete => self.delete_forward(),
                KeyCode::Backspace => self.delete_backward(),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }

    fn execute_keymap_action(&mut self) -> Result<(), Report> {
        let result = match self.keymap.get_action() {
            Some(action) => action.borrow_mut()(self),
            None => Ok(()),
        };

        self.keymap.clear();
        result
    }

    pub(crate) fn cursor(&self) -> (usize, usize) {
        let (x, y) = self.display.cursor.position;
        (x as usize, y as usize)
    }

    /// Splices `text` into the current line at the cursor.
    pub(crate) fn insert_at_cursor(&mut self, text: &str) -> Result<(), Report> {
        let (x, y) = self.cursor();
        let line = take(&mut self.buffer[y]);
        let (head, tail) = line.split(x)?;
        self.buffer[y] = head.concat(Rope::new_leaf(text)).concat(tail);
        self.display.move_cursor((text.chars().count() as i16, 0), &self.buffer);
        Ok(())
    }

    /// Splits the current line at the cursor into two lines.
    pub(crate) fn break_line(&mut self) -> Result<(), Report> {
        let (x, y) = self.cursor();
        let line = take(&mut self.buffer[y]);
        let (head, tail) = line.split(x)?;
        self.buffer[y] = head;
        self.buffer.insert(y + 1, tail);
        self.display.move_cursor((-(x as i16), 1), &self.buffer);
        Ok(())
    }

    /// Deletes the character under the cursor; at the end of a line, pulls
    /// the next line up instead.
    pub(crate) fn delete_forward(&mut self) -> Result<(), Report> {
        let (x, y) = self.cursor();
        if x < self.buffer[y].len() {
            let line = take(&mut self.buffer[y]);
            let (head, tail) = line.split(x)?;
            let (_, rest) = tail.split(1)?;
            self.buffer[y] = head.concat(rest);
        } else if y + 1 < self.buffer.len() {
            let next = self.buffer.remove(y + 1);
            let line = take(&mut self.buffer[y]);
            self.buffer[y] = line.concat(next);
        }
        Ok(())
    }

    /// Deletes the character before the cursor; at the start of a line,
    /// joins it onto the previous one.
    pub(crate) fn delete_backward(&mut self) -> Result<(), Report> {
        let (x, y) = self.cursor();
        if x > 0 {
            let line = take(&mut self.buffer[y]);
            let (head, tail) = line.split(x - 1)?;
            let (_, rest) = tail.split(1)?;
            self.buffer[y] = head.concat(rest);
            self.display.move_cursor((-1, 0), &self.buffer);
        } else if y > 0 {
            let line = self.buffer.remove(y);
            let prev_len = self.buffer[y - 1].len();
            let prev = take(&mut self.buffer[y - 1]);
            self.buffer[y - 1] = prev.concat(line);
            self.display.move_cursor((prev_len as i16, -1), &self.buffer);
        }
        Ok(())
    }

    async fn key_event_listener(tx: mpsc::Sender<KeyEvent>) {
        loop {
            match poll(Duration::from_millis(10)) {
                Ok(true) => {}
                Ok(false) => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
                Err(_) => break,
            }

            match read() {
                Ok(Event::Key(key_event)) if key_event.kind == KeyEventKind::Press => {
                    if tx.send(key_event).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    }
}
