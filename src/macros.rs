use color_eyre::eyre::eyre;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::mem::take;
use tracing::debug;

use crate::editor::{Editor, Mode};
use crate::rope::Rope;
use crate::util::Keymap;

/// Registers a keybind from vim-style notation: modes as a letter string
/// (`"n"`, `"ic"`), keys as literal chars with `<...>` names for specials
/// (`"gg"`, `"<C-q>"`, `"<Esc>"`).
macro_rules! bind {
    ($editor:expr, $modes:expr, $keys:expr, $action:expr) => {
        $editor.keymap.add_keybind(parse_modes($modes), parse_keys($keys), $action)
    };
}

fn parse_modes(spec: &str) -> Vec<Mode> {
    spec.chars()
        .filter_map(|c| match c {
            'n' => Some(Mode::NORMAL),
            'c' => Some(Mode::COMMAND),
            'i' => Some(Mode::INSERT),
            _ => None,
        })
        .collect()
}

fn parse_keys(spec: &str) -> Vec<KeyEvent> {
    let mut keys = Vec::new();
    let mut chars = spec.chars();

    while let Some(c) = chars.next() {
        if c != '<' {
            keys.push(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
            continue;
        }

        let mut name = String::new();
        for inner in chars.by_ref() {
            if inner == '>' {
                break;
            }
            name.push(inner);
        }

        keys.push(parse_special(&name));
    }

    keys
}

fn parse_special(name: &str) -> KeyEvent {
    let (modifiers, key) = match name.split_once('-') {
        Some((prefix, rest)) if !rest.is_empty() => {
            let modifiers = match prefix {
                "C" => KeyModifiers::CONTROL,
                "S" => KeyModifiers::SHIFT,
                "A" => KeyModifiers::ALT,
                _ => KeyModifiers::NONE,
            };
            (modifiers, rest)
        }
        _ => (KeyModifiers::NONE, name),
    };

    let code = match key {
        "BS" => KeyCode::Backspace,
        "Tab" => KeyCode::Tab,
        "CR" | "Enter" | "Return" => KeyCode::Enter,
        "Esc" => KeyCode::Esc,
        "Space" => KeyCode::Char(' '),
        "Up" => KeyCode::Up,
        "Down" => KeyCode::Down,
        "Left" => KeyCode::Left,
        "Right" => KeyCode::Right,
        "Insert" => KeyCode::Insert,
        "Del" => KeyCode::Delete,
        "Home" => KeyCode::Home,
        "End" => KeyCode::End,
        "PageUp" => KeyCode::PageUp,
        "PageDown" => KeyCode::PageDown,
        _ => {
            if let Some(n) = key.strip_prefix('F').and_then(|n| n.parse::<u8>().ok()) {
                KeyCode::F(n)
            } else if key.chars().count() == 1 {
                KeyCode::Char(key.chars().next().unwrap())
            } else {
                panic!("unknown key in keybind spec: <{name}>")
            }
        }
    };

    KeyEvent::new(code, modifiers)
}

// Count prefixes can be arbitrarily large; cursor deltas are i16.
fn count(keymap: &mut Keymap) -> i16 {
    i16::try_from(keymap.repeats()).unwrap_or(i16::MAX)
}

pub(crate) fn default_keybinds(editor: &mut Editor) {
    bind!(editor, "n", "k", |e| {
        let n = count(&mut e.keymap);
        e.display.move_cursor((0, -n), &e.buffer);
        Ok(())
    });

    bind!(editor, "n", "j", |e| {
        let n = count(&mut e.keymap);
        e.display.move_cursor((0, n), &e.buffer);
        Ok(())
    });

    bind!(editor, "n", "h", |e| {
        let n = count(&mut e.keymap);
        e.display.move_cursor((-n, 0), &e.buffer);
        Ok(())
    });

    bind!(editor, "n", "l", |e| {
        let n = count(&mut e.keymap);
        e.display.move_cursor((n, 0), &e.buffer);
        Ok(())
    });

    bind!(editor, "ni", "<Up>", |e| {
        e.display.move_cursor((0, -1), &e.buffer);
        Ok(())
    });

    bind!(editor, "ni", "<Down>", |e| {
        e.display.move_cursor((0, 1), &e.buffer);
        Ok(())
    });

    bind!(editor, "ni", "<Left>", |e| {
        e.display.move_cursor((-1, 0), &e.buffer);
        Ok(())
    });

    bind!(editor, "ni", "<Right>", |e| {
        e.display.move_cursor((1, 0), &e.buffer);
        Ok(())
    });

    bind!(editor, "n", "i", |e| {
        e.mode = Mode::INSERT;
        Ok(())
    });

    bind!(editor, "n", "a", |e| {
        e.mode = Mode::INSERT;
        e.display.move_cursor((1, 0), &e.buffer);
        Ok(())
    });

    bind!(editor, "n", "o", |e| {
        let (_, y) = e.cursor();
        e.buffer.insert(y + 1, Rope::new_leaf(""));
        e.display.cursor.move_y(y as u16 + 1, &e.buffer);
        e.display.cursor.move_x(0, &e.buffer);
        e.mode = Mode::INSERT;
        Ok(())
    });

    bind!(editor, "n", "O", |e| {
        let (_, y) = e.cursor();
        e.buffer.insert(y, Rope::new_leaf(""));
        e.display.cursor.move_x(0, &e.buffer);
        e.mode = Mode::INSERT;
        Ok(())
    });

    bind!(editor, "n", "x", |e| e.delete_forward());

    bind!(editor, "n", "dd", |e| {
        let (_, y) = e.cursor();
        e.buffer.remove(y);
        if e.buffer.is_empty() {
            e.buffer.push(Rope::new_leaf(""));
        }
        e.display.move_cursor((0, 0), &e.buffer);
        Ok(())
    });

    bind!(editor, "n", "J", |e| {
        let (_, y) = e.cursor();
        if y + 1 < e.buffer.len() {
            let next = e.buffer.remove(y + 1);
            let line = take(&mut e.buffer[y]);
            let sep = if line.is_empty() { "" } else { " " };
            e.buffer[y] = line.concat(Rope::new_leaf(sep)).concat(next);
        }
        Ok(())
    });

    bind!(editor, "n", "_", |e| {
        let (_, y) = e.cursor();
        let line = e.buffer[y].to_string();
        if let Some(index) = line.chars().position(|c| !c.is_whitespace()) {
            e.display.cursor.move_x(index as u16, &e.buffer);
        }
        Ok(())
    });

    bind!(editor, "n", "$", |e| {
        let (_, y) = e.cursor();
        let line_len = e.buffer[y].len() as u16;
        e.display.cursor.move_x(line_len.saturating_sub(1), &e.buffer);
        Ok(())
    });

    bind!(editor, "n", "gg", |e| {
        e.display.cursor.move_y(0, &e.buffer);
        Ok(())
    });

    bind!(editor, "n", "G", |e| {
        e.display.cursor.move_y(e.buffer.len() as u16, &e.buffer);
        Ok(())
    });

    bind!(editor, "n", ":", |e| {
        e.mode = Mode::COMMAND;
        Ok(())
    });

    bind!(editor, "ic", "<Esc>", |e| {
        e.mode = Mode::NORMAL;
        e.command.clear();
        Ok(())
    });

    bind!(editor, "n", "<CR>", |e| {
        if e.error.is_some() {
            e.error = None;
        }
        Ok(())
    });

    bind!(editor, "n", "<C-q>", |e| {
        e.stop = true;
        Ok(())
    });

    bind!(editor, "c", "<CR>", |e| {
        if e.command.is_empty() {
            e.mode = Mode::NORMAL;
            return Ok(());
        }

        let command = take(&mut e.command);
        debug!(command = %command, "executing command");

        let mut words = command.split_whitespace();
        match words.next() {
            Some("q") => e.stop = true,
            Some("e") => match words.next() {
                Some(filename) => e.load_file(filename)?,
                None => return Err(eyre!("no filename specified")),
            },
            Some("w") => match words.next().map(str::to_string).or_else(|| e.filename.clone()) {
                Some(filename) => e.save_file(&filename)?,
                None => return Err(eyre!("no filename specified")),
            },
            Some("wq") => match words.next().map(str::to_string).or_else(|| e.filename.clone()) {
                Some(filename) => {
                    e.save_file(&filename)?;
                    e.stop = true;
                }
                None => return Err(eyre!("no filename specified")),
            },
            Some(other) => return Err(eyre!("not an editor command: {other}")),
            None => {}
        }

        e.mode = Mode::NORMAL;
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_chars_parse_in_order() {
        assert_eq!(
            parse_keys("gg"),
            vec![
                KeyEvent::new(KeyCode::Char('g'), KeyModifiers::NONE),
                KeyEvent::new(KeyCode::Char('g'), KeyModifiers::NONE),
            ]
        );
    }

    #[test]
    fn angle_names_parse_with_modifiers() {
        assert_eq!(
            parse_keys("<C-q>"),
            vec![KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL)]
        );
        assert_eq!(parse_keys("<Esc>"), vec![KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)]);
        assert_eq!(parse_keys("<F5>"), vec![KeyEvent::new(KeyCode::F(5), KeyModifiers::NONE)]);
        assert_eq!(parse_keys("<CR>"), vec![KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)]);
    }

    #[test]
    fn mixed_specs_interleave() {
        assert_eq!(
            parse_keys("d<Del>"),
            vec![
                KeyEvent::new(KeyCode::Char('d'), KeyModifiers::NONE),
                KeyEvent::new(KeyCode::Delete, KeyModifiers::NONE),
            ]
        );
    }

    #[test]
    fn mode_strings_expand() {
        assert_eq!(parse_modes("nic"), vec![Mode::NORMAL, Mode::INSERT, Mode::COMMAND]);
        assert_eq!(parse_modes(""), vec![]);
    }
}
