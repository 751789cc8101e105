use color_eyre::Report;
use crossterm::event::{KeyCode, KeyEvent};
use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::editor::{Editor, Mode};

pub(crate) type ActionFn = dyn FnMut(&mut Editor) -> Result<(), Report>;

#[derive(Clone)]
struct KeyNode {
    children: HashMap<KeyEvent, Rc<RefCell<KeyNode>>>,
    action: Option<Rc<RefCell<ActionFn>>>,
}

/// Per-mode prefix trie of key sequences.
///
/// Multi-key binds (`gg`, `dd`) are inner paths; `current` remembers the
/// partially matched sequence between events so the editor can keep feeding
/// keys in one at a time. In NORMAL mode, digits that match no bind
/// accumulate into a count prefix consumed by the next action.
pub struct Keymap {
    root: HashMap<Mode, Rc<RefCell<KeyNode>>>,
    current: Option<Rc<RefCell<KeyNode>>>,
    count: Option<usize>,
}

impl KeyNode {
    fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self { children: HashMap::new(), action: None }))
    }

    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn insert(&mut self, sequence: &[KeyEvent], action: Rc<RefCell<ActionFn>>) {
        let Some((key, rest)) = sequence.split_first() else {
            self.action = Some(action);
            return;
        };

        let next = self.children.entry(*key).or_insert_with(KeyNode::new);
        next.borrow_mut().insert(rest, action);
    }
}

impl Keymap {
    pub fn new() -> Self {
        Self { root: HashMap::new(), current: None, count: None }
    }

    /// Registers `action` under the same key sequence in every given mode.
    /// The action is shared, not duplicated.
    pub fn add_keybind<F>(&mut self, modes: Vec<Mode>, sequence: Vec<KeyEvent>, action: F)
    where
        F: FnMut(&mut Editor) -> Result<(), Report> + 'static,
    {
        let action: Rc<RefCell<ActionFn>> = Rc::new(RefCell::new(action));

        for mode in modes {
            let root = self.root.entry(mode).or_insert_with(KeyNode::new);
            root.borrow_mut().insert(&sequence, action.clone());
        }
    }

    /// Advances the pending sequence by one key. Returns the event back when
    /// nothing in the trie matches it, so the editor can treat it as plain
    /// input for the current mode.
    pub fn traverse(&mut self, mode: &Mode, event: KeyEvent) -> Option<KeyEvent> {
        let current = match (&self.current, self.root.get(mode)) {
            (Some(node), _) => node.clone(),
            (None, Some(root)) => root.clone(),
            (None, None) => return Some(event),
        };

        let next = current.borrow().children.get(&event).cloned();
        match next {
            Some(node) => {
                self.current = Some(node);
                None
            }
            None => {
                // Count prefixes only make sense at the start of a NORMAL
                // sequence; everywhere else a digit is ordinary input.
                if self.current.is_none() && *mode == Mode::NORMAL {
                    if let Some(digit) = event_to_digit(&event) {
                        self.count = Some(self.count.unwrap_or(0) * 10 + digit);
                        return None;
                    }
                }

                Some(event)
            }
        }
    }

    pub fn is_leaf(&self) -> bool {
        match self.current {
            Some(ref node) => node.borrow().is_leaf(),
            None => false,
        }
    }

    pub fn get_action(&self) -> Option<Rc<RefCell<ActionFn>>> {
        self.current.as_ref()?.borrow().action.clone()
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.count = None;
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// The accumulated count prefix, defaulting to one. Consumes it.
    pub fn repeats(&mut self) -> usize {
        self.count.take().unwrap_or(1)
    }
}

fn event_to_digit(event: &KeyEvent) -> Option<usize> {
    match event.code {
        KeyCode::Char(c) if c.is_ascii_digit() => c.to_digit(10).map(|d| d as usize),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn multi_key_sequences_resolve_at_the_leaf() {
        let mut keymap = Keymap::new();
        keymap.add_keybind(vec![Mode::NORMAL], vec![key('g'), key('g')], |_| Ok(()));

        assert!(keymap.traverse(&Mode::NORMAL, key('g')).is_none());
        assert!(!keymap.is_leaf());
        assert!(keymap.traverse(&Mode::NORMAL, key('g')).is_none());
        assert!(keymap.is_leaf());
        assert!(keymap.get_action().is_some());

        keymap.clear();
        assert!(keymap.is_empty());
    }

    #[test]
    fn unbound_keys_come_back_unresolved() {
        let mut keymap = Keymap::new();
        keymap.add_keybind(vec![Mode::NORMAL], vec![key('x')], |_| Ok(()));

        assert_eq!(keymap.traverse(&Mode::NORMAL, key('z')), Some(key('z')));
        // No INSERT binds at all; the event must still come back.
        assert_eq!(keymap.traverse(&Mode::INSERT, key('x')), Some(key('x')));
    }

    #[test]
    fn shared_action_reaches_every_mode() {
        let mut keymap = Keymap::new();
        keymap.add_keybind(vec![Mode::NORMAL, Mode::INSERT], vec![key('q')], |_| Ok(()));

        for mode in [Mode::NORMAL, Mode::INSERT] {
            assert!(keymap.traverse(&mode, key('q')).is_none());
            assert!(keymap.get_action().is_some());
            keymap.clear();
        }
    }

    #[test]
    fn digits_accumulate_into_a_count_in_normal_mode() {
        let mut keymap = Keymap::new();
        keymap.add_keybind(vec![Mode::NORMAL], vec![key('j')], |_| Ok(()));

        assert!(keymap.traverse(&Mode::NORMAL, key('1')).is_none());
        assert!(keymap.traverse(&Mode::NORMAL, key('2')).is_none());
        assert!(keymap.traverse(&Mode::NORMAL, key('j')).is_none());
        assert_eq!(keymap.repeats(), 12);
        assert_eq!(keymap.repeats(), 1);
    }

    #[test]
    fn digits_stay_plain_input_outside_normal_mode() {
        let mut keymap = Keymap::new();
        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        keymap.add_keybind(vec![Mode::COMMAND], vec![enter], |_| Ok(()));

        assert_eq!(keymap.traverse(&Mode::COMMAND, key('3')), Some(key('3')));
        assert_eq!(keymap.repeats(), 1);
    }
}
