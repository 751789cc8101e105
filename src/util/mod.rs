mod display;
mod keymap;

pub(crate) use display::Display;
pub(crate) use keymap::Keymap;
