mod editor;

pub(crate) use self::editor::Mode;

pub use self::editor::Editor;
