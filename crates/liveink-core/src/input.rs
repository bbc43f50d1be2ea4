//! Keyboard input, shortcut lookup and the canvas context menu.

use serde::{Deserialize, Serialize};

/// A key as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Char(char),
    Enter,
    Escape,
    Backspace,
    Delete,
}

impl Key {
    /// Parse a DOM-style key name ("Enter", "Escape", "a", "/").
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Enter" => Some(Self::Enter),
            "Escape" | "Esc" => Some(Self::Escape),
            "Backspace" => Some(Self::Backspace),
            "Delete" => Some(Self::Delete),
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Self::Char(c)),
                    _ => None,
                }
            }
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Char(c) => c.to_string(),
            Self::Enter => "Enter".to_string(),
            Self::Escape => "Escape".to_string(),
            Self::Backspace => "Backspace".to_string(),
            Self::Delete => "Delete".to_string(),
        }
    }
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        meta: false,
    };

    pub const CTRL: Self = Self {
        shift: false,
        ctrl: true,
        meta: false,
    };

    /// Ctrl on Linux/Windows, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// What a shortcut does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    OpenChat,
    OpenReactions,
    HideCursor,
    DeleteSelection,
    Copy,
    Cut,
    Paste,
    Undo,
    Redo,
}

/// A keyboard shortcut definition.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub key: Key,
    pub command: bool,
    pub action: Action,
    pub description: &'static str,
}

impl Shortcut {
    pub const fn new(key: Key, command: bool, action: Action, description: &'static str) -> Self {
        Self {
            key,
            command,
            action,
            description,
        }
    }

    /// Format the shortcut for display (e.g., "Ctrl+Z").
    pub fn format(&self) -> String {
        let key = match self.key {
            Key::Char(c) => c.to_ascii_uppercase().to_string(),
            other => other.name(),
        };
        if self.command {
            format!("Ctrl+{key}")
        } else {
            key
        }
    }
}

/// Registry of all keyboard shortcuts.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    /// Get all registered shortcuts.
    pub fn all() -> Vec<Shortcut> {
        vec![
            Shortcut::new(Key::Char('/'), false, Action::OpenChat, "Open cursor chat"),
            Shortcut::new(Key::Char('e'), false, Action::OpenReactions, "Pick a reaction"),
            Shortcut::new(Key::Escape, false, Action::HideCursor, "Close chat or reactions"),
            Shortcut::new(Key::Delete, false, Action::DeleteSelection, "Delete selected shape"),
            Shortcut::new(Key::Backspace, false, Action::DeleteSelection, "Delete selected shape"),
            Shortcut::new(Key::Char('c'), true, Action::Copy, "Copy shape"),
            Shortcut::new(Key::Char('x'), true, Action::Cut, "Cut shape"),
            Shortcut::new(Key::Char('v'), true, Action::Paste, "Paste shapes"),
            Shortcut::new(Key::Char('z'), true, Action::Undo, "Undo"),
            Shortcut::new(Key::Char('y'), true, Action::Redo, "Redo"),
        ]
    }

    /// Find the action bound to a key press. Letters match case-insensitively.
    pub fn lookup(key: Key, modifiers: Modifiers) -> Option<Action> {
        let key = match key {
            Key::Char(c) => Key::Char(c.to_ascii_lowercase()),
            other => other,
        };
        Self::all()
            .into_iter()
            .find(|s| s.key == key && s.command == modifiers.command())
            .map(|s| s.action)
    }

    /// Log all shortcuts.
    pub fn log_all() {
        for shortcut in Self::all() {
            log::info!("  {:12} {}", shortcut.format(), shortcut.description);
        }
    }
}

/// Entries of the canvas context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextMenuItem {
    Chat,
    Undo,
    Redo,
    Reactions,
}

impl ContextMenuItem {
    pub fn all() -> &'static [ContextMenuItem] {
        &[Self::Chat, Self::Undo, Self::Redo, Self::Reactions]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Chat => "Chat",
            Self::Undo => "Undo",
            Self::Redo => "Redo",
            Self::Reactions => "Reactions",
        }
    }

    /// Shortcut hint shown next to the entry.
    pub fn shortcut(&self) -> &'static str {
        match self {
            Self::Chat => "/",
            Self::Undo => "Ctrl+Z",
            Self::Redo => "Ctrl+Y",
            Self::Reactions => "E",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|item| item.name() == name)
    }
}
