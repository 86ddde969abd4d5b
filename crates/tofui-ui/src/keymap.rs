use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    code: KeyCode,
    modifiers: KeyModifiers,
}

impl KeySpec {
    pub const fn char(ch: char) -> Self {
        Self {
            code: KeyCode::Char(ch),
            modifiers: KeyModifiers::NONE,
        }
    }

    pub const fn ctrl(ch: char) -> Self {
        Self {
            code: KeyCode::Char(ch),
            modifiers: KeyModifiers::CONTROL,
        }
    }

    pub const fn code(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    /// Shift is ignored: terminals disagree on reporting it for capitals.
    pub fn matches(&self, key: &KeyEvent) -> bool {
        if key.kind == KeyEventKind::Release {
            return false;
        }
        let relevant = key.modifiers & (KeyModifiers::CONTROL | KeyModifiers::ALT);
        self.code == key.code && self.modifiers == relevant
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub keys: &'static [KeySpec],
    pub label: &'static str,
    pub help: &'static str,
}

impl Binding {
    pub fn matches(&self, key: &KeyEvent) -> bool {
        self.keys.iter().any(|spec| spec.matches(key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalAction {
    Quit,
    Home,
    Back,
    Compose,
    QuickSwitch,
    Help,
    Sidebar,
}

static FORCE_QUIT: Binding = Binding {
    keys: &[KeySpec::ctrl('c')],
    label: "ctrl+c",
    help: "quit",
};

const GLOBAL_BINDINGS: &[(GlobalAction, Binding)] = &[
    (
        GlobalAction::Home,
        Binding {
            keys: &[KeySpec::char('F'), KeySpec::char('1')],
            label: "F/1",
            help: "home feed",
        },
    ),
    (
        GlobalAction::Compose,
        Binding {
            keys: &[KeySpec::char('P')],
            label: "P",
            help: "publish cast",
        },
    ),
    (
        GlobalAction::QuickSwitch,
        Binding {
            keys: &[KeySpec::ctrl('k')],
            label: "ctrl+k",
            help: "quick switch channel",
        },
    ),
    (
        GlobalAction::Sidebar,
        Binding {
            keys: &[KeySpec::code(KeyCode::Tab)],
            label: "tab",
            help: "sidebar",
        },
    ),
    (
        GlobalAction::Back,
        Binding {
            keys: &[KeySpec::code(KeyCode::Esc)],
            label: "esc",
            help: "back",
        },
    ),
    (
        GlobalAction::Help,
        Binding {
            keys: &[KeySpec::char('?')],
            label: "?",
            help: "toggle help",
        },
    ),
    (
        GlobalAction::Quit,
        Binding {
            keys: &[KeySpec::char('q')],
            label: "q",
            help: "quit",
        },
    ),
];

pub const LIST_BINDINGS: &[Binding] = &[
    Binding {
        keys: &[KeySpec::char('j'), KeySpec::code(KeyCode::Down)],
        label: "j/down",
        help: "move down",
    },
    Binding {
        keys: &[KeySpec::char('k'), KeySpec::code(KeyCode::Up)],
        label: "k/up",
        help: "move up",
    },
    Binding {
        keys: &[KeySpec::char('g'), KeySpec::code(KeyCode::Home)],
        label: "g/G",
        help: "first / last",
    },
    Binding {
        keys: &[KeySpec::code(KeyCode::Enter)],
        label: "enter",
        help: "open cast",
    },
    Binding {
        keys: &[KeySpec::char('p')],
        label: "p",
        help: "author profile",
    },
    Binding {
        keys: &[KeySpec::char('c')],
        label: "c",
        help: "open channel",
    },
    Binding {
        keys: &[KeySpec::char('l'), KeySpec::char('s')],
        label: "l/s",
        help: "like / recast",
    },
    Binding {
        keys: &[KeySpec::char('r')],
        label: "r",
        help: "reply",
    },
    Binding {
        keys: &[KeySpec::char('o')],
        label: "o",
        help: "open in browser",
    },
    Binding {
        keys: &[KeySpec::char('R')],
        label: "R",
        help: "reload",
    },
];

pub const COMPOSER_BINDINGS: &[Binding] = &[
    Binding {
        keys: &[KeySpec::ctrl('d')],
        label: "ctrl+d",
        help: "publish (asks to confirm)",
    },
    Binding {
        keys: &[KeySpec::code(KeyCode::Esc)],
        label: "esc",
        help: "discard and close",
    },
];

/// Session-wide bindings evaluated before the focused view sees a key.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalKeyMap;

impl GlobalKeyMap {
    pub fn is_force_quit(&self, key: &KeyEvent) -> bool {
        FORCE_QUIT.matches(key)
    }

    pub fn action(&self, key: &KeyEvent) -> Option<GlobalAction> {
        GLOBAL_BINDINGS
            .iter()
            .find(|(_, binding)| binding.matches(key))
            .map(|(action, _)| *action)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &'static Binding> {
        std::iter::once(&FORCE_QUIT).chain(GLOBAL_BINDINGS.iter().map(|(_, binding)| binding))
    }

    /// Compact hint for the status line.
    pub fn short_help(&self) -> &'static str {
        "F feed  P publish  ctrl+k switch  ? help"
    }
}

/// Printable character typed without control or alt.
pub fn typed_char(key: &KeyEvent) -> Option<char> {
    if key.kind == KeyEventKind::Release
        || key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
    {
        return None;
    }
    match key.code {
        KeyCode::Char(ch) => Some(ch),
        _ => None,
    }
}
