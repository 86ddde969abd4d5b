//! Decodes the raw bytes a remote terminal sends into key events.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

const ESC: u8 = 0x1b;

const SEQUENCES: &[(&[u8], KeyCode, KeyModifiers)] = &[
    (b"\x1b[A", KeyCode::Up, KeyModifiers::NONE),
    (b"\x1b[B", KeyCode::Down, KeyModifiers::NONE),
    (b"\x1b[C", KeyCode::Right, KeyModifiers::NONE),
    (b"\x1b[D", KeyCode::Left, KeyModifiers::NONE),
    (b"\x1bOA", KeyCode::Up, KeyModifiers::NONE),
    (b"\x1bOB", KeyCode::Down, KeyModifiers::NONE),
    (b"\x1bOC", KeyCode::Right, KeyModifiers::NONE),
    (b"\x1bOD", KeyCode::Left, KeyModifiers::NONE),
    (b"\x1b[H", KeyCode::Home, KeyModifiers::NONE),
    (b"\x1bOH", KeyCode::Home, KeyModifiers::NONE),
    (b"\x1b[1~", KeyCode::Home, KeyModifiers::NONE),
    (b"\x1b[F", KeyCode::End, KeyModifiers::NONE),
    (b"\x1bOF", KeyCode::End, KeyModifiers::NONE),
    (b"\x1b[4~", KeyCode::End, KeyModifiers::NONE),
    (b"\x1b[2~", KeyCode::Insert, KeyModifiers::NONE),
    (b"\x1b[3~", KeyCode::Delete, KeyModifiers::NONE),
    (b"\x1b[5~", KeyCode::PageUp, KeyModifiers::NONE),
    (b"\x1b[6~", KeyCode::PageDown, KeyModifiers::NONE),
    (b"\x1b[Z", KeyCode::BackTab, KeyModifiers::SHIFT),
    (b"\x1bOM", KeyCode::Enter, KeyModifiers::NONE),
    (b"\x1bOP", KeyCode::F(1), KeyModifiers::NONE),
    (b"\x1bOQ", KeyCode::F(2), KeyModifiers::NONE),
    (b"\x1bOR", KeyCode::F(3), KeyModifiers::NONE),
    (b"\x1bOS", KeyCode::F(4), KeyModifiers::NONE),
];

/// Decodes one chunk of input. Unknown escape sequences are skipped whole so
/// their tail never shows up as typed text.
pub fn decode_keys(data: &[u8]) -> Vec<KeyEvent> {
    let mut keys = Vec::new();
    let mut rest = data;

    while let Some(&first) = rest.first() {
        if first == ESC {
            let (key, consumed) = decode_escape(rest);
            keys.extend(key);
            rest = &rest[consumed..];
            continue;
        }

        let consumed = match first {
            b'\r' | b'\n' => {
                keys.push(plain(KeyCode::Enter));
                1
            }
            b'\t' => {
                keys.push(plain(KeyCode::Tab));
                1
            }
            0x7f | 0x08 => {
                keys.push(plain(KeyCode::Backspace));
                1
            }
            0x00 => {
                keys.push(KeyEvent::new(KeyCode::Char(' '), KeyModifiers::CONTROL));
                1
            }
            1..=26 => {
                keys.push(KeyEvent::new(
                    KeyCode::Char(char::from(first + 96)),
                    KeyModifiers::CONTROL,
                ));
                1
            }
            0x1c..=0x1f => 1,
            _ => {
                let (ch, len) = decode_char(rest);
                if let Some(ch) = ch {
                    keys.push(char_key(ch, KeyModifiers::NONE));
                }
                len
            }
        };
        rest = &rest[consumed..];
    }
    keys
}

fn decode_escape(rest: &[u8]) -> (Option<KeyEvent>, usize) {
    if let Some((seq, code, modifiers)) = SEQUENCES.iter().find(|(seq, ..)| rest.starts_with(seq)) {
        return (Some(KeyEvent::new(*code, *modifiers)), seq.len());
    }
    match rest.get(1) {
        None | Some(&ESC) => (Some(plain(KeyCode::Esc)), 1),
        Some(b'[') => {
            let end = rest[2..]
                .iter()
                .position(|byte| (0x40..=0x7e).contains(byte))
                .map_or(rest.len(), |index| index + 3);
            (None, end)
        }
        Some(b'O') => (None, rest.len().min(3)),
        Some(&next) if next.is_ascii_graphic() => (
            Some(char_key(char::from(next), KeyModifiers::ALT)),
            2,
        ),
        Some(_) => (Some(plain(KeyCode::Esc)), 1),
    }
}

fn decode_char(rest: &[u8]) -> (Option<char>, usize) {
    let len = match rest[0] {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => return (None, 1),
    };
    if rest.len() < len {
        return (None, rest.len());
    }
    match std::str::from_utf8(&rest[..len]) {
        Ok(text) => (text.chars().next(), len),
        Err(_) => (None, 1),
    }
}

fn plain(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn char_key(ch: char, modifiers: KeyModifiers) -> KeyEvent {
    let modifiers = if ch.is_ascii_uppercase() {
        modifiers | KeyModifiers::SHIFT
    } else {
        modifiers
    };
    KeyEvent::new(KeyCode::Char(ch), modifiers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(data: &[u8]) -> Vec<KeyCode> {
        decode_keys(data).into_iter().map(|key| key.code).collect()
    }

    #[test]
    fn plain_text_and_control_keys() {
        assert_eq!(
            codes(b"jk\r\t\x7f"),
            vec![
                KeyCode::Char('j'),
                KeyCode::Char('k'),
                KeyCode::Enter,
                KeyCode::Tab,
                KeyCode::Backspace,
            ]
        );
    }

    #[test]
    fn control_bytes_map_to_ctrl_letters() {
        let keys = decode_keys(b"\x03\x04");
        assert_eq!(
            keys,
            vec![
                KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
                KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL),
            ]
        );
    }

    #[test]
    fn cursor_sequences_in_both_modes() {
        assert_eq!(
            codes(b"\x1b[A\x1bOB\x1b[5~\x1b[3~"),
            vec![
                KeyCode::Up,
                KeyCode::Down,
                KeyCode::PageUp,
                KeyCode::Delete,
            ]
        );
        assert_eq!(
            decode_keys(b"\x1b[Z"),
            vec![KeyEvent::new(KeyCode::BackTab, KeyModifiers::SHIFT)]
        );
    }

    #[test]
    fn lone_escape_and_alt_letters() {
        assert_eq!(codes(b"\x1b"), vec![KeyCode::Esc]);
        assert_eq!(codes(b"\x1b\x1b"), vec![KeyCode::Esc, KeyCode::Esc]);
        assert_eq!(
            decode_keys(b"\x1bx"),
            vec![KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT)]
        );
    }

    #[test]
    fn unknown_sequences_are_swallowed() {
        assert_eq!(
            codes(b"a\x1b[200~b\x1b[1;5Cc"),
            vec![KeyCode::Char('a'), KeyCode::Char('b'), KeyCode::Char('c')]
        );
    }

    #[test]
    fn multibyte_characters_decode_whole() {
        assert_eq!(
            codes("é✓".as_bytes()),
            vec![KeyCode::Char('é'), KeyCode::Char('✓')]
        );
        assert_eq!(codes(&[0xe2, 0x9c]), Vec::<KeyCode>::new());
    }

    #[test]
    fn uppercase_carries_shift() {
        assert_eq!(
            decode_keys(b"F"),
            vec![KeyEvent::new(KeyCode::Char('F'), KeyModifiers::SHIFT)]
        );
    }
}
