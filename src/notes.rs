//! NoteNameList scanning and note checks
//!
//! A `NoteNameList` groups `Note` elements, each carrying a MIDI note `Number`
//! and a `Name`. The scan collects every list in document order together with all
//! of its descendant notes; nested lists contribute their notes to every enclosing
//! list and are also reported as lists of their own.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::libxml2::{XmlDocument, XmlElement};

const NOTE_NAME_LIST: &[u8] = b"NoteNameList";
const NOTE: &[u8] = b"Note";

/// A note as written in the document; missing attributes read as empty strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub number: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteNameList {
    pub name: String,
    pub notes: Vec<Note>,
}

/// Which strings count as a valid note `Number`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NoteNumberGrammar {
    /// Any decimal numeric string: sign, fraction and exponent allowed
    #[default]
    Numeric,
    /// A MIDI note number: ASCII digits only, 0 through 127
    Midi,
}

impl NoteNumberGrammar {
    pub fn accepts(&self, number: &str) -> bool {
        match self {
            NoteNumberGrammar::Numeric => is_numeric_string(number),
            NoteNumberGrammar::Midi => {
                !number.is_empty()
                    && number.bytes().all(|b| b.is_ascii_digit())
                    && number.parse::<u32>().is_ok_and(|n| n <= 127)
            }
        }
    }
}

impl std::str::FromStr for NoteNumberGrammar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "numeric" => Ok(NoteNumberGrammar::Numeric),
            "midi" => Ok(NoteNumberGrammar::Midi),
            other => Err(format!("unknown note number grammar: {other}")),
        }
    }
}

/// Decimal numeric string: `[ws][+-](digits[.digits]|.digits)[(e|E)[+-]digits][ws]`
fn is_numeric_string(s: &str) -> bool {
    let s = s.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c'));
    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    let skip_digits = |mut i: usize| {
        while i < len && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    if i < len && matches!(bytes[i], b'+' | b'-') {
        i += 1;
    }

    let int_end = skip_digits(i);
    let int_digits = int_end - i;
    i = int_end;

    let mut frac_digits = 0;
    if i < len && bytes[i] == b'.' {
        let frac_end = skip_digits(i + 1);
        frac_digits = frac_end - (i + 1);
        i = frac_end;
    }

    if int_digits + frac_digits == 0 {
        return false;
    }

    if i < len && matches!(bytes[i], b'e' | b'E') {
        i += 1;
        if i < len && matches!(bytes[i], b'+' | b'-') {
            i += 1;
        }
        let exp_end = skip_digits(i);
        if exp_end == i {
            return false;
        }
        i = exp_end;
    }

    i == len
}

/// Collect every NoteNameList with its descendant notes, in document order
pub fn collect_note_lists(document: &XmlDocument) -> Vec<NoteNameList> {
    let mut lists = Vec::new();
    // Indices into `lists` of the NoteNameList elements enclosing the current one
    let mut open = Vec::new();

    if let Some(root) = document.root_element() {
        visit(root, &mut lists, &mut open);
    }

    lists
}

fn visit(element: XmlElement<'_>, lists: &mut Vec<NoteNameList>, open: &mut Vec<usize>) {
    let is_list = element.name() == NOTE_NAME_LIST;

    if is_list {
        lists.push(NoteNameList {
            name: attribute(&element, "Name"),
            notes: Vec::new(),
        });
        open.push(lists.len() - 1);
    } else if element.name() == NOTE && !open.is_empty() {
        let note = Note {
            number: attribute(&element, "Number"),
            name: attribute(&element, "Name"),
        };
        for &index in open.iter() {
            lists[index].notes.push(note.clone());
        }
    }

    for child in element.children() {
        visit(child, lists, open);
    }

    if is_list {
        open.pop();
    }
}

/// Missing attributes read as ""
fn attribute(element: &XmlElement<'_>, key: &str) -> String {
    element.attribute(key).unwrap_or_default()
}

/// Run the per-list note checks and return the error strings in traversal order
pub fn check_note_lists(lists: &[NoteNameList], grammar: NoteNumberGrammar) -> Vec<String> {
    let mut errors = Vec::new();

    for list in lists {
        let mut seen: HashSet<&str> = HashSet::new();

        for note in &list.notes {
            let number = note.number.as_str();

            if number.is_empty() || !grammar.accepts(number) {
                errors.push(format!("Invalid note number: {number}"));
            }

            if note.name.is_empty() {
                errors.push(format!("Empty note name for note {number}"));
            }

            if !seen.insert(number) {
                errors.push(format!("Duplicate note number: {number} in {}", list.name));
            }
        }
    }

    errors
}
