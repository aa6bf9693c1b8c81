use std::io::{BufRead, Write};

/// One keypress, as far as the gate is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Waiting,
    Accepted,
    Declined,
}

/// Blocking yes/no decision point guarding a mutating action.
///
/// Affirmative is `y` (case-insensitive). `n`, plain Enter, and an explicit
/// cancel all decline. Any other key is ignored and the gate keeps
/// waiting. `Accepted` and `Declined` are terminal.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationGate {
    state: GateState,
}

impl ConfirmationGate {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: GateState::Waiting,
        }
    }

    #[must_use]
    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn observe(&mut self, key: Key) -> GateState {
        if self.state != GateState::Waiting {
            return self.state;
        }
        self.state = match key {
            Key::Char('y' | 'Y') => GateState::Accepted,
            Key::Char('n' | 'N') | Key::Enter | Key::Cancel => GateState::Declined,
            Key::Char(_) => GateState::Waiting,
        };
        self.state
    }
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Prompt on the terminal and block until the gate settles.
pub fn ask(prompt: &str) -> bool {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    ask_with(prompt, &mut input)
}

/// Drive the gate from a line-based reader: each character of a line is a
/// keypress, an empty line is Enter, end-of-input is an explicit cancel.
fn ask_with(prompt: &str, input: &mut dyn BufRead) -> bool {
    let mut gate = ConfirmationGate::new();

    while gate.state() == GateState::Waiting {
        print!("{prompt} [y/N] ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => {
                gate.observe(Key::Cancel);
                break;
            }
            Ok(_) => {}
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            gate.observe(Key::Enter);
        } else {
            for ch in trimmed.chars() {
                if gate.observe(Key::Char(ch)) != GateState::Waiting {
                    break;
                }
            }
        }
    }

    gate.state() == GateState::Accepted
}
