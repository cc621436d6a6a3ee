//! Character-level state machine behind [`crate::parser::parse`].
//!
//! A single pass over the line produces invocations directly: quoting, escaping,
//! variable substitution and redirect detection happen while scanning, and alias
//! text is spliced into the input at the start of every stage.

use crate::alias::AliasStore;
use crate::env::VariableStore;
use crate::parser::{Invocation, Redirect, RedirectMode, RedirectStream};

/// Characters a backslash may escape inside double quotes.
const DOUBLE_QUOTE_ESCAPABLE: [char; 4] = ['"', '\\', '$', '`'];

pub(crate) struct LexingFSM<'a> {
    input: Vec<char>,
    pos: usize,
    aliases: &'a AliasStore,
    vars: &'a VariableStore,

    buffer: String,
    /// A substitution happened in the current word, so it is emitted even if empty.
    word_started: bool,
    in_single_quotes: bool,
    in_double_quotes: bool,
    escaping: bool,

    arguments: Vec<String>,
    redirect: Option<Redirect>,

    /// Aliases whose spliced text is still ahead, with the end of that text.
    expanding: Vec<(String, usize)>,
}

impl<'a> LexingFSM<'a> {
    pub(crate) fn new(line: &str, aliases: &'a AliasStore, vars: &'a VariableStore) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            aliases,
            vars,
            buffer: String::new(),
            word_started: false,
            in_single_quotes: false,
            in_double_quotes: false,
            escaping: false,
            arguments: Vec::new(),
            redirect: None,
            expanding: Vec::new(),
        }
    }

    /// Scan the whole input, one invocation per `|`-separated stage.
    pub(crate) fn make_invocations(mut self) -> Vec<Invocation> {
        let mut out = Vec::new();
        loop {
            self.expand_alias();
            self.reset();
            let command = self.read_command();
            self.read_arguments();
            out.push(Invocation {
                command,
                arguments: std::mem::take(&mut self.arguments),
                redirect: self.redirect.take(),
            });
            if self.pos >= self.input.len() {
                break;
            }
        }
        out
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek_char(), Some(' ' | '\t')) {
            self.pos += 1;
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.word_started = false;
        self.in_single_quotes = false;
        self.in_double_quotes = false;
        self.escaping = false;
        self.arguments.clear();
        self.redirect = None;
    }

    /// End of the word starting at `start`: the next blank or `|`.
    fn word_end(&self, start: usize) -> usize {
        self.input[start..]
            .iter()
            .position(|c| matches!(c, ' ' | '\t' | '|'))
            .map_or(self.input.len(), |offset| start + offset)
    }

    /// Replace the stage's leading word with its alias text, repeatedly.
    ///
    /// A name is not expanded again while the stage starts inside text that its
    /// own expansion produced, so self references and cycles stop even when they
    /// go through a `|`. Stages past that text expand the name normally.
    fn expand_alias(&mut self) {
        let pos = self.pos;
        self.expanding.retain(|(_, end)| *end > pos);
        loop {
            let start = self.pos;
            let end = self.word_end(start);
            let word: String = self.input[start..end].iter().collect();
            let Some(text) = self.aliases.lookup(&word) else {
                return;
            };
            if self.expanding.iter().any(|(name, _)| *name == word) {
                return;
            }

            let text: Vec<char> = text.trim().chars().collect();
            let text_end = start + text.len();
            for (_, region_end) in &mut self.expanding {
                // Enclosing regions grow or shrink by the size change.
                *region_end = *region_end + text.len() - (end - start);
            }
            self.input.splice(start..end, text);
            self.expanding.push((word, text_end));
        }
    }

    /// Read the command name of the current stage.
    ///
    /// A quoted name runs to the matching quote; the closing quote and the blank
    /// after it are skipped. An unquoted name runs to the first blank or `|`.
    fn read_command(&mut self) -> String {
        let quote = match self.peek_char() {
            Some(q @ ('\'' | '"')) => {
                self.pos += 1;
                Some(q)
            }
            _ => None,
        };

        let mut command = String::new();
        while let Some(ch) = self.peek_char() {
            let at_end = match quote {
                Some(q) => ch == q,
                None => matches!(ch, ' ' | '\t' | '|'),
            };
            if at_end {
                break;
            }
            command.push(ch);
            self.pos += 1;
        }

        match quote {
            Some(_) => self.pos += 2,
            None if self.peek_char() != Some('|') => self.pos += 1,
            None => {}
        }
        self.pos = self.pos.min(self.input.len());
        command
    }

    /// Scan arguments up to the end of the stage.
    fn read_arguments(&mut self) {
        while let Some(ch) = self.read_char() {
            if self.escaping {
                self.buffer.push(ch);
                self.escaping = false;
                continue;
            }

            match ch {
                // Not quote-aware: a `|` always ends the stage.
                '|' => {
                    self.flush_word();
                    self.skip_whitespace();
                    return;
                }
                '>' if !self.in_quotes() => self.read_redirect(),
                '\\' => self.handle_backslash(),
                '\'' => self.handle_single_quote(),
                '"' => self.handle_double_quote(),
                '$' => self.handle_dollar(),
                ' ' | '\t' if !self.in_quotes() => self.flush_word(),
                c => self.buffer.push(c),
            }
        }
        self.flush_word();
    }

    fn in_quotes(&self) -> bool {
        self.in_single_quotes || self.in_double_quotes
    }

    fn flush_word(&mut self) {
        if !self.buffer.is_empty() || self.word_started {
            self.arguments.push(std::mem::take(&mut self.buffer));
        }
        self.word_started = false;
    }

    fn handle_backslash(&mut self) {
        if self.in_single_quotes {
            self.buffer.push('\\');
        } else if self.in_double_quotes {
            match self.peek_char() {
                Some(next) if DOUBLE_QUOTE_ESCAPABLE.contains(&next) => self.escaping = true,
                _ => self.buffer.push('\\'),
            }
        } else {
            self.escaping = true;
        }
    }

    fn handle_single_quote(&mut self) {
        if self.in_double_quotes {
            self.buffer.push('\'');
        } else {
            self.in_single_quotes = !self.in_single_quotes;
        }
    }

    fn handle_double_quote(&mut self) {
        if self.in_single_quotes {
            self.buffer.push('"');
        } else {
            self.in_double_quotes = !self.in_double_quotes;
        }
    }

    /// `$NAME` outside single quotes; unknown names expand to nothing.
    fn handle_dollar(&mut self) {
        if self.in_single_quotes {
            self.buffer.push('$');
            return;
        }

        let mut name = String::new();
        while let Some(ch) = self.peek_char() {
            if !(ch.is_alphanumeric() || ch == '_') {
                break;
            }
            name.push(ch);
            self.pos += 1;
        }

        if name.is_empty() {
            self.buffer.push('$');
            return;
        }
        if let Some(value) = self.vars.lookup(&name) {
            self.buffer.push_str(value);
        }
        self.word_started = true;
    }

    /// Called after an unquoted `>`.
    ///
    /// A pending word of exactly `1` or `2` selects the stream and is consumed; a
    /// second `>` selects append mode. The target runs to the next blank or `|`.
    fn read_redirect(&mut self) {
        let mut stream = RedirectStream::Stdout;
        match self.buffer.as_str() {
            "1" => self.buffer.clear(),
            "2" => {
                stream = RedirectStream::Stderr;
                self.buffer.clear();
            }
            _ => {}
        }

        let mut mode = RedirectMode::Rewrite;
        if self.peek_char() == Some('>') {
            mode = RedirectMode::Append;
            self.pos += 1;
        }
        self.skip_whitespace();

        let end = self.word_end(self.pos);
        let target: String = self.input[self.pos..end].iter().collect();
        self.pos = end;

        self.redirect = Some(Redirect {
            target,
            mode,
            stream,
        });
    }
}
