//! Block formatting
//!
//! Generated text carries one statement or brace per line and no
//! indentation. The formatter re-indents it by brace depth, which is enough
//! for display and for stable test expectations. Hosts normally reformat the
//! inserted nodes themselves.

/// Trait for emitting formatted output.
pub trait Emitter {
    /// Emit a text fragment.
    fn emit(&mut self, text: &str);

    /// Emit a newline (Unix-style `\n`).
    fn emit_newline(&mut self);

    /// Emit indentation as the given number of spaces.
    fn emit_indent(&mut self, spaces: usize);
}

/// String-based emitter for in-memory formatting.
#[derive(Default)]
pub struct StringEmitter {
    buffer: String,
}

impl StringEmitter {
    /// Create with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: String::with_capacity(capacity),
        }
    }

    pub fn output(self) -> String {
        self.buffer
    }
}

impl Emitter for StringEmitter {
    fn emit(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    fn emit_newline(&mut self) {
        self.buffer.push('\n');
    }

    fn emit_indent(&mut self, spaces: usize) {
        for _ in 0..spaces {
            self.buffer.push(' ');
        }
    }
}

/// Spaces per nesting level.
pub const INDENT_WIDTH: usize = 4;

/// Re-indent generated statements by brace depth.
pub fn format_block(text: &str) -> String {
    let mut emitter = StringEmitter::with_capacity(text.len() * 2);
    emit_block(text, &mut emitter);
    emitter.output()
}

/// Write `text` to `emitter`, one trimmed line at a time. Blank lines are
/// dropped.
pub fn emit_block(text: &str, emitter: &mut impl Emitter) {
    let mut depth = 0_usize;
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let (opens, closes) = brace_balance(line);
        let level = if line.starts_with('}') {
            depth.saturating_sub(1)
        } else {
            depth
        };
        emitter.emit_indent(level * INDENT_WIDTH);
        emitter.emit(line);
        emitter.emit_newline();
        depth = (depth + opens).saturating_sub(closes);
    }
}

/// Braces opened and closed on `line`, ignoring string and char literals.
fn brace_balance(line: &str) -> (usize, usize) {
    let mut opens = 0;
    let mut closes = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in line.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => opens += 1,
            '}' => closes += 1,
            _ => {}
        }
    }
    (opens, closes)
}
