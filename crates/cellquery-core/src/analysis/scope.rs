//! Name binding while walking an expression.

use cellquery_engine::builtins::RANGE_MEMBERS;

const KEYWORDS: &[&str] = &[
    "let", "const", "if", "else", "switch", "do", "while", "until", "loop", "for", "in", "continue",
    "break", "return", "throw", "try", "catch", "fn", "private", "import", "export", "as",
    "global", "this", "is", "true", "false", "Fn", "call", "curry", "is_def_fn", "is_def_var",
    "is_shared", "type_of", "print", "debug", "eval",
];

/// Names that never refer to an input: literals and type names.
const GLOBALS: &[&str] = &[
    "null", "nil", "PI", "E", "INT", "FLOAT", "Array", "Map", "String", "Scalar", "Grid", "Table",
    "Row", "Column", "Cell", "Interior", "Font", "Origin",
];

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Identifiers that can never be variables.
pub fn is_reserved(name: &str) -> bool {
    is_keyword(name) || GLOBALS.contains(&name) || RANGE_MEMBERS.contains(&name)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameKind {
    /// A `{ ... }` block; ends at its closing brace.
    Block,
    /// Closure parameters; end with the closure body.
    Closure,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    depth: usize,
    names: Vec<String>,
}

/// Stack of binding frames keyed by bracket depth.
#[derive(Debug, Default)]
pub struct Scopes {
    frames: Vec<Frame>,
    depth: usize,
    /// Names waiting for the next block (`for x in`, `catch (e)`, `fn f(a)`).
    pending: Vec<String>,
    /// `let`/`const` names waiting for the end of their initializer.
    deferred: Vec<(String, usize)>,
}

impl Scopes {
    pub fn new(params: &[String]) -> Scopes {
        Scopes {
            frames: vec![Frame {
                kind: FrameKind::Block,
                depth: 0,
                names: params.to_vec(),
            }],
            depth: 0,
            pending: Vec::new(),
            deferred: Vec::new(),
        }
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.frames
            .iter()
            .any(|f| f.names.iter().any(|n| n == name))
    }

    /// `let`/`const` binding in the innermost frame.
    pub fn bind(&mut self, name: &str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.names.push(name.to_string());
        }
    }

    /// `let`/`const` binding that takes effect at the `;` ending the
    /// statement. The initializer still sees any outer name.
    pub fn bind_after_statement(&mut self, name: &str) {
        self.deferred.push((name.to_string(), self.depth));
    }

    pub fn bind_pending(&mut self, name: &str) {
        self.pending.push(name.to_string());
    }

    pub fn open_closure(&mut self, params: Vec<String>) {
        self.frames.push(Frame {
            kind: FrameKind::Closure,
            depth: self.depth,
            names: params,
        });
    }

    pub fn open_brace(&mut self) {
        self.depth += 1;
        self.frames.push(Frame {
            kind: FrameKind::Block,
            depth: self.depth,
            names: std::mem::take(&mut self.pending),
        });
    }

    pub fn open_bracket(&mut self) {
        self.depth += 1;
    }

    /// Close `)`, `]` or `}`: every frame opened at or below this level ends.
    pub fn close(&mut self) {
        let depth = self.depth;
        self.deferred.retain(|(_, d)| *d < depth);
        self.frames.retain(|f| f.depth < depth || (f.depth == 0 && f.kind == FrameKind::Block));
        self.depth = depth.saturating_sub(1);
    }

    /// `,` or `;`: closures whose body is an expression at this level end.
    pub fn separator(&mut self) {
        let depth = self.depth;
        while self
            .frames
            .last()
            .is_some_and(|f| f.kind == FrameKind::Closure && f.depth == depth)
        {
            self.frames.pop();
        }
    }

    /// `;`: ends the statement as well as any expression closure.
    pub fn end_statement(&mut self) {
        self.separator();
        let depth = self.depth;
        let (ready, waiting): (Vec<_>, Vec<_>) =
            self.deferred.drain(..).partition(|(_, d)| *d == depth);
        self.deferred = waiting;
        for (name, _) in ready {
            self.bind(&name);
        }
    }
}
