use std::collections::HashMap;

use tracing::debug;

use crate::ast::{Arg, Expr, InstrStmt, Stmt};
use crate::token::{Kind, Token};

/// Fold repeated instruction tails into shared trampolines.
///
/// Each pass builds a trie of straight-line runs keyed on the canonical
/// rendering of every reducible instruction, scores the nodes that end in
/// an unconditional jump, and rewrites the most profitable one: the
/// lexically-latest occurrence keeps the code (gaining a fresh label) and
/// every earlier occurrence collapses to a single jump. The loop stops
/// once no rewrite saves at least one instruction; every pass shortens
/// the program, so it terminates.
pub fn reduce(program: &mut Vec<Stmt>) {
    let mut pass = 0;
    loop {
        let trie = build(program);
        let Some((node, saved)) = trie.best() else {
            return;
        };
        let depth = trie.nodes[node].depth;
        let mut starts = trie.nodes[node].indexes.clone();
        starts.sort_unstable_by(|a, b| b.cmp(a));
        let keep = starts[0];
        let replaced = &starts[1..];
        let name = format!("__asm_reduction.{pass}");
        debug!(
            pass,
            saved,
            depth,
            occurrences = starts.len(),
            label = %name,
            "folding common tail"
        );
        let jump = jump_to(&name);
        for &idx in replaced {
            program.splice(idx..idx + depth, [jump.clone()]);
        }
        // everything below the kept occurrence moved up
        let keep = keep - replaced.len() * (depth - 1);
        program.insert(keep, label_stmt(&name));
        pass += 1;
    }
}

struct Node {
    indexes: Vec<usize>,
    depth: usize,
    terminal: bool,
    children: HashMap<String, usize>,
}

struct Trie {
    nodes: Vec<Node>,
}

impl Trie {
    fn new() -> Self {
        Self {
            nodes: vec![Node {
                indexes: Vec::new(),
                depth: 0,
                terminal: false,
                children: HashMap::new(),
            }],
        }
    }

    fn child(&mut self, node: usize, instr: &InstrStmt, start: usize) -> usize {
        let key = instr.to_string();
        if let Some(&existing) = self.nodes[node].children.get(&key) {
            self.nodes[existing].indexes.push(start);
            return existing;
        }
        let id = self.nodes.len();
        let depth = self.nodes[node].depth + 1;
        self.nodes.push(Node {
            indexes: vec![start],
            depth,
            terminal: instr.is_terminator(),
            children: HashMap::new(),
        });
        self.nodes[node].children.insert(key, id);
        id
    }

    /// Most profitable terminal node, if rewriting it saves anything.
    /// With k occurrences of depth d the rewrite keeps one copy and
    /// replaces the rest with jumps: d*k before, d + (k-1) after.
    fn best(&self) -> Option<(usize, i64)> {
        let mut best: Option<(usize, i64)> = None;
        for (id, node) in self.nodes.iter().enumerate() {
            if !node.terminal {
                continue;
            }
            let d = node.depth as i64;
            let k = node.indexes.len() as i64;
            let saved = d * k - (d + k - 1);
            if saved > 0 && best.map_or(true, |(_, s)| saved > s) {
                best = Some((id, saved));
            }
        }
        best
    }
}

fn build(program: &[Stmt]) -> Trie {
    let mut trie = Trie::new();
    // open runs: (start index in the program, current trie node)
    let mut active: Vec<(usize, usize)> = Vec::new();
    for (i, stmt) in program.iter().enumerate() {
        let Stmt::Instr(instr) = stmt else {
            active.clear();
            continue;
        };
        if !instr.can_reduce() {
            active.clear();
            continue;
        }
        active.push((i, 0));
        for (start, node) in active.iter_mut() {
            *node = trie.child(*node, instr, *start);
        }
        if instr.is_terminator() {
            active.clear();
        }
    }
    trie
}

fn jump_to(label: &str) -> Stmt {
    Stmt::Instr(InstrStmt {
        mnemonic: Token::synthetic(Kind::Jump, "jump"),
        args: vec![Arg::Expr(Expr::Literal(Token::synthetic(
            Kind::Identifier,
            label,
        )))],
    })
}

fn label_stmt(label: &str) -> Stmt {
    Stmt::Label(Token::synthetic(Kind::Identifier, label))
}
