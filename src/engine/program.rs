//! Program text decoding: instruction classification and bracket matching.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Instr {
    Add,
    Sub,
    Right,
    Left,
    Out,
    In,
    LoopStart,
    LoopEnd,
}

impl Instr {
    pub(crate) fn decode(c: char) -> Option<Instr> {
        match c {
            '+' => Some(Instr::Add),
            '-' => Some(Instr::Sub),
            '>' => Some(Instr::Right),
            '<' => Some(Instr::Left),
            '.' => Some(Instr::Out),
            ',' => Some(Instr::In),
            '[' => Some(Instr::LoopStart),
            ']' => Some(Instr::LoopEnd),
            _ => None, // comment
        }
    }
}

/// Decoded program: one slot per character of the source text.
#[derive(Debug, Clone)]
pub(crate) struct Program {
    code: Vec<Option<Instr>>,
    /// Partner position for every bracket; `None` when unmatched.
    jumps: Vec<Option<usize>>,
}

impl Program {
    pub(crate) fn new(text: &str) -> Self {
        let code: Vec<Option<Instr>> = text.chars().map(Instr::decode).collect();
        let mut jumps = vec![None; code.len()];
        let mut open = Vec::new();

        for (idx, instr) in code.iter().enumerate() {
            match instr {
                Some(Instr::LoopStart) => open.push(idx),
                Some(Instr::LoopEnd) => {
                    if let Some(start) = open.pop() {
                        jumps[start] = Some(idx);
                        jumps[idx] = Some(start);
                    }
                }
                _ => {}
            }
        }

        Self { code, jumps }
    }

    pub(crate) fn len(&self) -> usize {
        self.code.len()
    }

    pub(crate) fn instr_at(&self, pos: usize) -> Option<Instr> {
        self.code.get(pos).copied().flatten()
    }

    pub(crate) fn partner(&self, pos: usize) -> Option<usize> {
        self.jumps.get(pos).copied().flatten()
    }

    /// First instruction position at or after `pos`, or `len()` if none remain.
    pub(crate) fn next_instr(&self, pos: usize) -> usize {
        (pos..self.code.len())
            .find(|&i| self.code[i].is_some())
            .unwrap_or(self.code.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_loops_are_matched() {
        let program = Program::new("+[-[-[-]]+>>>]");
        assert_eq!(program.partner(1), Some(13));
        assert_eq!(program.partner(13), Some(1));
        assert_eq!(program.partner(3), Some(8));
        assert_eq!(program.partner(5), Some(7));
        assert_eq!(program.partner(0), None);
    }

    #[test]
    fn unmatched_brackets_have_no_partner() {
        let program = Program::new("][+[");
        assert_eq!(program.partner(0), None);
        assert_eq!(program.partner(1), None);
        assert_eq!(program.partner(3), None);
    }

    #[test]
    fn comments_are_skipped() {
        let program = Program::new("ab+ c-");
        assert_eq!(program.next_instr(0), 2);
        assert_eq!(program.next_instr(3), 5);
        assert_eq!(program.next_instr(6), 6);
        assert_eq!(program.instr_at(5), Some(Instr::Sub));
        assert_eq!(program.instr_at(0), None);
    }
}
