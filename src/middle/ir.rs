//! The register-machine intermediate representation.
//!
//! A program is a flat instruction sequence over two virtual registers and a
//! byte-addressable user memory.  `Display` renders the classic mnemonic
//! text, one instruction per line; the sum type is what the back-end
//! consumes.

use derive_more::Display;

/// A user-memory address.  The back-end shifts these past the register and
/// scratch cells before emitting tape moves.
pub type Addr = u8;

/// Reserved spill slot; holds the left operand (or the comparison result).
pub const SCRATCH0: Addr = 0;
/// Reserved spill slot; holds the right operand (or the spilled left side of
/// a comparison).
pub const SCRATCH1: Addr = 1;
/// First address handed out to user variables.
pub const USER_BASE: Addr = 2;

#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum Instruction {
    /// REG_A := n
    #[display("LOAD_A_IMM {_0}")]
    LoadAImm(u8),
    /// REG_A := mem[a]
    #[display("LOAD_A_MEM {_0}")]
    LoadAMem(Addr),
    /// REG_B := n
    #[display("LOAD_B_IMM {_0}")]
    LoadBImm(u8),
    /// REG_B := mem[a]
    #[display("LOAD_B_MEM {_0}")]
    LoadBMem(Addr),
    /// mem[a] := REG_A, preserving REG_A.
    #[display("STORE_A {_0}")]
    StoreA(Addr),
    /// mem[a] := REG_B, preserving REG_B.
    #[display("STORE_B {_0}")]
    StoreB(Addr),
    /// REG_A := REG_A + REG_B mod 256; REG_B := 0.
    #[display("ADD")]
    Add,
    /// REG_A := REG_A - REG_B mod 256; REG_B := 0.
    #[display("SUB")]
    Sub,
    /// Read one byte into REG_A.
    #[display("IN_A")]
    InA,
    #[display("IN_B")]
    InB,
    /// Emit the byte in REG_A.
    #[display("OUT_A")]
    OutA,
    #[display("OUT_B")]
    OutB,
    /// Begin a loop gated on REG_A.
    #[display("LOOP_START")]
    LoopStart,
    /// Close the most recent unmatched [`Instruction::LoopStart`].
    #[display("LOOP_END")]
    LoopEnd,
    /// Documentary note from the lowerer; generates no code.
    #[display("# {_0}")]
    Comment(String),
}

impl Instruction {
    /// Comments carry no semantics.
    pub fn is_comment(&self) -> bool {
        matches!(self, Instruction::Comment(_))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Program {
    pub code: Vec<Instruction>,
}

impl Program {
    pub fn new(code: Vec<Instruction>) -> Self {
        Program { code }
    }

    /// Every `LOOP_START` has a matching `LOOP_END` in lexical order.
    pub fn is_balanced(&self) -> bool {
        let mut depth = 0usize;
        for insn in &self.code {
            match insn {
                Instruction::LoopStart => depth += 1,
                Instruction::LoopEnd => {
                    if depth == 0 {
                        return false;
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
        depth == 0
    }
}

/// One instruction per line, indented by loop depth.  This is the format of
/// the `--debug` instruction dump.
impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut depth = 0usize;
        for insn in &self.code {
            if matches!(insn, Instruction::LoopEnd) {
                depth = depth.saturating_sub(1);
            }
            writeln!(f, "{:indent$}{insn}", "", indent = depth * 2)?;
            if matches!(insn, Instruction::LoopStart) {
                depth += 1;
            }
        }
        Ok(())
    }
}
