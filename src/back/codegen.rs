//! IR to Brainfuck code generation.
//!
//! The generator simulates the two virtual registers and user memory on the
//! BF tape, tracking where the tape head will be after the emitted code runs
//! (the compile-time cursor) so every cell access costs the minimum number
//! of `>`/`<` moves.
//!
//! The cursor model is sound across loops because both edges of every loop
//! re-align the head to REG_A, and because the copy and arithmetic loop
//! bodies have zero net movement: the cursor is the same whether or not the
//! body runs.

use crate::middle::ir::{Addr, Instruction, Program};

use super::bf::{self, MEMORY_OFFSET, REG_A, REG_B, TEMP};

pub struct CodeGen {
    cursor: usize,
    debug: bool,
}

impl CodeGen {
    pub fn new(debug: bool) -> Self {
        CodeGen { cursor: 0, debug }
    }

    /// Emit BF for the whole program, one line per instruction, then run the
    /// move canceller over the result.
    ///
    /// With the debug flag, every line gains a trailing `#`: not a BF
    /// operator, so interpreters ignore it, but it makes the instruction
    /// boundaries visible in the output.
    pub fn generate(mut self, program: &Program) -> String {
        let mut out = String::new();
        for insn in &program.code {
            if insn.is_comment() {
                continue;
            }
            out.push_str(&self.instruction(insn));
            if self.debug {
                out.push('#');
            }
            out.push('\n');
        }
        let out = bf::cancel_moves(&out);
        debug_assert!(bf::is_balanced(&out));
        out
    }

    fn instruction(&mut self, insn: &Instruction) -> String {
        use Instruction::*;

        match *insn {
            LoadAImm(value) => self.load_immediate(REG_A, value),
            LoadBImm(value) => self.load_immediate(REG_B, value),
            LoadAMem(address) => self.copy(user_cell(address), REG_A),
            LoadBMem(address) => self.copy(user_cell(address), REG_B),
            StoreA(address) => self.copy(REG_A, user_cell(address)),
            StoreB(address) => self.copy(REG_B, user_cell(address)),
            Add => self.arithmetic('+'),
            Sub => self.arithmetic('-'),
            InA => self.move_to(REG_A) + ",",
            InB => self.move_to(REG_B) + ",",
            OutA => self.move_to(REG_A) + ".",
            OutB => self.move_to(REG_B) + ".",
            LoopStart => self.move_to(REG_A) + "[",
            LoopEnd => self.move_to(REG_A) + "]",
            Comment(_) => String::new(),
        }
    }

    /// register := value, by clearing and incrementing.
    fn load_immediate(&mut self, register: usize, value: u8) -> String {
        let mut code = self.move_to(register);
        code.push_str("[-]");
        code.push_str(&"+".repeat(value as usize));
        code
    }

    /// REG_A := REG_A op REG_B, draining REG_B to zero.
    fn arithmetic(&mut self, op: char) -> String {
        let mut code = self.move_to(REG_B);
        code.push('[');
        code.push_str(&self.move_offset(REG_A as isize - REG_B as isize));
        code.push(op);
        code.push_str(&self.move_offset(REG_B as isize - REG_A as isize));
        code.push_str("-]");
        code
    }

    /// Move the head to `cell`, updating the compile-time cursor.
    fn move_to(&mut self, cell: usize) -> String {
        let code = if cell > self.cursor {
            ">".repeat(cell - self.cursor)
        } else {
            "<".repeat(self.cursor - cell)
        };
        self.cursor = cell;
        code
    }

    /// Move the head by a signed offset.  Only used inside loop bodies whose
    /// net movement is zero, so the cursor stays consistent whether or not
    /// the body runs.
    fn move_offset(&mut self, offset: isize) -> String {
        let code = if offset > 0 {
            ">".repeat(offset as usize)
        } else {
            "<".repeat(offset.unsigned_abs())
        };
        debug_assert!(self.cursor.checked_add_signed(offset).is_some());
        self.cursor = self.cursor.wrapping_add_signed(offset);
        code
    }

    fn clear(&mut self, cell: usize) -> String {
        self.move_to(cell) + "[-]"
    }

    /// Non-destructive copy: drain `src` into `dst` and TEMP, then drain
    /// TEMP back into `src`.  Ends with the head on TEMP.
    fn copy(&mut self, src: usize, dst: usize) -> String {
        let mut code = self.clear(TEMP);
        code.push_str(&self.clear(dst));
        code.push_str(&self.move_to(src));
        code.push('[');
        code.push_str(&self.move_offset(dst as isize - src as isize));
        code.push('+');
        code.push_str(&self.move_offset(TEMP as isize - dst as isize));
        code.push('+');
        code.push_str(&self.move_offset(src as isize - TEMP as isize));
        code.push_str("-]");
        code.push_str(&self.move_to(TEMP));
        code.push('[');
        code.push_str(&self.move_offset(src as isize - TEMP as isize));
        code.push('+');
        code.push_str(&self.move_offset(TEMP as isize - src as isize));
        code.push_str("-]");
        debug_assert_eq!(self.cursor, TEMP);
        code
    }
}

/// Shift a user address past the register and scratch cells.
fn user_cell(address: Addr) -> usize {
    address as usize + MEMORY_OFFSET
}
