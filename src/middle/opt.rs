//! The expression optimiser.
//!
//! Stateless helpers shared by the arithmetic lowerings, kept separate from
//! the lowerer so future operators can reuse them.

use crate::middle::ir::{Addr, Instruction, SCRATCH0, SCRATCH1};

/// A right operand that is a single bare load.
enum SimpleLoad {
    Imm(u8),
    Mem(Addr),
}

/// The "simple-right" test: exactly one instruction, and it is a
/// `LOAD_A_IMM` or `LOAD_A_MEM`.  Documentary comments don't count.
pub fn is_simple(code: &[Instruction]) -> bool {
    simple_load(code).is_some()
}

fn simple_load(code: &[Instruction]) -> Option<SimpleLoad> {
    let mut loads = code.iter().filter(|insn| !insn.is_comment());
    let load = match (loads.next(), loads.next()) {
        (Some(insn), None) => insn,
        _ => return None,
    };
    match *load {
        Instruction::LoadAImm(value) => Some(SimpleLoad::Imm(value)),
        Instruction::LoadAMem(address) => Some(SimpleLoad::Mem(address)),
        _ => None,
    }
}

/// Build the IR for `left op right`, where `op` is [`Instruction::Add`] or
/// [`Instruction::Sub`].
///
/// A simple right operand loads straight into REG_B and no spill is needed.
/// Otherwise both sides round-trip through the reserved scratch slots.
pub fn binary_operation(
    left: Vec<Instruction>,
    right: Vec<Instruction>,
    op: Instruction,
) -> Vec<Instruction> {
    debug_assert!(matches!(op, Instruction::Add | Instruction::Sub));

    if let Some(load) = simple_load(&right) {
        let load_b = match load {
            SimpleLoad::Imm(value) => Instruction::LoadBImm(value),
            SimpleLoad::Mem(address) => Instruction::LoadBMem(address),
        };
        let mut code = vec![Instruction::Comment(format!("Optimized: {op}"))];
        code.extend(left);
        code.push(load_b);
        code.push(op);
        return code;
    }

    let mut code = vec![Instruction::Comment(format!("General case: {op}"))];
    code.extend(left);
    code.push(Instruction::StoreA(SCRATCH0));
    code.extend(right);
    code.push(Instruction::StoreA(SCRATCH1));
    code.push(Instruction::LoadBMem(SCRATCH1));
    code.push(Instruction::LoadAMem(SCRATCH0));
    code.push(op);
    code
}
