//! Brainfuck target definitions.
//!
//! The fixed tape layout shared with the lowerer, plus string-level helpers
//! over emitted code.

/// Tape cell holding the accumulator register.
pub const REG_A: usize = 0;
/// Tape cell holding the second operand register.
pub const REG_B: usize = 1;
/// Scratch cell used by the copy macro.
pub const TEMP: usize = 2;
/// First tape cell of user memory; user address `a` lives at
/// `a + MEMORY_OFFSET`.
pub const MEMORY_OFFSET: usize = 3;

/// Cancel adjacent `<>` and `><` pairs until a fixed point is reached.
///
/// The emitter produces such pairs at nearly every instruction boundary.
/// They are exact inverse moves with no operator between them, so deleting
/// them preserves behaviour.
pub fn cancel_moves(code: &str) -> String {
    let mut code = code.to_owned();
    loop {
        let next = code.replace("<>", "").replace("><", "");
        if next == code {
            return code;
        }
        code = next;
    }
}

/// Does every `[` have a matching `]`?
pub fn is_balanced(code: &str) -> bool {
    let mut depth = 0usize;
    for c in code.chars() {
        match c {
            '[' => depth += 1,
            ']' => {
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
