//! Lowering from the AST to the register-machine IR.
//!
//! Traversal is bottom-up: every expression lowers to a sequence that leaves
//! its value in REG_A, and every statement lowers to a sequence that
//! realises its effect and leaves REG_A in an unspecified state.
//!
//! BF has no native conditional, so `if` and the comparison operators are
//! synthesised from single-iteration loops: a loop whose body ends by
//! zeroing REG_A runs exactly once when entered.

use derive_more::Display;

use crate::common::{Id, Map};
use crate::middle::ir::{self, Addr, Instruction};
use crate::middle::opt;

use super::ast::*;

#[derive(Debug, Display)]
pub enum LowerError {
    #[display("Undefined variable: {_0}")]
    UndefinedVariable(Id),
    #[display("Value {_0} out of range for 8-bit processor")]
    ValueOutOfRange(i64),
    #[display("Unsupported constant type for {_0}")]
    UnsupportedConstant(Id),
    #[display("Cannot redeclare defined constant {_0}")]
    RedeclaredConstant(Id),
    #[display("Address space exhausted: a program may declare at most 254 variables")]
    AddressSpaceExhausted,
}

/// Maps variable names to user-memory addresses.
///
/// Addresses are handed out monotonically starting at [`ir::USER_BASE`];
/// addresses 0 and 1 stay reserved as expression spill slots and are never
/// issued here.
pub struct SymbolTable {
    symbols: Map<Id, Addr>,
    next_address: u16,
}

impl SymbolTable {
    fn new() -> Self {
        SymbolTable {
            symbols: Map::new(),
            next_address: ir::USER_BASE as u16,
        }
    }

    fn add_symbol(&mut self, name: Id) -> Result<Addr, LowerError> {
        let address =
            Addr::try_from(self.next_address).map_err(|_| LowerError::AddressSpaceExhausted)?;
        self.next_address += 1;
        self.symbols.insert(name, address);
        Ok(address)
    }

    fn get_address(&self, name: Id) -> Result<Addr, LowerError> {
        self.symbols
            .get(&name)
            .copied()
            .ok_or(LowerError::UndefinedVariable(name))
    }

    fn has_symbol(&self, name: Id) -> bool {
        self.symbols.contains_key(&name)
    }
}

pub fn lower(program: &Program) -> Result<ir::Program, LowerError> {
    let mut lowerer = Lowerer::new();
    let mut code = Vec::new();
    for item in &program.items {
        match item {
            Item::Define(name, value) => lowerer.define(*name, value),
            Item::Stmt(stmt) => code.extend(lowerer.stmt(stmt)?),
        }
    }

    let mut out = lowerer.memory_map();
    out.extend(code);
    Ok(ir::Program::new(out))
}

struct Lowerer {
    symbols: SymbolTable,
    defines: Map<Id, Const>,
}

impl Lowerer {
    fn new() -> Self {
        let mut defines = Map::new();
        defines.insert(Id::new("true".to_owned()), Const::Number(1));
        defines.insert(Id::new("false".to_owned()), Const::Number(0));
        Lowerer {
            symbols: SymbolTable::new(),
            defines,
        }
    }

    fn define(&mut self, name: Id, value: &Const) {
        self.defines.insert(name, value.clone());
    }

    /// Documentary header: where every variable ended up, plus the constant
    /// table, as comments at the front of the program.
    fn memory_map(&self) -> Vec<Instruction> {
        let mut header = vec![Instruction::Comment("Memory map:".to_owned())];
        let mut symbols: Vec<_> = self.symbols.symbols.iter().collect();
        symbols.sort_by_key(|&(_, address)| *address);
        for (name, address) in symbols {
            header.push(Instruction::Comment(format!("{name}: address {address}")));
        }
        header.push(Instruction::Comment("Defined constants:".to_owned()));
        for (name, value) in &self.defines {
            header.push(Instruction::Comment(format!("{name}: {value}")));
        }
        header
    }

    fn block(&mut self, stmts: &[Stmt]) -> Result<Vec<Instruction>, LowerError> {
        let mut code = Vec::new();
        for stmt in stmts {
            code.extend(self.stmt(stmt)?);
        }
        Ok(code)
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<Vec<Instruction>, LowerError> {
        match stmt {
            Stmt::VarDecl(name, init) => {
                if self.defines.contains_key(name) {
                    return Err(LowerError::RedeclaredConstant(*name));
                }
                let mut code = vec![Instruction::Comment(format!("Variable declaration: {name}"))];
                code.extend(self.expr(init)?);
                let address = self.symbols.add_symbol(*name)?;
                code.push(Instruction::StoreA(address));
                Ok(code)
            }
            Stmt::Assign(name, value) => {
                let mut code = vec![Instruction::Comment(format!("Assignment: {name}"))];
                code.extend(self.expr(value)?);
                let address = self.symbols.get_address(*name)?;
                code.push(Instruction::StoreA(address));
                Ok(code)
            }
            Stmt::Input(name) => {
                let address = self.symbols.get_address(*name)?;
                Ok(vec![
                    Instruction::Comment("Input statement".to_owned()),
                    Instruction::InA,
                    Instruction::StoreA(address),
                ])
            }
            Stmt::Output(value) => {
                let mut code = vec![Instruction::Comment("Output statement".to_owned())];
                code.extend(self.expr(value)?);
                code.push(Instruction::OutA);
                Ok(code)
            }
            Stmt::While { guard, body } => {
                let guard_code = self.expr(guard)?;
                let mut code = vec![Instruction::Comment("While loop".to_owned())];
                code.extend(guard_code.clone());
                code.push(Instruction::LoopStart);
                code.extend(self.block(body)?);
                // Retest the guard so REG_A holds its fresh value at the
                // closing bracket.
                code.extend(guard_code);
                code.push(Instruction::LoopEnd);
                Ok(code)
            }
            Stmt::If { guard, tt, ff } => self.if_stmt(guard, tt, ff),
            // A bare expression statement: evaluated, result discarded.
            Stmt::Expr(value) => self.expr(value),
        }
    }

    fn if_stmt(
        &mut self,
        guard: &Expr,
        tt: &[Stmt],
        ff: &[Stmt],
    ) -> Result<Vec<Instruction>, LowerError> {
        let mut code = vec![Instruction::Comment("If statement".to_owned())];

        // With an else branch, a guard cell records whether the then branch
        // ran.  It starts at 1; the then branch clears it.
        let go_else = if ff.is_empty() {
            None
        } else {
            Some(self.fresh_guard()?)
        };
        if let Some(address) = go_else {
            code.push(Instruction::LoadAImm(1));
            code.push(Instruction::StoreA(address));
        }

        code.extend(self.expr(guard)?);
        code.push(Instruction::LoopStart);
        code.extend(self.block(tt)?);
        // REG_A must be zero at the closing bracket so the loop body runs
        // exactly once.  STORE_A preserves REG_A, so the guard clear below
        // keeps that property.
        code.push(Instruction::LoadAImm(0));
        if let Some(address) = go_else {
            code.push(Instruction::StoreA(address));
        }
        code.push(Instruction::LoopEnd);

        if let Some(address) = go_else {
            code.push(Instruction::Comment("Else clause".to_owned()));
            code.push(Instruction::LoadAMem(address));
            code.push(Instruction::LoopStart);
            code.extend(self.block(ff)?);
            code.push(Instruction::LoadAImm(0));
            code.push(Instruction::StoreA(address));
            code.push(Instruction::LoopEnd);
        }

        Ok(code)
    }

    /// Allocate the guard cell for an else branch, under the first
    /// `go_else_i` name not already taken.
    fn fresh_guard(&mut self) -> Result<Addr, LowerError> {
        let mut i = 0usize;
        loop {
            let name = Id::new(format!("go_else_{i}"));
            if !self.symbols.has_symbol(name) {
                return self.symbols.add_symbol(name);
            }
            i += 1;
        }
    }

    fn expr(&mut self, expr: &Expr) -> Result<Vec<Instruction>, LowerError> {
        match expr {
            Expr::Const(value) => Ok(vec![immediate(*value)?]),
            Expr::Char(c) => Ok(vec![immediate(*c as i64)?]),
            Expr::Var(name) => self.var(*name),
            Expr::BOp { op, lhs, rhs } => {
                let left = self.expr(lhs)?;
                let right = self.expr(rhs)?;
                match op {
                    BOp::Add => Ok(opt::binary_operation(left, right, Instruction::Add)),
                    BOp::Sub => Ok(opt::binary_operation(left, right, Instruction::Sub)),
                    BOp::Eq => Ok(comparison(left, right, true)),
                    BOp::Ne => Ok(comparison(left, right, false)),
                }
            }
        }
    }

    fn var(&mut self, name: Id) -> Result<Vec<Instruction>, LowerError> {
        // A defined constant shadows the symbol table.
        if let Some(value) = self.defines.get(&name) {
            return match *value {
                Const::Number(n) => Ok(vec![immediate(n)?]),
                Const::Character(c) => Ok(vec![immediate(c as i64)?]),
                Const::Str(_) => Err(LowerError::UnsupportedConstant(name)),
            };
        }
        let address = self.symbols.get_address(name)?;
        Ok(vec![
            Instruction::Comment(format!("Variable load: {name}")),
            Instruction::LoadAMem(address),
        ])
    }
}

fn immediate(value: i64) -> Result<Instruction, LowerError> {
    u8::try_from(value)
        .map(Instruction::LoadAImm)
        .map_err(|_| LowerError::ValueOutOfRange(value))
}

/// Comparison synthesis: leaves 1 or 0 in REG_A.
///
/// The result cell starts at the assumed boolean (1 for `==`, 0 for `!=`);
/// `left - right` gates a loop that runs only when the operands differ,
/// flipping the result cell and zeroing REG_A on its single iteration.
fn comparison(
    left: Vec<Instruction>,
    right: Vec<Instruction>,
    assume_equal: bool,
) -> Vec<Instruction> {
    let (label, assumed, flipped) = if assume_equal {
        ("Equal", 1, 0)
    } else {
        ("Not equal", 0, 1)
    };

    let mut code = vec![Instruction::Comment(label.to_owned())];
    code.push(Instruction::LoadAImm(assumed));
    code.push(Instruction::StoreA(ir::SCRATCH0));

    code.extend(left);
    code.push(Instruction::StoreA(ir::SCRATCH1));
    code.extend(right);
    code.push(Instruction::LoadBMem(ir::SCRATCH1));
    code.push(Instruction::Sub);

    code.push(Instruction::LoopStart);
    code.push(Instruction::LoadAImm(flipped));
    code.push(Instruction::StoreA(ir::SCRATCH0));
    code.push(Instruction::LoadAImm(0));
    code.push(Instruction::LoopEnd);

    code.push(Instruction::LoadAMem(ir::SCRATCH0));
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::parse;
    use Instruction::*;

    fn lower_source(source: &str) -> Result<ir::Program, LowerError> {
        lower(&parse(source).unwrap())
    }

    fn stripped(program: &ir::Program) -> Vec<Instruction> {
        program
            .code
            .iter()
            .filter(|insn| !insn.is_comment())
            .cloned()
            .collect()
    }

    #[test]
    fn declaration_allocates_and_stores() {
        let program = lower_source("var x = 5;").unwrap();
        assert_eq!(stripped(&program), [LoadAImm(5), StoreA(ir::USER_BASE)]);
    }

    #[test]
    fn addresses_are_monotone_and_distinct() {
        let program = lower_source("var a = 1; var b = 2; var c = 3; output(a + b + c);").unwrap();
        let stores: Vec<_> = program
            .code
            .iter()
            .filter_map(|insn| match insn {
                StoreA(address) => Some(*address),
                _ => None,
            })
            .take(3)
            .collect();
        assert_eq!(stores, [2, 3, 4]);
    }

    #[test]
    fn variable_reads_resolve_to_their_slot() {
        let program = lower_source("var x = 7; output(x);").unwrap();
        assert_eq!(
            stripped(&program),
            [LoadAImm(7), StoreA(2), LoadAMem(2), OutA]
        );
    }

    #[test]
    fn undefined_variable() {
        let err = lower_source("output(x);").unwrap_err();
        assert!(matches!(err, LowerError::UndefinedVariable(_)), "{err}");
        let err = lower_source("x = 1;").unwrap_err();
        assert!(matches!(err, LowerError::UndefinedVariable(_)), "{err}");
        let err = lower_source("input(x);").unwrap_err();
        assert!(matches!(err, LowerError::UndefinedVariable(_)), "{err}");
    }

    #[test]
    fn range_boundaries() {
        assert!(lower_source("var x = 0;").is_ok());
        assert!(lower_source("var x = 255;").is_ok());
        let err = lower_source("var x = 256;").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Value 256 out of range for 8-bit processor"
        );
    }

    #[test]
    fn character_literals_lower_to_their_ordinal() {
        let program = lower_source("output('A');").unwrap();
        assert_eq!(stripped(&program), [LoadAImm(65), OutA]);
        let program = lower_source("output('\\0');").unwrap();
        assert_eq!(stripped(&program), [LoadAImm(0), OutA]);
    }

    #[test]
    fn defines_lower_as_immediates() {
        let program = lower_source("#define MAX 3 var n = MAX;").unwrap();
        assert_eq!(stripped(&program), [LoadAImm(3), StoreA(2)]);
        // ...including the built-in booleans.
        let program = lower_source("var t = true; var f = false;").unwrap();
        assert_eq!(
            stripped(&program),
            [LoadAImm(1), StoreA(2), LoadAImm(0), StoreA(3)]
        );
    }

    #[test]
    fn string_define_cannot_be_a_value() {
        let err = lower_source("#define S \"hi\" output(S);").unwrap_err();
        assert!(matches!(err, LowerError::UnsupportedConstant(_)), "{err}");
    }

    #[test]
    fn declaring_over_a_define_is_rejected() {
        let err = lower_source("#define MAX 3 var MAX = 1;").unwrap_err();
        assert!(matches!(err, LowerError::RedeclaredConstant(_)), "{err}");
    }

    #[test]
    fn while_retests_its_guard() {
        let program = lower_source("var n = 2; while (n) { n = n - 1; }").unwrap();
        let code = stripped(&program);
        // Guard load appears before LOOP_START and again before LOOP_END.
        let start = code.iter().position(|i| *i == LoopStart).unwrap();
        let end = code.iter().position(|i| *i == LoopEnd).unwrap();
        assert_eq!(code[start - 1], LoadAMem(2));
        assert_eq!(code[end - 1], LoadAMem(2));
    }

    #[test]
    fn if_without_else_zeroes_the_gate() {
        let program = lower_source("var x = 1; if (x) { output(x); }").unwrap();
        let code = stripped(&program);
        let end = code.iter().position(|i| *i == LoopEnd).unwrap();
        assert_eq!(code[end - 1], LoadAImm(0));
    }

    #[test]
    fn if_else_allocates_a_guard_cell() {
        let program =
            lower_source("var x = 1; if (x) { output(x); } else { output(x); }").unwrap();
        // x is at 2, so the go_else guard lands on 3.
        assert!(program.code.contains(&StoreA(3)));
        assert!(program.code.contains(&LoadAMem(3)));
        assert!(program.is_balanced());
    }

    #[test]
    fn guard_names_dodge_user_variables() {
        let program = lower_source(
            "var go_else_0 = 0; if (go_else_0) { output(go_else_0); } else { go_else_0 = 1; }",
        )
        .unwrap();
        // User variable at 2, synthesised guard at 3.
        let dump = program.to_string();
        assert!(dump.contains("# go_else_0: address 2"));
        assert!(dump.contains("# go_else_1: address 3"));
    }

    #[test]
    fn comparison_structure() {
        let program = lower_source("var x = 1; x == 2;").unwrap();
        let code = stripped(&program);
        let tail = code[code.len() - 11..].to_vec();
        assert_eq!(
            tail,
            [
                LoadAMem(2),
                StoreA(ir::SCRATCH1),
                LoadAImm(2),
                LoadBMem(ir::SCRATCH1),
                Sub,
                LoopStart,
                LoadAImm(0),
                StoreA(ir::SCRATCH0),
                // The flip already zeroed REG_A for `==`; the explicit
                // reload keeps the shape shared with `!=`.
                LoadAImm(0),
                LoopEnd,
                LoadAMem(ir::SCRATCH0),
            ]
        );
    }

    #[test]
    fn memory_map_header() {
        let program = lower_source("#define MAX 3 var x = MAX;").unwrap();
        let dump = program.to_string();
        assert!(dump.contains("# Memory map:"));
        assert!(dump.contains("# x: address 2"));
        assert!(dump.contains("# MAX: 3"));
        assert!(dump.contains("# true: 1"));
        assert!(dump.contains("# false: 0"));
    }
}
