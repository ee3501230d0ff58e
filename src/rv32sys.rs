//! SYSTEM instructions
//!
//! Only ecall and ebreak exist in this machine; both are fully
//! determined by the whole instruction word. The environment-call
//! handler runs through the execution environment interface and the
//! program counter advances after it returns. ebreak stops the step
//! loop with a breakpoint.

use crate::{
    hart::{eei::Eei, exception::Exception},
    rv32i::Instr,
};

pub fn ecall<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, _instr: u32) -> Result<(), Exception> {
        eei.ecall()?;
        eei.increment_pc();
        Ok(())
    }

    fn printer(_instr: u32) -> String {
        "ecall".to_string()
    }

    Instr { executer, printer }
}

pub fn ebreak<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(_eei: &mut E, _instr: u32) -> Result<(), Exception> {
        Err(Exception::Break)
    }

    fn printer(_instr: u32) -> String {
        "ebreak".to_string()
    }

    Instr { executer, printer }
}
