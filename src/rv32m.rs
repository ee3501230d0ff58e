//! RV32M multiply/divide extension
//!
//! Division never traps: dividing by zero returns all ones (DIV,
//! DIVU) or the dividend (REM, REMU), and the one signed overflow
//! case (i32::MIN / -1) returns i32::MIN with remainder 0.

use crate::{
    define_reg_reg_printer,
    hart::{eei::Eei, exception::Exception},
    instr_type::{decode_rtype, Rtype},
    rv32i::{reg_reg_values, Instr},
    utils::{interpret_i32_as_unsigned, interpret_u32_as_signed},
};

pub fn mul<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        let value = src1.wrapping_mul(src2);
        eei.set_x(dest, value);
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("mul");
    Instr { executer, printer }
}

pub fn mulh<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        let value = {
            let src1 = i64::from(interpret_u32_as_signed(src1));
            let src2 = i64::from(interpret_u32_as_signed(src2));
            ((src1 * src2) >> 32) as u32
        };
        eei.set_x(dest, value);
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("mulh");
    Instr { executer, printer }
}

pub fn mulhsu<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        let value = {
            let src1 = i64::from(interpret_u32_as_signed(src1));
            let src2 = i64::from(src2);
            ((src1 * src2) >> 32) as u32
        };
        eei.set_x(dest, value);
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("mulhsu");
    Instr { executer, printer }
}

pub fn mulhu<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        let value = {
            let src1 = u64::from(src1);
            let src2 = u64::from(src2);
            ((src1 * src2) >> 32) as u32
        };
        eei.set_x(dest, value);
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("mulhu");
    Instr { executer, printer }
}

pub fn div<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        let value = {
            let src1 = interpret_u32_as_signed(src1);
            let src2 = interpret_u32_as_signed(src2);
            if src2 == 0 {
                0xffff_ffff
            } else {
                // wrapping_div maps i32::MIN / -1 to i32::MIN
                interpret_i32_as_unsigned(src1.wrapping_div(src2))
            }
        };
        eei.set_x(dest, value);
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("div");
    Instr { executer, printer }
}

pub fn divu<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        let value = if src2 == 0 { u32::MAX } else { src1 / src2 };
        eei.set_x(dest, value);
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("divu");
    Instr { executer, printer }
}

pub fn rem<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        let value = {
            let src1 = interpret_u32_as_signed(src1);
            let src2 = interpret_u32_as_signed(src2);
            if src2 == 0 {
                interpret_i32_as_unsigned(src1)
            } else {
                // wrapping_rem maps i32::MIN % -1 to 0
                interpret_i32_as_unsigned(src1.wrapping_rem(src2))
            }
        };
        eei.set_x(dest, value);
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("rem");
    Instr { executer, printer }
}

pub fn remu<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        let value = if src2 == 0 { src1 } else { src1 % src2 };
        eei.set_x(dest, value);
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("remu");
    Instr { executer, printer }
}
