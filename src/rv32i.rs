//! RV32I base integer instruction set
//!
//! Each function returns the executer/printer pair for one
//! instruction, written against the execution environment interface.
//! Branch and jump targets are not alignment-checked here; a
//! misaligned program counter faults at the next fetch.

use crate::{
    define_branch_printer, define_load_printer, define_reg_imm_printer, define_reg_reg_printer,
    define_store_printer,
    hart::{eei::Eei, exception::Exception, memory::Wordsize},
    instr_type::{
        decode_btype, decode_itype, decode_jtype, decode_rtype, decode_stype, decode_utype, Itype,
        Rtype, SBtype, UJtype,
    },
    utils::{interpret_i32_as_unsigned, interpret_u32_as_signed, sign_extend},
};

/// Stores a function for executing/printing an instruction
pub struct Instr<E: Eei> {
    pub executer: fn(eei: &mut E, instr: u32) -> Result<(), Exception>,
    pub printer: fn(u32) -> String,
}

/// Load upper immediate
///
/// Load the u_immediate into the upper 20 bits of the register
/// dest and fill the lower 12 bits with zeros. Set pc = pc + 4.
pub fn lui<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let UJtype {
            rd: dest,
            imm: u_immediate,
        } = decode_utype(instr);
        eei.set_x(dest, u_immediate << 12);
        eei.increment_pc();
        Ok(())
    }

    fn printer(instr: u32) -> String {
        let UJtype {
            rd: dest,
            imm: u_immediate,
        } = decode_utype(instr);
        format!("lui x{dest}, 0x{u_immediate:x}")
    }

    Instr { executer, printer }
}

/// Add upper immediate to program counter
///
/// Make a 32-bit value by setting its upper 20 bits to u_immediate
/// and its lower 12 bits to zero, and add the current value of the
/// program counter. Store the result in the register dest.
pub fn auipc<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let UJtype {
            rd: dest,
            imm: u_immediate,
        } = decode_utype(instr);
        let value = eei.pc().wrapping_add(u_immediate << 12);
        eei.set_x(dest, value);
        eei.increment_pc();
        Ok(())
    }

    fn printer(instr: u32) -> String {
        let UJtype {
            rd: dest,
            imm: u_immediate,
        } = decode_utype(instr);
        format!("auipc x{dest}, 0x{u_immediate:x}")
    }

    Instr { executer, printer }
}

/// Jump and link
///
/// Store the address of the next instruction (pc + 4) in the
/// register dest, then set pc = pc + offset (an unconditional jump
/// relative to the program counter).
pub fn jal<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let UJtype {
            rd: dest,
            imm: offset,
        } = decode_jtype(instr);
        let return_address = eei.pc().wrapping_add(4);
        let target_pc = eei.pc().wrapping_add(sign_extend(offset, 20));
        eei.set_x(dest, return_address);
        eei.set_pc(target_pc);
        Ok(())
    }

    fn printer(instr: u32) -> String {
        let UJtype {
            rd: dest,
            imm: offset,
        } = decode_jtype(instr);
        format!("jal x{dest}, 0x{offset:x}")
    }

    Instr { executer, printer }
}

/// Jump and link register
///
/// Store the address of the next instruction (pc + 4) in the
/// register dest, then compute base + offset, set the least
/// significant bit to zero, and set the pc to the result.
pub fn jalr<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let Itype {
            rs1: base,
            imm: offset,
            rd: dest,
        } = decode_itype(instr);
        let return_address = eei.pc().wrapping_add(4);
        let relative_address = sign_extend(offset, 11);
        let target_pc = 0xffff_fffe & eei.x(base).wrapping_add(relative_address);
        eei.set_x(dest, return_address);
        eei.set_pc(target_pc);
        Ok(())
    }

    fn printer(instr: u32) -> String {
        let Itype {
            rs1: base,
            imm: offset,
            rd: dest,
        } = decode_itype(instr);
        format!("jalr x{dest}, 0x{offset:x}(x{base})")
    }

    Instr { executer, printer }
}

fn get_branch_data<E: Eei>(eei: &E, instr: u32) -> (u32, u32, u16) {
    let SBtype {
        rs1: src1,
        rs2: src2,
        imm: offset,
    } = decode_btype(instr);
    let src1 = eei.x(src1);
    let src2 = eei.x(src2);
    (src1, src2, offset)
}

fn do_branch<E: Eei>(eei: &mut E, branch_taken: bool, offset: u16) {
    if branch_taken {
        let target_pc = eei.pc().wrapping_add(sign_extend(offset, 12));
        eei.set_pc(target_pc);
    } else {
        eei.increment_pc();
    }
}

pub fn beq<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, offset) = get_branch_data(eei, instr);
        do_branch(eei, src1 == src2, offset);
        Ok(())
    }
    define_branch_printer!("beq");
    Instr { executer, printer }
}

pub fn bne<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, offset) = get_branch_data(eei, instr);
        do_branch(eei, src1 != src2, offset);
        Ok(())
    }
    define_branch_printer!("bne");
    Instr { executer, printer }
}

pub fn blt<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, offset) = get_branch_data(eei, instr);
        let branch_taken = interpret_u32_as_signed(src1) < interpret_u32_as_signed(src2);
        do_branch(eei, branch_taken, offset);
        Ok(())
    }
    define_branch_printer!("blt");
    Instr { executer, printer }
}

pub fn bge<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, offset) = get_branch_data(eei, instr);
        let branch_taken = interpret_u32_as_signed(src1) >= interpret_u32_as_signed(src2);
        do_branch(eei, branch_taken, offset);
        Ok(())
    }
    define_branch_printer!("bge");
    Instr { executer, printer }
}

pub fn bltu<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, offset) = get_branch_data(eei, instr);
        do_branch(eei, src1 < src2, offset);
        Ok(())
    }
    define_branch_printer!("bltu");
    Instr { executer, printer }
}

pub fn bgeu<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, offset) = get_branch_data(eei, instr);
        do_branch(eei, src1 >= src2, offset);
        Ok(())
    }
    define_branch_printer!("bgeu");
    Instr { executer, printer }
}

fn load_address<E: Eei>(eei: &E, instr: u32) -> (u32, u8) {
    let Itype {
        rs1: base,
        imm: offset,
        rd: dest,
    } = decode_itype(instr);
    let addr = eei.x(base).wrapping_add(sign_extend(offset, 11));
    (addr, dest)
}

pub fn lb<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (addr, dest) = load_address(eei, instr);
        let load_data = sign_extend(eei.load(addr, Wordsize::Byte)?, 7);
        eei.set_x(dest, load_data);
        eei.increment_pc();
        Ok(())
    }
    define_load_printer!("lb");
    Instr { executer, printer }
}

pub fn lh<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (addr, dest) = load_address(eei, instr);
        let load_data = sign_extend(eei.load(addr, Wordsize::Halfword)?, 15);
        eei.set_x(dest, load_data);
        eei.increment_pc();
        Ok(())
    }
    define_load_printer!("lh");
    Instr { executer, printer }
}

pub fn lw<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (addr, dest) = load_address(eei, instr);
        let load_data = eei.load(addr, Wordsize::Word)?;
        eei.set_x(dest, load_data);
        eei.increment_pc();
        Ok(())
    }
    define_load_printer!("lw");
    Instr { executer, printer }
}

pub fn lbu<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (addr, dest) = load_address(eei, instr);
        let load_data = eei.load(addr, Wordsize::Byte)?;
        eei.set_x(dest, load_data);
        eei.increment_pc();
        Ok(())
    }
    define_load_printer!("lbu");
    Instr { executer, printer }
}

pub fn lhu<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (addr, dest) = load_address(eei, instr);
        let load_data = eei.load(addr, Wordsize::Halfword)?;
        eei.set_x(dest, load_data);
        eei.increment_pc();
        Ok(())
    }
    define_load_printer!("lhu");
    Instr { executer, printer }
}

fn store_operands<E: Eei>(eei: &E, instr: u32) -> (u32, u32) {
    let SBtype {
        rs1: base,
        rs2: src,
        imm: offset,
    } = decode_stype(instr);
    let addr = eei.x(base).wrapping_add(sign_extend(offset, 11));
    (addr, eei.x(src))
}

pub fn sb<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (addr, data) = store_operands(eei, instr);
        eei.store(addr, data, Wordsize::Byte)?;
        eei.increment_pc();
        Ok(())
    }
    define_store_printer!("sb");
    Instr { executer, printer }
}

pub fn sh<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (addr, data) = store_operands(eei, instr);
        eei.store(addr, data, Wordsize::Halfword)?;
        eei.increment_pc();
        Ok(())
    }
    define_store_printer!("sh");
    Instr { executer, printer }
}

pub fn sw<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (addr, data) = store_operands(eei, instr);
        eei.store(addr, data, Wordsize::Word)?;
        eei.increment_pc();
        Ok(())
    }
    define_store_printer!("sw");
    Instr { executer, printer }
}

fn reg_imm_values<E: Eei>(eei: &E, instr: u32) -> (u32, u8, u32) {
    let Itype {
        rs1: src,
        imm: i_immediate,
        rd: dest,
    } = decode_itype(instr);
    let src: u32 = eei.x(src);
    let i_immediate = sign_extend(i_immediate, 11);
    (src, dest, i_immediate)
}

pub fn addi<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src, dest, i_immediate) = reg_imm_values(eei, instr);
        eei.set_x(dest, src.wrapping_add(i_immediate));
        eei.increment_pc();
        Ok(())
    }
    define_reg_imm_printer!("addi");
    Instr { executer, printer }
}

pub fn slti<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src, dest, i_immediate) = reg_imm_values(eei, instr);
        let value =
            u32::from(interpret_u32_as_signed(src) < interpret_u32_as_signed(i_immediate));
        eei.set_x(dest, value);
        eei.increment_pc();
        Ok(())
    }
    define_reg_imm_printer!("slti");
    Instr { executer, printer }
}

pub fn sltiu<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src, dest, i_immediate) = reg_imm_values(eei, instr);
        // The immediate is sign-extended first, then compared unsigned
        eei.set_x(dest, u32::from(src < i_immediate));
        eei.increment_pc();
        Ok(())
    }
    define_reg_imm_printer!("sltiu");
    Instr { executer, printer }
}

pub fn xori<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src, dest, i_immediate) = reg_imm_values(eei, instr);
        eei.set_x(dest, src ^ i_immediate);
        eei.increment_pc();
        Ok(())
    }
    define_reg_imm_printer!("xori");
    Instr { executer, printer }
}

pub fn ori<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src, dest, i_immediate) = reg_imm_values(eei, instr);
        eei.set_x(dest, src | i_immediate);
        eei.increment_pc();
        Ok(())
    }
    define_reg_imm_printer!("ori");
    Instr { executer, printer }
}

pub fn andi<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src, dest, i_immediate) = reg_imm_values(eei, instr);
        eei.set_x(dest, src & i_immediate);
        eei.increment_pc();
        Ok(())
    }
    define_reg_imm_printer!("andi");
    Instr { executer, printer }
}

pub fn slli<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src, dest, i_immediate) = reg_imm_values(eei, instr);
        eei.set_x(dest, src << (0x1f & i_immediate));
        eei.increment_pc();
        Ok(())
    }
    define_reg_imm_printer!("slli");
    Instr { executer, printer }
}

pub fn srli<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src, dest, i_immediate) = reg_imm_values(eei, instr);
        eei.set_x(dest, src >> (0x1f & i_immediate));
        eei.increment_pc();
        Ok(())
    }
    define_reg_imm_printer!("srli");
    Instr { executer, printer }
}

pub fn srai<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src, dest, i_immediate) = reg_imm_values(eei, instr);
        let value = {
            let src = interpret_u32_as_signed(src);
            interpret_i32_as_unsigned(src >> (0x1f & i_immediate))
        };
        eei.set_x(dest, value);
        eei.increment_pc();
        Ok(())
    }
    define_reg_imm_printer!("srai");
    Instr { executer, printer }
}

pub(crate) fn reg_reg_values<E: Eei>(eei: &E, instr: u32) -> (u32, u32, u8) {
    let Rtype {
        rs1: src1,
        rs2: src2,
        rd: dest,
    } = decode_rtype(instr);
    let src1: u32 = eei.x(src1);
    let src2: u32 = eei.x(src2);
    (src1, src2, dest)
}

pub fn add<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        eei.set_x(dest, src1.wrapping_add(src2));
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("add");
    Instr { executer, printer }
}

pub fn sub<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        eei.set_x(dest, src1.wrapping_sub(src2));
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("sub");
    Instr { executer, printer }
}

pub fn slt<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        let value = u32::from(interpret_u32_as_signed(src1) < interpret_u32_as_signed(src2));
        eei.set_x(dest, value);
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("slt");
    Instr { executer, printer }
}

pub fn sltu<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        eei.set_x(dest, u32::from(src1 < src2));
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("sltu");
    Instr { executer, printer }
}

pub fn and<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        eei.set_x(dest, src1 & src2);
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("and");
    Instr { executer, printer }
}

pub fn or<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        eei.set_x(dest, src1 | src2);
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("or");
    Instr { executer, printer }
}

pub fn xor<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        eei.set_x(dest, src1 ^ src2);
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("xor");
    Instr { executer, printer }
}

pub fn sll<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        eei.set_x(dest, src1 << (0x1f & src2));
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("sll");
    Instr { executer, printer }
}

pub fn srl<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        eei.set_x(dest, src1 >> (0x1f & src2));
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("srl");
    Instr { executer, printer }
}

pub fn sra<E: Eei>() -> Instr<E> {
    fn executer<E: Eei>(eei: &mut E, instr: u32) -> Result<(), Exception> {
        let (src1, src2, dest) = reg_reg_values(eei, instr);
        let value = {
            let src1 = interpret_u32_as_signed(src1);
            interpret_i32_as_unsigned(src1 >> (0x1f & src2))
        };
        eei.set_x(dest, value);
        eei.increment_pc();
        Ok(())
    }
    define_reg_reg_printer!("sra");
    Instr { executer, printer }
}
