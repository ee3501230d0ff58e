//! Instruction encoding
//!
//! Builds RV32IM instruction words from mnemonic-shaped macros, e.g.
//! `addi!(x1, x2, -23)`. Used by the tests to assemble programs
//! without an external toolchain.

use crate::utils::{extract_field, interpret_i32_as_unsigned};

pub use crate::opcodes::*;

/// Make an I-type instruction. Only produces a valid I-type
/// instruction if the arguments are in range.
pub fn itype(imm: u32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    imm << 20 | rs1 << 15 | funct3 << 12 | rd << 7 | opcode
}

/// Make an U- or J-type instruction (if you are making
/// a J-type instruction, make sure to construct the
/// immediate field correctly using jtype_imm_field)
pub fn ujtype(imm: u32, rd: u32, opcode: u32) -> u32 {
    imm << 12 | rd << 7 | opcode
}

/// Make an R- or S-type instruction. These instructions
/// have the same number of fields of the same size. The meaning
/// of a and b is:
///
/// R-type: a = funct7, b = rd
/// S-type: a = imm[11:5], b = imm[4:0]
pub fn rstype(a: u32, rs2: u32, rs1: u32, funct3: u32, b: u32, opcode: u32) -> u32 {
    a << 25 | rs2 << 20 | rs1 << 15 | funct3 << 12 | b << 7 | opcode
}

/// Convert a RISC-V register name (e.g. x3) to the register value
/// (e.g. 3)
pub fn reg_num_impl(reg_name: &str) -> u32 {
    let digits = reg_name
        .strip_prefix('x')
        .expect("register name must begin with x");
    digits
        .parse()
        .expect("register name must end in one or two digits")
}

#[macro_export]
macro_rules! reg_num {
    ($reg:expr) => {
        $crate::encode::reg_num_impl(std::stringify!($reg))
    };
}
pub use reg_num;

macro_rules! itype_instr {
    ($instruction:ident, $funct3:expr, $opcode:expr) => {
        #[macro_export]
        macro_rules! $instruction {
            ($rd:ident, $rs1:expr, $imm:expr) => {{
                let rd = $crate::reg_num!($rd);
                let rs1 = $crate::reg_num!($rs1);
                let imm = 0xfff & $crate::utils::interpret_i32_as_unsigned($imm);
                $crate::encode::itype(imm, rs1, $funct3, rd, $opcode)
            }};
        }
        pub use $instruction;
    };
}

/// The shift-by-immediate instructions use I-type, but with a special
/// encoding of the immediate that uses the lower 5 bits for the shift
/// amount (shamt) and the upper 7 bits to distinguish between
/// arithmetical and logical right shift.
macro_rules! shift_instr {
    ($instruction:ident, $upper:expr, $funct3:expr, $opcode:expr) => {
        #[macro_export]
        macro_rules! $instruction {
            ($rd:ident, $rs1:expr, $imm:expr) => {{
                let rd = $crate::reg_num!($rd);
                let rs1 = $crate::reg_num!($rs1);
                let imm = $crate::encode::shifts_imm_field($imm, $upper);
                $crate::encode::itype(imm, rs1, $funct3, rd, $opcode)
            }};
        }
        pub use $instruction;
    };
}

macro_rules! rtype_instr {
    ($instruction:ident, $funct7:expr, $funct3:expr, $opcode:expr) => {
        #[macro_export]
        macro_rules! $instruction {
            ($rd:ident, $rs1:expr, $rs2:expr) => {{
                let rd = $crate::reg_num!($rd);
                let rs1 = $crate::reg_num!($rs1);
                let rs2 = $crate::reg_num!($rs2);
                $crate::encode::rstype($funct7, rs2, rs1, $funct3, rd, $opcode)
            }};
        }
        pub use $instruction;
    };
}

macro_rules! stype_instr {
    ($instruction:ident, $funct3:expr, $opcode:expr) => {
        #[macro_export]
        macro_rules! $instruction {
            ($rs2:expr, $rs1:expr, $imm:expr) => {{
                let rs1 = $crate::reg_num!($rs1);
                let rs2 = $crate::reg_num!($rs2);
                let imm = $crate::utils::interpret_i32_as_unsigned($imm);
                let imm11_5 = $crate::utils::extract_field(imm, 11, 5);
                let imm4_0 = $crate::utils::extract_field(imm, 4, 0);
                $crate::encode::rstype(imm11_5, rs2, rs1, $funct3, imm4_0, $opcode)
            }};
        }
        pub use $instruction;
    };
}

pub fn shifts_imm_field(shamt: u32, upper: u32) -> u32 {
    let shamt = extract_field(shamt, 4, 0);
    (upper << 5) | shamt
}

/// Takes an immediate and shuffles it into the
/// format required for the 20-bit field of the
/// U-type instruction (making it J-type)
pub fn jtype_imm_field(imm: i32) -> u32 {
    let imm = interpret_i32_as_unsigned(imm);
    let imm20 = extract_field(imm, 20, 20);
    let imm19_12 = extract_field(imm, 19, 12);
    let imm11 = extract_field(imm, 11, 11);
    let imm10_1 = extract_field(imm, 10, 1);
    (imm20 << 19) | (imm10_1 << 9) | (imm11 << 8) | imm19_12
}

/// Returns (a, b) suitable for use with rstype for
/// the conditional branch instructions (btype)
pub fn btype_imm_fields(imm: i32) -> (u32, u32) {
    let imm = interpret_i32_as_unsigned(imm);
    let imm12 = extract_field(imm, 12, 12);
    let imm11 = extract_field(imm, 11, 11);
    let imm10_5 = extract_field(imm, 10, 5);
    let imm4_1 = extract_field(imm, 4, 1);
    let a = (imm12 << 6) | imm10_5;
    let b = (imm4_1 << 1) | imm11;
    (a, b)
}

macro_rules! btype_instr {
    ($instruction:ident, $funct3:expr, $opcode:expr) => {
        #[macro_export]
        macro_rules! $instruction {
            ($rs1:expr, $rs2:expr, $imm:expr) => {{
                let rs1 = $crate::reg_num!($rs1);
                let rs2 = $crate::reg_num!($rs2);
                let (a, b) = $crate::encode::btype_imm_fields($imm);
                $crate::encode::rstype(a, rs2, rs1, $funct3, b, $opcode)
            }};
        }
        pub use $instruction;
    };
}

#[macro_export]
macro_rules! jal {
    ($rd:expr, $imm:expr) => {{
        let rd = $crate::reg_num!($rd);
        let imm = $crate::encode::jtype_imm_field($imm);
        $crate::encode::ujtype(imm, rd, $crate::opcodes::OP_JAL)
    }};
}
pub use jal;

/// Note: in these instructions (LUI and AUIPC), the immediate imm
/// is already the upper 20 bits that will be loaded -- it will not
/// be shifted up.
macro_rules! utype_instr {
    ($instruction:ident, $opcode:expr) => {
        #[macro_export]
        macro_rules! $instruction {
            ($rd:expr, $imm:expr) => {{
                let rd = $crate::reg_num!($rd);
                let imm = $crate::utils::interpret_i32_as_unsigned($imm);
                $crate::encode::ujtype(imm, rd, $opcode)
            }};
        }
        pub use $instruction;
    };
}

#[macro_export]
macro_rules! ecall {
    () => {
        $crate::opcodes::INSTR_ECALL
    };
}
pub use ecall;

#[macro_export]
macro_rules! ebreak {
    () => {
        $crate::opcodes::INSTR_EBREAK
    };
}
pub use ebreak;

// === RV32I ===

utype_instr!(lui, crate::opcodes::OP_LUI);
utype_instr!(auipc, crate::opcodes::OP_AUIPC);
// jal is defined above
itype_instr!(jalr, 0b000, crate::opcodes::OP_JALR);

// Conditional branches
btype_instr!(beq, crate::opcodes::FUNCT3_BEQ, crate::opcodes::OP_BRANCH);
btype_instr!(bne, crate::opcodes::FUNCT3_BNE, crate::opcodes::OP_BRANCH);
btype_instr!(blt, crate::opcodes::FUNCT3_BLT, crate::opcodes::OP_BRANCH);
btype_instr!(bge, crate::opcodes::FUNCT3_BGE, crate::opcodes::OP_BRANCH);
btype_instr!(bltu, crate::opcodes::FUNCT3_BLTU, crate::opcodes::OP_BRANCH);
btype_instr!(bgeu, crate::opcodes::FUNCT3_BGEU, crate::opcodes::OP_BRANCH);

// Loads
itype_instr!(lb, crate::opcodes::FUNCT3_B, crate::opcodes::OP_LOAD);
itype_instr!(lh, crate::opcodes::FUNCT3_H, crate::opcodes::OP_LOAD);
itype_instr!(lw, crate::opcodes::FUNCT3_W, crate::opcodes::OP_LOAD);
itype_instr!(lbu, crate::opcodes::FUNCT3_BU, crate::opcodes::OP_LOAD);
itype_instr!(lhu, crate::opcodes::FUNCT3_HU, crate::opcodes::OP_LOAD);

// Stores
stype_instr!(sb, crate::opcodes::FUNCT3_B, crate::opcodes::OP_STORE);
stype_instr!(sh, crate::opcodes::FUNCT3_H, crate::opcodes::OP_STORE);
stype_instr!(sw, crate::opcodes::FUNCT3_W, crate::opcodes::OP_STORE);

// Integer register-immediate instructions
itype_instr!(addi, crate::opcodes::FUNCT3_ADDI, crate::opcodes::OP_IMM);
itype_instr!(slti, crate::opcodes::FUNCT3_SLTI, crate::opcodes::OP_IMM);
itype_instr!(sltiu, crate::opcodes::FUNCT3_SLTIU, crate::opcodes::OP_IMM);
itype_instr!(xori, crate::opcodes::FUNCT3_XORI, crate::opcodes::OP_IMM);
itype_instr!(ori, crate::opcodes::FUNCT3_ORI, crate::opcodes::OP_IMM);
itype_instr!(andi, crate::opcodes::FUNCT3_ANDI, crate::opcodes::OP_IMM);
shift_instr!(slli, 0b0000000, crate::opcodes::FUNCT3_SLLI, crate::opcodes::OP_IMM);
shift_instr!(srli, crate::opcodes::FUNCT7_SRLI, crate::opcodes::FUNCT3_SRLI, crate::opcodes::OP_IMM);
shift_instr!(srai, crate::opcodes::FUNCT7_SRAI, crate::opcodes::FUNCT3_SRAI, crate::opcodes::OP_IMM);

// Integer register-register instructions
rtype_instr!(add, crate::opcodes::FUNCT7_ADD, crate::opcodes::FUNCT3_ADD, crate::opcodes::OP);
rtype_instr!(sub, crate::opcodes::FUNCT7_SUB, crate::opcodes::FUNCT3_SUB, crate::opcodes::OP);
rtype_instr!(sll, 0b0000000, crate::opcodes::FUNCT3_SLL, crate::opcodes::OP);
rtype_instr!(slt, 0b0000000, crate::opcodes::FUNCT3_SLT, crate::opcodes::OP);
rtype_instr!(sltu, 0b0000000, crate::opcodes::FUNCT3_SLTU, crate::opcodes::OP);
rtype_instr!(xor, 0b0000000, crate::opcodes::FUNCT3_XOR, crate::opcodes::OP);
rtype_instr!(srl, crate::opcodes::FUNCT7_SRL, crate::opcodes::FUNCT3_SRL, crate::opcodes::OP);
rtype_instr!(sra, crate::opcodes::FUNCT7_SRA, crate::opcodes::FUNCT3_SRA, crate::opcodes::OP);
rtype_instr!(or, 0b0000000, crate::opcodes::FUNCT3_OR, crate::opcodes::OP);
rtype_instr!(and, 0b0000000, crate::opcodes::FUNCT3_AND, crate::opcodes::OP);

// === RV32M ===

rtype_instr!(mul, crate::opcodes::FUNCT7_MULDIV, crate::opcodes::FUNCT3_MUL, crate::opcodes::OP);
rtype_instr!(mulh, crate::opcodes::FUNCT7_MULDIV, crate::opcodes::FUNCT3_MULH, crate::opcodes::OP);
rtype_instr!(mulhsu, crate::opcodes::FUNCT7_MULDIV, crate::opcodes::FUNCT3_MULHSU, crate::opcodes::OP);
rtype_instr!(mulhu, crate::opcodes::FUNCT7_MULDIV, crate::opcodes::FUNCT3_MULHU, crate::opcodes::OP);
rtype_instr!(div, crate::opcodes::FUNCT7_MULDIV, crate::opcodes::FUNCT3_DIV, crate::opcodes::OP);
rtype_instr!(divu, crate::opcodes::FUNCT7_MULDIV, crate::opcodes::FUNCT3_DIVU, crate::opcodes::OP);
rtype_instr!(rem, crate::opcodes::FUNCT7_MULDIV, crate::opcodes::FUNCT3_REM, crate::opcodes::OP);
rtype_instr!(remu, crate::opcodes::FUNCT7_MULDIV, crate::opcodes::FUNCT3_REMU, crate::opcodes::OP);
