//! Instruction set registration
//!
//! Wires every implemented instruction into the decoder. Instructions
//! fall into four groups by how much of the word determines them:
//! opcode only (lui, auipc, jal), opcode + funct3 (branches, loads,
//! stores, most reg-imm), opcode + funct3 + funct7 (reg-reg, shifts
//! by immediate), and the whole word (ecall, ebreak).

use crate::{
    decode::{Decoder, DecoderError, MaskWithValue},
    hart::eei::Eei,
    opcodes::*,
    rv32i::{self, Instr},
    rv32m, rv32sys,
    utils::mask,
};

fn opcode_determined<E: Eei>(
    decoder: &mut Decoder<Instr<E>>,
    opcode: u32,
    instr: Instr<E>,
) -> Result<(), DecoderError> {
    decoder.push_instruction(vec![MaskWithValue::opcode(opcode)], instr)
}

fn opcode_funct3_determined<E: Eei>(
    decoder: &mut Decoder<Instr<E>>,
    opcode: u32,
    funct3: u32,
    instr: Instr<E>,
) -> Result<(), DecoderError> {
    let masks_with_values = vec![
        MaskWithValue::opcode(opcode),
        MaskWithValue {
            mask: mask(3) << 12,
            value: funct3 << 12,
        },
    ];
    decoder.push_instruction(masks_with_values, instr)
}

/// This also covers the shift-by-immediate instructions, which use
/// the funct7 bits of the immediate to pick the shift kind.
fn opcode_funct3_funct7_determined<E: Eei>(
    decoder: &mut Decoder<Instr<E>>,
    opcode: u32,
    funct3: u32,
    funct7: u32,
    instr: Instr<E>,
) -> Result<(), DecoderError> {
    let masks_with_values = vec![
        MaskWithValue::opcode(opcode),
        MaskWithValue {
            mask: mask(3) << 12,
            value: funct3 << 12,
        },
        MaskWithValue {
            mask: mask(7) << 25,
            value: funct7 << 25,
        },
    ];
    decoder.push_instruction(masks_with_values, instr)
}

fn word_determined<E: Eei>(
    decoder: &mut Decoder<Instr<E>>,
    word: u32,
    instr: Instr<E>,
) -> Result<(), DecoderError> {
    let masks_with_values = vec![
        MaskWithValue::opcode(OP_SYSTEM),
        MaskWithValue {
            mask: 0xffff_ffff,
            value: word,
        },
    ];
    decoder.push_instruction(masks_with_values, instr)
}

pub fn make_rv32i<E: Eei>(decoder: &mut Decoder<Instr<E>>) -> Result<(), DecoderError> {
    // Opcode determines instruction
    opcode_determined(decoder, OP_LUI, rv32i::lui())?;
    opcode_determined(decoder, OP_AUIPC, rv32i::auipc())?;
    opcode_determined(decoder, OP_JAL, rv32i::jal())?;

    // Opcode and funct3 determine instruction
    opcode_funct3_determined(decoder, OP_JALR, 0b000, rv32i::jalr())?;
    opcode_funct3_determined(decoder, OP_BRANCH, FUNCT3_BEQ, rv32i::beq())?;
    opcode_funct3_determined(decoder, OP_BRANCH, FUNCT3_BNE, rv32i::bne())?;
    opcode_funct3_determined(decoder, OP_BRANCH, FUNCT3_BLT, rv32i::blt())?;
    opcode_funct3_determined(decoder, OP_BRANCH, FUNCT3_BGE, rv32i::bge())?;
    opcode_funct3_determined(decoder, OP_BRANCH, FUNCT3_BLTU, rv32i::bltu())?;
    opcode_funct3_determined(decoder, OP_BRANCH, FUNCT3_BGEU, rv32i::bgeu())?;
    opcode_funct3_determined(decoder, OP_LOAD, FUNCT3_B, rv32i::lb())?;
    opcode_funct3_determined(decoder, OP_LOAD, FUNCT3_H, rv32i::lh())?;
    opcode_funct3_determined(decoder, OP_LOAD, FUNCT3_W, rv32i::lw())?;
    opcode_funct3_determined(decoder, OP_LOAD, FUNCT3_BU, rv32i::lbu())?;
    opcode_funct3_determined(decoder, OP_LOAD, FUNCT3_HU, rv32i::lhu())?;
    opcode_funct3_determined(decoder, OP_STORE, FUNCT3_B, rv32i::sb())?;
    opcode_funct3_determined(decoder, OP_STORE, FUNCT3_H, rv32i::sh())?;
    opcode_funct3_determined(decoder, OP_STORE, FUNCT3_W, rv32i::sw())?;
    opcode_funct3_determined(decoder, OP_IMM, FUNCT3_ADDI, rv32i::addi())?;
    opcode_funct3_determined(decoder, OP_IMM, FUNCT3_SLTI, rv32i::slti())?;
    opcode_funct3_determined(decoder, OP_IMM, FUNCT3_SLTIU, rv32i::sltiu())?;
    opcode_funct3_determined(decoder, OP_IMM, FUNCT3_XORI, rv32i::xori())?;
    opcode_funct3_determined(decoder, OP_IMM, FUNCT3_ORI, rv32i::ori())?;
    opcode_funct3_determined(decoder, OP_IMM, FUNCT3_ANDI, rv32i::andi())?;

    // Shifts by immediate: the funct7 field distinguishes logical
    // from arithmetic right shift
    opcode_funct3_funct7_determined(decoder, OP_IMM, FUNCT3_SLLI, 0b0000000, rv32i::slli())?;
    opcode_funct3_funct7_determined(decoder, OP_IMM, FUNCT3_SRLI, FUNCT7_SRLI, rv32i::srli())?;
    opcode_funct3_funct7_determined(decoder, OP_IMM, FUNCT3_SRAI, FUNCT7_SRAI, rv32i::srai())?;

    // Opcode, funct3 and funct7 determine instruction
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_ADD, FUNCT7_ADD, rv32i::add())?;
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_SUB, FUNCT7_SUB, rv32i::sub())?;
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_SLL, 0b0000000, rv32i::sll())?;
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_SLT, 0b0000000, rv32i::slt())?;
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_SLTU, 0b0000000, rv32i::sltu())?;
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_XOR, 0b0000000, rv32i::xor())?;
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_SRL, FUNCT7_SRL, rv32i::srl())?;
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_SRA, FUNCT7_SRA, rv32i::sra())?;
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_OR, 0b0000000, rv32i::or())?;
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_AND, 0b0000000, rv32i::and())?;
    Ok(())
}

pub fn make_rv32m<E: Eei>(decoder: &mut Decoder<Instr<E>>) -> Result<(), DecoderError> {
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_MUL, FUNCT7_MULDIV, rv32m::mul())?;
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_MULH, FUNCT7_MULDIV, rv32m::mulh())?;
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_MULHSU, FUNCT7_MULDIV, rv32m::mulhsu())?;
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_MULHU, FUNCT7_MULDIV, rv32m::mulhu())?;
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_DIV, FUNCT7_MULDIV, rv32m::div())?;
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_DIVU, FUNCT7_MULDIV, rv32m::divu())?;
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_REM, FUNCT7_MULDIV, rv32m::rem())?;
    opcode_funct3_funct7_determined(decoder, OP, FUNCT3_REMU, FUNCT7_MULDIV, rv32m::remu())?;
    Ok(())
}

pub fn make_rv32sys<E: Eei>(decoder: &mut Decoder<Instr<E>>) -> Result<(), DecoderError> {
    word_determined(decoder, INSTR_ECALL, rv32sys::ecall())?;
    word_determined(decoder, INSTR_EBREAK, rv32sys::ebreak())?;
    Ok(())
}
