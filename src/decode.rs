//! Instruction decoding
//!
//! Decoding happens in multiple steps, each of which masks out a
//! portion of the instruction word and compares the result with a set
//! of values. Depending on the value obtained, decoding proceeds to
//! the next step, which is either another decoder node or the payload
//! for a fully-decoded instruction (an execution function).
//!
//! The first mask picks out the opcode; subsequent masks pick out
//! funct3, funct7, or (for the SYSTEM instructions) the whole word.
//! An instruction word that falls off the tree at any step is an
//! illegal or unimplemented instruction.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecoderError {
    #[error("no instruction matches 0x{instr:08x} (mask 0x{mask:08x})")]
    MissingValueInMap { instr: u32, mask: u32 },
    #[error("instruction registration is ambiguous at mask 0x{mask:08x}, value 0x{value:08x}")]
    AmbiguousInstruction { mask: u32, value: u32 },
    #[error("instruction registration list is empty")]
    EmptyMaskList,
}

/// One step of the decoding process: mask the instruction word and
/// look the result up in the current node's value map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskWithValue {
    pub mask: u32,
    pub value: u32,
}

enum NextStep<T> {
    Decode(Decoder<T>),
    Payload(T),
}

/// A tree of masks and value maps with instruction payloads at the
/// leaves. Lookup costs one mask-and-compare per level, so decoding
/// an R-type instruction is two u32 operations.
pub struct Decoder<T> {
    mask: u32,
    value_map: HashMap<u32, NextStep<T>>,
}

impl<T> Decoder<T> {
    /// Make a decoder whose first step applies the given mask
    /// (normally the 7-bit opcode mask).
    pub fn new(mask: u32) -> Self {
        Self {
            mask,
            value_map: HashMap::new(),
        }
    }

    /// Register an instruction. The masks are applied root-first, so
    /// the first entry must use this decoder's own mask. Registration
    /// fails if it would overwrite or shadow an existing instruction.
    pub fn push_instruction(
        &mut self,
        masks_with_values: Vec<MaskWithValue>,
        payload: T,
    ) -> Result<(), DecoderError> {
        let Some((first, rest)) = masks_with_values.split_first() else {
            return Err(DecoderError::EmptyMaskList);
        };
        if first.mask != self.mask {
            return Err(DecoderError::AmbiguousInstruction {
                mask: first.mask,
                value: first.value,
            });
        }
        match (self.value_map.entry(first.value), rest) {
            (Entry::Vacant(slot), []) => {
                slot.insert(NextStep::Payload(payload));
                Ok(())
            }
            (Entry::Vacant(slot), [next, ..]) => {
                let mut child = Decoder::new(next.mask);
                child.push_instruction(rest.to_vec(), payload)?;
                slot.insert(NextStep::Decode(child));
                Ok(())
            }
            (Entry::Occupied(slot), [_, ..]) => match slot.into_mut() {
                NextStep::Decode(child) => child.push_instruction(rest.to_vec(), payload),
                // A leaf already sits above the subtree this
                // instruction wants to extend
                NextStep::Payload(_) => Err(DecoderError::AmbiguousInstruction {
                    mask: first.mask,
                    value: first.value,
                }),
            },
            // This instruction would become a leaf shadowing an
            // existing entry
            (Entry::Occupied(_), []) => Err(DecoderError::AmbiguousInstruction {
                mask: first.mask,
                value: first.value,
            }),
        }
    }

    /// Walk the tree for an instruction word, returning the payload
    /// at the leaf.
    pub fn get_exec(&self, instr: u32) -> Result<&T, DecoderError> {
        let value = self.mask & instr;
        match self.value_map.get(&value) {
            Some(NextStep::Decode(child)) => child.get_exec(instr),
            Some(NextStep::Payload(payload)) => Ok(payload),
            None => Err(DecoderError::MissingValueInMap {
                instr,
                mask: self.mask,
            }),
        }
    }
}

impl<T> std::fmt::Debug for Decoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("mask", &format_args!("0x{:08x}", self.mask))
            .field("entries", &self.value_map.len())
            .finish()
    }
}

impl MaskWithValue {
    /// The root step shared by every instruction: match the 7-bit
    /// opcode field.
    pub fn opcode(opcode: u32) -> Self {
        Self {
            mask: crate::utils::mask(7),
            value: opcode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::mask;

    #[test]
    fn check_opcode_level_lookup() {
        let mut decoder: Decoder<u32> = Decoder::new(mask(7));
        decoder
            .push_instruction(vec![MaskWithValue::opcode(0b0110111)], 1)
            .unwrap();
        assert_eq!(*decoder.get_exec(0x0003_5137).unwrap(), 1);
    }

    #[test]
    fn check_two_level_lookup() {
        let mut decoder: Decoder<u32> = Decoder::new(mask(7));
        let beq = vec![
            MaskWithValue::opcode(0b1100011),
            MaskWithValue {
                mask: mask(3) << 12,
                value: 0,
            },
        ];
        let bne = vec![
            MaskWithValue::opcode(0b1100011),
            MaskWithValue {
                mask: mask(3) << 12,
                value: 1 << 12,
            },
        ];
        decoder.push_instruction(beq, 10).unwrap();
        decoder.push_instruction(bne, 20).unwrap();
        // beq t0, t1, 0x20 and bne with the same fields
        assert_eq!(*decoder.get_exec(0x0262_8063).unwrap(), 10);
        assert_eq!(*decoder.get_exec(0x0262_9063).unwrap(), 20);
    }

    #[test]
    fn check_unknown_instruction_is_error() {
        let decoder: Decoder<u32> = Decoder::new(mask(7));
        assert!(matches!(
            decoder.get_exec(0xdead_beef),
            Err(DecoderError::MissingValueInMap { .. })
        ));
    }

    #[test]
    fn check_duplicate_registration_is_rejected() {
        let mut decoder: Decoder<u32> = Decoder::new(mask(7));
        decoder
            .push_instruction(vec![MaskWithValue::opcode(0b0110111)], 1)
            .unwrap();
        assert!(matches!(
            decoder.push_instruction(vec![MaskWithValue::opcode(0b0110111)], 2),
            Err(DecoderError::AmbiguousInstruction { .. })
        ));
    }

    #[test]
    fn check_leaf_cannot_shadow_subtree() {
        let mut decoder: Decoder<u32> = Decoder::new(mask(7));
        let two_level = vec![
            MaskWithValue::opcode(0b1100011),
            MaskWithValue {
                mask: mask(3) << 12,
                value: 0,
            },
        ];
        decoder.push_instruction(two_level, 1).unwrap();
        assert!(matches!(
            decoder.push_instruction(vec![MaskWithValue::opcode(0b1100011)], 2),
            Err(DecoderError::AmbiguousInstruction { .. })
        ));
    }
}
