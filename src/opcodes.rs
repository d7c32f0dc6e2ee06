//! Bytecode instruction lengths.
//!
//! The Code walk only cares about method-invocation instructions, but it
//! must step over everything else with the correct operand width or the
//! stream desynchronizes. Lengths here are operand byte counts, excluding
//! the opcode itself; the three variable-width forms (`wide`,
//! `tableswitch`, `lookupswitch`) are handled by the walker.

pub const INVOKEVIRTUAL: u8 = 0xb6;
pub const INVOKESPECIAL: u8 = 0xb7;
pub const INVOKESTATIC: u8 = 0xb8;
pub const INVOKEINTERFACE: u8 = 0xb9;
pub const INVOKEDYNAMIC: u8 = 0xba;

pub const WIDE: u8 = 0xc4;
pub const TABLESWITCH: u8 = 0xaa;
pub const LOOKUPSWITCH: u8 = 0xab;

const IINC: u8 = 0x84;

/// Fixed operand byte count for `opcode`, or `None` for unused opcodes and
/// the variable-width forms.
pub fn operand_len(opcode: u8) -> Option<usize> {
    let len = match opcode {
        // nop through dconst_1, loads/stores with implicit index,
        // array ops, stack ops, arithmetic, conversions, comparisons,
        // returns, arraylength, athrow, monitors
        0x00..=0x0f
        | 0x1a..=0x35
        | 0x3b..=0x83
        | 0x85..=0x98
        | 0xac..=0xb1
        | 0xbe
        | 0xbf
        | 0xc2
        | 0xc3 => 0,

        // bipush, ldc, loads/stores with index, ret, newarray
        0x10 | 0x12 | 0x15..=0x19 | 0x36..=0x3a | 0xa9 | 0xbc => 1,

        // sipush, ldc_w, ldc2_w, iinc, branches, field access, invokes,
        // new, anewarray, checkcast, instanceof, ifnull, ifnonnull
        0x11
        | 0x13
        | 0x14
        | IINC
        | 0x99..=0xa8
        | 0xb2..=0xb8
        | 0xbb
        | 0xbd
        | 0xc0
        | 0xc1
        | 0xc6
        | 0xc7 => 2,

        // multianewarray
        0xc5 => 3,

        // invokeinterface, invokedynamic, goto_w, jsr_w
        INVOKEINTERFACE | INVOKEDYNAMIC | 0xc8 | 0xc9 => 4,

        // wide, tableswitch, lookupswitch: variable
        WIDE | TABLESWITCH | LOOKUPSWITCH => return None,

        // breakpoint / impdep1 / impdep2 never appear in valid files but
        // carry no operands if they do
        0xca | 0xfe | 0xff => 0,

        _ => return None,
    };
    Some(len)
}

/// Operand byte count of a `wide`-prefixed instruction (excluding both
/// opcodes): `wide iinc` widens two operands, everything else one index.
pub fn wide_operand_len(widened: u8) -> usize {
    if widened == IINC { 4 } else { 2 }
}

/// Padding and fixed-header length of a switch instruction whose opcode
/// sits at `pc` (relative to the start of the code array). The caller
/// still reads the per-entry tables.
pub fn switch_padding(pc: usize) -> usize {
    (4 - ((pc + 1) % 4)) % 4
}

pub fn is_method_invoke(opcode: u8) -> bool {
    matches!(
        opcode,
        INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC | INVOKEINTERFACE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoke_lengths_match_format() {
        assert_eq!(operand_len(INVOKEVIRTUAL), Some(2));
        assert_eq!(operand_len(INVOKESPECIAL), Some(2));
        assert_eq!(operand_len(INVOKESTATIC), Some(2));
        assert_eq!(operand_len(INVOKEINTERFACE), Some(4));
        assert_eq!(operand_len(INVOKEDYNAMIC), Some(4));
    }

    #[test]
    fn variable_width_forms_have_no_fixed_length() {
        assert_eq!(operand_len(WIDE), None);
        assert_eq!(operand_len(TABLESWITCH), None);
        assert_eq!(operand_len(LOOKUPSWITCH), None);
    }

    #[test]
    fn switch_padding_aligns_to_four() {
        // opcode at pc 0 -> operands begin at 1, pad 3 to reach 4
        assert_eq!(switch_padding(0), 3);
        assert_eq!(switch_padding(3), 0);
        assert_eq!(switch_padding(4), 3);
        assert_eq!(switch_padding(6), 1);
    }

    #[test]
    fn wide_iinc_is_widest() {
        assert_eq!(wide_operand_len(0x84), 4);
        assert_eq!(wide_operand_len(0x15), 2);
    }
}
