//! Broadcast symbol set
//!
//! The server accepts 89 printable characters in a `say` message (no space, no
//! parentheses). The last symbol, `;`, must never open a message: the server's
//! parser truncates messages that start with it. The first digit is therefore
//! drawn from the first 88 symbols only.

/// Allowed symbols, in digit order
pub const SYMBOLS: &[u8; 89] =
    b"!#$%&*+,-./0123456789:<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[]^_`abcdefghijklmnopqrstuvwxyz{|}~;";

/// Base of every digit but the first
pub const BASE: u32 = 89;

/// Base of the first (least significant) digit
pub const FIRST_BASE: u32 = 88;

/// Longest message the server relays
pub const MAX_MESSAGE_LEN: usize = 20;

const NOT_A_SYMBOL: u8 = u8::MAX;

const DIGIT_OF: [u8; 256] = {
    let mut table = [NOT_A_SYMBOL; 256];
    let mut i = 0;
    while i < SYMBOLS.len() {
        table[SYMBOLS[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// Digit value of a symbol
#[inline]
pub fn digit(symbol: u8) -> Option<u32> {
    match DIGIT_OF[symbol as usize] {
        NOT_A_SYMBOL => None,
        d => Some(u32::from(d)),
    }
}

/// Symbol of a digit value; `d` must be below [`BASE`]
#[inline]
pub fn symbol(d: u32) -> u8 {
    SYMBOLS[d as usize]
}
