//! Q Auction Solana Program
//!
//! Admin-gated English auctions settled in an SPL token. The current highest
//! bid is held in a program-owned escrow and refunded when outbid.

pub mod error;
pub mod instruction;
pub mod processor;
pub mod state;
pub mod utils;

use solana_program::{
    account_info::AccountInfo, entrypoint, entrypoint::ProgramResult, pubkey::Pubkey,
};

#[cfg(not(feature = "no-entrypoint"))]
entrypoint!(process_instruction);

/// Program entrypoint
pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::process_instruction(program_id, accounts, instruction_data)
}

solana_program::declare_id!("5EYANgeHu9DDa3WHc2td29eguhEAJ7SZFAXhWuXam2Ve");
