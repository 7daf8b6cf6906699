//! Program instructions

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use spl_associated_token_account::get_associated_token_address;

use crate::state::{
    find_admin_address, find_auction_address, find_proceeds_address, find_program_data_address,
};

/// Auction program instructions
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum AuctionInstruction {
    // ============ Admin Registry ============
    /// Create the admin registry
    /// Accounts:
    /// 0. `[signer, writable]` Upgrade authority (payer)
    /// 1. `[writable]` Admin settings PDA
    /// 2. `[]` Program data account
    /// 3. `[]` System program
    InitAdmin { admin_key: Pubkey },

    /// Replace the registered admin
    /// Accounts:
    /// 0. `[signer]` Upgrade authority
    /// 1. `[writable]` Admin settings PDA
    /// 2. `[]` Program data account
    SetAdmin { admin_key: Pubkey },

    // ============ Auction Lifecycle ============
    /// Create an auction seeded with the admin's opening bid
    /// Accounts:
    /// 0. `[signer, writable]` Admin
    /// 1. `[]` Admin settings PDA
    /// 2. `[writable]` Auction PDA
    /// 3. `[writable]` Proceeds escrow PDA
    /// 4. `[]` Proceeds mint
    /// 5. `[writable]` Admin associated token account
    /// 6. `[]` System program
    /// 7. `[]` Token program
    Initialize {
        name: String,
        amount: u64,
        price_increment: u64,
        start_timestamp: i64,
        end_timestamp: i64,
    },

    // ============ Bidding ============
    /// Outbid the current leader
    /// Accounts:
    /// 0. `[signer]` Bidder
    /// 1. `[writable]` Auction PDA
    /// 2. `[writable]` Proceeds escrow PDA
    /// 3. `[writable]` Bidder associated token account (becomes the refund account)
    /// 4. `[writable]` Current leader token account
    /// 5. `[]` Token program
    Bid { amount: u64 },

    /// Outbid the current leader, creating the bidder's associated token
    /// account to receive a future refund. The current leader's associated
    /// token account is recreated if it was closed.
    /// Accounts:
    /// 0. `[signer, writable]` Bidder (payer)
    /// 1. `[writable]` Auction PDA
    /// 2. `[writable]` Proceeds escrow PDA
    /// 3. `[writable]` Bidder funding token account
    /// 4. `[writable]` Bidder associated token account
    /// 5. `[writable]` Current leader associated token account
    /// 6. `[]` Current leader wallet
    /// 7. `[]` Proceeds mint
    /// 8. `[]` System program
    /// 9. `[]` Token program
    /// 10. `[]` Associated token program
    BidCreate { amount: u64 },

    // ============ Settlement ============
    /// Release the escrow to the admin once the auction has ended
    /// Accounts:
    /// 0. `[signer, writable]` Admin (receives escrow rent)
    /// 1. `[]` Admin settings PDA
    /// 2. `[writable]` Auction PDA
    /// 3. `[writable]` Proceeds escrow PDA
    /// 4. `[writable]` Destination token account
    /// 5. `[]` Token program
    Close,
}

impl AuctionInstruction {
    fn into_instruction(
        self,
        program_id: &Pubkey,
        accounts: Vec<AccountMeta>,
    ) -> Result<Instruction, ProgramError> {
        Ok(Instruction {
            program_id: *program_id,
            accounts,
            data: borsh::to_vec(&self)?,
        })
    }
}

/// Build an `InitAdmin` instruction
pub fn init_admin(
    program_id: &Pubkey,
    upgrade_authority: &Pubkey,
    admin_key: Pubkey,
) -> Result<Instruction, ProgramError> {
    let (admin_settings, _) = find_admin_address(program_id);
    AuctionInstruction::InitAdmin { admin_key }.into_instruction(
        program_id,
        vec![
            AccountMeta::new(*upgrade_authority, true),
            AccountMeta::new(admin_settings, false),
            AccountMeta::new_readonly(find_program_data_address(program_id), false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

/// Build a `SetAdmin` instruction
pub fn set_admin(
    program_id: &Pubkey,
    upgrade_authority: &Pubkey,
    admin_key: Pubkey,
) -> Result<Instruction, ProgramError> {
    let (admin_settings, _) = find_admin_address(program_id);
    AuctionInstruction::SetAdmin { admin_key }.into_instruction(
        program_id,
        vec![
            AccountMeta::new_readonly(*upgrade_authority, true),
            AccountMeta::new(admin_settings, false),
            AccountMeta::new_readonly(find_program_data_address(program_id), false),
        ],
    )
}

/// Build an `Initialize` instruction
#[allow(clippy::too_many_arguments)]
pub fn initialize(
    program_id: &Pubkey,
    admin: &Pubkey,
    admin_token_account: &Pubkey,
    proceeds_mint: &Pubkey,
    name: &str,
    amount: u64,
    price_increment: u64,
    start_timestamp: i64,
    end_timestamp: i64,
) -> Result<Instruction, ProgramError> {
    let (admin_settings, _) = find_admin_address(program_id);
    let (auction, _) = find_auction_address(program_id, name);
    let (proceeds, _) = find_proceeds_address(program_id, &auction);
    AuctionInstruction::Initialize {
        name: name.to_string(),
        amount,
        price_increment,
        start_timestamp,
        end_timestamp,
    }
    .into_instruction(
        program_id,
        vec![
            AccountMeta::new(*admin, true),
            AccountMeta::new_readonly(admin_settings, false),
            AccountMeta::new(auction, false),
            AccountMeta::new(proceeds, false),
            AccountMeta::new_readonly(*proceeds_mint, false),
            AccountMeta::new(*admin_token_account, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
    )
}

/// Build a `Bid` instruction funded from the bidder's associated token account
pub fn bid(
    program_id: &Pubkey,
    bidder: &Pubkey,
    name: &str,
    proceeds_mint: &Pubkey,
    leader_token_account: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let (auction, _) = find_auction_address(program_id, name);
    let (proceeds, _) = find_proceeds_address(program_id, &auction);
    AuctionInstruction::Bid { amount }.into_instruction(
        program_id,
        vec![
            AccountMeta::new_readonly(*bidder, true),
            AccountMeta::new(auction, false),
            AccountMeta::new(proceeds, false),
            AccountMeta::new(get_associated_token_address(bidder, proceeds_mint), false),
            AccountMeta::new(*leader_token_account, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
    )
}

/// Build a `BidCreate` instruction. `leader` is the current leader's wallet.
pub fn bid_create(
    program_id: &Pubkey,
    bidder: &Pubkey,
    name: &str,
    funding_token_account: &Pubkey,
    leader: &Pubkey,
    proceeds_mint: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let (auction, _) = find_auction_address(program_id, name);
    let (proceeds, _) = find_proceeds_address(program_id, &auction);
    let bidder_ata = get_associated_token_address(bidder, proceeds_mint);
    let leader_ata = get_associated_token_address(leader, proceeds_mint);
    AuctionInstruction::BidCreate { amount }.into_instruction(
        program_id,
        vec![
            AccountMeta::new(*bidder, true),
            AccountMeta::new(auction, false),
            AccountMeta::new(proceeds, false),
            AccountMeta::new(*funding_token_account, false),
            AccountMeta::new(bidder_ata, false),
            AccountMeta::new(leader_ata, false),
            AccountMeta::new_readonly(*leader, false),
            AccountMeta::new_readonly(*proceeds_mint, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(spl_associated_token_account::id(), false),
        ],
    )
}

/// Build a `Close` instruction
pub fn close(
    program_id: &Pubkey,
    admin: &Pubkey,
    name: &str,
    destination_token_account: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let (admin_settings, _) = find_admin_address(program_id);
    let (auction, _) = find_auction_address(program_id, name);
    let (proceeds, _) = find_proceeds_address(program_id, &auction);
    AuctionInstruction::Close.into_instruction(
        program_id,
        vec![
            AccountMeta::new(*admin, true),
            AccountMeta::new_readonly(admin_settings, false),
            AccountMeta::new(auction, false),
            AccountMeta::new(proceeds, false),
            AccountMeta::new(*destination_token_account, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
    )
}
