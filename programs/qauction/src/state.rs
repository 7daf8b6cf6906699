//! Program state definitions

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{bpf_loader_upgradeable, pubkey::Pubkey};

use crate::error::AuctionError;

/// Seed for the admin registry PDA
pub const ADMIN_SEED: &[u8] = b"admin";
/// Seed prefix for auction PDAs, followed by the auction name
pub const AUCTION_SEED: &[u8] = b"auction";
/// Seed prefix for proceeds escrow PDAs, followed by the auction address
pub const PROCEEDS_SEED: &[u8] = b"proceeds";

/// Longest accepted auction name. The name is used whole as a PDA seed.
pub const MAX_NAME_LEN: usize = 32;

/// Global admin registry - singleton
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminSettings {
    /// Key allowed to create and close auctions
    pub admin_key: Pubkey,
    /// PDA bump seed
    pub bump: u8,
    /// Initialized flag
    pub is_initialized: bool,
}

impl AdminSettings {
    /// Account size
    pub const LEN: usize = 32 + 1 + 1; // 34 bytes
}

/// Stored auction status. Pending/Active/Ended are derived from the clock.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum AuctionStatus {
    /// Created and not yet settled
    #[default]
    Open = 0,
    /// Proceeds released, terminal
    Closed = 1,
}

/// Where an auction is in its lifecycle at a given ledger time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionPhase {
    /// Before `start_timestamp`
    Pending,
    /// Accepting bids, both window ends included
    Active,
    /// Past `end_timestamp`, waiting for the admin to close
    Ended,
    /// Proceeds released
    Closed,
}

/// Auction record, one per name
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Auction {
    /// Initialized flag
    pub is_initialized: bool,
    /// Auction PDA bump seed, also used to sign for the escrow
    pub bump: u8,
    /// Proceeds escrow PDA bump
    pub proceeds_bump: u8,
    /// Open or closed
    pub status: AuctionStatus,
    /// Unique name, part of the PDA seeds
    pub name: String,
    /// Current highest bid, held in escrow
    pub amount: u64,
    /// Minimum raise over `amount`
    pub price_increment: u64,
    /// First second bids are accepted
    pub start_timestamp: i64,
    /// Last second bids are accepted
    pub end_timestamp: i64,
    /// Current highest bidder
    pub leader: Pubkey,
    /// Token account refunded when the leader is outbid
    pub leader_token_account: Pubkey,
    /// SPL token the auction settles in
    pub proceeds_mint: Pubkey,
    /// Settlement timestamp (0 until closed)
    pub closed_at: i64,
}

impl Auction {
    /// Account size, sized for the longest name
    pub const LEN: usize = 1 + 1 + 1 + 1 + (4 + MAX_NAME_LEN) + 8 + 8 + 8 + 8 + 32 + 32 + 32 + 8;

    /// Lifecycle phase at `now`. Both ends of the bidding window are inclusive.
    pub fn phase(&self, now: i64) -> AuctionPhase {
        if self.status == AuctionStatus::Closed {
            AuctionPhase::Closed
        } else if now < self.start_timestamp {
            AuctionPhase::Pending
        } else if now <= self.end_timestamp {
            AuctionPhase::Active
        } else {
            AuctionPhase::Ended
        }
    }

    /// Smallest bid that would be accepted next
    pub fn min_next_bid(&self) -> Result<u64, AuctionError> {
        self.amount
            .checked_add(self.price_increment)
            .ok_or(AuctionError::MathOverflow)
    }
}

/// Validate `initialize` arguments against the ledger time `now`
pub fn validate_auction_params(
    name: &str,
    amount: u64,
    price_increment: u64,
    start_timestamp: i64,
    end_timestamp: i64,
    now: i64,
) -> Result<(), AuctionError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(AuctionError::InvalidParameters);
    }
    if amount == 0 || price_increment == 0 {
        return Err(AuctionError::InvalidParameters);
    }
    if end_timestamp <= start_timestamp || end_timestamp <= now {
        return Err(AuctionError::InvalidParameters);
    }
    Ok(())
}

/// Admin registry address
pub fn find_admin_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[ADMIN_SEED], program_id)
}

/// Auction record address for `name`
pub fn find_auction_address(program_id: &Pubkey, name: &str) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[AUCTION_SEED, name.as_bytes()], program_id)
}

/// Proceeds escrow address for an auction record
pub fn find_proceeds_address(program_id: &Pubkey, auction: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[PROCEEDS_SEED, auction.as_ref()], program_id)
}

/// Program-data account holding this program's upgrade authority
pub fn find_program_data_address(program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[program_id.as_ref()], &bpf_loader_upgradeable::id()).0
}
