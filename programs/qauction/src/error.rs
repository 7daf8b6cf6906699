//! Program errors

use solana_program::program_error::ProgramError;
use thiserror::Error;

/// Auction program errors
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuctionError {
    #[error("Signer is not authorized to perform this action")]
    Unauthorized,

    #[error("Account already initialized")]
    AlreadyInitialized,

    #[error("Auction already closed")]
    AlreadyClosed,

    #[error("Invalid auction parameters")]
    InvalidParameters,

    #[error("Auction is not accepting bids")]
    AuctionNotActive,

    #[error("Auction has not yet ended")]
    AuctionNotEnded,

    #[error("Bid amount too low")]
    BidTooLow,

    #[error("Token account mint does not match the auction mint")]
    InvalidMint,

    #[error("Insufficient token balance")]
    InsufficientFunds,

    #[error("Refund account does not match the current leader")]
    InvalidLeaderAccount,

    #[error("Math overflow")]
    MathOverflow,

    #[error("Invalid PDA")]
    InvalidPDA,

    #[error("Invalid account owner")]
    InvalidAccountOwner,

    #[error("Invalid instruction data")]
    InvalidInstructionData,

    #[error("Account not initialized")]
    AccountNotInitialized,
}

impl From<AuctionError> for ProgramError {
    fn from(e: AuctionError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
