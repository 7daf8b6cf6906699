//! Instruction processor

use borsh::BorshDeserialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    sysvar::Sysvar,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};
use spl_token::state::{Account as TokenAccount, Mint};

use crate::{
    error::AuctionError,
    instruction::AuctionInstruction,
    state::{
        find_admin_address, find_auction_address, find_proceeds_address, validate_auction_params,
        AdminSettings, Auction, AuctionPhase, AuctionStatus, ADMIN_SEED, AUCTION_SEED,
        PROCEEDS_SEED,
    },
    utils::{
        assert_address, assert_owned_by, assert_signer, assert_token_program,
        assert_upgrade_authority, create_pda_account, transfer_tokens, unpack_token_account,
    },
};

/// Process program instruction
pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    let instruction = AuctionInstruction::try_from_slice(instruction_data)
        .map_err(|_| AuctionError::InvalidInstructionData)?;

    match instruction {
        AuctionInstruction::InitAdmin { admin_key } => {
            process_init_admin(program_id, accounts, admin_key)
        }
        AuctionInstruction::SetAdmin { admin_key } => {
            process_set_admin(program_id, accounts, admin_key)
        }
        AuctionInstruction::Initialize {
            name,
            amount,
            price_increment,
            start_timestamp,
            end_timestamp,
        } => process_initialize(
            program_id,
            accounts,
            name,
            amount,
            price_increment,
            start_timestamp,
            end_timestamp,
        ),
        AuctionInstruction::Bid { amount } => process_bid(program_id, accounts, amount),
        AuctionInstruction::BidCreate { amount } => {
            process_bid_create(program_id, accounts, amount)
        }
        AuctionInstruction::Close => process_close(program_id, accounts),
    }
}

/// Load the admin registry, checking its address and owner
fn load_admin_settings(
    program_id: &Pubkey,
    admin_account: &AccountInfo,
) -> Result<AdminSettings, ProgramError> {
    let (admin_pda, _) = find_admin_address(program_id);
    assert_address(admin_account, &admin_pda)?;

    if admin_account.data_is_empty() {
        return Err(AuctionError::AccountNotInitialized.into());
    }
    assert_owned_by(admin_account, program_id)?;

    let settings = AdminSettings::deserialize(&mut &admin_account.data.borrow()[..])?;
    if !settings.is_initialized {
        return Err(AuctionError::AccountNotInitialized.into());
    }
    Ok(settings)
}

/// Load an auction record, checking it sits at the address derived from its name
fn load_auction(program_id: &Pubkey, auction_account: &AccountInfo) -> Result<Auction, ProgramError> {
    if auction_account.data_is_empty() {
        return Err(AuctionError::AccountNotInitialized.into());
    }
    assert_owned_by(auction_account, program_id)?;

    let auction = Auction::deserialize(&mut &auction_account.data.borrow()[..])?;
    if !auction.is_initialized {
        return Err(AuctionError::AccountNotInitialized.into());
    }

    let auction_pda = Pubkey::create_program_address(
        &[AUCTION_SEED, auction.name.as_bytes(), &[auction.bump]],
        program_id,
    )
    .map_err(|_| AuctionError::InvalidPDA)?;
    assert_address(auction_account, &auction_pda)?;

    Ok(auction)
}

/// Check the escrow passed in is the one derived for this auction
fn assert_proceeds_address(
    program_id: &Pubkey,
    auction_account: &AccountInfo,
    auction: &Auction,
    proceeds_account: &AccountInfo,
) -> ProgramResult {
    let proceeds_pda = Pubkey::create_program_address(
        &[
            PROCEEDS_SEED,
            auction_account.key.as_ref(),
            &[auction.proceeds_bump],
        ],
        program_id,
    )
    .map_err(|_| AuctionError::InvalidPDA)?;
    assert_address(proceeds_account, &proceeds_pda)
}

/// Create the admin registry
fn process_init_admin(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    admin_key: Pubkey,
) -> ProgramResult {
    let account_iter = &mut accounts.iter();
    let authority = next_account_info(account_iter)?;
    let admin_account = next_account_info(account_iter)?;
    let program_data = next_account_info(account_iter)?;
    let system_program = next_account_info(account_iter)?;

    assert_signer(authority)?;
    assert_upgrade_authority(program_id, program_data, authority)?;

    let (admin_pda, bump) = find_admin_address(program_id);
    assert_address(admin_account, &admin_pda)?;

    if !admin_account.data_is_empty() {
        return Err(AuctionError::AlreadyInitialized.into());
    }

    create_pda_account(
        authority,
        admin_account,
        system_program,
        AdminSettings::LEN,
        program_id,
        &[ADMIN_SEED, &[bump]],
    )?;

    let settings = AdminSettings {
        admin_key,
        bump,
        is_initialized: true,
    };
    borsh::to_writer(&mut admin_account.data.borrow_mut()[..], &settings)?;

    msg!("Admin registry initialized with admin: {}", admin_key);
    Ok(())
}

/// Replace the registered admin
fn process_set_admin(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    admin_key: Pubkey,
) -> ProgramResult {
    let account_iter = &mut accounts.iter();
    let authority = next_account_info(account_iter)?;
    let admin_account = next_account_info(account_iter)?;
    let program_data = next_account_info(account_iter)?;

    assert_signer(authority)?;
    assert_upgrade_authority(program_id, program_data, authority)?;

    let mut settings = load_admin_settings(program_id, admin_account)?;
    let old_admin = settings.admin_key;
    settings.admin_key = admin_key;
    borsh::to_writer(&mut admin_account.data.borrow_mut()[..], &settings)?;

    msg!("Admin changed from {} to {}", old_admin, admin_key);
    Ok(())
}

/// Create an auction and escrow the admin's opening bid
fn process_initialize(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    name: String,
    amount: u64,
    price_increment: u64,
    start_timestamp: i64,
    end_timestamp: i64,
) -> ProgramResult {
    let account_iter = &mut accounts.iter();
    let admin = next_account_info(account_iter)?;
    let admin_account = next_account_info(account_iter)?;
    let auction_account = next_account_info(account_iter)?;
    let proceeds_account = next_account_info(account_iter)?;
    let proceeds_mint = next_account_info(account_iter)?;
    let admin_token = next_account_info(account_iter)?;
    let system_program = next_account_info(account_iter)?;
    let token_program = next_account_info(account_iter)?;

    assert_signer(admin)?;
    assert_token_program(token_program)?;

    let settings = load_admin_settings(program_id, admin_account)?;
    if settings.admin_key != *admin.key {
        msg!("{} is not the auction admin", admin.key);
        return Err(AuctionError::Unauthorized.into());
    }

    let clock = Clock::get()?;
    if let Err(e) = validate_auction_params(
        &name,
        amount,
        price_increment,
        start_timestamp,
        end_timestamp,
        clock.unix_timestamp,
    ) {
        msg!(
            "Invalid auction parameters: name {:?}, amount {}, increment {}, window [{}, {}]",
            name,
            amount,
            price_increment,
            start_timestamp,
            end_timestamp
        );
        return Err(e.into());
    }

    // Derive auction PDA
    let (auction_pda, auction_bump) = find_auction_address(program_id, &name);
    assert_address(auction_account, &auction_pda)?;
    if !auction_account.data_is_empty() {
        msg!("Auction {} already exists", name);
        return Err(AuctionError::AlreadyInitialized.into());
    }

    // Derive escrow PDA
    let (proceeds_pda, proceeds_bump) = find_proceeds_address(program_id, &auction_pda);
    assert_address(proceeds_account, &proceeds_pda)?;

    assert_owned_by(proceeds_mint, &spl_token::id())?;
    Mint::unpack(&proceeds_mint.data.borrow())?;

    let opening = unpack_token_account(admin_token)?;
    if opening.mint != *proceeds_mint.key {
        return Err(AuctionError::InvalidMint.into());
    }
    if opening.owner != *admin.key {
        return Err(AuctionError::InvalidAccountOwner.into());
    }
    // The opening bid is refunded here, so it must be recreatable by anyone
    assert_address(
        admin_token,
        &get_associated_token_address(admin.key, proceeds_mint.key),
    )?;
    if opening.amount < amount {
        msg!("Opening bid {} exceeds balance {}", amount, opening.amount);
        return Err(AuctionError::InsufficientFunds.into());
    }

    create_pda_account(
        admin,
        auction_account,
        system_program,
        Auction::LEN,
        program_id,
        &[AUCTION_SEED, name.as_bytes(), &[auction_bump]],
    )?;

    // Escrow token account, owned by the auction PDA
    create_pda_account(
        admin,
        proceeds_account,
        system_program,
        TokenAccount::LEN,
        &spl_token::id(),
        &[PROCEEDS_SEED, auction_pda.as_ref(), &[proceeds_bump]],
    )?;
    invoke(
        &spl_token::instruction::initialize_account3(
            token_program.key,
            proceeds_account.key,
            proceeds_mint.key,
            &auction_pda,
        )?,
        &[proceeds_account.clone(), proceeds_mint.clone()],
    )?;

    transfer_tokens(token_program, admin_token, proceeds_account, admin, amount, &[])?;

    let auction = Auction {
        is_initialized: true,
        bump: auction_bump,
        proceeds_bump,
        status: AuctionStatus::Open,
        name,
        amount,
        price_increment,
        start_timestamp,
        end_timestamp,
        leader: *admin.key,
        leader_token_account: *admin_token.key,
        proceeds_mint: *proceeds_mint.key,
        closed_at: 0,
    };
    borsh::to_writer(&mut auction_account.data.borrow_mut()[..], &auction)?;

    msg!(
        "Created auction {} at {} with opening bid {} (increment {}, window [{}, {}])",
        auction.name,
        auction_pda,
        amount,
        price_increment,
        start_timestamp,
        end_timestamp
    );
    Ok(())
}

/// Accounts shared by `Bid` and `BidCreate`
struct BidAccounts<'a, 'info> {
    bidder: &'a AccountInfo<'info>,
    auction: &'a AccountInfo<'info>,
    proceeds: &'a AccountInfo<'info>,
    bidder_token: &'a AccountInfo<'info>,
    leader_token: &'a AccountInfo<'info>,
    token_program: &'a AccountInfo<'info>,
}

/// Run every bid precondition. Nothing is mutated here.
fn validate_bid(
    program_id: &Pubkey,
    accounts: &BidAccounts,
    amount: u64,
) -> Result<Auction, ProgramError> {
    assert_signer(accounts.bidder)?;
    assert_token_program(accounts.token_program)?;

    let auction = load_auction(program_id, accounts.auction)?;

    let clock = Clock::get()?;
    match auction.phase(clock.unix_timestamp) {
        AuctionPhase::Active => {}
        AuctionPhase::Pending => {
            msg!(
                "Auction {} has not started, bidding opens at {}",
                auction.name,
                auction.start_timestamp
            );
            return Err(AuctionError::AuctionNotActive.into());
        }
        AuctionPhase::Ended => {
            msg!(
                "Auction {} has ended, bidding closed at {}",
                auction.name,
                auction.end_timestamp
            );
            return Err(AuctionError::AuctionNotActive.into());
        }
        AuctionPhase::Closed => {
            msg!("Auction {} is closed", auction.name);
            return Err(AuctionError::AuctionNotActive.into());
        }
    }

    let min_bid = auction.min_next_bid()?;
    if amount < min_bid {
        msg!("Bid {} is below the minimum of {}", amount, min_bid);
        return Err(AuctionError::BidTooLow.into());
    }

    assert_proceeds_address(program_id, accounts.auction, &auction, accounts.proceeds)?;

    let funding = unpack_token_account(accounts.bidder_token)?;
    if funding.mint != auction.proceeds_mint {
        return Err(AuctionError::InvalidMint.into());
    }
    if funding.owner != *accounts.bidder.key {
        return Err(AuctionError::InvalidAccountOwner.into());
    }
    if funding.amount < amount {
        msg!("Bid {} exceeds balance {}", amount, funding.amount);
        return Err(AuctionError::InsufficientFunds.into());
    }

    if *accounts.leader_token.key != auction.leader_token_account {
        return Err(AuctionError::InvalidLeaderAccount.into());
    }

    Ok(auction)
}

/// Escrow the new bid, refund the previous leader and record the new leader
fn execute_bid(
    accounts: &BidAccounts,
    mut auction: Auction,
    amount: u64,
    leader_token_account: Pubkey,
) -> ProgramResult {
    // Transfer new bid to escrow
    transfer_tokens(
        accounts.token_program,
        accounts.bidder_token,
        accounts.proceeds,
        accounts.bidder,
        amount,
        &[],
    )?;

    // Refund previous leader, signed by the auction PDA
    let refund = auction.amount;
    {
        let bump = [auction.bump];
        let auction_seeds: &[&[u8]] = &[AUCTION_SEED, auction.name.as_bytes(), &bump];
        transfer_tokens(
            accounts.token_program,
            accounts.proceeds,
            accounts.leader_token,
            accounts.auction,
            refund,
            &[auction_seeds],
        )?;
    }

    let previous_leader = auction.leader;
    auction.amount = amount;
    auction.leader = *accounts.bidder.key;
    auction.leader_token_account = leader_token_account;
    borsh::to_writer(&mut accounts.auction.data.borrow_mut()[..], &auction)?;

    msg!(
        "Bid {} placed by {} on auction {}, refunded {} to {}",
        amount,
        accounts.bidder.key,
        auction.name,
        refund,
        previous_leader
    );
    Ok(())
}

/// Place a bid funded from, and refundable to, the bidder's token account
fn process_bid<'a, 'info>(
    program_id: &Pubkey,
    accounts: &'a [AccountInfo<'info>],
    amount: u64,
) -> ProgramResult {
    let account_iter = &mut accounts.iter();
    let bid_accounts = BidAccounts {
        bidder: next_account_info(account_iter)?,
        auction: next_account_info(account_iter)?,
        proceeds: next_account_info(account_iter)?,
        bidder_token: next_account_info(account_iter)?,
        leader_token: next_account_info(account_iter)?,
        token_program: next_account_info(account_iter)?,
    };

    let auction = validate_bid(program_id, &bid_accounts, amount)?;

    // Refund accounts are always associated token accounts
    assert_address(
        bid_accounts.bidder_token,
        &get_associated_token_address(bid_accounts.bidder.key, &auction.proceeds_mint),
    )?;
    if bid_accounts.leader_token.data_is_empty() {
        msg!(
            "Leader token account {} is closed, BidCreate reopens it",
            bid_accounts.leader_token.key
        );
        return Err(AuctionError::InvalidLeaderAccount.into());
    }

    let leader_token_account = *bid_accounts.bidder_token.key;
    execute_bid(&bid_accounts, auction, amount, leader_token_account)
}

/// Create `wallet`'s associated token account if it does not exist yet
fn create_associated_account<'a>(
    payer: &AccountInfo<'a>,
    wallet: &AccountInfo<'a>,
    associated_account: &AccountInfo<'a>,
    mint: &AccountInfo<'a>,
    system_program: &AccountInfo<'a>,
    token_program: &AccountInfo<'a>,
    ata_program: &AccountInfo<'a>,
) -> ProgramResult {
    if !associated_account.data_is_empty() {
        return Ok(());
    }
    invoke(
        &create_associated_token_account_idempotent(
            payer.key,
            wallet.key,
            mint.key,
            token_program.key,
        ),
        &[
            payer.clone(),
            associated_account.clone(),
            wallet.clone(),
            mint.clone(),
            system_program.clone(),
            token_program.clone(),
            ata_program.clone(),
        ],
    )?;
    msg!("Created token account {} for {}", associated_account.key, wallet.key);
    Ok(())
}

/// Place a bid, creating the bidder's associated token account for refunds.
/// The previous leader's account is recreated as well if it was closed.
fn process_bid_create<'a, 'info>(
    program_id: &Pubkey,
    accounts: &'a [AccountInfo<'info>],
    amount: u64,
) -> ProgramResult {
    let account_iter = &mut accounts.iter();
    let bidder = next_account_info(account_iter)?;
    let auction_account = next_account_info(account_iter)?;
    let proceeds_account = next_account_info(account_iter)?;
    let funding_token = next_account_info(account_iter)?;
    let bidder_ata = next_account_info(account_iter)?;
    let leader_token = next_account_info(account_iter)?;
    let leader = next_account_info(account_iter)?;
    let proceeds_mint = next_account_info(account_iter)?;
    let system_program = next_account_info(account_iter)?;
    let token_program = next_account_info(account_iter)?;
    let ata_program = next_account_info(account_iter)?;

    let bid_accounts = BidAccounts {
        bidder,
        auction: auction_account,
        proceeds: proceeds_account,
        bidder_token: funding_token,
        leader_token,
        token_program,
    };

    let auction = validate_bid(program_id, &bid_accounts, amount)?;

    if *proceeds_mint.key != auction.proceeds_mint {
        return Err(AuctionError::InvalidMint.into());
    }
    if *leader.key != auction.leader {
        return Err(AuctionError::InvalidLeaderAccount.into());
    }
    if *ata_program.key != spl_associated_token_account::id() {
        return Err(ProgramError::IncorrectProgramId);
    }
    let expected_ata = get_associated_token_address(bidder.key, &auction.proceeds_mint);
    assert_address(bidder_ata, &expected_ata)?;

    create_associated_account(
        bidder,
        bidder,
        bidder_ata,
        proceeds_mint,
        system_program,
        token_program,
        ata_program,
    )?;
    create_associated_account(
        bidder,
        leader,
        leader_token,
        proceeds_mint,
        system_program,
        token_program,
        ata_program,
    )?;

    execute_bid(&bid_accounts, auction, amount, *bidder_ata.key)
}

/// Release the escrow to the admin and mark the auction closed
fn process_close(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let account_iter = &mut accounts.iter();
    let admin = next_account_info(account_iter)?;
    let admin_account = next_account_info(account_iter)?;
    let auction_account = next_account_info(account_iter)?;
    let proceeds_account = next_account_info(account_iter)?;
    let destination = next_account_info(account_iter)?;
    let token_program = next_account_info(account_iter)?;

    assert_signer(admin)?;
    assert_token_program(token_program)?;

    let settings = load_admin_settings(program_id, admin_account)?;
    let mut auction = load_auction(program_id, auction_account)?;

    let clock = Clock::get()?;
    if clock.unix_timestamp <= auction.end_timestamp {
        msg!(
            "Auction {} ends at {}, current time {}",
            auction.name,
            auction.end_timestamp,
            clock.unix_timestamp
        );
        return Err(AuctionError::AuctionNotEnded.into());
    }

    if settings.admin_key != *admin.key {
        msg!("{} is not the auction admin", admin.key);
        return Err(AuctionError::Unauthorized.into());
    }

    if auction.status == AuctionStatus::Closed {
        return Err(AuctionError::AlreadyClosed.into());
    }

    assert_proceeds_address(program_id, auction_account, &auction, proceeds_account)?;
    let escrow = unpack_token_account(proceeds_account)?;

    let payout = unpack_token_account(destination)?;
    if payout.mint != auction.proceeds_mint {
        return Err(AuctionError::InvalidMint.into());
    }

    let released = escrow.amount;
    {
        let bump = [auction.bump];
        let auction_seeds: &[&[u8]] = &[AUCTION_SEED, auction.name.as_bytes(), &bump];

        if released > 0 {
            transfer_tokens(
                token_program,
                proceeds_account,
                destination,
                auction_account,
                released,
                &[auction_seeds],
            )?;
        }

        // Close the emptied escrow, rent goes back to the admin
        invoke_signed(
            &spl_token::instruction::close_account(
                token_program.key,
                proceeds_account.key,
                admin.key,
                auction_account.key,
                &[],
            )?,
            &[
                proceeds_account.clone(),
                admin.clone(),
                auction_account.clone(),
                token_program.clone(),
            ],
            &[auction_seeds],
        )?;
    }

    auction.status = AuctionStatus::Closed;
    auction.closed_at = clock.unix_timestamp;
    borsh::to_writer(&mut auction_account.data.borrow_mut()[..], &auction)?;

    msg!(
        "Closed auction {}: released {} to {}, winner {}",
        auction.name,
        released,
        destination.key,
        auction.leader
    );
    Ok(())
}
