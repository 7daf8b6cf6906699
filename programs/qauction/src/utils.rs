//! Account checks and CPI helpers shared by the instruction handlers

use solana_program::{
    account_info::AccountInfo,
    bpf_loader_upgradeable::{self, UpgradeableLoaderState},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};
use spl_token::state::Account as TokenAccount;

use crate::{error::AuctionError, state::find_program_data_address};

pub fn assert_signer(account: &AccountInfo) -> ProgramResult {
    if !account.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    Ok(())
}

pub fn assert_owned_by(account: &AccountInfo, owner: &Pubkey) -> ProgramResult {
    if account.owner != owner {
        return Err(AuctionError::InvalidAccountOwner.into());
    }
    Ok(())
}

pub fn assert_address(account: &AccountInfo, expected: &Pubkey) -> ProgramResult {
    if account.key != expected {
        return Err(AuctionError::InvalidPDA.into());
    }
    Ok(())
}

pub fn assert_token_program(account: &AccountInfo) -> ProgramResult {
    if *account.key != spl_token::id() {
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

/// Check that `authority` is the upgrade authority recorded in this program's
/// program-data account
pub fn assert_upgrade_authority(
    program_id: &Pubkey,
    program_data: &AccountInfo,
    authority: &AccountInfo,
) -> ProgramResult {
    assert_address(program_data, &find_program_data_address(program_id))?;
    assert_owned_by(program_data, &bpf_loader_upgradeable::id())?;

    let upgrade_authority_address = match program_data
        .deserialize_data::<UpgradeableLoaderState>()
        .map_err(|_| ProgramError::InvalidAccountData)?
    {
        UpgradeableLoaderState::ProgramData {
            upgrade_authority_address,
            ..
        } => upgrade_authority_address,
        _ => return Err(ProgramError::InvalidAccountData),
    };

    if upgrade_authority_address != Some(*authority.key) {
        msg!("{} is not the program upgrade authority", authority.key);
        return Err(AuctionError::Unauthorized.into());
    }
    Ok(())
}

/// Unpack an SPL token account, checking it is owned by the token program
pub fn unpack_token_account(account: &AccountInfo) -> Result<TokenAccount, ProgramError> {
    assert_owned_by(account, &spl_token::id())?;
    TokenAccount::unpack(&account.data.borrow())
}

/// Allocate a rent-exempt account at a PDA.
///
/// Anyone can send lamports to a PDA before it is created, so an address that
/// already holds a balance is topped up, allocated and assigned instead.
pub fn create_pda_account<'a>(
    payer: &AccountInfo<'a>,
    new_account: &AccountInfo<'a>,
    system_program: &AccountInfo<'a>,
    space: usize,
    owner: &Pubkey,
    seeds: &[&[u8]],
) -> ProgramResult {
    let required = Rent::get()?.minimum_balance(space);
    let current = new_account.lamports();

    if current == 0 {
        return invoke_signed(
            &system_instruction::create_account(
                payer.key,
                new_account.key,
                required,
                space as u64,
                owner,
            ),
            &[payer.clone(), new_account.clone(), system_program.clone()],
            &[seeds],
        );
    }

    let top_up = required.saturating_sub(current);
    if top_up > 0 {
        invoke(
            &system_instruction::transfer(payer.key, new_account.key, top_up),
            &[payer.clone(), new_account.clone(), system_program.clone()],
        )?;
    }
    invoke_signed(
        &system_instruction::allocate(new_account.key, space as u64),
        &[new_account.clone(), system_program.clone()],
        &[seeds],
    )?;
    invoke_signed(
        &system_instruction::assign(new_account.key, owner),
        &[new_account.clone(), system_program.clone()],
        &[seeds],
    )
}

/// Move `amount` tokens. `signer_seeds` is empty when `authority` signed the
/// transaction itself.
pub fn transfer_tokens<'a>(
    token_program: &AccountInfo<'a>,
    from: &AccountInfo<'a>,
    to: &AccountInfo<'a>,
    authority: &AccountInfo<'a>,
    amount: u64,
    signer_seeds: &[&[&[u8]]],
) -> ProgramResult {
    invoke_signed(
        &spl_token::instruction::transfer(
            token_program.key,
            from.key,
            to.key,
            authority.key,
            &[],
            amount,
        )?,
        &[
            from.clone(),
            to.clone(),
            authority.clone(),
            token_program.clone(),
        ],
        signer_seeds,
    )
}
