#![allow(dead_code)]

use borsh::BorshDeserialize;
use qauction::{
    error::AuctionError,
    instruction,
    state::{
        find_admin_address, find_auction_address, find_proceeds_address,
        find_program_data_address, AdminSettings, Auction,
    },
};
use solana_program_test::{processor, BanksClientError, ProgramTest, ProgramTestContext};
use solana_sdk::{
    account::Account,
    bpf_loader_upgradeable::{self, UpgradeableLoaderState},
    clock::Clock,
    instruction::{Instruction, InstructionError},
    native_token::LAMPORTS_PER_SOL,
    program_pack::Pack,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    system_instruction, system_program,
    transaction::{Transaction, TransactionError},
};
use spl_associated_token_account::get_associated_token_address;

/// Tokens minted to the admin before each auction test
pub const ADMIN_BALANCE: u64 = 100_000;

pub fn program_test(upgrade_authority: &Pubkey) -> ProgramTest {
    let mut program_test = ProgramTest::new(
        "qauction",
        qauction::id(),
        processor!(qauction::processor::process_instruction),
    );

    let program_data = Account::new_data(
        LAMPORTS_PER_SOL,
        &UpgradeableLoaderState::ProgramData {
            slot: 0,
            upgrade_authority_address: Some(*upgrade_authority),
        },
        &bpf_loader_upgradeable::id(),
    )
    .unwrap();
    program_test.add_account(find_program_data_address(&qauction::id()), program_data);
    program_test.add_account(
        *upgrade_authority,
        Account::new(10 * LAMPORTS_PER_SOL, 0, &system_program::id()),
    );
    program_test
}

/// Start a validator where `upgrade_authority` controls the program
pub async fn start() -> (ProgramTestContext, Keypair) {
    let upgrade_authority = Keypair::new();
    let context = program_test(&upgrade_authority.pubkey())
        .start_with_context()
        .await;
    (context, upgrade_authority)
}

pub async fn process_all(
    context: &mut ProgramTestContext,
    instructions: &[Instruction],
    signers: &[&Keypair],
) -> Result<(), BanksClientError> {
    // Fresh blockhash so identical retries are not deduplicated
    let blockhash = context.get_new_latest_blockhash().await.unwrap();
    let mut all_signers = vec![&context.payer];
    all_signers.extend_from_slice(signers);
    let transaction = Transaction::new_signed_with_payer(
        instructions,
        Some(&context.payer.pubkey()),
        all_signers.as_slice(),
        blockhash,
    );
    context.banks_client.process_transaction(transaction).await
}

pub async fn process(
    context: &mut ProgramTestContext,
    instruction: Instruction,
    signers: &[&Keypair],
) -> Result<(), BanksClientError> {
    process_all(context, &[instruction], signers).await
}

pub fn assert_auction_error(result: Result<(), BanksClientError>, expected: AuctionError) {
    let err = result.expect_err("transaction should fail").unwrap();
    assert_eq!(
        err,
        TransactionError::InstructionError(0, InstructionError::Custom(expected as u32))
    );
}

pub async fn now(context: &mut ProgramTestContext) -> i64 {
    let clock: Clock = context.banks_client.get_sysvar().await.unwrap();
    clock.unix_timestamp
}

pub async fn set_clock(context: &mut ProgramTestContext, unix_timestamp: i64) {
    let mut clock: Clock = context.banks_client.get_sysvar().await.unwrap();
    clock.unix_timestamp = unix_timestamp;
    context.set_sysvar(&clock);
}

pub async fn fund(context: &mut ProgramTestContext, to: &Pubkey, lamports: u64) {
    let payer = context.payer.pubkey();
    process(
        context,
        system_instruction::transfer(&payer, to, lamports),
        &[],
    )
    .await
    .unwrap();
}

/// Create a mint whose authority is the test payer
pub async fn create_mint(context: &mut ProgramTestContext) -> Pubkey {
    let mint = Keypair::new();
    let payer = context.payer.pubkey();
    let rent = context.banks_client.get_rent().await.unwrap();
    let instructions = [
        system_instruction::create_account(
            &payer,
            &mint.pubkey(),
            rent.minimum_balance(spl_token::state::Mint::LEN),
            spl_token::state::Mint::LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_mint(&spl_token::id(), &mint.pubkey(), &payer, None, 0)
            .unwrap(),
    ];
    process_all(context, &instructions, &[&mint]).await.unwrap();
    mint.pubkey()
}

pub async fn create_ata(context: &mut ProgramTestContext, owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    let payer = context.payer.pubkey();
    process(
        context,
        spl_associated_token_account::instruction::create_associated_token_account(
            &payer,
            owner,
            mint,
            &spl_token::id(),
        ),
        &[],
    )
    .await
    .unwrap();
    get_associated_token_address(owner, mint)
}

/// Create a token account at a random address (not the associated one)
pub async fn create_token_account(
    context: &mut ProgramTestContext,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Pubkey {
    let account = Keypair::new();
    let payer = context.payer.pubkey();
    let rent = context.banks_client.get_rent().await.unwrap();
    let instructions = [
        system_instruction::create_account(
            &payer,
            &account.pubkey(),
            rent.minimum_balance(spl_token::state::Account::LEN),
            spl_token::state::Account::LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_account3(
            &spl_token::id(),
            &account.pubkey(),
            mint,
            owner,
        )
        .unwrap(),
    ];
    process_all(context, &instructions, &[&account]).await.unwrap();
    account.pubkey()
}

pub async fn mint_to(context: &mut ProgramTestContext, mint: &Pubkey, to: &Pubkey, amount: u64) {
    let payer = context.payer.pubkey();
    process(
        context,
        spl_token::instruction::mint_to(&spl_token::id(), mint, to, &payer, &[], amount).unwrap(),
        &[],
    )
    .await
    .unwrap();
}

/// Close an emptied token account, returning its rent to the owner
pub async fn close_token_account(context: &mut ProgramTestContext, account: &Pubkey, owner: &Keypair) {
    process(
        context,
        spl_token::instruction::close_account(
            &spl_token::id(),
            account,
            &owner.pubkey(),
            &owner.pubkey(),
            &[],
        )
        .unwrap(),
        &[owner],
    )
    .await
    .unwrap();
}

pub async fn account_exists(context: &mut ProgramTestContext, address: &Pubkey) -> bool {
    context
        .banks_client
        .get_account(*address)
        .await
        .unwrap()
        .is_some()
}

pub async fn token_balance(context: &mut ProgramTestContext, address: &Pubkey) -> u64 {
    let account = context
        .banks_client
        .get_account(*address)
        .await
        .unwrap()
        .expect("token account exists");
    spl_token::state::Account::unpack(&account.data).unwrap().amount
}

pub async fn admin_settings(context: &mut ProgramTestContext) -> AdminSettings {
    let (address, _) = find_admin_address(&qauction::id());
    let account = context
        .banks_client
        .get_account(address)
        .await
        .unwrap()
        .expect("admin registry exists");
    AdminSettings::deserialize(&mut &account.data[..]).unwrap()
}

pub async fn auction(context: &mut ProgramTestContext, name: &str) -> Auction {
    let (address, _) = find_auction_address(&qauction::id(), name);
    let account = context
        .banks_client
        .get_account(address)
        .await
        .unwrap()
        .expect("auction exists");
    Auction::deserialize(&mut &account.data[..]).unwrap()
}

pub fn proceeds_address(name: &str) -> Pubkey {
    let (auction, _) = find_auction_address(&qauction::id(), name);
    find_proceeds_address(&qauction::id(), &auction).0
}

pub async fn escrow_balance(context: &mut ProgramTestContext, name: &str) -> u64 {
    token_balance(context, &proceeds_address(name)).await
}

/// A started validator with a registered admin holding `ADMIN_BALANCE` tokens
pub struct AuctionTest {
    pub context: ProgramTestContext,
    pub upgrade_authority: Keypair,
    pub admin: Keypair,
    pub mint: Pubkey,
    pub admin_token: Pubkey,
}

pub struct Bidder {
    pub keypair: Keypair,
    pub token: Pubkey,
}

impl Bidder {
    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

impl AuctionTest {
    pub async fn new() -> Self {
        let (mut context, upgrade_authority) = start().await;

        let admin = Keypair::new();
        process(
            &mut context,
            instruction::init_admin(&qauction::id(), &upgrade_authority.pubkey(), admin.pubkey())
                .unwrap(),
            &[&upgrade_authority],
        )
        .await
        .unwrap();
        fund(&mut context, &admin.pubkey(), LAMPORTS_PER_SOL).await;

        let mint = create_mint(&mut context).await;
        let admin_token = create_ata(&mut context, &admin.pubkey(), &mint).await;
        mint_to(&mut context, &mint, &admin_token, ADMIN_BALANCE).await;

        Self {
            context,
            upgrade_authority,
            admin,
            mint,
            admin_token,
        }
    }

    /// A funded bidder with an associated token account holding `balance`
    pub async fn bidder(&mut self, balance: u64) -> Bidder {
        let keypair = Keypair::new();
        fund(&mut self.context, &keypair.pubkey(), LAMPORTS_PER_SOL).await;
        let token = create_ata(&mut self.context, &keypair.pubkey(), &self.mint).await;
        mint_to(&mut self.context, &self.mint, &token, balance).await;
        Bidder { keypair, token }
    }

    pub async fn initialize(
        &mut self,
        name: &str,
        amount: u64,
        price_increment: u64,
        start_timestamp: i64,
        end_timestamp: i64,
    ) -> Result<(), BanksClientError> {
        let ix = instruction::initialize(
            &qauction::id(),
            &self.admin.pubkey(),
            &self.admin_token,
            &self.mint,
            name,
            amount,
            price_increment,
            start_timestamp,
            end_timestamp,
        )
        .unwrap();
        process(&mut self.context, ix, &[&self.admin]).await
    }

    /// Bid from the bidder's associated token account against the current leader
    pub async fn bid(
        &mut self,
        name: &str,
        bidder: &Bidder,
        amount: u64,
    ) -> Result<(), BanksClientError> {
        let leader_token = auction(&mut self.context, name).await.leader_token_account;
        let ix = instruction::bid(
            &qauction::id(),
            &bidder.pubkey(),
            name,
            &self.mint,
            &leader_token,
            amount,
        )
        .unwrap();
        process(&mut self.context, ix, &[&bidder.keypair]).await
    }

    pub async fn close(&mut self, name: &str) -> Result<(), BanksClientError> {
        let ix = instruction::close(
            &qauction::id(),
            &self.admin.pubkey(),
            name,
            &self.admin_token,
        )
        .unwrap();
        process(&mut self.context, ix, &[&self.admin]).await
    }

    pub async fn set_clock(&mut self, unix_timestamp: i64) {
        set_clock(&mut self.context, unix_timestamp).await;
    }

    pub async fn now(&mut self) -> i64 {
        now(&mut self.context).await
    }
}
