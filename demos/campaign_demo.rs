//! Runs the create, approve, reward and claim workflow against the in-memory ledger.
//!
//! `cargo run --example campaign_demo -- --amount 10000 --reward 0.01`

use clap::Parser;
use task_campaign_client::{
    campaign_reward_steps, claim_step, format_balance, parse_amount, ChainMetadata, ClientConfig,
    IdentityResolver, MockChain, NoncePolicy, Orchestrator, PhraseIdentityResolver,
};
use tracing::info;

const CREATOR_PHRASE: &str =
    "speak sentence monster because comfort feature puppy area team piece plug field";
const ROOT_PHRASE: &str =
    "fish dash budget stairs hire reason mention forest census copper kid away";

#[derive(Parser)]
#[command(about = "Campaign workflow demo")]
struct Args {
    /// Node endpoint
    #[arg(long, default_value = "ws://127.0.0.1:9944")]
    endpoint: String,

    /// Campaign funding, in whole tokens
    #[arg(long, default_value = "10000")]
    amount: String,

    /// Reward per recipient, in whole tokens
    #[arg(long, default_value = "0.01")]
    reward: String,

    /// Campaign creator phrase
    #[arg(long, default_value = CREATOR_PHRASE)]
    creator: String,

    /// Sudo key phrase
    #[arg(long, default_value = ROOT_PHRASE)]
    root: String,

    /// Recipient phrases or dev URIs
    #[arg(long = "recipient", default_values_t = ["//Dave".to_string(), "//Eve".to_string()])]
    recipients: Vec<String>,

    /// SS58 prefix for derived addresses
    #[arg(long, default_value_t = 42)]
    ss58_prefix: u16,

    /// Use the local nonce counter instead of re-querying the chain
    #[arg(long)]
    local_nonce: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let policy = if args.local_nonce {
        NoncePolicy::LocalIncrement
    } else {
        NoncePolicy::Requery
    };
    let config = ClientConfig::new(&args.endpoint)
        .with_ss58_prefix(args.ss58_prefix)
        .with_nonce_policy(policy);
    config.validate()?;
    let resolver = PhraseIdentityResolver::from_config(&config);
    let creator = resolver.derive_identity(&args.creator)?;
    let root = resolver.derive_identity(&args.root)?;
    let recipients = args
        .recipients
        .iter()
        .map(|phrase| resolver.derive_identity(phrase))
        .collect::<Result<Vec<_>, _>>()?;

    let chain = MockChain::new(ChainMetadata {
        token_symbol: "UNIT".to_string(),
        decimals: 6,
    })
    .with_sudo(&root);

    let mut orchestrator = Orchestrator::connect(chain.clone(), &config).await?;
    let metadata = orchestrator.metadata().clone();
    let exponent = metadata.decimals as i64;

    let amount = u128::try_from(parse_amount(&args.amount, exponent)?)?;
    let reward = u128::try_from(parse_amount(&args.reward, exponent)?)?;
    chain.fund(creator.address(), amount.saturating_mul(2));

    let balance = orchestrator.account_balance(creator.address()).await?;
    info!(creator = %creator, %balance, "creator funded");

    let steps = campaign_reward_steps(
        &creator,
        &root,
        amount,
        recipients.iter().map(|r| r.address().to_string()).collect(),
        reward,
    );
    let result = orchestrator
        .run_sequence_with(steps, |step, status| info!(step, %status, "status"))
        .await?;
    let campaign = result
        .campaign_index(1)
        .ok_or("createCampaign step reported no campaign")?;
    info!(campaign, "campaign rewarded");

    for recipient in &recipients {
        let claimable = orchestrator.claimable_balance(recipient.address()).await?;
        let formatted = format_balance(&claimable.amount.into(), &metadata)?;
        info!(
            recipient = %recipient,
            claimable = %formatted,
            last_block = claimable.last_block,
            "reward credited"
        );
    }

    let first = recipients.first().ok_or("no recipients given")?;
    let half = reward / 2;
    orchestrator
        .run_sequence(vec![claim_step(&root, campaign, half, first.address())])
        .await?;
    let balance = orchestrator.account_balance(first.address()).await?;
    info!(recipient = %first, %balance, "claimed");
    Ok(())
}
