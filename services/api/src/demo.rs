use crate::infra::{encode_word, DevelopmentOracle, InMemoryAuditLog};
use clap::Args;
use credit_ledger::error::AppError;
use credit_ledger::ledger::{
    ApplicationId, AuditRecord, CreditMarketplace, EncryptedAttributes, Identity, LedgerError,
    OfferPolicy,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Offer amount in the smallest currency unit
    #[arg(long, default_value_t = 1_000_000)]
    pub(crate) amount: u128,
    /// Minimum qualifying score for the demo offer
    #[arg(long, default_value_t = 650)]
    pub(crate) min_score: u16,
    /// Interest rate in basis points
    #[arg(long, default_value_t = 500)]
    pub(crate) interest_rate_bps: u16,
    /// Print audit records as JSON lines instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

struct Borrower {
    identity: Identity,
    fields: EncryptedAttributes,
}

fn identity(raw: &str) -> Result<Identity, AppError> {
    Ok(Identity::parse(raw)?)
}

fn borrower(
    raw: &str,
    income: u32,
    debt: u32,
    payment_history: u32,
    utilization: u32,
) -> Result<Borrower, AppError> {
    Ok(Borrower {
        identity: identity(raw)?,
        fields: EncryptedAttributes {
            income: encode_word(income),
            debt: encode_word(debt),
            payment_history: encode_word(payment_history),
            utilization: encode_word(utilization),
        },
    })
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        amount,
        min_score,
        interest_rate_bps,
        json,
    } = args;

    let owner = identity("owner")?;
    let lender = identity("0xLenderA")?;
    let strong = borrower("0xUserX", 85_000, 12_000, 92, 20)?;
    let weak = borrower("0xUserY", 30_000, 27_000, 35, 90)?;

    let audit = Arc::new(InMemoryAuditLog::default());
    let marketplace = CreditMarketplace::new(
        owner.clone(),
        OfferPolicy::default(),
        Arc::new(DevelopmentOracle),
        audit.clone(),
    );

    println!("Confidential credit ledger demo");

    marketplace.register_evaluator(&owner, lender.clone())?;
    let offer_id = marketplace.create_offer(lender.clone(), amount, min_score, interest_rate_bps)?;
    let offer = marketplace.get_offer(offer_id)?.view();
    println!(
        "\nOffer #{} by {}: amount {}, min score {} ({}), rate {}",
        offer.offer_id,
        offer.lender,
        offer.amount,
        offer.min_score,
        offer.score_tier,
        offer.interest_rate_percent
    );
    println!("Active offers: {:?}", ids(&marketplace.list_active_offers()?));

    println!("\nScenario A: qualifying borrower applies and is approved");
    marketplace.submit_attributes(strong.identity.clone(), strong.fields.clone())?;
    print_score(&strong);
    let application_id = marketplace.apply_for_loan(offer_id, strong.identity.clone())?;
    let pending = marketplace.get_application(application_id)?;
    println!(
        "  application #{} recorded as {}",
        application_id,
        pending.status.label()
    );
    marketplace.approve_loan(application_id, &lender)?;
    let approved = marketplace.get_application(application_id)?;
    println!(
        "  application #{} is now {}",
        application_id,
        approved.status.label()
    );
    println!("  active offers: {:?}", ids(&marketplace.list_active_offers()?));

    println!("\nScenario B: borrower below the threshold is refused");
    let fresh_offer =
        marketplace.create_offer(lender.clone(), amount, min_score, interest_rate_bps)?;
    marketplace.submit_attributes(weak.identity.clone(), weak.fields.clone())?;
    print_score(&weak);
    report_refusal(marketplace.apply_for_loan(fresh_offer, weak.identity.clone()));
    println!(
        "  applications on file for {}: {}",
        weak.identity,
        marketplace.applications_by_applicant(&weak.identity)?.len()
    );

    println!("\nScenario C: approving an unknown application");
    report_refusal(marketplace.approve_loan(ApplicationId(999), &lender));

    let summary = marketplace.lender_summary(&lender)?;
    println!(
        "\nLender {}: {} offers, {} active, {} outstanding",
        summary.lender, summary.total_offers, summary.active_offers, summary.active_amount
    );

    println!("\nAudit trail");
    for record in audit.latest(usize::MAX) {
        print_record(&record, json)?;
    }

    Ok(())
}

fn ids<T: std::fmt::Display>(values: &[T]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

fn print_score(borrower: &Borrower) {
    match DevelopmentOracle::score(&borrower.fields) {
        Ok(score) => println!("  {} submitted attributes (demo score {score})", borrower.identity),
        Err(err) => println!("  {} submitted attributes ({err})", borrower.identity),
    }
}

fn report_refusal<T>(outcome: Result<T, LedgerError>) {
    match outcome {
        Ok(_) => println!("  unexpectedly accepted"),
        Err(err) => println!("  refused: {err} [{}]", err.kind()),
    }
}

fn print_record(record: &AuditRecord, json: bool) -> Result<(), AppError> {
    if json {
        let line = serde_json::to_string(record).map_err(std::io::Error::from)?;
        println!("{line}");
    } else {
        println!(
            "  #{:<3} {} {}",
            record.sequence,
            record.recorded_at.format("%H:%M:%S%.3f"),
            record.event.name()
        );
    }
    Ok(())
}
