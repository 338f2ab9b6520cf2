//! Position management commands: `list`, `add`, `adjust`, `remove`.

use anyhow::Result;
use calendar_core::{OptionClass, Position};
use calendar_manager::{NewLeg, NewPosition, PositionManager};
use chrono::{Local, NaiveDate};
use clap::Args;
use rust_decimal::Decimal;

/// Arguments for the add command.
#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Underlying ticker (e.g., "PETR4")
    #[arg(long)]
    pub ticker: String,

    /// Front (short) expiration, YYYY-MM-DD
    #[arg(long)]
    pub front: NaiveDate,

    /// Back (long) expiration, YYYY-MM-DD
    #[arg(long)]
    pub back: NaiveDate,

    #[arg(long)]
    pub put_strike: Decimal,
    /// Entry price of the short front put
    #[arg(long)]
    pub put_front: Decimal,
    /// Entry price of the long back put
    #[arg(long)]
    pub put_back: Decimal,
    /// Profit alert target in percent (0 disables)
    #[arg(long, default_value = "0")]
    pub put_target: Decimal,

    #[arg(long)]
    pub call_strike: Decimal,
    /// Entry price of the short front call
    #[arg(long)]
    pub call_front: Decimal,
    /// Entry price of the long back call
    #[arg(long)]
    pub call_back: Decimal,
    /// Profit alert target in percent (0 disables)
    #[arg(long, default_value = "0")]
    pub call_target: Decimal,
}

impl From<AddArgs> for NewPosition {
    fn from(args: AddArgs) -> Self {
        Self {
            ticker: args.ticker,
            front_expiration: args.front,
            back_expiration: args.back,
            put: NewLeg {
                strike: args.put_strike,
                td_price_front: args.put_front,
                td_price_back: args.put_back,
                alert_target: args.put_target,
            },
            call: NewLeg {
                strike: args.call_strike,
                td_price_front: args.call_front,
                td_price_back: args.call_back,
                alert_target: args.call_target,
            },
        }
    }
}

/// Arguments for the adjust command.
#[derive(Args, Debug, Clone)]
pub struct AdjustArgs {
    /// Ticker of an existing position
    pub ticker: String,

    /// Option class of the new calendar: put or call
    #[arg(long)]
    pub class: OptionClass,

    #[arg(long)]
    pub strike: Decimal,

    /// Entry price of the short front option
    #[arg(long)]
    pub front_price: Decimal,

    /// Entry price of the long back option
    #[arg(long)]
    pub back_price: Decimal,

    /// Profit alert target in percent (0 disables)
    #[arg(long, default_value = "0")]
    pub target: Decimal,
}

fn describe(position: &Position) -> String {
    let today = Local::now().date_naive();
    let mut line = format!(
        "{:<8} {} -> {}  FAD {} ({} days)",
        position.ticker,
        position.front_expiration,
        position.back_expiration,
        position.final_adjustment_date,
        position.days_to_fad(today)
    );
    for leg in position.legs() {
        line.push_str(&format!(
            "\n         {:<10} K {:.2}  entry {:.2}/{:.2}  target {:.2}%",
            leg.display_name(),
            leg.strike,
            leg.td_price_front,
            leg.td_price_back,
            leg.alert_target
        ));
    }
    line
}

/// Prints every registered position.
///
/// # Errors
/// Returns an error if the store cannot be read.
pub async fn run_list(manager: &PositionManager) -> Result<()> {
    let positions = manager.list().await?;
    if positions.is_empty() {
        println!("No positions registered.");
        return Ok(());
    }
    for position in positions.values() {
        println!("{}", describe(position));
    }
    Ok(())
}

/// Registers a double calendar, replacing any position with the same ticker.
///
/// # Errors
/// Returns a validation or store error.
pub async fn run_add(manager: &PositionManager, args: AddArgs) -> Result<()> {
    let position = manager.create(args.into()).await?;
    println!("Saved {}", describe(&position));
    Ok(())
}

/// Appends an adjustment calendar to a position.
///
/// # Errors
/// Returns a validation error, an unknown ticker, or a store error.
pub async fn run_adjust(manager: &PositionManager, args: AdjustArgs) -> Result<()> {
    let leg = NewLeg {
        strike: args.strike,
        td_price_front: args.front_price,
        td_price_back: args.back_price,
        alert_target: args.target,
    };
    let position = manager.add_adjustment(&args.ticker, args.class, leg).await?;
    println!("Adjusted {}", describe(&position));
    Ok(())
}

/// Deletes a position with its history.
///
/// # Errors
/// Returns a store error.
pub async fn run_remove(manager: &PositionManager, ticker: &str) -> Result<()> {
    if manager.delete(ticker).await? {
        println!("Removed {}", ticker.trim().to_uppercase());
    } else {
        println!("No position for {}", ticker.trim().to_uppercase());
    }
    Ok(())
}
