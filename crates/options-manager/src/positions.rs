//! Position management: validated create, adjust, delete and list.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use calendar_core::{CalendarLeg, OptionClass, Position, PositionStore, CALL_LEG, PUT_LEG};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("ticker is required")]
    MissingTicker,

    #[error("{leg}: {field} must be greater than zero")]
    NonPositive { leg: String, field: &'static str },

    #[error("{leg}: alert target cannot be negative")]
    NegativeTarget { leg: String },

    #[error("front expiration {front} must be before back expiration {back}")]
    ExpirationOrder { front: NaiveDate, back: NaiveDate },

    #[error("no position for ticker {0}")]
    UnknownTicker(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Entry data of one calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLeg {
    pub strike: Decimal,
    pub td_price_front: Decimal,
    pub td_price_back: Decimal,
    #[serde(default)]
    pub alert_target: Decimal,
}

impl NewLeg {
    fn validate(&self, leg: &str) -> Result<(), PositionError> {
        for (field, value) in [
            ("strike", self.strike),
            ("front price", self.td_price_front),
            ("back price", self.td_price_back),
        ] {
            if value <= Decimal::ZERO {
                return Err(PositionError::NonPositive {
                    leg: leg.to_string(),
                    field,
                });
            }
        }
        if self.alert_target < Decimal::ZERO {
            return Err(PositionError::NegativeTarget {
                leg: leg.to_string(),
            });
        }
        Ok(())
    }

    fn into_leg(self, name: impl Into<String>, class: OptionClass) -> CalendarLeg {
        CalendarLeg::new(
            name,
            class,
            self.strike,
            self.td_price_front,
            self.td_price_back,
            self.alert_target,
        )
    }
}

/// Entry data of a double calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPosition {
    pub ticker: String,
    pub front_expiration: NaiveDate,
    pub back_expiration: NaiveDate,
    pub put: NewLeg,
    pub call: NewLeg,
}

impl NewPosition {
    /// Checks every field and builds the position with both legs armed.
    ///
    /// # Errors
    /// Returns the first validation failure.
    pub fn build(self) -> Result<Position, PositionError> {
        if self.ticker.trim().is_empty() {
            return Err(PositionError::MissingTicker);
        }
        if self.front_expiration >= self.back_expiration {
            return Err(PositionError::ExpirationOrder {
                front: self.front_expiration,
                back: self.back_expiration,
            });
        }
        self.put.validate(PUT_LEG)?;
        self.call.validate(CALL_LEG)?;

        Ok(Position::new(
            &self.ticker,
            self.front_expiration,
            self.back_expiration,
            self.put.into_leg(PUT_LEG, OptionClass::Put),
            self.call.into_leg(CALL_LEG, OptionClass::Call),
        ))
    }
}

/// CRUD over a [`PositionStore`] with input validation.
#[derive(Clone)]
pub struct PositionManager {
    store: Arc<dyn PositionStore>,
}

impl PositionManager {
    pub fn new(store: Arc<dyn PositionStore>) -> Self {
        Self { store }
    }

    /// Creates a position, replacing any existing one with the same ticker.
    ///
    /// # Errors
    /// Returns a validation error or a store failure.
    pub async fn create(&self, new: NewPosition) -> Result<Position, PositionError> {
        let mut position = new.build()?;
        if let Some(existing) = self
            .store
            .list()
            .await
            .context("Failed to load positions")?
            .get(&position.ticker)
        {
            position.revision = existing.revision.wrapping_add(1);
        }
        self.store
            .upsert(&position.ticker, &position)
            .await
            .context("Failed to save position")?;

        info!(
            ticker = %position.ticker,
            front = %position.front_expiration,
            back = %position.back_expiration,
            fad = %position.final_adjustment_date,
            "Position saved"
        );
        Ok(position)
    }

    /// Appends an adjustment calendar named `ADJn`.
    ///
    /// # Errors
    /// Returns a validation error, an unknown ticker, or a store failure.
    pub async fn add_adjustment(
        &self,
        ticker: &str,
        class: OptionClass,
        leg: NewLeg,
    ) -> Result<Position, PositionError> {
        let ticker = normalize(ticker);
        let mut position = self
            .store
            .list()
            .await
            .context("Failed to load positions")?
            .remove(&ticker)
            .ok_or_else(|| PositionError::UnknownTicker(ticker.clone()))?;

        let name = position.next_adjustment_name();
        leg.validate(&name)?;
        position.adjustments.push(leg.into_leg(name.clone(), class));
        position.revision = position.revision.wrapping_add(1);

        self.store
            .upsert(&ticker, &position)
            .await
            .context("Failed to save position")?;

        info!(ticker = %ticker, leg = %name, class = %class, "Adjustment added");
        Ok(position)
    }

    /// Removes a position with its legs and history. Returns whether it existed.
    ///
    /// # Errors
    /// Returns a store failure.
    pub async fn delete(&self, ticker: &str) -> Result<bool, PositionError> {
        let ticker = normalize(ticker);
        let existed = self
            .store
            .list()
            .await
            .context("Failed to load positions")?
            .contains_key(&ticker);

        if existed {
            self.store
                .delete(&ticker)
                .await
                .context("Failed to delete position")?;
            info!(ticker = %ticker, "Position deleted");
        }
        Ok(existed)
    }

    /// All positions ordered by ticker.
    ///
    /// # Errors
    /// Returns a store failure.
    pub async fn list(&self) -> Result<BTreeMap<String, Position>, PositionError> {
        Ok(self
            .store
            .list()
            .await
            .context("Failed to load positions")?)
    }
}

fn normalize(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use calendar_core::AlertState;
    use calendar_data::JsonFileStore;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn leg(strike: Decimal, target: Decimal) -> NewLeg {
        NewLeg {
            strike,
            td_price_front: dec!(1.2),
            td_price_back: dec!(2.1),
            alert_target: target,
        }
    }

    fn new_position(ticker: &str) -> NewPosition {
        NewPosition {
            ticker: ticker.to_string(),
            front_expiration: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            back_expiration: NaiveDate::from_ymd_opt(2024, 4, 19).unwrap(),
            put: leg(dec!(35.5), dec!(20)),
            call: leg(dec!(38), Decimal::ZERO),
        }
    }

    fn manager() -> (TempDir, PositionManager) {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("positions.json"));
        (dir, PositionManager::new(Arc::new(store)))
    }

    #[test]
    fn build_normalizes_ticker_and_derives_fad() {
        let pos = new_position("  petr4 ").build().unwrap();
        assert_eq!(pos.ticker, "PETR4");
        assert_eq!(
            pos.final_adjustment_date,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_eq!(pos.put.alert, AlertState::Armed);
        assert!(pos.history.legs.is_empty());
    }

    #[test]
    fn build_rejects_invalid_input() {
        assert!(matches!(
            new_position("   ").build(),
            Err(PositionError::MissingTicker)
        ));

        let mut order = new_position("PETR4");
        order.back_expiration = order.front_expiration;
        assert!(matches!(order.build(), Err(PositionError::ExpirationOrder { .. })));

        let mut price = new_position("PETR4");
        price.call.td_price_back = Decimal::ZERO;
        assert!(matches!(
            price.build(),
            Err(PositionError::NonPositive { field: "back price", .. })
        ));

        let mut target = new_position("PETR4");
        target.put.alert_target = dec!(-1);
        assert!(matches!(target.build(), Err(PositionError::NegativeTarget { .. })));
    }

    #[tokio::test]
    async fn create_then_adjust_then_delete() {
        let (_dir, manager) = manager();
        manager.create(new_position("petr4")).await.unwrap();

        let pos = manager
            .add_adjustment("PETR4", OptionClass::Call, leg(dec!(40), dec!(15)))
            .await
            .unwrap();
        assert_eq!(pos.adjustments[0].name, "ADJ1");

        let pos = manager
            .add_adjustment("petr4", OptionClass::Put, leg(dec!(33), Decimal::ZERO))
            .await
            .unwrap();
        assert_eq!(pos.adjustments[1].name, "ADJ2");
        assert_eq!(pos.revision, 2);

        let listed = manager.list().await.unwrap();
        assert_eq!(listed["PETR4"].adjustments.len(), 2);

        assert!(manager.delete("PETR4").await.unwrap());
        assert!(!manager.delete("PETR4").await.unwrap());
        assert!(manager.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_replaces_existing_ticker() {
        let (_dir, manager) = manager();
        manager.create(new_position("PETR4")).await.unwrap();
        manager
            .add_adjustment("PETR4", OptionClass::Call, leg(dec!(40), dec!(15)))
            .await
            .unwrap();

        manager.create(new_position("PETR4")).await.unwrap();
        let listed = manager.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed["PETR4"].adjustments.is_empty());
        assert_eq!(listed["PETR4"].revision, 2);
    }

    #[tokio::test]
    async fn adjust_unknown_ticker_fails() {
        let (_dir, manager) = manager();
        let err = manager
            .add_adjustment("NOPE3", OptionClass::Put, leg(dec!(10), Decimal::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, PositionError::UnknownTicker(t) if t == "NOPE3"));
    }

    #[tokio::test]
    async fn list_is_ordered_by_ticker() {
        let (_dir, manager) = manager();
        for t in ["VALE3", "ABEV3", "PETR4"] {
            manager.create(new_position(t)).await.unwrap();
        }
        let tickers: Vec<_> = manager.list().await.unwrap().into_keys().collect();
        assert_eq!(tickers, vec!["ABEV3", "PETR4", "VALE3"]);
    }
}
