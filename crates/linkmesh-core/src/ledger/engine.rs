use crate::error::{MeshError, Result};
use crate::ledger::LedgerConfig;
use crate::storage::Store;
use crate::types::{LedgerAccount, LinkId, PageId, Transaction, TxnKind, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// The credit ledger. Every mutation is a read-modify-write committed
/// through the store's compare-and-swap primitive together with exactly
/// one appended transaction; concurrent writers retry against the fresh
/// account state, so a balance can never be spent twice.
pub struct LedgerEngine<S: Store> {
    store: Arc<S>,
    config: LedgerConfig,
}

impl<S: Store> LedgerEngine<S> {
    pub fn new(store: Arc<S>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Current account state; a zero account for users with no activity
    /// yet (accounts are lazy — nothing is persisted until the first
    /// economic event).
    pub fn account(&self, user: UserId) -> Result<LedgerAccount> {
        Ok(self
            .store
            .get_account(user)?
            .unwrap_or_else(|| LedgerAccount::new(user)))
    }

    /// Spendable balance.
    pub fn balance(&self, user: UserId) -> Result<Decimal> {
        Ok(self.account(user)?.balance)
    }

    /// Full transaction history, oldest first.
    pub fn history(&self, user: UserId) -> Result<Vec<Transaction>> {
        self.store.transactions_for(user)
    }

    /// Debit spendable credits. Fails with `InsufficientCredits` (and no
    /// mutation) when the balance cannot cover the amount.
    pub fn spend(
        &self,
        user: UserId,
        amount: Decimal,
        reason: &str,
        related_page: Option<PageId>,
    ) -> Result<LedgerAccount> {
        require_positive(amount)?;
        self.commit(user, |account| {
            if account.balance < amount {
                return Err(MeshError::InsufficientCredits {
                    required: amount,
                    available: account.balance,
                });
            }
            let mut updated = account.clone();
            updated.balance -= amount;
            updated.lifetime_spent += amount;
            let mut txn =
                Transaction::new(user, TxnKind::Spent, -amount, updated.balance, reason);
            txn.related_page = related_page;
            Ok((updated, txn))
        })
    }

    /// Credit spendable balance directly (immediate award).
    pub fn award(&self, user: UserId, amount: Decimal, reason: &str) -> Result<LedgerAccount> {
        require_positive(amount)?;
        self.commit(user, |account| {
            let mut updated = account.clone();
            updated.balance += amount;
            updated.lifetime_earned += amount;
            updated.last_earned_at = Some(Utc::now());
            let txn = Transaction::new(user, TxnKind::Earned, amount, updated.balance, reason);
            Ok((updated, txn))
        })
    }

    /// Direct grant outside the earn flow (signup credit, goodwill).
    pub fn award_bonus(&self, user: UserId, amount: Decimal, reason: &str) -> Result<LedgerAccount> {
        require_positive(amount)?;
        self.commit(user, |account| {
            let mut updated = account.clone();
            updated.balance += amount;
            let txn = Transaction::new(user, TxnKind::Bonus, amount, updated.balance, reason);
            Ok((updated, txn))
        })
    }

    /// Saga compensation: return a debit to the payer. Reverses the
    /// lifetime-spent counter too, so the books read as if the aborted
    /// exchange never happened.
    pub fn refund(
        &self,
        user: UserId,
        amount: Decimal,
        reason: &str,
        related_page: Option<PageId>,
    ) -> Result<LedgerAccount> {
        require_positive(amount)?;
        self.commit(user, |account| {
            let mut updated = account.clone();
            updated.balance += amount;
            updated.lifetime_spent = (updated.lifetime_spent - amount).max(Decimal::ZERO);
            let mut txn = Transaction::new(user, TxnKind::Bonus, amount, updated.balance, reason);
            txn.related_page = related_page;
            Ok((updated, txn))
        })
    }

    /// Credit the held pool. Not spendable until the maintenance job
    /// converts it after the pending window.
    pub fn award_pending(
        &self,
        user: UserId,
        amount: Decimal,
        reason: &str,
        related_link: LinkId,
    ) -> Result<LedgerAccount> {
        require_positive(amount)?;
        self.commit(user, |account| {
            let mut updated = account.clone();
            updated.pending += amount;
            let mut txn =
                Transaction::new(user, TxnKind::Pending, amount, updated.balance, reason);
            txn.related_link = Some(related_link);
            Ok((updated, txn))
        })
    }

    /// Release held credits into the spendable balance after the link
    /// survived its pending window.
    pub fn convert_pending(
        &self,
        user: UserId,
        amount: Decimal,
        reason: &str,
        related_link: LinkId,
    ) -> Result<LedgerAccount> {
        require_positive(amount)?;
        self.commit(user, |account| {
            let mut updated = account.clone();
            updated.pending = (updated.pending - amount).max(Decimal::ZERO);
            updated.balance += amount;
            updated.lifetime_earned += amount;
            updated.last_earned_at = Some(Utc::now());
            let mut txn = Transaction::new(user, TxnKind::Earned, amount, updated.balance, reason);
            txn.related_link = Some(related_link);
            Ok((updated, txn))
        })
    }

    /// Reverse held credits for a link that died inside the window.
    /// Clamped at zero; the pending pool never goes negative.
    pub fn clawback(
        &self,
        user: UserId,
        amount: Decimal,
        reason: &str,
        related_link: LinkId,
    ) -> Result<LedgerAccount> {
        require_positive(amount)?;
        self.commit(user, |account| {
            let mut updated = account.clone();
            updated.pending = (updated.pending - amount).max(Decimal::ZERO);
            let mut txn =
                Transaction::new(user, TxnKind::Clawback, -amount, updated.balance, reason);
            txn.related_link = Some(related_link);
            Ok((updated, txn))
        })
    }

    /// Charge idle decay if due: `monthly_decay_rate` per idle month
    /// since the user last earned (or was last decayed), capped at
    /// `max_decay_fraction` of the balance in a single event. Returns
    /// `None` when nothing is due.
    pub fn apply_decay(&self, user: UserId, now: DateTime<Utc>) -> Result<Option<Transaction>> {
        let account = match self.store.get_account(user)? {
            Some(a) => a,
            None => return Ok(None),
        };
        if account.balance <= Decimal::ZERO {
            return Ok(None);
        }

        let idle_since = match (account.last_earned_at, account.last_decay_at) {
            (Some(e), Some(d)) => e.max(d),
            (Some(e), None) => e,
            (None, Some(d)) => d,
            (None, None) => account.created_at,
        };
        let idle_months = (now - idle_since).num_days() / 30;
        if idle_months < 1 {
            return Ok(None);
        }

        let rate = (self.config.monthly_decay_rate * Decimal::from(idle_months))
            .min(self.config.max_decay_fraction);
        let amount = (account.balance * rate).round_dp(2);
        if amount <= Decimal::ZERO {
            return Ok(None);
        }

        let (_, txn) = self.commit(user, |account| {
            let mut updated = account.clone();
            updated.balance = (updated.balance - amount).max(Decimal::ZERO);
            updated.last_decay_at = Some(now);
            let txn = Transaction::new(
                user,
                TxnKind::Decay,
                -amount,
                updated.balance,
                format!("inactivity decay: {} idle months", idle_months),
            );
            Ok((updated, txn))
        })?;
        Ok(Some(txn))
    }

    /// Reconstruct the spendable balance from the transaction log alone.
    /// The log is the source of truth; the account row is a projection.
    pub fn replay(&self, user: UserId) -> Result<Decimal> {
        let mut balance = Decimal::ZERO;
        for txn in self.store.transactions_for(user)? {
            if txn.kind.touches_balance() {
                balance += txn.amount;
            }
        }
        Ok(balance)
    }

    /// Does the projected balance match the log?
    pub fn verify(&self, user: UserId) -> Result<bool> {
        Ok(self.replay(user)? == self.account(user)?.balance)
    }

    /// Optimistic-commit loop: re-read, rebuild, CAS, retry on conflict.
    fn commit<F>(&self, user: UserId, build: F) -> Result<(LedgerAccount, Transaction)>
    where
        F: Fn(&LedgerAccount) -> Result<(LedgerAccount, Transaction)>,
    {
        for _ in 0..self.config.max_commit_retries {
            let current = self.account(user)?;
            let expected = current.version;
            let (mut updated, txn) = build(&current)?;
            updated.version = expected + 1;
            updated.updated_at = Utc::now();

            match self.store.commit_ledger(expected, &updated, &txn) {
                Ok(()) => return Ok((updated, txn)),
                Err(MeshError::VersionConflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(MeshError::VersionConflict(user))
    }
}

fn require_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(MeshError::Validation(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn ledger() -> (LedgerEngine<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (LedgerEngine::new(store.clone(), LedgerConfig::default()), store)
    }

    #[test]
    fn spend_without_funds_fails_cleanly() {
        let (ledger, _store) = ledger();
        let user = Uuid::now_v7();

        let err = ledger.spend(user, dec!(10), "link purchase", None).unwrap_err();
        assert!(matches!(err, MeshError::InsufficientCredits { .. }));

        // No account row, no transaction.
        assert_eq!(ledger.balance(user).unwrap(), Decimal::ZERO);
        assert!(ledger.history(user).unwrap().is_empty());
    }

    #[test]
    fn spend_and_award_round_trip() {
        let (ledger, _store) = ledger();
        let user = Uuid::now_v7();

        ledger.award(user, dec!(30), "test seed").unwrap();
        let after = ledger.spend(user, dec!(12.50), "link purchase", None).unwrap();
        assert_eq!(after.balance, dec!(17.50));
        assert_eq!(after.lifetime_spent, dec!(12.50));
        assert_eq!(after.lifetime_earned, dec!(30));

        let log = ledger.history(user).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].kind, TxnKind::Spent);
        assert_eq!(log[1].amount, dec!(-12.50));
        assert_eq!(log[1].balance_after, dec!(17.50));
    }

    #[test]
    fn pending_is_not_spendable() {
        let (ledger, _store) = ledger();
        let user = Uuid::now_v7();
        let link = Uuid::now_v7();

        ledger.award_pending(user, dec!(15), "link placed", link).unwrap();
        let account = ledger.account(user).unwrap();
        assert_eq!(account.pending, dec!(15));
        assert_eq!(account.balance, Decimal::ZERO);
        assert_eq!(account.lifetime_earned, Decimal::ZERO);

        let err = ledger.spend(user, dec!(5), "too early", None).unwrap_err();
        assert!(matches!(err, MeshError::InsufficientCredits { .. }));
    }

    #[test]
    fn conversion_moves_pending_into_balance() {
        let (ledger, _store) = ledger();
        let user = Uuid::now_v7();
        let link = Uuid::now_v7();

        ledger.award_pending(user, dec!(15), "link placed", link).unwrap();
        let after = ledger
            .convert_pending(user, dec!(15), "hold window passed", link)
            .unwrap();

        assert_eq!(after.balance, dec!(15));
        assert_eq!(after.pending, Decimal::ZERO);
        assert_eq!(after.lifetime_earned, dec!(15));
        assert!(after.last_earned_at.is_some());
    }

    #[test]
    fn clawback_clamps_at_zero() {
        let (ledger, _store) = ledger();
        let user = Uuid::now_v7();
        let link = Uuid::now_v7();

        ledger.award_pending(user, dec!(10), "link placed", link).unwrap();
        let after = ledger.clawback(user, dec!(25), "link removed", link).unwrap();
        assert_eq!(after.pending, Decimal::ZERO);
        assert!(after.validate().is_ok());
    }

    #[test]
    fn decay_waits_for_an_idle_month() {
        let (ledger, store) = ledger();
        let user = Uuid::now_v7();
        ledger.award(user, dec!(100), "seed").unwrap();

        // Earned just now: nothing due.
        assert!(ledger.apply_decay(user, Utc::now()).unwrap().is_none());

        // Backdate the earn stamp by two months.
        let mut account = store.get_account(user).unwrap().unwrap();
        account.last_earned_at = Some(Utc::now() - Duration::days(61));
        let expected = account.version;
        account.version += 1;
        let marker = Transaction::new(user, TxnKind::Bonus, dec!(0.01), account.balance, "adjust");
        store.commit_ledger(expected, &account, &marker).unwrap();

        let txn = ledger.apply_decay(user, Utc::now()).unwrap().unwrap();
        // Two idle months at 5% of 100.
        assert_eq!(txn.amount, dec!(-10.00));
        assert_eq!(ledger.balance(user).unwrap(), dec!(90.00));
    }

    #[test]
    fn decay_is_capped_per_event() {
        let (ledger, store) = ledger();
        let user = Uuid::now_v7();
        ledger.award(user, dec!(100), "seed").unwrap();

        let mut account = store.get_account(user).unwrap().unwrap();
        account.last_earned_at = Some(Utc::now() - Duration::days(365));
        let expected = account.version;
        account.version += 1;
        let marker = Transaction::new(user, TxnKind::Bonus, dec!(0.01), account.balance, "adjust");
        store.commit_ledger(expected, &account, &marker).unwrap();

        let txn = ledger.apply_decay(user, Utc::now()).unwrap().unwrap();
        // Twelve idle months would be 60%; the event cap holds it at 20%.
        assert_eq!(txn.amount, dec!(-20.00));
    }

    #[test]
    fn decay_does_not_double_charge() {
        let (ledger, store) = ledger();
        let user = Uuid::now_v7();
        ledger.award(user, dec!(100), "seed").unwrap();

        let mut account = store.get_account(user).unwrap().unwrap();
        account.last_earned_at = Some(Utc::now() - Duration::days(40));
        let expected = account.version;
        account.version += 1;
        let marker = Transaction::new(user, TxnKind::Bonus, dec!(0.01), account.balance, "adjust");
        store.commit_ledger(expected, &account, &marker).unwrap();

        assert!(ledger.apply_decay(user, Utc::now()).unwrap().is_some());
        // Second run the same day: the decay stamp shields the balance.
        assert!(ledger.apply_decay(user, Utc::now()).unwrap().is_none());
    }

    #[test]
    fn replay_reproduces_balance() {
        let (ledger, _store) = ledger();
        let user = Uuid::now_v7();
        let link = Uuid::now_v7();

        ledger.award(user, dec!(40), "seed").unwrap();
        ledger.spend(user, dec!(12.30), "purchase", None).unwrap();
        ledger.award_pending(user, dec!(7), "placed", link).unwrap();
        ledger.convert_pending(user, dec!(7), "released", link).unwrap();
        ledger.refund(user, dec!(2.30), "aborted exchange", None).unwrap();

        let account = ledger.account(user).unwrap();
        assert_eq!(ledger.replay(user).unwrap(), account.balance);
        assert!(ledger.verify(user).unwrap());
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::storage::MemoryStore;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[derive(Debug, Clone)]
    enum Op {
        Award(u32),
        Spend(u32),
        Pending(u32),
        Convert(u32),
        Clawback(u32),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u32..500).prop_map(Op::Award),
            (1u32..500).prop_map(Op::Spend),
            (1u32..500).prop_map(Op::Pending),
            (1u32..500).prop_map(Op::Convert),
            (1u32..500).prop_map(Op::Clawback),
        ]
    }

    proptest! {
        /// Any op sequence keeps balance and pending non-negative and the
        /// log replay equal to the projected balance.
        #[test]
        fn ledger_invariants_hold(ops in proptest::collection::vec(op_strategy(), 1..40)) {
            let store = Arc::new(MemoryStore::new());
            let ledger = LedgerEngine::new(store, LedgerConfig::default());
            let user = Uuid::now_v7();
            let link = Uuid::now_v7();

            for op in ops {
                let result = match op {
                    Op::Award(n) => ledger.award(user, Decimal::from(n), "p").map(|_| ()),
                    Op::Spend(n) => ledger.spend(user, Decimal::from(n), "p", None).map(|_| ()),
                    Op::Pending(n) => ledger
                        .award_pending(user, Decimal::from(n), "p", link)
                        .map(|_| ()),
                    Op::Convert(n) => ledger
                        .convert_pending(user, Decimal::from(n), "p", link)
                        .map(|_| ()),
                    Op::Clawback(n) => ledger
                        .clawback(user, Decimal::from(n), "p", link)
                        .map(|_| ()),
                };
                // Insufficient funds is an expected outcome, not a failure.
                if let Err(e) = result {
                    prop_assert!(matches!(e, MeshError::InsufficientCredits { .. }));
                }

                let account = ledger.account(user).unwrap();
                prop_assert!(account.balance >= dec!(0));
                prop_assert!(account.pending >= dec!(0));
            }

            prop_assert_eq!(ledger.replay(user).unwrap(), ledger.account(user).unwrap().balance);
        }
    }
}
