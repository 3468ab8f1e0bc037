//! `EToken`: an interest-bearing capital pool backing insurance policies.
//!
//! Implements the scaled-balance rebasing model used by compound-interest
//! lending pools: a provider's principal is stored already divided by the
//! pool's index at deposit time, and multiplied back up by the current
//! index whenever the visible balance is read.

use std::collections::HashMap;

use log::{debug, info};

use crate::clock::Clock;
use crate::error::{ArithmeticError, ProtocolError};
use crate::fixed_point::{Ray, Wad};
use crate::policy::{Policy, SECONDS_PER_YEAR};
use crate::provider::ProviderId;

#[derive(Debug)]
pub struct Pool {
    pub name: String,
    pub expiration_period: u64,
    current_index: Ray,
    last_index_update: u64,
    token_interest_rate: Ray,
    mcr: Wad,
    mcr_interest_rate: Ray,
    principal_balance: HashMap<ProviderId, Wad>,
    entry_index: HashMap<ProviderId, Ray>,
    entry_timestamp: HashMap<ProviderId, u64>,
}

impl Pool {
    pub fn new(name: impl Into<String>, expiration_period: u64, clock: &dyn Clock) -> Self {
        Pool {
            name: name.into(),
            expiration_period,
            current_index: Ray::from_value(1),
            last_index_update: clock.now(),
            token_interest_rate: Ray::zero(),
            mcr: Wad::zero(),
            mcr_interest_rate: Ray::zero(),
            principal_balance: HashMap::new(),
            entry_index: HashMap::new(),
            entry_timestamp: HashMap::new(),
        }
    }

    pub fn mcr(&self) -> Wad {
        self.mcr
    }

    pub fn mcr_interest_rate(&self) -> Ray {
        self.mcr_interest_rate
    }

    pub fn token_interest_rate(&self) -> Ray {
        self.token_interest_rate
    }

    pub fn current_index(&self) -> Ray {
        self.current_index
    }

    /// Projects the index forward to `now` without writing any state. Used
    /// both by the read-only `total_supply`/`balance_of` paths and as the
    /// first half of `_update_current_index`.
    fn project_index(&self, now: u64) -> Result<Ray, ArithmeticError> {
        let elapsed = Ray::from_value((now - self.last_index_update) as i128);
        let increment = self
            .current_index
            .checked_mul(&elapsed)?
            .checked_mul(&self.token_interest_rate)?
            .checked_div(&Ray::from_value(SECONDS_PER_YEAR as i128))?;
        self.current_index.checked_add(&increment)
    }

    /// Realizes the projected index into `current_index`/`last_index_update`.
    /// Must run before any state transition that changes
    /// `token_interest_rate`, and before any balance read that must stay
    /// consistent with subsequent writes.
    fn update_current_index(&mut self, now: u64) -> Result<(), ArithmeticError> {
        self.current_index = self.project_index(now)?;
        self.last_index_update = now;
        Ok(())
    }

    /// Read-only projection used by `total_supply`/`ocean`; does not advance
    /// `last_index_update`. This is an explicit, preserved design choice —
    /// see the fixed-point design notes on `total_supply`.
    fn scaled_total_principal(&self) -> Wad {
        self.principal_balance.values().fold(Wad::zero(), |acc, b| acc.checked_add(b).expect("principal sum overflow"))
    }

    pub fn total_supply(&self, clock: &dyn Clock) -> Result<Wad, ArithmeticError> {
        let index = self.project_index(clock.now())?;
        self.scaled_total_principal().to_ray().checked_mul(&index).map(|r| r.to_wad())
    }

    pub fn ocean(&self, clock: &dyn Clock) -> Result<Wad, ArithmeticError> {
        self.total_supply(clock)?.checked_sub(&self.mcr)
    }

    fn visible_balance(&self, provider: &ProviderId) -> Result<Wad, ArithmeticError> {
        let principal = match self.principal_balance.get(provider) {
            Some(p) => *p,
            None => return Ok(Wad::zero()),
        };
        let entry_index = self.entry_index[provider];
        principal.to_ray().checked_mul(&self.current_index)?.checked_div(&entry_index).map(|r| r.to_wad())
    }

    pub fn balance_of(&mut self, provider: &ProviderId, clock: &dyn Clock) -> Result<Wad, ArithmeticError> {
        if !self.principal_balance.contains_key(provider) {
            return Ok(Wad::zero());
        }
        self.update_current_index(clock.now())?;
        self.visible_balance(provider)
    }

    pub fn deposit(&mut self, provider: &ProviderId, amount: Wad, clock: &dyn Clock) -> Result<Wad, ArithmeticError> {
        self.update_current_index(clock.now())?;
        let new_balance = self.visible_balance(provider)?.checked_add(&amount)?;
        self.principal_balance.insert(provider.clone(), new_balance);
        self.entry_index.insert(provider.clone(), self.current_index);
        self.entry_timestamp.insert(provider.clone(), clock.now());
        debug!(
            "pool {}: provider {} deposited {}, new balance {}",
            self.name, provider, amount, new_balance
        );
        Ok(new_balance)
    }

    pub fn redeem(
        &mut self,
        provider: &ProviderId,
        amount: Option<Wad>,
        clock: &dyn Clock,
    ) -> Result<Wad, ArithmeticError> {
        if !self.principal_balance.contains_key(provider) {
            return Ok(Wad::zero());
        }
        // Realize the index the same way `balance_of` does, so `balance`
        // already reflects interest accrued up to `now` before it is
        // written back as the remaining principal.
        self.update_current_index(clock.now())?;
        let balance = self.visible_balance(provider)?;
        if balance.is_zero() {
            return Ok(Wad::zero());
        }
        let amount = match amount {
            Some(a) if a <= balance => a,
            _ => balance,
        };

        // Ordering preserved from the reference: the stored principal is
        // updated before the (now idempotent) second index realization.
        let remaining = balance.checked_sub(&amount)?;
        self.principal_balance.insert(provider.clone(), remaining);
        self.update_current_index(clock.now())?;

        if amount == balance {
            self.principal_balance.remove(provider);
            self.entry_index.remove(provider);
            self.entry_timestamp.remove(provider);
        } else {
            self.entry_index.insert(provider.clone(), self.current_index);
            self.entry_timestamp.insert(provider.clone(), clock.now());
        }

        debug!("pool {}: provider {} redeemed {}", self.name, provider, amount);
        Ok(amount)
    }

    pub fn accepts(&self, policy: &Policy, clock: &dyn Clock) -> bool {
        policy.expiration <= clock.now() + self.expiration_period
    }

    /// Locks `amount` of this pool's ocean against `policy`, updating the
    /// blended `mcr_interest_rate` and re-deriving `token_interest_rate`.
    pub fn lock_mcr(&mut self, policy_interest_rate: Ray, amount: Wad, clock: &dyn Clock) -> Result<(), ProtocolError> {
        let ocean = self.ocean(clock)?;
        if amount > ocean {
            return Err(ProtocolError::InsufficientOcean);
        }
        self.update_current_index(clock.now())?;

        if self.mcr.is_zero() {
            self.mcr = amount;
            self.mcr_interest_rate = policy_interest_rate;
        } else {
            let old_mcr = self.mcr;
            let new_mcr = old_mcr.checked_add(&amount)?;
            let weighted = self
                .mcr_interest_rate
                .checked_mul(&old_mcr.to_ray())?
                .checked_add(&policy_interest_rate.checked_mul(&amount.to_ray())?)?;
            self.mcr_interest_rate = weighted.checked_div(&new_mcr.to_ray())?;
            self.mcr = new_mcr;
        }

        let total_supply = self.total_supply(clock)?;
        self.token_interest_rate = self.mcr_interest_rate.checked_mul(&self.mcr.to_ray())?.checked_div(&total_supply.to_ray())?;

        info!(
            "pool {}: locked {} at rate {}, blended rate now {}",
            self.name, amount, policy_interest_rate, self.mcr_interest_rate
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::risk_module::RiskModule;

    fn provider(id: &str) -> ProviderId {
        ProviderId::new(id)
    }

    #[test]
    fn deposit_then_balance_is_stable_at_t0() {
        let clock = ManualClock::new(0);
        let mut pool = Pool::new("P", SECONDS_PER_YEAR, &clock);
        let a = provider("A");
        pool.deposit(&a, Wad::from_value(10_000), &clock).unwrap();
        assert_eq!(pool.balance_of(&a, &clock).unwrap(), Wad::from_value(10_000));
    }

    #[test]
    fn round_trip_deposit_redeem_at_t0() {
        let clock = ManualClock::new(0);
        let mut pool = Pool::new("P", SECONDS_PER_YEAR, &clock);
        let a = provider("A");
        pool.deposit(&a, Wad::from_value(100), &clock).unwrap();
        let redeemed = pool.redeem(&a, Some(Wad::from_value(100)), &clock).unwrap();
        assert_eq!(redeemed, Wad::from_value(100));
        assert_eq!(pool.balance_of(&a, &clock).unwrap(), Wad::zero());
        assert!(!pool.principal_balance.contains_key(&a));
        assert!(!pool.entry_index.contains_key(&a));
        assert!(!pool.entry_timestamp.contains_key(&a));
    }

    #[test]
    fn lock_mcr_on_empty_pool_sets_rate_directly() {
        let clock = ManualClock::new(0);
        let mut pool = Pool::new("P", SECONDS_PER_YEAR, &clock);
        let a = provider("A");
        pool.deposit(&a, Wad::from_value(10_000), &clock).unwrap();
        let rate = Ray::from_value(1).checked_div(&Ray::from_value(10)).unwrap();
        pool.lock_mcr(rate, Wad::from_value(900), &clock).unwrap();
        assert_eq!(pool.mcr(), Wad::from_value(900));
        assert_eq!(pool.mcr_interest_rate(), rate);
        assert!(pool.token_interest_rate() > Ray::zero());
    }

    #[test]
    fn blended_rate_is_capital_weighted_mean() {
        let clock = ManualClock::new(0);
        let mut pool = Pool::new("P", SECONDS_PER_YEAR, &clock);
        let a = provider("A");
        pool.deposit(&a, Wad::from_value(10_000), &clock).unwrap();

        let ten_pct = Ray::from_value(10).checked_div(&Ray::from_value(100)).unwrap();
        let twenty_pct = Ray::from_value(20).checked_div(&Ray::from_value(100)).unwrap();
        pool.lock_mcr(ten_pct, Wad::from_value(100), &clock).unwrap();
        pool.lock_mcr(twenty_pct, Wad::from_value(300), &clock).unwrap();

        // (0.10*100 + 0.20*300) / 400 == 0.175
        let expected = Ray::from_value(175).checked_div(&Ray::from_value(1000)).unwrap();
        assert_eq!(pool.mcr_interest_rate(), expected);
    }

    #[test]
    fn interest_accrues_linearly_between_rate_changes() {
        let clock = ManualClock::new(0);
        let mut pool = Pool::new("P", SECONDS_PER_YEAR, &clock);
        let a = provider("A");
        pool.deposit(&a, Wad::from_value(10_000), &clock).unwrap();

        let rm = RiskModule::build("R").finish();
        let policy = Policy::new(
            1,
            &rm,
            Wad::from_value(1000),
            Wad::from_value(100),
            Ray::from_value(1).checked_div(&Ray::from_value(100)).unwrap(),
            0,
            30 * 24 * 3600,
            Default::default(),
        );
        pool.lock_mcr(policy.interest_rate(&rm), Wad::from_value(900), &clock).unwrap();

        clock.advance(30 * 24 * 3600);
        let balance = pool.balance_of(&a, &clock).unwrap();
        // within 1-wei tolerance of $10,090
        let expected = Wad::from_value(10_090);
        let diff = if balance > expected { balance.checked_sub(&expected).unwrap() } else { expected.checked_sub(&balance).unwrap() };
        let one_wei = Wad::from_raw(crate::bigint::I256::from_i128(1));
        assert!(diff <= one_wei);
    }

    #[test]
    fn redeem_all_pays_out_accrued_interest_like_balance_of() {
        let clock = ManualClock::new(0);
        let mut pool = Pool::new("P", SECONDS_PER_YEAR, &clock);
        let a = provider("A");
        pool.deposit(&a, Wad::from_value(10_000), &clock).unwrap();

        let rm = RiskModule::build("R").finish();
        let policy = Policy::new(
            1,
            &rm,
            Wad::from_value(1000),
            Wad::from_value(100),
            Ray::from_value(1).checked_div(&Ray::from_value(100)).unwrap(),
            0,
            30 * 24 * 3600,
            Default::default(),
        );
        pool.lock_mcr(policy.interest_rate(&rm), Wad::from_value(900), &clock).unwrap();

        clock.advance(30 * 24 * 3600);
        let balance = pool.balance_of(&a, &clock).unwrap();
        assert!(balance > Wad::from_value(10_000));

        let redeemed = pool.redeem(&a, None, &clock).unwrap();
        assert_eq!(redeemed, balance);
        assert!(!pool.principal_balance.contains_key(&a));
    }

    #[test]
    fn accepts_respects_expiration_period() {
        let clock = ManualClock::new(0);
        let pool = Pool::new("P", 30 * 24 * 3600, &clock);
        let rm = RiskModule::build("R").finish();
        let policy = Policy::new(
            1,
            &rm,
            Wad::from_value(1000),
            Wad::from_value(100),
            Ray::from_value(1).checked_div(&Ray::from_value(100)).unwrap(),
            0,
            60 * 24 * 3600,
            Default::default(),
        );
        assert!(!pool.accepts(&policy, &clock));
    }

    #[test]
    fn lock_mcr_rejects_amount_above_ocean() {
        let clock = ManualClock::new(0);
        let mut pool = Pool::new("P", SECONDS_PER_YEAR, &clock);
        let a = provider("A");
        pool.deposit(&a, Wad::from_value(100), &clock).unwrap();
        let rate = Ray::from_value(1).checked_div(&Ray::from_value(10)).unwrap();
        let err = pool.lock_mcr(rate, Wad::from_value(200), &clock).unwrap_err();
        assert_eq!(err, ProtocolError::InsufficientOcean);
    }
}
