//! Global directory of pools and risk modules; executes policy issuance by
//! solving the capital-allocation problem across pools.

use std::collections::HashMap;

use log::info;

use crate::clock::Clock;
use crate::error::{ProtocolError, Result};
use crate::fixed_point::{Ray, Wad};
use crate::policy::{Policy, PolicyParameters};
use crate::pool::Pool;
use crate::provider::ProviderId;
use crate::risk_module::RiskModule;

pub struct Protocol<C: Clock> {
    clock: C,
    risk_modules: HashMap<String, RiskModule>,
    pools: HashMap<String, Pool>,
    pool_order: Vec<String>,
    policies: Vec<Policy>,
    policy_count: u64,
}

impl<C: Clock> Protocol<C> {
    pub fn new(clock: C) -> Self {
        Protocol {
            clock,
            risk_modules: HashMap::new(),
            pools: HashMap::new(),
            pool_order: Vec::new(),
            policies: Vec::new(),
            policy_count: 0,
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn risk_module(&self, name: &str) -> Option<&RiskModule> {
        self.risk_modules.get(name)
    }

    pub fn pool(&self, name: &str) -> Option<&Pool> {
        self.pools.get(name)
    }

    pub fn pool_mut(&mut self, name: &str) -> Option<&mut Pool> {
        self.pools.get_mut(name)
    }

    /// Registers a risk module, last-write-wins by name.
    pub fn add_risk_module(&mut self, rm: RiskModule) {
        self.risk_modules.insert(rm.name.clone(), rm);
    }

    /// Registers a pool, last-write-wins by name. Registration order is
    /// preserved, since `new_policy` enumerates pools in that order.
    pub fn add_etoken(&mut self, pool: Pool) {
        if !self.pools.contains_key(&pool.name) {
            self.pool_order.push(pool.name.clone());
        }
        self.pools.insert(pool.name.clone(), pool);
    }

    /// Coordinator-level convenience wrapper around `Pool::deposit`.
    pub fn deposit(&mut self, pool_name: &str, provider: &ProviderId, amount: Wad) -> Result<Wad> {
        let clock = &self.clock;
        let pool = self
            .pools
            .get_mut(pool_name)
            .ok_or_else(|| ProtocolError::PoolNotFound(pool_name.to_string()))?;
        Ok(pool.deposit(provider, amount, clock)?)
    }

    /// Coordinator-level convenience wrapper around `Pool::redeem`.
    pub fn redeem(&mut self, pool_name: &str, provider: &ProviderId, amount: Option<Wad>) -> Result<Wad> {
        let clock = &self.clock;
        let pool = self
            .pools
            .get_mut(pool_name)
            .ok_or_else(|| ProtocolError::PoolNotFound(pool_name.to_string()))?;
        Ok(pool.redeem(provider, amount, clock)?)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_policy(
        &mut self,
        risk_module_name: &str,
        payout: Wad,
        premium: Wad,
        loss_prob: Ray,
        expiration: u64,
        parameters: PolicyParameters,
    ) -> Result<&Policy> {
        let risk_module = self
            .risk_modules
            .get(risk_module_name)
            .ok_or_else(|| ProtocolError::RiskModuleNotFound(risk_module_name.to_string()))?
            .clone();

        let start = self.clock.now();
        if premium >= payout {
            return Err(ProtocolError::InvalidPolicy("premium must be less than payout".into()));
        }
        if expiration <= start {
            return Err(ProtocolError::InvalidPolicy("expiration must be after start".into()));
        }

        self.policy_count += 1;
        let mut policy = Policy::new(
            self.policy_count,
            &risk_module,
            payout,
            premium,
            loss_prob,
            start,
            expiration,
            parameters,
        );

        let interest_rate = policy.interest_rate(&risk_module);
        if interest_rate <= Ray::zero() {
            return Err(ProtocolError::InvalidPolicy("interest_rate must be positive".into()));
        }

        // Enumerate pools in registration order, partitioning into eligible
        // (accepts the policy and has free ocean) and ineligible.
        let mut eligible: Vec<(String, Wad)> = Vec::new();
        let mut total_ocean = Wad::zero();
        for name in &self.pool_order {
            let pool = &self.pools[name];
            if !pool.accepts(&policy, &self.clock) {
                continue;
            }
            let ocean = pool.ocean(&self.clock)?;
            if ocean.is_zero() {
                continue;
            }
            total_ocean = total_ocean.checked_add(&ocean)?;
            eligible.push((name.clone(), ocean));
        }

        if total_ocean < policy.mcr {
            return Err(ProtocolError::InsufficientCapital);
        }

        // Feasibility was just verified above, so the allocation loop below
        // cannot fail on InsufficientOcean — new_policy is all-or-nothing.
        let mut remaining = policy.mcr;
        let last = eligible.len().saturating_sub(1);
        for (index, (name, ocean)) in eligible.iter().enumerate() {
            let mcr_for_pool = if index < last {
                policy.mcr.checked_mul(ocean)?.checked_div(&total_ocean)?
            } else {
                remaining
            };
            let pool = self.pools.get_mut(name).expect("name came from pool_order/pools");
            pool.lock_mcr(interest_rate, mcr_for_pool, &self.clock)?;
            policy.locked_funds.push((name.clone(), mcr_for_pool));
            remaining = remaining.checked_sub(&mcr_for_pool)?;
        }

        info!(
            "issued policy {} on risk module {}: payout={} premium={} mcr={} split across {} pool(s)",
            policy.policy_id,
            risk_module_name,
            policy.payout,
            policy.premium,
            policy.mcr,
            policy.locked_funds.len()
        );

        self.policies.push(policy);
        Ok(self.policies.last().expect("just pushed"))
    }
}

/// Time control is only meaningful for protocols built over a
/// deterministic clock; real-clock-backed protocols have no
/// `fast_forward_time` because there is nothing to fast-forward.
impl Protocol<crate::clock::ManualClock> {
    /// Advances the shared clock by `secs` seconds; for deterministic
    /// simulation and tests only.
    pub fn fast_forward_time(&self, secs: u64) -> u64 {
        self.clock.advance(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::policy::SECONDS_PER_YEAR;

    fn protocol() -> Protocol<ManualClock> {
        Protocol::new(ManualClock::new(0))
    }

    #[test]
    fn single_pool_issue_scenario() {
        let mut protocol = protocol();
        protocol.add_etoken(Pool::new("P", SECONDS_PER_YEAR, protocol.clock()));
        protocol.add_risk_module(RiskModule::build("R").finish());
        let a = ProviderId::new("A");
        protocol.deposit("P", &a, Wad::from_value(10_000)).unwrap();

        let policy = protocol
            .new_policy(
                "R",
                Wad::from_value(1000),
                Wad::from_value(100),
                Ray::from_value(1).checked_div(&Ray::from_value(100)).unwrap(),
                30 * 24 * 3600,
                PolicyParameters::new(),
            )
            .unwrap();

        assert_eq!(policy.mcr, Wad::from_value(900));
        assert_eq!(policy.locked_funds, vec![("P".to_string(), Wad::from_value(900))]);
        assert_eq!(protocol.pool("P").unwrap().mcr(), Wad::from_value(900));
        assert!(protocol.pool("P").unwrap().token_interest_rate() > Ray::zero());
    }

    #[test]
    fn multi_pool_proportional_split() {
        let mut protocol = protocol();
        protocol.add_etoken(Pool::new("P1", SECONDS_PER_YEAR, protocol.clock()));
        protocol.add_etoken(Pool::new("P2", SECONDS_PER_YEAR, protocol.clock()));
        protocol.add_risk_module(RiskModule::build("R").finish());
        let lp = ProviderId::new("LP");
        protocol.deposit("P1", &lp, Wad::from_value(3000)).unwrap();
        protocol.deposit("P2", &lp, Wad::from_value(7000)).unwrap();

        // payout-premium chosen so mcr == $100 exactly with full collateralization.
        let policy = protocol
            .new_policy(
                "R",
                Wad::from_value(1100),
                Wad::from_value(1000),
                Ray::zero(),
                30 * 24 * 3600,
                PolicyParameters::new(),
            )
            .unwrap();

        assert_eq!(policy.mcr, Wad::from_value(100));
        let sum = policy.locked_funds.iter().fold(Wad::zero(), |acc, (_, amt)| acc.checked_add(amt).unwrap());
        assert_eq!(sum, policy.mcr);
        assert_eq!(policy.locked_funds[0], ("P1".to_string(), Wad::from_value(30)));
        assert_eq!(policy.locked_funds[1].1, Wad::from_value(70));
    }

    #[test]
    fn eligibility_filter_excludes_short_dated_pools() {
        let mut protocol = protocol();
        protocol.add_etoken(Pool::new("P1", 30 * 24 * 3600, protocol.clock()));
        protocol.add_etoken(Pool::new("P2", SECONDS_PER_YEAR, protocol.clock()));
        protocol.add_risk_module(RiskModule::build("R").finish());
        let lp = ProviderId::new("LP");
        protocol.deposit("P1", &lp, Wad::from_value(10_000)).unwrap();
        protocol.deposit("P2", &lp, Wad::from_value(10_000)).unwrap();

        let policy = protocol
            .new_policy(
                "R",
                Wad::from_value(1000),
                Wad::from_value(100),
                Ray::from_value(1).checked_div(&Ray::from_value(100)).unwrap(),
                60 * 24 * 3600,
                PolicyParameters::new(),
            )
            .unwrap();

        assert_eq!(policy.locked_funds, vec![("P2".to_string(), Wad::from_value(900))]);
    }

    #[test]
    fn insufficient_capital_leaves_no_pool_state_changed() {
        let mut protocol = protocol();
        protocol.add_etoken(Pool::new("P", SECONDS_PER_YEAR, protocol.clock()));
        protocol.add_risk_module(RiskModule::build("R").finish());
        let lp = ProviderId::new("LP");
        protocol.deposit("P", &lp, Wad::from_value(500)).unwrap();

        let err = protocol
            .new_policy(
                "R",
                Wad::from_value(1000),
                Wad::from_value(400),
                Ray::zero(),
                30 * 24 * 3600,
                PolicyParameters::new(),
            )
            .unwrap_err();

        assert_eq!(err, ProtocolError::InsufficientCapital);
        assert!(protocol.pool("P").unwrap().mcr().is_zero());
        assert!(protocol.policies().is_empty());
    }

    #[test]
    fn unknown_risk_module_is_reported() {
        let mut protocol = protocol();
        let err = protocol
            .new_policy(
                "nonexistent",
                Wad::from_value(1000),
                Wad::from_value(100),
                Ray::zero(),
                30 * 24 * 3600,
                PolicyParameters::new(),
            )
            .unwrap_err();
        assert_eq!(err, ProtocolError::RiskModuleNotFound("nonexistent".to_string()));
    }

    #[test]
    fn redeem_is_reachable_through_the_coordinator() {
        let mut protocol = protocol();
        protocol.add_etoken(Pool::new("P", SECONDS_PER_YEAR, protocol.clock()));
        let a = ProviderId::new("A");
        protocol.deposit("P", &a, Wad::from_value(100)).unwrap();

        let redeemed = protocol.redeem("P", &a, Some(Wad::from_value(100))).unwrap();
        assert_eq!(redeemed, Wad::from_value(100));

        let clock = ManualClock::new(protocol.now());
        assert_eq!(protocol.pool_mut("P").unwrap().balance_of(&a, &clock).unwrap(), Wad::zero());
    }

    #[test]
    fn redeem_against_unknown_pool_is_reported() {
        let mut protocol = protocol();
        let a = ProviderId::new("A");
        let err = protocol.redeem("nonexistent", &a, None).unwrap_err();
        assert_eq!(err, ProtocolError::PoolNotFound("nonexistent".to_string()));
    }
}
