//! Derived snapshot of one sold insurance contract.

use std::collections::HashMap;

use crate::fixed_point::{Ray, Wad};
use crate::risk_module::RiskModule;

pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 3600;

pub type PolicyParameters = HashMap<String, serde_json::Value>;

/// A sold policy. Every derived quantity (`mcr`, `pure_premium`,
/// `interest_rate`) is computed eagerly at construction time and never
/// recomputed; the only later mutation is the coordinator appending to
/// `locked_funds` as it distributes the MCR across pools.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub policy_id: u64,
    pub risk_module: String,
    pub payout: Wad,
    pub premium: Wad,
    pub mcr: Wad,
    pub loss_prob: Ray,
    pub start: u64,
    pub expiration: u64,
    pub parameters: PolicyParameters,
    pub locked_funds: Vec<(String, Wad)>,
}

impl Policy {
    /// Constructs a policy with all derived quantities precomputed.
    ///
    /// This does *not* reject non-positive `interest_rate`s — that check is
    /// the coordinator's job (see `Protocol::new_policy`), so that callers
    /// can inspect `pure_premium`/`interest_rate` on a would-be-rejected
    /// policy before it is discarded. Callers are expected to have already
    /// validated `premium < payout` and `start < expiration`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        policy_id: u64,
        risk_module: &RiskModule,
        payout: Wad,
        premium: Wad,
        loss_prob: Ray,
        start: u64,
        expiration: u64,
        parameters: PolicyParameters,
    ) -> Self {
        let mcr = payout
            .checked_sub(&premium)
            .expect("premium < payout was validated by the caller")
            .to_ray()
            .checked_mul(&risk_module.mcr_percentage)
            .expect("mcr_percentage is a bounded fraction")
            .to_wad();

        Policy {
            policy_id,
            risk_module: risk_module.name.clone(),
            payout,
            premium,
            mcr,
            loss_prob,
            start,
            expiration,
            parameters,
            locked_funds: Vec::new(),
        }
    }

    pub fn pure_premium(&self) -> Wad {
        self.payout
            .to_ray()
            .checked_mul(&self.loss_prob)
            .expect("loss_prob is a bounded fraction")
            .to_wad()
    }

    /// Per-second interest rate owed to liquidity providers backing this
    /// policy's MCR. Non-positive when the policy has no profit premium
    /// left over for LPs after the risk-module and treasury shares — such
    /// policies are rejected by the coordinator before being stored.
    pub fn interest_rate(&self, risk_module: &RiskModule) -> Ray {
        let profit_premium = self.premium.checked_sub(&self.pure_premium()).expect("may be negative, checked below");
        let for_ensuro = profit_premium.to_ray().checked_mul(&risk_module.ensuro_share).expect("bounded fraction").to_wad();
        let for_risk_module =
            profit_premium.to_ray().checked_mul(&risk_module.premium_share).expect("bounded fraction").to_wad();
        let for_lps = profit_premium
            .checked_sub(&for_ensuro)
            .expect("shares sum to at most profit_premium")
            .checked_sub(&for_risk_module)
            .expect("shares sum to at most profit_premium");

        if self.mcr.is_zero() {
            return Ray::zero();
        }

        let duration = Wad::from_value((self.expiration - self.start) as i128);
        let denom = duration.checked_mul(&self.mcr).expect("duration * mcr overflow");
        for_lps
            .checked_mul(&Wad::from_value(SECONDS_PER_YEAR as i128))
            .expect("for_lps * seconds_per_year overflow")
            .checked_div(&denom)
            .expect("denom is non-zero: duration > 0 and mcr > 0")
            .to_ray()
    }
}
