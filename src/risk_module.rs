//! Immutable parameterization of one class of insurance.

use crate::fixed_point::Ray;

/// One risk class: how much of a policy's net payout must be collateralized,
/// and how the resulting profit premium is split between the module
/// operator and the protocol treasury.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskModule {
    pub name: String,
    pub mcr_percentage: Ray,
    pub premium_share: Ray,
    pub ensuro_share: Ray,
}

impl RiskModule {
    /// Builds a risk module from integer percentages (0-100), dividing each
    /// by 100 to obtain the `Ray` fraction. Defaults match the reference:
    /// full collateralization, no operator or treasury share.
    pub fn build(name: impl Into<String>) -> RiskModuleBuilder {
        RiskModuleBuilder {
            name: name.into(),
            mcr_percentage_pct: 100,
            premium_share_pct: 0,
            ensuro_share_pct: 0,
        }
    }
}

/// Builder for [`RiskModule`] so callers only specify the percentages they
/// want to override, matching the reference's keyword-argument defaults.
pub struct RiskModuleBuilder {
    name: String,
    mcr_percentage_pct: i128,
    premium_share_pct: i128,
    ensuro_share_pct: i128,
}

impl RiskModuleBuilder {
    pub fn mcr_percentage(mut self, pct: i128) -> Self {
        self.mcr_percentage_pct = pct;
        self
    }

    pub fn premium_share(mut self, pct: i128) -> Self {
        self.premium_share_pct = pct;
        self
    }

    pub fn ensuro_share(mut self, pct: i128) -> Self {
        self.ensuro_share_pct = pct;
        self
    }

    pub fn finish(self) -> RiskModule {
        let hundred = Ray::from_value(100);
        let pct = |p: i128| Ray::from_value(p).checked_div(&hundred).expect("dividing by 100 cannot fail");
        RiskModule {
            name: self.name,
            mcr_percentage: pct(self.mcr_percentage_pct),
            premium_share: pct(self.premium_share_pct),
            ensuro_share: pct(self.ensuro_share_pct),
        }
    }
}
