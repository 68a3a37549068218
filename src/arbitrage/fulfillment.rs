use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::types::{Dimensions, FulfillmentCost, FulfillmentMethod};

const STANDARD_STORAGE_RATE: f64 = 0.75;
const OVERSIZE_STORAGE_RATE: f64 = 0.48;

/// Warehouse size tiers, in classification order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SizeTier {
    SmallStandard,
    LargeStandard,
    SmallOversize,
    MediumOversize,
    LargeOversize,
    SpecialOversize,
}

/// Upper bounds a package must satisfy to fall in a tier. `None` means the
/// bound is not checked for that tier.
struct TierLimits {
    tier: SizeTier,
    max_side: f64,
    min_side: Option<f64>,
    weight_lb: f64,
    length_plus_girth: Option<f64>,
}

const TIER_LIMITS: [TierLimits; 5] = [
    TierLimits {
        tier: SizeTier::SmallStandard,
        max_side: 15.0,
        min_side: Some(0.75),
        weight_lb: 0.5,
        length_plus_girth: None,
    },
    TierLimits {
        tier: SizeTier::LargeStandard,
        max_side: 18.0,
        min_side: Some(8.0),
        weight_lb: 20.0,
        length_plus_girth: None,
    },
    TierLimits {
        tier: SizeTier::SmallOversize,
        max_side: 60.0,
        min_side: Some(30.0),
        weight_lb: 70.0,
        length_plus_girth: None,
    },
    TierLimits {
        tier: SizeTier::MediumOversize,
        max_side: 108.0,
        min_side: None,
        weight_lb: 150.0,
        length_plus_girth: Some(130.0),
    },
    TierLimits {
        tier: SizeTier::LargeOversize,
        max_side: 108.0,
        min_side: None,
        weight_lb: 150.0,
        length_plus_girth: Some(165.0),
    },
];

impl TierLimits {
    fn admits(&self, weight_lb: f64, dims: &Dimensions) -> bool {
        dims.max() <= self.max_side
            && self.min_side.map_or(true, |limit| dims.min() <= limit)
            && weight_lb <= self.weight_lb
            && self
                .length_plus_girth
                .map_or(true, |limit| dims.length_plus_girth() <= limit)
    }
}

impl SizeTier {
    /// First tier whose limits admit the package; anything larger is
    /// Special Oversize.
    pub fn classify(weight_lb: f64, dims: &Dimensions) -> Self {
        TIER_LIMITS
            .iter()
            .find(|limits| limits.admits(weight_lb, dims))
            .map(|limits| limits.tier)
            .unwrap_or(SizeTier::SpecialOversize)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SizeTier::SmallStandard => "Small Standard",
            SizeTier::LargeStandard => "Large Standard",
            SizeTier::SmallOversize => "Small Oversize",
            SizeTier::MediumOversize => "Medium Oversize",
            SizeTier::LargeOversize => "Large Oversize",
            SizeTier::SpecialOversize => "Special Oversize",
        }
    }

    pub fn all() -> [SizeTier; 6] {
        [
            SizeTier::SmallStandard,
            SizeTier::LargeStandard,
            SizeTier::SmallOversize,
            SizeTier::MediumOversize,
            SizeTier::LargeOversize,
            SizeTier::SpecialOversize,
        ]
    }

    pub fn handling_fee(&self, weight_lb: f64) -> f64 {
        match self {
            SizeTier::SmallStandard => {
                if weight_lb <= 0.5 {
                    2.16
                } else {
                    2.48
                }
            }
            SizeTier::LargeStandard => {
                if weight_lb <= 1.0 {
                    2.73
                } else if weight_lb <= 2.0 {
                    3.47
                } else {
                    4.21 + (weight_lb - 2.0) * 0.38
                }
            }
            SizeTier::SmallOversize => surcharge(8.26, 0.38, 20.0, weight_lb),
            SizeTier::MediumOversize => surcharge(11.37, 0.39, 40.0, weight_lb),
            SizeTier::LargeOversize => surcharge(76.57, 0.79, 90.0, weight_lb),
            SizeTier::SpecialOversize => surcharge(137.32, 0.91, 90.0, weight_lb),
        }
    }

    pub fn pick_pack_fee(&self) -> f64 {
        match self {
            SizeTier::SmallStandard => 0.99,
            SizeTier::LargeStandard => 1.20,
            SizeTier::SmallOversize => 4.72,
            SizeTier::MediumOversize => 5.42,
            SizeTier::LargeOversize => 10.53,
            SizeTier::SpecialOversize => 13.34,
        }
    }

    /// 30-day storage charge per cubic foot.
    pub fn storage_rate(&self) -> f64 {
        match self {
            SizeTier::SmallStandard | SizeTier::LargeStandard => STANDARD_STORAGE_RATE,
            _ => OVERSIZE_STORAGE_RATE,
        }
    }
}

impl fmt::Display for SizeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn surcharge(base: f64, per_lb: f64, breakpoint_lb: f64, weight_lb: f64) -> f64 {
    if weight_lb > breakpoint_lb {
        base + (weight_lb - breakpoint_lb) * per_lb
    } else {
        base
    }
}

impl FulfillmentCost {
    pub fn for_method(method: FulfillmentMethod, weight_lb: f64, dims: &Dimensions) -> Self {
        match method {
            FulfillmentMethod::Fba => Self::fba(weight_lb, dims),
            FulfillmentMethod::Fbm => Self::fbm(weight_lb),
        }
    }

    /// Warehouse fees for one unit. Inputs are not validated.
    pub fn fba(weight_lb: f64, dims: &Dimensions) -> Self {
        let tier = SizeTier::classify(weight_lb, dims);
        debug!(
            "Classified {:.2} lb package {}x{}x{} as {}",
            weight_lb, dims.length, dims.width, dims.height, tier
        );

        Self {
            weight_handling: tier.handling_fee(weight_lb),
            order_handling: 0.0,
            pick_pack: tier.pick_pack_fee(),
            thirty_day_storage: tier.storage_rate() * dims.cubic_feet(),
        }
    }

    /// Seller-fulfilled shipping cost by weight band. The whole charge is
    /// carried in `weight_handling`.
    pub fn fbm(weight_lb: f64) -> Self {
        let shipping_cost = if weight_lb <= 1.0 {
            3.99
        } else if weight_lb <= 2.0 {
            5.99
        } else if weight_lb <= 5.0 {
            8.99
        } else if weight_lb <= 10.0 {
            12.99
        } else {
            12.99 + (weight_lb - 10.0) * 0.50
        };

        Self {
            weight_handling: shipping_cost,
            order_handling: 0.0,
            pick_pack: 0.0,
            thirty_day_storage: 0.0,
        }
    }
}
