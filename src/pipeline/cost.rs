//! Up-front cost estimate for a presentation.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Average narration length assumed when none is given.
pub const DEFAULT_NARRATION_CHARS: usize = 200;

/// Per-unit prices of the remote services, in USD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostRates {
    pub per_slide: Decimal,
    pub per_transition: Decimal,
    pub per_thousand_chars: Decimal,
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            per_slide: dec!(0.15),
            per_transition: dec!(0.35),
            per_thousand_chars: dec!(0.30),
        }
    }
}

/// Estimated spend for one presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub slide_count: usize,
    pub transition_count: usize,
    pub total_chars: usize,
    pub slides: Decimal,
    pub transitions: Decimal,
    pub voiceovers: Decimal,
    pub total: Decimal,
}

impl CostEstimate {
    /// Compute an estimate with explicit rates.
    pub fn with_rates(num_slides: usize, avg_narration_chars: usize, rates: &CostRates) -> Self {
        let transition_count = num_slides.saturating_sub(1);
        let total_chars = num_slides * avg_narration_chars;

        let slides = rates.per_slide * Decimal::from(num_slides);
        let transitions = rates.per_transition * Decimal::from(transition_count);
        let voiceovers =
            Decimal::from(total_chars) / dec!(1000) * rates.per_thousand_chars;

        Self {
            slide_count: num_slides,
            transition_count,
            total_chars,
            slides,
            transitions,
            voiceovers,
            total: slides + transitions + voiceovers,
        }
    }
}

impl std::fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let usd = |d: Decimal| format!("${}", d.round_dp(2));
        writeln!(f, "Slides ({}):      {}", self.slide_count, usd(self.slides))?;
        writeln!(
            f,
            "Transitions ({}): {}",
            self.transition_count,
            usd(self.transitions)
        )?;
        writeln!(
            f,
            "Voiceover ({} chars): {}",
            self.total_chars,
            usd(self.voiceovers)
        )?;
        write!(f, "Total:           {}", usd(self.total))
    }
}

/// Estimate the cost of generating `num_slides` slides with default rates.
pub fn estimate_cost(num_slides: usize, avg_narration_chars: usize) -> CostEstimate {
    CostEstimate::with_rates(num_slides, avg_narration_chars, &CostRates::default())
}
