//! Token usage and cost tracking types.

use serde::{Deserialize, Serialize};

/// Token usage reported by one provider exchange.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Running token and cost counters for a whole run.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RunTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub requests: u64,
}

impl RunTotals {
    /// Accumulate one exchange, priced per token.
    pub fn record(&mut self, usage: &Usage, input_price: f64, output_price: f64) {
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
        self.input_cost += usage.input_tokens as f64 * input_price;
        self.output_cost += usage.output_tokens as f64 * output_price;
        self.requests += 1;
    }

    pub fn total_cost(&self) -> f64 {
        self.input_cost + self.output_cost
    }
}

impl std::fmt::Display for RunTotals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tokens In={}(${:06.4}), Out={}(${:06.4}) Total=${:06.4}",
            self.input_tokens,
            self.input_cost,
            self.output_tokens,
            self.output_cost,
            self.total_cost()
        )
    }
}
