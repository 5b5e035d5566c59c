use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::models::Plan;
use crate::notifications::Notice;

/// key: billing-state -> account lifecycle
///
/// Accounts start out `unpaid`; no state is terminal, every transition is
/// allowed from every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingState {
    Unpaid,
    Trial,
    Paid,
}

/// Outcome of a state-machine step: the next state plus the notice the
/// caller should emit, if any. Suppression for disposable addresses happens
/// at the dispatch site, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: BillingState,
    pub notice: Option<Notice>,
}

impl BillingState {
    pub fn pay(self) -> Transition {
        Transition {
            next: BillingState::Paid,
            notice: Some(Notice::PaymentSucceeded),
        }
    }

    pub fn unpay(self) -> Transition {
        Transition {
            next: BillingState::Unpaid,
            notice: Some(Notice::PaymentLapsed),
        }
    }

    pub fn start_trial(self) -> Transition {
        Transition {
            next: BillingState::Trial,
            notice: None,
        }
    }

    /// Plans with a trial window put the account into `trial`; free plans
    /// drop it back to `unpaid`. A paid plan without a trial leaves the
    /// current state alone.
    pub fn on_plan_change(self, plan: &Plan) -> Transition {
        let next = if plan.trial_period_days > 0 {
            BillingState::Trial
        } else if plan.is_free() {
            BillingState::Unpaid
        } else {
            self
        };
        Transition { next, notice: None }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingState::Unpaid => "unpaid",
            BillingState::Trial => "trial",
            BillingState::Paid => "paid",
        }
    }
}

impl fmt::Display for BillingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown billing state `{0}`")]
pub struct UnknownBillingState(pub String);

impl FromStr for BillingState {
    type Err = UnknownBillingState;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "unpaid" => Ok(BillingState::Unpaid),
            "trial" => Ok(BillingState::Trial),
            "paid" => Ok(BillingState::Paid),
            other => Err(UnknownBillingState(other.to_string())),
        }
    }
}
