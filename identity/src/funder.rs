//! Sub-account topup, `§4.6`. Account 0 is the funder; every other
//! sub-account is kept above `minSedaPerAccount` by direct bank sends from
//! the funder, gated on the funder itself holding a safety margin.

use log::{info, warn};
use serde_json::json;

use seda_overlay_chain::{ChainClient, TxDispatcher};
use seda_overlay_common::model::{GasOption, Priority};

use crate::error::IdentityError;

/// One sub-account's funding need for this pass, or `None` if it is already
/// at or above `minSedaPerAccount`.
#[derive(Debug, Clone, Copy)]
pub struct SubAccountFundingPlan {
    pub signer_index: u32,
    pub shortfall: u128,
}

/// Tops up every under-funded sub-account from account 0.
///
/// Refuses outright if the funder's own balance is below
/// `2 * min_seda_per_account`, since draining it below that would risk the
/// funder itself falling short before the next pass.
pub async fn ensure_funded(
    client: &dyn ChainClient,
    dispatcher: &TxDispatcher,
    funder_address: &str,
    sub_account_addresses: &[(u32, String)],
    min_seda_per_account: u128,
) -> Result<Vec<SubAccountFundingPlan>, IdentityError> {
    let funder_balance = client.get_balance(funder_address).await?;
    if funder_balance < 2 * min_seda_per_account {
        warn!(
            "funder balance {funder_balance} below safety margin {}, skipping sub-account topup",
            2 * min_seda_per_account
        );
        return Ok(Vec::new());
    }

    let mut plans = Vec::new();
    for (index, address) in sub_account_addresses {
        if *index == 0 {
            continue;
        }
        let balance = client.get_balance(address).await?;
        if balance < min_seda_per_account {
            plans.push(SubAccountFundingPlan {
                signer_index: *index,
                shortfall: min_seda_per_account,
            });
        }
    }

    for plan in &plans {
        let address = sub_account_addresses
            .iter()
            .find(|(i, _)| *i == plan.signer_index)
            .map(|(_, a)| a.clone())
            .unwrap_or_default();

        info!(
            "topping up sub-account {} ({address}) with {}",
            plan.signer_index, plan.shortfall
        );

        let message = json!({
            "type": "bank_send",
            "from_address": funder_address,
            "to_address": address,
            "amount": plan.shortfall.to_string(),
        });

        dispatcher
            .queue_message(vec![message], Priority::Low, 0, GasOption::Auto)
            .await?;
    }

    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn funding_plan_carries_full_minimum_not_partial_shortfall() {
        let plan = SubAccountFundingPlan {
            signer_index: 3,
            shortfall: 1_000_000_000_000_000_000,
        };
        assert_eq!(plan.shortfall, 1_000_000_000_000_000_000);
    }
}
