use std::collections::HashMap;

use lazy_static::lazy_static;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::enums::Network;
use crate::error::{ AppError, Result };

#[derive(Debug, Clone, Serialize)]
pub struct DataPlan {
    pub id: &'static str,
    pub network: Network,
    pub name: &'static str,
    pub validity_days: u16,
    pub price: Decimal,
}

fn plan(
    id: &'static str,
    network: Network,
    name: &'static str,
    validity_days: u16,
    price: i64
) -> DataPlan {
    DataPlan {
        id,
        network,
        name,
        validity_days,
        price: Decimal::from(price),
    }
}

lazy_static! {
    pub static ref DATA_PLANS: HashMap<&'static str, DataPlan> = {
        let plans = vec![
            // MTN SME
            plan("mtn-500mb-30d", Network::Mtn, "500MB", 30, 150),
            plan("mtn-1gb-30d", Network::Mtn, "1GB", 30, 280),
            plan("mtn-2gb-30d", Network::Mtn, "2GB", 30, 560),
            plan("mtn-5gb-30d", Network::Mtn, "5GB", 30, 1400),
            plan("mtn-10gb-30d", Network::Mtn, "10GB", 30, 2800),
            // GLO corporate gifting
            plan("glo-1gb-30d", Network::Glo, "1GB", 30, 270),
            plan("glo-2gb-30d", Network::Glo, "2GB", 30, 540),
            plan("glo-5gb-30d", Network::Glo, "5GB", 30, 1350),
            plan("glo-10gb-30d", Network::Glo, "10GB", 30, 2700),
            // Airtel
            plan("airtel-1gb-30d", Network::Airtel, "1GB", 30, 300),
            plan("airtel-2gb-30d", Network::Airtel, "2GB", 30, 600),
            plan("airtel-5gb-30d", Network::Airtel, "5GB", 30, 1500),
            plan("airtel-10gb-30d", Network::Airtel, "10GB", 30, 3000),
            // 9mobile
            plan("9mobile-1gb-30d", Network::NineMobile, "1GB", 30, 300),
            plan("9mobile-2gb-30d", Network::NineMobile, "2GB", 30, 600),
            plan("9mobile-5gb-30d", Network::NineMobile, "5GB", 30, 1500),
        ];

        plans.into_iter().map(|p| (p.id, p)).collect()
    };
}

/// Look up a plan and make sure it belongs to `network`.
pub fn find_plan(plan_id: &str, network: Network) -> Result<&'static DataPlan> {
    let plan = DATA_PLANS.get(plan_id).ok_or_else(||
        AppError::validation("plan_id", format!("Unknown data plan: {}", plan_id))
    )?;

    if plan.network != network {
        return Err(
            AppError::validation(
                "plan_id",
                format!("Data plan {} is not available on {}", plan_id, network)
            )
        );
    }

    Ok(plan)
}

/// Plans for one network, cheapest first.
pub fn plans_for(network: Network) -> Vec<&'static DataPlan> {
    let mut plans: Vec<&'static DataPlan> = DATA_PLANS.values()
        .filter(|p| p.network == network)
        .collect();
    plans.sort_by(|a, b| a.price.cmp(&b.price).then(a.id.cmp(b.id)));
    plans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_network_has_plans() {
        for network in Network::all() {
            assert!(!plans_for(*network).is_empty(), "no plans for {}", network);
        }
    }

    #[test]
    fn test_plan_must_match_network() {
        assert_eq!(find_plan("mtn-1gb-30d", Network::Mtn).unwrap().price, Decimal::from(280));
        assert!(find_plan("mtn-1gb-30d", Network::Glo).is_err());
        assert!(find_plan("mtn-100tb", Network::Mtn).is_err());
    }

    #[test]
    fn test_plans_sorted_by_price() {
        let prices: Vec<Decimal> = plans_for(Network::Airtel).iter().map(|p| p.price).collect();
        let mut sorted = prices.clone();
        sorted.sort();
        assert_eq!(prices, sorted);
    }
}
