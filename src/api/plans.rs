use axum::{ extract::Query, Json };
use serde::Deserialize;

use crate::enums::Network;
use crate::error::Result;
use crate::plans::{ self, DataPlan };

#[derive(Deserialize)]
pub struct PlanQuery {
    pub network: String,
}

pub async fn list_data_plans(Query(query): Query<PlanQuery>) -> Result<Json<Vec<&'static DataPlan>>> {
    let network: Network = query.network.parse()?;

    Ok(Json(plans::plans_for(network)))
}
