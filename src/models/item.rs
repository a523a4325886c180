use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiResult, Violations};

use super::{nullable, pk, text};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Item {
    pub id: i64,
    #[serde(rename = "plant")]
    pub plant_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemPayload {
    pub plant: Option<Value>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
}

#[derive(Debug)]
pub struct NewItem {
    pub plant_id: i64,
    pub name: String,
    pub description: Option<String>,
}

impl ItemPayload {
    pub fn into_new(self) -> ApiResult<NewItem> {
        // ---
        let mut v = Violations::new();
        v.require("plant", &self.plant);
        v.require("name", &self.name);

        let plant_id = self.plant.as_ref().and_then(|p| pk(&mut v, "plant", p));
        let name = text(&mut v, "name", self.name);
        let description = self.description.flatten();

        let new_item = plant_id.zip(name).map(|(plant_id, name)| NewItem {
            plant_id,
            name,
            description,
        });
        v.conclude(new_item)
    }

    /// Copy the supplied fields onto `item`. A changed `plant` still has to be
    /// checked for ownership by the caller.
    pub fn apply_to(self, item: &mut Item) -> ApiResult<()> {
        // ---
        let mut v = Violations::new();
        let plant_id = self.plant.as_ref().and_then(|p| pk(&mut v, "plant", p));
        let name = text(&mut v, "name", self.name);
        v.finish()?;

        if let Some(plant_id) = plant_id {
            item.plant_id = plant_id;
        }
        if let Some(name) = name {
            item.name = name;
        }
        if let Some(description) = self.description {
            item.description = description;
        }
        Ok(())
    }
}
