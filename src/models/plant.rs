use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiResult, Violations};

use super::{choice, text};

choice_enum!(PlantType {
    Recycling => "recycling",
    Manufacturing => "manufacturing",
});

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Plant {
    // ---
    pub id: i64,
    pub name: String,
    pub location: String,
    #[sqlx(try_from = "String")]
    pub plant_type: PlantType,
    #[serde(rename = "user")]
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable plant fields. The owner is never taken from the payload.
#[derive(Debug, Default, Deserialize)]
pub struct PlantPayload {
    pub name: Option<String>,
    pub location: Option<String>,
    pub plant_type: Option<String>,
}

#[derive(Debug)]
pub struct NewPlant {
    pub name: String,
    pub location: String,
    pub plant_type: PlantType,
}

impl PlantPayload {
    pub fn into_new(self) -> ApiResult<NewPlant> {
        // ---
        let mut v = Violations::new();
        v.require("name", &self.name);
        v.require("location", &self.location);
        v.require("plant_type", &self.plant_type);

        let name = text(&mut v, "name", self.name);
        let location = text(&mut v, "location", self.location);
        let plant_type = choice(&mut v, "plant_type", self.plant_type);

        let new_plant = name
            .zip(location)
            .zip(plant_type)
            .map(|((name, location), plant_type)| NewPlant {
                name,
                location,
                plant_type,
            });
        v.conclude(new_plant)
    }

    /// Copy the supplied fields onto `plant`; absent fields are untouched.
    pub fn apply_to(self, plant: &mut Plant) -> ApiResult<()> {
        // ---
        let mut v = Violations::new();
        let name = text(&mut v, "name", self.name);
        let location = text(&mut v, "location", self.location);
        let plant_type = choice(&mut v, "plant_type", self.plant_type);
        v.finish()?;

        if let Some(name) = name {
            plant.name = name;
        }
        if let Some(location) = location {
            plant.location = location;
        }
        if let Some(plant_type) = plant_type {
            plant.plant_type = plant_type;
        }
        Ok(())
    }
}
