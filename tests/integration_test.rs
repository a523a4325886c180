//! End-to-end checks against a running server.
//!
//! Start the service (with a database) and run:
//! `BASE_URL=http://localhost:8080 cargo test -- --ignored`

use anyhow::Result;
use chrono::{Duration, Utc};
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};

fn base_url() -> String {
    std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".into())
}

async fn register_account(
    client: &Client,
    email: &str,
    username: &str,
) -> Result<(StatusCode, Value)> {
    // ---
    let resp = client
        .post(format!("{}/api/auth/register", base_url()))
        .json(&json!({ "email": email, "username": username, "password": "s3cret-pass" }))
        .send()
        .await?;
    let status = resp.status();
    Ok((status, resp.json().await.unwrap_or(Value::Null)))
}

/// A freshly registered account with its token pair.
struct Session {
    client: Client,
    access: String,
    refresh: String,
    username: String,
}

impl Session {
    async fn register() -> Result<Session> {
        // ---
        let client = Client::new();
        let tag = uuid::Uuid::new_v4().simple().to_string();
        let username = format!("user_{}", &tag[..12]);
        let email = format!("{}@example.com", username);
        // Domains compare case-insensitively.
        let login_email = format!("{}@EXAMPLE.com", username);

        let (status, _) = register_account(&client, &email, &username).await?;
        assert_eq!(status, StatusCode::CREATED);

        let login: Value = client
            .post(format!("{}/api/auth/login", base_url()))
            .json(&json!({ "email": login_email, "password": "s3cret-pass" }))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(login["user"]["username"], json!(username));

        Ok(Session {
            client,
            access: login["access_token"].as_str().unwrap_or_default().to_string(),
            refresh: login["refresh_token"].as_str().unwrap_or_default().to_string(),
            username,
        })
    }

    async fn get(&self, path: &str) -> Result<(StatusCode, Value)> {
        let resp = self
            .client
            .get(format!("{}/api{}", base_url(), path))
            .bearer_auth(&self.access)
            .send()
            .await?;
        let status = resp.status();
        Ok((status, resp.json().await.unwrap_or(Value::Null)))
    }

    async fn send(&self, method: Method, path: &str, body: Value) -> Result<(StatusCode, Value)> {
        let resp = self
            .client
            .request(method, format!("{}/api{}", base_url(), path))
            .bearer_auth(&self.access)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        Ok((status, resp.json().await.unwrap_or(Value::Null)))
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let (status, value) = self.send(Method::POST, path, body).await?;
        assert_eq!(status, StatusCode::CREATED, "POST {} -> {}", path, value);
        Ok(value)
    }

    /// Plant plus one sensor on it; returns `(plant_id, sensor_id)`.
    async fn plant_with_sensor(&self) -> Result<(i64, i64)> {
        // ---
        let plant = self
            .post(
                "/plants",
                json!({ "name": "North Yard", "location": "Pune", "plant_type": "recycling" }),
            )
            .await?;
        let plant_id = plant["id"].as_i64().unwrap_or_default();
        let sensor = self
            .post(
                "/sensors",
                json!({ "name": "Belt 1", "plant": plant_id, "location_type": "conveyer_belt" }),
            )
            .await?;
        Ok((plant_id, sensor["id"].as_i64().unwrap_or_default()))
    }
}

#[tokio::test]
#[ignore = "requires a running server at BASE_URL"]
async fn me_returns_registered_profile() -> Result<()> {
    // ---
    let session = Session::register().await?;

    let (status, me) = session.get("/auth/me").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], json!(session.username));
    assert_eq!(me["role"], json!("user"));
    assert!(me.get("password_hash").is_none());
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running server at BASE_URL"]
async fn duplicate_email_or_username_is_rejected() -> Result<()> {
    // ---
    let existing = Session::register().await?;
    let tag = uuid::Uuid::new_v4().simple().to_string();
    let fresh_name = format!("user_{}", &tag[..12]);
    let fresh_email = format!("{}@example.com", fresh_name);
    let taken_email = format!("{}@example.com", existing.username);

    let (status, body) = register_account(&existing.client, &taken_email, &fresh_name).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["email"].is_array(), "{}", body);

    let (status, body) =
        register_account(&existing.client, &fresh_email, &existing.username).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["username"].is_array(), "{}", body);

    let (status, body) = register_account(&existing.client, &fresh_email, &fresh_name).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["username"], json!(fresh_name));
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running server at BASE_URL"]
async fn other_users_resources_are_not_found() -> Result<()> {
    // ---
    let owner = Session::register().await?;
    let intruder = Session::register().await?;
    let (plant_id, sensor_id) = owner.plant_with_sensor().await?;

    let item = owner
        .post("/items", json!({ "plant": plant_id, "name": "PET bottles" }))
        .await?;
    let reading = owner
        .post("/sensor-data", json!({ "sensor": sensor_id, "category_a": 1 }))
        .await?;
    let energy = owner
        .post("/energy-consumption", json!({ "sensor": sensor_id, "energy_kwh": "4.20" }))
        .await?;

    let owned = [
        (format!("/plants/{}", plant_id), json!({ "name": "Taken" })),
        (format!("/sensors/{}", sensor_id), json!({ "name": "Taken" })),
        (format!("/items/{}", item["id"]), json!({ "name": "Taken" })),
        (format!("/sensor-data/{}", reading["id"]), json!({ "category_a": 9 })),
        (
            format!("/energy-consumption/{}", energy["id"]),
            json!({ "energy_kwh": "9.99" }),
        ),
    ];

    for (path, change) in &owned {
        let (status, body) = intruder.get(path).await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "GET {}", path);
        assert!(body["error"].is_string());

        let (status, _) = intruder.send(Method::PATCH, path, change.clone()).await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "PATCH {}", path);

        let (status, _) = intruder.send(Method::DELETE, path, json!({})).await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "DELETE {}", path);
    }

    // Nothing the intruder tried touched the owner's rows.
    for (path, _) in &owned {
        let (status, _) = owner.get(path).await?;
        assert_eq!(status, StatusCode::OK, "owner GET {}", path);
    }
    let (_, plant) = owner.get(&format!("/plants/{}", plant_id)).await?;
    assert_eq!(plant["name"], json!("North Yard"));

    for list in ["/plants", "/sensors", "/items", "/energy-consumption"] {
        let (status, rows) = intruder.get(list).await?;
        assert_eq!(status, StatusCode::OK, "{}", list);
        let empty = rows.as_array().map(Vec::is_empty).unwrap_or(rows["count"] == json!(0));
        assert!(empty, "{} leaked {}", list, rows);
    }
    let (_, page) = intruder.get("/sensor-data").await?;
    assert_eq!(page["count"], json!(0));

    // Attaching a sensor to somebody else's plant is a field error.
    let (status, body) = intruder
        .send(
            Method::POST,
            "/sensors",
            json!({ "name": "Sneaky", "plant": plant_id, "location_type": "input" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["plant"].is_array());
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running server at BASE_URL"]
async fn sensor_data_pagination_and_filters() -> Result<()> {
    // ---
    let session = Session::register().await?;
    let (_, sensor_id) = session.plant_with_sensor().await?;

    for hour in 0..3 {
        session
            .post(
                "/sensor-data",
                json!({
                    "sensor": sensor_id,
                    "timestamp": format!("2024-03-10T{:02}:00:00Z", 8 + hour),
                    "items_processed": 10,
                    "processed_with_errors": 2,
                    "category_a": hour,
                    "category_b": 1,
                }),
            )
            .await?;
    }

    let (status, page) = session
        .get(&format!("/sensor-data?sensor={}&page_size=2", sensor_id))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], json!(3));
    assert_eq!(page["results"].as_array().map(Vec::len), Some(2));
    assert_eq!(page["next"], json!(2));
    assert!(page["previous"].is_null());
    assert_eq!(page["results"][0]["total_processed"], json!(12));

    let (status, body) = session
        .get(&format!("/sensor-data?sensor={}&page=9", sensor_id))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Invalid page." }));

    // Category A is zero for the first reading only.
    let (_, page) = session
        .get(&format!("/sensor-data?sensor={}&category=A", sensor_id))
        .await?;
    assert_eq!(page["count"], json!(2));

    // A bare end date covers the whole day.
    let (_, page) = session
        .get(&format!(
            "/sensor-data?sensor={}&start_date=2024-03-10&end_date=2024-03-10",
            sensor_id
        ))
        .await?;
    assert_eq!(page["count"], json!(3));

    let (status, points) = session
        .get(&format!("/sensor-data/metrics?metric=production&sensor={}", sensor_id))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(points.as_array().map(Vec::len), Some(3));
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running server at BASE_URL"]
async fn refresh_rotates_and_blacklists() -> Result<()> {
    // ---
    let session = Session::register().await?;
    let url = format!("{}/api/auth/token/refresh", base_url());

    let resp = session
        .client
        .post(&url)
        .json(&json!({ "refresh_token": session.refresh }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let pair: Value = resp.json().await?;
    assert!(pair["access_token"].is_string());
    assert_ne!(pair["refresh_token"], json!(session.refresh));

    // The old refresh token is spent.
    let resp = session
        .client
        .post(&url)
        .json(&json!({ "refresh_token": session.refresh }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running server at BASE_URL"]
async fn logout_revokes_refresh_token() -> Result<()> {
    // ---
    let session = Session::register().await?;

    let (status, body) = session
        .send(
            Method::POST,
            "/auth/logout",
            json!({ "refresh_token": session.refresh }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Successfully logged out" }));

    let resp = session
        .client
        .post(format!("{}/api/auth/token/refresh", base_url()))
        .json(&json!({ "refresh_token": session.refresh }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running server at BASE_URL"]
async fn failed_profile_update_changes_nothing() -> Result<()> {
    // ---
    let session = Session::register().await?;
    let other = Session::register().await?;

    let (status, body) = session
        .send(
            Method::PUT,
            "/auth/update_profile",
            json!({
                "username": format!("{}_new", session.username),
                "current_password": "wrong",
                "new_password": "another-pass",
                "confirm_password": "another-pass",
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Current password is incorrect" }));

    let (_, me) = session.get("/auth/me").await?;
    assert_eq!(me["username"], json!(session.username));

    // Taking another user's name is rejected on the field.
    let (status, body) = session
        .send(
            Method::PUT,
            "/auth/update_profile",
            json!({ "username": other.username }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["username"].is_array());
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running server at BASE_URL"]
async fn energy_plant_is_derived_from_sensor() -> Result<()> {
    // ---
    let session = Session::register().await?;
    let (plant_id, sensor_id) = session.plant_with_sensor().await?;

    let record = session
        .post(
            "/energy-consumption",
            json!({ "sensor": sensor_id, "energy_kwh": "12.50", "cost": "3.75" }),
        )
        .await?;
    assert_eq!(record["plant"], json!(plant_id));
    assert_eq!(record["energy_kwh"], json!("12.50"));

    let (status, body) = session
        .send(
            Method::POST,
            "/energy-consumption",
            json!({ "sensor": sensor_id, "plant": plant_id + 1_000_000, "energy_kwh": "1.00" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["plant"].is_array());

    let (status, rows) = session
        .get(&format!("/energy-consumption/metrics?metric=sensor-cost&sensor={}", sensor_id))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows[0]["sensor"], json!(sensor_id));
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running server at BASE_URL"]
async fn today_window_categories_and_quality_metric() -> Result<()> {
    // ---
    let session = Session::register().await?;
    let (_, sensor_id) = session.plant_with_sensor().await?;
    let two_days_ago = (Utc::now() - Duration::days(2)).to_rfc3339();

    // Only the last reading has both A and B; the first one is old.
    for (timestamp, a, b) in [
        (Some(two_days_ago), 1, 1),
        (None, 3, 0),
        (None, 0, 2),
        (None, 4, 5),
    ] {
        let mut body = json!({ "sensor": sensor_id, "category_a": a, "category_b": b });
        if let Some(timestamp) = timestamp {
            body["timestamp"] = json!(timestamp);
        }
        session.post("/sensor-data", body).await?;
    }

    let (_, page) = session
        .get(&format!("/sensor-data?sensor={}&date_filter=today", sensor_id))
        .await?;
    assert_eq!(page["count"], json!(3));

    let (_, page) = session
        .get(&format!(
            "/sensor-data?sensor={}&date_filter=today&category=A&category=B",
            sensor_id
        ))
        .await?;
    assert_eq!(page["count"], json!(1));
    assert_eq!(page["results"][0]["category_a"], json!(4));

    let (status, points) = session
        .get(&format!("/sensor-data/metrics?metric=quality&sensor={}", sensor_id))
        .await?;
    assert_eq!(status, StatusCode::OK);
    let first = points[0].as_object().cloned().unwrap_or_default();
    let mut keys: Vec<&str> = first.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        ["category_a", "category_b", "category_c", "category_d", "timestamp"]
    );

    let (status, body) = session
        .get(&format!("/sensor-data/metrics?metric=speed&sensor={}", sensor_id))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["metric"].is_array());
    Ok(())
}
