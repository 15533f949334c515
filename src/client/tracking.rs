//! Day Tracking Client
//!
//! Meals, workouts and calorie totals for one calendar day, plus the
//! Monday-to-Sunday ring strip shown above the day view.

use chrono::{Datelike, Duration, NaiveDate};
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};

use super::{ApiClient, ClientResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MealLabel {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

/// The backend sends `null` for unset numbers and strings
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_servings<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or_else(default_servings))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub recipe_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<MealLabel>,
    #[serde(default, deserialize_with = "nullable")]
    pub time: String,
    #[serde(default, deserialize_with = "nullable")]
    pub calories: u32,
    #[serde(default = "default_servings", deserialize_with = "nullable_servings")]
    pub servings: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

fn default_servings() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub exercise_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub set_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub time: String,
    #[serde(default, deserialize_with = "nullable")]
    pub duration_min: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories_burned: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    pub total_sets: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub sets: Vec<ExerciseSet>,
}

/// Everything recorded for one day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DayTracking {
    pub id: Option<String>,
    /// ISO date, yyyy-MM-dd
    #[serde(deserialize_with = "nullable")]
    pub date: String,
    #[serde(deserialize_with = "nullable")]
    pub calories_in: u32,
    #[serde(deserialize_with = "nullable")]
    pub calories_target: u32,
    #[serde(deserialize_with = "nullable")]
    pub calories_out: u32,
    #[serde(deserialize_with = "nullable")]
    pub total_workout_minutes: u32,
    #[serde(deserialize_with = "nullable")]
    pub total_sets: u32,
    #[serde(deserialize_with = "nullable")]
    pub meals: Vec<MealEntry>,
    #[serde(deserialize_with = "nullable")]
    pub workouts: Vec<WorkoutEntry>,
}

impl DayTracking {
    /// Target minus intake plus what workouts burned; negative when over
    pub fn calories_remaining(&self) -> i64 {
        i64::from(self.calories_target) - i64::from(self.calories_in)
            + i64::from(self.calories_out)
    }

    pub fn trained(&self) -> bool {
        self.total_workout_minutes > 0
    }
}

const DAY_LABELS: [&str; 7] = ["L", "M", "M", "J", "V", "S", "D"];

/// One day of the weekly progress strip
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekRing {
    pub date: NaiveDate,
    pub label: &'static str,
    pub calories_in: u32,
    pub calories_target: u32,
    pub trained: bool,
}

impl WeekRing {
    /// Grey ring for a day without data
    pub fn empty(date: NaiveDate) -> Self {
        WeekRing {
            date,
            label: DAY_LABELS[date.weekday().num_days_from_monday() as usize],
            calories_in: 0,
            calories_target: 0,
            trained: false,
        }
    }

    pub fn from_day(date: NaiveDate, day: &DayTracking) -> Self {
        WeekRing {
            calories_in: day.calories_in,
            calories_target: day.calories_target,
            trained: day.trained(),
            ..WeekRing::empty(date)
        }
    }

    /// Share of the target reached, as degrees of the ring (0 to 360)
    pub fn progress_degrees(&self) -> f64 {
        if self.calories_target == 0 {
            return 0.0;
        }
        let ratio = f64::from(self.calories_in) / f64::from(self.calories_target);
        ratio.min(1.0) * 360.0
    }
}

/// Monday to Sunday of the week containing `date`
pub fn week_of(date: NaiveDate) -> [NaiveDate; 7] {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    std::array::from_fn(|i| monday + Duration::days(i as i64))
}

/// Client for `day-tracking`, mounted at the API root (`/api`), not
/// under the public prefix
pub struct TrackingClient {
    api: ApiClient,
}

impl TrackingClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn day_path(date: NaiveDate, rest: &str) -> String {
        format!("day-tracking/{}{}", date.format("%Y-%m-%d"), rest)
    }

    pub async fn day(&self, date: NaiveDate) -> ClientResult<DayTracking> {
        let path = Self::day_path(date, "");
        self.api.send_json(self.api.request(Method::GET, &path)).await
    }

    pub async fn meal(&self, date: NaiveDate, meal_id: &str) -> ClientResult<MealEntry> {
        let path = Self::day_path(date, &format!("/meals/{}", urlencoding::encode(meal_id)));
        self.api.send_json(self.api.request(Method::GET, &path)).await
    }

    pub async fn add_meal(&self, date: NaiveDate, meal: &MealEntry) -> ClientResult<DayTracking> {
        tracing::info!(date = %date, recipe = %meal.recipe_name, "Adding meal");
        let path = Self::day_path(date, "/meals");
        let request = self.api.request(Method::POST, &path).json(meal);
        self.api.send_json(request).await
    }

    pub async fn update_meal(
        &self,
        date: NaiveDate,
        meal_id: &str,
        meal: &MealEntry,
    ) -> ClientResult<DayTracking> {
        tracing::info!(date = %date, meal_id = %meal_id, "Updating meal");
        let path = Self::day_path(date, &format!("/meals/{}", urlencoding::encode(meal_id)));
        let request = self.api.request(Method::PUT, &path).json(meal);
        self.api.send_json(request).await
    }

    pub async fn delete_meal(&self, date: NaiveDate, meal_id: &str) -> ClientResult<DayTracking> {
        tracing::info!(date = %date, meal_id = %meal_id, "Deleting meal");
        let path = Self::day_path(date, &format!("/meals/{}", urlencoding::encode(meal_id)));
        self.api.send_json(self.api.request(Method::DELETE, &path)).await
    }

    pub async fn add_workout(
        &self,
        date: NaiveDate,
        workout: &WorkoutEntry,
    ) -> ClientResult<DayTracking> {
        tracing::info!(date = %date, workout = %workout.name, "Adding workout");
        let path = Self::day_path(date, "/workouts");
        let request = self.api.request(Method::POST, &path).json(workout);
        self.api.send_json(request).await
    }

    /// Rings for the week containing `date`; days that fail to load stay empty
    pub async fn week_rings(&self, date: NaiveDate) -> Vec<WeekRing> {
        let mut rings = Vec::with_capacity(7);
        for day in week_of(date) {
            let ring = match self.day(day).await {
                Ok(tracking) => WeekRing::from_day(day, &tracking),
                Err(e) => {
                    tracing::debug!(date = %day, "No tracking data: {}", e);
                    WeekRing::empty(day)
                }
            };
            rings.push(ring);
        }
        rings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::authed_client;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn day_json(date: &str, calories_in: u32, minutes: u32) -> serde_json::Value {
        json!({
            "id": "d-1",
            "date": date,
            "caloriesIn": calories_in,
            "caloriesTarget": 2000,
            "caloriesOut": 300,
            "totalWorkoutMinutes": minutes,
            "totalSets": 0,
            "meals": [],
            "workouts": []
        })
    }

    #[test]
    fn test_calories_remaining() {
        let day = DayTracking {
            calories_in: 1800,
            calories_target: 2000,
            calories_out: 300,
            ..DayTracking::default()
        };
        assert_eq!(day.calories_remaining(), 500);

        let over = DayTracking {
            calories_in: 2600,
            calories_target: 2000,
            ..DayTracking::default()
        };
        assert_eq!(over.calories_remaining(), -600);
    }

    #[test]
    fn test_week_of_starts_monday() {
        // 2025-01-15 is a Wednesday
        let week = week_of(date("2025-01-15"));
        assert_eq!(week[0], date("2025-01-13"));
        assert_eq!(week[6], date("2025-01-19"));

        // Sunday belongs to the week that started six days earlier
        assert_eq!(week_of(date("2025-01-19"))[0], date("2025-01-13"));
    }

    #[test]
    fn test_ring_progress() {
        let ring = WeekRing {
            calories_in: 3000,
            calories_target: 2000,
            ..WeekRing::empty(date("2025-01-13"))
        };
        assert_eq!(ring.label, "L");
        assert_eq!(ring.progress_degrees(), 360.0);
        assert_eq!(WeekRing::empty(date("2025-01-19")).progress_degrees(), 0.0);
        assert_eq!(WeekRing::empty(date("2025-01-19")).label, "D");
    }

    #[test]
    fn test_meal_serializes_camel_case() {
        let meal = MealEntry {
            recipe_name: "Harira".into(),
            label: Some(MealLabel::Dinner),
            time: "20:00".into(),
            calories: 450,
            servings: 1,
            ..MealEntry::default()
        };
        let value = serde_json::to_value(&meal).unwrap();
        assert_eq!(value["recipeName"], "Harira");
        assert_eq!(value["label"], "DINNER");
        assert!(value.get("id").is_none());
        assert!(value.get("protein").is_none());
    }

    #[tokio::test]
    async fn test_day_and_add_meal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/day-tracking/2025-01-15"))
            .respond_with(ResponseTemplate::new(200).set_body_json(day_json("2025-01-15", 0, 0)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/day-tracking/2025-01-15/meals"))
            .and(body_partial_json(json!({ "recipeName": "Harira", "calories": 450 })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(day_json("2025-01-15", 450, 0)),
            )
            .mount(&server)
            .await;

        let (api, _) = authed_client(&format!("{}/api/", server.uri()));
        let client = TrackingClient::new(api);

        let day = client.day(date("2025-01-15")).await.unwrap();
        assert_eq!(day.calories_target, 2000);

        let meal = MealEntry {
            recipe_name: "Harira".into(),
            calories: 450,
            servings: 1,
            ..MealEntry::default()
        };
        let updated = client.add_meal(date("2025-01-15"), &meal).await.unwrap();
        assert_eq!(updated.calories_in, 450);
    }

    #[tokio::test]
    async fn test_update_and_delete_meal() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/day-tracking/2025-01-15/meals/m-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(day_json("2025-01-15", 500, 0)),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/day-tracking/2025-01-15/meals/m-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(day_json("2025-01-15", 0, 0)))
            .expect(1)
            .mount(&server)
            .await;

        let (api, _) = authed_client(&format!("{}/api/", server.uri()));
        let client = TrackingClient::new(api);

        let meal = MealEntry {
            recipe_name: "Harira".into(),
            calories: 500,
            servings: 1,
            ..MealEntry::default()
        };
        let updated = client
            .update_meal(date("2025-01-15"), "m-1", &meal)
            .await
            .unwrap();
        assert_eq!(updated.calories_in, 500);

        let after = client.delete_meal(date("2025-01-15"), "m-1").await.unwrap();
        assert!(after.meals.is_empty());
    }

    #[test]
    fn test_null_fields_decode_as_defaults() {
        let day: DayTracking = serde_json::from_value(json!({
            "id": "d-1",
            "date": "2025-01-15",
            "caloriesIn": 450,
            "caloriesTarget": null,
            "caloriesOut": null,
            "totalWorkoutMinutes": null,
            "totalSets": null,
            "meals": [{
                "id": "m-1",
                "recipeName": "Harira",
                "label": null,
                "time": null,
                "calories": null,
                "servings": null,
                "protein": null
            }],
            "workouts": [{
                "id": "w-1",
                "name": null,
                "time": null,
                "durationMin": null,
                "caloriesBurned": null,
                "totalSets": null,
                "sets": null
            }]
        }))
        .unwrap();

        assert_eq!(day.calories_in, 450);
        assert_eq!(day.calories_target, 0);
        assert_eq!(day.calories_remaining(), -450);

        let meal = &day.meals[0];
        assert_eq!(meal.time, "");
        assert_eq!(meal.calories, 0);
        assert_eq!(meal.servings, 1);
        assert_eq!(meal.label, None);

        let workout = &day.workouts[0];
        assert_eq!(workout.duration_min, 0);
        assert!(workout.name.is_empty());
        assert!(workout.sets.is_empty());
        assert!(!day.trained());

        let empty: DayTracking = serde_json::from_value(json!({ "meals": null })).unwrap();
        assert!(empty.meals.is_empty());
    }

    #[tokio::test]
    async fn test_get_meal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/day-tracking/2025-01-15/meals/m-1"))
            .and(header("Authorization", "Bearer aaa.bbb.ccc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m-1",
                "recipeName": "Msemen au miel",
                "label": "BREAKFAST",
                "time": "08:30",
                "calories": 380,
                "servings": 2,
                "imageUrl": null
            })))
            .mount(&server)
            .await;

        let (api, _) = authed_client(&format!("{}/api/", server.uri()));
        let meal = TrackingClient::new(api)
            .meal(date("2025-01-15"), "m-1")
            .await
            .unwrap();

        assert_eq!(meal.id.as_deref(), Some("m-1"));
        assert_eq!(meal.recipe_name, "Msemen au miel");
        assert_eq!(meal.label, Some(MealLabel::Breakfast));
        assert_eq!(meal.calories, 380);
        assert_eq!(meal.servings, 2);
        assert_eq!(meal.image_url, None);
    }

    #[tokio::test]
    async fn test_add_workout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/day-tracking/2025-01-15/workouts"))
            .and(body_partial_json(json!({
                "name": "Jambes",
                "time": "18:00",
                "durationMin": 30,
                "totalSets": 1,
                "sets": [{ "exerciseName": "Squat", "setNumber": 1, "reps": 12, "weightKg": 40.0 }]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(day_json("2025-01-15", 0, 30)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (api, _) = authed_client(&format!("{}/api/", server.uri()));
        let workout = WorkoutEntry {
            name: "Jambes".into(),
            time: "18:00".into(),
            duration_min: 30,
            total_sets: 1,
            sets: vec![ExerciseSet {
                exercise_name: "Squat".into(),
                set_number: 1,
                reps: Some(12),
                weight_kg: Some(40.0),
                ..ExerciseSet::default()
            }],
            ..WorkoutEntry::default()
        };

        let day = TrackingClient::new(api)
            .add_workout(date("2025-01-15"), &workout)
            .await
            .unwrap();
        assert_eq!(day.total_workout_minutes, 30);
        assert!(day.trained());
    }

    #[tokio::test]
    async fn test_week_rings_fill_missing_days() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/day-tracking/2025-01-14"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(day_json("2025-01-14", 1900, 45)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (api, _) = authed_client(&format!("{}/api/", server.uri()));
        let rings = TrackingClient::new(api).week_rings(date("2025-01-15")).await;

        assert_eq!(rings.len(), 7);
        assert_eq!(rings[1].calories_in, 1900);
        assert!(rings[1].trained);
        assert_eq!(rings[0], WeekRing::empty(date("2025-01-13")));
        let labels: Vec<_> = rings.iter().map(|r| r.label).collect();
        assert_eq!(labels, DAY_LABELS);
    }
}
