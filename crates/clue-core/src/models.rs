//! Entities read by the listing and region-search paths.

use chrono::{DateTime, Utc};
use clue_geo::{GeoPoint, Wgs84};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A clue project (`admin.project`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub desc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub happened_at: Option<DateTime<Utc>>,
    pub category: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Stored as WGS-84 `geography(Point, 4326)`.
    #[serde(default, with = "geojson_point", skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint<Wgs84>>,
    /// Present only when the `creator` relation was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

/// An admin user (`admin.users`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

/// Creator view eager-loaded onto projects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// `Option<GeoPoint<Wgs84>>` as a GeoJSON `Point`.
mod geojson_point {
    use clue_geo::{GeoPoint, Wgs84};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Point {
        #[serde(rename = "type")]
        kind: String,
        coordinates: [f64; 2],
    }

    pub fn serialize<S: Serializer>(
        value: &Option<GeoPoint<Wgs84>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value
            .map(|p| Point {
                kind: "Point".to_string(),
                coordinates: p.position(),
            })
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<GeoPoint<Wgs84>>, D::Error> {
        let Some(point) = Option::<Point>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if point.kind != "Point" {
            return Err(D::Error::custom(format!(
                "expected GeoJSON Point, got {}",
                point.kind
            )));
        }
        let [lng, lat] = point.coordinates;
        GeoPoint::try_new(lat, lng).map(Some).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_project() -> Project {
        let now = DateTime::parse_from_rfc3339("2024-03-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Project {
            id: Uuid::nil(),
            name: "Bridge survey".to_string(),
            desc: "Pier inspection".to_string(),
            happened_at: None,
            category: "infrastructure".to_string(),
            region: "zhoushan".to_string(),
            website: None,
            location: Some(GeoPoint::new(30.0, 122.1)),
            creator: None,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        }
    }

    #[test]
    fn test_project_serializes_camel_case_and_geojson() {
        let json = serde_json::to_value(sample_project()).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("isDeleted").is_some());
        assert!(json.get("happenedAt").is_none());
        assert_eq!(
            json["location"],
            serde_json::json!({"type": "Point", "coordinates": [122.1, 30.0]})
        );
    }

    #[test]
    fn test_project_deserializes_location() {
        let project = sample_project();
        let json = serde_json::to_string(&project).unwrap();
        let back: Project = serde_json::from_str(&json).unwrap();
        assert_eq!(back, project);
    }

    #[test]
    fn test_project_without_location() {
        let mut project = sample_project();
        project.location = None;
        let json = serde_json::to_value(&project).unwrap();
        assert!(json.get("location").is_none());

        let back: Project = serde_json::from_value(json).unwrap();
        assert_eq!(back.location, None);
    }

    #[test]
    fn test_rejects_non_point_geometry() {
        let mut json = serde_json::to_value(sample_project()).unwrap();
        json["location"]["type"] = serde_json::json!("LineString");
        assert!(serde_json::from_value::<Project>(json).is_err());
    }

    #[test]
    fn test_user_summary_from_user() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: "lwang".to_string(),
            first_name: "Li".to_string(),
            last_name: "Wang".to_string(),
            status: "active".to_string(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
        };
        let summary = UserSummary::from(&user);
        assert_eq!(summary.id, user.id);
        assert_eq!(summary.username, "lwang");
    }
}
