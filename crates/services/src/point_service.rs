use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument};

use learn_core::Clock;
use learn_core::model::{CourseId, Point, PointId, UserId};
use storage::repository::{DocPath, DocumentStore, collections, to_body};

use crate::error::PointServiceError;

/// Persists practice scores under freshly allocated keys.
#[derive(Clone)]
pub struct PointService {
    clock: Clock,
    documents: Arc<dyn DocumentStore>,
}

impl PointService {
    #[must_use]
    pub fn new(clock: Clock, documents: Arc<dyn DocumentStore>) -> Self {
        Self { clock, documents }
    }

    /// Save a score earned now.
    ///
    /// # Errors
    ///
    /// Returns `PointServiceError::Storage` if key allocation or the write fails.
    #[instrument(skip(self), fields(user_id = %user_id, course_id = %course_id))]
    pub async fn save_point(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        score: u32,
    ) -> Result<PointId, PointServiceError> {
        let point_id = PointId::new(self.documents.push_new(collections::POINTS).await?)?;
        let point = Point {
            user_id: user_id.clone(),
            course_id: course_id.clone(),
            score,
            earned_at: self.clock.now(),
        };
        self.documents
            .set_value(
                &DocPath::document(collections::POINTS, point_id.as_str())?,
                to_body(&point)?,
            )
            .await?;
        info!(point_id = %point_id, score, "saved point");
        Ok(point_id)
    }

    /// All points saved for a user.
    ///
    /// # Errors
    ///
    /// Returns `PointServiceError::Storage` if the query fails or a point is malformed.
    pub async fn points_for(&self, user_id: &UserId) -> Result<Vec<Point>, PointServiceError> {
        let docs = self
            .documents
            .query_equal(
                collections::POINTS,
                "userId",
                &Value::String(user_id.to_string()),
            )
            .await?;
        let mut points = Vec::with_capacity(docs.len());
        for doc in &docs {
            if let Some(point) = doc.decode::<Point>()? {
                points.push(point);
            }
        }
        Ok(points)
    }

    /// Sum of every score saved for a user.
    ///
    /// # Errors
    ///
    /// Returns `PointServiceError::Storage` if the points cannot be read.
    pub async fn total_score(&self, user_id: &UserId) -> Result<u64, PointServiceError> {
        let points = self.points_for(user_id).await?;
        Ok(points.iter().map(|p| u64::from(p.score)).sum())
    }
}
