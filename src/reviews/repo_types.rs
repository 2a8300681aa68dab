use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ValidationError;

pub const RATING_MIN: i64 = 1;
pub const RATING_MAX: i64 = 5;
pub const COMMENT_MAX_CHARS: usize = 1000;
pub const MOVIE_TITLE_MAX_CHARS: usize = 200;

/// Review record. `user_id` is fixed at creation.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub movie_id: String,
    pub movie_title: String,
    pub rating: i16,
    pub comment: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Star rating, 1 to 5 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rating(i16);

impl Rating {
    pub fn get(self) -> i16 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (RATING_MIN..=RATING_MAX).contains(&value) {
            Ok(Rating(value as i16))
        } else {
            Err(ValidationError::new(format!(
                "rating must be between {RATING_MIN} and {RATING_MAX}"
            )))
        }
    }
}

fn rating(value: Option<i64>) -> Result<Rating, ValidationError> {
    value
        .ok_or_else(|| ValidationError::new("rating is required"))
        .and_then(Rating::try_from)
}

fn comment(value: Option<String>) -> Result<Option<String>, ValidationError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let value = value.trim();
    if value.chars().count() > COMMENT_MAX_CHARS {
        return Err(ValidationError::new(format!(
            "comment cannot exceed {COMMENT_MAX_CHARS} characters"
        )));
    }
    Ok(Some(value.to_string()))
}

fn required_text(value: Option<String>, field: &str) -> Result<String, ValidationError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ValidationError::new(format!("{field} is required")))
}

/// A review submission that passed validation.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub(crate) user_id: Uuid,
    pub(crate) movie_id: String,
    pub(crate) movie_title: String,
    pub(crate) rating: Rating,
    pub(crate) comment: String,
}

impl NewReview {
    pub fn new(
        user_id: Uuid,
        movie_id: Option<String>,
        movie_title: Option<String>,
        rating_value: Option<i64>,
        comment_value: Option<String>,
    ) -> Result<Self, ValidationError> {
        let movie_id = required_text(movie_id, "movie id")?;
        let movie_title = required_text(movie_title, "movie title")?;
        if movie_title.chars().count() > MOVIE_TITLE_MAX_CHARS {
            return Err(ValidationError::new(format!(
                "movie title cannot exceed {MOVIE_TITLE_MAX_CHARS} characters"
            )));
        }
        Ok(Self {
            user_id,
            movie_id,
            movie_title,
            rating: rating(rating_value)?,
            comment: comment(comment_value)?.unwrap_or_default(),
        })
    }

    pub fn movie_id(&self) -> &str {
        &self.movie_id
    }
}

/// Validated edit. `comment: None` keeps the stored comment.
#[derive(Debug, Clone)]
pub struct ReviewChanges {
    pub(crate) rating: Rating,
    pub(crate) comment: Option<String>,
}

impl ReviewChanges {
    pub fn new(
        rating_value: Option<i64>,
        comment_value: Option<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            rating: rating(rating_value)?,
            comment: comment(comment_value)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        for r in RATING_MIN..=RATING_MAX {
            assert_eq!(Rating::try_from(r).unwrap().get() as i64, r);
        }
        for r in [i64::MIN, -1, 0, 6, 10, i64::MAX] {
            assert!(Rating::try_from(r).is_err(), "rating {r} accepted");
        }
    }

    #[test]
    fn new_review_trims_and_defaults_comment() {
        let review = NewReview::new(
            Uuid::new_v4(),
            Some(" tt0111161 ".into()),
            Some(" The Shawshank Redemption ".into()),
            Some(5),
            None,
        )
        .unwrap();
        assert_eq!(review.movie_id, "tt0111161");
        assert_eq!(review.movie_title, "The Shawshank Redemption");
        assert_eq!(review.comment, "");
    }

    #[test]
    fn new_review_requires_fields() {
        let user = Uuid::new_v4();
        assert!(NewReview::new(user, None, Some("T".into()), Some(3), None).is_err());
        assert!(NewReview::new(user, Some("m".into()), Some("  ".into()), Some(3), None).is_err());
        assert!(NewReview::new(user, Some("m".into()), Some("T".into()), None, None).is_err());
    }

    #[test]
    fn length_limits() {
        let user = Uuid::new_v4();
        let ok = "c".repeat(COMMENT_MAX_CHARS);
        let long = "c".repeat(COMMENT_MAX_CHARS + 1);
        assert!(NewReview::new(user, Some("m".into()), Some("T".into()), Some(3), Some(ok)).is_ok());
        assert!(NewReview::new(user, Some("m".into()), Some("T".into()), Some(3), Some(long.clone())).is_err());
        assert!(ReviewChanges::new(Some(3), Some(long)).is_err());

        let title = "t".repeat(MOVIE_TITLE_MAX_CHARS + 1);
        assert!(NewReview::new(user, Some("m".into()), Some(title), Some(3), None).is_err());
    }
}
