use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bookstore_core::{BookId, DomainError, DomainResult};

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub price: f64,
    /// Stored file name of the cover image, if one was uploaded.
    pub image: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Client-supplied book fields (create and full update).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BookInput {
    pub title: String,
    pub author: String,
    pub price: f64,
}

impl BookInput {
    pub fn validate(&self) -> DomainResult<()> {
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("title must not be empty"));
        }
        if self.author.trim().is_empty() {
            return Err(DomainError::validation("author must not be empty"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(DomainError::validation("price must be a non-negative number"));
        }
        Ok(())
    }
}

impl Book {
    pub fn create(input: BookInput, now: DateTime<Utc>) -> DomainResult<Self> {
        input.validate()?;
        Ok(Self {
            id: BookId::new(),
            title: input.title,
            author: input.author,
            price: input.price,
            image: None,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    /// Replace the editable fields; id, image and `created_at` are kept.
    pub fn apply(&mut self, input: BookInput, now: DateTime<Utc>) -> DomainResult<()> {
        input.validate()?;
        self.title = input.title;
        self.author = input.author;
        self.price = input.price;
        self.updated_at = Some(now);
        Ok(())
    }

    /// Point the book at a new stored image, returning the previous one.
    pub fn replace_image(&mut self, file_name: String, now: DateTime<Utc>) -> Option<String> {
        self.updated_at = Some(now);
        self.image.replace(file_name)
    }
}
