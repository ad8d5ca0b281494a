
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::{RagError, Result};

/// Optional tags used for equality filtering. Each tag is absent or non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
}

impl DocumentMetadata {
    /// Trim every tag and turn empty ones into `None`
    #[inline]
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            source: clean(self.source),
            category: clean(self.category),
            region: clean(self.region),
            destination: clean(self.destination),
        }
    }

    #[inline]
    pub fn get(&self, field: FilterField) -> Option<&str> {
        match field {
            FilterField::Source => self.source.as_deref(),
            FilterField::Category => self.category.as_deref(),
            FilterField::Region => self.region.as_deref(),
            FilterField::Destination => self.destination.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub content: String,
    pub embedding: Vec<f32>,
    #[serde(flatten)]
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub content: String,
    #[serde(skip_serializing)]
    pub embedding: Vec<f32>,
    #[serde(flatten)]
    pub metadata: DocumentMetadata,
    pub created_at: NaiveDateTime,
}

/// A document plus its cosine similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    #[serde(flatten)]
    pub document: Document,
    pub similarity: f32,
}

#[derive(Debug, FromRow)]
pub(crate) struct DocumentRow {
    pub id: i64,
    pub content: String,
    pub embedding: Vec<u8>,
    pub source: Option<String>,
    pub category: Option<String>,
    pub region: Option<String>,
    pub destination: Option<String>,
    pub created_at: NaiveDateTime,
}

impl TryFrom<DocumentRow> for Document {
    type Error = RagError;

    fn try_from(row: DocumentRow) -> Result<Self> {
        let embedding = decode_embedding(&row.embedding)?;
        Ok(Self {
            id: row.id,
            content: row.content,
            embedding,
            metadata: DocumentMetadata {
                source: row.source,
                category: row.category,
                region: row.region,
                destination: row.destination,
            },
            created_at: row.created_at,
        })
    }
}

/// Metadata columns that can be filtered on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterField {
    Source,
    Category,
    Region,
    Destination,
}

impl FilterField {
    pub const ALL: [FilterField; 4] = [
        FilterField::Source,
        FilterField::Category,
        FilterField::Region,
        FilterField::Destination,
    ];

    #[inline]
    pub fn column(self) -> &'static str {
        match self {
            FilterField::Source => "source",
            FilterField::Category => "category",
            FilterField::Region => "region",
            FilterField::Destination => "destination",
        }
    }
}

impl FromStr for FilterField {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        FilterField::ALL
            .into_iter()
            .find(|field| field.column() == s)
            .ok_or_else(|| {
                RagError::InvalidArgument(format!(
                    "unknown filter field '{}' (expected one of source, category, region, destination)",
                    s
                ))
            })
    }
}

impl std::fmt::Display for FilterField {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Conjunctive exact-match filters
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchFilters {
    conditions: BTreeMap<FilterField, String>,
}

impl SearchFilters {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a field-name → value mapping
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut filters = Self::new();
        for (field, value) in pairs {
            let field = field.as_ref().parse::<FilterField>()?;
            filters = filters.with(field, value)?;
        }
        Ok(filters)
    }

    pub fn with(mut self, field: FilterField, value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(RagError::InvalidArgument(format!(
                "filter value for '{}' is empty",
                field
            )));
        }
        self.conditions.insert(field, value);
        Ok(self)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    #[inline]
    pub fn get(&self, field: FilterField) -> Option<&str> {
        self.conditions.get(&field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FilterField, &str)> {
        self.conditions
            .iter()
            .map(|(field, value)| (*field, value.as_str()))
    }

    /// Whether `metadata` satisfies every condition
    pub fn matches(&self, metadata: &DocumentMetadata) -> bool {
        self.iter()
            .all(|(field, value)| metadata.get(field) == Some(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SessionMessage {
    pub id: i64,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: NaiveDateTime,
}

/// Serialize a vector as little-endian f32 bytes
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|value| value.to_le_bytes()).collect()
}

pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(RagError::Store(format!(
            "embedding blob of {} bytes is not a whole number of f32 values",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
