use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier of a product on the remote platform.
///
/// Clients send it either as a JSON string or as a JSON integer. It is never
/// empty and carries no surrounding whitespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(ProductId(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ProductId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => {
                ProductId::parse(&s).ok_or_else(|| D::Error::custom("productId must not be empty"))
            }
            Raw::Number(n) => Ok(ProductId(n.to_string())),
        }
    }
}

/// A user-submitted review.
///
/// Any JSON value is accepted and stored as sent. Only the `rating` field of
/// an object has a meaning to the relay; objects keep their field order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Review(Value);

impl Review {
    /// The numeric rating, if the review is an object that has one.
    pub fn rating(&self) -> Option<f64> {
        self.get("rating").and_then(Value::as_f64)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.as_object()?.get(field)
    }
}

/// Reviews stored for a product together with their mean rating.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub reviews: Vec<Review>,
    pub average_rating: f64,
}

impl From<Vec<Review>> for ReviewSummary {
    fn from(reviews: Vec<Review>) -> Self {
        let average_rating = average_rating(&reviews);
        ReviewSummary {
            reviews,
            average_rating,
        }
    }
}

/// Arithmetic mean of the numeric ratings in `reviews`.
///
/// Reviews without a numeric rating are left out of both sum and count.
/// Returns 0 when nothing is rated.
pub fn average_rating(reviews: &[Review]) -> f64 {
    let (sum, count) = reviews
        .iter()
        .filter_map(Review::rating)
        .fold((0.0, 0u32), |(sum, count), rating| (sum + rating, count + 1));

    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}
