use crate::errors::RelayError;
use crate::metrics_defs::REVIEWS_SUBMITTED;
use crate::store::MetafieldStore;
use crate::types::{ProductId, Review, ReviewSummary};
use std::sync::Arc;

/// What a submission does with the stored list.
#[derive(Clone, Debug, PartialEq)]
pub enum Submission {
    /// Add one review to the end of the stored list.
    Append(Review),
    /// Overwrite the stored list.
    Replace(Vec<Review>),
}

impl Submission {
    pub fn mode(&self) -> &'static str {
        match self {
            Submission::Append(_) => "append",
            Submission::Replace(_) => "replace",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// The metafield did not exist and was created.
    pub created: bool,
    /// Number of reviews in the list that was written.
    pub total: usize,
}

/// Relays review reads and writes to the product's review list metafield.
///
/// Holds no state of its own; every call re-reads the remote store.
#[derive(Clone)]
pub struct ReviewService {
    store: Arc<dyn MetafieldStore>,
}

impl ReviewService {
    pub fn new(store: Arc<dyn MetafieldStore>) -> Self {
        ReviewService { store }
    }

    /// Writes `submission` to the review list of `product_id`.
    ///
    /// This is a read-modify-write against the remote store with no
    /// concurrency control. Two appends for the same product racing each
    /// other can both read the same list, and the later write drops the
    /// earlier review.
    pub async fn submit(
        &self,
        product_id: &ProductId,
        submission: Submission,
    ) -> Result<SubmitOutcome, RelayError> {
        let mode = submission.mode();
        let existing = self.store.find(product_id).await?;

        let reviews = match (&existing, submission) {
            (Some(metafield), Submission::Append(review)) => {
                let mut reviews = parse_reviews(&metafield.value)?;
                reviews.push(review);
                reviews
            }
            (None, Submission::Append(review)) => vec![review],
            (_, Submission::Replace(reviews)) => reviews,
        };

        let total = reviews.len();
        let value = serde_json::to_string(&reviews).map_err(RelayError::Encode)?;

        let created = match existing {
            Some(metafield) => {
                self.store.update(product_id, metafield.id, value).await?;
                false
            }
            None => {
                self.store.create(product_id, value).await?;
                true
            }
        };

        shared::counter!(REVIEWS_SUBMITTED, "mode" => mode).increment(1);
        tracing::info!(product_id = %product_id, mode, created, total, "stored reviews");

        Ok(SubmitOutcome { created, total })
    }

    /// Reads the review list of `product_id` and its mean rating.
    pub async fn list(&self, product_id: &ProductId) -> Result<ReviewSummary, RelayError> {
        let reviews = match self.store.find(product_id).await? {
            Some(metafield) => parse_reviews(&metafield.value)?,
            None => Vec::new(),
        };

        Ok(ReviewSummary::from(reviews))
    }
}

fn parse_reviews(value: &str) -> Result<Vec<Review>, RelayError> {
    serde_json::from_str(value).map_err(RelayError::MalformedReviewList)
}
