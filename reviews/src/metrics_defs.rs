//! Metrics definitions for the review relay.

use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Inbound request duration in seconds. Tagged with handler, status.",
};

pub const STORE_REQUEST_DURATION: MetricDef = MetricDef {
    name: "store.request.duration",
    metric_type: MetricType::Histogram,
    description: "Admin API request duration in seconds. Tagged with operation, status.",
};

pub const REVIEWS_SUBMITTED: MetricDef = MetricDef {
    name: "reviews.submitted",
    metric_type: MetricType::Counter,
    description: "Number of successful review submissions. Tagged with mode.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    STORE_REQUEST_DURATION,
    REVIEWS_SUBMITTED,
];
