//! Metrics for the consensus component.
use std::time::Duration;

use vise::{Buckets, EncodeLabelSet, EncodeLabelValue, Family, Gauge, Histogram, Metrics, Unit};

/// Label for a consensus input message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelValue)]
#[metrics(rename_all = "snake_case")]
pub(crate) enum InputMessageLabel {
    /// Label for a `Proposal` message.
    Proposal,
    /// Label for a `Vote` message.
    Vote,
    /// Label for a `Block` message.
    Block,
    /// Label for a `NewView` message.
    NewView,
    /// Label for a `Propose` pacemaker command.
    Propose,
    /// Label for a `SkipView` pacemaker command.
    SkipView,
    /// Label for a `Timeout` pacemaker command.
    Timeout,
}

impl InputMessageLabel {
    /// Attaches a result to this label.
    pub(crate) fn with_result<E>(self, result: &Result<(), E>) -> ProcessingLatencyLabels {
        ProcessingLatencyLabels {
            r#type: self,
            result: match result {
                Ok(()) => ResultLabel::Ok,
                Err(_) => ResultLabel::Err,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelValue)]
#[metrics(rename_all = "snake_case")]
enum ResultLabel {
    Ok,
    Err,
}

/// Labels for processing latency metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelSet)]
pub(crate) struct ProcessingLatencyLabels {
    r#type: InputMessageLabel,
    result: ResultLabel,
}

/// Metrics defined by the consensus component.
#[derive(Debug, Metrics)]
#[metrics(prefix = "consensus")]
pub(crate) struct ConsensusMetrics {
    /// View of the current leaf block, i.e. the highest block known to extend
    /// the highest quorum certificate.
    pub(crate) leaf_view: Gauge<u64>,
    /// View of the locked block.
    pub(crate) locked_view: Gauge<u64>,
    /// View of the deepest executed block.
    pub(crate) executed_view: Gauge<u64>,
    /// Latency of processing input messages.
    #[metrics(buckets = Buckets::LATENCIES, unit = Unit::Seconds)]
    pub(crate) message_processing_latency: Family<ProcessingLatencyLabels, Histogram<Duration>>,
}

/// Global instance of [`ConsensusMetrics`].
#[vise::register]
pub(crate) static METRICS: vise::Global<ConsensusMetrics> = vise::Global::new();
