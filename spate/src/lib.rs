#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod compare;
pub mod generator;
pub mod suite;
pub mod timed;

pub(crate) mod dispatcher;
pub(crate) mod probe;
pub(crate) mod reporter;
pub(crate) mod transport;

pub use compare::{Comparison, ComparisonReport, Faster, PhaseComparison};
pub use dispatcher::StopHandle;
pub use generator::RequestGenerator;
pub use load_test::LoadTest;
pub use suite::{Suite, SuiteSummary};
pub use timed::{TimedLoad, TimedSummary};

pub use spate_core::{
    Classification, Error, ProgressSnapshot, RequestOutcome, RunConfig, RunSummary,
    SyntheticRequest, TimedConfig, TransportError, TransportErrorKind,
};

pub mod prelude {
    pub use crate::compare::{Comparison, ComparisonReport};
    pub use crate::load_test::LoadTest;
    pub use crate::suite::{Suite, SuiteSummary};
    pub use crate::timed::{TimedLoad, TimedSummary};
    pub use crate::StopHandle;

    pub use spate_core::{Error, RunConfig, RunSummary, TimedConfig};
}
