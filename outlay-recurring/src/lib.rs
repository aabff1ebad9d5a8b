//! outlay-recurring: materializer, store traits, due-set processor and triggers

pub mod materializer;
pub mod memory;
pub mod processor;
pub mod service;
pub mod store;
pub mod trigger;

pub use materializer::{materialize, Materialization, MAX_OCCURRENCES_PER_TEMPLATE};
pub use memory::InMemoryStore;
pub use processor::{DueSetProcessor, ProcessReport, RetryPolicy, TemplateFailure};
pub use service::TemplateService;
pub use store::{ExpenseStore, TemplateStore, UpdateOutcome};
pub use trigger::{
    DailySchedule, DailyTrigger, OnDemandTrigger, ProcessDueResponse, PROCESSED_MESSAGE,
};
