//! Data structures for AssetGrid entities and the promotion protocol.

pub mod asset;
pub mod component;
pub mod promotion;
pub mod records;

pub use asset::Asset;
pub use component::Component;
pub use promotion::{
    CallerContext, DocumentPolicy, HistoryPolicy, MigratedCounts, PromotionOperation,
    PromotionOutcome, PromotionRequest, PromotionResponse, PromotionStatus, ValidationError,
};
pub use records::{Document, FailureReport, HistoryEvent, WorkOrder};
