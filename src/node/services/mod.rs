//! Application services for node values.

mod engine;
mod value;

pub use engine::{
    Direction, GeneratorCursor, ValueChangeEngine, ValueChangeError, ValueChangeResult, ValueStep,
};
pub use value::{NodeValueService, NodeValueServiceError, NodeValueServiceResult, StepOutcome};
